//! douyin-downloader - CLI entry point.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

use douyin_downloader::{
    api::{CookieFile, CredentialContext, CredentialSource, Credentials, DouyinApi, StaticCookies},
    batch::Coordinator,
    cli::Args,
    config::{validate_config, Config, CookieSetting},
    dedup::Ledger,
    error::{exit_codes, Result},
    output::{
        create_item_counter, print_banner, print_config_summary, print_error, print_info,
        print_success, print_summary, print_warning, RunOverview,
    },
};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            print_error(&format!("{}", e));
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run() -> Result<i32> {
    // Parse CLI arguments
    let args = Args::parse();
    let quiet = args.quiet;

    // Set up logging
    let log_level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    fmt().with_env_filter(filter).with_target(false).init();

    print_banner();

    // Load configuration
    let config_path = args.config.clone();
    let mut config = if config_path.exists() {
        Config::load(&config_path)?
    } else {
        print_warning(&format!(
            "Configuration file not found: {}",
            config_path.display()
        ));
        print_info("Using default configuration with CLI arguments");
        Config::default()
    };

    args.merge_into_config(&mut config);
    validate_config(&config)?;

    let credentials = Arc::new(load_credentials(&config).await?);

    let ledger = if config.database {
        let path = config.database_path();
        Some(Arc::new(Ledger::open(&path).await?))
    } else {
        None
    };

    let ledger_path = config.database.then(|| config.database_path());
    let modes: Vec<String> = config.mode.iter().map(|m| m.to_string()).collect();
    print_config_summary(&RunOverview {
        links: config.link.len(),
        modes: &modes.join(", "),
        output: &config.path,
        workers: config.thread,
        ledger: ledger_path.as_deref(),
    });

    let api = Arc::new(DouyinApi::new(&config, credentials)?);

    // Ctrl-C stops new work; in-flight downloads get the grace period.
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    let grace = config.grace_period_secs;
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            print_warning(&format!(
                "Interrupted, giving in-flight downloads {}s to finish",
                grace
            ));
            interrupt.cancel();
        }
    });

    let mut coordinator = Coordinator::from_config(&config, api, ledger.clone(), cancel)?;
    let progress = (!quiet).then(|| create_item_counter("Downloading"));
    if let Some(bar) = &progress {
        coordinator = coordinator.with_progress(bar.clone());
    }

    let started = Instant::now();
    let report = coordinator.run(&config.link).await;
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }
    if let Some(ledger) = &ledger {
        ledger.close().await;
    }
    let report = report?;

    print_summary(&report.summary, started.elapsed());

    if let Some(e) = report.fatal {
        print_error(&format!("Run aborted: {}", e));
        return Ok(e.exit_code());
    }

    if report.summary.has_failures() {
        print_warning("Some items failed; re-run the same command to retry only those");
        if config.fail_on_item_error {
            return Ok(exit_codes::DOWNLOAD_ERROR);
        }
    } else {
        print_success("All done");
    }

    Ok(exit_codes::SUCCESS)
}

/// Build the credential context from the configured cookie source.
async fn load_credentials(config: &Config) -> Result<CredentialContext> {
    let source: Arc<dyn CredentialSource> = if config.auto_cookie {
        let path = config.cookie_file_path();
        print_info(&format!("Reading cookies from {}", path.display()));
        Arc::new(CookieFile::new(path))
    } else {
        let credentials = match &config.cookies {
            Some(CookieSetting::Raw(raw)) => Credentials::from_cookie_string(raw),
            Some(CookieSetting::Map(map)) => Credentials::from_cookie_map(map.clone()),
            None => Credentials::default(),
        };
        if credentials.is_empty() {
            print_warning("No cookies configured; most listings require a logged-in session");
        }
        Arc::new(StaticCookies(credentials))
    };

    CredentialContext::from_source(source, config.user_agent.clone()).await
}
