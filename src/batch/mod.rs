//! Batch coordinator.
//!
//! Provides:
//! - Sequential target resolution with per-target failure isolation
//! - Resolver to dispatcher pipelining over a bounded channel
//! - One credential refresh per listing on login expiry
//! - Run-level outcome: the summary plus the error that aborted the run, if any

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::{ContentSource, CredentialContext, DouyinApi};
use crate::config::Config;
use crate::dedup::Ledger;
use crate::download::{BatchSummary, Dispatcher, DownloadOptions};
use crate::error::{Error, Result};
use crate::media::ResolvedItem;
use crate::resolve::{ItemSequence, Job, ResolveOptions, Resolver};

/// Items buffered between a listing and the worker pool.
pub const QUEUE_DEPTH: usize = 16;

/// Result of a run that got as far as downloading.
#[derive(Debug)]
pub struct RunReport {
    pub summary: BatchSummary,

    /// Set when the run stopped early (login expired for good, or cancelled).
    pub fatal: Option<Error>,
}

/// Drives every target of a run through resolution and download.
pub struct Coordinator {
    resolver: Resolver,
    dispatcher: Dispatcher,
    credentials: Option<Arc<CredentialContext>>,
    cancel: CancellationToken,
}

impl Coordinator {
    pub fn new(
        resolver: Resolver,
        dispatcher: Dispatcher,
        credentials: Option<Arc<CredentialContext>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            resolver,
            dispatcher,
            credentials,
            cancel,
        }
    }

    /// Wire up a coordinator that resolves and downloads through `api`.
    pub fn from_config(
        config: &Config,
        api: Arc<DouyinApi>,
        ledger: Option<Arc<Ledger>>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let source: Arc<dyn ContentSource> = api.clone();
        let resolver = Resolver::new(source, ledger.clone(), ResolveOptions::from_config(config)?);
        let credentials = Some(api.credentials().clone());
        let dispatcher = Dispatcher::new(
            api,
            ledger,
            DownloadOptions::from_config(config),
            config.thread,
            cancel.clone(),
        );
        Ok(Self::new(resolver, dispatcher, credentials, cancel))
    }

    /// Show per-item progress on `progress`.
    pub fn with_progress(mut self, progress: indicatif::ProgressBar) -> Self {
        self.dispatcher = self.dispatcher.with_progress(progress);
        self
    }

    /// Download everything `links` point to.
    ///
    /// Fails only when none of the links could be resolved. Item and
    /// target failures are reported in the summary.
    pub async fn run(mut self, links: &[String]) -> Result<RunReport> {
        let mut summary = BatchSummary::default();

        let mut targets = Vec::new();
        for link in links {
            match self.resolver.resolve_link(link).await {
                Ok(target) => {
                    tracing::info!(target = %target, "Resolved link");
                    targets.push(target);
                }
                Err(e) => {
                    tracing::warn!(link = %link, error = %e, "Skipping link");
                    summary.add_target_failure(link, e.to_string());
                }
            }
        }
        if targets.is_empty() {
            return Err(Error::NoValidTargets);
        }

        let mut fatal = None;
        'targets: for target in &targets {
            for job in self.resolver.plan(target) {
                if self.cancel.is_cancelled() {
                    break 'targets;
                }

                let jobs = match self.expand(job.clone()).await {
                    Ok(jobs) => jobs,
                    Err(e) if e.is_run_fatal() => {
                        fatal = Some(e);
                        break 'targets;
                    }
                    Err(e) => {
                        tracing::warn!(job = %job, error = %e, "Job failed");
                        summary.add_target_failure(&target.raw_link, format!("{}: {}", job, e));
                        continue;
                    }
                };

                for job in jobs {
                    if self.cancel.is_cancelled() {
                        break 'targets;
                    }
                    if let Err(e) = self.run_job(&target.raw_link, &job, &mut summary).await {
                        fatal = Some(e);
                        break 'targets;
                    }
                }
            }
        }

        if let Some(e) = &fatal {
            tracing::error!(error = %e, "Run aborted, finishing in-flight downloads");
        }

        summary.extend(self.dispatcher.drain().await);

        if summary.filesystem_failures_pervasive() {
            tracing::warn!(
                failed = summary.failed,
                "Most failures are disk errors; check free space and permissions of the output directory"
            );
        }

        if fatal.is_none() && self.cancel.is_cancelled() {
            fatal = Some(Error::Cancelled);
        }

        Ok(RunReport { summary, fatal })
    }

    /// Expand a profile's collection list, refreshing credentials once if needed.
    async fn expand(&self, job: Job) -> Result<Vec<Job>> {
        let generation = generation(self.credentials.as_deref()).await;
        match self.resolver.expand(job.clone()).await {
            Err(Error::AuthExpired(reason)) => {
                refresh_credentials(self.credentials.as_deref(), generation, reason).await?;
                self.resolver.expand(job).await
            }
            other => other,
        }
    }

    /// Stream one job's items into the worker pool.
    ///
    /// Returns an error only for run-level failures. Anything else ends the
    /// job and is recorded against `link`.
    async fn run_job(&mut self, link: &str, job: &Job, summary: &mut BatchSummary) -> Result<()> {
        tracing::info!(job = %job, "Starting");

        let mut sequence = self.resolver.open(job);
        let scope = sequence.scope().to_string();
        let (tx, mut rx) = mpsc::channel::<ResolvedItem>(QUEUE_DEPTH);

        let producer = produce(self.credentials.as_deref(), &self.cancel, &mut sequence, tx);

        let dispatcher = &mut self.dispatcher;
        let consumer = async move {
            let mut queued = 0u64;
            while let Some(item) = rx.recv().await {
                if !dispatcher.submit(&scope, item).await {
                    break;
                }
                queued += 1;
            }
            queued
        };

        let (produced, queued) = tokio::join!(producer, consumer);
        tracing::info!(job = %job, items = queued, "Listing done");

        match produced {
            Ok(()) => Ok(()),
            Err(e) if e.is_run_fatal() => Err(e),
            Err(e) => {
                tracing::warn!(job = %job, error = %e, "Listing failed");
                summary.add_target_failure(link, format!("{}: {}", job, e));
                Ok(())
            }
        }
    }
}

/// Pull items until the sequence ends, the pool stops accepting, or the
/// run is cancelled.
async fn produce(
    credentials: Option<&CredentialContext>,
    cancel: &CancellationToken,
    sequence: &mut ItemSequence,
    tx: mpsc::Sender<ResolvedItem>,
) -> Result<()> {
    let mut refreshed = false;
    loop {
        let generation = generation(credentials).await;
        let next = tokio::select! {
            next = sequence.next() => next,
            _ = cancel.cancelled() => return Ok(()),
        };

        match next {
            Ok(Some(item)) => {
                if tx.send(item).await.is_err() {
                    return Ok(());
                }
            }
            Ok(None) => return Ok(()),
            Err(Error::AuthExpired(reason)) if !refreshed => {
                refreshed = true;
                refresh_credentials(credentials, generation, reason).await?;
                sequence.resume();
            }
            Err(e) => return Err(e),
        }
    }
}

async fn generation(credentials: Option<&CredentialContext>) -> u64 {
    match credentials {
        Some(ctx) => ctx.generation().await,
        None => 0,
    }
}

/// Reload credentials after an expiry. Fails with `AuthExpired` when there
/// is nothing to reload from or the reload itself fails.
async fn refresh_credentials(
    credentials: Option<&CredentialContext>,
    seen_generation: u64,
    reason: String,
) -> Result<()> {
    let Some(ctx) = credentials.filter(|c| c.can_refresh()) else {
        return Err(Error::AuthExpired(reason));
    };

    tracing::warn!(reason = %reason, "Login expired, reloading credentials");
    match ctx.refresh(seen_generation).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(Error::AuthExpired(reason)),
        Err(e) => Err(Error::AuthExpired(format!("{} (reload failed: {})", reason, e))),
    }
}
