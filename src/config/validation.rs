//! Configuration validation logic.

use chrono::NaiveDate;

use crate::config::loader::Config;
use crate::error::{Error, Result};

/// Upper bound on concurrent workers.
const MAX_THREADS: usize = 64;

/// Validate the entire configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_threads(config.thread)?;
    validate_retry(config)?;
    validate_modes(config)?;
    validate_time_window(config.start_time.as_deref(), config.end_time.as_deref())?;

    let rps = config.network.requests_per_second;
    if !rps.is_finite() || rps < 0.0 {
        return Err(Error::ConfigValidation {
            field: "network.requests_per_second".to_string(),
            message: format!("must be a finite number >= 0 (got {})", rps),
        });
    }

    Ok(())
}

/// Validate the worker count.
pub fn validate_threads(thread: usize) -> Result<()> {
    if thread == 0 || thread > MAX_THREADS {
        return Err(Error::ConfigValidation {
            field: "thread".to_string(),
            message: format!("must be between 1 and {} (got {})", MAX_THREADS, thread),
        });
    }
    Ok(())
}

fn validate_retry(config: &Config) -> Result<()> {
    if config.retry.attempts == 0 {
        return Err(Error::ConfigValidation {
            field: "retry.attempts".to_string(),
            message: "at least one attempt is required".to_string(),
        });
    }

    let multiplier = config.retry.multiplier;
    if !multiplier.is_finite() || multiplier < 1.0 {
        return Err(Error::ConfigValidation {
            field: "retry.multiplier".to_string(),
            message: format!("must be a finite number >= 1.0 (got {})", multiplier),
        });
    }

    Ok(())
}

fn validate_modes(config: &Config) -> Result<()> {
    if config.mode.is_empty() {
        return Err(Error::MissingConfig(
            "mode (at least one of post, like, mix)".to_string(),
        ));
    }
    Ok(())
}

/// Validate the optional date window.
pub fn validate_time_window(start: Option<&str>, end: Option<&str>) -> Result<()> {
    let start = start.map(|s| parse_date("start_time", s)).transpose()?;
    let end = end.map(|s| parse_date("end_time", s)).transpose()?;

    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(Error::ConfigValidation {
                field: "start_time".to_string(),
                message: format!("{} is after end_time {}", start, end),
            });
        }
    }

    Ok(())
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| Error::ConfigValidation {
        field: field.to_string(),
        message: format!("'{}' is not a YYYY-MM-DD date", value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_invalid_threads() {
        assert!(validate_threads(0).is_err());
        assert!(validate_threads(65).is_err());
        assert!(validate_threads(1).is_ok());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = Config::default();
        config.retry.attempts = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_non_finite_numbers_rejected() {
        for multiplier in [f64::NAN, f64::INFINITY, 0.5] {
            let mut config = Config::default();
            config.retry.multiplier = multiplier;
            assert!(validate_config(&config).is_err(), "multiplier {}", multiplier);
        }

        let mut config = Config::default();
        config.retry.multiplier = 1e20;
        assert!(validate_config(&config).is_ok());

        for rps in [f64::NAN, f64::INFINITY, -1.0] {
            let mut config = Config::default();
            config.network.requests_per_second = rps;
            assert!(validate_config(&config).is_err(), "rps {}", rps);
        }
    }

    #[test]
    fn test_empty_mode_rejected() {
        let config = Config {
            mode: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(Error::MissingConfig(_))
        ));
    }

    #[test]
    fn test_time_window() {
        assert!(validate_time_window(Some("2024-01-01"), Some("2024-02-01")).is_ok());
        assert!(validate_time_window(Some("2024-03-01"), Some("2024-02-01")).is_err());
        assert!(validate_time_window(Some("01/03/2024"), None).is_err());
        assert!(validate_time_window(None, None).is_ok());
    }
}
