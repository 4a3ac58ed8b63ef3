//! Per-run resolution settings.

use chrono::NaiveTime;

use crate::config::{parse_date, Config, IncrementStrategy, ListingMode, ModeFlags, ModeLimits};
use crate::error::Result;

/// Inclusive creation-time window, in unix seconds (UTC).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl TimeWindow {
    /// Build from `YYYY-MM-DD` bounds. The end date is included in full.
    pub fn from_dates(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        let start = start
            .map(|s| parse_date("start_time", s))
            .transpose()?
            .map(|d| d.and_time(NaiveTime::MIN).and_utc().timestamp());
        let end = end
            .map(|s| parse_date("end_time", s))
            .transpose()?
            .and_then(|d| d.and_hms_opt(23, 59, 59))
            .map(|dt| dt.and_utc().timestamp());
        Ok(Self { start, end })
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        self.start.map_or(true, |s| timestamp >= s) && self.end.map_or(true, |e| timestamp <= e)
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Limits and incremental behaviour for every listing of a run.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub modes: Vec<ListingMode>,
    pub limits: ModeLimits,
    pub increment: ModeFlags,
    pub strategy: IncrementStrategy,
    pub window: TimeWindow,
}

impl ResolveOptions {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            modes: config.mode.clone(),
            limits: config.number,
            increment: config.increment,
            strategy: config.increment_strategy,
            window: TimeWindow::from_dates(
                config.start_time.as_deref(),
                config.end_time.as_deref(),
            )?,
        })
    }

    pub fn limit_for(&self, mode: ListingMode) -> u32 {
        self.limits.for_mode(mode)
    }

    pub fn incremental_for(&self, mode: ListingMode) -> bool {
        self.increment.for_mode(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_bounds_are_inclusive() {
        let window = TimeWindow::from_dates(Some("2023-11-14"), Some("2023-11-15")).unwrap();
        // 2023-11-14T00:00:00Z
        assert!(window.contains(1_699_920_000));
        assert!(!window.contains(1_699_919_999));
        // 2023-11-15T23:59:59Z
        assert!(window.contains(1_700_092_799));
        assert!(!window.contains(1_700_092_800));
    }

    #[test]
    fn test_open_window() {
        let window = TimeWindow::from_dates(None, None).unwrap();
        assert!(window.is_unbounded());
        assert!(window.contains(0));
    }

    #[test]
    fn test_bad_date() {
        assert!(TimeWindow::from_dates(Some("14/11/2023"), None).is_err());
    }

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.number.post = 3;
        config.increment.like = true;
        let options = ResolveOptions::from_config(&config).unwrap();
        assert_eq!(options.limit_for(ListingMode::Post), 3);
        assert!(options.incremental_for(ListingMode::Like));
        assert!(!options.incremental_for(ListingMode::Post));
    }
}
