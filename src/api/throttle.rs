//! Request spacing for the web API.
//!
//! Every API call reserves the next free slot before it is sent. Slots are
//! `1 / requests_per_second` apart plus up to 20% random jitter, shared by
//! all tasks. Retry backoff is separate and happens on top of this.

use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Longest spacing between two requests.
const MAX_INTERVAL: Duration = Duration::from_secs(3600);

/// Shared request spacer.
pub struct Throttle {
    interval: Option<Duration>,
    jitter: bool,
    next_slot: Mutex<Option<Instant>>,
}

impl Throttle {
    /// `requests_per_second <= 0` disables throttling.
    pub fn new(requests_per_second: f64) -> Self {
        let interval = (requests_per_second > 0.0).then(|| {
            Duration::try_from_secs_f64(1.0 / requests_per_second)
                .unwrap_or(MAX_INTERVAL)
                .min(MAX_INTERVAL)
        });
        Self {
            interval,
            jitter: true,
            next_slot: Mutex::new(None),
        }
    }

    /// Throttle without jitter, for deterministic spacing.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.interval.is_some()
    }

    /// Wait for this caller's slot.
    pub async fn acquire(&self) {
        let Some(interval) = self.interval else {
            return;
        };

        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = next.map_or(now, |n| n.max(now));
            *next = Some(slot + self.spacing(interval));
            slot
        };

        tokio::time::sleep_until(slot).await;
    }

    fn spacing(&self, interval: Duration) -> Duration {
        if !self.jitter {
            return interval;
        }
        let factor: f64 = rand::thread_rng().gen_range(0.0..0.2);
        interval.mul_f64(1.0 + factor)
    }
}
