//! Staleness watchdog for the reader leg.
//!
//! The reader bumps an [`Activity`] clock for every inbound message; the
//! [`Watchdog`] polls it and reports [`WatchdogExit::Stale`] once nothing has
//! arrived for longer than the threshold. The reader then drops the response
//! body, which ends the generation.

use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const MAX_POLL_INTERVAL: Duration = Duration::from_secs(1);
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Writer side of the last-received clock.
#[derive(Debug)]
pub struct Activity {
    tx: watch::Sender<Instant>,
}

/// Reader side of the last-received clock.
#[derive(Debug, Clone)]
pub struct ActivityWatch {
    rx: watch::Receiver<Instant>,
}

impl Activity {
    /// New clock starting now.
    #[must_use]
    pub fn channel() -> (Self, ActivityWatch) {
        let (tx, rx) = watch::channel(Instant::now());
        (Self { tx }, ActivityWatch { rx })
    }

    /// Record inbound activity.
    pub fn touch(&self) {
        self.tx.send_replace(Instant::now());
    }
}

impl ActivityWatch {
    /// Time since the last recorded activity.
    #[must_use]
    pub fn idle(&self) -> Duration {
        self.rx.borrow().elapsed()
    }
}

/// Why [`Watchdog::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogExit {
    /// Idle time exceeded the threshold.
    Stale,
    /// The leg stopped first.
    Cancelled,
}

/// Idle-time watchdog.
#[derive(Debug, Clone, Copy)]
pub struct Watchdog {
    threshold: Duration,
    poll: Duration,
}

impl Watchdog {
    /// Watchdog firing after `threshold` of inactivity.
    ///
    /// Polls at a quarter of the threshold, bounded to `10ms..=1s`.
    #[must_use]
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            poll: (threshold / 4).clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL),
        }
    }

    /// Configured idle threshold.
    #[must_use]
    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Poll `activity` until it goes stale or `cancel` fires.
    pub async fn run(self, activity: ActivityWatch, cancel: &CancellationToken) -> WatchdogExit {
        let mut ticker = tokio::time::interval(self.poll);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    debug!("session reader: watchdog stopped");
                    return WatchdogExit::Cancelled;
                }

                _ = ticker.tick() => {
                    let idle = activity.idle();
                    if idle > self.threshold {
                        warn!(
                            idle_ms = u64::try_from(idle.as_millis()).unwrap_or(u64::MAX),
                            threshold_ms = u64::try_from(self.threshold.as_millis()).unwrap_or(u64::MAX),
                            "session reader: no message within read timeout, closing stream"
                        );
                        return WatchdogExit::Stale;
                    }
                }
            }
        }
    }
}
