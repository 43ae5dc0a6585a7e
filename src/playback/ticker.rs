//! Periodic sampling of a running player's position.

use crate::store::ItemKey;
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

pub const PROGRESS_UPDATE_INTERVAL: Duration = Duration::from_millis(500);

/// Shortest sampling period; `tokio::time::interval` rejects zero.
pub const MIN_TICK_PERIOD: Duration = Duration::from_millis(1);
const LOG_TARGET: &str = "r_medialist::playback::ticker";

/// Converts a position into a whole percentage of `duration`.
///
/// Returns `None` when the duration is unknown or zero, so the caller skips
/// the sample instead of dividing by zero.
pub fn sample_percent(position: Duration, duration: Option<Duration>) -> Option<u8> {
    let duration_ms = duration?.as_millis();
    if duration_ms == 0 {
        return None;
    }
    let percent = position.as_millis() * 100 / duration_ms;
    Some(percent.min(100) as u8)
}

struct TickerTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl TickerTask {
    fn cancel(self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

/// Runs one cancelable sampling schedule per item.
///
/// After [`stop`](Self::stop) returns, no further tick for that item is
/// scheduled; a tick already handed to `on_tick` before the cancel may still
/// be in flight, so receivers should filter by their own session.
pub struct ProgressTicker {
    period: Duration,
    tasks: HashMap<ItemKey, TickerTask>,
}

impl ProgressTicker {
    /// A zero `period` is raised to [`MIN_TICK_PERIOD`].
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(MIN_TICK_PERIOD),
            tasks: HashMap::new(),
        }
    }

    /// Starts sampling for `key`, replacing any schedule already running for
    /// it. The first sample is taken immediately.
    pub fn start<P, D, T>(&mut self, key: ItemKey, position_fn: P, duration_fn: D, on_tick: T)
    where
        P: Fn() -> Duration + Send + 'static,
        D: Fn() -> Option<Duration> + Send + 'static,
        T: Fn(ItemKey, u8) + Send + 'static,
    {
        self.stop(&key);

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let period = self.period;
        debug!(target: LOG_TARGET, item = %key, ?period, "Starting progress ticker");

        let handle = tokio::spawn(async move {
            let mut schedule = interval(period);
            schedule.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = schedule.tick() => {
                        if token.is_cancelled() {
                            break;
                        }
                        match sample_percent(position_fn(), duration_fn()) {
                            Some(percent) => {
                                trace!(target: LOG_TARGET, item = %key, percent, "Tick");
                                on_tick(key, percent);
                            }
                            None => trace!(target: LOG_TARGET, item = %key, "Duration unknown, skipping tick"),
                        }
                    }
                }
            }
        });

        self.tasks.insert(key, TickerTask { cancel, handle });
    }

    /// Cancels the schedule for `key`. Returns whether one was running.
    pub fn stop(&mut self, key: &ItemKey) -> bool {
        match self.tasks.remove(key) {
            Some(task) => {
                debug!(target: LOG_TARGET, item = %key, "Stopping progress ticker");
                task.cancel();
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&mut self) {
        for (key, task) in self.tasks.drain() {
            debug!(target: LOG_TARGET, item = %key, "Stopping progress ticker");
            task.cancel();
        }
    }

    pub fn is_running(&self, key: &ItemKey) -> bool {
        self.tasks.contains_key(key)
    }

    pub fn running_count(&self) -> usize {
        self.tasks.len()
    }
}

impl Default for ProgressTicker {
    fn default() -> Self {
        Self::new(PROGRESS_UPDATE_INTERVAL)
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.stop_all();
    }
}
