//! Seams between the playback slot and a concrete player implementation.

use crate::error::PlaybackError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Callback type for when playback finishes naturally.
pub type OnFinishCallback = Box<dyn FnOnce() + Send + Sync + 'static>;

/// Opens player resources. Opening may suspend (network fetch, probing) and
/// never runs on the coordinator's control path.
#[async_trait]
pub trait PlaybackBackend: Send + Sync {
    /// Opens and prepares `source_ref` without starting it.
    async fn open(&self, source_ref: &str) -> Result<Box<dyn PlayerHandle>, PlaybackError>;
}

/// A single prepared player resource.
///
/// Owned exclusively by the [`PlaybackSlot`](crate::playback::PlaybackSlot);
/// only its [`PlaybackClock`] is ever handed out.
pub trait PlayerHandle: Send {
    /// Starts playback. `on_finish` runs once when the end of the stream is
    /// reached, and never after [`release`](Self::release).
    fn start(&mut self, on_finish: OnFinishCallback) -> Result<(), PlaybackError>;

    /// Read-only view of position and duration.
    fn clock(&self) -> PlaybackClock;

    fn seek(&mut self, position: Duration) -> Result<(), PlaybackError>;

    /// Stops playback and frees the underlying resource. Idempotent.
    fn release(&mut self);
}

const UNKNOWN_DURATION: u64 = 0;

#[derive(Debug, Default)]
struct ClockInner {
    position_ms: AtomicU64,
    duration_ms: AtomicU64,
}

/// Position and duration of a player, shared between the player's worker and
/// the progress ticker.
#[derive(Debug, Clone, Default)]
pub struct PlaybackClock {
    inner: Arc<ClockInner>,
}

impl PlaybackClock {
    pub fn new(duration: Option<Duration>) -> Self {
        let clock = Self::default();
        clock.set_duration(duration);
        clock
    }

    pub fn position(&self) -> Duration {
        Duration::from_millis(self.inner.position_ms.load(Ordering::Acquire))
    }

    /// `None` when the duration is unknown.
    pub fn duration(&self) -> Option<Duration> {
        match self.inner.duration_ms.load(Ordering::Acquire) {
            UNKNOWN_DURATION => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn set_position(&self, position: Duration) {
        self.inner
            .position_ms
            .store(position.as_millis() as u64, Ordering::Release);
    }

    pub fn set_duration(&self, duration: Option<Duration>) {
        let ms = duration.map(|d| d.as_millis() as u64).unwrap_or(UNKNOWN_DURATION);
        self.inner.duration_ms.store(ms, Ordering::Release);
    }
}
