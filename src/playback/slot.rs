//! The single-player slot and its state machine.
//!
//! ```text
//! Idle -> Preparing -> Playing -> Idle
//! ```
//!
//! `stop()` is valid from every state and a no-op from `Idle`. Opening the
//! source happens between `begin` and `attach`, off the control path; each
//! `begin` issues a new session number so a late `attach` for a session that
//! was stopped in the meantime is recognised and its player released unstarted.

use crate::error::{CoreError, PlaybackError};
use crate::playback::backend::{OnFinishCallback, PlaybackClock, PlayerHandle};
use crate::store::ItemKey;
use std::time::Duration;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "r_medialist::playback::slot";

pub type SessionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Preparing { key: ItemKey, session: SessionId },
    Playing { key: ItemKey, session: SessionId },
}

struct ActivePlayer {
    handle: Box<dyn PlayerHandle>,
    clock: PlaybackClock,
}

pub struct PlaybackSlot {
    state: SlotState,
    player: Option<ActivePlayer>,
    next_session: SessionId,
}

impl PlaybackSlot {
    pub fn new() -> Self {
        Self {
            state: SlotState::Idle,
            player: None,
            next_session: 1,
        }
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    /// The item occupying the slot, whether preparing or playing.
    pub fn active_key(&self) -> Option<ItemKey> {
        match self.state {
            SlotState::Idle => None,
            SlotState::Preparing { key, .. } | SlotState::Playing { key, .. } => Some(key),
        }
    }

    pub fn is_current(&self, session: SessionId) -> bool {
        match self.state {
            SlotState::Idle => false,
            SlotState::Preparing { session: s, .. } | SlotState::Playing { session: s, .. } => s == session,
        }
    }

    pub fn playing_session(&self) -> Option<SessionId> {
        match self.state {
            SlotState::Playing { session, .. } => Some(session),
            _ => None,
        }
    }

    /// Claims the slot for `key`, stopping whatever held it first.
    pub fn begin(&mut self, key: ItemKey) -> SessionId {
        self.stop();
        let session = self.next_session;
        self.next_session += 1;
        self.state = SlotState::Preparing { key, session };
        debug!(target: LOG_TARGET, item = %key, session, "Slot preparing");
        session
    }

    /// Installs the prepared player for `session` and starts it.
    ///
    /// Returns `Ok(None)` when the session is no longer current; the handle
    /// is released without ever being started.
    pub fn attach(
        &mut self,
        session: SessionId,
        mut handle: Box<dyn PlayerHandle>,
        on_finish: OnFinishCallback,
    ) -> Result<Option<PlaybackClock>, PlaybackError> {
        let key = match self.state {
            SlotState::Preparing { key, session: s } if s == session => key,
            _ => {
                debug!(target: LOG_TARGET, session, "Discarding player prepared for a stale session");
                handle.release();
                return Ok(None);
            }
        };

        if let Err(e) = handle.start(on_finish) {
            warn!(target: LOG_TARGET, item = %key, session, "Player failed to start: {}", e);
            handle.release();
            self.state = SlotState::Idle;
            return Err(e);
        }

        let clock = handle.clock();
        self.player = Some(ActivePlayer {
            handle,
            clock: clock.clone(),
        });
        self.state = SlotState::Playing { key, session };
        info!(target: LOG_TARGET, item = %key, session, "Slot playing");
        Ok(Some(clock))
    }

    /// Releases the player, if any, and returns the slot to `Idle`.
    /// Returns the item that held the slot.
    pub fn stop(&mut self) -> Option<ItemKey> {
        let key = self.active_key();
        if let Some(mut player) = self.player.take() {
            player.handle.release();
        }
        self.state = SlotState::Idle;
        if let Some(key) = key {
            info!(target: LOG_TARGET, item = %key, "Slot stopped");
        }
        key
    }

    /// Natural end of stream for `session`. Ignored if the session has
    /// already been stopped or replaced.
    pub fn finish(&mut self, session: SessionId) -> Option<ItemKey> {
        match self.state {
            SlotState::Playing { session: s, .. } if s == session => self.stop(),
            _ => None,
        }
    }

    /// Moves the player of `key` to `percent` of its duration.
    pub fn seek(&mut self, key: &ItemKey, percent: u8) -> Result<Duration, CoreError> {
        let player = match (self.state, self.player.as_mut()) {
            (SlotState::Playing { key: k, .. }, Some(player)) if k == *key => player,
            _ => return Err(CoreError::invalid(format!("item {} is not playing", key))),
        };
        let duration = player
            .clock
            .duration()
            .filter(|d| !d.is_zero())
            .ok_or_else(|| CoreError::invalid("duration of the playing item is unknown"))?;
        let target = duration.mul_f64(f64::from(percent.min(100)) / 100.0);
        player.handle.seek(target)?;
        debug!(target: LOG_TARGET, item = %key, percent, ?target, "Seeked");
        Ok(target)
    }
}

impl Default for PlaybackSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PlaybackSlot {
    fn drop(&mut self) {
        self.stop();
    }
}
