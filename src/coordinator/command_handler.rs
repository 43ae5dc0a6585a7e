use super::{Coordinator, CoordinatorEvent, InternalEvent, Notification, PlayOutcome, COORDINATOR_LOG_TARGET};
use crate::catalog::CatalogRecord;
use crate::error::{CoreError, PlaybackError};
use crate::playback::{PlayerHandle, SessionId};
use crate::store::ItemKey;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

impl Coordinator {
    /// Source of an item that can be acted on, or `InvalidArgument`.
    pub(super) fn actionable_source(&self, key: &ItemKey) -> Result<String, CoreError> {
        let record = self
            .store
            .record(key)
            .ok_or_else(|| CoreError::invalid(format!("unknown item {}", key)))?;
        if !record.is_actionable() {
            return Err(CoreError::invalid(format!("item {} has no source", key)));
        }
        Ok(record.source_ref.unwrap_or_default())
    }

    /// Stops the ticker and the slot, then clears the playing item's flags.
    /// Returns the item that was playing, if any.
    pub(super) fn stop_playback(&mut self) -> Option<ItemKey> {
        let key = self.slot.active_key()?;
        self.ticker.stop(&key);
        self.slot.stop();
        self.store.set(&key, |state| state.clear_playback());
        self.item_changed(&key);
        Some(key)
    }
}

#[instrument(skip(coordinator), fields(item = %key))]
pub(super) fn handle_request_play(coordinator: &mut Coordinator, key: ItemKey) -> Result<PlayOutcome, CoreError> {
    let source_ref = coordinator.actionable_source(&key)?;

    if coordinator.slot.active_key() == Some(key) {
        info!(target: COORDINATOR_LOG_TARGET, item = %key, "Play requested for the playing item, stopping it");
        coordinator.stop_playback();
        return Ok(PlayOutcome::Stopped);
    }

    // The previous item is fully stopped and its flags cleared before the
    // new one is marked, so no reader ever sees two playing items.
    if let Some(previous) = coordinator.stop_playback() {
        debug!(target: COORDINATOR_LOG_TARGET, previous = %previous, "Stopped previous item");
    }

    let session = coordinator.slot.begin(key);
    coordinator.store.set(&key, |state| state.begin_playback());
    coordinator.item_changed(&key);
    info!(target: COORDINATOR_LOG_TARGET, item = %key, session, "Preparing playback");

    let backend = coordinator.collaborators.backend.clone();
    let internal_tx = coordinator.internal_tx.clone();
    tokio::spawn(async move {
        let result = backend.open(&source_ref).await;
        if internal_tx
            .send(InternalEvent::PlayerPrepared { key, session, result })
            .is_err()
        {
            debug!(target: COORDINATOR_LOG_TARGET, item = %key, "Coordinator gone before player was prepared");
        }
    });

    Ok(PlayOutcome::Preparing)
}

#[instrument(skip(coordinator), fields(item = %key))]
pub(super) fn handle_request_stop(coordinator: &mut Coordinator, key: ItemKey) -> Result<bool, CoreError> {
    if !coordinator.store.contains(&key) {
        return Err(CoreError::invalid(format!("unknown item {}", key)));
    }
    if coordinator.slot.active_key() != Some(key) {
        debug!(target: COORDINATOR_LOG_TARGET, item = %key, "Stop requested for an item that is not playing");
        return Ok(false);
    }
    coordinator.stop_playback();
    info!(target: COORDINATOR_LOG_TARGET, item = %key, "Playback stopped");
    Ok(true)
}

#[instrument(skip(coordinator), fields(item = %key))]
pub(super) fn handle_seek(coordinator: &mut Coordinator, key: ItemKey, percent: i32) -> Result<Duration, CoreError> {
    let percent = u8::try_from(percent)
        .ok()
        .filter(|p| *p <= 100)
        .ok_or_else(|| CoreError::invalid(format!("seek target {} is outside 0..=100", percent)))?;
    if !coordinator.store.contains(&key) {
        return Err(CoreError::invalid(format!("unknown item {}", key)));
    }
    let target = coordinator.slot.seek(&key, percent)?;
    info!(target: COORDINATOR_LOG_TARGET, item = %key, percent, ?target, "Seek requested");
    Ok(target)
}

#[instrument(skip(coordinator, records), fields(count = records.len()))]
pub(super) fn handle_load_catalog(coordinator: &mut Coordinator, records: Vec<CatalogRecord>) -> Vec<ItemKey> {
    if records.is_empty() {
        warn!(target: COORDINATOR_LOG_TARGET, "Catalog is empty, keeping the current list");
        coordinator.notify(Notification::CatalogEmpty);
        return coordinator.store.keys();
    }

    coordinator.release_all();
    let keys = coordinator.store.replace(records);
    info!(target: COORDINATOR_LOG_TARGET, "Loaded {} items", keys.len());
    coordinator.broadcast(CoordinatorEvent::ListReplaced { len: keys.len() });
    keys
}

pub(super) fn handle_release_all(coordinator: &mut Coordinator) {
    info!(target: COORDINATOR_LOG_TARGET, "Releasing playback and downloads");
    coordinator.release_all();
}

/// Installs a prepared player if its session still holds the slot.
#[instrument(skip(coordinator, result), fields(item = %key))]
pub(super) fn handle_player_prepared(
    coordinator: &mut Coordinator,
    key: ItemKey,
    session: SessionId,
    result: Result<Box<dyn PlayerHandle>, PlaybackError>,
) {
    let player = match result {
        Ok(player) => player,
        Err(e) => {
            if coordinator.slot.is_current(session) {
                warn!(target: COORDINATOR_LOG_TARGET, item = %key, "Failed to open player: {}", e);
                coordinator.stop_playback();
                let title = coordinator.title_of(&key);
                coordinator.notify(Notification::PlaybackFailed {
                    title,
                    reason: e.to_string(),
                });
            } else {
                debug!(target: COORDINATOR_LOG_TARGET, item = %key, session, "Ignoring open failure of a stale session: {}", e);
            }
            return;
        }
    };

    let finish_tx = coordinator.internal_tx.clone();
    let on_finish = Box::new(move || {
        let _ = finish_tx.send(InternalEvent::PlaybackFinished { session });
    });

    match coordinator.slot.attach(session, player, on_finish) {
        Ok(Some(clock)) => {
            let tick_tx = coordinator.internal_tx.clone();
            let position_clock = clock.clone();
            coordinator.ticker.start(
                key,
                move || position_clock.position(),
                move || clock.duration(),
                move |key, percent| {
                    let _ = tick_tx.send(InternalEvent::PlaybackTick { key, session, percent });
                },
            );
        }
        Ok(None) => {}
        Err(e) => {
            warn!(target: COORDINATOR_LOG_TARGET, item = %key, "Failed to start player: {}", e);
            // attach already returned the slot to idle.
            coordinator.store.set(&key, |state| state.clear_playback());
            coordinator.item_changed(&key);
            let title = coordinator.title_of(&key);
            coordinator.notify(Notification::PlaybackFailed {
                title,
                reason: e.to_string(),
            });
        }
    }
}

pub(super) fn handle_playback_tick(coordinator: &mut Coordinator, key: ItemKey, session: SessionId, percent: u8) {
    if coordinator.slot.playing_session() != Some(session) {
        return;
    }
    let mut changed = false;
    coordinator
        .store
        .set(&key, |state| changed = state.apply_playback_progress(percent));
    if changed {
        coordinator.item_changed(&key);
    }
}

pub(super) fn handle_playback_finished(coordinator: &mut Coordinator, session: SessionId) {
    let Some(key) = coordinator.slot.finish(session) else {
        debug!(target: COORDINATOR_LOG_TARGET, session, "Ignoring end of stream for a stale session");
        return;
    };
    coordinator.ticker.stop(&key);
    coordinator.store.set(&key, |state| state.clear_playback());
    coordinator.item_changed(&key);
    info!(target: COORDINATOR_LOG_TARGET, item = %key, "Playback finished");
}
