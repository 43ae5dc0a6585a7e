use super::{Coordinator, DownloadOutcome, InternalEvent, Notification, COORDINATOR_LOG_TARGET};
use crate::download::{sink_file_name, spawn_download, DownloadJob, DownloadUpdate};
use crate::error::{CoreError, DownloadError};
use crate::store::{DownloadStatus, ItemKey};
use tracing::{debug, info, instrument, warn};

impl Coordinator {
    /// Cancels every in-flight download and puts its item back to
    /// `NotStarted`. Their final updates arrive later and are ignored.
    pub(super) fn cancel_downloads(&mut self) {
        for (key, task) in self.downloads.drain().collect::<Vec<_>>() {
            task.cancel();
            self.store.set(&key, |state| state.reset_download());
            self.item_changed(&key);
        }
    }
}

#[instrument(skip(coordinator, source_override), fields(item = %key))]
pub(super) fn handle_request_download(
    coordinator: &mut Coordinator,
    key: ItemKey,
    source_override: Option<String>,
) -> Result<DownloadOutcome, CoreError> {
    let source_ref = match source_override.filter(|s| !s.trim().is_empty()) {
        Some(source_ref) if coordinator.store.contains(&key) => source_ref,
        Some(_) => return Err(CoreError::invalid(format!("unknown item {}", key))),
        None => coordinator.actionable_source(&key)?,
    };

    let state = coordinator
        .store
        .get(&key)
        .ok_or_else(|| CoreError::invalid(format!("unknown item {}", key)))?;
    match state.download_status {
        DownloadStatus::InProgress => {
            debug!(target: COORDINATOR_LOG_TARGET, item = %key, "Download already in progress");
            return Ok(DownloadOutcome::AlreadyInProgress);
        }
        DownloadStatus::Completed => {
            debug!(target: COORDINATOR_LOG_TARGET, item = %key, "Download already completed");
            return Ok(DownloadOutcome::AlreadyCompleted);
        }
        DownloadStatus::NotStarted => {}
    }

    let generation = coordinator.next_generation;
    coordinator.next_generation += 1;
    coordinator.store.set(&key, |state| state.begin_download());
    coordinator.item_changed(&key);

    let title = coordinator.title_of(&key);
    let sink_name = sink_file_name(&title, &key);
    // A cancelled or concurrent writer of the same sink may still be
    // draining; the new task opens the sink only after it exits.
    coordinator.sink_writers.retain(|_, exited| !exited.is_cancelled());
    let after = coordinator.sink_writers.get(&sink_name).cloned();
    if after.is_some() {
        debug!(target: COORDINATOR_LOG_TARGET, item = %key, "Waiting for the previous writer of {}", sink_name);
    }
    let job = DownloadJob {
        key,
        generation,
        source_ref,
        sink_name,
        chunk_size: coordinator.chunk_size,
        after,
    };
    info!(target: COORDINATOR_LOG_TARGET, item = %key, generation, "Starting download to {}", job.sink_name);
    let sink_name = job.sink_name.clone();

    let internal_tx = coordinator.internal_tx.clone();
    let task = spawn_download(
        job,
        coordinator.collaborators.byte_source.clone(),
        coordinator.collaborators.sinks.clone(),
        move |update| {
            let _ = internal_tx.send(InternalEvent::Download { key, generation, update });
        },
    );
    coordinator.sink_writers.insert(sink_name, task.exit_signal());
    coordinator.downloads.insert(key, task);
    coordinator.notify(Notification::DownloadStarted { title });
    Ok(DownloadOutcome::Started)
}

pub(super) fn handle_download_update(
    coordinator: &mut Coordinator,
    key: ItemKey,
    generation: u64,
    update: DownloadUpdate,
) {
    let current = coordinator.downloads.get(&key).map(|task| task.generation());
    if current != Some(generation) {
        debug!(target: COORDINATOR_LOG_TARGET, item = %key, generation, "Ignoring update from a superseded download");
        return;
    }

    match update {
        DownloadUpdate::Progress(percent) => {
            let mut changed = false;
            coordinator
                .store
                .set(&key, |state| changed = state.apply_download_progress(percent));
            if changed {
                coordinator.item_changed(&key);
            }
        }
        DownloadUpdate::Finished(result) => {
            coordinator.downloads.remove(&key);
            let title = coordinator.title_of(&key);
            match result {
                Ok(report) => {
                    // Success forces completion even without a final 100 sample.
                    let mut changed = false;
                    coordinator.store.set(&key, |state| {
                        changed = !state.is_downloaded();
                        state.complete_download();
                    });
                    if changed {
                        coordinator.item_changed(&key);
                    }
                    info!(target: COORDINATOR_LOG_TARGET, item = %key, bytes = report.bytes, "Download completed");
                    coordinator.notify(Notification::DownloadSucceeded {
                        title,
                        location: report.location,
                    });
                }
                Err(DownloadError::Cancelled) => {
                    coordinator.store.set(&key, |state| state.reset_download());
                    coordinator.item_changed(&key);
                }
                Err(e) => {
                    warn!(target: COORDINATOR_LOG_TARGET, item = %key, "Download failed: {}", e);
                    coordinator.store.set(&key, |state| state.reset_download());
                    coordinator.item_changed(&key);
                    coordinator.notify(Notification::DownloadFailed {
                        title,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
}
