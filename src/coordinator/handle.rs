use super::{CoordinatorCommand, CoordinatorEvent, DownloadOutcome, PlayOutcome, COORDINATOR_LOG_TARGET};
use crate::catalog::CatalogRecord;
use crate::error::CoreError;
use crate::store::{ItemKey, ItemSnapshot, ItemStateStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::debug;

/// Cloneable entry point to a running coordinator.
///
/// Requests are answered once the coordinator has applied them, so any
/// store read made after an awaited call observes its effect. Reads go
/// straight to the shared store and never wait on the coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    command_tx: mpsc::Sender<CoordinatorCommand>,
    event_tx: broadcast::Sender<CoordinatorEvent>,
    store: Arc<ItemStateStore>,
}

impl CoordinatorHandle {
    pub(super) fn new(
        command_tx: mpsc::Sender<CoordinatorCommand>,
        event_tx: broadcast::Sender<CoordinatorEvent>,
        store: Arc<ItemStateStore>,
    ) -> Self {
        Self {
            command_tx,
            event_tx,
            store,
        }
    }

    pub fn store(&self) -> &Arc<ItemStateStore> {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.event_tx.subscribe()
    }

    pub fn snapshot_all(&self) -> Vec<ItemSnapshot> {
        self.store.snapshot_all()
    }

    /// Maps a display position to the item's key.
    pub fn key_at(&self, position: usize) -> Option<ItemKey> {
        self.store.key_at(position)
    }

    async fn send(&self, command: CoordinatorCommand) -> Result<(), CoreError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| CoreError::CoordinatorGone)
    }

    async fn ask<T>(&self, command: CoordinatorCommand, reply: oneshot::Receiver<T>) -> Result<T, CoreError> {
        self.send(command).await?;
        reply.await.map_err(|_| CoreError::CoordinatorGone)
    }

    /// Replaces the list. An empty catalog leaves the current list in place.
    pub async fn load_catalog(&self, records: Vec<CatalogRecord>) -> Result<Vec<ItemKey>, CoreError> {
        let (respond_to, reply) = oneshot::channel();
        self.ask(CoordinatorCommand::LoadCatalog { records, respond_to }, reply).await
    }

    /// Starts playing `key`, or stops it if it is the item already playing.
    pub async fn request_play(&self, key: ItemKey) -> Result<PlayOutcome, CoreError> {
        let (respond_to, reply) = oneshot::channel();
        self.ask(CoordinatorCommand::RequestPlay { key, respond_to }, reply).await?
    }

    /// Returns whether `key` was playing.
    pub async fn request_stop(&self, key: ItemKey) -> Result<bool, CoreError> {
        let (respond_to, reply) = oneshot::channel();
        self.ask(CoordinatorCommand::RequestStop { key, respond_to }, reply).await?
    }

    /// Downloads `key` from its catalog source.
    pub async fn request_download(&self, key: ItemKey) -> Result<DownloadOutcome, CoreError> {
        self.request_download_from(key, None).await
    }

    /// Downloads `key`, optionally from a source other than its catalog one.
    pub async fn request_download_from(
        &self,
        key: ItemKey,
        source_ref: Option<String>,
    ) -> Result<DownloadOutcome, CoreError> {
        let (respond_to, reply) = oneshot::channel();
        self.ask(
            CoordinatorCommand::RequestDownload {
                key,
                source_ref,
                respond_to,
            },
            reply,
        )
        .await?
    }

    /// Moves the playing item to `percent` (0-100) of its duration.
    pub async fn seek(&self, key: ItemKey, percent: i32) -> Result<Duration, CoreError> {
        let (respond_to, reply) = oneshot::channel();
        self.ask(CoordinatorCommand::Seek { key, percent, respond_to }, reply).await?
    }

    /// Stops playback and cancels in-flight downloads.
    pub async fn release_all(&self) -> Result<(), CoreError> {
        let (respond_to, reply) = oneshot::channel();
        self.ask(CoordinatorCommand::ReleaseAll { respond_to }, reply).await
    }

    pub async fn shutdown(&self) {
        if self.send(CoordinatorCommand::Shutdown).await.is_err() {
            debug!(target: COORDINATOR_LOG_TARGET, "Coordinator already stopped");
        }
    }
}
