//! The state coordinator: a single task that owns the playback slot, the
//! progress ticker and every in-flight download, and is the only writer of
//! the [`ItemStateStore`].
//!
//! User actions arrive as [`CoordinatorCommand`]s through a
//! [`CoordinatorHandle`]; background work (player preparation, ticks,
//! download progress) posts results back on an internal channel. Both are
//! drained by one loop, so every store mutation happens on one path.

use crate::config::Settings;
use crate::download::{ByteSource, DownloadTask, SinkProvider, DEFAULT_CHUNK_SIZE};
use crate::playback::{PlaybackBackend, PlaybackSlot, ProgressTicker, PROGRESS_UPDATE_INTERVAL};
use crate::store::{ItemKey, ItemStateStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

mod command_handler;
mod download_handler;
mod handle;
mod run_loop;
mod state;

pub use handle::CoordinatorHandle;
pub use state::{CoordinatorCommand, CoordinatorEvent, DownloadOutcome, Notification, PlayOutcome};
pub(crate) use state::InternalEvent;

const COORDINATOR_LOG_TARGET: &str = "r_medialist::coordinator";

/// Tunables for a coordinator instance.
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    pub progress_interval: Duration,
    pub chunk_size: usize,
    pub command_buffer_size: usize,
    pub event_capacity: usize,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            progress_interval: PROGRESS_UPDATE_INTERVAL,
            chunk_size: DEFAULT_CHUNK_SIZE,
            command_buffer_size: 32,
            event_capacity: 256,
        }
    }
}

impl CoordinatorOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            progress_interval: settings.progress_interval(),
            chunk_size: settings.download_chunk_size,
            command_buffer_size: settings.command_buffer_size,
            event_capacity: settings.event_capacity,
        }
    }
}

/// External collaborators the coordinator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub backend: Arc<dyn PlaybackBackend>,
    pub byte_source: Arc<dyn ByteSource>,
    pub sinks: Arc<dyn SinkProvider>,
}

pub struct Coordinator {
    // --- Collaborators ---
    collaborators: Collaborators,
    chunk_size: usize,

    // --- State ---
    store: Arc<ItemStateStore>,
    slot: PlaybackSlot,
    ticker: ProgressTicker,
    downloads: HashMap<ItemKey, DownloadTask>,
    /// Exit signal of the latest task writing each sink name.
    sink_writers: HashMap<String, CancellationToken>,
    next_generation: u64,

    // --- Communication ---
    command_rx: mpsc::Receiver<CoordinatorCommand>,
    internal_tx: mpsc::UnboundedSender<InternalEvent>,
    internal_rx: mpsc::UnboundedReceiver<InternalEvent>,
    event_tx: broadcast::Sender<CoordinatorEvent>,
}

impl Coordinator {
    /// Creates a coordinator over an empty list, and the handle used to
    /// talk to it once it runs.
    pub fn new(collaborators: Collaborators, options: CoordinatorOptions) -> (Self, CoordinatorHandle) {
        let (command_tx, command_rx) = mpsc::channel(options.command_buffer_size.max(1));
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(options.event_capacity.max(1));
        let store = Arc::new(ItemStateStore::new());

        let coordinator = Coordinator {
            collaborators,
            chunk_size: options.chunk_size,
            store: store.clone(),
            slot: PlaybackSlot::new(),
            ticker: ProgressTicker::new(options.progress_interval),
            downloads: HashMap::new(),
            sink_writers: HashMap::new(),
            next_generation: 1,
            command_rx,
            internal_tx,
            internal_rx,
            event_tx: event_tx.clone(),
        };
        let handle = CoordinatorHandle::new(command_tx, event_tx, store);
        (coordinator, handle)
    }

    /// Runs the command loop until `Shutdown` or until every handle is dropped.
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        run_loop::run_coordinator_loop(&mut self).await;
    }

    /// Spawns [`run`](Self::run) on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    fn broadcast(&self, event: CoordinatorEvent) {
        trace!(target: COORDINATOR_LOG_TARGET, "Broadcasting event: {:?}", event);
        if self.event_tx.send(event).is_err() {
            // Normal when nothing is subscribed.
            trace!(target: COORDINATOR_LOG_TARGET, "No active listeners for event");
        }
    }

    fn notify(&self, notification: Notification) {
        debug!(target: COORDINATOR_LOG_TARGET, "Notification: {}", notification);
        self.broadcast(CoordinatorEvent::Notice(notification));
    }

    /// Publishes the current state of `key`, if it is still listed.
    fn item_changed(&self, key: &ItemKey) {
        if let Some(snapshot) = self.store.snapshot(key) {
            self.broadcast(CoordinatorEvent::ItemChanged {
                key: snapshot.key,
                position: snapshot.position,
                state: snapshot.state,
            });
        }
    }

    fn title_of(&self, key: &ItemKey) -> String {
        self.store
            .record(key)
            .map(|r| r.title)
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| key.to_string())
    }

    /// Stops playback and any in-flight downloads.
    fn release_all(&mut self) {
        self.stop_playback();
        self.ticker.stop_all();
        self.cancel_downloads();
    }
}
