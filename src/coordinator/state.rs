use crate::catalog::CatalogRecord;
use crate::download::DownloadUpdate;
use crate::error::{CoreError, PlaybackError};
use crate::playback::{PlayerHandle, SessionId};
use crate::store::{ItemKey, ItemState};
use std::fmt;
use std::time::Duration;
use tokio::sync::oneshot;

pub type Responder<T> = oneshot::Sender<Result<T, CoreError>>;

/// Commands that can be sent to the coordinator task.
#[derive(Debug)]
pub enum CoordinatorCommand {
    LoadCatalog {
        records: Vec<CatalogRecord>,
        respond_to: oneshot::Sender<Vec<ItemKey>>,
    },
    RequestPlay {
        key: ItemKey,
        respond_to: Responder<PlayOutcome>,
    },
    RequestStop {
        key: ItemKey,
        respond_to: Responder<bool>,
    },
    RequestDownload {
        key: ItemKey,
        /// Overrides the catalog record's source when present.
        source_ref: Option<String>,
        respond_to: Responder<DownloadOutcome>,
    },
    Seek {
        key: ItemKey,
        percent: i32,
        respond_to: Responder<Duration>,
    },
    ReleaseAll {
        respond_to: oneshot::Sender<()>,
    },
    Shutdown,
}

/// What a play request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// The item now holds the slot; its player is being opened.
    Preparing,
    /// The item was already playing and has been stopped.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Started,
    AlreadyInProgress,
    AlreadyCompleted,
}

/// One-shot messages meant for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    DownloadStarted { title: String },
    DownloadSucceeded { title: String, location: String },
    DownloadFailed { title: String, reason: String },
    PlaybackFailed { title: String, reason: String },
    CatalogEmpty,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::DownloadStarted { title } => write!(f, "Downloading {}", title),
            Notification::DownloadSucceeded { title, location } => {
                write!(f, "Downloaded {} to {}", title, location)
            }
            Notification::DownloadFailed { title, reason } => {
                write!(f, "Download of {} failed: {}", title, reason)
            }
            Notification::PlaybackFailed { title, reason } => {
                write!(f, "Cannot play {}: {}", title, reason)
            }
            Notification::CatalogEmpty => write!(f, "No music data"),
        }
    }
}

/// Updates broadcast by the coordinator. On `ItemChanged` a renderer redraws
/// that row; the carried state is the value right after the change.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorEvent {
    ItemChanged {
        key: ItemKey,
        position: usize,
        state: ItemState,
    },
    ListReplaced {
        len: usize,
    },
    Notice(Notification),
}

/// Results posted back to the control path by background work.
pub(crate) enum InternalEvent {
    PlayerPrepared {
        key: ItemKey,
        session: SessionId,
        result: Result<Box<dyn PlayerHandle>, PlaybackError>,
    },
    PlaybackTick {
        key: ItemKey,
        session: SessionId,
        percent: u8,
    },
    PlaybackFinished {
        session: SessionId,
    },
    Download {
        key: ItemKey,
        generation: u64,
        update: DownloadUpdate,
    },
}

impl fmt::Debug for InternalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InternalEvent::PlayerPrepared { key, session, result } => f
                .debug_struct("PlayerPrepared")
                .field("key", key)
                .field("session", session)
                .field("ok", &result.is_ok())
                .finish(),
            InternalEvent::PlaybackTick { key, session, percent } => f
                .debug_struct("PlaybackTick")
                .field("key", key)
                .field("session", session)
                .field("percent", percent)
                .finish(),
            InternalEvent::PlaybackFinished { session } => {
                f.debug_struct("PlaybackFinished").field("session", session).finish()
            }
            InternalEvent::Download { key, generation, update } => f
                .debug_struct("Download")
                .field("key", key)
                .field("generation", generation)
                .field("update", update)
                .finish(),
        }
    }
}
