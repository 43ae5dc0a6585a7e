//! Error taxonomy shared by the coordinator and its collaborators.

use std::io;
use symphonia::core::errors::Error as SymphoniaError;
use thiserror::Error;

/// Failures opening, decoding or driving a player resource.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Cannot open source: {0}")]
    Open(String),
    #[error("Decoding error: {0}")]
    Decode(String),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Seek failed: {0}")]
    Seek(String),
}

impl From<SymphoniaError> for PlaybackError {
    fn from(e: SymphoniaError) -> Self {
        PlaybackError::Decode(e.to_string())
    }
}

/// Failures of the download pipeline.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Source unreachable: {0}")]
    Unreachable(String),
    #[error("Unexpected response status {0}")]
    Status(u16),
    #[error("Sink write failed: {0}")]
    Sink(#[from] io::Error),
    #[error("Download cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for DownloadError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => DownloadError::Status(status.as_u16()),
            None => DownloadError::Unreachable(e.to_string()),
        }
    }
}

/// Top-level error returned to callers of the coordinator.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),
    #[error("Download error: {0}")]
    Download(#[from] DownloadError),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Coordinator is no longer running")]
    CoordinatorGone,
}

impl CoreError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        CoreError::InvalidArgument(msg.into())
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, CoreError::InvalidArgument(_))
    }
}
