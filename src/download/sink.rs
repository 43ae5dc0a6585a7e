//! Local destinations for downloaded bytes.

use crate::store::ItemKey;
use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use tokio::fs::{self, File};
use tokio::io::AsyncWrite;
use tracing::debug;

const LOG_TARGET: &str = "r_medialist::download::sink";

/// An opened destination and where it lives, for user-facing messages.
pub struct SinkTarget {
    pub location: String,
    pub writer: Box<dyn AsyncWrite + Send + Unpin>,
}

#[async_trait]
pub trait SinkProvider: Send + Sync {
    /// Creates (or truncates) the destination called `name`.
    async fn create(&self, name: &str) -> io::Result<SinkTarget>;
}

/// Writes each download to a file named after the item under one directory.
#[derive(Debug, Clone)]
pub struct FileSinkProvider {
    dir: PathBuf,
}

impl FileSinkProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

#[async_trait]
impl SinkProvider for FileSinkProvider {
    async fn create(&self, name: &str) -> io::Result<SinkTarget> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(name);
        let file = File::create(&path).await?;
        debug!(target: LOG_TARGET, "Created sink {}", path.display());
        Ok(SinkTarget {
            location: path.display().to_string(),
            writer: Box::new(file),
        })
    }
}

/// File name for an item's download: its title with path separators
/// replaced, or the item key when the title is blank or a dot entry.
pub fn sink_file_name(title: &str, key: &ItemKey) -> String {
    let trimmed = title.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        return key.to_string();
    }
    trimmed.replace(['/', '\\'], "_")
}
