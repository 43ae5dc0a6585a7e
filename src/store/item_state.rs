use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identity of an item, assigned when the list is (re)built.
///
/// Positions shift when the list changes; keys do not. Renderers map a
/// display position to a key with [`crate::store::ItemStateStore::key_at`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey(Uuid);

impl ItemKey {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell items apart in logs.
        let simple = self.0.simple().to_string();
        write!(f, "{}", &simple[..8])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DownloadStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

/// Per-item state. Download fields and playback fields are disjoint: no
/// operation on one group ever touches the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ItemState {
    pub download_status: DownloadStatus,
    /// 0-100. Pinned at 100 once `Completed`.
    pub download_percent: u8,
    pub is_playing: bool,
    /// 0-100. Only meaningful while `is_playing`.
    pub playback_percent: u8,
}

impl ItemState {
    /// Whether a download request for this item would start a pipeline.
    pub fn can_download(&self) -> bool {
        self.download_status == DownloadStatus::NotStarted
    }

    pub fn is_downloaded(&self) -> bool {
        self.download_status == DownloadStatus::Completed
    }

    pub(crate) fn begin_download(&mut self) {
        self.download_status = DownloadStatus::InProgress;
        self.download_percent = 0;
    }

    /// Applies a progress sample. Returns `true` if the state changed.
    ///
    /// Samples are ignored unless the download is in progress, and a sample
    /// lower than the current percent never moves it backwards.
    pub(crate) fn apply_download_progress(&mut self, percent: u8) -> bool {
        if self.download_status != DownloadStatus::InProgress {
            return false;
        }
        if percent >= 100 {
            self.complete_download();
            return true;
        }
        if percent <= self.download_percent {
            return false;
        }
        self.download_percent = percent;
        true
    }

    pub(crate) fn complete_download(&mut self) {
        self.download_status = DownloadStatus::Completed;
        self.download_percent = 100;
    }

    /// Puts a failed or cancelled download back to a restartable state.
    pub(crate) fn reset_download(&mut self) {
        if self.download_status == DownloadStatus::InProgress {
            self.download_status = DownloadStatus::NotStarted;
            self.download_percent = 0;
        }
    }

    pub(crate) fn begin_playback(&mut self) {
        self.is_playing = true;
        self.playback_percent = 0;
    }

    pub(crate) fn apply_playback_progress(&mut self, percent: u8) -> bool {
        if !self.is_playing {
            return false;
        }
        let percent = percent.min(100);
        if self.playback_percent == percent {
            return false;
        }
        self.playback_percent = percent;
        true
    }

    pub(crate) fn clear_playback(&mut self) {
        self.is_playing = false;
        self.playback_percent = 0;
    }
}
