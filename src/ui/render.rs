//! Rendering of the list and live download bars.

use crate::coordinator::CoordinatorEvent;
use crate::store::{DownloadStatus, ItemKey, ItemSnapshot, ItemStateStore};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use tracing::warn;

const LOG_TARGET: &str = "r_medialist::ui::render";
const TITLE_WIDTH: usize = 30;

fn fit_title(title: &str) -> String {
    if title.chars().count() > TITLE_WIDTH - 2 {
        let cut = title.chars().take(TITLE_WIDTH - 5).collect::<String>();
        format!("{}...", cut)
    } else {
        title.to_string()
    }
}

fn download_column(snapshot: &ItemSnapshot) -> String {
    if !snapshot.record.is_actionable() {
        return "unavailable".to_string();
    }
    match snapshot.state.download_status {
        DownloadStatus::NotStarted => "-".to_string(),
        DownloadStatus::InProgress => format!("{}%", snapshot.state.download_percent),
        DownloadStatus::Completed => "saved".to_string(),
    }
}

fn playback_column(snapshot: &ItemSnapshot) -> String {
    if snapshot.state.is_playing {
        format!("playing {}%", snapshot.state.playback_percent)
    } else {
        String::new()
    }
}

/// One table row; numbers are shown 1-based.
pub fn format_row(snapshot: &ItemSnapshot) -> String {
    format!(
        "{:<5} {:<30} {:<12} {}",
        snapshot.position + 1,
        fit_title(&snapshot.record.title),
        download_column(snapshot),
        playback_column(snapshot)
    )
    .trim_end()
    .to_string()
}

pub fn format_list(snapshots: &[ItemSnapshot]) -> String {
    if snapshots.is_empty() {
        return "No items.".to_string();
    }
    let mut out = format!("{:<5} {:<30} {:<12} {}\n", "#", "Title", "Download", "Playback");
    out.push_str(&"-".repeat(60));
    for snapshot in snapshots {
        out.push('\n');
        out.push_str(&format_row(snapshot));
    }
    out
}

/// Keeps one progress bar per running download, driven by coordinator
/// events. Every redraw re-reads the store rather than trusting the event.
pub struct ProgressBoard {
    multi: MultiProgress,
    bars: HashMap<ItemKey, ProgressBar>,
}

impl ProgressBoard {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stdout())
    }

    /// A board that draws nowhere, for tests.
    pub fn hidden() -> Self {
        Self::with_draw_target(ProgressDrawTarget::hidden())
    }

    fn with_draw_target(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: HashMap::new(),
        }
    }

    pub fn active_bars(&self) -> usize {
        self.bars.len()
    }

    pub fn bar_position(&self, key: &ItemKey) -> Option<u64> {
        self.bars.get(key).map(|bar| bar.position())
    }

    /// Prints above the bars.
    pub fn println(&self, line: impl AsRef<str>) {
        if self.multi.println(line.as_ref()).is_err() {
            println!("{}", line.as_ref());
        }
    }

    fn bar_for(&mut self, key: ItemKey, title: &str) -> &ProgressBar {
        let multi = &self.multi;
        self.bars.entry(key).or_insert_with(|| {
            let bar = multi.add(ProgressBar::new(100));
            match ProgressStyle::default_bar().template("{msg:30} [{bar:40.cyan/blue}] {pos:>3}%") {
                Ok(style) => bar.set_style(style.progress_chars("=> ")),
                Err(e) => warn!(target: LOG_TARGET, "Invalid progress template: {}", e),
            }
            bar.set_message(fit_title(title));
            bar
        })
    }

    pub fn apply(&mut self, event: &CoordinatorEvent, store: &ItemStateStore) {
        match event {
            CoordinatorEvent::ItemChanged { key, .. } => {
                let Some(snapshot) = store.snapshot(key) else {
                    return;
                };
                match snapshot.state.download_status {
                    DownloadStatus::InProgress => {
                        let percent = u64::from(snapshot.state.download_percent);
                        self.bar_for(*key, &snapshot.record.title).set_position(percent);
                    }
                    DownloadStatus::Completed => {
                        if let Some(bar) = self.bars.remove(key) {
                            bar.set_position(100);
                            bar.finish();
                        }
                    }
                    DownloadStatus::NotStarted => {
                        if let Some(bar) = self.bars.remove(key) {
                            bar.abandon();
                        }
                    }
                }
            }
            CoordinatorEvent::ListReplaced { len } => {
                for (_, bar) in self.bars.drain() {
                    bar.abandon();
                }
                self.println(format!("Loaded {} items", len));
            }
            CoordinatorEvent::Notice(notification) => self.println(notification.to_string()),
        }
    }
}

impl Default for ProgressBoard {
    fn default() -> Self {
        Self::new()
    }
}
