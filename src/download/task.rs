//! Background task wrapping one item's download.

use crate::download::pipeline::run_download;
use crate::download::sink::SinkProvider;
use crate::download::source::ByteSource;
use crate::error::DownloadError;
use crate::store::ItemKey;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

const LOG_TARGET: &str = "r_medialist::download::task";

/// Everything a download needs, captured when it is accepted.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub key: ItemKey,
    /// Distinguishes this run from earlier runs of the same item.
    pub generation: u64,
    pub source_ref: String,
    pub sink_name: String,
    pub chunk_size: usize,
    /// Exit signal of the previous writer of `sink_name`. The sink is not
    /// opened until that task has exited.
    pub after: Option<CancellationToken>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub location: String,
    pub bytes: u64,
}

#[derive(Debug)]
pub enum DownloadUpdate {
    Progress(u8),
    Finished(Result<DownloadReport, DownloadError>),
}

/// Handle to a running download, owned by the coordinator.
#[derive(Debug)]
pub struct DownloadTask {
    key: ItemKey,
    generation: u64,
    cancel: CancellationToken,
    exited: CancellationToken,
}

impl DownloadTask {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Cancelled once the task has exited and dropped its sink, after its
    /// `Finished` update was sent.
    pub fn exit_signal(&self) -> CancellationToken {
        self.exited.clone()
    }

    /// Requests cancellation. The task reports `Finished(Err(Cancelled))`
    /// unless it had already completed.
    pub fn cancel(&self) {
        debug!(target: LOG_TARGET, item = %self.key, generation = self.generation, "Cancelling download");
        self.cancel.cancel();
    }
}

/// Spawns the fetch, sink creation and copy for `job`.
///
/// Every update goes through `on_update`; the last one is always
/// `Finished`, whatever the outcome.
#[instrument(skip(source, sinks, on_update), fields(item = %job.key, generation = job.generation))]
pub fn spawn_download<U>(
    job: DownloadJob,
    source: Arc<dyn ByteSource>,
    sinks: Arc<dyn SinkProvider>,
    on_update: U,
) -> DownloadTask
where
    U: Fn(DownloadUpdate) + Send + Sync + 'static,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let exited = CancellationToken::new();
    let exit_guard = exited.clone().drop_guard();
    let key = job.key;
    let generation = job.generation;

    info!(target: LOG_TARGET, item = %key, "Spawning download of {}", job.source_ref);
    tokio::spawn(async move {
        let _exit_guard = exit_guard;
        let result = execute(&job, source.as_ref(), sinks.as_ref(), &token, &on_update).await;
        match &result {
            Ok(report) => info!(target: LOG_TARGET, item = %job.key, bytes = report.bytes, "Saved to {}", report.location),
            Err(DownloadError::Cancelled) => info!(target: LOG_TARGET, item = %job.key, "Download cancelled"),
            Err(e) => warn!(target: LOG_TARGET, item = %job.key, "Download failed: {}", e),
        }
        on_update(DownloadUpdate::Finished(result));
    });

    DownloadTask {
        key,
        generation,
        cancel,
        exited,
    }
}

async fn execute<U>(
    job: &DownloadJob,
    source: &dyn ByteSource,
    sinks: &dyn SinkProvider,
    cancel: &CancellationToken,
    on_update: &U,
) -> Result<DownloadReport, DownloadError>
where
    U: Fn(DownloadUpdate),
{
    if let Some(previous) = &job.after {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
            _ = previous.cancelled() => {}
        }
    }
    let fetched = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
        fetched = source.fetch(&job.source_ref) => fetched?,
    };
    let mut target = sinks.create(&job.sink_name).await?;
    let copied = run_download(fetched, &mut target.writer, job.chunk_size, cancel, |percent| {
        on_update(DownloadUpdate::Progress(percent))
    })
    .await;
    if copied.is_err() {
        // Writes still in flight land before the task signals its exit.
        if let Err(e) = target.writer.flush().await {
            debug!(target: LOG_TARGET, item = %job.key, "Flush of abandoned sink failed: {}", e);
        }
    }
    let bytes = copied?;
    Ok(DownloadReport {
        location: target.location,
        bytes,
    })
}
