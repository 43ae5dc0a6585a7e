//! Streaming copy from a byte source into a sink.

use crate::download::source::FetchedStream;
use crate::error::DownloadError;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

const LOG_TARGET: &str = "r_medialist::download::pipeline";

pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// `floor(written * 100 / total)`, capped at 100. `None` for an unknown or
/// zero total.
pub fn percent_of(written: u64, total: Option<u64>) -> Option<u8> {
    match total {
        Some(total) if total > 0 => {
            let percent = u128::from(written) * 100 / u128::from(total);
            Some(percent.min(100) as u8)
        }
        _ => None,
    }
}

/// Copies `fetched` into `sink` in reads of at most `chunk_size` bytes.
///
/// `on_progress` is called from this task only, with strictly increasing
/// values below 100 while bytes arrive, and exactly once with 100 after the
/// sink has been flushed. A source without a declared length reports only
/// that final 100. On error or cancellation whatever was written stays in
/// the sink. Returns the number of bytes written.
pub async fn run_download<W, F>(
    fetched: FetchedStream,
    sink: &mut W,
    chunk_size: usize,
    cancel: &CancellationToken,
    mut on_progress: F,
) -> Result<u64, DownloadError>
where
    W: AsyncWrite + Unpin + ?Sized,
    F: FnMut(u8),
{
    let total = fetched.content_length;
    let mut reader = StreamReader::new(fetched.stream);
    let mut buffer = vec![0u8; chunk_size.max(1)];
    let mut written: u64 = 0;
    let mut last_reported: Option<u8> = None;

    loop {
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(target: LOG_TARGET, written, "Download cancelled");
                return Err(DownloadError::Cancelled);
            }
            read = reader.read(&mut buffer) => read.map_err(|e| DownloadError::Unreachable(e.to_string()))?,
        };
        if read == 0 {
            break;
        }
        sink.write_all(&buffer[..read]).await?;
        written += read as u64;

        // 100 is held back until the sink is flushed.
        if let Some(percent) = percent_of(written, total).filter(|p| *p < 100) {
            if last_reported.map_or(true, |last| percent > last) {
                trace!(target: LOG_TARGET, written, percent, "Progress");
                last_reported = Some(percent);
                on_progress(percent);
            }
        }
    }

    sink.flush().await?;
    if let Some(total) = total {
        if written != total {
            debug!(target: LOG_TARGET, written, total, "Source length differed from its declared length");
        }
    }
    info!(target: LOG_TARGET, written, "Download complete");
    on_progress(100);
    Ok(written)
}
