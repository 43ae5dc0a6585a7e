//! Readable byte streams with an optional content length.

use crate::error::DownloadError;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{Stream, TryStreamExt};
use reqwest::Client;
use std::io;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const LOG_TARGET: &str = "r_medialist::download::source";

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, io::Error>> + Send>>;

/// An opened source, ready to be streamed.
pub struct FetchedStream {
    /// Total length in bytes, when the source declares one.
    pub content_length: Option<u64>,
    pub stream: ByteStream,
}

impl std::fmt::Debug for FetchedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedStream")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// The "fetch readable byte stream" capability the pipeline consumes.
#[async_trait]
pub trait ByteSource: Send + Sync {
    async fn fetch(&self, source_ref: &str) -> Result<FetchedStream, DownloadError>;
}

/// [`ByteSource`] over HTTP(S) using reqwest.
#[derive(Clone)]
pub struct HttpByteSource {
    client: Client,
}

impl HttpByteSource {
    pub fn new(timeout: Duration) -> Self {
        // The timeout bounds connecting only; a long body may take longer.
        let client = match Client::builder().connect_timeout(timeout).build() {
            Ok(client) => client,
            Err(e) => {
                warn!(target: LOG_TARGET, "Error creating HTTP client with timeout: {}. Falling back to default.", e);
                Client::new()
            }
        };
        Self { client }
    }
}

#[async_trait]
impl ByteSource for HttpByteSource {
    #[instrument(skip(self))]
    async fn fetch(&self, source_ref: &str) -> Result<FetchedStream, DownloadError> {
        let response = self
            .client
            .get(source_ref)
            .send()
            .await
            .map_err(|e| DownloadError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(target: LOG_TARGET, "Source {} returned status {}", source_ref, status);
            return Err(DownloadError::Status(status.as_u16()));
        }

        let content_length = response.content_length();
        debug!(target: LOG_TARGET, "Fetched {} (content length {:?})", source_ref, content_length);
        let stream = response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
        Ok(FetchedStream {
            content_length,
            stream: Box::pin(stream),
        })
    }
}
