//! HTTP client for the catalog document

use crate::catalog::models::{CatalogRecord, CatalogResponse};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

const LOG_TARGET: &str = "r_medialist::catalog";

/// Error types for catalog operations
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Unexpected status code {0}")]
    Status(u16),
    #[error("Invalid catalog document: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}

/// Fetches the media list from the configured catalog URL
#[derive(Clone)]
pub struct CatalogClient {
    client: Client,
    catalog_url: String,
}

impl CatalogClient {
    pub fn new(catalog_url: &str, timeout: Duration) -> Self {
        let client = match Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(e) => {
                warn!(target: LOG_TARGET, "Error creating HTTP client with timeout: {}. Falling back to default.", e);
                Client::new()
            }
        };
        Self {
            client,
            catalog_url: catalog_url.to_string(),
        }
    }

    pub fn catalog_url(&self) -> &str {
        &self.catalog_url
    }

    /// Downloads and decodes the catalog, preserving the published order.
    #[instrument(skip(self), fields(url = %self.catalog_url))]
    pub async fn fetch(&self) -> Result<Vec<CatalogRecord>, CatalogError> {
        debug!(target: LOG_TARGET, "Requesting catalog");
        let response = self.client.get(&self.catalog_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(target: LOG_TARGET, "Catalog request failed with status {}", status);
            return Err(CatalogError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        let records = parse_catalog(&body)?;
        info!(target: LOG_TARGET, "Fetched catalog with {} items", records.len());
        Ok(records)
    }
}

/// Decodes a catalog document body.
pub fn parse_catalog(body: &str) -> Result<Vec<CatalogRecord>, CatalogError> {
    let response: CatalogResponse = serde_json::from_str(body)?;
    Ok(response.result_list)
}
