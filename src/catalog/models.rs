//! Data models for the catalog document

use serde::{Deserialize, Serialize};

/// One entry of the media list as published by the catalog
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct CatalogRecord {
    #[serde(rename = "SongName", default)]
    pub title: String,
    #[serde(rename = "imageURL", default)]
    pub image_ref: Option<String>,
    #[serde(rename = "SongURL", default)]
    pub source_ref: Option<String>,
}

impl CatalogRecord {
    pub fn new(title: impl Into<String>, source_ref: Option<&str>) -> Self {
        Self {
            title: title.into(),
            image_ref: None,
            source_ref: source_ref.map(str::to_string),
        }
    }

    /// Items without a source can neither be played nor downloaded.
    pub fn is_actionable(&self) -> bool {
        self.source_ref
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Top-level catalog document
#[derive(Deserialize, Serialize, Debug)]
pub struct CatalogResponse {
    #[serde(rename = "resultList", default)]
    pub result_list: Vec<CatalogRecord>,
}
