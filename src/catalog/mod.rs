//! Catalog of media items fetched from a remote JSON document

pub mod client;
pub mod models;

pub use client::*;
pub use models::*;
