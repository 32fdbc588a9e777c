//! Error types for geoharvest.
//!
//! [`FetchError`] covers talking to remote APIs. Only
//! [`FetchError::NotFound`] is recoverable: the hierarchy walk treats it as a
//! dead end. Everything else aborts the run.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("entity {0} not found")]
    NotFound(String),
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound(_))
    }
}

/// Errors that abort building a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("no municipality table found on page {page:?}")]
    MissingTable { page: String },

    #[error("municipality table on page {page:?} yielded zero rows")]
    EmptyTable { page: String },

    #[error("no Wikidata id for row {row:?}")]
    MissingWikidataId { row: String },

    #[error("Wikidata entity {id} required by row {row:?} does not exist")]
    MissingEntity { id: String, row: String },

    #[error("invalid country profile: {0}")]
    Profile(#[from] toml::de::Error),

    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON document {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
