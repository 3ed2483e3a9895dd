//! Error taxonomy for a refresh cycle.
//!
//! Only retrieval and parsing can fail. Projection never does: absent
//! fields degrade to [`Value::Missing`](crate::record::Value::Missing).

use thiserror::Error;

/// A source could not be retrieved.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid source url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request to {url} failed: {cause}")]
    Transport {
        url: String,
        #[source]
        cause: reqwest::Error,
    },

    #[error("{url} responded with {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

impl FetchError {
    /// The source identifier the failure belongs to.
    pub fn url(&self) -> &str {
        match self {
            FetchError::InvalidUrl { url, .. }
            | FetchError::Transport { url, .. }
            | FetchError::Status { url, .. } => url,
        }
    }
}

/// A source body was retrieved but is not readable tabular text.
#[derive(Debug, Error)]
#[error("malformed csv from {url}: {cause}")]
pub struct ParseError {
    pub url: String,
    #[source]
    pub cause: csv::Error,
}

/// Everything a single cycle can fail with.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl PipelineError {
    pub fn url(&self) -> &str {
        match self {
            PipelineError::Fetch(e) => e.url(),
            PipelineError::Parse(e) => &e.url,
        }
    }
}
