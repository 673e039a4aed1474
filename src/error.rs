//! Fatal fetch errors.
//!
//! Soft data-quality conditions (unparseable dates, absent filter columns,
//! schema drift) never surface here; they degrade to empty or pass-through
//! results in the transform modules.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url} (dataset {dataset})")]
    Status {
        url: String,
        dataset: String,
        status: u16,
    },

    /// The request never produced a response (connect failure, timeout).
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The response body was not the JSON shape the endpoint promises.
    #[error("unexpected response body from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("cannot derive metadata endpoint from '{url}'")]
    InvalidUrl { url: String },
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;
