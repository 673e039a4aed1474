//! HTTP transport for SODA endpoints.
//!
//! Everything that talks to the network goes through [`Transport`], so the
//! paginator and schema discovery can be exercised against an in-memory
//! collection in tests.

use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;
use serde_json::Value as JsonValue;

use crate::{
    discover,
    error::{FetchError, FetchResult},
};

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// A blocking GET that returns a parsed JSON body.
///
/// Implementations must treat any non-2xx status as [`FetchError::Status`].
pub trait Transport: Sync {
    fn get_json(&self, url: &str, query: &[(String, String)]) -> FetchResult<JsonValue>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get_json(&self, url: &str, query: &[(String, String)]) -> FetchResult<JsonValue> {
        (**self).get_json(url, query)
    }
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("soda-pull/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get_json(&self, url: &str, query: &[(String, String)]) -> FetchResult<JsonValue> {
        debug!("GET {url} {query:?}");
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let dataset =
                discover::referenced_dataset_id(url).unwrap_or_else(|| "unknown".to_string());
            return Err(FetchError::Status {
                url: url.to_string(),
                dataset,
                status: status.as_u16(),
            });
        }

        response
            .json::<JsonValue>()
            .map_err(|err| FetchError::Decode {
                url: url.to_string(),
                message: err.to_string(),
            })
    }
}
