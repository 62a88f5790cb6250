//! Remote tier transport.
//!
//! The resolver only needs "give me the bytes at this URL"; keeping that
//! behind [`Fetch`] lets the tier logic run in tests without a network.

use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("toolbelt/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("remote file not found")]
    NotFound,
    #[error("{0}")]
    Failed(String),
}

pub trait Fetch {
    /// Download the full body at `url`. Exactly one attempt is made.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

impl<F: Fetch + ?Sized> Fetch for &F {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        (**self).fetch(url)
    }
}

/// Blocking HTTP(S) fetcher backed by `reqwest`.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| FetchError::Failed(format!("building HTTP client: {err}")))?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        tracing::debug!(url, "fetching remote tool source");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| FetchError::Failed(err.to_string()))?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }
        if !status.is_success() {
            return Err(FetchError::Failed(format!("HTTP {status}")));
        }
        let body = response
            .bytes()
            .map_err(|err| FetchError::Failed(format!("reading body: {err}")))?;
        Ok(body.to_vec())
    }
}
