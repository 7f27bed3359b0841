//! Upstream fetch: one network read of a bus's current document.

use crate::{BusId, Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Fixed timeout for one upstream request. Exceeding it is a fetch failure,
/// not a crash.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of per-bus documents.
///
/// The trait is the seam between the cache and the network: production uses
/// [`UpstreamClient`], tests substitute stubs.
#[async_trait]
pub trait FetchBusData: Send + Sync {
    /// Fetch the bus's current document from the upstream store.
    async fn fetch(&self, bus: &BusId) -> Result<Value>;
}

/// Reqwest-backed client for a key-addressed JSON store
/// (`GET <base>/{busId}.json`).
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
}

impl UpstreamClient {
    /// Build a client for the given store root. Trailing slashes on the base
    /// URL are ignored.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    /// The store root this client reads from.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl FetchBusData for UpstreamClient {
    async fn fetch(&self, bus: &BusId) -> Result<Value> {
        let url = format!("{}/{}.json", self.base_url, bus);
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(Error::UpstreamStatus {
                status: resp.status().as_u16(),
            });
        }
        Ok(resp.json().await?)
    }
}
