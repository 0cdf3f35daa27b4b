//! Lifecycle API client for endoflife.date (v1).
//!
//! Two read-only endpoints are consumed:
//! - `GET {base}/products/{product}/releases/{version}`: one release cycle
//! - `GET {base}/products/{product}`: product-level details
//!
//! Both wrap their payload in `{"schema_version": ..., "result": {...}}`.
//! The client never retries; the scheduler's next tick does.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

pub mod date;

/// Public endoflife.date API root.
pub const DEFAULT_BASE_URL: &str = "https://endoflife.date/api/v1";

// ── Wire Types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: T,
}

/// A release cycle exactly as the service returns it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCycle {
    pub name: String,
    #[serde(default)]
    pub codename: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(deserialize_with = "date::required")]
    pub release_date: NaiveDate,
    pub is_lts: bool,
    #[serde(default, deserialize_with = "date::optional")]
    pub lts_from: Option<NaiveDate>,
    #[serde(default)]
    pub is_eoas: Option<bool>,
    #[serde(default, deserialize_with = "date::optional")]
    pub eoas_from: Option<NaiveDate>,
    pub is_eol: bool,
    #[serde(default, deserialize_with = "date::optional")]
    pub eol_from: Option<NaiveDate>,
    #[serde(default)]
    pub is_eoes: Option<bool>,
    #[serde(default, deserialize_with = "date::optional")]
    pub eoes_from: Option<NaiveDate>,
    pub is_maintained: bool,
    #[serde(default)]
    pub latest: Option<RawLatest>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawLatest {
    pub name: String,
    #[serde(default, deserialize_with = "date::optional")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub link: Option<String>,
}

/// Product details as the service returns them. The `releases` array and
/// the other catalogue fields are not consumed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDetails {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub version_command: Option<String>,
    #[serde(default)]
    pub links: Option<RawLinks>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLinks {
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub release_policy: Option<String>,
}

// ── Source Trait ────────────────────────────────────────────────────

/// Anything that can answer the two lifecycle lookups.
///
/// The scheduler only sees this trait, so refresh logic can be exercised
/// against an in-memory source.
#[async_trait]
pub trait LifecycleSource: Send + Sync {
    /// Fetch one release cycle of `product`.
    async fn fetch_cycle(&self, product: &str, version: &str) -> Result<RawCycle>;

    /// Fetch the product-level details of `product`.
    async fn fetch_details(&self, product: &str) -> Result<RawDetails>;
}

// ── HTTP Client ─────────────────────────────────────────────────────

pub struct LifecycleClient {
    client: reqwest::Client,
    base_url: String,
}

impl LifecycleClient {
    /// Client against the public service. `client` carries the caller's
    /// timeout and TLS settings.
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cycle_url(&self, product: &str, version: &str) -> String {
        format!("{}/products/{}/releases/{}", self.base_url, product, version)
    }

    pub fn details_url(&self, product: &str) -> String {
        format!("{}/products/{}", self.base_url, product)
    }

    async fn get_result<T: DeserializeOwned>(&self, url: String) -> Result<T> {
        debug!(url = %url, "Requesting lifecycle data");

        let resp = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => return Err(Error::FetchFailed { url, cause: e.to_string() }),
        };

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::FetchFailed {
                url,
                cause: format!("unexpected status {}", status.as_u16()),
            });
        }

        let body = match resp.bytes().await {
            Ok(b) => b,
            Err(e) => return Err(Error::FetchFailed { url, cause: e.to_string() }),
        };

        match serde_json::from_slice::<Envelope<T>>(&body) {
            Ok(envelope) => Ok(envelope.result),
            Err(e) => Err(Error::DecodeFailed { url, cause: e.to_string() }),
        }
    }
}

#[async_trait]
impl LifecycleSource for LifecycleClient {
    async fn fetch_cycle(&self, product: &str, version: &str) -> Result<RawCycle> {
        let url = self.cycle_url(product, version);
        check_segment(&url, "product", product)?;
        check_segment(&url, "version", version)?;
        self.get_result(url).await
    }

    async fn fetch_details(&self, product: &str) -> Result<RawDetails> {
        let url = self.details_url(product);
        check_segment(&url, "product", product)?;
        self.get_result(url).await
    }
}

/// Path segments must be non-empty and must not escape their position,
/// either as a dot segment or through URL syntax characters.
fn check_segment(url: &str, what: &str, value: &str) -> Result<()> {
    let escapes = matches!(value, "." | "..")
        || value
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '/' | '\\' | '?' | '#' | '%'));
    if value.is_empty() || escapes {
        return Err(Error::FetchFailed {
            url: url.to_string(),
            cause: format!("invalid request: bad {what} {value:?}"),
        });
    }
    Ok(())
}
