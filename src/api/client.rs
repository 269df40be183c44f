// SPDX-License-Identifier: MIT

//! Booqable API client.
//!
//! Two API generations are in play:
//! - Generation 1 ("legacy"): query-string pagination (`page`, `per`) and the
//!   API key passed as a query parameter.
//! - Generation 4 ("structured"): bearer-token auth, JSON:API media type,
//!   `page[number]`/`page[size]` pagination, compound documents with an
//!   `included` array.
//!
//! All requests carry a timeout so a stalled connection surfaces as an error
//! instead of hanging a scan.

use crate::error::{AppError, Result};
use serde_json::Value;
use std::time::Duration;

/// Default per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Timeout for single-order compound-document fetches, which resolve every
/// line and item and can run much longer than a list page.
const ORDER_INCLUDE_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON:API media type used by generation 4.
const JSON_API_MEDIA_TYPE: &str = "application/vnd.api+json";

/// Which pagination convention to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Generation 1: `page` / `per`.
    Legacy,
    /// Generation 4: `page[number]` / `page[size]`.
    Structured,
}

/// Booqable API client for a single tenant.
#[derive(Clone)]
pub struct BooqableClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl BooqableClient {
    /// Create a client for the given tenant slug and (normalized) API key.
    pub fn new(tenant_slug: &str, api_key: &str) -> Self {
        Self::with_base_url(format!("https://{tenant_slug}.booqable.com/api"), api_key)
    }

    /// Create a client against an explicit base URL (tests point this at a
    /// mock server).
    pub fn with_base_url(base_url: impl Into<String>, api_key: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.to_string(),
        }
    }

    /// Fetch one page of a paginated resource using the given dialect.
    pub async fn fetch_page(
        &self,
        resource: &str,
        dialect: Dialect,
        page: u32,
        page_size: u32,
        extra_query: &[(String, String)],
    ) -> Result<Value> {
        let response = match dialect {
            Dialect::Legacy => {
                let url = format!("{}/1/{}", self.base_url, resource);
                self.http
                    .get(&url)
                    .query(&[("api_key", self.api_key.as_str())])
                    .query(&[("page", page.to_string()), ("per", page_size.to_string())])
                    .query(extra_query)
                    .send()
                    .await?
            }
            Dialect::Structured => {
                let url = format!("{}/4/{}", self.base_url, resource);
                self.http
                    .get(&url)
                    .bearer_auth(&self.api_key)
                    .header(reqwest::header::ACCEPT, JSON_API_MEDIA_TYPE)
                    .query(&[
                        ("page[number]", page.to_string()),
                        ("page[size]", page_size.to_string()),
                    ])
                    .query(extra_query)
                    .send()
                    .await?
            }
        };

        self.check_response_json(response).await
    }

    /// Fetch a single generation-4 order with its lines side-loaded.
    pub async fn fetch_order_with_lines(&self, order_id: &str) -> Result<Value> {
        let url = format!("{}/4/orders/{}", self.base_url, order_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, JSON_API_MEDIA_TYPE)
            .query(&[("include", "lines.item")])
            .timeout(ORDER_INCLUDE_TIMEOUT)
            .send()
            .await?;

        self.check_response_json(response).await
    }

    /// Download a binary resource (product photo) with a longer timeout.
    pub async fn fetch_blob(&self, url: &str, timeout: Duration) -> Result<Vec<u8>> {
        let response = self.http.get(url).timeout(timeout).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Api {
                status: response.status().as_u16(),
                body: String::new(),
                retry_after: None,
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Cheap connectivity probe: one record from the legacy orders endpoint.
    pub async fn test_connection(&self) -> bool {
        self.fetch_page("orders", Dialect::Legacy, 1, 1, &[])
            .await
            .is_ok()
    }

    /// Check status and parse the JSON body. Non-2xx statuses become
    /// [`AppError::Api`]; 429 responses carry the parsed `Retry-After`.
    async fn check_response_json(&self, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            let retry_after = if status.as_u16() == 429 {
                let secs = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok());
                tracing::warn!(retry_after_secs = secs, "Booqable rate limit hit (429)");
                secs.map(Duration::from_secs)
            } else {
                None
            };

            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Api {
                status: status.as_u16(),
                body,
                retry_after,
            });
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("JSON parse error: {e}")))
    }
}
