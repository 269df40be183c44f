// SPDX-License-Identifier: MIT

//! The paginated fetch engine.
//!
//! Drives repeated page requests against the vendor API and folds the pages
//! into one deduplicated record list. Handles:
//! - both pagination dialects, with a permanent fallback from structured to
//!   legacy when an endpoint rejects structured parameters
//! - 429 backoff with resumable retry of the same page
//! - early stop via a caller predicate (incremental checkpoint scans)
//! - stalled-pagination detection, so a server that ignores page parameters
//!   fails loudly instead of looping forever
//!
//! The loop is strictly sequential: one page in flight at a time, pages in
//! increasing page-number order, items in server-returned order.

use crate::api::client::{BooqableClient, Dialect};
use crate::api::resource::{parse_page, PageShape, Record};
use crate::config::Settings;
use crate::error::{AppError, Result};
use std::collections::HashSet;
use std::time::Duration;

/// Backoff applied when a 429 response carries no `Retry-After` header.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(120);

/// Progress callback: (records accumulated, total reported by the server).
pub type ProgressFn<'a> = Box<dyn FnMut(usize, Option<u64>) + Send + 'a>;

/// Rate-limit callback, invoked with the backoff duration before sleeping.
pub type RateLimitFn<'a> = Box<dyn FnMut(Duration) + Send + 'a>;

/// Early-stop predicate, checked per item in server order.
pub type StopFn<'a> = Box<dyn Fn(&Record) -> bool + Send + 'a>;

/// Options for one paginated scan.
pub struct ScanOptions<'a> {
    pub page_size: u32,
    pub request_delay: Duration,
    pub dialect: Dialect,
    /// Extra query parameters forwarded on every page request (filters,
    /// sparse fieldsets).
    pub extra_query: Vec<(String, String)>,
    pub on_progress: Option<ProgressFn<'a>>,
    pub on_rate_limit: Option<RateLimitFn<'a>>,
    pub stop_when: Option<StopFn<'a>>,
}

impl Default for ScanOptions<'_> {
    fn default() -> Self {
        Self {
            page_size: 50,
            request_delay: Duration::from_millis(500),
            dialect: Dialect::Legacy,
            extra_query: Vec::new(),
            on_progress: None,
            on_rate_limit: None,
            stop_when: None,
        }
    }
}

impl ScanOptions<'_> {
    /// Scan options tuned from the stored settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            page_size: settings.page_size,
            request_delay: Duration::from_millis(settings.request_delay_ms),
            ..Self::default()
        }
    }
}

/// Result of a completed scan.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Deduplicated records in server order.
    pub records: Vec<Record>,
    /// Side-loaded resources collected across all pages, for the merge
    /// stage.
    pub included: Vec<Record>,
    /// Total count pinned from the first page that reported one.
    pub total: Option<u64>,
    /// True when the stop predicate ended the scan early.
    pub stopped_early: bool,
}

/// Engine states. The distinction that matters is "retry the same page"
/// (`RateLimited`, `FallbackRetry`) versus "advance" (back to `Fetching`
/// with a bumped page counter).
enum ScanState {
    Fetching,
    RateLimited(Duration),
    FallbackRetry(u16),
    Done,
}

impl BooqableClient {
    /// Fetch every page of `resource`, deduplicating by record id.
    pub async fn get_all_paginated(
        &self,
        resource: &str,
        mut opts: ScanOptions<'_>,
    ) -> Result<ScanOutcome> {
        let mut dialect = opts.dialect;
        let mut page: u32 = 1;
        let mut seen: HashSet<String> = HashSet::new();
        let mut outcome = ScanOutcome::default();
        let mut state = ScanState::Fetching;

        loop {
            match state {
                ScanState::Fetching => {
                    let body = match self
                        .fetch_page(resource, dialect, page, opts.page_size, &opts.extra_query)
                        .await
                    {
                        Ok(body) => body,
                        Err(AppError::Api {
                            status: 429,
                            retry_after,
                            ..
                        }) => {
                            state =
                                ScanState::RateLimited(retry_after.unwrap_or(DEFAULT_RETRY_AFTER));
                            continue;
                        }
                        Err(AppError::Api { status, .. })
                            if dialect == Dialect::Structured
                                && (status == 400 || status >= 500) =>
                        {
                            state = ScanState::FallbackRetry(status);
                            continue;
                        }
                        Err(e) => return Err(e),
                    };

                    let parsed = match parse_page(resource, &body) {
                        PageShape::Page(parsed) => parsed,
                        PageShape::Unexpected { found } => {
                            if page == 1 {
                                // First page must match the contract; anything
                                // else means the API changed shape.
                                return Err(AppError::UnexpectedShape {
                                    resource: resource.to_string(),
                                    found: found.join(", "),
                                });
                            }
                            // A malformed later page reads as end-of-data.
                            tracing::debug!(resource, page, "Non-page body past page 1, ending scan");
                            state = ScanState::Done;
                            continue;
                        }
                    };

                    // Total is pinned to the first reported value.
                    if outcome.total.is_none() {
                        outcome.total = parsed.total;
                    }

                    for raw in &parsed.included {
                        if let Some(record) = Record::from_value(raw) {
                            outcome.included.push(record);
                        }
                    }

                    let page_len = parsed.items.len();
                    let mut new_this_page = 0usize;
                    for raw in &parsed.items {
                        let Some(record) = Record::from_value(raw) else {
                            continue;
                        };
                        if opts.stop_when.as_ref().is_some_and(|stop| stop(&record)) {
                            outcome.stopped_early = true;
                            break;
                        }
                        // Pages can overlap when records shift underneath the
                        // scan; the id set keeps each record once.
                        if !seen.insert(record.id.clone()) {
                            continue;
                        }
                        outcome.records.push(record);
                        new_this_page += 1;
                    }

                    if new_this_page > 0 {
                        if let Some(on_progress) = opts.on_progress.as_mut() {
                            on_progress(outcome.records.len(), outcome.total);
                        }
                    }

                    if !outcome.stopped_early && page > 1 && page_len > 0 && new_this_page == 0 {
                        return Err(AppError::PaginationStall {
                            resource: resource.to_string(),
                            page,
                        });
                    }

                    if outcome.stopped_early || page_len < opts.page_size as usize {
                        state = ScanState::Done;
                    } else {
                        page += 1;
                        if !opts.request_delay.is_zero() {
                            tokio::time::sleep(opts.request_delay).await;
                        }
                    }
                }
                ScanState::RateLimited(wait) => {
                    if let Some(on_rate_limit) = opts.on_rate_limit.as_mut() {
                        on_rate_limit(wait);
                    }
                    tracing::warn!(resource, page, wait_secs = wait.as_secs(), "Backing off for rate limit");
                    tokio::time::sleep(wait).await;
                    // Same page again: nothing was consumed from it.
                    state = ScanState::Fetching;
                }
                ScanState::FallbackRetry(status) => {
                    tracing::warn!(
                        resource,
                        page,
                        status,
                        "Structured pagination rejected, falling back to legacy for the rest of the scan"
                    );
                    dialect = Dialect::Legacy;
                    state = ScanState::Fetching;
                }
                ScanState::Done => break,
            }
        }

        tracing::info!(
            resource,
            records = outcome.records.len(),
            included = outcome.included.len(),
            stopped_early = outcome.stopped_early,
            "Paginated scan complete"
        );
        Ok(outcome)
    }
}
