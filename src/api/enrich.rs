// SPDX-License-Identifier: MIT

//! Selective order enrichment.
//!
//! The list endpoint returns orders without their lines. For the orders a
//! user will actually look at, a per-order secondary fetch pulls the full
//! compound document and merges the resolved lines back in. Candidates are
//! limited to orders inside a date window, so an old back catalog does not
//! trigger thousands of requests.

use crate::api::client::BooqableClient;
use crate::api::merge::merge_included;
use crate::api::resource::Record;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures_util::stream::{self, StreamExt};
use std::time::Duration;

/// Per-order fetches in flight at once.
const ENRICH_BATCH_SIZE: usize = 10;

/// Pause between enrichment batches.
const BATCH_PAUSE: Duration = Duration::from_millis(100);

/// Progress callback: (orders enriched so far, total candidates).
pub type EnrichProgressFn<'a> = Box<dyn FnMut(usize, usize) + Send + 'a>;

/// Date window bounding which orders get enriched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnrichWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl EnrichWindow {
    /// Window from the caller's bounds, or one month either side of now when
    /// the bounds are missing or inverted.
    pub fn resolve(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        match (start, end) {
            (Some(start), Some(end)) if start <= end => Self { start, end },
            (Some(_), Some(_)) => {
                tracing::warn!("Inverted enrichment window, using the default");
                Self::default_around(Utc::now())
            }
            _ => Self::default_around(Utc::now()),
        }
    }

    fn default_around(now: DateTime<Utc>) -> Self {
        let month = ChronoDuration::days(30);
        Self {
            start: now - month,
            end: now + month,
        }
    }

    fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}

/// Whether an order is missing line data and starts inside the window.
fn needs_lines(record: &Record, window: &EnrichWindow) -> bool {
    if record.has_non_empty_array("lines") || record.has_non_empty_array("order_lines") {
        return false;
    }
    record
        .timestamp("starts_at")
        .is_some_and(|starts_at| window.contains(starts_at))
}

/// Indices of the orders worth enriching, in place.
fn candidate_indices(records: &[Record], window: &EnrichWindow) -> Vec<usize> {
    records
        .iter()
        .enumerate()
        .filter(|(_, record)| needs_lines(record, window))
        .map(|(idx, _)| idx)
        .collect()
}

/// Pull the resolved line array out of a single-order compound document.
/// Returns `None` when the order genuinely has no lines.
fn resolved_lines(body: &serde_json::Value) -> Option<serde_json::Value> {
    let full = Record::from_value(body.get("data")?)?;
    let included: Vec<Record> = body
        .get("included")
        .and_then(serde_json::Value::as_array)
        .map(|raw| raw.iter().filter_map(Record::from_value).collect())
        .unwrap_or_default();

    let mut merged = vec![full];
    merge_included(&mut merged, &included);
    merged
        .remove(0)
        .fields
        .get("lines")
        .filter(|lines| lines.as_array().is_some_and(|a| !a.is_empty()))
        .cloned()
}

/// Fetch lines for every order in `records` that lacks them and starts
/// inside `window`, mutating the matching records. A failed per-order fetch
/// logs a warning and leaves that order as it was. `on_progress` is invoked
/// after each batch with the running enriched count.
///
/// Returns the number of orders enriched.
pub async fn enrich_missing_lines(
    client: &BooqableClient,
    records: &mut [Record],
    window: EnrichWindow,
    mut on_progress: Option<EnrichProgressFn<'_>>,
) -> usize {
    let candidates = candidate_indices(records, &window);
    if candidates.is_empty() {
        return 0;
    }
    tracing::info!(candidates = candidates.len(), "Enriching orders missing lines");

    let mut enriched = 0usize;
    for (batch_no, batch) in candidates.chunks(ENRICH_BATCH_SIZE).enumerate() {
        if batch_no > 0 {
            tokio::time::sleep(BATCH_PAUSE).await;
        }

        let fetches = batch.iter().map(|&idx| {
            let order_id = records[idx].id.clone();
            async move { (idx, client.fetch_order_with_lines(&order_id).await) }
        });
        // Resolve the whole batch before touching the records, so the
        // mutation below never aliases the borrow inside the futures.
        let results: Vec<(usize, crate::error::Result<serde_json::Value>)> = stream::iter(fetches)
            .buffer_unordered(ENRICH_BATCH_SIZE)
            .collect()
            .await;

        for (idx, result) in results {
            match result {
                Ok(body) => {
                    let Some(lines) = resolved_lines(&body) else {
                        tracing::debug!(order_id = %records[idx].id, "Order still has no lines");
                        continue;
                    };
                    records[idx]
                        .fields
                        .insert("order_lines".to_string(), lines.clone());
                    records[idx].fields.insert("lines".to_string(), lines);
                    enriched += 1;
                }
                Err(e) => {
                    tracing::warn!(order_id = %records[idx].id, error = %e, "Line fetch failed, skipping order");
                }
            }
        }

        if let Some(on_progress) = on_progress.as_mut() {
            on_progress(enriched, candidates.len());
        }
    }

    tracing::info!(enriched, "Enrichment pass complete");
    enriched
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order(id: &str, starts_at: &str, lines: Option<serde_json::Value>) -> Record {
        let mut raw = json!({"id": id, "starts_at": starts_at});
        if let Some(lines) = lines {
            raw["lines"] = lines;
        }
        Record::from_value(&raw).expect("record")
    }

    fn window(start: &str, end: &str) -> EnrichWindow {
        EnrichWindow {
            start: start.parse().expect("start"),
            end: end.parse().expect("end"),
        }
    }

    #[test]
    fn candidates_require_missing_lines_inside_window() {
        let w = window("2026-08-01T00:00:00Z", "2026-08-31T00:00:00Z");
        let records = vec![
            order("in-window", "2026-08-10T12:00:00Z", None),
            order("has-lines", "2026-08-11T12:00:00Z", Some(json!([{"id": "l1"}]))),
            order("empty-lines", "2026-08-12T12:00:00Z", Some(json!([]))),
            order("too-old", "2026-06-01T12:00:00Z", None),
            order("too-new", "2026-09-15T12:00:00Z", None),
        ];

        let idx = candidate_indices(&records, &w);
        assert_eq!(idx, vec![0, 2]);
    }

    #[test]
    fn order_without_start_date_is_skipped() {
        let w = window("2026-08-01T00:00:00Z", "2026-08-31T00:00:00Z");
        let records = vec![Record::from_value(&json!({"id": "o1"})).expect("record")];
        assert!(candidate_indices(&records, &w).is_empty());
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let w = window("2026-08-01T00:00:00Z", "2026-08-31T00:00:00Z");
        let records = vec![
            order("at-start", "2026-08-01T00:00:00Z", None),
            order("at-end", "2026-08-31T00:00:00Z", None),
        ];
        assert_eq!(candidate_indices(&records, &w).len(), 2);
    }

    #[test]
    fn inverted_window_falls_back_to_default() {
        let start = "2026-08-31T00:00:00Z".parse().ok();
        let end = "2026-08-01T00:00:00Z".parse().ok();
        let w = EnrichWindow::resolve(start, end);
        assert!(w.start < w.end);
        assert!(w.contains(Utc::now()));
    }

    #[test]
    fn resolved_lines_reads_the_compound_document() {
        let body = json!({
            "data": {
                "id": "o1",
                "type": "orders",
                "attributes": {"number": 9},
                "relationships": {"lines": {"data": [{"type": "lines", "id": "l1"}]}}
            },
            "included": [
                {"id": "l1", "type": "lines", "attributes": {"quantity": 3}}
            ]
        });

        let lines = resolved_lines(&body).expect("lines");
        let lines = lines.as_array().expect("array");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["quantity"], 3);
    }

    #[test]
    fn resolved_lines_is_none_for_an_empty_order() {
        let body = json!({
            "data": {
                "id": "o1",
                "type": "orders",
                "attributes": {},
                "relationships": {"lines": {"data": []}}
            },
            "included": []
        });
        assert!(resolved_lines(&body).is_none());
    }

    #[test]
    fn explicit_window_is_kept() {
        let start: DateTime<Utc> = "2026-08-01T00:00:00Z".parse().expect("start");
        let end: DateTime<Utc> = "2026-08-31T00:00:00Z".parse().expect("end");
        let w = EnrichWindow::resolve(Some(start), Some(end));
        assert_eq!(w, EnrichWindow { start, end });
    }
}
