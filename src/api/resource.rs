// SPDX-License-Identifier: MIT

//! One internal representation for vendor resources.
//!
//! The Booqable API answers in two shapes: legacy flat objects (generation 1)
//! and JSON:API compound documents (generation 4). Both are normalized into
//! [`Record`] before any business logic runs, instead of probing for fields
//! throughout the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A flattened vendor resource: JSON:API `attributes` merged to the top
/// level, `relationships` retained for the merge stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Flatten a raw page item. Items without a usable `id` are dropped.
    pub fn from_value(value: &Value) -> Option<Record> {
        let obj = value.as_object()?;
        let id = id_string(obj.get("id")?)?;
        let kind = obj
            .get("type")
            .and_then(Value::as_str)
            .map(ToString::to_string);

        // JSON:API envelope: attributes become the record body.
        if let Some(attrs) = obj.get("attributes").and_then(Value::as_object) {
            let relationships = obj
                .get("relationships")
                .and_then(Value::as_object)
                .cloned();
            return Some(Record {
                id,
                kind,
                relationships,
                fields: attrs.clone(),
            });
        }

        // Legacy flat object: everything except the reserved keys.
        let mut fields = Map::new();
        let mut relationships = None;
        for (key, val) in obj {
            match key.as_str() {
                "id" | "type" => {}
                "relationships" => relationships = val.as_object().cloned(),
                _ => {
                    fields.insert(key.clone(), val.clone());
                }
            }
        }
        Some(Record {
            id,
            kind,
            relationships,
            fields,
        })
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Parse an RFC3339 timestamp field.
    pub fn timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        self.str_field(name)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// True when the field holds a non-empty array.
    pub fn has_non_empty_array(&self, name: &str) -> bool {
        self.fields
            .get(name)
            .and_then(Value::as_array)
            .is_some_and(|arr| !arr.is_empty())
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// One parsed page of primary resources plus side-loaded includes.
#[derive(Debug, Default)]
pub struct ResourcePage {
    pub items: Vec<Value>,
    pub included: Vec<Value>,
    pub total: Option<u64>,
}

/// Outcome of the discriminated page-body parse.
#[derive(Debug)]
pub enum PageShape {
    Page(ResourcePage),
    /// Neither a `data` array nor an array under the resource name. Carries
    /// the keys actually present, for the page-1 contract error.
    Unexpected { found: Vec<String> },
}

/// Classify a raw page body.
///
/// The primary array lives under `data` (both generations), or under a key
/// equal to the resource name on some legacy endpoints. The total count is
/// read from `meta.total`, `meta.count`, or the legacy top-level
/// `total_count`/`total_entries`.
pub fn parse_page(resource: &str, body: &Value) -> PageShape {
    let Some(obj) = body.as_object() else {
        return PageShape::Unexpected { found: Vec::new() };
    };

    let items = obj
        .get("data")
        .and_then(Value::as_array)
        .or_else(|| obj.get(resource).and_then(Value::as_array));

    let Some(items) = items else {
        return PageShape::Unexpected {
            found: obj.keys().cloned().collect(),
        };
    };

    let meta = obj.get("meta").and_then(Value::as_object);
    let total = meta
        .and_then(|m| m.get("total").or_else(|| m.get("count")))
        .or_else(|| obj.get("total_count"))
        .or_else(|| obj.get("total_entries"))
        .and_then(Value::as_u64);

    let included = obj
        .get("included")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    PageShape::Page(ResourcePage {
        items: items.clone(),
        included,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_json_api_envelope() {
        let raw = json!({
            "id": "o1",
            "type": "orders",
            "attributes": {"number": 42, "starts_at": "2025-05-01T10:00:00Z"},
            "relationships": {"lines": {"data": [{"type": "lines", "id": "l1"}]}}
        });
        let record = Record::from_value(&raw).unwrap();
        assert_eq!(record.id, "o1");
        assert_eq!(record.kind.as_deref(), Some("orders"));
        assert_eq!(record.fields["number"], json!(42));
        assert!(record.relationships.is_some());
        assert!(record.timestamp("starts_at").is_some());
    }

    #[test]
    fn keeps_legacy_flat_fields() {
        let raw = json!({"id": "o2", "status": "reserved", "customer": {"id": "c1"}});
        let record = Record::from_value(&raw).unwrap();
        assert_eq!(record.str_field("status"), Some("reserved"));
        assert!(record.fields.contains_key("customer"));
        assert!(record.relationships.is_none());
    }

    #[test]
    fn numeric_ids_become_strings() {
        let record = Record::from_value(&json!({"id": 17, "name": "x"})).unwrap();
        assert_eq!(record.id, "17");
    }

    #[test]
    fn items_without_id_are_dropped() {
        assert!(Record::from_value(&json!({"name": "no id"})).is_none());
    }

    #[test]
    fn parse_page_prefers_data_key() {
        let body = json!({"data": [{"id": "1"}], "meta": {"total": 9}});
        match parse_page("orders", &body) {
            PageShape::Page(page) => {
                assert_eq!(page.items.len(), 1);
                assert_eq!(page.total, Some(9));
            }
            PageShape::Unexpected { .. } => panic!("expected a page"),
        }
    }

    #[test]
    fn parse_page_falls_back_to_resource_key() {
        let body = json!({"orders": [{"id": "1"}, {"id": "2"}], "total_count": 2});
        match parse_page("orders", &body) {
            PageShape::Page(page) => {
                assert_eq!(page.items.len(), 2);
                assert_eq!(page.total, Some(2));
            }
            PageShape::Unexpected { .. } => panic!("expected a page"),
        }
    }

    #[test]
    fn parse_page_reports_keys_on_unexpected_shape() {
        let body = json!({"error": "nope", "status": 500});
        match parse_page("orders", &body) {
            PageShape::Unexpected { found } => {
                assert!(found.contains(&"error".to_string()));
                assert!(found.contains(&"status".to_string()));
            }
            PageShape::Page(_) => panic!("expected unexpected shape"),
        }
    }
}
