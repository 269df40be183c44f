// SPDX-License-Identifier: MIT

//! Resolve compound-document relationships into the records that carry them.
//!
//! The structured API returns related resources once, in a side list, and
//! points at them from each record's `relationships` block. Downstream code
//! wants plain nested data, so this stage looks every reference up by
//! `(type, id)` and writes the resolved value straight into the record's
//! fields.

use crate::api::resource::Record;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Relationship names resolved on order records. `lines` is additionally
/// written under `order_lines`, which older callers still read.
const ORDER_RELATIONSHIPS: [&str; 2] = ["lines", "customer"];

fn lookup_key(kind: &str, id: &str) -> String {
    format!("{kind}:{id}")
}

fn record_to_value(record: &Record) -> Value {
    let mut map = Map::new();
    map.insert("id".to_string(), Value::String(record.id.clone()));
    if let Some(kind) = &record.kind {
        map.insert("type".to_string(), Value::String(kind.clone()));
    }
    for (key, value) in &record.fields {
        map.insert(key.clone(), value.clone());
    }
    map.insert(
        "relationships".to_string(),
        record
            .relationships
            .clone()
            .map(Value::Object)
            .unwrap_or(Value::Null),
    );
    Value::Object(map)
}

/// Resolve one relationship reference (`{"type": ..., "id": ...}`) against
/// the included lookup. Unresolvable references are dropped.
fn resolve_reference(reference: &Value, lookup: &HashMap<String, Value>) -> Option<Value> {
    let kind = reference.get("type")?.as_str()?;
    let id = reference.get("id")?.as_str()?;
    lookup.get(&lookup_key(kind, id)).cloned()
}

/// Merge side-loaded resources into each record's fields.
///
/// To-many relationships resolve to an array of resolved records, to-one
/// relationships to a single record. Records whose relationships are absent
/// or unresolvable keep their fields untouched.
pub fn merge_included(records: &mut [Record], included: &[Record]) {
    if included.is_empty() {
        return;
    }

    let mut lookup: HashMap<String, Value> = HashMap::with_capacity(included.len());
    for record in included {
        if let Some(kind) = &record.kind {
            lookup.insert(lookup_key(kind, &record.id), record_to_value(record));
        }
    }

    for record in records.iter_mut() {
        let Some(relationships) = record.relationships.clone() else {
            continue;
        };
        for name in ORDER_RELATIONSHIPS {
            let Some(data) = relationships.get(name).and_then(|rel| rel.get("data")) else {
                continue;
            };
            match data {
                Value::Array(refs) => {
                    let resolved: Vec<Value> = refs
                        .iter()
                        .filter_map(|r| resolve_reference(r, &lookup))
                        .collect();
                    if resolved.is_empty() {
                        continue;
                    }
                    record
                        .fields
                        .insert(name.to_string(), Value::Array(resolved.clone()));
                    if name == "lines" {
                        record
                            .fields
                            .insert("order_lines".to_string(), Value::Array(resolved));
                    }
                }
                Value::Object(_) => {
                    if let Some(resolved) = resolve_reference(data, &lookup) {
                        record.fields.insert(name.to_string(), resolved);
                    }
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(raw: Value) -> Record {
        Record::from_value(&raw).expect("record")
    }

    #[test]
    fn resolves_lines_and_customer() {
        let mut records = vec![record(json!({
            "id": "o1",
            "type": "orders",
            "attributes": {"number": 17},
            "relationships": {
                "lines": {"data": [
                    {"type": "lines", "id": "l1"},
                    {"type": "lines", "id": "l2"}
                ]},
                "customer": {"data": {"type": "customers", "id": "c1"}}
            }
        }))];
        let included = vec![
            record(json!({"id": "l1", "type": "lines", "attributes": {"quantity": 2}})),
            record(json!({"id": "l2", "type": "lines", "attributes": {"quantity": 1}})),
            record(json!({"id": "c1", "type": "customers", "attributes": {"name": "Ada"}})),
        ];

        merge_included(&mut records, &included);

        let lines = records[0].fields.get("lines").and_then(Value::as_array).expect("lines");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], "l1");
        assert_eq!(lines[0]["quantity"], 2);
        // Alias for callers still on the old field name.
        assert_eq!(records[0].fields["order_lines"], records[0].fields["lines"]);
        assert_eq!(records[0].fields["customer"]["name"], "Ada");
    }

    #[test]
    fn unresolvable_references_are_dropped() {
        let mut records = vec![record(json!({
            "id": "o1",
            "type": "orders",
            "attributes": {},
            "relationships": {
                "lines": {"data": [
                    {"type": "lines", "id": "l1"},
                    {"type": "lines", "id": "missing"}
                ]}
            }
        }))];
        let included = vec![record(
            json!({"id": "l1", "type": "lines", "attributes": {"quantity": 5}}),
        )];

        merge_included(&mut records, &included);

        let lines = records[0].fields.get("lines").and_then(Value::as_array).expect("lines");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["id"], "l1");
    }

    #[test]
    fn record_without_relationships_is_untouched() {
        let mut records = vec![record(json!({"id": "o1", "number": 3}))];
        let before = records[0].fields.clone();
        let included = vec![record(
            json!({"id": "l1", "type": "lines", "attributes": {}}),
        )];

        merge_included(&mut records, &included);

        assert_eq!(records[0].fields, before);
    }

    #[test]
    fn empty_included_is_a_no_op() {
        let mut records = vec![record(json!({
            "id": "o1",
            "type": "orders",
            "attributes": {},
            "relationships": {"lines": {"data": [{"type": "lines", "id": "l1"}]}}
        }))];

        merge_included(&mut records, &[]);

        assert!(!records[0].fields.contains_key("lines"));
    }
}
