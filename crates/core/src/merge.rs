use std::collections::HashSet;

use serde_json::Value;
use uuid::Uuid;

use crate::resolve::render_scalar;

/// Merges `incoming` records into `existing`, keyed by `key_field`.
///
/// Policy, in order:
/// - an incoming record with a null/blank/missing key gets a synthetic key so
///   it is kept rather than colliding with every other keyless record;
/// - on key collision the existing record wins and the incoming duplicate is
///   discarded (first write wins — a persisted record may already carry
///   manual corrections that a re-import must not clobber);
/// - output order is the existing records in their original order, followed
///   by newly merged ones in incoming order.
///
/// Total on any two sequences; collisions are not errors.
pub fn merge(existing: Vec<Value>, incoming: Vec<Value>, key_field: &str) -> Vec<Value> {
    let mut seen: HashSet<String> = existing
        .iter()
        .filter_map(|record| key_of(record, key_field))
        .collect();

    let mut merged = existing;
    for mut record in incoming {
        match key_of(&record, key_field) {
            Some(key) => {
                if seen.insert(key) {
                    merged.push(record);
                }
            }
            None => {
                let synthetic = format!("gen-{}", Uuid::new_v4());
                if let Value::Object(map) = &mut record {
                    map.insert(key_field.to_string(), Value::String(synthetic.clone()));
                }
                seen.insert(synthetic);
                merged.push(record);
            }
        }
    }
    merged
}

fn key_of(record: &Value, key_field: &str) -> Option<String> {
    match record.as_object()?.get(key_field)? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        value => Some(render_scalar(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_write_wins_on_collision() {
        let merged = merge(
            vec![json!({"id": "A", "v": 1})],
            vec![json!({"id": "A", "v": 2}), json!({"id": "B", "v": 3})],
            "id",
        );
        assert_eq!(
            merged,
            vec![json!({"id": "A", "v": 1}), json!({"id": "B", "v": 3})]
        );
    }

    #[test]
    fn merge_is_idempotent() {
        let dataset = vec![json!({"id": "A", "v": 1}), json!({"id": "B", "v": 2})];
        let merged = merge(dataset.clone(), dataset.clone(), "id");
        assert_eq!(merged, dataset);
    }

    #[test]
    fn keyless_incoming_records_are_all_kept() {
        let existing = vec![json!({"id": "A"})];
        let incoming = vec![json!({"v": 1}), json!({"v": 2}), json!({"id": null, "v": 3})];
        let merged = merge(existing, incoming, "id");
        assert_eq!(merged.len(), 4);
        // Every record now carries a distinct key.
        let keys: HashSet<String> = merged
            .iter()
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(keys.len(), 4);
    }

    #[test]
    fn no_data_loss_lower_bound() {
        let a = vec![json!({"id": "A"}), json!({"id": "B"})];
        let b = vec![json!({"id": "B"}), json!({"id": "C"}), json!({"id": "D"})];
        let merged = merge(a.clone(), b.clone(), "id");
        assert!(merged.len() >= a.len().max(b.len()));
        assert_eq!(merged.len(), 4);
    }

    #[test]
    fn output_preserves_relative_order() {
        let existing = vec![json!({"id": "B"}), json!({"id": "A"})];
        let incoming = vec![json!({"id": "D"}), json!({"id": "C"})];
        let merged = merge(existing, incoming, "id");
        let ids: Vec<&str> = merged.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["B", "A", "D", "C"]);
    }

    #[test]
    fn blank_string_key_is_treated_as_keyless() {
        let merged = merge(vec![], vec![json!({"id": "  ", "v": 1})], "id");
        assert_eq!(merged.len(), 1);
        assert!(merged[0]["id"].as_str().unwrap().starts_with("gen-"));
    }

    #[test]
    fn numeric_keys_collide_with_equal_numeric_keys() {
        let merged = merge(
            vec![json!({"id": 7, "v": "old"})],
            vec![json!({"id": 7, "v": "new"})],
            "id",
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0]["v"], "old");
    }

    #[test]
    fn duplicate_keys_within_incoming_keep_the_first() {
        let merged = merge(
            vec![],
            vec![json!({"id": "X", "v": 1}), json!({"id": "X", "v": 2})],
            "id",
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0]["v"], 1);
    }

    #[test]
    fn non_object_incoming_is_still_kept() {
        let merged = merge(vec![], vec![json!("loose value")], "id");
        assert_eq!(merged, vec![json!("loose value")]);
    }
}
