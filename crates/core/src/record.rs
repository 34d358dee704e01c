//! Flat field maps and their nested JSON form.
//!
//! Form data moves through the service as a flat map from dotted path
//! ("section.field") to JSON value. API payloads use the nested form;
//! `nest` and `flatten` convert between the two.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Flat map from dotted field path to value.
///
/// A BTreeMap keeps iteration deterministic for logging and tests. Ordering
/// guarantees that matter to callers come from the schema, not from here.
pub type FieldMap = BTreeMap<String, Value>;

/// Convert a flat field map into nested JSON grouped by path segment.
///
/// `{"a.b": 1, "a.c": 2}` becomes `{"a": {"b": 1, "c": 2}}`. A scalar
/// sitting where a deeper path needs an object is replaced by the object.
pub fn nest(fields: &FieldMap) -> Value {
    let mut root = Map::new();
    for (path, value) in fields {
        insert_path(&mut root, path, value.clone());
    }
    Value::Object(root)
}

fn insert_path(target: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            target.insert(path.to_string(), value);
        },
        Some((head, rest)) => {
            let slot = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(inner) = slot {
                insert_path(inner, rest, value);
            }
        },
    }
}

/// Flatten nested JSON into dotted paths.
///
/// Objects contribute path segments; arrays and scalars are leaf values.
/// Non-object input flattens to an empty map.
pub fn flatten(value: &Value) -> FieldMap {
    let mut fields = FieldMap::new();
    if let Value::Object(map) = value {
        for (key, val) in map {
            flatten_into(&mut fields, key.clone(), val);
        }
    }
    fields
}

fn flatten_into(fields: &mut FieldMap, path: String, value: &Value) {
    match value {
        Value::Object(map) => {
            for (key, val) in map {
                flatten_into(fields, format!("{}.{}", path, key), val);
            }
        },
        other => {
            fields.insert(path, other.clone());
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nest_groups_by_section() {
        let mut fields = FieldMap::new();
        fields.insert("importer_info.applicant_name".into(), json!("Ali Osaid"));
        fields.insert("importer_info.city_of_import".into(), json!("Karachi"));
        fields.insert("amount_and_payment.amount_usd".into(), json!(50000));

        let nested = nest(&fields);
        assert_eq!(nested["importer_info"]["applicant_name"], json!("Ali Osaid"));
        assert_eq!(nested["importer_info"]["city_of_import"], json!("Karachi"));
        assert_eq!(nested["amount_and_payment"]["amount_usd"], json!(50000));
    }

    #[test]
    fn test_flatten_inverts_nest() {
        let mut fields = FieldMap::new();
        fields.insert("a.b".into(), json!(1));
        fields.insert("a.c".into(), json!("x"));
        fields.insert("d".into(), json!(true));

        assert_eq!(flatten(&nest(&fields)), fields);
    }

    #[test]
    fn test_flatten_keeps_arrays_and_nulls_as_leaves() {
        let nested = json!({
            "attachments": { "documents": ["a.pdf", "b.pdf"] },
            "lc_details": { "issuing_bank": null }
        });
        let fields = flatten(&nested);
        assert_eq!(fields["attachments.documents"], json!(["a.pdf", "b.pdf"]));
        assert_eq!(fields["lc_details.issuing_bank"], Value::Null);
    }

    #[test]
    fn test_flatten_non_object_is_empty() {
        assert!(flatten(&json!("just text")).is_empty());
        assert!(flatten(&json!([1, 2, 3])).is_empty());
    }

    #[test]
    fn test_nest_replaces_scalar_blocking_a_deeper_path() {
        let mut fields = FieldMap::new();
        fields.insert("a".into(), json!("scalar"));
        fields.insert("a.b".into(), json!(1));

        // BTreeMap order visits "a" before "a.b"; the object wins.
        let nested = nest(&fields);
        assert_eq!(nested["a"]["b"], json!(1));
    }

    #[test]
    fn test_flat_keys_without_dots_survive_roundtrip() {
        let mut fields = FieldMap::new();
        fields.insert("transaction_role".into(), json!("Importer (Applicant)"));
        assert_eq!(flatten(&nest(&fields)), fields);
    }
}
