//! Form schema registry.
//!
//! A schema is an ordered list of sections, each an ordered list of field
//! definitions. Field paths are dotted (`section.field`), matching the
//! nested JSON the form and the LLM exchange. Validation is
//! parse-then-validate: values are lightly coerced (numbers from currency
//! strings, booleans from yes/no, dates normalized to ISO) and anything the
//! schema cannot account for is rejected, not stored.

use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use lc_voice_core::FieldMap;

static LETTER_OF_CREDIT: Lazy<FormSchema> = Lazy::new(|| {
    FormSchema::from_yaml(include_str!("schema/letter_of_credit.yaml"))
        .expect("embedded letter_of_credit schema is valid")
});

/// Schema errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Schema file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse schema: {0}")]
    Parse(String),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Invalid value for {path}: {message}")]
    InvalidValue { path: String, message: String },
}

impl From<SchemaError> for lc_voice_core::Error {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::UnknownField(_) | SchemaError::InvalidValue { .. } => {
                lc_voice_core::Error::SchemaViolation(err.to_string())
            },
            SchemaError::FileNotFound(_) | SchemaError::Parse(_) => {
                lc_voice_core::Error::Configuration(err.to_string())
            },
        }
    }
}

/// Field value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Array,
}

/// Mapping rule applied before enum matching, e.g. collapsing every bank
/// name onto one sentinel value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialMapping {
    pub description: String,
    #[serde(default)]
    pub rules: Vec<String>,
}

/// One field of the form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// Required fields drive `missing_paths` and the voice instructions.
    #[serde(default)]
    pub required: bool,

    /// Allowed values. Empty means free-form; otherwise matching is exact.
    #[serde(default)]
    pub values: Vec<String>,

    /// Maximum length in characters (strings only).
    #[serde(default)]
    pub max_length: Option<usize>,

    /// Alternative wordings for this field. Matching normalizes case and
    /// underscores, so "loading_port" hits the alias "loading port".
    #[serde(default)]
    pub aliases: Vec<String>,

    #[serde(default)]
    pub special_mapping: Option<SpecialMapping>,

    /// Free-text collection hint surfaced to the extraction prompt.
    #[serde(default)]
    pub note: Option<String>,
}

impl FieldDefinition {
    pub fn is_enum(&self) -> bool {
        !self.values.is_empty()
    }

    fn matches_alias(&self, candidate: &str) -> bool {
        let needle = normalize_key(candidate);
        self.aliases.iter().any(|a| normalize_key(a) == needle)
    }

    /// Validate and lightly coerce a value for this field.
    ///
    /// Null always passes; it means "not collected". The returned value is
    /// the normalized form to store.
    fn validate_value(&self, value: &Value) -> Result<Value, String> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        if self.is_enum() {
            let text = value
                .as_str()
                .ok_or_else(|| "expected one of the allowed values".to_string())?;
            return if self.values.iter().any(|v| v == text) {
                Ok(Value::String(text.to_string()))
            } else {
                Err(format!(
                    "'{}' is not one of the allowed values: {}",
                    text,
                    self.values.join(", ")
                ))
            };
        }

        match self.field_type {
            FieldType::String => {
                let text = value.as_str().ok_or_else(|| "expected a string".to_string())?;
                if let Some(max) = self.max_length {
                    let len = text.chars().count();
                    if len > max {
                        return Err(format!("exceeds maximum length of {} ({} characters)", max, len));
                    }
                }
                Ok(Value::String(text.to_string()))
            },
            FieldType::Number => match value {
                Value::Number(_) => Ok(value.clone()),
                Value::String(raw) => parse_number(raw)
                    .ok_or_else(|| format!("'{}' is not a number", raw)),
                _ => Err("expected a number".to_string()),
            },
            FieldType::Boolean => match value {
                Value::Bool(_) => Ok(value.clone()),
                Value::String(raw) => match raw.trim().to_lowercase().as_str() {
                    "true" | "yes" => Ok(Value::Bool(true)),
                    "false" | "no" => Ok(Value::Bool(false)),
                    _ => Err(format!("'{}' is not a boolean", raw)),
                },
                _ => Err("expected a boolean".to_string()),
            },
            FieldType::Date => {
                let raw = value.as_str().ok_or_else(|| "expected a date string".to_string())?;
                parse_date(raw)
                    .map(Value::String)
                    .ok_or_else(|| format!("'{}' is not a date (expected YYYY-MM-DD)", raw))
            },
            FieldType::Array => {
                if value.is_array() {
                    Ok(value.clone())
                } else {
                    Err("expected an array".to_string())
                }
            },
        }
    }
}

/// Strip currency decoration and parse.
fn parse_number(raw: &str) -> Option<Value> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | ',' | ' '))
        .collect();
    let cleaned = cleaned.trim_start_matches(|c: char| c.is_alphabetic());
    let cleaned = cleaned.trim_end_matches(|c: char| c.is_alphabetic());
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(n) = cleaned.parse::<i64>() {
        return Some(Value::Number(n.into()));
    }
    cleaned
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
}

/// Accept ISO and DD/MM/YYYY dates; store ISO.
fn parse_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    for format in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, format) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }
    None
}

fn normalize_key(s: &str) -> String {
    s.trim().to_lowercase().replace('_', " ")
}

/// One section of the form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionDefinition {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
}

impl SectionDefinition {
    /// Display heading, e.g. "LC DETAILS" for `lc_details`.
    pub fn heading(&self) -> String {
        self.name.to_uppercase().replace('_', " ")
    }
}

/// A resolved field: definition plus the section it lives in.
#[derive(Debug, Clone, Copy)]
pub struct FieldRef<'a> {
    pub section: &'a str,
    pub field: &'a FieldDefinition,
}

impl FieldRef<'_> {
    /// Canonical dotted path.
    pub fn path(&self) -> String {
        format!("{}.{}", self.section, self.field.name)
    }
}

/// Ordered form schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormSchema {
    pub name: String,
    pub sections: Vec<SectionDefinition>,
}

impl FormSchema {
    /// Parse a schema from YAML and check it for structural mistakes.
    pub fn from_yaml(yaml: &str) -> Result<Self, SchemaError> {
        let schema: FormSchema =
            serde_yaml::from_str(yaml).map_err(|e| SchemaError::Parse(e.to_string()))?;
        schema.check_definition()?;
        Ok(schema)
    }

    /// Load a schema from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|_| SchemaError::FileNotFound(path.display().to_string()))?;
        Self::from_yaml(&contents)
    }

    /// The built-in Letter of Credit schema.
    pub fn letter_of_credit() -> Self {
        LETTER_OF_CREDIT.clone()
    }

    fn check_definition(&self) -> Result<(), SchemaError> {
        if self.sections.is_empty() {
            return Err(SchemaError::Parse("schema has no sections".to_string()));
        }
        let mut seen = std::collections::HashSet::new();
        for section in &self.sections {
            if section.name.is_empty() {
                return Err(SchemaError::Parse("section with empty name".to_string()));
            }
            if section.fields.is_empty() {
                return Err(SchemaError::Parse(format!(
                    "section '{}' has no fields",
                    section.name
                )));
            }
            for field in &section.fields {
                if field.name.is_empty() {
                    return Err(SchemaError::Parse(format!(
                        "field with empty name in section '{}'",
                        section.name
                    )));
                }
                let path = format!("{}.{}", section.name, field.name);
                if !seen.insert(path.clone()) {
                    return Err(SchemaError::Parse(format!("duplicate field path '{}'", path)));
                }
            }
        }
        Ok(())
    }

    pub fn field_count(&self) -> usize {
        self.sections.iter().map(|s| s.fields.len()).sum()
    }

    /// All fields in definition order.
    pub fn fields(&self) -> impl Iterator<Item = FieldRef<'_>> + '_ {
        self.sections.iter().flat_map(|section| {
            section
                .fields
                .iter()
                .map(move |field| FieldRef { section: &section.name, field })
        })
    }

    /// Look up a field by dotted path, alias, or bare name.
    ///
    /// Resolution order: exact `section.field` path, then alias within the
    /// named section, then (for bare keys) a section holding exactly one
    /// field, then the first name or alias match in definition order.
    pub fn describe(&self, key: &str) -> Option<FieldRef<'_>> {
        let key = key.trim();
        if let Some((section_name, field_name)) = key.split_once('.') {
            let section = self.sections.iter().find(|s| s.name == section_name)?;
            return section
                .fields
                .iter()
                .find(|f| f.name == field_name)
                .or_else(|| section.fields.iter().find(|f| f.matches_alias(field_name)))
                .map(|field| FieldRef { section: &section.name, field });
        }

        if let Some(section) = self.sections.iter().find(|s| s.name == key) {
            if section.fields.len() == 1 {
                return Some(FieldRef { section: &section.name, field: &section.fields[0] });
            }
        }

        for section in &self.sections {
            if let Some(field) = section
                .fields
                .iter()
                .find(|f| f.name == key || f.matches_alias(key))
            {
                return Some(FieldRef { section: &section.name, field });
            }
        }
        None
    }

    /// Canonical path for a key that may be an alias or a bare name.
    pub fn resolve(&self, key: &str) -> Option<String> {
        self.describe(key).map(|r| r.path())
    }

    /// Validate a value against the field at `path`.
    ///
    /// Returns the normalized value to store. The path may itself be an
    /// alias; the error names the canonical path.
    pub fn validate(&self, path: &str, value: &Value) -> Result<Value, SchemaError> {
        let field_ref = self
            .describe(path)
            .ok_or_else(|| SchemaError::UnknownField(path.to_string()))?;
        field_ref
            .field
            .validate_value(value)
            .map_err(|message| SchemaError::InvalidValue { path: field_ref.path(), message })
    }

    /// Required paths in schema definition order.
    pub fn all_required_paths(&self) -> Vec<String> {
        self.fields()
            .filter(|r| r.field.required)
            .map(|r| r.path())
            .collect()
    }

    /// Required paths absent (or null) in `fields`, in definition order.
    pub fn missing_paths(&self, fields: &FieldMap) -> Vec<String> {
        self.fields()
            .filter(|r| r.field.required)
            .map(|r| r.path())
            .filter(|path| fields.get(path).map_or(true, Value::is_null))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_schema_loads() {
        let schema = FormSchema::letter_of_credit();
        assert_eq!(schema.name, "letter_of_credit");
        assert_eq!(schema.sections.len(), 10);
        assert_eq!(schema.field_count(), 28);
    }

    #[test]
    fn test_describe_exact_path() {
        let schema = FormSchema::letter_of_credit();
        let field = schema.describe("amount_and_payment.amount_usd").unwrap();
        assert_eq!(field.field.name, "amount_usd");
        assert_eq!(field.field.field_type, FieldType::Number);
        assert!(field.field.required);
    }

    #[test]
    fn test_describe_alias_within_section() {
        let schema = FormSchema::letter_of_credit();
        let field = schema.describe("shipment_details.loading_port").unwrap();
        assert_eq!(field.path(), "shipment_details.port_of_loading");
    }

    #[test]
    fn test_describe_bare_alias() {
        let schema = FormSchema::letter_of_credit();
        assert_eq!(
            schema.resolve("pol").as_deref(),
            Some("shipment_details.port_of_loading")
        );
        assert_eq!(
            schema.resolve("bid_deadline").as_deref(),
            Some("bidding_deadline.last_date_for_bids")
        );
    }

    #[test]
    fn test_single_field_section_answers_bare_name() {
        let schema = FormSchema::letter_of_credit();
        assert_eq!(
            schema.resolve("transaction_role").as_deref(),
            Some("transaction_role.role_in_transaction")
        );
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let schema = FormSchema::letter_of_credit();
        assert!(schema.describe("nonexistent_field").is_none());
        assert!(matches!(
            schema.validate("lc_details.swift", &json!("x")),
            Err(SchemaError::UnknownField(_))
        ));
    }

    #[test]
    fn test_enum_values_match_exactly() {
        let schema = FormSchema::letter_of_credit();
        let ok = schema
            .validate("amount_and_payment.payment_terms", &json!("Sight LC"))
            .unwrap();
        assert_eq!(ok, json!("Sight LC"));

        // Wrong case is not an allowed value.
        assert!(schema
            .validate("amount_and_payment.payment_terms", &json!("sight lc"))
            .is_err());
        // Values outside the list are rejected outright.
        assert!(schema
            .validate("amount_and_payment.payment_terms", &json!("Cash"))
            .is_err());
    }

    #[test]
    fn test_number_coercion_strips_currency() {
        let schema = FormSchema::letter_of_credit();
        assert_eq!(
            schema.validate("amount_and_payment.amount_usd", &json!("$50,000")).unwrap(),
            json!(50000)
        );
        assert_eq!(
            schema.validate("amount_and_payment.amount_usd", &json!("USD 25000")).unwrap(),
            json!(25000)
        );
        assert_eq!(
            schema.validate("amount_and_payment.amount_usd", &json!(1250.5)).unwrap(),
            json!(1250.5)
        );
        assert!(schema
            .validate("amount_and_payment.amount_usd", &json!("around fifty"))
            .is_err());
    }

    #[test]
    fn test_boolean_coercion() {
        let schema = FormSchema::letter_of_credit();
        assert_eq!(
            schema.validate("lc_details.is_lc_issued", &json!("Yes")).unwrap(),
            json!(true)
        );
        assert_eq!(
            schema.validate("lc_details.is_lc_issued", &json!("no")).unwrap(),
            json!(false)
        );
        assert_eq!(
            schema.validate("lc_details.is_lc_issued", &json!(true)).unwrap(),
            json!(true)
        );
        assert!(schema.validate("lc_details.is_lc_issued", &json!("maybe")).is_err());
    }

    #[test]
    fn test_date_normalization() {
        let schema = FormSchema::letter_of_credit();
        assert_eq!(
            schema.validate("lc_details.lc_issuing_date", &json!("2025-01-15")).unwrap(),
            json!("2025-01-15")
        );
        assert_eq!(
            schema.validate("lc_details.lc_issuing_date", &json!("15/01/2025")).unwrap(),
            json!("2025-01-15")
        );
        assert!(schema
            .validate("lc_details.lc_issuing_date", &json!("next week"))
            .is_err());
    }

    #[test]
    fn test_string_max_length() {
        let schema = FormSchema::letter_of_credit();
        let ok = "Cotton fabric rolls";
        assert!(schema
            .validate("shipment_details.product_description", &json!(ok))
            .is_ok());

        let long = "x".repeat(51);
        assert!(schema
            .validate("shipment_details.product_description", &json!(long))
            .is_err());
    }

    #[test]
    fn test_array_is_shallowly_accepted() {
        let schema = FormSchema::letter_of_credit();
        let banks = json!([{"country": "UAE", "bank": "Emirates NBD", "city": "Dubai", "swift_code": "EBILAEAD"}]);
        assert!(schema
            .validate("lc_confirmation.preferred_confirming_banks", &banks)
            .is_ok());
        assert!(schema
            .validate("lc_confirmation.preferred_confirming_banks", &json!("Emirates NBD"))
            .is_err());
    }

    #[test]
    fn test_null_always_passes() {
        let schema = FormSchema::letter_of_credit();
        assert_eq!(
            schema.validate("amount_and_payment.amount_usd", &Value::Null).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_missing_paths_in_definition_order() {
        let schema = FormSchema::letter_of_credit();
        let mut fields = FieldMap::new();
        fields.insert("amount_and_payment.amount_usd".into(), json!(50000));
        fields.insert("importer_info.applicant_name".into(), json!("Ali Osaid"));

        let missing = schema.missing_paths(&fields);
        assert_eq!(missing[0], "transaction_role.role_in_transaction");
        assert_eq!(missing[1], "amount_and_payment.payment_terms");
        assert!(!missing.contains(&"amount_and_payment.amount_usd".to_string()));
        assert!(!missing.contains(&"importer_info.applicant_name".to_string()));

        // Order matches all_required_paths with the provided entries removed.
        let expected: Vec<String> = schema
            .all_required_paths()
            .into_iter()
            .filter(|p| !fields.contains_key(p))
            .collect();
        assert_eq!(missing, expected);
    }

    #[test]
    fn test_null_counts_as_missing() {
        let schema = FormSchema::letter_of_credit();
        let mut fields = FieldMap::new();
        fields.insert("transaction_role.role_in_transaction".into(), Value::Null);
        let missing = schema.missing_paths(&fields);
        assert!(missing.contains(&"transaction_role.role_in_transaction".to_string()));
    }

    #[test]
    fn test_no_missing_when_all_required_present() {
        let schema = FormSchema::letter_of_credit();
        let mut fields = FieldMap::new();
        for path in schema.all_required_paths() {
            fields.insert(path, json!("x"));
        }
        assert!(schema.missing_paths(&fields).is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.yaml");
        std::fs::write(
            &path,
            r#"
name: tiny
sections:
  - name: basics
    fields:
      - name: full_name
        type: string
        required: true
        aliases: ["name"]
"#,
        )
        .unwrap();

        let schema = FormSchema::load(&path).unwrap();
        assert_eq!(schema.name, "tiny");
        assert_eq!(schema.resolve("name").as_deref(), Some("basics.full_name"));

        assert!(matches!(
            FormSchema::load(dir.path().join("nope.yaml")),
            Err(SchemaError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_paths_rejected() {
        let yaml = r#"
name: broken
sections:
  - name: a
    fields:
      - name: x
        type: string
      - name: x
        type: number
"#;
        assert!(matches!(FormSchema::from_yaml(yaml), Err(SchemaError::Parse(_))));
    }
}
