//! Schema conformance for flat field maps.
//!
//! Both the web form and the LLM hand us loosely-keyed JSON objects. This
//! module is the single place that turns those into canonical
//! `section.field` maps, so everything downstream can assume keys resolve
//! and values passed validation.

use lc_voice_config::{FieldType, FormSchema, SchemaError};
use lc_voice_core::FieldMap;

/// What to do with fields the schema rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConformMode {
    /// Fail on the first unknown key or invalid value. Used for
    /// caller-supplied form data, where bad input is a client error the
    /// caller must hear about.
    Strict,
    /// Drop unknown keys and invalid values, keep the rest. Used for LLM
    /// output, where one stray field must not sink the whole extraction.
    Drop,
}

/// Resolves every key against the schema and validates every value.
///
/// Returns a new map keyed by canonical `section.field` paths with
/// normalized values. Null values are skipped in both modes: the form and
/// the model both send null to mean "nothing here", and downstream code
/// treats null and absent the same way.
pub fn conform_fields(
    schema: &FormSchema,
    fields: &FieldMap,
    mode: ConformMode,
) -> lc_voice_core::Result<FieldMap> {
    let mut out = FieldMap::new();
    for (key, value) in fields {
        if value.is_null() {
            continue;
        }
        let Some(path) = schema.resolve(key) else {
            match mode {
                ConformMode::Strict => {
                    return Err(SchemaError::UnknownField(key.clone()).into());
                }
                ConformMode::Drop => {
                    tracing::warn!(field = %key, "Dropping unrecognized field");
                    continue;
                }
            }
        };
        match schema.validate(&path, value) {
            Ok(normalized) => {
                out.insert(path, normalized);
            }
            Err(err) => match mode {
                ConformMode::Strict => return Err(err.into()),
                ConformMode::Drop => {
                    tracing::warn!(field = %path, error = %err, "Dropping invalid value");
                }
            },
        }
    }
    Ok(out)
}

/// Lowercase type label used when describing fields in prompts.
pub(crate) fn type_label(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::String => "string",
        FieldType::Number => "number",
        FieldType::Boolean => "boolean",
        FieldType::Date => "date",
        FieldType::Array => "array",
    }
}
