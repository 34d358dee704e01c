//! Merging form data with call-collected data into the final record.

use serde::Serialize;

use lc_voice_config::FormSchema;
use lc_voice_core::FieldMap;

/// Confidence grade for a completed record, derived from how much of the
/// required schema the merged data covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// Grade from required-field coverage. A schema with no required fields
    /// is trivially covered.
    pub fn from_coverage(present: usize, required: usize) -> Self {
        if required == 0 {
            return Confidence::High;
        }
        let ratio = present as f64 / required as f64;
        if ratio >= 0.7 {
            Confidence::High
        } else if ratio >= 0.4 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

/// Merge provided and collected values, walking the schema in definition
/// order. The form wins every conflict: a value the customer typed is never
/// overwritten by one the model heard. Null on either side counts as
/// absent, and keys outside the schema never reach the output.
pub fn merge(schema: &FormSchema, provided: &FieldMap, collected: &FieldMap) -> FieldMap {
    let mut out = FieldMap::new();
    for field in schema.fields() {
        let path = field.path();
        let value = provided
            .get(&path)
            .filter(|v| !v.is_null())
            .or_else(|| collected.get(&path).filter(|v| !v.is_null()));
        if let Some(value) = value {
            out.insert(path, value.clone());
        }
    }
    out
}

/// The final record for a finished intake session.
#[derive(Debug, Clone, Serialize)]
pub struct CompleteRecord {
    /// Merged field values keyed by canonical path.
    pub complete: FieldMap,
    /// Paths the customer filled in on the form.
    pub provided_paths: Vec<String>,
    /// Paths collected on the call that the form had not covered.
    pub collected_paths: Vec<String>,
    /// Required paths still absent after the merge.
    pub missing: Vec<String>,
    pub confidence: Confidence,
}

/// Merge and annotate with provenance, gaps, and a confidence grade.
pub fn merge_record(
    schema: &FormSchema,
    provided: &FieldMap,
    collected: &FieldMap,
) -> CompleteRecord {
    let complete = merge(schema, provided, collected);

    let provided_paths: Vec<String> = schema
        .fields()
        .map(|f| f.path())
        .filter(|p| provided.get(p).is_some_and(|v| !v.is_null()))
        .collect();
    let collected_paths: Vec<String> = schema
        .fields()
        .map(|f| f.path())
        .filter(|p| !provided_paths.contains(p))
        .filter(|p| collected.get(p).is_some_and(|v| !v.is_null()))
        .collect();

    let missing = schema.missing_paths(&complete);
    let required = schema.all_required_paths().len();
    let confidence = Confidence::from_coverage(required - missing.len(), required);

    CompleteRecord { complete, provided_paths, collected_paths, missing, confidence }
}
