//! Transcript extraction.
//!
//! After a call ends, the transcript goes to an LLM with a prompt rendered
//! from the form schema, and the reply comes back as loosely-shaped JSON.
//! The reply is untrusted: it is parsed tolerantly, then every field must
//! resolve and validate against the schema before it counts as collected.
//! Fields the model invents or fills with off-list values are dropped, not
//! stored.

use lc_voice_config::{FieldDefinition, FormSchema};
use lc_voice_core::{flatten, nest, FieldMap, Transcript};
use lc_voice_llm::{parse_json_object, LlmClient};

use crate::fields::{conform_fields, type_label, ConformMode};

/// Runs the post-call extraction exchange.
pub struct TranscriptExtractor {
    llm: LlmClient,
}

impl TranscriptExtractor {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    /// Extract newly collected fields from a finished call.
    ///
    /// An empty transcript extracts nothing; that is a normal outcome for a
    /// call that ended before the customer said anything usable.
    pub async fn extract(
        &self,
        schema: &FormSchema,
        provided: &FieldMap,
        transcript: &Transcript,
    ) -> lc_voice_core::Result<FieldMap> {
        if transcript.is_empty() {
            tracing::debug!("Transcript is empty, nothing to extract");
            return Ok(FieldMap::new());
        }

        let system = extraction_system_prompt(schema);
        let user = extraction_user_prompt(schema, provided, transcript);
        let reply = self.llm.complete(&system, &user).await?;
        tracing::debug!(reply_len = reply.len(), "Received extraction reply");

        process_reply(schema, &reply)
    }
}

/// Turn a raw model reply into schema-conformant fields.
///
/// A reply with no JSON object anywhere is an extraction failure. A reply
/// with a JSON object keeps every field that survives schema validation and
/// drops the rest, so one hallucinated key cannot void a whole call.
pub fn process_reply(schema: &FormSchema, reply: &str) -> lc_voice_core::Result<FieldMap> {
    let Some(object) = parse_json_object(reply) else {
        return Err(lc_voice_core::Error::ExtractionFailed(
            "Model reply did not contain a JSON object".to_string(),
        ));
    };
    let raw = flatten(&object);
    conform_fields(schema, &raw, ConformMode::Drop)
}

/// Render the extraction instructions from the schema: field guide with
/// aliases, enum enforcement, special mapping rules, and the expected
/// output shape.
pub fn extraction_system_prompt(schema: &FormSchema) -> String {
    let mut prompt = String::from(
        "You are an expert in extracting structured information from trade finance \
         conversations.\n\n\
         TASK: Extract ALL available information from the conversation and map it to the \
         form schema below.\n\n\
         The conversation may use different terminology or wording, but you MUST match \
         the data to these exact fields. Use the aliases provided to help identify fields \
         even when they have different names.\n",
    );

    prompt.push_str("\n=== FORM SCHEMA ===\n");
    prompt.push_str(&field_guide(schema));

    let enums = enum_section(schema);
    if !enums.is_empty() {
        prompt.push_str("\n=== CRITICAL: ENUM FIELDS (Use EXACT values only) ===\n");
        prompt.push_str(&enums);
    }

    let mappings = special_mapping_section(schema);
    if !mappings.is_empty() {
        prompt.push_str("\n=== SPECIAL MAPPING RULES ===\n");
        prompt.push_str(&mappings);
    }

    prompt.push_str("\n=== EXTRACTION RULES ===\n\n");
    prompt.push_str(&extraction_rules(schema));

    prompt.push_str("\n=== OUTPUT STRUCTURE ===\nReturn the data in this JSON structure:\n");
    prompt.push_str(&render_output_structure(schema));

    prompt.push_str(
        "\n\nIMPORTANT:\n\
         1. Return ONLY valid JSON without markdown formatting or code blocks\n\
         2. ALL JSON keys MUST be lowercase snake_case format\n\
         3. Use EXACT enum values as listed in the ENUM FIELDS section above\n\
         4. Do NOT modify or abbreviate enum values",
    );
    prompt
}

/// Render the per-call user message: context, already-provided data, and
/// the transcript.
pub fn extraction_user_prompt(
    schema: &FormSchema,
    provided: &FieldMap,
    transcript: &Transcript,
) -> String {
    let form_title = schema.name.replace('_', " ");
    let provided_json =
        serde_json::to_string_pretty(&nest(provided)).unwrap_or_else(|_| "{}".to_string());

    format!(
        r#"CONTEXT:
The customer was having a voice conversation to complete their {form_title} form. Some fields were already provided before the call:

Already Provided:
{provided_json}

TRANSCRIPT OF THE VOICE CONVERSATION:
{transcript_text}

TASK:
Extract ONLY the NEW information that was collected during this voice conversation. Do NOT include the information that was already provided before the call.

Return a JSON object with ONLY the fields that were discussed and collected during this call."#,
        transcript_text = transcript.to_plain_text()
    )
}

fn field_guide(schema: &FormSchema) -> String {
    let mut out = String::new();
    for section in &schema.sections {
        out.push_str(&format!("\n**{}:**\n", section.heading()));
        for field in &section.fields {
            out.push_str(&format!(
                "  - {} (type: {})\n",
                field.name,
                type_label(field.field_type)
            ));
            if !field.aliases.is_empty() {
                out.push_str(&format!("    Aliases: {}\n", field.aliases.join(", ")));
            }
            if field.is_enum() {
                out.push_str(&format!(
                    "    **ENUM - MUST use one of: {}**\n",
                    field.values.join(", ")
                ));
            }
            if let Some(note) = &field.note {
                out.push_str(&format!("    Note: {}\n", note));
            }
        }
    }
    out
}

fn enum_section(schema: &FormSchema) -> String {
    let mut out = String::new();
    for r in schema.fields().filter(|r| r.field.is_enum()) {
        out.push_str(&format!("\n{}:\n", r.field.name));
        for option in &r.field.values {
            out.push_str(&format!("  - \"{}\"\n", option));
        }
        if let Some(mapping) = &r.field.special_mapping {
            out.push_str(&format!("  Special Rule: {}\n", mapping.description));
        }
    }
    out
}

fn special_mapping_section(schema: &FormSchema) -> String {
    let mut out = String::new();
    for r in schema.fields() {
        let Some(mapping) = &r.field.special_mapping else {
            continue;
        };
        out.push_str(&format!("\n{}:\n  {}\n", r.field.name, mapping.description));
        for rule in &mapping.rules {
            out.push_str(&format!("  - {}\n", rule));
        }
    }
    out
}

fn extraction_rules(schema: &FormSchema) -> String {
    let alias_example = schema
        .fields()
        .filter(|r| !r.field.aliases.is_empty())
        .max_by_key(|r| r.field.aliases.len())
        .map(|r| {
            let samples: Vec<String> = r
                .field
                .aliases
                .iter()
                .take(3)
                .map(|a| format!("\"{}\"", a))
                .collect();
            format!(
                "\n   - Example: {} all map to {}",
                samples.join(", "),
                r.field.name
            )
        })
        .unwrap_or_default();

    format!(
        r#"1. **Field Matching**: Use the aliases to identify fields even if they're worded differently{alias_example}

2. **Data Types**:
   - string: Extract as text
   - number: Extract only numeric values (remove currency symbols, commas)
   - date: Keep the format from the conversation (DD/MM/YYYY or YYYY-MM-DD)
   - boolean: Convert "Yes/No" answers to true/false
   - array: Extract multiple items as a list

3. **ENUM FIELDS (MUST USE EXACT VALUES)**:
   For fields marked with **ENUM**, you MUST return EXACTLY one of the listed values. Do NOT use variations or similar words. When the customer uses informal wording, apply the special mapping rules above to land on the exact value.

4. **Missing Fields**: If a field was not discussed in the conversation, set it to null

5. **Field Notes**: Some fields carry a Note in the schema above. Follow it when deriving the value, including any date arithmetic it describes.

6. **Smart Extraction**:
   - Look for variations in terminology
   - Handle abbreviations
   - Understand context (e.g., amounts near "USD" are in USD)

7. **Output Format**: Return a well-structured JSON object with sections matching the schema
   - ALL JSON keys MUST be lowercase snake_case
   - Group fields by their section
   - Use the exact field names from the schema
   - Ensure proper data types
   - Use EXACT enum values as specified above
"#
    )
}

/// JSON skeleton for the reply. Sections holding a single field collapse
/// to a top-level key, which is also how the schema resolves such keys on
/// the way back in.
fn render_output_structure(schema: &FormSchema) -> String {
    let mut out = String::from("{\n");
    let last_section = schema.sections.len().saturating_sub(1);
    for (i, section) in schema.sections.iter().enumerate() {
        if let [field] = section.fields.as_slice() {
            out.push_str(&format!("  \"{}\": {}", section.name, value_hint(field)));
        } else {
            out.push_str(&format!("  \"{}\": {{\n", section.name));
            let last_field = section.fields.len().saturating_sub(1);
            for (j, field) in section.fields.iter().enumerate() {
                out.push_str(&format!("    \"{}\": {}", field.name, value_hint(field)));
                if j != last_field {
                    out.push(',');
                }
                out.push('\n');
            }
            out.push_str("  }");
        }
        if i != last_section {
            out.push(',');
        }
        out.push('\n');
    }
    out.push('}');
    out
}

fn value_hint(field: &FieldDefinition) -> String {
    if field.is_enum() {
        field
            .values
            .iter()
            .map(|v| format!("\"{}\"", v))
            .collect::<Vec<_>>()
            .join(" | ")
    } else {
        type_label(field.field_type).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lc_voice_core::{Error, SpeakerRole};
    use lc_voice_llm::LlmConfig;
    use serde_json::json;

    fn schema() -> FormSchema {
        FormSchema::letter_of_credit()
    }

    fn transcript() -> Transcript {
        let mut t = Transcript::default();
        t.push(SpeakerRole::Agent, "What payment terms would you prefer?");
        t.push(SpeakerRole::User, "At sight, please.");
        t
    }

    #[test]
    fn system_prompt_renders_schema() {
        let prompt = extraction_system_prompt(&schema());

        assert!(prompt.contains("**TRANSACTION ROLE:**"));
        assert!(prompt.contains("  - amount_usd (type: number)"));
        assert!(prompt.contains("Aliases: transaction role, role, party type, transaction type"));
        assert!(prompt.contains("**ENUM - MUST use one of: Sight LC, Usance LC, Deferred LC, UPAS LC**"));
        // Field notes surface next to their field.
        assert!(prompt.contains("Note: If the customer gives validity in days"));
    }

    #[test]
    fn system_prompt_renders_enum_enforcement() {
        let prompt = extraction_system_prompt(&schema());

        assert!(prompt.contains("=== CRITICAL: ENUM FIELDS (Use EXACT values only) ==="));
        assert!(prompt.contains("  - \"Sight LC\""));
        assert!(prompt.contains(
            "Special Rule: ANY bank from ANY country should ALWAYS be mapped to 'All_Banks'"
        ));
    }

    #[test]
    fn system_prompt_renders_special_mappings() {
        let prompt = extraction_system_prompt(&schema());

        assert!(prompt.contains("=== SPECIAL MAPPING RULES ==="));
        assert!(prompt.contains("  - sight payment or at sight -> Sight LC"));
        assert!(prompt.contains("  - sea or ocean -> Port"));
        assert!(prompt.contains("  - Any specific bank name -> All_Banks"));
    }

    #[test]
    fn system_prompt_alias_example_uses_richest_field() {
        let prompt = extraction_system_prompt(&schema());
        assert!(prompt.contains(
            "Example: \"bidding deadline\", \"last date\", \"deadline\" all map to last_date_for_bids"
        ));
    }

    #[test]
    fn output_structure_collapses_single_field_sections() {
        let rendered = render_output_structure(&schema());

        assert!(rendered.contains(
            "\"transaction_role\": \"Exporter/Supplier (Beneficiary)\" | \"Importer (Applicant)\""
        ));
        assert!(rendered.contains("\"amount_and_payment\": {"));
        assert!(rendered.contains("\"amount_usd\": number"));
        assert!(rendered.contains(
            "\"payment_terms\": \"Sight LC\" | \"Usance LC\" | \"Deferred LC\" | \"UPAS LC\""
        ));
        assert!(rendered.contains("\"bidding_deadline\": date"));
        // The skeleton itself must be parseable structure-wise: balanced braces.
        let opens = rendered.matches('{').count();
        let closes = rendered.matches('}').count();
        assert_eq!(opens, closes);
    }

    #[test]
    fn user_prompt_carries_context_and_transcript() {
        let schema = schema();
        let mut provided = FieldMap::new();
        provided.insert("amount_and_payment.amount_usd".to_string(), json!(50000));

        let prompt = extraction_user_prompt(&schema, &provided, &transcript());

        assert!(prompt.contains("complete their letter of credit form"));
        assert!(prompt.contains("Already Provided:"));
        assert!(prompt.contains("\"amount_usd\": 50000"));
        assert!(prompt.contains("TRANSCRIPT OF THE VOICE CONVERSATION:"));
        assert!(prompt.contains("AGENT: What payment terms would you prefer?"));
        assert!(prompt.contains("USER: At sight, please."));
        assert!(prompt.contains("Extract ONLY the NEW information"));
    }

    #[test]
    fn reply_with_sections_conforms_to_canonical_paths() {
        let schema = schema();
        let reply = r#"{
            "amount_and_payment": {"payment_terms": "Sight LC"},
            "shipment_details": {"port_of_loading": "Karachi"}
        }"#;

        let collected = process_reply(&schema, reply).unwrap();
        assert_eq!(
            collected.get("amount_and_payment.payment_terms"),
            Some(&json!("Sight LC"))
        );
        assert_eq!(
            collected.get("shipment_details.port_of_loading"),
            Some(&json!("Karachi"))
        );
    }

    #[test]
    fn fenced_reply_is_parsed() {
        let schema = schema();
        let reply = "Here is the extracted data:\n```json\n{\"lc_details\": {\"lc_type\": \"International\"}}\n```";

        let collected = process_reply(&schema, reply).unwrap();
        assert_eq!(collected.get("lc_details.lc_type"), Some(&json!("International")));
    }

    #[test]
    fn top_level_scalar_section_resolves() {
        let schema = schema();
        let reply = r#"{"transaction_role": "Importer (Applicant)"}"#;

        let collected = process_reply(&schema, reply).unwrap();
        assert_eq!(
            collected.get("transaction_role.role_in_transaction"),
            Some(&json!("Importer (Applicant)"))
        );
    }

    #[test]
    fn off_list_enum_values_are_dropped() {
        let schema = schema();
        let reply = r#"{
            "amount_and_payment": {"payment_terms": "Cash", "amount_usd": 75000},
            "made_up_section": {"made_up_field": true}
        }"#;

        let collected = process_reply(&schema, reply).unwrap();
        assert_eq!(collected.len(), 1);
        assert_eq!(collected.get("amount_and_payment.amount_usd"), Some(&json!(75000)));
    }

    #[test]
    fn null_fields_in_reply_are_skipped() {
        let schema = schema();
        let reply = r#"{"shipment_details": {"port_of_loading": "Karachi", "port_of_destination": null}}"#;

        let collected = process_reply(&schema, reply).unwrap();
        assert_eq!(collected.len(), 1);
        assert!(!collected.contains_key("shipment_details.port_of_destination"));
    }

    #[test]
    fn garbage_reply_is_an_extraction_failure() {
        let schema = schema();
        let err = process_reply(&schema, "I could not find any structured data.").unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed(_)));
    }

    #[tokio::test]
    async fn empty_transcript_extracts_nothing() {
        let schema = schema();
        let llm = LlmClient::new(LlmConfig::new("test-key")).unwrap();
        let extractor = TranscriptExtractor::new(llm);

        let collected = extractor
            .extract(&schema, &FieldMap::new(), &Transcript::default())
            .await
            .unwrap();
        assert!(collected.is_empty());
    }
}
