//! Per-call assistant generation.
//!
//! Every call gets a complete inline assistant definition whose
//! conversation instructions are rendered from the form schema plus the
//! data the customer already typed in. Model and voice settings come from
//! configuration, and webhook routing points back at this service. The
//! instructions are never hand-maintained; adding a field to the schema is
//! enough to make the assistant ask for it.

use serde_json::{json, Value};

use lc_voice_config::{AssistantConfig, FormSchema};
use lc_voice_core::{nest, FieldMap};
use lc_voice_platform::{AssistantModel, AssistantPrompt, AssistantRequest, AssistantVoice};

use crate::fields::{conform_fields, type_label, ConformMode};

/// An assistant definition ready to start a call, plus the conformed data
/// it was generated from.
#[derive(Debug, Clone)]
pub struct BuiltAssistant {
    /// Inline assistant definition for the voice platform.
    pub request: AssistantRequest,
    /// Provided fields after schema conformance, keyed by canonical path.
    pub provided: FieldMap,
    /// Required paths the call still has to collect.
    pub missing: Vec<String>,
}

/// Build the per-call assistant from the schema, the assistant settings,
/// and the fields the customer already provided.
///
/// Provided data is validated strictly: a form sending an unknown key or a
/// bad enum value is rejected before any call is placed.
pub fn build_assistant(
    schema: &FormSchema,
    config: &AssistantConfig,
    provided: &FieldMap,
) -> lc_voice_core::Result<BuiltAssistant> {
    let provided = conform_fields(schema, provided, ConformMode::Strict)?;
    let missing = schema.missing_paths(&provided);

    let system_prompt = render_system_prompt(schema, config, &provided);
    let first_message = config
        .first_message
        .clone()
        .unwrap_or_else(|| default_first_message(&config.company_name));

    let metadata = json!({
        "provided_lc_data": nest(&provided),
        "purpose": "lc_form_completion",
    });
    let server_url = config
        .server_url
        .as_ref()
        .map(|base| format!("{}/webhook/voice", base.trim_end_matches('/')));

    let request = AssistantRequest {
        first_message,
        model: AssistantModel {
            provider: config.model_provider.clone(),
            model: config.model.clone(),
            messages: vec![AssistantPrompt {
                role: "system".to_string(),
                content: system_prompt,
            }],
            temperature: config.temperature,
        },
        voice: AssistantVoice {
            provider: config.voice_provider.clone(),
            voice_id: config.voice_id.clone(),
        },
        silence_timeout_seconds: config.silence_timeout_seconds,
        max_duration_seconds: config.max_duration_seconds,
        end_call_message: config.end_call_message.clone(),
        end_call_phrases: config.end_call_phrases.clone(),
        server_url,
        metadata: Some(metadata),
    };

    Ok(BuiltAssistant { request, provided, missing })
}

fn default_first_message(company_name: &str) -> String {
    format!(
        "Hello! Thank you for starting your LC application with {}. I can see you've \
         already filled out some information. I just need to collect a few more details \
         to complete your application. This should only take a few minutes. Are you \
         ready to continue?",
        company_name
    )
}

/// Render the conversation instructions for one call.
fn render_system_prompt(
    schema: &FormSchema,
    config: &AssistantConfig,
    provided: &FieldMap,
) -> String {
    let company = &config.company_name;
    let form_title = schema.name.replace('_', " ");
    let provided_summary = provided_summary(schema, provided);
    let fields_section = fields_to_collect(schema, provided);

    // Example lines for the enum guidelines, built from the first enum
    // field the call still has to collect.
    let (enum_option_line, ask_example_line) = match enum_example(schema, provided) {
        Some((name, options)) => (
            format!(
                "\n   - Example: \"For the {}, we offer {}. Which would you prefer?\"",
                name, options
            ),
            format!(
                "\n   - Example: If they don't mention {}, ask: \"What {} would you prefer - {}?\"",
                name, name, options
            ),
        ),
        None => (String::new(), String::new()),
    };

    let enum_samples: Vec<String> = schema
        .fields()
        .filter(|r| r.field.is_enum())
        .filter_map(|r| r.field.values.first())
        .take(3)
        .map(|v| format!("\"{}\"", v))
        .collect();
    let exact_values_hint = if enum_samples.is_empty() {
        String::new()
    } else {
        format!(" (e.g., {})", enum_samples.join(", "))
    };

    format!(
        r#"You are a professional and friendly voice assistant for {company}, a trade finance company.

YOUR ROLE:
You are helping complete a {form_title} application form. The customer has already filled out some fields on our website, and you need to collect the REMAINING information through a natural conversation.

ALREADY PROVIDED INFORMATION:
{provided_summary}

{fields_section}

CONVERSATION GUIDELINES:

1. **Natural Flow**:
   - Have a natural conversation, don't make it feel like a rigid form
   - Ask questions conversationally, not robotically
   - Group related questions together when appropriate

2. **Confirmation**:
   - For critical information (amounts, dates, names), always confirm by reading back
   - If something sounds unclear, politely ask for clarification

3. **Handling Enum Fields** (fields with specific options):
   - When asking about these fields, mention the available options{enum_option_line}
   - If they use different terminology, map it to the correct option

4. **Professional Yet Friendly**:
   - Be warm and conversational
   - Use phrases like "Great!", "Perfect!", "Thank you for that information"
   - If they don't know something, reassure them it's okay

5. **Efficiency**:
   - Don't ask for information that's already provided
   - Keep questions concise and clear
   - Move through the form efficiently while maintaining a friendly tone

6. **Closing**:
   - Once you've collected all the missing information, summarize what was collected
   - Confirm next steps
   - Thank them for their time

7. **If User Doesn't Mention a Field**:
   - ALWAYS ask about that field explicitly
   - Don't skip any missing fields{ask_example_line}
   - Go through ALL missing fields systematically
   - If they say "I don't know", mark it as null and move to next field
   - NEVER end the call until you've asked about EVERY missing field listed above

EXAMPLE CONVERSATION FLOW:

"Hello! Thank you for starting your {form_title} application with {company}. I see you've already provided [mention a key field they filled]. I just need to collect a few more details to complete your application. This should only take a few minutes. Shall we begin?"

[Collect information naturally - go through EACH missing field]

"Perfect! Let me confirm what we've collected today... [summary]. Does everything sound correct?"

"Excellent! We now have all the information needed for your {form_title} application. Our team will review this and get back to you within 24 hours. Is there anything else you'd like to know?"

DATA EXTRACTION:
As you collect information, structure it according to the {form_title} form schema. Return data in proper JSON format with lowercase snake_case keys matching the schema sections and fields.

IMPORTANT RULES:
- ONLY collect information for the missing fields listed above
- For enum fields, use EXACT values from the options{exact_values_hint}
- If customer says they don't know something, mark it as null and move to next field
- ALWAYS ask about EVERY missing field - never skip fields
- If user doesn't mention a field, ASK them about it explicitly
- Always be respectful of their time
- Only end the conversation once ALL missing fields have been addressed (either collected or marked as unknown)
- Do NOT end the call prematurely - ensure completeness"#
    )
}

/// Human-readable lines for the fields the customer already filled in.
fn provided_summary(schema: &FormSchema, provided: &FieldMap) -> String {
    let lines: Vec<String> = schema
        .fields()
        .filter_map(|r| {
            let value = provided.get(&r.path()).filter(|v| !v.is_null())?;
            Some(format!("- {}: {}", r.field.name, display_value(value)))
        })
        .collect();
    if lines.is_empty() {
        "No fields have been provided yet.".to_string()
    } else {
        lines.join("\n")
    }
}

/// The fields the call still has to collect, grouped by section.
fn fields_to_collect(schema: &FormSchema, provided: &FieldMap) -> String {
    let mut sections = String::new();
    for section in &schema.sections {
        let mut lines = String::new();
        for field in &section.fields {
            let path = format!("{}.{}", section.name, field.name);
            if provided.contains_key(&path) {
                continue;
            }
            lines.push_str(&format!("\n- {} ({})\n", field.name, type_label(field.field_type)));
            if !field.aliases.is_empty() {
                lines.push_str(&format!("  Can also be called: {}\n", field.aliases.join(", ")));
            }
            if field.is_enum() {
                lines.push_str(&format!("  MUST be one of: {}\n", field.values.join(", ")));
            }
        }
        if !lines.is_empty() {
            sections.push_str(&format!("\n**{}:**\n{}", section.heading(), lines));
        }
    }
    if sections.is_empty() {
        "All fields have been provided. No additional information needed.".to_string()
    } else {
        format!("FIELDS TO COLLECT:\n{}", sections)
    }
}

/// First enum field the call still has to collect, as a display name plus
/// an "A, B, or C" option list. Falls back to any enum field so the
/// guidelines always carry a concrete example when the schema has one.
fn enum_example(schema: &FormSchema, provided: &FieldMap) -> Option<(String, String)> {
    let pick = schema
        .fields()
        .find(|r| r.field.is_enum() && !provided.contains_key(&r.path()))
        .or_else(|| schema.fields().find(|r| r.field.is_enum()))?;
    Some((
        pick.field.name.replace('_', " "),
        join_options(&pick.field.values),
    ))
}

fn join_options(values: &[String]) -> String {
    match values {
        [] => String::new(),
        [only] => only.clone(),
        [a, b] => format!("{} or {}", a, b),
        [head @ .., last] => format!("{}, or {}", head.join(", "), last),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
