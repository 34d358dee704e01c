//! # Voice Intake Agent
//!
//! The glue between the form schema, the voice platform and the LLM:
//!
//! - [`builder`] turns a schema plus already-provided form data into a
//!   fully configured assistant request for the voice platform.
//! - [`extractor`] turns a finished call transcript into schema-conformant
//!   field values via an LLM, treating the model's reply as untrusted text
//!   until every field survives schema validation.
//! - [`merge`] combines provided and extracted data into the final record
//!   handed back to the caller, with a coverage-based confidence grade.
//!
//! Nothing in this crate talks to the network except
//! [`TranscriptExtractor::extract`], which delegates to the LLM client.

pub mod builder;
pub mod extractor;
pub mod fields;
pub mod merge;

pub use builder::{build_assistant, BuiltAssistant};
pub use extractor::{
    extraction_system_prompt, extraction_user_prompt, process_reply, TranscriptExtractor,
};
pub use fields::{conform_fields, ConformMode};
pub use merge::{merge, merge_record, CompleteRecord, Confidence};
