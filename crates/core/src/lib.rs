//! Core types shared across the LC voice intake service.
//!
//! Field maps, transcripts, call status, and the service-wide error
//! taxonomy live here so the subsystem crates agree on one vocabulary.

pub mod error;
pub mod record;
pub mod status;
pub mod transcript;

pub use error::{Error, Result};
pub use record::{flatten, nest, FieldMap};
pub use status::CallStatus;
pub use transcript::{SpeakerRole, Transcript, TranscriptTurn};
