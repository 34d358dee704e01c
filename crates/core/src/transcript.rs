//! Conversation transcripts.

use serde::{Deserialize, Serialize};

/// Who spoke a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerRole {
    Agent,
    User,
}

impl SpeakerRole {
    /// Upper-case label used in the plain-text rendering.
    pub fn label(&self) -> &'static str {
        match self {
            SpeakerRole::Agent => "AGENT",
            SpeakerRole::User => "USER",
        }
    }
}

/// One utterance in a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptTurn {
    pub role: SpeakerRole,
    pub text: String,
}

/// Ordered turns of a call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub turns: Vec<TranscriptTurn>,
}

impl Transcript {
    pub fn new(turns: Vec<TranscriptTurn>) -> Self {
        Self { turns }
    }

    pub fn push(&mut self, role: SpeakerRole, text: impl Into<String>) {
        self.turns.push(TranscriptTurn { role, text: text.into() });
    }

    /// True when nothing was said. Turns holding only whitespace count as
    /// nothing.
    pub fn is_empty(&self) -> bool {
        self.turns.iter().all(|t| t.text.trim().is_empty())
    }

    /// Render as `ROLE: text` lines, one turn per line.
    pub fn to_plain_text(&self) -> String {
        self.turns
            .iter()
            .map(|t| format!("{}: {}", t.role.label(), t.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
