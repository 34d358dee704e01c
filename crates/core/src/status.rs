//! Call lifecycle status.

use serde::{Deserialize, Serialize};

/// Lifecycle of a voice call as this service sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    /// Created but not yet connected.
    Pending,
    /// Conversation in progress.
    Active,
    /// Call finished normally.
    Ended,
    /// Call failed on the platform side.
    Failed,
}

impl CallStatus {
    /// Map a platform status string onto the local lifecycle.
    ///
    /// Unknown strings map to `Pending` so pollers keep polling rather than
    /// treating a status we have never seen as terminal.
    pub fn from_platform(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "queued" | "ringing" | "scheduled" => CallStatus::Pending,
            "in-progress" | "forwarding" => CallStatus::Active,
            "ended" | "completed" => CallStatus::Ended,
            "failed" | "error" => CallStatus::Failed,
            _ => CallStatus::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CallStatus::Ended | CallStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Pending => "pending",
            CallStatus::Active => "active",
            CallStatus::Ended => "ended",
            CallStatus::Failed => "failed",
        }
    }
}
