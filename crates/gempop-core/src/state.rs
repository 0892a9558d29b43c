//! UI-agnostic application state types
//!
//! This module contains data structures that are shared between the TUI and
//! the one-shot CLI and don't depend on any specific UI framework.

use serde::{Deserialize, Serialize};

/// Opaque identifier for a transcript entry, unique within one transcript
pub type MessageId = u64;

/// A chat message in the conversation transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: ChatRole,
    pub text: String,
    pub is_error: bool,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    User,
    Model,
}

impl ChatRole {
    /// Role name on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        }
    }
}

/// A citation link attached to a grounded answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub title: String,
    pub uri: String,
}

/// Answer text plus the sources it was grounded on, in provider order
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroundingResult {
    pub text: String,
    pub sources: Vec<GroundingSource>,
}

/// Request lifecycle of one mode controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestStatus {
    #[default]
    Idle,
    Loading,
    Done,
    Error,
}

/// A latitude/longitude pair used to bias place lookups
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}
