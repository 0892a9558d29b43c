//! Chat transcript and the chat mode controller
//!
//! The transcript is append-only. The only in-place edit is the text of the
//! model reply currently being streamed.

use tracing::{debug, error};

use crate::aggregator::{aggregate, StreamUpdate};
use crate::error::GatewayError;
use crate::gateway::{ChatSession, Gateway};
use crate::mode::Mode;
use crate::prompts::CHAT_SYSTEM_INSTRUCTION;
use crate::state::{ChatMessage, ChatRole, MessageId, RequestStatus};

pub const CHAT_GREETING: &str =
    "Hi! I'm your Gemini assistant. How can I help you while you browse?";

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    next_id: MessageId,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_greeting() -> Self {
        let mut transcript = Self::new();
        transcript.push(ChatRole::Model, CHAT_GREETING);
        transcript
    }

    pub fn push(&mut self, role: ChatRole, text: &str) -> MessageId {
        self.next_id += 1;
        let id = self.next_id;
        self.messages.push(ChatMessage {
            id,
            role,
            text: text.to_string(),
            is_error: false,
        });
        id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn get(&self, id: MessageId) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Apply a streaming update to one message. Returns false for unknown ids.
    pub fn apply(&mut self, id: MessageId, update: &StreamUpdate) -> bool {
        let Some(message) = self.messages.iter_mut().find(|m| m.id == id) else {
            return false;
        };

        match update {
            StreamUpdate::Text(text) => {
                message.text.clone_from(text);
            }
            StreamUpdate::Failed => {
                message.text = Mode::Chat.error_message().to_string();
                message.is_error = true;
            }
        }
        true
    }
}

/// Everything a background task needs to stream one reply
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub reply_id: MessageId,
    pub message: String,
    session: ChatSession,
}

impl ChatTurn {
    /// Send the message and fold the reply stream, publishing every update.
    /// A fault while opening the stream is published the same way as a fault
    /// mid-stream.
    pub async fn run<F>(self, gateway: &dyn Gateway, mut publish: F) -> Result<String, GatewayError>
    where
        F: FnMut(StreamUpdate) + Send,
    {
        let fragments = match gateway.stream_send(&self.session, &self.message).await {
            Ok(fragments) => fragments,
            Err(e) => {
                publish(StreamUpdate::Failed);
                return Err(e);
            }
        };

        aggregate(fragments, publish).await
    }
}

#[derive(Debug)]
pub struct ChatController {
    transcript: Transcript,
    session: ChatSession,
    status: RequestStatus,
    pending: Option<MessageId>,
}

impl ChatController {
    /// One session per controller, created up front
    pub fn new(gateway: &dyn Gateway) -> Self {
        Self {
            transcript: Transcript::with_greeting(),
            session: gateway.create_session(CHAT_SYSTEM_INSTRUCTION),
            status: RequestStatus::Idle,
            pending: None,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status == RequestStatus::Loading
    }

    /// The reply being streamed, if any
    pub fn pending_reply(&self) -> Option<&ChatMessage> {
        self.pending.and_then(|id| self.transcript.get(id))
    }

    /// Append the user message and an empty model placeholder. Returns None
    /// (and changes nothing) while a reply is in flight or for blank input.
    pub fn begin(&mut self, input: &str) -> Option<ChatTurn> {
        if self.is_loading() || input.trim().is_empty() {
            return None;
        }

        self.transcript.push(ChatRole::User, input);
        let reply_id = self.transcript.push(ChatRole::Model, "");
        self.status = RequestStatus::Loading;
        self.pending = Some(reply_id);
        debug!(reply_id, "Chat turn started");

        Some(ChatTurn {
            reply_id,
            message: input.to_string(),
            session: self.session.clone(),
        })
    }

    pub fn apply(&mut self, id: MessageId, update: &StreamUpdate) {
        if !self.transcript.apply(id, update) {
            debug!(id, "Dropping update for unknown message");
        }
    }

    /// The stream for `id` ended, cleanly or not
    pub fn finish(&mut self, id: MessageId, result: Result<(), GatewayError>) {
        if self.pending != Some(id) {
            return;
        }
        self.pending = None;

        match result {
            Ok(()) => self.status = RequestStatus::Done,
            Err(e) => {
                error!(error = %e, "Chat stream failed");
                // the aggregator already published the failure; make sure it landed
                self.transcript.apply(id, &StreamUpdate::Failed);
                self.status = RequestStatus::Error;
            }
        }
    }
}
