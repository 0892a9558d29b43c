//! The LLM gateway contract
//!
//! Controllers only ever talk to a `dyn Gateway`, so the Gemini REST client
//! and the scripted test gateway are interchangeable.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::GatewayError;
use crate::grounding::CitationChunk;
use crate::state::{ChatRole, LatLng};

/// Lazy, finite, non-restartable sequence of text fragments
pub type FragmentStream = BoxStream<'static, Result<String, GatewayError>>;

/// Tool and bias switches for a one-shot generation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GenerateOptions {
    pub web_search: bool,
    pub maps: bool,
    pub location_bias: Option<LatLng>,
    /// Skip model thinking for quick single-pass tasks
    pub disable_thinking: bool,
}

/// Result of a one-shot generation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Generation {
    /// None when the provider returned no text at all
    pub text: Option<String>,
    pub citations: Vec<CitationChunk>,
}

impl Generation {
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            citations: Vec::new(),
        }
    }
}

/// One committed exchange in a chat session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: ChatRole,
    pub text: String,
}

/// Conversational context for one chat view. Clones share the same history.
#[derive(Debug, Clone)]
pub struct ChatSession {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    system_instruction: String,
    history: Mutex<Vec<Turn>>,
}

impl ChatSession {
    pub fn new(system_instruction: &str) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                system_instruction: system_instruction.to_string(),
                history: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn system_instruction(&self) -> &str {
        &self.inner.system_instruction
    }

    /// Snapshot of the committed turns
    pub fn history(&self) -> Vec<Turn> {
        self.inner
            .history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Record a finished exchange. Only called once a reply streamed cleanly.
    pub fn commit(&self, user_text: &str, model_text: &str) {
        let mut history = self
            .inner
            .history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        history.push(Turn {
            role: ChatRole::User,
            text: user_text.to_string(),
        });
        history.push(Turn {
            role: ChatRole::Model,
            text: model_text.to_string(),
        });
    }
}

#[async_trait]
pub trait Gateway: Send + Sync {
    /// Short name for logs and the header bar
    fn model_name(&self) -> &str;

    fn create_session(&self, system_instruction: &str) -> ChatSession {
        ChatSession::new(system_instruction)
    }

    /// Send one chat message and stream the reply
    async fn stream_send(
        &self,
        session: &ChatSession,
        message: &str,
    ) -> Result<FragmentStream, GatewayError>;

    /// One-shot generation, optionally grounded
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<Generation, GatewayError>;
}
