//! Scripted in-memory gateway for tests. No network.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::{stream, StreamExt};

use crate::error::GatewayError;
use crate::gateway::{ChatSession, FragmentStream, Gateway, GenerateOptions, Generation};

enum ScriptedStream {
    Fragments(Vec<Result<String, GatewayError>>),
    OpenFailure(GatewayError),
}

/// Replays queued responses in order. Unscripted calls fail with `Other`.
#[derive(Default)]
pub struct ScriptedGateway {
    generations: Mutex<VecDeque<Result<Generation, GatewayError>>>,
    streams: Mutex<VecDeque<ScriptedStream>>,
    generate_calls: Mutex<Vec<(String, GenerateOptions)>>,
    sent_messages: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_generation(&self, result: Result<Generation, GatewayError>) {
        self.generations.lock().unwrap().push_back(result);
    }

    pub fn push_text(&self, text: &str) {
        self.push_generation(Ok(Generation::text(text)));
    }

    pub fn push_failure(&self, error: GatewayError) {
        self.push_generation(Err(error));
    }

    /// Queue a chat reply. A clean stream is committed to the session.
    pub fn push_stream(&self, fragments: Vec<Result<&str, GatewayError>>) {
        let fragments = fragments
            .into_iter()
            .map(|f| f.map(str::to_string))
            .collect();
        self.streams
            .lock()
            .unwrap()
            .push_back(ScriptedStream::Fragments(fragments));
    }

    pub fn push_stream_open_failure(&self, error: GatewayError) {
        self.streams
            .lock()
            .unwrap()
            .push_back(ScriptedStream::OpenFailure(error));
    }

    pub fn generate_calls(&self) -> Vec<(String, GenerateOptions)> {
        self.generate_calls.lock().unwrap().clone()
    }

    pub fn sent_messages(&self) -> Vec<String> {
        self.sent_messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn stream_send(
        &self,
        session: &ChatSession,
        message: &str,
    ) -> Result<FragmentStream, GatewayError> {
        self.sent_messages.lock().unwrap().push(message.to_string());
        let next = self.streams.lock().unwrap().pop_front();

        match next {
            Some(ScriptedStream::Fragments(fragments)) => {
                if fragments.iter().all(Result::is_ok) {
                    let reply: String = fragments.iter().filter_map(|f| f.as_deref().ok()).collect();
                    session.commit(message, &reply);
                }
                Ok(stream::iter(fragments).boxed())
            }
            Some(ScriptedStream::OpenFailure(error)) => Err(error),
            None => Err(GatewayError::Other("no scripted stream".to_string())),
        }
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<Generation, GatewayError> {
        self.generate_calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), *options));
        self.generations
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::Other("no scripted generation".to_string())))
    }
}
