//! One-shot requests for the single-result modes

use crate::controller::ModeOutput;
use crate::error::GatewayError;
use crate::gateway::{Gateway, GenerateOptions};
use crate::grounding::extract_sources;
use crate::mode::{Mode, Tone};
use crate::prompts::{rewrite_prompt, summarize_prompt, translate_prompt};
use crate::state::{GroundingResult, LatLng};

#[derive(Debug, Clone, PartialEq)]
pub enum ModeRequest {
    Search { query: String },
    Find { query: String, location: Option<LatLng> },
    Translate { text: String, language: String },
    Summarize { text: String },
    Rewrite { text: String, tone: Tone },
}

impl ModeRequest {
    pub fn mode(&self) -> Mode {
        match self {
            ModeRequest::Search { .. } => Mode::Search,
            ModeRequest::Find { .. } => Mode::Find,
            ModeRequest::Translate { .. } => Mode::Translate,
            ModeRequest::Summarize { .. } => Mode::Summarize,
            ModeRequest::Rewrite { .. } => Mode::Write,
        }
    }

    /// What the user typed
    pub fn input(&self) -> &str {
        match self {
            ModeRequest::Search { query } | ModeRequest::Find { query, .. } => query,
            ModeRequest::Translate { text, .. }
            | ModeRequest::Summarize { text }
            | ModeRequest::Rewrite { text, .. } => text,
        }
    }

    /// Exact instruction text sent to the gateway
    pub fn prompt(&self) -> String {
        match self {
            ModeRequest::Search { query } | ModeRequest::Find { query, .. } => query.clone(),
            ModeRequest::Translate { text, language } => translate_prompt(text, language),
            ModeRequest::Summarize { text } => summarize_prompt(text),
            ModeRequest::Rewrite { text, tone } => rewrite_prompt(text, *tone),
        }
    }

    pub fn options(&self) -> GenerateOptions {
        match self {
            ModeRequest::Search { .. } => GenerateOptions {
                web_search: true,
                ..Default::default()
            },
            ModeRequest::Find { location, .. } => GenerateOptions {
                maps: true,
                location_bias: *location,
                ..Default::default()
            },
            ModeRequest::Summarize { .. } => GenerateOptions {
                disable_thinking: true,
                ..Default::default()
            },
            ModeRequest::Translate { .. } | ModeRequest::Rewrite { .. } => GenerateOptions::default(),
        }
    }
}

/// Run one request. A response with no text gets the mode's "no result"
/// string rather than an error.
pub async fn execute(
    gateway: &dyn Gateway,
    request: &ModeRequest,
) -> Result<ModeOutput, GatewayError> {
    let generation = gateway.generate(&request.prompt(), &request.options()).await?;
    let mode = request.mode();
    let text = generation
        .text
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| mode.empty_message().to_string());

    Ok(match request {
        ModeRequest::Search { .. } | ModeRequest::Find { .. } => {
            ModeOutput::Grounded(GroundingResult {
                text,
                sources: extract_sources(&generation.citations),
            })
        }
        _ => ModeOutput::Text(text),
    })
}
