//! Google Gemini REST client
//!
//! API keys are only ever sent to the configured Gemini endpoint, in the
//! `x-goog-api-key` header. Request urls carry no credentials.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};

use crate::ai::sse::SseParser;
use crate::config::{Config, DEFAULT_API_BASE};
use crate::error::GatewayError;
use crate::gateway::{ChatSession, FragmentStream, Gateway, GenerateOptions, Generation, Turn};
use crate::grounding::CitationChunk;

const ERROR_BODY_LIMIT: usize = 800;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_config: Option<GeminiToolConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

impl GeminiContent {
    fn user(text: &str) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![GeminiPart { text: text.to_string() }],
        }
    }
}

impl From<Turn> for GeminiContent {
    fn from(turn: Turn) -> Self {
        Self {
            role: turn.role.as_str().to_string(),
            parts: vec![GeminiPart { text: turn.text }],
        }
    }
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
enum GeminiTool {
    #[serde(rename = "googleSearch")]
    GoogleSearch {},
    #[serde(rename = "googleMaps")]
    GoogleMaps {},
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiToolConfig {
    retrieval_config: GeminiRetrievalConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRetrievalConfig {
    lat_lng: GeminiLatLng,
}

#[derive(Debug, Serialize)]
struct GeminiLatLng {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    thinking_config: GeminiThinkingConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiThinkingConfig {
    thinking_budget: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    error: Option<GeminiErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiCandidateContent>,
    #[serde(default)]
    grounding_metadata: Option<GeminiGroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidatePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    #[serde(default)]
    message: String,
}

impl GeminiResponse {
    /// Text parts of the first candidate, concatenated. Thought parts are skipped.
    fn text(&self) -> Option<String> {
        let text: String = self
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter(|p| !p.thought)
                    .filter_map(|p| p.text.as_deref())
                    .collect()
            })
            .unwrap_or_default();

        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn citations(&self) -> Vec<CitationChunk> {
        self.candidates
            .first()
            .and_then(|c| c.grounding_metadata.as_ref())
            .map(|meta| {
                meta.grounding_chunks
                    .iter()
                    .map(CitationChunk::from_value)
                    .collect()
            })
            .unwrap_or_default()
    }
}

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    request_timeout: Duration,
    stream_idle_timeout: Duration,
}

impl GeminiClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: DEFAULT_API_BASE.to_string(),
            request_timeout: Duration::from_secs(45),
            stream_idle_timeout: Duration::from_secs(60),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, GatewayError> {
        let api_key = config.resolve_api_key().ok_or(GatewayError::MissingApiKey)?;
        Ok(Self::new(&api_key, config.model())
            .with_base_url(config.api_base())
            .with_request_timeout(config.request_timeout())
            .with_stream_idle_timeout(config.stream_idle_timeout()))
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_stream_idle_timeout(mut self, timeout: Duration) -> Self {
        self.stream_idle_timeout = timeout;
        self
    }

    fn endpoint(&self, method: &str, sse: bool) -> String {
        let alt = if sse { "?alt=sse" } else { "" };
        format!("{}/{}:{}{}", self.base_url, self.model, method, alt)
    }

    async fn check_status(response: Response) -> Result<Response, GatewayError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<GeminiResponse>(&body)
            .ok()
            .and_then(|r| r.error)
            .map(|e| e.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| truncate(body.trim(), ERROR_BODY_LIMIT));
        Err(GatewayError::from_http_status(status, message))
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        let cut: String = text.chars().take(limit).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

fn build_generate_request(prompt: &str, options: &GenerateOptions) -> GeminiRequest {
    let mut tools = Vec::new();
    if options.web_search {
        tools.push(GeminiTool::GoogleSearch {});
    }
    if options.maps {
        tools.push(GeminiTool::GoogleMaps {});
    }

    GeminiRequest {
        contents: vec![GeminiContent::user(prompt)],
        system_instruction: None,
        tools,
        tool_config: options.location_bias.map(|loc| GeminiToolConfig {
            retrieval_config: GeminiRetrievalConfig {
                lat_lng: GeminiLatLng {
                    latitude: loc.lat,
                    longitude: loc.lng,
                },
            },
        }),
        generation_config: options.disable_thinking.then(|| GeminiGenerationConfig {
            thinking_config: GeminiThinkingConfig { thinking_budget: 0 },
        }),
    }
}

fn build_chat_request(session: &ChatSession, message: &str) -> GeminiRequest {
    let mut contents: Vec<GeminiContent> = session
        .history()
        .into_iter()
        .map(GeminiContent::from)
        .collect();
    contents.push(GeminiContent::user(message));

    GeminiRequest {
        contents,
        system_instruction: Some(GeminiSystemInstruction {
            parts: vec![GeminiPart {
                text: session.system_instruction().to_string(),
            }],
        }),
        tools: Vec::new(),
        tool_config: None,
        generation_config: None,
    }
}

/// Decode one SSE payload into its text fragment, if any
fn decode_stream_event(data: &str) -> Result<Option<String>, GatewayError> {
    let chunk: GeminiResponse =
        serde_json::from_str(data).map_err(|e| GatewayError::Decode(e.to_string()))?;
    if let Some(error) = chunk.error {
        return Err(GatewayError::Service(error.message));
    }
    Ok(chunk.text())
}

/// Reads the SSE body and forwards fragments in arrival order. The exchange is
/// committed to the session only when the body ends without a fault.
async fn pump_stream(
    response: Response,
    tx: mpsc::UnboundedSender<Result<String, GatewayError>>,
    idle_timeout: Duration,
    session: ChatSession,
    message: String,
) {
    let mut body = response.bytes_stream();
    let mut parser = SseParser::new();
    let mut reply = String::new();

    loop {
        let bytes = match tokio::time::timeout(idle_timeout, body.next()).await {
            Ok(Some(Ok(bytes))) => bytes,
            Ok(Some(Err(e))) => {
                let _ = tx.send(Err(GatewayError::Stream(e.without_url().to_string())));
                return;
            }
            Ok(None) => break,
            Err(_) => {
                let _ = tx.send(Err(GatewayError::Timeout(idle_timeout)));
                return;
            }
        };

        for data in parser.feed(&bytes) {
            if !forward(&data, &tx, &mut reply) {
                return;
            }
        }
    }

    if let Some(data) = parser.finish() {
        if !forward(&data, &tx, &mut reply) {
            return;
        }
    }

    debug!(chars = reply.chars().count(), "Chat stream completed");
    session.commit(&message, &reply);
}

/// Returns false when the stream should stop (fault sent or receiver gone)
fn forward(
    data: &str,
    tx: &mpsc::UnboundedSender<Result<String, GatewayError>>,
    reply: &mut String,
) -> bool {
    match decode_stream_event(data) {
        Ok(Some(text)) => {
            reply.push_str(&text);
            tx.send(Ok(text)).is_ok()
        }
        Ok(None) => true,
        Err(e) => {
            warn!(error = %e, "Chat stream fault");
            let _ = tx.send(Err(e));
            false
        }
    }
}

#[async_trait]
impl Gateway for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn stream_send(
        &self,
        session: &ChatSession,
        message: &str,
    ) -> Result<FragmentStream, GatewayError> {
        let request = build_chat_request(session, message);
        debug!(model = %self.model, turns = request.contents.len(), "Sending streamGenerateContent request");

        let send = self
            .client
            .post(self.endpoint("streamGenerateContent", true))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send();
        let response = tokio::time::timeout(self.stream_idle_timeout, send)
            .await
            .map_err(|_| GatewayError::Timeout(self.stream_idle_timeout))?
            .map_err(|e| GatewayError::from_network_error(e, self.stream_idle_timeout))?;
        let response = Self::check_status(response).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(pump_stream(
            response,
            tx,
            self.stream_idle_timeout,
            session.clone(),
            message.to_string(),
        ));

        Ok(UnboundedReceiverStream::new(rx).boxed())
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<Generation, GatewayError> {
        let request = build_generate_request(prompt, options);
        debug!(
            model = %self.model,
            web_search = options.web_search,
            maps = options.maps,
            located = options.location_bias.is_some(),
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(self.endpoint("generateContent", false))
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(self.request_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::from_network_error(e, self.request_timeout))?;
        let response = Self::check_status(response).await?;

        let body: GeminiResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.without_url().to_string()))?;

        Ok(Generation {
            text: body.text(),
            citations: body.citations(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grounding::CitationLink;
    use crate::state::{ChatRole, LatLng};
    use serde_json::json;

    #[test]
    fn test_parse_grounded_response() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"text": "It is "}, {"text": "sunny."}]
                },
                "groundingMetadata": {
                    "groundingChunks": [
                        {"web": {"uri": "https://example.com", "title": "WeatherSite"}},
                        {"maps": {"uri": "https://maps.example/p", "title": "Park"}},
                        {"somethingNew": {}}
                    ]
                }
            }]
        }"#;

        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text().as_deref(), Some("It is sunny."));
        assert_eq!(
            response.citations(),
            vec![
                CitationChunk::Web(CitationLink::new(Some("WeatherSite"), Some("https://example.com"))),
                CitationChunk::Maps(CitationLink::new(Some("Park"), Some("https://maps.example/p"))),
                CitationChunk::Other,
            ]
        );
    }

    #[test]
    fn test_parse_empty_candidates() {
        let response: GeminiResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert_eq!(response.text(), None);
        assert!(response.citations().is_empty());

        let response: GeminiResponse =
            serde_json::from_str(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#).unwrap();
        assert_eq!(response.text(), None);
    }

    #[test]
    fn test_thought_parts_are_skipped() {
        let response: GeminiResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [
                {"text": "planning...", "thought": true},
                {"text": "Answer"}
            ]}}]}"#,
        )
        .unwrap();
        assert_eq!(response.text().as_deref(), Some("Answer"));
    }

    #[test]
    fn test_generate_request_shape() {
        let options = GenerateOptions {
            maps: true,
            location_bias: Some(LatLng { lat: 40.7, lng: -74.0 }),
            ..Default::default()
        };
        let value = serde_json::to_value(build_generate_request("coffee", &options)).unwrap();
        assert_eq!(
            value,
            json!({
                "contents": [{"role": "user", "parts": [{"text": "coffee"}]}],
                "tools": [{"googleMaps": {}}],
                "toolConfig": {"retrievalConfig": {"latLng": {"latitude": 40.7, "longitude": -74.0}}}
            })
        );

        let options = GenerateOptions {
            disable_thinking: true,
            ..Default::default()
        };
        let value = serde_json::to_value(build_generate_request("sum", &options)).unwrap();
        assert_eq!(value["generationConfig"], json!({"thinkingConfig": {"thinkingBudget": 0}}));
        assert!(value.get("tools").is_none());
    }

    #[test]
    fn test_chat_request_includes_history() {
        let session = ChatSession::new("be brief");
        session.commit("Hello", "Hi there!");
        let value = serde_json::to_value(build_chat_request(&session, "How are you?")).unwrap();

        assert_eq!(value["systemInstruction"], json!({"parts": [{"text": "be brief"}]}));
        let roles: Vec<&str> = value["contents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, vec!["user", ChatRole::Model.as_str(), "user"]);
        assert_eq!(value["contents"][2]["parts"][0]["text"], "How are you?");
    }

    #[test]
    fn test_decode_stream_event() {
        let data = r#"{"candidates": [{"content": {"parts": [{"text": "Hi"}], "role": "model"}}]}"#;
        assert_eq!(decode_stream_event(data).unwrap().as_deref(), Some("Hi"));

        let usage_only = r#"{"usageMetadata": {"totalTokenCount": 3}}"#;
        assert_eq!(decode_stream_event(usage_only).unwrap(), None);

        let error = r#"{"error": {"code": 500, "message": "backend hiccup"}}"#;
        assert!(matches!(decode_stream_event(error), Err(GatewayError::Service(m)) if m == "backend hiccup"));

        assert!(matches!(decode_stream_event("not json"), Err(GatewayError::Decode(_))));
    }

    #[test]
    fn test_endpoint_format() {
        let client = GeminiClient::new("k", "gemini-2.5-flash").with_base_url("http://localhost:9/models/");
        assert_eq!(
            client.endpoint("streamGenerateContent", true),
            "http://localhost:9/models/gemini-2.5-flash:streamGenerateContent?alt=sse"
        );
        assert_eq!(
            client.endpoint("generateContent", false),
            "http://localhost:9/models/gemini-2.5-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn test_connection_errors_do_not_leak_key() {
        let client = GeminiClient::new("SECRET-KEY-123", "gemini-2.5-flash")
            .with_base_url("http://127.0.0.1:1/models")
            .with_request_timeout(Duration::from_secs(5))
            .with_stream_idle_timeout(Duration::from_secs(5));

        let err = client
            .generate("pizza near me", &GenerateOptions::default())
            .await
            .unwrap_err();
        assert!(!err.to_string().contains("SECRET-KEY-123"), "{}", err);

        let session = ChatSession::new("be brief");
        let err = match client.stream_send(&session, "Hi").await {
            Err(e) => e,
            Ok(_) => panic!("stream opened against a closed port"),
        };
        assert!(!err.to_string().contains("SECRET-KEY-123"), "{}", err);
    }

    #[test]
    fn test_missing_key_is_reported() {
        let config = Config {
            api_key: None,
            ..Config::new()
        };
        // Only meaningful when the environment carries no key either
        if config.resolve_api_key().is_none() {
            assert!(matches!(
                GeminiClient::from_config(&config),
                Err(GatewayError::MissingApiKey)
            ));
        }
    }
}
