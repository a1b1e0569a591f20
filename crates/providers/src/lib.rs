//! Remote generation backends.
//!
//! A backend receives the assembled prompt parts and answers with an
//! [`AiResponse`]. Failures are values, never panics or early returns, so the
//! caller can always turn them into a chat message.

pub mod gemini;

pub use gemini::GeminiClient;

use async_trait::async_trait;
use shared::tool::ToolDefinition;

/// Remote failure taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("the AI feature is disabled or the API key is not configured")]
    NotConfigured,

    #[error("HTTP error {status}: {body}. Check your API key and permissions")]
    Http { status: u16, body: String },

    #[error("could not reach the AI service: {0}")]
    Connection(String),

    #[error("invalid response from the AI service: {0}")]
    MalformedResponse(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

/// One piece of a multimodal prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptPart {
    Text(String),
    InlineData { mime_type: String, data: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationRequest {
    pub parts: Vec<PromptPart>,
    /// Functions the model may call instead of answering in prose
    pub tools: Vec<ToolDefinition>,
}

impl GenerationRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            parts: vec![PromptPart::Text(prompt.into())],
            tools: Vec::new(),
        }
    }

    pub fn with_part(mut self, part: PromptPart) -> Self {
        self.parts.push(part);
        self
    }

    pub fn with_tool(mut self, tool: ToolDefinition) -> Self {
        self.tools.push(tool);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AiResponse {
    Text(String),
    ToolCall {
        name: String,
        args: serde_json::Value,
    },
    Failure(ApiError),
}

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, api_key: &str, request: &GenerationRequest) -> AiResponse;
}
