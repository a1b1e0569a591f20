use crate::{AiResponse, ApiError, GenerationBackend, GenerationRequest, PromptPart};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use shared::tool::ToolDefinition;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);
const MAX_ERROR_BODY: usize = 800;
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Serialize)]
struct GeminiInlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart<'a> {
    Text { text: &'a str },
    Inline { inline_data: GeminiInlineData<'a> },
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    role: &'static str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiTools<'a> {
    function_declarations: &'a [ToolDefinition],
}

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTools<'a>>,
}

impl<'a> GeminiRequest<'a> {
    fn from_request(request: &'a GenerationRequest) -> Self {
        let parts = request
            .parts
            .iter()
            .map(|p| match p {
                PromptPart::Text(text) => GeminiPart::Text { text },
                PromptPart::InlineData { mime_type, data } => GeminiPart::Inline {
                    inline_data: GeminiInlineData { mime_type, data },
                },
            })
            .collect();
        let tools = if request.tools.is_empty() {
            Vec::new()
        } else {
            vec![GeminiTools {
                function_declarations: &request.tools,
            }]
        };
        Self {
            contents: vec![GeminiContent { role: "user", parts }],
            tools,
        }
    }
}

/// Client for the `generateContent` endpoint.
pub struct GeminiClient {
    http: Client,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(model: &str, base_url: &str) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Unexpected(e.to_string()))?;
        Ok(Self {
            http,
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    async fn call(&self, api_key: &str, request: &GenerationRequest) -> Result<Value, ApiError> {
        let body = GeminiRequest::from_request(request);
        let resp = self
            .http
            .post(self.endpoint())
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = resp.status();
        let text = resp.text().await.map_err(classify_transport_error)?;
        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
                body: truncate_body(text.trim()),
            });
        }
        serde_json::from_str(&text).map_err(|e| ApiError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl GenerationBackend for GeminiClient {
    async fn generate(&self, api_key: &str, request: &GenerationRequest) -> AiResponse {
        if api_key.trim().is_empty() {
            return AiResponse::Failure(ApiError::NotConfigured);
        }
        debug!(
            model = %self.model,
            parts = request.parts.len(),
            tools = request.tools.len(),
            "calling generateContent"
        );
        match self.call(api_key, request).await {
            Ok(body) => parse_response(&body),
            Err(e) => {
                warn!(error = %e, "generation request failed");
                AiResponse::Failure(e)
            }
        }
    }
}

/// Error text never carries the request URL.
fn classify_transport_error(e: reqwest::Error) -> ApiError {
    let e = e.without_url();
    if e.is_timeout() || e.is_connect() || e.is_request() {
        ApiError::Connection(e.to_string())
    } else if e.is_decode() || e.is_body() {
        ApiError::MalformedResponse(e.to_string())
    } else {
        ApiError::Unexpected(e.to_string())
    }
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let cut: String = body.chars().take(MAX_ERROR_BODY).collect();
    format!("{}...", cut)
}

/// Interprets a 200 response body. A function call in the first candidate
/// wins over any text parts.
pub fn parse_response(body: &Value) -> AiResponse {
    if let Some(candidate) = body
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
    {
        let parts = candidate
            .pointer("/content/parts")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        if let Some(call) = parts.iter().find_map(|p| p.get("functionCall")) {
            let Some(name) = call.get("name").and_then(Value::as_str) else {
                return AiResponse::Failure(ApiError::MalformedResponse(
                    "function call without a name".into(),
                ));
            };
            let args = call
                .get("args")
                .cloned()
                .unwrap_or_else(|| Value::Object(Default::default()));
            return AiResponse::ToolCall {
                name: name.to_string(),
                args,
            };
        }

        let text: String = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect();
        if !text.trim().is_empty() {
            return AiResponse::Text(text.trim().to_string());
        }
        let reason = candidate
            .get("finishReason")
            .and_then(Value::as_str)
            .unwrap_or("no content");
        return AiResponse::Failure(ApiError::MalformedResponse(format!(
            "empty answer ({})",
            reason
        )));
    }

    if let Some(reason) = body.pointer("/promptFeedback/blockReason").and_then(Value::as_str) {
        return AiResponse::Failure(ApiError::MalformedResponse(format!(
            "prompt blocked: {}",
            reason
        )));
    }
    let detail = body
        .pointer("/error/message")
        .and_then(Value::as_str)
        .unwrap_or("unknown format");
    AiResponse::Failure(ApiError::MalformedResponse(detail.to_string()))
}
