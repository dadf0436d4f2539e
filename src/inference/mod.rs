//! Inference service boundary for agent nodes.
//!
//! Agent nodes hand their resolved input to an [`InferenceClient`]; the
//! default [`HttpInferenceClient`] POSTs to the configured completion
//! endpoint and understands both plain JSON responses and server-sent-event
//! streams of `data: {text?/error?}` lines.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::{InferenceConfig, Result, StageflowError};

/// Per-node agent settings carried in the workflow definition.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// model identifier; the service default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub system_prompt: String,
    /// extra prompt appended after the resolved node input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
}

#[derive(Serialize, Debug, Clone)]
pub struct InferenceRequest {
    pub agent_config: AgentConfig,
    pub input: String,
    pub global_user_input: String,
    pub stream: bool,
}

/// Output of a tool invocation made by the agent during completion.
///
/// Tool outputs are logged but never wired into the graph; only the agent's
/// final output is.
#[derive(Deserialize, Debug, Clone)]
pub struct ToolOutput {
    pub tool_id: String,
    pub output: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct InferenceResponse {
    pub success: bool,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub tool_outputs: Vec<ToolOutput>,
}

impl InferenceResponse {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
            tool_outputs: Vec::new(),
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
            tool_outputs: Vec::new(),
        }
    }
}

/// Boundary trait so embedders can substitute their own model backend.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn complete(&self, request: InferenceRequest) -> Result<InferenceResponse>;
}

/// One line of an SSE completion stream.
#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub struct HttpInferenceClient {
    client: reqwest::Client,
    config: InferenceConfig,
}

impl HttpInferenceClient {
    pub fn new(config: InferenceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn send(&self, request: &InferenceRequest) -> Result<reqwest::Response> {
        let mut builder = self
            .client
            .post(&self.config.completion_url)
            .timeout(Duration::from_millis(self.config.timeout))
            .json(request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder
            .send()
            .await
            .map_err(|err| StageflowError::Inference(format!("completion request failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(StageflowError::Inference(format!("completion endpoint returned {status}")));
        }
        Ok(response)
    }

    async fn collect_stream(response: reqwest::Response) -> Result<InferenceResponse> {
        let mut body = response.bytes_stream();
        let mut buffer = String::new();
        let mut output = String::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|err| StageflowError::Inference(format!("stream interrupted: {err}")))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(end) = buffer.find("\n\n") {
                let event = buffer[..end].to_string();
                buffer.drain(..end + 2);
                if let Some(data) = event.trim().strip_prefix("data:") {
                    match parse_chunk(data.trim())? {
                        StreamChunk { error: Some(error), .. } => return Ok(InferenceResponse::err(error)),
                        StreamChunk { text: Some(text), .. } => output.push_str(&text),
                        _ => {}
                    }
                }
            }
        }
        Ok(InferenceResponse::ok(output))
    }
}

fn parse_chunk(data: &str) -> Result<StreamChunk> {
    serde_json::from_str(data).map_err(|err| StageflowError::Inference(format!("bad stream chunk '{data}': {err}")))
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn complete(&self, mut request: InferenceRequest) -> Result<InferenceResponse> {
        request.stream = self.config.stream;
        let response = self.send(&request).await?;
        if request.stream {
            Self::collect_stream(response).await
        } else {
            response
                .json::<InferenceResponse>()
                .await
                .map_err(|err| StageflowError::Inference(format!("bad completion response: {err}")))
        }
    }
}
