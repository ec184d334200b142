//! Language model abstraction
//!
//! The orchestrator and router talk to [`ChatModel`]: messages plus tool
//! declarations in, either a final answer or tool invocation requests out.
//! The shipped implementation speaks the Ollama-style `/api/chat` endpoint
//! with function-calling tools.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{EngineError, Result};
use crate::tools::ToolSchema;
use crate::types::{Role, ToolRequest};

/// Default chat endpoint
pub const DEFAULT_CHAT_URL: &str = "http://127.0.0.1:11434";

/// Default chat model
pub const DEFAULT_CHAT_MODEL: &str = "qwen2.5:7b-instruct";

/// Request timeout for generation calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// One message in a model prompt
#[derive(Debug, Clone, Serialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Model output: a final answer, or a request to run tools first
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    Answer(String),
    ToolCalls(Vec<ToolRequest>),
}

/// Language model completion provider
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate against a conversation, with tools on offer
    async fn generate(
        &self,
        messages: &[PromptMessage],
        tools: &[ToolSchema],
    ) -> Result<ModelTurn>;

    /// Single-prompt completion with no tools (used by the router).
    /// A tool-call response here is malformed output.
    async fn complete(&self, prompt: &str) -> Result<String> {
        let messages = [PromptMessage::new(Role::User, prompt)];
        match self.generate(&messages, &[]).await? {
            ModelTurn::Answer(text) => Ok(text),
            ModelTurn::ToolCalls(_) => Err(EngineError::MalformedModelOutput(
                "tool call requested with no tools on offer".to_string(),
            )),
        }
    }
}

/// Ollama-style chat client
#[derive(Debug, Clone)]
pub struct OllamaChatClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaChatClient {
    /// Create client with custom endpoint and model
    pub fn with_config(base_url: &str, model: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(EngineError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    /// Create client with default settings
    pub fn new() -> Result<Self> {
        Self::with_config(DEFAULT_CHAT_URL, DEFAULT_CHAT_MODEL)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check if the model endpoint is reachable
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/api/version", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl ChatModel for OllamaChatClient {
    async fn generate(
        &self,
        messages: &[PromptMessage],
        tools: &[ToolSchema],
    ) -> Result<ModelTurn> {
        let url = format!("{}/api/chat", self.base_url);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            stream: false,
            tools: tools
                .iter()
                .map(|schema| ToolDeclaration {
                    r#type: "function".to_string(),
                    function: FunctionDeclaration {
                        name: schema.name.clone(),
                        description: schema.description.clone(),
                        parameters: schema.parameters.clone(),
                    },
                })
                .collect(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::provider("llm", e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::provider(
                "llm",
                format!("HTTP {}: {}", status, body),
            ));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| EngineError::provider("llm", format!("bad response: {}", e)))?;

        let tool_calls: Vec<ToolRequest> = parsed
            .message
            .tool_calls
            .into_iter()
            .map(|call| ToolRequest {
                tool: call.function.name,
                args: call.function.arguments,
            })
            .collect();

        if tool_calls.is_empty() {
            Ok(ModelTurn::Answer(parsed.message.content))
        } else {
            Ok(ModelTurn::ToolCalls(tool_calls))
        }
    }
}

/// Chat request body
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<PromptMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDeclaration>,
}

#[derive(Debug, Serialize)]
struct ToolDeclaration {
    r#type: String,
    function: FunctionDeclaration,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

/// Chat response body
#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<ResponseToolCall>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}
