//! Chat model client with tool calling.
//!
//! [`ChatModel`] is the seam between the agent loop and the hosted model.
//! [`OpenAiChatModel`] talks to any OpenAI-compatible `/chat/completions`
//! endpoint.

use std::time::Instant;

use async_trait::async_trait;
use common::config::LlmConfig;
use common::errors::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

/// Sampling temperature; answers must be reproducible.
pub const TEMPERATURE: f32 = 0.0;

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// JSON schema describing a tool to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// One message of a tool-calling conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatMessage {
    System(String),
    User(String),
    Assistant {
        content: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

/// What the model answered.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatReply {
    /// Final text, no further tool use.
    Content(String),
    /// The model wants tools run before it answers.
    ToolCalls {
        content: Option<String>,
        calls: Vec<ToolCall>,
    },
}

/// A chat model able to call tools.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier, for logging.
    fn model_name(&self) -> &str;

    /// Sends the conversation and returns the next reply.
    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolSchema]) -> AppResult<ChatReply>;
}

// === Wire format ===

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
enum WireMessage<'a> {
    System {
        content: &'a str,
    },
    User {
        content: &'a str,
    },
    Assistant {
        content: Option<&'a str>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<WireToolCall>,
    },
    Tool {
        tool_call_id: &'a str,
        content: &'a str,
    },
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionDef<'a>,
}

#[derive(Serialize)]
struct WireFunctionDef<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    /// JSON-encoded arguments, as the API transmits them.
    #[serde(default)]
    arguments: String,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl<'a> From<&'a ChatMessage> for WireMessage<'a> {
    fn from(message: &'a ChatMessage) -> Self {
        match message {
            ChatMessage::System(content) => WireMessage::System { content },
            ChatMessage::User(content) => WireMessage::User { content },
            ChatMessage::Assistant { content, tool_calls } => WireMessage::Assistant {
                content: content.as_deref(),
                tool_calls: tool_calls
                    .iter()
                    .map(|call| WireToolCall {
                        id: call.id.clone(),
                        kind: function_kind(),
                        function: WireFunctionCall {
                            name: call.name.clone(),
                            arguments: call.arguments.to_string(),
                        },
                    })
                    .collect(),
            },
            ChatMessage::Tool {
                tool_call_id,
                content,
            } => WireMessage::Tool {
                tool_call_id,
                content,
            },
        }
    }
}

impl<'a> From<&'a ToolSchema> for WireTool<'a> {
    fn from(schema: &'a ToolSchema) -> Self {
        WireTool {
            kind: "function",
            function: WireFunctionDef {
                name: &schema.name,
                description: &schema.description,
                parameters: &schema.parameters,
            },
        }
    }
}

fn build_request<'a>(
    model: &'a str,
    messages: &'a [ChatMessage],
    tools: &'a [ToolSchema],
) -> CompletionRequest<'a> {
    CompletionRequest {
        model,
        temperature: TEMPERATURE,
        messages: messages.iter().map(WireMessage::from).collect(),
        tools: tools.iter().map(WireTool::from).collect(),
    }
}

fn parse_reply(response: CompletionResponse) -> AppResult<ChatReply> {
    let message = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| AppError::Llm("response contained no choices".into()))?;

    let calls: Vec<ToolCall> = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ToolCall {
            id: call.id,
            name: call.function.name,
            // Unparseable arguments are passed through so the tool can report them.
            arguments: serde_json::from_str(&call.function.arguments)
                .unwrap_or(Value::String(call.function.arguments)),
        })
        .collect();

    if !calls.is_empty() {
        return Ok(ChatReply::ToolCalls {
            content: message.content.filter(|c| !c.trim().is_empty()),
            calls,
        });
    }

    match message.content {
        Some(content) if !content.trim().is_empty() => Ok(ChatReply::Content(content)),
        _ => Err(AppError::Llm("response had neither content nor tool calls".into())),
    }
}

/// Client for OpenAI-compatible chat completion APIs.
pub struct OpenAiChatModel {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiChatModel {
    pub fn new(config: &LlmConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.api_base),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolSchema]) -> AppResult<ChatReply> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Config("OPENAI_API_KEY is not set".into()))?;

        let start = Instant::now();
        let request = build_request(&self.model, messages, tools);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Llm(e.without_url().to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(500).collect();
            return Err(AppError::Llm(format!("provider returned {}: {}", status, body)));
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("invalid completion response: {}", e)))?;

        let (input_tokens, output_tokens) = body
            .usage
            .as_ref()
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));
        info!(
            model = %self.model,
            elapsed_ms = start.elapsed().as_millis() as u64,
            input_tokens,
            output_tokens,
            "LLM 调用完成"
        );

        let reply = parse_reply(body)?;
        debug!(?reply, "LLM 回复");
        Ok(reply)
    }
}
