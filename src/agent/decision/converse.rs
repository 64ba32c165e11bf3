//! Model-backed decision source (Bedrock Runtime Converse API, API key auth).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::agent::message::{ContentBlock, Conversation, Message, Role, ToolInvocationRequest};
use crate::agent::prompt::system_prompt;
use crate::config::Config;
use crate::error::Error;
use crate::tools::ToolDefinition;
use crate::Result;

use super::{ConverseResponse, DecisionSource, Verdict};

const REQUEST_TIMEOUT_SECS: u64 = 60;
const MAX_OUTPUT_TOKENS: u32 = 1024;

/// Text returned for stop reasons this client does not know.
pub const UNRECOGNIZED_STOP_TEXT: &str = "Model response processed";

/// Converse API client.
#[derive(Clone)]
pub struct ConverseClient {
    api_key: String,
    endpoint: String,
    system: String,
    tools: Vec<ToolDefinition>,
    client: Client,
}

impl ConverseClient {
    /// Create a client for `model` in `region`.
    pub fn new(
        api_key: &str,
        region: &str,
        model: &str,
        system: String,
        tools: &[ToolDefinition],
    ) -> Result<Self> {
        let endpoint = format!(
            "https://bedrock-runtime.{region}.amazonaws.com/model/{}/converse",
            encode_model_id(model)
        );
        Self::with_endpoint(api_key, endpoint, system, tools)
    }

    /// Create a client against an explicit endpoint URL.
    pub fn with_endpoint(
        api_key: &str,
        endpoint: String,
        system: String,
        tools: &[ToolDefinition],
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            api_key: api_key.to_string(),
            endpoint,
            system,
            tools: tools.to_vec(),
            client,
        })
    }

    /// Create a client from configuration.
    pub fn from_config(config: &Config, tools: &[ToolDefinition]) -> Result<Self> {
        let api_key = config
            .bedrock_key()
            .ok_or_else(|| Error::Config("Model service API key not configured".to_string()))?;
        let system = system_prompt(&config.default_timezone);

        match &config.bedrock_endpoint {
            Some(endpoint) => Self::with_endpoint(api_key, endpoint.clone(), system, tools),
            None => Self::new(api_key, &config.region, &config.model, system, tools),
        }
    }

    fn convert_message(message: &Message) -> Value {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };

        let content: Vec<Value> = message
            .content
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => json!({ "text": text }),
                ContentBlock::ToolUse(request) => json!({
                    "toolUse": {
                        "toolUseId": request.id,
                        "name": request.name,
                        "input": request.input
                    }
                }),
                ContentBlock::ToolResult(result) => json!({
                    "toolResult": {
                        "toolUseId": result.tool_use_id,
                        "content": [{ "json": result.payload() }],
                        "status": if result.is_error() { "error" } else { "success" }
                    }
                }),
            })
            .collect();

        json!({ "role": role, "content": content })
    }

    fn convert_tools(&self) -> Option<Value> {
        if self.tools.is_empty() {
            return None;
        }

        let tools: Vec<Value> = self
            .tools
            .iter()
            .map(|t| {
                json!({
                    "toolSpec": {
                        "name": t.name,
                        "description": t.description,
                        "inputSchema": { "json": t.parameters }
                    }
                })
            })
            .collect();

        Some(json!({ "tools": tools }))
    }

    /// Build the request body for a conversation.
    pub fn build_request(&self, conversation: &Conversation) -> Value {
        let messages: Vec<Value> = conversation.turns().iter().map(Self::convert_message).collect();

        let mut request = json!({
            "messages": messages,
            "system": [{ "text": self.system }],
            "inferenceConfig": { "maxTokens": MAX_OUTPUT_TOKENS }
        });

        if let Some(tool_config) = self.convert_tools() {
            request["toolConfig"] = tool_config;
        }

        request
    }

    /// Map a Converse response onto a verdict.
    pub fn parse_response(response: ConverseResponse) -> Verdict {
        let blocks = response.output.message.map(|m| m.content).unwrap_or_default();

        match response.stop_reason.as_str() {
            "tool_use" => {
                let content: Vec<ContentBlock> = blocks
                    .into_iter()
                    .filter_map(|block| match (block.tool_use, block.text) {
                        (Some(tool_use), _) => Some(ContentBlock::ToolUse(
                            ToolInvocationRequest::with_id(
                                tool_use.tool_use_id,
                                tool_use.name,
                                tool_use.input,
                            ),
                        )),
                        (None, Some(text)) if !text.is_empty() => Some(ContentBlock::text(text)),
                        _ => None,
                    })
                    .collect();

                match Verdict::from_blocks(content) {
                    Verdict::ToolRequests { requests, .. } if requests.is_empty() => {
                        Verdict::NoActionFound
                    }
                    verdict => verdict,
                }
            }
            "end_turn" => Verdict::FinalAnswer(
                blocks.into_iter().find_map(|b| b.text).unwrap_or_default(),
            ),
            other => {
                info!("Unrecognized stop reason: {}", other);
                Verdict::FinalAnswer(UNRECOGNIZED_STOP_TEXT.to_string())
            }
        }
    }
}

/// Percent-encode the characters of a model id or ARN that are not path-safe.
fn encode_model_id(model: &str) -> String {
    model.replace(':', "%3A").replace('/', "%2F")
}

#[async_trait]
impl DecisionSource for ConverseClient {
    async fn decide(&self, conversation: &Conversation) -> Result<Verdict> {
        let request = self.build_request(conversation);
        debug!("Sending {} turn(s) to the model", conversation.len());

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(Error::Decision(format!("Converse API error ({status}): {error_text}")));
        }

        let converse_response: ConverseResponse = response.json().await?;
        if let Some(usage) = &converse_response.usage {
            debug!(
                "Model usage: {} in / {} out",
                usage.input_tokens.unwrap_or(0),
                usage.output_tokens.unwrap_or(0)
            );
        }
        Ok(Self::parse_response(converse_response))
    }

    fn name(&self) -> &str {
        "model"
    }
}
