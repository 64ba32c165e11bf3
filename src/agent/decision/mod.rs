//! Decision sources.
//!
//! A decision source looks at the conversation so far and either answers or
//! asks for tools. Two implementations share the [`DecisionSource`] trait:
//! - [`ConverseClient`]: remote model over the Bedrock Converse API
//! - [`HeuristicDecision`]: local pattern matching, no network
//!
//! One is picked at startup by [`DecisionRegistry::create`] and held for the
//! whole session.

mod converse;
mod heuristic;
mod types;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::Error;
use crate::tools::ToolDefinition;
use crate::Result;

pub use converse::ConverseClient;
pub use heuristic::{render_tool_results, HeuristicDecision};
pub use types::*;

use super::message::{ContentBlock, Conversation, ToolInvocationRequest};

/// What the decision source wants to happen next.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Terminal answer.
    FinalAnswer(String),

    /// Run every request, then ask again. `content` is the assistant turn
    /// as the producer emitted it: the tool uses plus any text around them.
    ToolRequests {
        requests: Vec<ToolInvocationRequest>,
        content: Vec<ContentBlock>,
    },

    /// A tool request was expected but none was produced.
    NoActionFound,
}

impl Verdict {
    /// Tool requests with no surrounding text.
    pub fn tools(requests: Vec<ToolInvocationRequest>) -> Self {
        let content = requests.iter().cloned().map(ContentBlock::ToolUse).collect();
        Verdict::ToolRequests { requests, content }
    }

    /// Tool requests taken from an emitted block list, order kept.
    pub fn from_blocks(content: Vec<ContentBlock>) -> Self {
        let requests = content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse(request) => Some(request.clone()),
                _ => None,
            })
            .collect();
        Verdict::ToolRequests { requests, content }
    }
}

/// Decision source trait: swappable strategy.
#[async_trait]
pub trait DecisionSource: Send + Sync {
    /// Decide the next step for the conversation.
    async fn decide(&self, conversation: &Conversation) -> Result<Verdict>;

    /// Short name for logs and status output.
    fn name(&self) -> &str;
}

#[async_trait]
impl DecisionSource for Box<dyn DecisionSource> {
    async fn decide(&self, conversation: &Conversation) -> Result<Verdict> {
        (**self).decide(conversation).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Decision registry: picks a decision source from configuration.
///
/// # Example
///
/// ```ignore
/// let source = DecisionRegistry::create(&config, &runner.definitions())?;
/// let agent = AgentLoop::new(source, Arc::new(runner), config.max_recursions);
/// ```
pub struct DecisionRegistry;

impl DecisionRegistry {
    /// Create a decision source from configuration.
    ///
    /// Supported values of `config.decision`:
    /// - `"model"`: remote model, requires the model service key
    /// - `"heuristic"`: local pattern matching
    /// - `"auto"`: model when a key is configured, heuristic otherwise
    pub fn create(config: &Config, tools: &[ToolDefinition]) -> Result<Box<dyn DecisionSource>> {
        match Self::selected(config)? {
            "model" => {
                let client = ConverseClient::from_config(config, tools)?;
                Ok(Box::new(client))
            }
            _ => Ok(Box::new(HeuristicDecision::new(&config.default_timezone))),
        }
    }

    /// Which source `create` would build.
    pub fn selected(config: &Config) -> Result<&'static str> {
        match config.decision.as_str() {
            "model" if config.bedrock_key().is_none() => Err(Error::Config(
                "decision = \"model\" requires AWS_BEARER_TOKEN_BEDROCK or bedrock_api_key"
                    .to_string(),
            )),
            "model" => Ok("model"),
            "heuristic" => Ok("heuristic"),
            "auto" if config.bedrock_key().is_some() => Ok("model"),
            "auto" => Ok("heuristic"),
            other => Err(Error::Config(format!(
                "Unknown decision source: {other} (expected one of: {})",
                Self::available().join(", ")
            ))),
        }
    }

    /// List available decision source names.
    pub fn available() -> &'static [&'static str] {
        &["auto", "model", "heuristic"]
    }
}

/// Scripted decision source for testing.
#[cfg(test)]
pub struct FakeDecisionSource {
    verdicts: std::sync::Mutex<std::collections::VecDeque<Verdict>>,
    seen: std::sync::Mutex<Vec<usize>>,
}

#[cfg(test)]
impl FakeDecisionSource {
    pub fn new(verdicts: Vec<Verdict>) -> Self {
        Self {
            verdicts: std::sync::Mutex::new(verdicts.into()),
            seen: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Number of `decide` calls so far.
    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// Conversation length observed at each call.
    pub fn seen_lengths(&self) -> Vec<usize> {
        self.seen.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl DecisionSource for FakeDecisionSource {
    async fn decide(&self, conversation: &Conversation) -> Result<Verdict> {
        self.seen.lock().unwrap().push(conversation.len());
        self.verdicts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Decision("No more fake verdicts".to_string()))
    }

    fn name(&self) -> &str {
        "fake"
    }
}
