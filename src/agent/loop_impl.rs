//! Agent loop - bounded decide / invoke cycle

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::tools::ToolRunner;
use crate::Result;

use super::decision::{DecisionSource, Verdict};
use super::message::{Conversation, Message};

/// One tool invocation and what it returned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolTrace {
    pub name: String,
    pub input: Value,
    pub result: Value,
}

/// Successful end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    /// Final answer text.
    pub response: String,
    /// Last invocation of the run, if any tool ran.
    pub tool_called: Option<ToolTrace>,
    /// Every invocation of the run, in order.
    pub invocations: Vec<ToolTrace>,
}

/// The agent loop alternates decision rounds and tool rounds until the
/// decision source answers or the budget runs out.
pub struct AgentLoop<D: DecisionSource> {
    source: D,
    tools: Arc<ToolRunner>,
    max_recursions: i64,
}

impl<D: DecisionSource> AgentLoop<D> {
    /// Create a new agent loop
    pub fn new(source: D, tools: Arc<ToolRunner>, max_recursions: i64) -> Self {
        Self {
            source,
            tools,
            max_recursions,
        }
    }

    pub fn source(&self) -> &D {
        &self.source
    }

    pub fn tools(&self) -> &ToolRunner {
        &self.tools
    }

    /// Run with the configured budget. The conversation must already end
    /// with the user's turn.
    pub async fn run(&self, conversation: &mut Conversation) -> Result<Outcome> {
        self.run_with_budget(conversation, self.max_recursions).await
    }

    /// Run one user turn against a session's conversation.
    ///
    /// The run works on a copy that replaces `conversation` only when it
    /// succeeds. A failed or dropped run leaves the session exactly as it was
    /// before `text`, so the next turn never follows a dangling user or
    /// tool-use turn.
    pub async fn run_turn(&self, conversation: &mut Conversation, text: &str) -> Result<Outcome> {
        let mut working = conversation.clone();
        working.push_user_text(text);

        let outcome = self.run(&mut working).await?;
        *conversation = working;
        Ok(outcome)
    }

    /// Run with an explicit budget. Each decision round costs one unit; a
    /// budget of zero or less fails before the decision source is called.
    ///
    /// On error the conversation keeps every turn appended so far.
    pub async fn run_with_budget(
        &self,
        conversation: &mut Conversation,
        budget: i64,
    ) -> Result<Outcome> {
        let mut budget = budget;
        let mut invocations: Vec<ToolTrace> = Vec::new();

        info!("Starting agent loop ({}) with {} turn(s)", self.source.name(), conversation.len());

        loop {
            if budget <= 0 {
                warn!("Recursion budget exhausted");
                return Err(Error::MaxRecursion);
            }
            debug!("Decision round, budget {}", budget);

            match self.source.decide(conversation).await? {
                Verdict::FinalAnswer(text) => {
                    info!("Agent completed with response: {} chars", text.len());
                    conversation.push(Message::assistant(text.clone()));
                    return Ok(Outcome {
                        response: text,
                        tool_called: invocations.last().cloned(),
                        invocations,
                    });
                }

                Verdict::ToolRequests { requests, content } => {
                    if requests.is_empty() {
                        return Err(Error::NoToolUse);
                    }
                    debug!("Invoking {} tool(s)", requests.len());

                    conversation.push(Message::assistant_blocks(content));
                    let results = self.tools.invoke_all(&requests).await;

                    for (request, result) in requests.iter().zip(&results) {
                        debug!(
                            "Tool {} -> {}",
                            request.name,
                            if result.is_error() { "error" } else { "ok" }
                        );
                        invocations.push(ToolTrace {
                            name: request.name.clone(),
                            input: request.input.clone(),
                            result: result.payload(),
                        });
                    }

                    conversation.push(Message::tool_results(results));
                    budget -= 1;
                }

                Verdict::NoActionFound => {
                    warn!("Decision source produced no action");
                    return Err(Error::NoToolUse);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::decision::{FakeDecisionSource, HeuristicDecision};
    use crate::agent::message::{ContentBlock, Role, ToolInvocationRequest};
    use crate::tools::testing::{EchoTool, StallingTool};
    use crate::tools::TimeTool;
    use serde_json::json;

    fn runner() -> Arc<ToolRunner> {
        let mut runner = ToolRunner::new();
        runner.register(EchoTool);
        runner.register(StallingTool);
        runner.register(TimeTool::new("Asia/Bangkok"));
        Arc::new(runner)
    }

    fn seeded(text: &str) -> Conversation {
        let mut conversation = Conversation::new();
        conversation.push_user_text(text);
        conversation
    }

    #[tokio::test]
    async fn test_agent_loop_simple() {
        let source = FakeDecisionSource::new(vec![Verdict::FinalAnswer("Hello, human!".into())]);
        let agent = AgentLoop::new(source, runner(), 5);

        let mut conversation = seeded("Hi there");
        let outcome = agent.run(&mut conversation).await.unwrap();

        assert_eq!(outcome.response, "Hello, human!");
        assert!(outcome.tool_called.is_none());
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.last().unwrap().role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_non_positive_budget_skips_decision() {
        for budget in [0, -1, -10] {
            let source = FakeDecisionSource::new(vec![Verdict::FinalAnswer("never".into())]);
            let agent = AgentLoop::new(source, runner(), 5);
            let mut conversation = seeded("hi");

            let err = agent.run_with_budget(&mut conversation, budget).await.unwrap_err();
            assert_eq!(err.kind(), "max_recursion");
            assert_eq!(agent.source().calls(), 0);
            assert_eq!(conversation.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_two_requests_one_round() {
        let requests = vec![
            ToolInvocationRequest::with_id("a", "Echo_Tool", json!({"n": 1})),
            ToolInvocationRequest::with_id("b", "Echo_Tool", json!({"n": 2})),
        ];
        let source = FakeDecisionSource::new(vec![
            Verdict::from_blocks(vec![
                ContentBlock::text("Checking"),
                ContentBlock::ToolUse(requests[0].clone()),
                ContentBlock::ToolUse(requests[1].clone()),
            ]),
            Verdict::FinalAnswer("done".into()),
        ]);
        let agent = AgentLoop::new(source, runner(), 5);

        let mut conversation = seeded("do two things");
        let outcome = agent.run(&mut conversation).await.unwrap();

        // user, assistant(tool use), user(results), assistant(answer)
        assert_eq!(conversation.len(), 4);
        let results_turn = &conversation.turns()[2];
        assert_eq!(results_turn.role, Role::User);
        let ids: Vec<&str> = results_turn.tool_result_blocks().map(|r| r.tool_use_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        assert_eq!(conversation.turns()[1].content[0], ContentBlock::text("Checking"));
        assert_eq!(agent.source().seen_lengths(), vec![1, 3]);

        assert_eq!(outcome.invocations.len(), 2);
        let last = outcome.tool_called.unwrap();
        assert_eq!(last.input, json!({"n": 2}));
        assert_eq!(last.result, json!({"echo": {"n": 2}}));
    }

    #[tokio::test]
    async fn test_unknown_tool_does_not_stop_loop() {
        let source = FakeDecisionSource::new(vec![
            Verdict::tools(vec![ToolInvocationRequest::with_id("x", "Ghost_Tool", json!({}))]),
            Verdict::FinalAnswer("sorry".into()),
        ]);
        let agent = AgentLoop::new(source, runner(), 5);

        let mut conversation = seeded("haunt me");
        let outcome = agent.run(&mut conversation).await.unwrap();

        assert_eq!(outcome.response, "sorry");
        assert_eq!(outcome.tool_called.unwrap().result["error"], "tool_not_found");
    }

    #[tokio::test]
    async fn test_budget_exhaustion_keeps_transcript() {
        let verdicts = (0..3)
            .map(|i| Verdict::tools(vec![ToolInvocationRequest::new("Echo_Tool", json!({"i": i}))]))
            .collect();
        let source = FakeDecisionSource::new(verdicts);
        let agent = AgentLoop::new(source, runner(), 2);

        let mut conversation = seeded("loop forever");
        let err = agent.run(&mut conversation).await.unwrap_err();

        assert!(matches!(err, Error::MaxRecursion));
        assert_eq!(agent.source().calls(), 2);
        assert_eq!(conversation.len(), 5);
    }

    #[tokio::test]
    async fn test_no_action_is_no_tool_use() {
        let source = FakeDecisionSource::new(vec![Verdict::NoActionFound]);
        let agent = AgentLoop::new(source, runner(), 5);

        let err = agent.run(&mut seeded("?")).await.unwrap_err();
        assert_eq!(err.kind(), "no_tool_use");
    }

    #[tokio::test]
    async fn test_empty_tool_requests_is_no_tool_use() {
        let source = FakeDecisionSource::new(vec![Verdict::tools(vec![])]);
        let agent = AgentLoop::new(source, runner(), 5);

        let err = agent.run(&mut seeded("?")).await.unwrap_err();
        assert!(matches!(err, Error::NoToolUse));
    }

    #[tokio::test]
    async fn test_decision_errors_propagate() {
        let source = FakeDecisionSource::new(vec![]);
        let agent = AgentLoop::new(source, runner(), 5);

        let err = agent.run(&mut seeded("hi")).await.unwrap_err();
        assert_eq!(err.kind(), "processing_error");
    }

    #[tokio::test]
    async fn test_run_turn_commits_on_success() {
        let source = FakeDecisionSource::new(vec![
            Verdict::tools(vec![ToolInvocationRequest::new("Echo_Tool", json!({}))]),
            Verdict::FinalAnswer("done".into()),
        ]);
        let agent = AgentLoop::new(source, runner(), 5);

        let mut conversation = Conversation::new();
        agent.run_turn(&mut conversation, "hi").await.unwrap();
        assert_eq!(conversation.len(), 4);
    }

    #[tokio::test]
    async fn test_failed_turns_leave_session_untouched() {
        let source = FakeDecisionSource::new(vec![
            Verdict::FinalAnswer("first".into()),
            Verdict::tools(vec![ToolInvocationRequest::new("Echo_Tool", json!({}))]),
            Verdict::tools(vec![ToolInvocationRequest::new("Echo_Tool", json!({}))]),
        ]);
        let agent = AgentLoop::new(source, runner(), 2);

        let mut conversation = Conversation::new();
        agent.run_turn(&mut conversation, "one").await.unwrap();
        let before = conversation.turns().to_vec();

        // Budget runs out after two tool rounds.
        let err = agent.run_turn(&mut conversation, "two").await.unwrap_err();
        assert_eq!(err.kind(), "max_recursion");
        assert_eq!(conversation.turns(), &before[..]);

        // Scripted verdicts are exhausted, so the decision itself fails.
        let err = agent.run_turn(&mut conversation, "three").await.unwrap_err();
        assert_eq!(err.kind(), "processing_error");
        assert_eq!(conversation.turns(), &before[..]);
        assert_eq!(conversation.last().unwrap().role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_dropped_turn_leaves_session_untouched() {
        let source = FakeDecisionSource::new(vec![Verdict::tools(vec![ToolInvocationRequest::new(
            "Stalling_Tool",
            json!({}),
        )])]);
        let agent = AgentLoop::new(source, runner(), 5);

        let mut conversation = Conversation::new();
        let turn = agent.run_turn(&mut conversation, "wait");
        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(50), turn).await;

        assert!(timed_out.is_err());
        assert_eq!(agent.source().calls(), 1);
        assert!(conversation.is_empty());
    }

    #[tokio::test]
    async fn test_heuristic_time_round_trip() {
        let agent = AgentLoop::new(HeuristicDecision::new("Asia/Bangkok"), runner(), 5);

        let mut conversation = seeded("?? !!");
        let outcome = agent.run(&mut conversation).await.unwrap();

        let call = outcome.tool_called.unwrap();
        assert_eq!(call.name, "Time_Tool");
        assert_eq!(call.result["timezone"], "Asia/Bangkok");
        assert!(outcome.response.starts_with("Current time in Asia/Bangkok: "));
    }
}
