//! HTTP adapter: request/response endpoint over axum.
//!
//! `POST /chat_agent` runs one user turn. Without a `session_id` every request
//! starts a fresh conversation; with one, the conversation is kept in memory
//! and turns of the same session run one at a time. Sessions are bounded in
//! number and expire after sitting idle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tracing::{debug, info};

use crate::agent::{AgentLoop, Conversation, DecisionSource};
use crate::config::Config;
use crate::Result;

use super::Channel;

/// Body of `POST /chat_agent`
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub text: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

struct SessionEntry {
    conversation: Arc<AsyncMutex<Conversation>>,
    last_used: Instant,
    /// Access order; lowest is least recently used.
    seq: u64,
}

#[derive(Default)]
struct Sessions {
    entries: HashMap<String, SessionEntry>,
    clock: u64,
}

/// In-memory conversations keyed by session id.
///
/// Idle sessions are swept on every access. When a new session would exceed
/// `max_sessions`, the least recently used one is evicted.
pub struct SessionStore {
    sessions: Mutex<Sessions>,
    max_sessions: usize,
    idle_ttl: Duration,
}

impl SessionStore {
    pub fn new(max_sessions: usize, idle_ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(Sessions::default()),
            max_sessions: max_sessions.max(1),
            idle_ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_sessions, Duration::from_secs(config.session_idle_secs))
    }

    pub fn get_or_create(&self, id: &str) -> Arc<AsyncMutex<Conversation>> {
        let mut guard = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let Sessions { entries, clock } = &mut *guard;
        let now = Instant::now();

        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.last_used) < self.idle_ttl);
        if entries.len() < before {
            debug!("Expired {} idle session(s)", before - entries.len());
        }

        if !entries.contains_key(id) {
            while entries.len() >= self.max_sessions {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.seq)
                    .map(|(key, _)| key.clone());
                let Some(oldest) = oldest else { break };
                entries.remove(&oldest);
                debug!("Evicted session {}", oldest);
            }
        }

        *clock += 1;
        let entry = entries.entry(id.to_string()).or_insert_with(|| SessionEntry {
            conversation: Arc::default(),
            last_used: now,
            seq: 0,
        });
        entry.last_used = now;
        entry.seq = *clock;
        entry.conversation.clone()
    }

    pub fn contains(&self, id: &str) -> bool {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.entries.contains_key(id)
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.entries.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner()).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Shared state behind every handler
pub struct AppState<D: DecisionSource> {
    pub agent: AgentLoop<D>,
    pub sessions: SessionStore,
}

impl<D: DecisionSource> AppState<D> {
    pub fn new(agent: AgentLoop<D>) -> Self {
        Self::with_sessions(agent, SessionStore::default())
    }

    pub fn with_sessions(agent: AgentLoop<D>, sessions: SessionStore) -> Self {
        Self { agent, sessions }
    }
}

/// Build the router.
pub fn router<D: DecisionSource + 'static>(state: Arc<AppState<D>>) -> Router {
    Router::new()
        .route("/chat_agent", post(chat_agent::<D>))
        .route("/sessions/:id", delete(clear_session::<D>))
        .route("/tools", get(list_tools::<D>))
        .route("/health", get(health::<D>))
        .with_state(state)
}

fn invalid_input(message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": "invalid_input", "message": message.into()})),
    )
}

async fn chat_agent<D: DecisionSource + 'static>(
    State(state): State<Arc<AppState<D>>>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return invalid_input(rejection.body_text()),
    };

    let text = req.text.trim();
    if text.is_empty() {
        return invalid_input("text must not be empty");
    }

    let result = match req.session_id.as_deref() {
        Some(id) => {
            let session = state.sessions.get_or_create(id);
            let mut conversation = session.lock().await;
            state.agent.run_turn(&mut conversation, text).await
        }
        None => state.agent.run_turn(&mut Conversation::new(), text).await,
    };

    let body = match result {
        Ok(outcome) => {
            let last = outcome.tool_called.as_ref();
            json!({
                "user_input": text,
                "response": outcome.response,
                "tool_called": last.map(|t| t.name.clone()),
                "tool_input": last.map(|t| t.input.clone()),
                "tool_result": last.map(|t| t.result.clone()),
                "invocations": outcome.invocations,
            })
        }
        Err(e) => json!({"user_input": text, "error": e.kind(), "message": e.to_string()}),
    };
    (StatusCode::OK, Json(body))
}

async fn clear_session<D: DecisionSource + 'static>(
    State(state): State<Arc<AppState<D>>>,
    Path(id): Path<String>,
) -> StatusCode {
    if state.sessions.remove(&id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn list_tools<D: DecisionSource + 'static>(
    State(state): State<Arc<AppState<D>>>,
) -> Json<Value> {
    Json(json!(state.agent.tools().definitions()))
}

async fn health<D: DecisionSource + 'static>(
    State(state): State<Arc<AppState<D>>>,
) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "decision": state.agent.source().name(),
        "tools": state.agent.tools().tool_names(),
        "sessions": state.sessions.len(),
    }))
}

/// HTTP channel serving the router on a bind address.
pub struct HttpChannel<D: DecisionSource + 'static> {
    bind: String,
    state: Arc<AppState<D>>,
    shutdown: Arc<Notify>,
}

impl<D: DecisionSource + 'static> HttpChannel<D> {
    pub fn new(bind: &str, agent: AgentLoop<D>, sessions: SessionStore) -> Self {
        Self {
            bind: bind.to_string(),
            state: Arc::new(AppState::with_sessions(agent, sessions)),
            shutdown: Arc::new(Notify::new()),
        }
    }
}

impl<D: DecisionSource + 'static> Channel for HttpChannel<D> {
    fn name(&self) -> &str {
        "http"
    }

    async fn start(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.bind).await?;
        info!("Listening on http://{}", listener.local_addr()?);

        let shutdown = self.shutdown.clone();
        axum::serve(listener, router(self.state.clone()))
            .with_graceful_shutdown(async move { shutdown.notified().await })
            .await?;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.shutdown.notify_one();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::decision::FakeDecisionSource;
    use crate::agent::{HeuristicDecision, ToolInvocationRequest, Verdict};
    use crate::tools::testing::EchoTool;
    use crate::tools::{TimeTool, ToolRunner};

    fn tools() -> Arc<ToolRunner> {
        let mut runner = ToolRunner::new();
        runner.register(EchoTool);
        runner.register(TimeTool::new("Asia/Bangkok"));
        Arc::new(runner)
    }

    async fn serve<D: DecisionSource + 'static>(state: Arc<AppState<D>>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn post_chat(base: &str, body: Value) -> (u16, Value) {
        let response = reqwest::Client::new()
            .post(format!("{base}/chat_agent"))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    #[tokio::test]
    async fn test_chat_agent_with_heuristic() {
        let agent = AgentLoop::new(HeuristicDecision::new("Asia/Bangkok"), tools(), 5);
        let base = serve(Arc::new(AppState::new(agent))).await;

        let (status, body) = post_chat(&base, json!({"text": "?? !!"})).await;

        assert_eq!(status, 200);
        assert_eq!(body["user_input"], "?? !!");
        assert_eq!(body["tool_called"], "Time_Tool");
        assert_eq!(body["tool_input"], json!({"timezone": "Asia/Bangkok"}));
        assert_eq!(body["tool_result"]["timezone"], "Asia/Bangkok");
        assert!(body["response"].as_str().unwrap().starts_with("Current time in"));
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let agent = AgentLoop::new(FakeDecisionSource::new(vec![]), tools(), 5);
        let base = serve(Arc::new(AppState::new(agent))).await;

        let (status, body) = post_chat(&base, json!({"text": "  "})).await;
        assert_eq!(status, 400);
        assert_eq!(body["error"], "invalid_input");
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_input() {
        let agent = AgentLoop::new(FakeDecisionSource::new(vec![]), tools(), 5);
        let base = serve(Arc::new(AppState::new(agent))).await;

        let (status, body) = post_chat(&base, json!({"session_id": "s1"})).await;
        assert_eq!(status, 400);
        assert_eq!(body["error"], "invalid_input");
        assert!(body["message"].as_str().unwrap().contains("text"));

        let response = reqwest::Client::new()
            .post(format!("{base}/chat_agent"))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "invalid_input");
    }

    #[tokio::test]
    async fn test_failed_turn_does_not_poison_session() {
        let verdicts = vec![
            Verdict::FinalAnswer("first".into()),
            Verdict::NoActionFound,
            Verdict::FinalAnswer("third".into()),
        ];
        let state = Arc::new(AppState::new(AgentLoop::new(FakeDecisionSource::new(verdicts), tools(), 5)));
        let base = serve(state.clone()).await;

        post_chat(&base, json!({"text": "a", "session_id": "s1"})).await;
        let (_, failed) = post_chat(&base, json!({"text": "b", "session_id": "s1"})).await;
        assert_eq!(failed["error"], "no_tool_use");
        let (_, body) = post_chat(&base, json!({"text": "c", "session_id": "s1"})).await;
        assert_eq!(body["response"], "third");

        // "b" was dropped, so "c" directly follows the first answer.
        assert_eq!(state.agent.source().seen_lengths(), vec![1, 3, 3]);
        let session = state.sessions.get_or_create("s1");
        let conversation = session.lock().await;
        let texts: Vec<&str> = conversation.turns().iter().filter_map(|m| m.first_text()).collect();
        assert_eq!(texts, vec!["a", "first", "c", "third"]);
    }

    #[tokio::test]
    async fn test_orchestration_errors_are_reported() {
        let verdicts = vec![Verdict::tools(vec![ToolInvocationRequest::new("Echo_Tool", json!({}))])];
        let agent = AgentLoop::new(FakeDecisionSource::new(verdicts), tools(), 1);
        let base = serve(Arc::new(AppState::new(agent))).await;

        let (status, body) = post_chat(&base, json!({"text": "spin"})).await;
        assert_eq!(status, 200);
        assert_eq!(body["error"], "max_recursion");
        assert_eq!(body["message"], "Maximum recursion reached.");
    }

    #[tokio::test]
    async fn test_sessions_accumulate_and_clear() {
        let verdicts = vec![
            Verdict::FinalAnswer("first".into()),
            Verdict::FinalAnswer("second".into()),
        ];
        let state = Arc::new(AppState::new(AgentLoop::new(FakeDecisionSource::new(verdicts), tools(), 5)));
        let base = serve(state.clone()).await;

        post_chat(&base, json!({"text": "a", "session_id": "s1"})).await;
        post_chat(&base, json!({"text": "b", "session_id": "s1"})).await;

        // The second decision saw both user turns plus the first answer.
        assert_eq!(state.agent.source().seen_lengths(), vec![1, 3]);
        assert_eq!(state.sessions.get_or_create("s1").lock().await.len(), 4);

        let client = reqwest::Client::new();
        let deleted = client.delete(format!("{base}/sessions/s1")).send().await.unwrap();
        assert_eq!(deleted.status().as_u16(), 204);
        let missing = client.delete(format!("{base}/sessions/s1")).send().await.unwrap();
        assert_eq!(missing.status().as_u16(), 404);
    }

    #[tokio::test]
    async fn test_tools_and_health() {
        let agent = AgentLoop::new(HeuristicDecision::new("Asia/Bangkok"), tools(), 5);
        let base = serve(Arc::new(AppState::new(agent))).await;

        let tools: Value = reqwest::get(format!("{base}/tools")).await.unwrap().json().await.unwrap();
        assert_eq!(tools[0]["name"], "Echo_Tool");
        assert_eq!(tools[1]["name"], "Time_Tool");

        let health: Value = reqwest::get(format!("{base}/health")).await.unwrap().json().await.unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["decision"], "heuristic");
        assert_eq!(health["tools"], json!(["Echo_Tool", "Time_Tool"]));
        assert_eq!(health["sessions"], 0);
    }

    #[test]
    fn test_least_recently_used_session_is_evicted() {
        let store = SessionStore::new(2, Duration::from_secs(3600));
        store.get_or_create("a");
        store.get_or_create("b");
        store.get_or_create("a");

        store.get_or_create("c");
        assert_eq!(store.len(), 2);
        assert!(store.contains("a"));
        assert!(!store.contains("b"));
        assert!(store.contains("c"));
    }

    #[test]
    fn test_idle_sessions_expire() {
        let store = SessionStore::new(10, Duration::ZERO);
        store.get_or_create("a");
        store.get_or_create("b");

        assert!(!store.contains("a"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_session_store() {
        let store = SessionStore::default();
        assert!(store.is_empty());
        let a = store.get_or_create("a");
        let again = store.get_or_create("a");
        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(store.len(), 1);
        assert!(store.remove("a"));
        assert!(!store.remove("a"));
    }
}
