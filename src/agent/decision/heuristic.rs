//! Heuristic decision source: picks a tool from the user's text.
//!
//! Rules, first match wins:
//! 1. two or more numbers: the first two are latitude/longitude
//! 2. a run of 2-20 Latin or Thai letters: a place name
//! 3. anything else: the time in the default timezone
//!
//! It cannot write prose. Once tool results are in, it ends the turn with a
//! plain rendering of those results.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use tracing::debug;

use crate::agent::message::{Conversation, ToolContent, ToolInvocationRequest};
use crate::tools::{TIME_TOOL, WEATHER_TOOL};
use crate::Result;

use super::{DecisionSource, Verdict};

const DEFAULT_FORECAST_DAYS: i64 = 3;

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"-?\d+\.?\d*").expect("valid number pattern"))
}

fn place_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Thai block ก..๙ plus ASCII letters; whitespace joins multi-word names.
    PATTERN.get_or_init(|| {
        Regex::new(r"[\u{0E01}-\u{0E59}A-Za-z\s]{2,20}").expect("valid place pattern")
    })
}

/// Local, dependency-free decision source
pub struct HeuristicDecision {
    default_timezone: String,
}

impl HeuristicDecision {
    pub fn new(default_timezone: &str) -> Self {
        Self {
            default_timezone: default_timezone.to_string(),
        }
    }

    /// Pick the single tool request for a piece of user text.
    pub fn request_for(&self, text: &str) -> ToolInvocationRequest {
        let numbers: Vec<&str> =
            number_pattern().find_iter(text).map(|m| m.as_str()).take(2).collect();
        if let [lat, lon] = numbers[..] {
            return ToolInvocationRequest::new(
                WEATHER_TOOL,
                json!({"latitude": lat, "longitude": lon, "cnt": DEFAULT_FORECAST_DAYS}),
            );
        }

        let place = place_pattern()
            .find_iter(text)
            .map(|m| m.as_str().trim())
            .find(|candidate| candidate.chars().count() >= 2);
        if let Some(city) = place {
            return ToolInvocationRequest::new(
                WEATHER_TOOL,
                json!({"city": city, "cnt": DEFAULT_FORECAST_DAYS}),
            );
        }

        ToolInvocationRequest::new(TIME_TOOL, json!({"timezone": self.default_timezone}))
    }
}

#[async_trait]
impl DecisionSource for HeuristicDecision {
    async fn decide(&self, conversation: &Conversation) -> Result<Verdict> {
        if let Some(last) = conversation.last().filter(|m| m.has_tool_results()) {
            debug!("Heuristic rendering {} tool result(s)", last.tool_result_blocks().count());
            return Ok(Verdict::FinalAnswer(render_tool_results(conversation)));
        }

        let Some(text) = conversation.latest_user_text() else {
            return Ok(Verdict::NoActionFound);
        };

        let request = self.request_for(text);
        debug!("Heuristic picked {} with {}", request.name, request.input);
        Ok(Verdict::tools(vec![request]))
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}

/// Plain-text rendering of the tool results in the conversation's last turn.
pub fn render_tool_results(conversation: &Conversation) -> String {
    let Some(last) = conversation.last() else {
        return String::new();
    };

    last.tool_result_blocks()
        .map(|result| {
            let tool = conversation
                .find_request(&result.tool_use_id)
                .map(|r| r.name.as_str())
                .unwrap_or("tool");

            match &result.content {
                ToolContent::Error(err) => format!("Error from {tool}: {}", err.message),
                ToolContent::Success(payload) if tool == TIME_TOOL => render_time(payload),
                ToolContent::Success(payload) if tool == WEATHER_TOOL => render_weather(payload),
                ToolContent::Success(_) => format!("{tool} executed successfully"),
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn field(value: &Value, path: &[&str]) -> String {
    let mut cursor = value;
    for key in path {
        match cursor.get(*key) {
            Some(next) => cursor = next,
            None => return "N/A".to_string(),
        }
    }
    match cursor {
        Value::String(s) => s.clone(),
        Value::Null => "N/A".to_string(),
        other => other.to_string(),
    }
}

fn render_time(payload: &Value) -> String {
    format!(
        "Current time in {}: {}",
        field(payload, &["timezone"]),
        field(payload, &["current_time"])
    )
}

fn render_weather(payload: &Value) -> String {
    let data = &payload["weather_data"];

    if let Some(days) = data["daily_forecast"]["daily"].as_array() {
        let mut out = format!("Forecast for the next {} day(s):", days.len());
        for (i, day) in days.iter().enumerate() {
            out.push_str(&format!(
                "\nDay {}: {}, {}°C (max {}°C, min {}°C), humidity {}%",
                i + 1,
                description(day),
                field(day, &["temp", "day"]),
                field(day, &["temp", "max"]),
                field(day, &["temp", "min"]),
                field(day, &["humidity"]),
            ));
        }
        return out;
    }

    if data.get("fallback_to_current").is_some() {
        let current = &data["current_weather"];
        if let Some(message) = current.get("message").filter(|_| current.get("error").is_some()) {
            return format!("Weather unavailable: {}", message.as_str().unwrap_or_default());
        }
        return format!(
            "Current weather (forecast unavailable: {}): {}, {}°C (feels like {}°C), humidity {}%, wind {} m/s",
            field(data, &["daily_error", "message"]),
            description(current),
            field(current, &["main", "temp"]),
            field(current, &["main", "feels_like"]),
            field(current, &["main", "humidity"]),
            field(current, &["wind", "speed"]),
        );
    }

    "Weather data received".to_string()
}

fn description(entry: &Value) -> String {
    entry["weather"][0]["description"]
        .as_str()
        .unwrap_or("N/A")
        .to_string()
}
