//! Time tool - current wall-clock time in a timezone

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::{json, Value};

use super::{input_str, Tool, ToolError, ToolErrorKind, ToolOutcome};

/// Registered name of the time tool
pub const TIME_TOOL: &str = "Time_Tool";

/// Reports the current date and time in an IANA timezone
pub struct TimeTool {
    default_timezone: String,
}

impl TimeTool {
    pub fn new(default_timezone: &str) -> Self {
        Self {
            default_timezone: default_timezone.to_string(),
        }
    }

    /// Format `now` in the named zone. Pure, so equal inputs give equal output.
    pub fn format_at(now: DateTime<Utc>, tz_name: &str) -> ToolOutcome {
        let tz: Tz = tz_name.parse().map_err(|_| {
            ToolError::new(ToolErrorKind::InvalidTimezone, format!("Unknown timezone: {tz_name}"))
        })?;
        let local = now.with_timezone(&tz);

        Ok(json!({
            "current_time": local.format("%Y-%m-%d %H:%M:%S").to_string(),
            "date": local.format("%d-%m-%Y").to_string(),
            "time": local.format("%H:%M:%S").to_string(),
            "timezone": tz_name,
        }))
    }
}

#[async_trait]
impl Tool for TimeTool {
    fn name(&self) -> &str { TIME_TOOL }

    fn description(&self) -> &str {
        "Get the current local time for Thailand or any specified timezone."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "timezone": {
                    "type": "string",
                    "description": format!("Timezone in TZ format, e.g., Asia/Bangkok. Default is {}.", self.default_timezone)
                }
            },
            "required": []
        })
    }

    async fn execute(&self, input: Value) -> ToolOutcome {
        let tz_name =
            input_str(&input, "timezone").unwrap_or_else(|| self.default_timezone.clone());
        Self::format_at(Utc::now(), &tz_name)
    }
}
