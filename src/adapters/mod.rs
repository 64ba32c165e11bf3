//! Adapters module: inbound surfaces.
//!
//! Adapters sit in front of the agent loop; none of them holds orchestration
//! logic of its own.
//!
//! # Supported Channels
//!
//! - **CLI**: single-shot or interactive terminal session
//! - **HTTP**: `POST /chat_agent` endpoint with optional sessions (axum)

pub mod cli;
pub mod http;

/// Channel trait for long-running adapters.
///
/// All channel implementations must be [`Send`] + [`Sync`] for async compatibility.
pub trait Channel: Send + Sync {
    /// Channel name (e.g., "http").
    fn name(&self) -> &str;

    /// Start serving.
    fn start(&self) -> impl std::future::Future<Output = crate::Result<()>> + Send;

    /// Stop the channel.
    fn stop(&self) -> impl std::future::Future<Output = crate::Result<()>> + Send;
}

/// Channel registry: metadata about available channels.
pub struct ChannelRegistry;

impl ChannelRegistry {
    /// List all available channel names.
    pub fn available() -> &'static [&'static str] {
        &["cli", "http"]
    }

    /// Get a human-readable description of a channel.
    pub fn description(name: &str) -> &'static str {
        match name {
            "cli" => "Interactive command line interface",
            "http" => "JSON endpoint at POST /chat_agent",
            _ => "Unknown channel",
        }
    }
}
