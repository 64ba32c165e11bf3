//! Configuration management
//!
//! Settings come from `~/.skyclock/config.json` (optional), then the
//! process environment (populated from `.env` by the binary) overrides the
//! credential and region fields.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::Result;

/// Environment variable holding the OpenWeather credential
pub const ENV_OPENWEATHER_KEY: &str = "API_OPEN_WEATHER";
/// Environment variable holding the model service region
pub const ENV_REGION: &str = "REGION_NAME";
/// Environment variable holding the model service API key
pub const ENV_BEDROCK_KEY: &str = "AWS_BEARER_TOKEN_BEDROCK";
/// Environment variable overriding the model identifier
pub const ENV_MODEL: &str = "SKYCLOCK_MODEL";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// OpenWeather API key
    #[serde(default)]
    pub openweather_api_key: Option<String>,

    /// Base URL for geocoding, forecast and current-weather endpoints
    #[serde(default = "default_openweather_base_url")]
    pub openweather_base_url: String,

    /// Unit system passed to the weather provider
    #[serde(default = "default_units")]
    pub units: String,

    /// Language passed to the weather provider
    #[serde(default = "default_lang")]
    pub lang: String,

    /// Timeout applied to every outbound tool request
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Timezone used when the time tool gets none
    #[serde(default = "default_timezone")]
    pub default_timezone: String,

    /// Decision source: "auto", "model" or "heuristic"
    #[serde(default = "default_decision")]
    pub decision: String,

    /// Model service region
    #[serde(default = "default_region")]
    pub region: String,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Model service API key
    #[serde(default)]
    pub bedrock_api_key: Option<String>,

    /// Full URL override for the model service (tests, proxies)
    #[serde(default)]
    pub bedrock_endpoint: Option<String>,

    /// Decision rounds allowed per user turn
    #[serde(default = "default_max_recursions")]
    pub max_recursions: i64,

    /// Listen address for `serve`
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Most HTTP sessions kept at once; the least recently used goes first
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Seconds an HTTP session may sit idle before it is dropped
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
}

fn default_openweather_base_url() -> String {
    "https://api.openweathermap.org".to_string()
}

fn default_units() -> String {
    "metric".to_string()
}

fn default_lang() -> String {
    "th".to_string()
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_timezone() -> String {
    "Asia/Bangkok".to_string()
}

fn default_decision() -> String {
    "auto".to_string()
}

fn default_region() -> String {
    "ap-northeast-1".to_string()
}

fn default_model() -> String {
    "apac.anthropic.claude-3-haiku-20240307-v1:0".to_string()
}

fn default_max_recursions() -> i64 {
    5
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_max_sessions() -> usize {
    1000
}

fn default_session_idle_secs() -> u64 {
    1800
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openweather_api_key: None,
            openweather_base_url: default_openweather_base_url(),
            units: default_units(),
            lang: default_lang(),
            http_timeout_secs: default_http_timeout_secs(),
            default_timezone: default_timezone(),
            decision: default_decision(),
            region: default_region(),
            model: default_model(),
            bedrock_api_key: None,
            bedrock_endpoint: None,
            max_recursions: default_max_recursions(),
            bind: default_bind(),
            max_sessions: default_max_sessions(),
            session_idle_secs: default_session_idle_secs(),
        }
    }
}

impl Config {
    /// Apply environment overrides using the given lookup.
    ///
    /// Empty values are ignored so a blank `.env` entry never masks the file.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_OPENWEATHER_KEY) {
            self.openweather_api_key = Some(key);
        }
        if let Some(region) = get(ENV_REGION) {
            self.region = region;
        }
        if let Some(key) = get(ENV_BEDROCK_KEY) {
            self.bedrock_api_key = Some(key);
        }
        if let Some(model) = get(ENV_MODEL) {
            self.model = model;
        }
    }

    /// OpenWeather key, if one is set and non-empty
    pub fn openweather_key(&self) -> Option<&str> {
        self.openweather_api_key.as_deref().filter(|k| !k.is_empty())
    }

    /// Model service key, if one is set and non-empty
    pub fn bedrock_key(&self) -> Option<&str> {
        self.bedrock_api_key.as_deref().filter(|k| !k.is_empty())
    }
}

/// Get the config directory path
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".skyclock")
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Load configuration from the default path plus environment overrides
pub fn load() -> Result<Config> {
    let mut config = load_from(&config_path())?;
    config.apply_env(|name| std::env::var(name).ok());
    Ok(config)
}

/// Load configuration from a file; a missing file yields defaults
pub fn load_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}

/// Save configuration to a file
pub fn save_to(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Write a default config file unless one already exists
pub fn init() -> Result<PathBuf> {
    let path = config_path();
    if !path.exists() {
        save_to(&Config::default(), &path)?;
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.max_recursions, 5);
        assert_eq!(config.default_timezone, "Asia/Bangkok");
        assert_eq!(config.http_timeout_secs, 10);
        assert!(config.openweather_key().is_none());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.decision, "auto");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.max_recursions = 3;
        config.lang = "en".to_string();
        save_to(&config, &path).unwrap();

        let parsed = load_from(&path).unwrap();
        assert_eq!(parsed.max_recursions, 3);
        assert_eq!(parsed.lang, "en");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"units": "imperial"}"#).unwrap();

        let config = load_from(&path).unwrap();
        assert_eq!(config.units, "imperial");
        assert_eq!(config.region, "ap-northeast-1");
        assert_eq!(config.max_sessions, 1000);
        assert_eq!(config.session_idle_secs, 1800);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_OPENWEATHER_KEY, "ow-key"),
            (ENV_REGION, "us-east-1"),
            (ENV_BEDROCK_KEY, ""),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.openweather_key(), Some("ow-key"));
        assert_eq!(config.region, "us-east-1");
        assert!(config.bedrock_key().is_none());
    }
}
