//! Weather tool - OpenWeather geocoding, One Call forecast, current weather
//!
//! Place names are geocoded first. A forecast is always attempted before
//! current conditions; when the forecast call fails for any reason the tool
//! falls back to current conditions and returns both the fallback payload
//! and the forecast error.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::Config;
use super::{input_i64, input_str, Tool, ToolError, ToolErrorKind, ToolOutcome};

/// Registered name of the weather tool
pub const WEATHER_TOOL: &str = "Weather_Tool";

const GEOCODE_PATH: &str = "/geo/1.0/direct";
const ONECALL_PATH: &str = "/data/3.0/onecall";
const CURRENT_PATH: &str = "/data/2.5/weather";
const ONECALL_EXCLUDE: &str = "minutely,hourly,alerts";

const DEFAULT_DAYS: i64 = 3;
const MAX_REQUESTED_DAYS: i64 = 16;
const MAX_FORECAST_DAYS: i64 = 8;

/// Clamp the caller's day count to 1..=16; absent or unparseable means 3.
pub fn clamp_requested_days(raw: Option<i64>) -> i64 {
    raw.map_or(DEFAULT_DAYS, |days| days.clamp(1, MAX_REQUESTED_DAYS))
}

/// Clamp a day count to what One Call returns (1..=8).
pub fn clamp_forecast_days(days: i64) -> usize {
    days.clamp(1, MAX_FORECAST_DAYS) as usize
}

/// A resolved location
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Geocoding hit with the provider's raw record
#[derive(Debug, Clone)]
pub struct GeoMatch {
    pub coords: Coordinates,
    pub raw: Value,
}

/// Thin OpenWeather HTTP client
#[derive(Clone)]
pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    units: String,
    lang: String,
}

impl OpenWeatherClient {
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        units: &str,
        lang: &str,
        timeout: Duration,
    ) -> crate::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()).map(str::to_string),
            units: units.to_string(),
            lang: lang.to_string(),
        })
    }

    fn api_key(&self) -> std::result::Result<&str, ToolError> {
        self.api_key.as_deref().ok_or_else(|| {
            ToolError::new(
                ToolErrorKind::NoApiKey,
                "OpenWeather API key not configured. Set API_OPEN_WEATHER in the environment or config file.",
            )
        })
    }

    /// Resolve a place name to coordinates
    pub async fn geocode(&self, name: &str) -> std::result::Result<GeoMatch, ToolError> {
        let query = [
            ("q", name.to_string()),
            ("limit", "1".to_string()),
            ("appid", self.api_key()?.to_string()),
        ];
        let body = self.get_json(GEOCODE_PATH, &query).await?;

        let first = body
            .as_array()
            .and_then(|matches| matches.first())
            .ok_or_else(|| {
                let message = format!("No geocoding results for '{name}'");
                ToolError::new(ToolErrorKind::NotFound, message)
            })?;

        let lat = first.get("lat").and_then(Value::as_f64);
        let lon = first.get("lon").and_then(Value::as_f64);
        match (lat, lon) {
            (Some(lat), Some(lon)) => Ok(GeoMatch {
                coords: Coordinates { lat, lon },
                raw: first.clone(),
            }),
            _ => Err(ToolError::new(
                ToolErrorKind::DecodeError,
                format!("Geocoding result for '{name}' has no coordinates"),
            )),
        }
    }

    /// One Call daily forecast, `daily` cut to at most `days` entries
    pub async fn daily_forecast(&self, coords: Coordinates, days: i64) -> ToolOutcome {
        let query = [
            ("lat", coords.lat.to_string()),
            ("lon", coords.lon.to_string()),
            ("exclude", ONECALL_EXCLUDE.to_string()),
            ("appid", self.api_key()?.to_string()),
            ("units", self.units.clone()),
            ("lang", self.lang.clone()),
        ];
        let mut data = self.get_json(ONECALL_PATH, &query).await?;

        if let Some(daily) = data.get_mut("daily").and_then(Value::as_array_mut) {
            daily.truncate(clamp_forecast_days(days));
        }
        Ok(data)
    }

    /// Current conditions
    pub async fn current_weather(&self, coords: Coordinates) -> ToolOutcome {
        let query = [
            ("lat", coords.lat.to_string()),
            ("lon", coords.lon.to_string()),
            ("appid", self.api_key()?.to_string()),
            ("units", self.units.clone()),
            ("lang", self.lang.clone()),
        ];
        self.get_json(CURRENT_PATH, &query).await
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> ToolOutcome {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", path);

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| ToolError::request_error(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ToolError::request_error(e.without_url().to_string()))?;

        if !status.is_success() {
            return Err(classify_status(path, status, body));
        }

        serde_json::from_str(&body).map_err(|e| {
            ToolError::new(ToolErrorKind::DecodeError, format!("Invalid JSON from {path}: {e}"))
        })
    }
}

fn classify_status(path: &str, status: StatusCode, body: String) -> ToolError {
    let code = status.as_u16();
    let err = match code {
        401 if path == ONECALL_PATH => ToolError::new(
            ToolErrorKind::Unauthorized,
            "Unauthorized: API key invalid or lacks One Call 3.0 access (One Call by Call subscription required).",
        ),
        401 => ToolError::new(ToolErrorKind::Unauthorized, "Unauthorized: API key invalid."),
        403 => ToolError::new(
            ToolErrorKind::Forbidden,
            "Forbidden: your API key lacks permission for this endpoint.",
        ),
        _ => ToolError::request_error(format!("{code} error for {path}")),
    };
    err.with_status(code, body)
}

/// Weather capability
pub struct WeatherTool {
    client: OpenWeatherClient,
}

impl WeatherTool {
    pub fn new(client: OpenWeatherClient) -> Self {
        Self { client }
    }

    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let client = OpenWeatherClient::new(
            &config.openweather_base_url,
            config.openweather_key(),
            &config.units,
            &config.lang,
            Duration::from_secs(config.http_timeout_secs),
        )?;
        Ok(Self::new(client))
    }

    /// Forecast with fallback to current conditions
    async fn forecast_for(&self, coords: Coordinates, days: i64) -> Value {
        match self.client.daily_forecast(coords, days).await {
            Ok(forecast) => json!({ "daily_forecast": forecast }),
            Err(daily_error) => {
                warn!("Forecast unavailable ({}), falling back to current weather", daily_error.kind);
                let current = match self.client.current_weather(coords).await {
                    Ok(current) => current,
                    Err(err) => err.to_json(),
                };
                json!({
                    "fallback_to_current": true,
                    "current_weather": current,
                    "daily_error": daily_error.to_json(),
                })
            }
        }
    }

    async fn weather_for_place(&self, place: &str, days: i64) -> ToolOutcome {
        info!("Geocoding '{}'", place);
        let found = self.client.geocode(place).await?;
        let weather_data = self.forecast_for(found.coords, days).await;
        Ok(json!({ "weather_data": weather_data, "geocoding": found.raw }))
    }
}

fn parse_coordinate(raw: &str, name: &str, range: f64) -> std::result::Result<f64, ToolError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && v.abs() <= range)
        .ok_or_else(|| {
            ToolError::invalid_input(format!(
                "'{name}' must be a number within ±{range}, got '{raw}'"
            ))
        })
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str { WEATHER_TOOL }

    fn description(&self) -> &str {
        "Get current or daily forecast weather via OpenWeather (supports city/province or lat/lon)."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "latitude": {"type": "string", "description": "Latitude of the location."},
                "longitude": {"type": "string", "description": "Longitude of the location."},
                "city": {"type": "string", "description": "City name for OpenWeather geocoding (optional)."},
                "province": {"type": "string", "description": "Province name (optional). Will be used as 'city' for geocoding."},
                "cnt": {"type": "integer", "description": "Number of days for daily forecast (1-16). Optional."}
            },
            "required": []
        })
    }

    async fn execute(&self, input: Value) -> ToolOutcome {
        // Checked up front so a missing key never reaches the network.
        self.client.api_key()?;

        let days = clamp_requested_days(input_i64(&input, "cnt"));

        if let Some(city) = input_str(&input, "city") {
            return self.weather_for_place(&city, days).await;
        }

        if let Some(province) = input_str(&input, "province") {
            return self.weather_for_place(&province, days).await;
        }

        let latitude = input_str(&input, "latitude");
        let longitude = input_str(&input, "longitude");
        if let (Some(lat), Some(lon)) = (latitude, longitude) {
            let coords = Coordinates {
                lat: parse_coordinate(&lat, "latitude", 90.0)?,
                lon: parse_coordinate(&lon, "longitude", 180.0)?,
            };
            let weather_data = self.forecast_for(coords, days).await;
            return Ok(json!({
                "weather_data": weather_data,
                "coords": {"lat": coords.lat, "lon": coords.lon},
            }));
        }

        Err(ToolError::invalid_input(
            "Please provide 'city' or 'province' or both 'latitude' and 'longitude'.",
        ))
    }
}
