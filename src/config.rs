use crate::error::{AppError, Result};
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::time::Duration;

/// Largest coordinate precision accepted for weather location keys
pub const MAX_COORDINATE_PRECISION: u32 = 8;

/// One week
pub const MAX_FOCUS_REFRESH_MINUTES: u64 = 7 * 24 * 60;

/// Thirty days
pub const MAX_PERIODIC_REFRESH_HOURS: u64 = 30 * 24;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(
        default = "default_timeout_seconds",
        deserialize_with = "deserialize_u64"
    )]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    30
}

/// Custom deserializer that handles a count as both number and string
///
/// Accepts:
/// - `timeout_seconds: 30` (number)
/// - `timeout_seconds: "30"` (string that parses to number)
/// - `timeout_seconds: ${API_TIMEOUT}` (env var substituted to either)
fn deserialize_u64<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum CountValue {
        Number(u64),
        String(String),
    }

    match CountValue::deserialize(deserializer)? {
        CountValue::Number(n) => Ok(n),
        CountValue::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| serde::de::Error::custom(format!("Invalid number: '{}'", s))),
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WeatherConfig {
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default = "default_focus_refresh_minutes")]
    pub focus_refresh_minutes: u64,
    #[serde(default = "default_periodic_refresh_hours")]
    pub periodic_refresh_hours: u64,
    #[serde(default = "default_coordinate_precision")]
    pub coordinate_precision: u32,
}

fn default_request_delay_ms() -> u64 {
    500 // 500ms between weather lookups
}

fn default_focus_refresh_minutes() -> u64 {
    30
}

fn default_periodic_refresh_hours() -> u64 {
    6
}

fn default_coordinate_precision() -> u32 {
    4 // ~11m
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: default_request_delay_ms(),
            focus_refresh_minutes: default_focus_refresh_minutes(),
            periodic_refresh_hours: default_periodic_refresh_hours(),
            coordinate_precision: default_coordinate_precision(),
        }
    }
}

impl WeatherConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// Clamped to [`MAX_FOCUS_REFRESH_MINUTES`]
    pub fn focus_refresh_interval(&self) -> chrono::Duration {
        let minutes = self.focus_refresh_minutes.min(MAX_FOCUS_REFRESH_MINUTES);
        chrono::Duration::minutes(minutes as i64)
    }

    /// Clamped to [`MAX_PERIODIC_REFRESH_HOURS`]
    pub fn periodic_refresh_interval(&self) -> Duration {
        let hours = self.periodic_refresh_hours.min(MAX_PERIODIC_REFRESH_HOURS);
        Duration::from_secs(hours * 60 * 60)
    }
}

/// Retry behaviour for calls to the remote API
///
/// Delays grow exponentially from `initial_delay_ms`, capped at `max_delay_ms`.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    8000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry.saturating_sub(1));
        let delay_ms = self.initial_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    #[serde(default = "default_crop_type")]
    pub default_crop_type: String,
}

fn default_crop_type() -> String {
    "tomato".to_string()
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            default_crop_type: default_crop_type(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AppError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text, substituting `${VAR}` references
    pub fn from_yaml(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content)?;

        let config: Config = serde_yaml::from_str(&expanded)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    ///
    /// Checks for:
    /// - Unexpanded environment variables
    /// - Valid URL formats (HTTPS unless loopback)
    /// - Positive time intervals
    /// - Coordinate precision range
    /// - Known default crop type
    fn validate(&self) -> Result<()> {
        if self.api.base_url.contains("${") {
            return Err(AppError::Config(
                "AGRO_API_URL environment variable is not set. \
                 Please set it or create a .env file. \
                 See .env.example for required variables."
                    .to_string(),
            ));
        }

        let parsed = url::Url::parse(&self.api.base_url).map_err(|e| {
            AppError::Config(format!(
                "Invalid api base_url '{}': {}",
                self.api.base_url, e
            ))
        })?;

        let is_loopback = matches!(
            parsed.host_str(),
            Some("localhost") | Some("127.0.0.1") | Some("[::1]")
        );
        if parsed.scheme() != "https" && !(parsed.scheme() == "http" && is_loopback) {
            return Err(AppError::Config(format!(
                "Api base_url must use HTTPS, got: {}",
                parsed.scheme()
            )));
        }

        if let Some(token) = &self.api.token {
            if token.trim().is_empty() {
                return Err(AppError::Config(
                    "Api token cannot be empty when set".to_string(),
                ));
            }
        }

        if self.api.timeout_seconds == 0 {
            return Err(AppError::Config(
                "Api timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.weather.focus_refresh_minutes == 0 {
            return Err(AppError::Config(
                "Weather focus_refresh_minutes must be greater than 0".to_string(),
            ));
        }

        if self.weather.periodic_refresh_hours == 0 {
            return Err(AppError::Config(
                "Weather periodic_refresh_hours must be greater than 0".to_string(),
            ));
        }

        if self.weather.focus_refresh_minutes > MAX_FOCUS_REFRESH_MINUTES {
            return Err(AppError::Config(format!(
                "Weather focus_refresh_minutes {} exceeds maximum of {}",
                self.weather.focus_refresh_minutes, MAX_FOCUS_REFRESH_MINUTES
            )));
        }

        if self.weather.periodic_refresh_hours > MAX_PERIODIC_REFRESH_HOURS {
            return Err(AppError::Config(format!(
                "Weather periodic_refresh_hours {} exceeds maximum of {}",
                self.weather.periodic_refresh_hours, MAX_PERIODIC_REFRESH_HOURS
            )));
        }

        if self.weather.coordinate_precision > MAX_COORDINATE_PRECISION {
            return Err(AppError::Config(format!(
                "Weather coordinate_precision {} is out of range (0-{})",
                self.weather.coordinate_precision, MAX_COORDINATE_PRECISION
            )));
        }

        if self.weather.request_delay_ms == 0 {
            tracing::warn!(
                "Weather request_delay_ms is 0, lookups will not be paced against the provider"
            );
        }

        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return Err(AppError::Config(format!(
                "Retry initial_delay_ms {} exceeds max_delay_ms {}",
                self.retry.initial_delay_ms, self.retry.max_delay_ms
            )));
        }

        if crate::schedule::ScheduleGenerator::from_config(&self.schedule).is_err() {
            return Err(AppError::Config(format!(
                "Schedule default_crop_type '{}' has no activity template",
                self.schedule.default_crop_type
            )));
        }

        Ok(())
    }
}

fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = content.to_string();
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| AppError::Config(format!("Invalid substitution pattern: {}", e)))?;

    let mut missing_vars = Vec::new();

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(value) => {
                result = result.replace(&cap[0], &value);
            }
            Err(_) => {
                missing_vars.push(var_name.to_string());
            }
        }
    }

    if !missing_vars.is_empty() {
        return Err(AppError::Config(format!(
            "Missing required environment variable{}: {}\n\n\
             To fix this:\n\
             1. Create a .env file in the project root (copy .env.example)\n\
             2. Set the missing variable{}: export {}=<value>\n\
             3. Or set {} in your environment before running",
            if missing_vars.len() > 1 { "s" } else { "" },
            missing_vars.join(", "),
            if missing_vars.len() > 1 { "s" } else { "" },
            missing_vars[0],
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}
