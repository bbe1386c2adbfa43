use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ─── Config Types ────────────────────────────────────────────────────────────

/// Immutable configuration snapshot assembled once at construction. Hot-reload
/// is out of scope; a new `EngineConfig` requires restarting the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default)]
    pub direct_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_url_override: Option<String>,

    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default = "default_max_payload_log_length")]
    pub max_payload_log_length: usize,
    #[serde(default = "default_max_response_log_length")]
    pub max_response_log_length: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_identifier: Option<String>,

    #[serde(default = "default_slow_execution_threshold_ms")]
    pub slow_execution_threshold_ms: u64,
    #[serde(default = "default_critical_execution_threshold_ms")]
    pub critical_execution_threshold_ms: u64,

    #[serde(default = "default_true")]
    pub cleanup_enabled: bool,
    #[serde(default = "default_delivered_retention_days")]
    pub delivered_retention_days: u64,
    #[serde(default = "default_failed_retention_days")]
    pub failed_retention_days: u64,
    #[serde(default = "default_cancelled_retention_days")]
    pub cancelled_retention_days: u64,
    #[serde(default = "default_attempts_retention_days")]
    pub attempts_retention_days: u64,
    #[serde(default = "default_clean_batch_size")]
    pub clean_batch_size: u64,

    #[serde(default = "default_stuck_detector_interval_min")]
    pub stuck_detector_interval_min: u64,
    #[serde(default = "default_stuck_threshold_min")]
    pub stuck_threshold_min: u64,
    #[serde(default = "default_stuck_next_retry_offset_min")]
    pub stuck_next_retry_offset_min: u64,

    #[serde(default = "default_retry_scheduler_interval_ms")]
    pub retry_scheduler_interval_ms: u64,
    #[serde(default = "default_retry_batch_size")]
    pub retry_batch_size: u64,

    #[serde(default = "default_events_topic")]
    pub webhook_events_topic: String,
    #[serde(default = "default_retries_topic")]
    pub webhook_retries_topic: String,
    #[serde(default = "default_balancing_topic")]
    pub webhook_balancing_topic: String,

    #[serde(default = "default_true")]
    pub producer_sync_send: bool,
    #[serde(default = "default_producer_send_timeout_ms")]
    pub producer_send_timeout_ms: u64,

    #[serde(default = "default_health_min_sent")]
    pub health_min_sent: u64,
    #[serde(default = "default_health_min_success_rate")]
    pub health_min_success_rate: f64,

    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub dev_mode: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgres_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_prefix: Option<String>,

    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

fn default_connection_timeout_ms() -> u64 {
    5_000
}
fn default_read_timeout_ms() -> u64 {
    10_000
}
fn default_max_payload_log_length() -> usize {
    2_048
}
fn default_max_response_log_length() -> usize {
    2_048
}
fn default_slow_execution_threshold_ms() -> u64 {
    2_000
}
fn default_critical_execution_threshold_ms() -> u64 {
    8_000
}
fn default_true() -> bool {
    true
}
fn default_delivered_retention_days() -> u64 {
    7
}
fn default_failed_retention_days() -> u64 {
    30
}
fn default_cancelled_retention_days() -> u64 {
    7
}
fn default_attempts_retention_days() -> u64 {
    30
}
fn default_clean_batch_size() -> u64 {
    500
}
fn default_stuck_detector_interval_min() -> u64 {
    15
}
fn default_stuck_threshold_min() -> u64 {
    30
}
fn default_stuck_next_retry_offset_min() -> u64 {
    5
}
fn default_retry_scheduler_interval_ms() -> u64 {
    60_000
}
fn default_retry_batch_size() -> u64 {
    50
}
fn default_events_topic() -> String {
    "webhook-events".to_string()
}
fn default_retries_topic() -> String {
    "webhook-retries".to_string()
}
fn default_balancing_topic() -> String {
    "webhook-balancing".to_string()
}
fn default_producer_send_timeout_ms() -> u64 {
    5_000
}
fn default_health_min_sent() -> u64 {
    5
}
fn default_health_min_success_rate() -> f64 {
    80.0
}
fn default_max_in_flight() -> usize {
    64
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_http_port() -> u16 {
    8080
}

impl Default for EngineConfig {
    fn default() -> Self {
        // Deserialize an empty object so every `#[serde(default = "...")]`
        // fires; keeps the defaults in exactly one place.
        serde_json::from_value(serde_json::json!({})).expect("EngineConfig defaults must parse")
    }
}

// ─── Error ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ─── Environment Variable Interpolation ──────────────────────────────────────

/// Replace `${VAR_NAME}` and `${VAR_NAME:-default}` patterns in a string with
/// environment variable values. If the environment variable is not set and no
/// default is given, the original `${VAR_NAME}` is kept as-is.
pub fn interpolate_env_vars(value: &str) -> String {
    let re = Regex::new(r"\$\{([^}:]+)(:-([^}]*))?\}").expect("invalid regex");
    re.replace_all(value, |caps: &regex::Captures| {
        let var_name = &caps[1];
        match std::env::var(var_name) {
            Ok(v) => v,
            Err(_) => match caps.get(3) {
                Some(default) => default.as_str().to_string(),
                None => caps[0].to_string(),
            },
        }
    })
    .into_owned()
}

/// Recursively interpolate environment variables in a serde_json::Value tree.
/// Strings get `${VAR}` replacement; arrays and objects are traversed recursively;
/// other types (numbers, booleans, null) pass through unchanged.
fn interpolate_value(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => serde_json::Value::String(interpolate_env_vars(&s)),
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(interpolate_value).collect())
        }
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter().map(|(k, v)| (k, interpolate_value(v))).collect(),
        ),
        other => other,
    }
}

// ─── Config Format ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

// ─── Parsing ─────────────────────────────────────────────────────────────────

/// Parse a config string in the given format, with environment variable
/// interpolation, and validate the result.
///
/// - **YAML**: env vars are interpolated in the raw string *before* YAML parsing.
/// - **JSON**: the string is parsed first, then env vars are interpolated in values.
///
/// After interpolation, if `httpPort` ended up as a string (from env var
/// substitution), it is coerced to a number; if coercion fails, the field
/// falls back to the default.
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<EngineConfig, ConfigError> {
    let raw: serde_json::Value = match format {
        ConfigFormat::Json => serde_json::from_str(content)?,
        ConfigFormat::Yaml => {
            let interpolated = interpolate_env_vars(content);
            let parsed: serde_json::Value = serde_yaml::from_str(&interpolated)?;
            if parsed.is_null() {
                return Ok(EngineConfig::default());
            }
            parsed
        }
    };

    let interpolated = interpolate_value(raw);
    let coerced = coerce_port(interpolated);

    let config: EngineConfig = serde_json::from_value(coerced).map_err(ConfigError::JsonParse)?;
    validate(&config)?;
    Ok(config)
}

/// If `httpPort` is a JSON string, attempt to parse it as an integer.
/// If parsing fails, remove the field entirely so the default applies.
fn coerce_port(mut value: serde_json::Value) -> serde_json::Value {
    if let serde_json::Value::Object(ref mut map) = value {
        if let Some(port_val) = map.get("httpPort") {
            if let serde_json::Value::String(s) = port_val {
                match s.parse::<u16>() {
                    Ok(n) => {
                        map.insert("httpPort".to_string(), serde_json::Value::Number(n.into()));
                    }
                    Err(_) => {
                        map.remove("httpPort");
                    }
                }
            }
        }
    }
    value
}

fn validate(config: &EngineConfig) -> Result<(), ConfigError> {
    if config.health_min_success_rate < 0.0 || config.health_min_success_rate > 100.0 {
        return Err(ConfigError::Invalid(
            "healthMinSuccessRate must be between 0 and 100".to_string(),
        ));
    }
    if config.max_in_flight == 0 {
        return Err(ConfigError::Invalid("maxInFlight must be > 0".to_string()));
    }
    Ok(())
}

// ─── File Loading ────────────────────────────────────────────────────────────

/// Default config file candidate names, checked in order.
const DEFAULT_CANDIDATES: &[&str] = &[
    "webhook.config.yaml",
    "webhook.config.yml",
    "webhook.config.json",
];

/// Load a config file from disk. If `config_path` is provided, only that path
/// is tried. Otherwise the `WEBHOOK_CONFIG` env var is checked, then a list of
/// default candidates relative to the current working directory. If nothing
/// matches, the built-in defaults are returned.
pub fn load_config_file(config_path: Option<&str>) -> Result<EngineConfig, ConfigError> {
    let base_dir = std::env::current_dir()?;
    let resolved = config_path
        .map(|s| s.to_string())
        .or_else(|| std::env::var("WEBHOOK_CONFIG").ok());
    load_config_file_from_dir(resolved.as_deref(), &base_dir)
}

fn load_config_file_from_dir(
    config_path: Option<&str>,
    base_dir: &Path,
) -> Result<EngineConfig, ConfigError> {
    let candidates: Vec<&str> = match config_path {
        Some(path) => vec![path],
        None => DEFAULT_CANDIDATES.to_vec(),
    };

    for candidate in candidates {
        let full_path = if Path::new(candidate).is_absolute() {
            std::path::PathBuf::from(candidate)
        } else {
            base_dir.join(candidate)
        };

        if !full_path.exists() {
            continue;
        }

        let ext = full_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        let content = std::fs::read_to_string(&full_path)?;
        let format = if ext == "json" { ConfigFormat::Json } else { ConfigFormat::Yaml };

        return parse_config(&content, format);
    }

    Ok(EngineConfig::default())
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn interpolate_basic_substitution() {
        env::set_var("WEBHOOK_TEST_HOST", "localhost");
        let result = interpolate_env_vars("host: ${WEBHOOK_TEST_HOST}");
        assert_eq!(result, "host: localhost");
        env::remove_var("WEBHOOK_TEST_HOST");
    }

    #[test]
    fn interpolate_missing_var_stays_as_is() {
        let result = interpolate_env_vars("val: ${WEBHOOK_NONEXISTENT_VAR_XYZ}");
        assert_eq!(result, "val: ${WEBHOOK_NONEXISTENT_VAR_XYZ}");
    }

    #[test]
    fn interpolate_default_fallback() {
        let result = interpolate_env_vars("val: ${WEBHOOK_NONEXISTENT_VAR_XYZ:-fallback}");
        assert_eq!(result, "val: fallback");
    }

    #[test]
    fn interpolate_default_not_used_when_present() {
        env::set_var("WEBHOOK_TEST_PRESENT", "found");
        let result = interpolate_env_vars("val: ${WEBHOOK_TEST_PRESENT:-fallback}");
        assert_eq!(result, "val: found");
        env::remove_var("WEBHOOK_TEST_PRESENT");
    }

    #[test]
    fn parse_json_basic_config() {
        let json = r#"{"directMode": true, "httpPort": 3000}"#;
        let config = parse_config(json, ConfigFormat::Json).unwrap();
        assert!(config.direct_mode);
        assert_eq!(config.http_port, 3000);
    }

    #[test]
    fn parse_json_applies_defaults() {
        let config = parse_config("{}", ConfigFormat::Json).unwrap();
        assert_eq!(config.retry_batch_size, 50);
        assert_eq!(config.health_min_sent, 5);
        assert!((config.health_min_success_rate - 80.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_json_rejects_invalid_success_rate() {
        let json = r#"{"healthMinSuccessRate": 150.0}"#;
        let err = parse_config(json, ConfigFormat::Json).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn parse_json_rejects_zero_max_in_flight() {
        let json = r#"{"maxInFlight": 0}"#;
        let err = parse_config(json, ConfigFormat::Json).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn port_string_coerced_to_number() {
        let json = r#"{"httpPort": "9090"}"#;
        let config = parse_config(json, ConfigFormat::Json).unwrap();
        assert_eq!(config.http_port, 9090);
    }

    #[test]
    fn port_unparseable_string_falls_back_to_default() {
        let json = r#"{"httpPort": "not-a-number"}"#;
        let config = parse_config(json, ConfigFormat::Json).unwrap();
        assert_eq!(config.http_port, default_http_port());
    }

    #[test]
    fn load_config_file_missing_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_file_from_dir(None, dir.path()).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn load_config_file_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.json");
        std::fs::write(&path, r#"{"directMode": true}"#).unwrap();
        let config =
            load_config_file_from_dir(Some(path.to_str().unwrap()), dir.path()).unwrap();
        assert!(config.direct_mode);
    }

    #[test]
    fn load_config_file_yaml_candidate() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("webhook.config.yaml"), "directMode: true\n").unwrap();
        let config = load_config_file_from_dir(None, dir.path()).unwrap();
        assert!(config.direct_mode);
    }
}
