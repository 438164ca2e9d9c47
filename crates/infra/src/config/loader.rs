//! Configuration loader
//!
//! Loads [`ClientSettings`] from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `RESYNC_BASE_URL` is unset or a value is invalid, falls back to a
//!    file
//! 3. Probes the working directory for config files
//! 4. Supports JSON and TOML formats
//!
//! Whatever the source, the result is normalized (zero means default) and
//! validated before it is returned.
//!
//! ## Environment Variables
//! - `RESYNC_BASE_URL`: Service base URL (required)
//! - `RESYNC_CLIENT_NAME`: Name used in logs and ticker names
//! - `RESYNC_REQUEST_TIMEOUT_MS`: Per-request timeout in milliseconds
//! - `RESYNC_RETRY_INTERVAL_SECS`: Retry pump interval in seconds
//! - `RESYNC_MAX_QUEUE_SIZE`: Pending queue capacity
//! - `RESYNC_MAX_ATTEMPTS`: Default per-operation attempt cap
//! - `RESYNC_RETRY_STRATEGY`: `exponential` or `constant`
//! - `RESYNC_LOG_LEVEL`: Default tracing filter directive
//! - `RESYNC_LOG_JSON`: Emit JSON logs (true/false)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./resync.toml`
//! 2. `./resync.json`
//! 3. `./config/resync.toml`
//! 4. `./config/resync.json`

use std::path::{Path, PathBuf};
use std::str::FromStr;

use resync_domain::{ClientSettings, RetryStrategyKind};

use crate::errors::{ConfigError, ConfigResult};

const CONFIG_CANDIDATES: [&str; 4] =
    ["resync.toml", "resync.json", "config/resync.toml", "config/resync.json"];

/// Load settings with automatic fallback strategy
///
/// First attempts to load from environment variables. If that fails,
/// falls back to loading from a config file.
///
/// # Errors
/// Returns the file loading error if the environment is incomplete and no
/// usable file is found.
pub fn load() -> ConfigResult<ClientSettings> {
    match load_from_env() {
        Ok(settings) => {
            tracing::info!(client = %settings.client_name, "Configuration loaded from environment variables");
            Ok(settings)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load settings from environment variables
///
/// Only `RESYNC_BASE_URL` is required; every other variable falls back to
/// its default when unset.
///
/// # Errors
/// Returns [`ConfigError::MissingVar`] if the base URL is unset and
/// [`ConfigError::InvalidValue`] if a variable does not parse.
pub fn load_from_env() -> ConfigResult<ClientSettings> {
    let mut settings = ClientSettings::for_base_url(env_var("RESYNC_BASE_URL")?);

    if let Some(name) = env_opt("RESYNC_CLIENT_NAME") {
        settings.client_name = name;
    }
    if let Some(timeout) = env_parse("RESYNC_REQUEST_TIMEOUT_MS")? {
        settings.request_timeout_ms = timeout;
    }
    if let Some(interval) = env_parse("RESYNC_RETRY_INTERVAL_SECS")? {
        settings.retry_interval_secs = interval;
    }
    if let Some(size) = env_parse("RESYNC_MAX_QUEUE_SIZE")? {
        settings.max_queue_size = size;
    }
    if let Some(attempts) = env_parse("RESYNC_MAX_ATTEMPTS")? {
        settings.max_attempts = attempts;
    }
    if let Some(strategy) = env_parse::<RetryStrategyKind>("RESYNC_RETRY_STRATEGY")? {
        settings.retry_strategy = strategy;
    }
    if let Some(level) = env_opt("RESYNC_LOG_LEVEL") {
        settings.logging.level = level;
    }
    settings.logging.json = env_bool("RESYNC_LOG_JSON", settings.logging.json);

    finish(settings)
}

/// Load settings from a file
///
/// If `path` is `None`, probes the standard locations.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns a [`ConfigError`] if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - The settings fail validation
pub fn load_from_file(path: Option<PathBuf>) -> ConfigResult<ClientSettings> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::FileNotFound(p.display().to_string()));
            }
            p
        }
        None => probe_config_paths().ok_or(ConfigError::NoConfigFile)?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)?;

    finish(parse_config(&contents, &config_path)?)
}

/// Parse settings from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> ConfigResult<ClientSettings> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => Ok(toml::from_str(contents)?),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ConfigError::Parse { format: "JSON", reason: e.to_string() }),
        _ => Err(ConfigError::UnsupportedFormat(extension.to_string())),
    }
}

fn finish(settings: ClientSettings) -> ConfigResult<ClientSettings> {
    let settings = settings.normalized();
    settings.validate()?;
    Ok(settings)
}

/// Probe the standard paths for a configuration file
///
/// # Returns
/// The first config file found in the working directory, or `None`.
pub fn probe_config_paths() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    probe_in(&cwd)
}

fn probe_in(dir: &Path) -> Option<PathBuf> {
    CONFIG_CANDIDATES.iter().map(|candidate| dir.join(candidate)).find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> ConfigResult<String> {
    env_opt(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()))
}

/// Optional variable; blank values count as unset.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(key: &str) -> ConfigResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| raw.trim().parse::<T>().map_err(|e| ConfigError::invalid_value(key, e)))
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::{NamedTempFile, TempDir};

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const ALL_VARS: [&str; 9] = [
        "RESYNC_CLIENT_NAME",
        "RESYNC_BASE_URL",
        "RESYNC_REQUEST_TIMEOUT_MS",
        "RESYNC_RETRY_INTERVAL_SECS",
        "RESYNC_MAX_QUEUE_SIZE",
        "RESYNC_MAX_ATTEMPTS",
        "RESYNC_RETRY_STRATEGY",
        "RESYNC_LOG_LEVEL",
        "RESYNC_LOG_JSON",
    ];

    fn clear_env() {
        for key in ALL_VARS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        std::env::set_var("TEST_RESYNC_BOOL_ON", "On");
        std::env::set_var("TEST_RESYNC_BOOL_OFF", "0");
        std::env::remove_var("TEST_RESYNC_BOOL_MISSING");

        assert!(env_bool("TEST_RESYNC_BOOL_ON", false));
        assert!(!env_bool("TEST_RESYNC_BOOL_OFF", true));
        assert!(env_bool("TEST_RESYNC_BOOL_MISSING", true));

        std::env::remove_var("TEST_RESYNC_BOOL_ON");
        std::env::remove_var("TEST_RESYNC_BOOL_OFF");
    }

    /// Validates `load_from_env` behavior for the all variables set scenario.
    ///
    /// Assertions:
    /// - Ensures every variable lands in its settings field.
    /// - Ensures unset tuning values keep their defaults.
    #[test]
    fn test_load_from_env_all_vars_set() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("RESYNC_BASE_URL", "https://api.example.com");
        std::env::set_var("RESYNC_CLIENT_NAME", "gameplay");
        std::env::set_var("RESYNC_REQUEST_TIMEOUT_MS", "1500");
        std::env::set_var("RESYNC_RETRY_INTERVAL_SECS", "2");
        std::env::set_var("RESYNC_MAX_QUEUE_SIZE", "64");
        std::env::set_var("RESYNC_MAX_ATTEMPTS", "5");
        std::env::set_var("RESYNC_RETRY_STRATEGY", "Constant");
        std::env::set_var("RESYNC_LOG_LEVEL", "debug");
        std::env::set_var("RESYNC_LOG_JSON", "yes");

        let result = load_from_env();
        clear_env();
        let settings = result.expect("settings from env");

        assert_eq!(settings.base_url, "https://api.example.com");
        assert_eq!(settings.client_name, "gameplay");
        assert_eq!(settings.request_timeout_ms, 1500);
        assert_eq!(settings.retry_interval_secs, 2);
        assert_eq!(settings.max_queue_size, 64);
        assert_eq!(settings.max_attempts, 5);
        assert_eq!(settings.retry_strategy, RetryStrategyKind::Constant);
        assert_eq!(settings.logging.level, "debug");
        assert!(settings.logging.json);
        assert_eq!(settings.backoff_base_ms, ClientSettings::default().backoff_base_ms);
    }

    #[test]
    fn test_load_from_env_missing_base_url() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref key) if key == "RESYNC_BASE_URL"));
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("RESYNC_BASE_URL", "https://api.example.com");
        std::env::set_var("RESYNC_MAX_QUEUE_SIZE", "lots");

        let result = load_from_env();
        clear_env();

        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "RESYNC_MAX_QUEUE_SIZE"
        ));
    }

    #[test]
    fn test_load_from_env_rejects_invalid_base_url() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("RESYNC_BASE_URL", "ftp://files.example.com");

        let result = load_from_env();
        clear_env();

        assert!(matches!(result, Err(ConfigError::Invalid(ref msg)) if msg.contains("scheme")));
    }

    #[test]
    fn test_load_from_file_toml_normalizes_zeroes() {
        let toml_content = r#"
base_url = "http://localhost:8080"
max_queue_size = 0
retry_strategy = "constant"
"#;
        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        temp_file.write_all(toml_content.as_bytes()).expect("Failed to write to temp file");
        let path = temp_file.path().with_extension("toml");
        std::fs::copy(temp_file.path(), &path).expect("Failed to copy file");

        let settings = load_from_file(Some(path.clone())).expect("settings from toml");
        std::fs::remove_file(path).ok();

        assert_eq!(settings.max_queue_size, ClientSettings::default().max_queue_size);
        assert_eq!(settings.retry_strategy, RetryStrategyKind::Constant);
    }

    #[test]
    fn test_parse_config_unsupported_extension() {
        let err = parse_config("", Path::new("resync.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(ref ext) if ext == "yaml"));
    }

    #[test]
    fn test_parse_config_invalid_json() {
        let err = parse_config("{ not json", Path::new("resync.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { format: "JSON", .. }));
    }

    #[test]
    fn test_load_from_file_missing_path() {
        let err = load_from_file(Some(PathBuf::from("/nonexistent/resync.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_probe_prefers_toml_then_config_dir() {
        let dir = TempDir::new().unwrap();
        assert_eq!(probe_in(dir.path()), None);

        std::fs::create_dir(dir.path().join("config")).unwrap();
        std::fs::write(dir.path().join("config/resync.json"), "{}").unwrap();
        assert_eq!(probe_in(dir.path()), Some(dir.path().join("config/resync.json")));

        std::fs::write(dir.path().join("resync.json"), "{}").unwrap();
        std::fs::write(dir.path().join("resync.toml"), "").unwrap();
        assert_eq!(probe_in(dir.path()), Some(dir.path().join("resync.toml")));
    }
}
