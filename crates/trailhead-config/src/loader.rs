//! Layered configuration loading.
//!
//! Layers, later ones winning: preset or defaults, configuration file,
//! `.env`, process environment.

use std::env;
use std::fs;
use std::path::Path;

use serde_json::Value;
use trailhead_core::DeploymentMode;

use crate::{ConfigError, LogFormat, TrailheadConfig};

/// Prefix of the environment variables read by [`ConfigLoader::with_env_prefix`].
pub const DEFAULT_ENV_PREFIX: &str = "TRAILHEAD";

/// Configuration loader.
///
/// Files are merged section by section over the current values, so a file
/// that only sets `[server] http_addr` keeps everything else from the
/// preset it was layered on.
///
/// # Example
///
/// ```no_run
/// use trailhead_config::ConfigLoader;
///
/// # fn main() -> Result<(), trailhead_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_defaults()
///     .with_file("trailhead.toml")?
///     .with_dotenv()?
///     .with_env_prefix("TRAILHEAD")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: TrailheadConfig,
    env_prefix: Option<String>,
    file_loaded: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader holding the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: TrailheadConfig::default(),
            env_prefix: None,
            file_loaded: false,
        }
    }

    /// Resets to the default configuration.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = TrailheadConfig::default();
        self
    }

    /// Starts from [`TrailheadConfig::development`].
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = TrailheadConfig::development();
        self
    }

    /// Starts from [`TrailheadConfig::production`].
    ///
    /// ```
    /// use trailhead_config::{ConfigLoader, LogFormat};
    ///
    /// let config = ConfigLoader::new().with_production().load().unwrap();
    /// assert_eq!(config.logging.format, LogFormat::Json);
    /// ```
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = TrailheadConfig::production();
        self
    }

    /// Starts from the preset matching a deployment mode.
    #[must_use]
    pub fn with_mode(self, mode: DeploymentMode) -> Self {
        if mode.is_production() {
            self.with_production()
        } else {
            let mut loader = self.with_development();
            loader.config.environment = mode;
            loader
        }
    }

    /// Merges a TOML (`.toml`) or JSON (`.json`) file.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;

        self.merge_str(&content, &format)?;
        self.file_loaded = true;
        Ok(self)
    }

    /// Merges a file if it exists.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Merges configuration text in the given format (`"toml"` or `"json"`).
    ///
    /// ```
    /// use trailhead_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("[server]\nhttp_addr = \"127.0.0.1:3000\"", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    /// assert_eq!(config.server.http_addr, "127.0.0.1:3000");
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.merge_str(content, &format.to_lowercase())?;
        Ok(self)
    }

    /// Loads `.env` from the working directory into the process
    /// environment. A missing file is not an error.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(e.into()),
        }
    }

    /// Loads a specific `.env`-style file into the process environment.
    pub fn with_dotenv_path<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        dotenvy::from_path(path.as_ref())?;
        Ok(self)
    }

    /// Reads `PREFIX__SECTION__KEY` overrides from the process environment
    /// when [`load`](Self::load) runs.
    ///
    /// - `TRAILHEAD__ENVIRONMENT=production`
    /// - `TRAILHEAD__SERVER__HTTP_ADDR=0.0.0.0:8000`
    /// - `TRAILHEAD__SECURITY__CSRF_HEADER_NAMES=x-csrf-token,x-xsrf-token`
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Applies overrides from explicit `(key, value)` pairs instead of the
    /// process environment. Keys without the prefix are skipped.
    pub fn with_env_vars<I, K, V>(mut self, prefix: &str, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let prefix = prefix.to_uppercase();
        let marker = format!("{prefix}__");
        for (key, value) in vars {
            if key.as_ref().starts_with(&marker) {
                self.apply_env_var(key.as_ref(), value.as_ref(), &prefix)?;
            }
        }
        Ok(self)
    }

    /// Whether a configuration file has been merged.
    #[must_use]
    pub fn file_loaded(&self) -> bool {
        self.file_loaded
    }

    /// Applies environment overrides and validates.
    pub fn load(mut self) -> Result<TrailheadConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self = self.with_env_vars(&prefix, env::vars())?;
        }

        self.config.validate()?;
        Ok(self.config)
    }

    /// Returns the configuration without validating it.
    #[must_use]
    pub fn load_unvalidated(self) -> TrailheadConfig {
        self.config
    }

    fn merge_str(&mut self, content: &str, format: &str) -> Result<(), ConfigError> {
        let overlay: Value = match format {
            "toml" => {
                let table: toml::Table = toml::from_str(content)?;
                serde_json::to_value(table)?
            }
            "json" => serde_json::from_str(content)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };

        let mut base = serde_json::to_value(&self.config)?;
        merge_values(&mut base, overlay);
        self.config = serde_json::from_value(base)?;
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let key_without_prefix = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_var(key, "invalid key format"))?;

        let parts: Vec<&str> = key_without_prefix.split("__").collect();

        match parts.as_slice() {
            ["ENVIRONMENT"] => {
                self.config.environment = value
                    .parse()
                    .map_err(|e| ConfigError::env_var(key, format!("{e}")))?;
            }

            ["SERVER", "HTTP_ADDR"] => {
                self.config.server.http_addr = value.to_string();
            }
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
                self.config.server.shutdown_timeout_secs = parse_number(key, value)?;
            }
            ["SERVER", "REQUEST_TIMEOUT_MS"] => {
                self.config.server.request_timeout_ms = parse_number(key, value)?;
            }
            ["SERVER", "MAX_BODY_BYTES"] => {
                self.config.server.max_body_bytes = parse_number(key, value)?;
            }

            ["SECURITY", "CSRF_COOKIE_NAME"] => {
                self.config.security.csrf_cookie_name = value.to_string();
            }
            ["SECURITY", "CSRF_HEADER_NAMES"] => {
                self.config.security.csrf_header_names = value
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_lowercase)
                    .collect();
            }
            ["SECURITY", "COOKIE_PATH"] => {
                self.config.security.cookie_path = value.to_string();
            }

            ["LOGGING", "ENABLED"] => {
                self.config.logging.enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_var(key, "expected boolean"))?;
            }
            ["LOGGING", "LEVEL"] => {
                self.config.logging.level = value.to_string();
            }
            ["LOGGING", "FORMAT"] => {
                self.config.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_var(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }

            ["METRICS", "ENABLED"] => {
                self.config.metrics.enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_var(key, "expected boolean"))?;
            }

            // Unrelated variables sharing the prefix.
            _ => {}
        }

        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::env_var(key, "expected integer"))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Recursively merges `overlay` into `base`; objects merge, everything else
/// replaces.
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_loader_defaults() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config.server.http_addr, "0.0.0.0:5000");
        assert_eq!(config.environment, DeploymentMode::Development);
    }

    #[test]
    fn test_with_mode_test_keeps_mode() {
        let config = ConfigLoader::new().with_mode(DeploymentMode::Test).load().unwrap();
        assert_eq!(config.environment, DeploymentMode::Test);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_file_merges_over_preset() {
        let config = ConfigLoader::new()
            .with_production()
            .with_string("[server]\nhttp_addr = \"127.0.0.1:8000\"", "toml")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.server.http_addr, "127.0.0.1:8000");
        assert!(config.environment.is_production());
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_json_string() {
        let json = r#"{"security": {"csrf_cookie_name": "_trail"}}"#;
        let config = ConfigLoader::new()
            .with_string(json, "json")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.security.csrf_cookie_name, "_trail");
        assert_eq!(config.security.csrf_header_names.len(), 4);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = ConfigLoader::new().with_string("[server]\nport = 5000", "toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_section_rejected() {
        let result = ConfigLoader::new().with_string("[database]\nurl = \"x\"", "toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_unsupported_format() {
        let err = ConfigLoader::new().with_string("a: b", "yaml").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_with_file_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "environment = \"production\"\n[metrics]\nenabled = false").unwrap();

        let loader = ConfigLoader::new().with_file(file.path()).unwrap();
        assert!(loader.file_loaded());

        let config = loader.load().unwrap();
        assert!(config.environment.is_production());
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_with_file_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(file, r#"{{"server": {{"max_body_bytes": 2048}}}}"#).unwrap();

        let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();
        assert_eq!(config.server.max_body_bytes, 2048);
    }

    #[test]
    fn test_with_file_not_found() {
        let err = ConfigLoader::new().with_file("/nonexistent/trailhead.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_optional_file_missing() {
        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/trailhead.toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.server.http_addr, "0.0.0.0:5000");
    }

    #[test]
    fn test_env_overrides() {
        let vars = [
            ("TRAILHEAD__ENVIRONMENT", "prod"),
            ("TRAILHEAD__SERVER__MAX_BODY_BYTES", "4096"),
            ("TRAILHEAD__SECURITY__CSRF_HEADER_NAMES", "X-CSRF-Token, x-xsrf-token"),
            ("TRAILHEAD__LOGGING__FORMAT", "json"),
            ("OTHER__SERVER__HTTP_ADDR", "garbage"),
        ];

        let config = ConfigLoader::new()
            .with_env_vars(DEFAULT_ENV_PREFIX, vars)
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.environment, DeploymentMode::Production);
        assert_eq!(config.server.max_body_bytes, 4096);
        assert_eq!(config.security.csrf_header_names, vec!["x-csrf-token", "x-xsrf-token"]);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.server.http_addr, "0.0.0.0:5000");
    }

    #[test]
    fn test_env_invalid_number() {
        let result = ConfigLoader::new()
            .with_env_vars("TRAILHEAD", [("TRAILHEAD__SERVER__REQUEST_TIMEOUT_MS", "soon")]);
        assert!(matches!(result, Err(ConfigError::EnvVar { .. })));
    }

    #[test]
    fn test_env_invalid_environment() {
        let result = ConfigLoader::new()
            .with_env_vars("TRAILHEAD", [("TRAILHEAD__ENVIRONMENT", "staging")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_validates() {
        let result = ConfigLoader::new()
            .with_env_vars("TRAILHEAD", [("TRAILHEAD__SERVER__HTTP_ADDR", "nowhere")])
            .unwrap()
            .load();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("Yes"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_merge_values_nested() {
        let mut base = serde_json::json!({"a": {"b": 1, "c": 2}, "d": [1]});
        merge_values(&mut base, serde_json::json!({"a": {"c": 3}, "d": [2, 3]}));
        assert_eq!(base, serde_json::json!({"a": {"b": 1, "c": 3}, "d": [2, 3]}));
    }
}
