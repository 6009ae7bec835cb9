//! Configuration file loader for gem-await
//!
//! This module provides configuration loading, validation, and merging capabilities.

use super::config::*;
use crate::awaiters::AwaiterKind;
use crate::core::error::AwaitError;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Url;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

/// Configuration file name
const CONFIG_FILENAME: &str = ".gem-await.yaml";

/// Environment variable overriding `source`
pub const SOURCE_ENV: &str = "GEM_AWAIT_SOURCE";

/// Environment variable overriding `timeout`
pub const TIMEOUT_ENV: &str = "GEM_AWAIT_TIMEOUT";

lazy_static! {
    /// Environment variable reference (${VAR_NAME})
    static ref ENV_VAR_PATTERN: Regex =
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env var pattern is valid");
}

/// Configuration load options
#[derive(Debug, Clone, Default)]
pub struct ConfigLoadOptions {
    /// Project path to load config from
    pub project_path: PathBuf,

    /// Directory holding the global config; `HOME` from `env` when unset
    pub home_dir: Option<PathBuf>,

    /// CLI arguments (highest priority)
    pub cli_args: Option<AwaitConfig>,

    /// Environment variables
    pub env: HashMap<String, String>,
}

/// Configuration validation result
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationResult {
    /// Is configuration valid?
    pub valid: bool,

    /// Validation errors
    pub errors: Vec<ConfigValidationError>,

    /// Validation warnings
    pub warnings: Vec<ConfigValidationWarning>,
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Field path (e.g., "awaiters.skip")
    pub field: String,

    /// Error message
    pub message: String,

    /// Expected type/value
    pub expected: Option<String>,

    /// Actual type/value
    pub actual: Option<String>,
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationWarning {
    /// Field path
    pub field: String,

    /// Warning message
    pub message: String,

    /// Suggestion
    pub suggestion: Option<String>,
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from multiple sources with priority
    ///
    /// Priority (high to low):
    /// 1. CLI arguments
    /// 2. Environment variables
    /// 3. Project config (./.gem-await.yaml)
    /// 4. Global config (~/.gem-await.yaml)
    /// 5. Default values
    pub async fn load(options: ConfigLoadOptions) -> Result<AwaitConfig, AwaitError> {
        let mut configs: Vec<AwaitConfig> = vec![AwaitConfig::default()];

        let home_dir = options
            .home_dir
            .clone()
            .or_else(|| options.env.get("HOME").map(PathBuf::from));
        if let Some(home_dir) = home_dir
            && let Some(global_config) = Self::load_config_file(&home_dir.join(CONFIG_FILENAME)).await?
        {
            configs.push(global_config);
        }

        let project_config_path = options.project_path.join(CONFIG_FILENAME);
        if let Some(project_config) = Self::load_config_file(&project_config_path).await? {
            configs.push(project_config);
        }

        if let Some(env_config) = Self::load_env_config(&options.env) {
            configs.push(env_config);
        }

        if let Some(cli_config) = options.cli_args {
            configs.push(cli_config);
        }

        let merged_config = Self::merge_configs(configs);

        Ok(Self::expand_env_vars(merged_config, &options.env))
    }

    /// Load configuration from a YAML file; a missing file is not an error
    async fn load_config_file(file_path: &Path) -> Result<Option<AwaitConfig>, AwaitError> {
        if !file_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(file_path).await.map_err(|e| {
            AwaitError::Config(format!(
                "Failed to read config file {}: {}",
                file_path.display(),
                e
            ))
        })?;

        // an empty file deserializes to unit, not to a mapping
        if content.trim().is_empty() {
            return Ok(Some(AwaitConfig::default()));
        }

        let config: AwaitConfig = serde_yaml::from_str(&content).map_err(|e| {
            AwaitError::Config(format!(
                "Failed to parse YAML config {}: {}",
                file_path.display(),
                e
            ))
        })?;

        Ok(Some(config))
    }

    /// Load configuration from environment variables
    fn load_env_config(env: &HashMap<String, String>) -> Option<AwaitConfig> {
        let mut config = AwaitConfig::default();
        let mut has_changes = false;

        if let Some(source) = env.get(SOURCE_ENV).filter(|s| !s.trim().is_empty()) {
            config.source = Some(source.trim().to_string());
            has_changes = true;
        }

        if let Some(timeout) = env.get(TIMEOUT_ENV) {
            match timeout.trim().parse::<u64>() {
                Ok(seconds) => {
                    config.timeout = Some(seconds);
                    has_changes = true;
                }
                Err(_) => warn!("Ignoring {}={:?}, expected seconds", TIMEOUT_ENV, timeout),
            }
        }

        if has_changes { Some(config) } else { None }
    }

    /// Merge multiple configurations with priority
    fn merge_configs(configs: Vec<AwaitConfig>) -> AwaitConfig {
        let mut result = AwaitConfig::default();

        for config in configs {
            Self::merge_into(&mut result, config);
        }

        result
    }

    /// Merge source config into target, field by field
    fn merge_into(target: &mut AwaitConfig, source: AwaitConfig) {
        if source.source.is_some() {
            target.source = source.source;
        }
        if source.timeout.is_some() {
            target.timeout = source.timeout;
        }

        if let Some(awaiters) = source.awaiters {
            let merged = target.awaiters.get_or_insert_with(Default::default);
            if awaiters.skip.is_some() {
                merged.skip = awaiters.skip;
            }
            if awaiters.only.is_some() {
                merged.only = awaiters.only;
            }
        }

        if let Some(backoff) = source.backoff {
            let merged = target.backoff.get_or_insert_with(Default::default);
            if backoff.step_millis.is_some() {
                merged.step_millis = backoff.step_millis;
            }
            if backoff.max_delay.is_some() {
                merged.max_delay = backoff.max_delay;
            }
        }

        if let Some(http) = source.http {
            let merged = target.http.get_or_insert_with(Default::default);
            if http.request_timeout.is_some() {
                merged.request_timeout = http.request_timeout;
            }
            if http.bypass_cache.is_some() {
                merged.bypass_cache = http.bypass_cache;
            }
            if http.cache_dir.is_some() {
                merged.cache_dir = http.cache_dir;
            }
        }
    }

    /// Expand `${VAR}` references in the source URL
    fn expand_env_vars(mut config: AwaitConfig, env: &HashMap<String, String>) -> AwaitConfig {
        if let Some(source) = &config.source {
            config.source = Some(Self::expand_string(source, env));
        }
        config
    }

    /// Expand environment variables in a single string
    ///
    /// Unknown variables are left in place.
    fn expand_string(input: &str, env: &HashMap<String, String>) -> String {
        ENV_VAR_PATTERN
            .replace_all(input, |caps: &regex::Captures| {
                let var_name = &caps[1];
                match env.get(var_name) {
                    Some(value) => value.clone(),
                    None => {
                        warn!("Environment variable {} not found", var_name);
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }

    /// Validate configuration
    pub fn validate(config: &AwaitConfig) -> ConfigValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // 1. Timeout
        if config.timeout == Some(0) {
            errors.push(ConfigValidationError {
                field: "timeout".to_string(),
                message: "Timeout must be at least one second".to_string(),
                expected: Some("positive number of seconds".to_string()),
                actual: Some("0".to_string()),
            });
        }

        // 2. Source
        Self::validate_source(config.source(), &mut errors, &mut warnings);

        // 3. Awaiters
        if let Some(awaiters) = &config.awaiters {
            Self::validate_awaiters(awaiters, &mut errors, &mut warnings);
        }

        // 4. HTTP
        if config.http.as_ref().and_then(|h| h.request_timeout) == Some(0) {
            errors.push(ConfigValidationError {
                field: "http.requestTimeout".to_string(),
                message: "Request timeout must be at least one second".to_string(),
                expected: Some("positive number of seconds".to_string()),
                actual: Some("0".to_string()),
            });
        }

        ConfigValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    fn validate_source(
        source: &str,
        errors: &mut Vec<ConfigValidationError>,
        warnings: &mut Vec<ConfigValidationWarning>,
    ) {
        match Url::parse(source) {
            Ok(url) if url.scheme() == "https" => {}
            Ok(url) if url.scheme() == "http" => warnings.push(ConfigValidationWarning {
                field: "source".to_string(),
                message: "Source is not using HTTPS".to_string(),
                suggestion: Some(format!("Use https://{}", url.host_str().unwrap_or(""))),
            }),
            Ok(url) => errors.push(ConfigValidationError {
                field: "source".to_string(),
                message: format!("Unsupported URL scheme: {}", url.scheme()),
                expected: Some("http or https URL".to_string()),
                actual: Some(url.scheme().to_string()),
            }),
            Err(e) => errors.push(ConfigValidationError {
                field: "source".to_string(),
                message: format!("Invalid source URL: {}", e),
                expected: Some("URL such as https://rubygems.org/".to_string()),
                actual: Some(crate::security::credentials::filter_uri_str(source)),
            }),
        }
    }

    fn validate_awaiters(
        awaiters: &AwaitersConfig,
        errors: &mut Vec<ConfigValidationError>,
        warnings: &mut Vec<ConfigValidationWarning>,
    ) {
        let lists = [("awaiters.skip", &awaiters.skip), ("awaiters.only", &awaiters.only)];
        for (field, names) in lists {
            for name in names.iter().flatten() {
                if name.parse::<AwaiterKind>().is_err() {
                    errors.push(ConfigValidationError {
                        field: field.to_string(),
                        message: format!("Unknown awaiter: {}", name),
                        expected: Some(
                            AwaiterKind::ALL
                                .iter()
                                .map(|kind| kind.as_str())
                                .collect::<Vec<_>>()
                                .join(", "),
                        ),
                        actual: Some(name.clone()),
                    });
                }
            }
        }

        if awaiters.skip.is_some() && awaiters.only.is_some() {
            warnings.push(ConfigValidationWarning {
                field: "awaiters".to_string(),
                message: "Both skip and only are set; skip still applies to the only list"
                    .to_string(),
                suggestion: Some("Set only one of awaiters.skip and awaiters.only".to_string()),
            });
        }
    }

    /// Format validation result as human-readable string
    pub fn format_validation_result(result: &ConfigValidationResult) -> String {
        let mut lines = Vec::new();

        if result.valid {
            lines.push("✅ Configuration validation succeeded".to_string());
        } else {
            lines.push("❌ Configuration has errors".to_string());
        }

        if !result.errors.is_empty() {
            lines.push("\n🔴 Errors:".to_string());
            for error in &result.errors {
                lines.push(format!("  - [{}] {}", error.field, error.message));
                if let (Some(expected), Some(actual)) = (&error.expected, &error.actual) {
                    lines.push(format!("    Expected: {}", expected));
                    lines.push(format!("    Actual: {}", actual));
                }
            }
        }

        if !result.warnings.is_empty() {
            lines.push("\n🟡 Warnings:".to_string());
            for warning in &result.warnings {
                lines.push(format!("  - [{}] {}", warning.field, warning.message));
                if let Some(suggestion) = &warning.suggestion {
                    lines.push(format!("    Suggestion: {}", suggestion));
                }
            }
        }

        lines.join("\n")
    }
}
