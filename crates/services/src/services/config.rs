use std::{path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9000;
pub const DEFAULT_LLM_ENDPOINT: &str =
    "https://llm.api.cloud.yandex.net/foundationModels/v1/completion";
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TEMPERATURE: f64 = 0.9;
pub const DEFAULT_MAX_TOKENS: u32 = 5000;
/// Subtracted from the running duration of unfinished tasks.
pub const DEFAULT_RUNNING_OFFSET_HOURS: f64 = 2.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug, Serialize, Deserialize, TS)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model_uri: Option<String>,
    /// Bearer token used when a request carries no `iam_token`.
    #[serde(skip_serializing)]
    #[ts(skip)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_LLM_ENDPOINT.to_string(),
            model_uri: None,
            api_key: None,
            timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, TS)]
pub struct ReportConfig {
    pub running_offset_hours: f64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            running_offset_hours: DEFAULT_RUNNING_OFFSET_HOURS,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, TS)]
pub struct Config {
    /// Falls back to the database in the asset directory.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub llm: LlmConfig,
    pub report: ReportConfig,
    #[ts(type = "string | null")]
    pub prompts_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            llm: LlmConfig::default(),
            report: ReportConfig::default(),
            prompts_file: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Unset or blank keys
    /// keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Config::default();

        let port = match get("BACKEND_PORT").or_else(|| get("PORT")) {
            Some(raw) => parse_value("BACKEND_PORT", &raw)?,
            None => defaults.port,
        };

        let llm = LlmConfig {
            endpoint: get("LLM_ENDPOINT").unwrap_or(defaults.llm.endpoint),
            model_uri: get("LLM_MODEL_URI"),
            api_key: get("LLM_API_KEY"),
            timeout_secs: parse_or("LLM_TIMEOUT_SECS", get("LLM_TIMEOUT_SECS"), defaults.llm.timeout_secs)?,
            temperature: parse_or("LLM_TEMPERATURE", get("LLM_TEMPERATURE"), defaults.llm.temperature)?,
            max_tokens: parse_or("LLM_MAX_TOKENS", get("LLM_MAX_TOKENS"), defaults.llm.max_tokens)?,
        };

        let running_offset_hours = parse_or(
            "REPORT_RUNNING_OFFSET_HOURS",
            get("REPORT_RUNNING_OFFSET_HOURS"),
            defaults.report.running_offset_hours,
        )?;
        if !running_offset_hours.is_finite() {
            return Err(ConfigError::Invalid {
                key: "REPORT_RUNNING_OFFSET_HOURS",
                value: running_offset_hours.to_string(),
            });
        }

        Ok(Config {
            database_url: get("DATABASE_URL"),
            host: get("HOST").unwrap_or(defaults.host),
            port,
            llm,
            report: ReportConfig { running_offset_hours },
            prompts_file: get("PROMPTS_FILE").map(PathBuf::from),
        })
    }
}

fn parse_value<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
    })
}

fn parse_or<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.llm.endpoint, DEFAULT_LLM_ENDPOINT);
        assert_eq!(config.llm.timeout_secs, 30);
        assert_eq!(config.llm.max_tokens, 5000);
        assert_eq!(config.report.running_offset_hours, 2.0);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn backend_port_wins_over_port() {
        let config = Config::from_lookup(lookup(&[("BACKEND_PORT", "8100"), ("PORT", "8200")])).unwrap();
        assert_eq!(config.port, 8100);

        let config = Config::from_lookup(lookup(&[("PORT", "8200")])).unwrap();
        assert_eq!(config.port, 8200);
    }

    #[test]
    fn overrides_are_applied() {
        let config = Config::from_lookup(lookup(&[
            ("LLM_MODEL_URI", "gpt://folder/yandexgpt/latest"),
            ("LLM_TEMPERATURE", "0.3"),
            ("REPORT_RUNNING_OFFSET_HOURS", "0"),
            ("PROMPTS_FILE", "/tmp/prompts.json"),
        ]))
        .unwrap();
        assert_eq!(config.llm.model_uri.as_deref(), Some("gpt://folder/yandexgpt/latest"));
        assert_eq!(config.llm.temperature, 0.3);
        assert_eq!(config.report.running_offset_hours, 0.0);
        assert_eq!(config.prompts_file, Some(PathBuf::from("/tmp/prompts.json")));
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = Config::from_lookup(lookup(&[("LLM_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "LLM_TIMEOUT_SECS", .. }));
    }
}
