//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which provider answers counsellor chats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AiService {
    Gemini,
    OpenAi,
}

impl AiService {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiService::Gemini => "gemini",
            AiService::OpenAi => "openai",
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            AiService::Gemini => "gemini-2.0-flash",
            AiService::OpenAi => "gpt-4o",
        }
    }
}

impl fmt::Display for AiService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AiService {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(AiService::Gemini),
            "openai" => Ok(AiService::OpenAi),
            other => Err(format!("'{other}' is not one of gemini, openai")),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub ai_service: AiService,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub counsellor_model: String,
    pub counsellor_timeout: Duration,
    pub frontend_url: String,
    pub session_ttl_days: i64,
}

fn parse_positive<T>(name: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
{
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Ok(value),
        _ => Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("'{raw}' is not a positive integer"),
        )),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server and Database Settings ---
        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url =
            var("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Counsellor Provider ---
        let ai_service = match var("AI_SERVICE") {
            Some(raw) => raw
                .parse::<AiService>()
                .map_err(|e| ConfigError::InvalidValue("AI_SERVICE".to_string(), e))?,
            None => AiService::Gemini,
        };
        let openai_api_key = var("OPENAI_API_KEY").filter(|key| !key.trim().is_empty());
        let gemini_api_key = var("GEMINI_API_KEY").filter(|key| !key.trim().is_empty());
        let counsellor_model = var("COUNSELLOR_MODEL")
            .unwrap_or_else(|| ai_service.default_model().to_string());
        let timeout_secs: u64 =
            parse_positive("COUNSELLOR_TIMEOUT_SECS", var("COUNSELLOR_TIMEOUT_SECS"), 30)?;

        // --- Web Settings ---
        let frontend_url =
            var("FRONTEND_URL").unwrap_or_else(|| "http://localhost:3000".to_string());
        let session_ttl_days: i64 =
            parse_positive("SESSION_TTL_DAYS", var("SESSION_TTL_DAYS"), 30)?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            ai_service,
            openai_api_key,
            gemini_api_key,
            counsellor_model,
            counsellor_timeout: Duration::from_secs(timeout_secs),
            frontend_url,
            session_ttl_days,
        })
    }

    /// The API key of the selected provider, if configured.
    pub fn counsellor_api_key(&self) -> Option<&str> {
        match self.ai_service {
            AiService::Gemini => self.gemini_api_key.as_deref(),
            AiService::OpenAi => self.openai_api_key.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_only_the_database_is_set() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/planner")]).expect("config");
        assert_eq!(config.bind_address.port(), 8000);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.ai_service, AiService::Gemini);
        assert_eq!(config.counsellor_model, "gemini-2.0-flash");
        assert_eq!(config.counsellor_timeout, Duration::from_secs(30));
        assert_eq!(config.session_ttl_days, 30);
        assert!(config.counsellor_api_key().is_none());
    }

    #[test]
    fn database_url_is_required() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingVar(name)) if name == "DATABASE_URL"));
    }

    #[test]
    fn openai_selection_changes_model_and_key() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/planner"),
            ("AI_SERVICE", "OpenAI"),
            ("OPENAI_API_KEY", "sk-test"),
            ("GEMINI_API_KEY", ""),
        ])
        .expect("config");
        assert_eq!(config.ai_service, AiService::OpenAi);
        assert_eq!(config.counsellor_model, "gpt-4o");
        assert_eq!(config.counsellor_api_key(), Some("sk-test"));
        assert!(config.gemini_api_key.is_none());
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/planner"),
            ("AI_SERVICE", "claude"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(name, _) if name == "AI_SERVICE"));

        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/planner"),
            ("COUNSELLOR_TIMEOUT_SECS", "0"),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue(name, _) if name == "COUNSELLOR_TIMEOUT_SECS"
        ));
    }
}
