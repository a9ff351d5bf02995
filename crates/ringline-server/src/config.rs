//! Server Configuration
//!
//! Built from Shuttle secrets through a lookup closure, so tests can feed a
//! plain map instead of a `SecretStore`.

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_TWILIO_FROM: &str = "+15005550006";
pub const DEFAULT_TWILIO_VOICE: &str = "alice";
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 10;
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required secret {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Where call records and accounts live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    /// Process-local maps; records vanish on restart
    Memory,
}

#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub voice: String,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Absent key puts the agent in fallback-only mode
    pub api_key: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub api_key: Option<String>,
    /// Externally reachable base URL used in gateway callback URLs
    pub public_base_url: String,
    pub callback_secret: Option<String>,
    pub twilio: TwilioConfig,
    pub openai: OpenAiConfig,
    pub llm_timeout: Duration,
    pub gateway_timeout: Duration,
    pub storage: StorageBackend,
}

impl ServerConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));
        let seconds = |key: &'static str, default: u64| match get(key) {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or(ConfigError::Invalid { key, value: raw }),
            None => Ok(Duration::from_secs(default)),
        };

        let storage = match get("STORAGE").as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("postgres") => StorageBackend::Postgres,
            Some("memory") => StorageBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "STORAGE",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            api_key: get("RINGLINE_API_KEY"),
            public_base_url: get("PUBLIC_BASE_URL")
                .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            callback_secret: get("CALLBACK_SECRET"),
            twilio: TwilioConfig {
                account_sid: require("TWILIO_ACCOUNT_SID")?,
                auth_token: require("TWILIO_AUTH_TOKEN")?,
                from_number: get("TWILIO_PHONE_NUMBER")
                    .unwrap_or_else(|| DEFAULT_TWILIO_FROM.to_string()),
                voice: get("TWILIO_VOICE").unwrap_or_else(|| DEFAULT_TWILIO_VOICE.to_string()),
            },
            openai: OpenAiConfig {
                api_key: get("OPENAI_API_KEY"),
                base_url: get("OPENAI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
            },
            llm_timeout: seconds("LLM_TIMEOUT_SECS", DEFAULT_LLM_TIMEOUT_SECS)?,
            gateway_timeout: seconds("GATEWAY_TIMEOUT_SECS", DEFAULT_GATEWAY_TIMEOUT_SECS)?,
            storage,
        })
    }
}
