// config.rs

use std::env;
use std::net::SocketAddr;

use dotenv::dotenv;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

pub const DEFAULT_COMPLETION_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_COMPLETION_MODEL: &str = "llama3-8b-8192";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant. Keep your responses concise and friendly. Avoid long explanations.";
pub const DEFAULT_BOT_SENDER: &str = "Groq";
pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 100;

static TABLE_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").unwrap());

/// Configuration-related error types
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Error when a required environment variable is not found
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    /// Error when a variable is present but cannot be parsed
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: String, value: String },

    /// Table names are interpolated into SQL, so only plain identifiers pass
    #[error("Invalid table name: {0:?}")]
    InvalidTableName(String),
}

/// Where messages are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Postgres { database_url: String, table: String },
    Memory,
}

/// Settings for the completion API client.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionConfig {
    /// `None` leaves AI replies disabled; requests for one fail without a call.
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system_prompt: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_COMPLETION_URL.to_string(),
            model: DEFAULT_COMPLETION_MODEL.to_string(),
            max_tokens: 150,
            temperature: 0.7,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub store: StoreConfig,
    pub completion: CompletionConfig,
    pub page_size: usize,
    pub max_history: usize,
    pub bot_sender: String,
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = parse_or(&get, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?;

        let store = match get("STORE_BACKEND").as_deref().map(str::trim) {
            None | Some("postgres") => {
                let database_url = get("DATABASE_URL")
                    .ok_or_else(|| ConfigError::EnvVarNotFound("DATABASE_URL".to_string()))?;
                let table = get("MESSAGES_TABLE").unwrap_or_else(|| "chat_messages".to_string());
                if !TABLE_NAME_REGEX.is_match(&table) {
                    return Err(ConfigError::InvalidTableName(table));
                }
                StoreConfig::Postgres {
                    database_url,
                    table,
                }
            }
            Some("memory") => StoreConfig::Memory,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    name: "STORE_BACKEND".to_string(),
                    value: other.to_string(),
                })
            }
        };

        let defaults = CompletionConfig::default();
        let completion = CompletionConfig {
            api_key: get("COMPLETION_API_KEY").or_else(|| get("GROQ_API_KEY")),
            endpoint: get("COMPLETION_API_URL").unwrap_or(defaults.endpoint),
            model: get("COMPLETION_MODEL").unwrap_or(defaults.model),
            max_tokens: parse_or(&get, "COMPLETION_MAX_TOKENS", defaults.max_tokens)?,
            temperature: parse_or(&get, "COMPLETION_TEMPERATURE", defaults.temperature)?,
            system_prompt: get("COMPLETION_SYSTEM_PROMPT").unwrap_or(defaults.system_prompt),
        };

        let page_size: usize = parse_or(&get, "MESSAGES_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidValue {
                name: "MESSAGES_PAGE_SIZE".to_string(),
                value: page_size.to_string(),
            });
        }

        Ok(Self {
            bind_addr,
            store,
            completion,
            page_size,
            max_history: parse_or(&get, "AI_HISTORY_LIMIT", 20)?,
            bot_sender: get("BOT_SENDER").unwrap_or_else(|| DEFAULT_BOT_SENDER.to_string()),
        })
    }
}

fn parse_or<T, G>(get: &G, name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}
