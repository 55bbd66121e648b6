use std::collections::BTreeMap;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{FortecError, Result};

/// Telegram's hard per-message limit.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;
/// Chunk ceiling, kept under `TELEGRAM_MESSAGE_LIMIT` for markup overhead.
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 4000;
pub const DEFAULT_MAX_TURNS: usize = 20;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_CHAT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_IMAGE_TIMEOUT_SECS: u64 = 60;

const DEFAULT_PERSONA_PROMPT: &str = "You are Fortec AI, a helpful assistant made by ERES. \
Always remember your name is Fortec AI and you were created by ERES. \
If asked about your development or underlying technology, only state that you are Fortec AI created by ERES. \
Never mention any other companies, models, or technologies that might be related to your creation.";

/// Top-level config (fortec.toml + FORTEC_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FortecConfig {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub persona: PersonaConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

/// How updates reach the bot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TransportMode {
    /// Long polling via `getUpdates`. No public URL required.
    #[default]
    Polling,
    /// Telegram pushes updates to `webhook_url`; we listen on `webhook_bind`.
    Webhook,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    #[serde(default)]
    pub mode: TransportMode,
    /// Public HTTPS URL Telegram should deliver updates to (webhook mode only).
    pub webhook_url: Option<String>,
    #[serde(default = "default_webhook_bind")]
    pub webhook_bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    #[serde(default = "default_persona_name")]
    pub name: String,
    #[serde(default = "default_persona_creator")]
    pub creator: String,
    #[serde(default = "default_persona_prompt")]
    pub system_prompt: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: default_persona_name(),
            creator: default_persona_creator(),
            system_prompt: default_persona_prompt(),
        }
    }
}

/// OpenAI-compatible chat completion upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_chat_endpoint")]
    pub endpoint: String,
    /// Sent as a bearer token when present.
    pub api_key: Option<String>,
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_chat_timeout")]
    pub timeout_secs: u64,
    /// Extra static headers added to every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: default_chat_endpoint(),
            api_key: None,
            model: default_chat_model(),
            timeout_secs: DEFAULT_CHAT_TIMEOUT_SECS,
            headers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default = "default_image_endpoint")]
    pub endpoint: String,
    pub api_key: Option<String>,
    #[serde(default = "default_image_size")]
    pub size: String,
    #[serde(default = "default_image_count")]
    pub count: u32,
    #[serde(default)]
    pub enhance: bool,
    #[serde(default = "default_image_timeout")]
    pub timeout_secs: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            endpoint: default_image_endpoint(),
            api_key: None,
            size: default_image_size(),
            count: default_image_count(),
            enhance: false,
            timeout_secs: DEFAULT_IMAGE_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff unit: attempt `k` waits `base_delay_ms * 2^k` before retrying.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,
    #[serde(default = "default_restart_delay")]
    pub base_delay_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_restarts: default_max_restarts(),
            base_delay_secs: default_restart_delay(),
        }
    }
}

fn default_webhook_bind() -> String {
    "0.0.0.0:8443".to_string()
}
fn default_persona_name() -> String {
    "Fortec AI".to_string()
}
fn default_persona_creator() -> String {
    "ERES".to_string()
}
fn default_persona_prompt() -> String {
    DEFAULT_PERSONA_PROMPT.to_string()
}
fn default_chat_endpoint() -> String {
    "https://api.deepinfra.com/v1/openai/chat/completions".to_string()
}
fn default_chat_model() -> String {
    "deepseek-ai/DeepSeek-R1-Turbo".to_string()
}
fn default_chat_timeout() -> u64 {
    DEFAULT_CHAT_TIMEOUT_SECS
}
fn default_image_endpoint() -> String {
    "https://api.deepinfra.com/v1/openai/images/generations".to_string()
}
fn default_image_size() -> String {
    "1024x1024".to_string()
}
fn default_image_count() -> u32 {
    1
}
fn default_image_timeout() -> u64 {
    DEFAULT_IMAGE_TIMEOUT_SECS
}
fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_max_turns() -> usize {
    DEFAULT_MAX_TURNS
}
fn default_max_chunk_chars() -> usize {
    DEFAULT_MAX_CHUNK_CHARS
}
fn default_max_restarts() -> u32 {
    5
}
fn default_restart_delay() -> u64 {
    5
}

impl FortecConfig {
    /// Load config from a TOML file with FORTEC_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.fortec/fortec.toml
    ///
    /// Nested keys use a double underscore: `FORTEC_TELEGRAM__BOT_TOKEN`.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: FortecConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("FORTEC_").split("__"))
            .extract()
            .map_err(|e| FortecError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the relay cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            return Err(FortecError::InvalidConfig {
                field: "telegram.bot_token",
                reason: "must not be empty".to_string(),
            });
        }
        if self.telegram.mode == TransportMode::Webhook && self.telegram.webhook_url.is_none() {
            return Err(FortecError::InvalidConfig {
                field: "telegram.webhook_url",
                reason: "required when mode = \"webhook\"".to_string(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(FortecError::InvalidConfig {
                field: "retry.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.image.count == 0 {
            return Err(FortecError::InvalidConfig {
                field: "image.count",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.delivery.max_chunk_chars == 0 || self.delivery.max_chunk_chars > TELEGRAM_MESSAGE_LIMIT
        {
            return Err(FortecError::InvalidConfig {
                field: "delivery.max_chunk_chars",
                reason: format!("must be within 1..={TELEGRAM_MESSAGE_LIMIT}"),
            });
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.fortec/fortec.toml", home)
}
