//! Configuration and settings management
//!
//! Loads settings from environment variables and defines model constants.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Comma-separated list of shared Gemini API keys
    #[serde(rename = "gemini_api_keys")]
    pub gemini_api_keys_str: Option<String>,

    /// Override for the built-in system prompt
    pub system_message: Option<String>,

    /// Listening port for the health endpoint
    #[serde(default = "default_health_port")]
    pub health_port: u16,
}

const fn default_health_port() -> u16 {
    8080
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Environment::default() auto-converts UPPER_SNAKE_CASE to snake_case;
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        s.try_deserialize()
    }

    /// Returns the shared Gemini keys in configuration order.
    ///
    /// Accepts commas, semicolons or whitespace as separators.
    #[must_use]
    pub fn gemini_keys(&self) -> Vec<String> {
        self.gemini_api_keys_str
            .as_ref()
            .map(|s| {
                s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                    .filter(|token| !token.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// System prompt sent with every solve request
    #[must_use]
    pub fn system_prompt(&self) -> &str {
        self.system_message
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }
}

/// Gemini model used for solving
pub const GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Timeout for Gemini requests; model responses can be slow
pub const LLM_TIMEOUT_SECS: u64 = 90;

/// Generation temperature
pub const LLM_TEMPERATURE: f64 = 0.4;

/// Maximum output tokens per solution
pub const LLM_MAX_OUTPUT_TOKENS: u32 = 4096;

/// Prefix that marks a user-supplied Gemini key (BYOK)
pub const USER_KEY_PREFIX: &str = "AIza";

/// Retry attempts against a user-supplied key before giving up
pub const USER_KEY_RETRIES: usize = 3;

/// Pause between retries after a transient provider failure
pub const RETRY_PAUSE_SECS: u64 = 2;

/// Longest edge of an uploaded photo after downscaling
pub const IMAGE_MAX_DIMENSION: u32 = 1600;

/// JPEG quality for re-encoded photos
pub const IMAGE_JPEG_QUALITY: u8 = 85;

/// Telegram message limit with a safety margin for part headers
pub const MESSAGE_LIMIT: usize = 3800;

/// Built-in system prompt (used when `SYSTEM_MESSAGE` is not set)
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "Ты — эксперт ГДЗ. Реши задачи подробно: Дано, Решение, Ответ. \
     Используй формулы и знаки (√, ^, π). Жирный текст: **Текст**. \
     НЕ используй # и >. Каждую задачу отделяй пустой строкой.";
