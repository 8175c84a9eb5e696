//! Gemini client, credential pool and the solve dispatcher.
//!
//! The dispatcher implements a bounded round-robin retry over the shared
//! key pool: a 429 rotates to the next key immediately, any other failure
//! rotates after a short pause, and every key is tried at most once per
//! request. A user-supplied override key (BYOK) bypasses the pool entirely
//! and has its own, deliberately different, failure policy.

pub mod gemini;
pub mod pool;
pub mod store;

use crate::config::{RETRY_PAUSE_SECS, USER_KEY_RETRIES};
use pool::KeyPool;
use std::sync::Arc;
use std::time::Duration;
use store::KeyStore;
use thiserror::Error;
use tracing::{info, warn};

/// Provider-level failure, tagged so the dispatcher can pick a policy.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP 429: the key's quota is exhausted
    #[error("rate limited by provider")]
    RateLimited,
    /// Non-success status other than 429
    #[error("API error: {0}")]
    Api(String),
    /// Connectivity or timeout failure
    #[error("network error: {0}")]
    Network(String),
    /// Body did not contain the expected candidate text
    #[error("invalid response shape: {0}")]
    InvalidResponse(String),
}

/// Terminal outcome of a solve attempt, surfaced to the message layer.
#[derive(Debug, Error)]
pub enum SolveError {
    /// Every key in the shared pool was tried without success
    #[error("all shared API keys exhausted")]
    PoolExhausted,
    /// The user's own key hit its rate limit; there is no pool to fall back to
    #[error("user-supplied key hit its rate limit")]
    UserKeyExhausted,
    /// Retries against the user's key ran out on a non-429 failure
    #[error("transient provider failure: {0}")]
    Transient(LlmError),
    /// Neither a pool key nor an override key is available
    #[error("no API keys configured")]
    NoCredentials,
}

/// Answer style selected via the inline keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Full Дано/Решение/Ответ write-up
    #[default]
    Detailed,
    /// Answer with a minimal derivation
    Short,
    /// Worked the way an exam grader expects
    Exam,
}

impl Mode {
    /// All modes, in keyboard order.
    pub const ALL: [Self; 3] = [Self::Detailed, Self::Short, Self::Exam];

    /// Opaque payload carried by the mode button.
    #[must_use]
    pub const fn callback_data(self) -> &'static str {
        match self {
            Self::Detailed => "mode:detailed",
            Self::Short => "mode:short",
            Self::Exam => "mode:exam",
        }
    }

    /// Inverse of [`Self::callback_data`]; `None` for foreign payloads.
    #[must_use]
    pub fn from_callback(data: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.callback_data() == data)
    }

    /// Button label.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Detailed => "Подробно",
            Self::Short => "Кратко",
            Self::Exam => "Как на экзамене",
        }
    }

    /// Extra instruction appended to the system prompt.
    #[must_use]
    pub const fn instruction(self) -> &'static str {
        match self {
            Self::Detailed => "Распиши каждый шаг решения.",
            Self::Short => "Отвечай кратко: только ключевые шаги и ответ.",
            Self::Exam => "Оформи решение так, как требуют на экзамене.",
        }
    }
}

/// Inline image attachment for photo-based problems.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// One problem to solve; built per incoming update and discarded after
/// the response cycle.
#[derive(Debug, Clone)]
pub struct SolveRequest {
    pub prompt: String,
    pub image: Option<ImageAttachment>,
    pub mode: Mode,
}

impl SolveRequest {
    #[must_use]
    pub fn text(prompt: impl Into<String>, mode: Mode) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
            mode,
        }
    }

    #[must_use]
    pub fn with_image(prompt: impl Into<String>, image: ImageAttachment, mode: Mode) -> Self {
        Self {
            prompt: prompt.into(),
            image: Some(image),
            mode,
        }
    }
}

/// Seam between the dispatcher and the provider; tests substitute a
/// counting mock here.
#[async_trait::async_trait]
pub trait TextModel: Send + Sync {
    async fn generate(
        &self,
        api_key: &str,
        system_prompt: &str,
        prompt: &str,
        image: Option<&ImageAttachment>,
    ) -> Result<String, LlmError>;
}

/// Outbound request dispatcher: builds provider requests, rotates through
/// the credential pool on failure, and returns text or a tagged failure.
pub struct Solver {
    model: Arc<dyn TextModel>,
    pool: KeyPool,
    keys: Arc<dyn KeyStore>,
    system_prompt: String,
}

impl Solver {
    /// Production solver over the Gemini API.
    #[must_use]
    pub fn new(settings: &crate::config::Settings, keys: Arc<dyn KeyStore>) -> Self {
        Self::with_model(
            Arc::new(gemini::GeminiModel::new()),
            KeyPool::new(settings.gemini_keys()),
            keys,
            settings.system_prompt().to_string(),
        )
    }

    /// Solver over an arbitrary model; the constructor tests use.
    #[must_use]
    pub fn with_model(
        model: Arc<dyn TextModel>,
        pool: KeyPool,
        keys: Arc<dyn KeyStore>,
        system_prompt: String,
    ) -> Self {
        Self {
            model,
            pool,
            keys,
            system_prompt,
        }
    }

    #[must_use]
    pub fn pool(&self) -> &KeyPool {
        &self.pool
    }

    /// Solves one request for the user.
    ///
    /// An override key stored for the user always wins over the shared
    /// pool and never touches the pool's cursor.
    ///
    /// # Errors
    ///
    /// See [`SolveError`] for the failure taxonomy.
    pub async fn solve(&self, user_id: i64, request: &SolveRequest) -> Result<String, SolveError> {
        let system = format!("{}\n{}", self.system_prompt, request.mode.instruction());

        if let Some(key) = self.keys.get(user_id) {
            return self.solve_with_user_key(&key, &system, request).await;
        }

        if self.pool.is_empty() {
            return Err(SolveError::NoCredentials);
        }
        self.solve_with_pool(&system, request).await
    }

    /// Bounded round-robin over the shared pool: one attempt per key.
    /// A 429 and a generic failure both rotate; only the pause differs.
    async fn solve_with_pool(
        &self,
        system: &str,
        request: &SolveRequest,
    ) -> Result<String, SolveError> {
        let attempts = self.pool.len();
        for attempt in 1..=attempts {
            let Some(key) = self.pool.current() else {
                return Err(SolveError::NoCredentials);
            };
            match self
                .model
                .generate(&key, system, &request.prompt, request.image.as_ref())
                .await
            {
                Ok(text) => {
                    info!("Solved on attempt {attempt}/{attempts}");
                    return Ok(text);
                }
                Err(LlmError::RateLimited) => {
                    warn!("Key {attempt}/{attempts} rate limited, rotating");
                    self.pool.advance();
                }
                Err(e) => {
                    warn!("Key {attempt}/{attempts} failed ({e}), rotating");
                    self.pool.advance();
                    if attempt < attempts {
                        tokio::time::sleep(Duration::from_secs(RETRY_PAUSE_SECS)).await;
                    }
                }
            }
        }
        Err(SolveError::PoolExhausted)
    }

    /// Override-key policy: a 429 is terminal (no pool to fall back to),
    /// anything else gets a fixed number of retries with short pauses.
    async fn solve_with_user_key(
        &self,
        key: &str,
        system: &str,
        request: &SolveRequest,
    ) -> Result<String, SolveError> {
        let mut last_error = None;
        for attempt in 1..=USER_KEY_RETRIES {
            match self
                .model
                .generate(key, system, &request.prompt, request.image.as_ref())
                .await
            {
                Ok(text) => return Ok(text),
                Err(LlmError::RateLimited) => return Err(SolveError::UserKeyExhausted),
                Err(e) => {
                    warn!("User key attempt {attempt}/{USER_KEY_RETRIES} failed: {e}");
                    last_error = Some(e);
                    if attempt < USER_KEY_RETRIES {
                        tokio::time::sleep(Duration::from_secs(RETRY_PAUSE_SECS)).await;
                    }
                }
            }
        }
        Err(SolveError::Transient(last_error.unwrap_or_else(|| {
            LlmError::Api("request was never attempted".to_string())
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_callback_round_trip() {
        for mode in Mode::ALL {
            assert_eq!(Mode::from_callback(mode.callback_data()), Some(mode));
        }
        assert_eq!(Mode::from_callback("mode:unknown"), None);
        assert_eq!(Mode::from_callback(""), None);
    }

    #[test]
    fn test_default_mode_is_detailed() {
        assert_eq!(Mode::default(), Mode::Detailed);
    }
}
