//! Per-user override key storage (BYOK).

use std::collections::HashMap;
use std::sync::Mutex;

/// Key-value capability the solve dispatcher uses to look up a user's own
/// API key. In-memory today; a persistent backend can be swapped in
/// without touching dispatch logic.
pub trait KeyStore: Send + Sync {
    /// Override key for the user, if one was supplied.
    fn get(&self, user_id: i64) -> Option<String>;
    /// Stores an override key. Last write wins.
    fn set(&self, user_id: i64, key: String);
}

/// In-memory `KeyStore`; contents are lost on restart.
#[derive(Default)]
pub struct InMemoryKeyStore {
    keys: Mutex<HashMap<i64, String>>,
}

impl InMemoryKeyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for InMemoryKeyStore {
    fn get(&self, user_id: i64) -> Option<String> {
        let keys = self
            .keys
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        keys.get(&user_id).cloned()
    }

    fn set(&self, user_id: i64, key: String) {
        let mut keys = self
            .keys
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        keys.insert(user_id, key);
    }
}
