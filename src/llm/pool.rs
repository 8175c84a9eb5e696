//! Round-robin pool of shared Gemini API keys.

use std::sync::Mutex;

/// Ordered set of shared provider keys with a rotation cursor.
///
/// The cursor stays in `[0, len)` while the pool is non-empty. Rotation is
/// a pure round-robin: `len()` advances from any position return to it,
/// so a full failed sweep leaves the cursor where it started.
pub struct KeyPool {
    keys: Vec<String>,
    cursor: Mutex<usize>,
}

impl KeyPool {
    /// Builds a pool from the configured key list. An empty list is
    /// allowed here; callers must guard before dispatching.
    #[must_use]
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys,
            cursor: Mutex::new(0),
        }
    }

    /// Key under the cursor, or `None` for an empty pool.
    #[must_use]
    pub fn current(&self) -> Option<String> {
        let cursor = self.cursor.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        self.keys.get(*cursor).cloned()
    }

    /// Moves the cursor to the next key, wrapping around. No-op when empty.
    pub fn advance(&self) {
        if self.keys.is_empty() {
            return;
        }
        let mut cursor = self.cursor.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *cursor = (*cursor + 1) % self.keys.len();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
