//! Per-user answer mode selection.

use crate::llm::Mode;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory map of user id to selected answer mode. Users without a
/// selection get [`Mode::default`].
#[derive(Default)]
pub struct ModeStore {
    modes: Mutex<HashMap<i64, Mode>>,
}

impl ModeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, user_id: i64) -> Mode {
        let modes = self
            .modes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        modes.get(&user_id).copied().unwrap_or_default()
    }

    pub fn set(&self, user_id: i64, mode: Mode) {
        let mut modes = self
            .modes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        modes.insert(user_id, mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mode() {
        let store = ModeStore::new();
        assert_eq!(store.get(1), Mode::Detailed);
    }

    #[test]
    fn test_set_and_get() {
        let store = ModeStore::new();
        store.set(1, Mode::Exam);
        assert_eq!(store.get(1), Mode::Exam);
        // other users keep the default
        assert_eq!(store.get(2), Mode::Detailed);
    }
}
