//! 内存密钥存储，用于测试与不落盘的临时会话。

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::KeyStorage;
use crate::error::JournalError;

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置一条记录，例如模拟已损坏的密钥
    pub fn with_entry(id: &str, value: &str) -> Self {
        let storage = Self::new();
        storage.put(id, value);
        storage
    }

    pub fn get(&self, id: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn put(&self, id: &str, value: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_owned(), value.to_owned());
    }
}

impl KeyStorage for MemoryStorage {
    fn load(&self, id: &str) -> Result<Option<String>, JournalError> {
        Ok(self.get(id))
    }

    fn store(&self, id: &str, value: &str) -> Result<(), JournalError> {
        self.put(id, value);
        Ok(())
    }
}
