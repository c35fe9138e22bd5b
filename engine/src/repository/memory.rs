use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{JournalRecord, JournalRepository, RecordId, UserId};
use crate::error::JournalError;
use crate::payload::EncryptedPayload;

/// 进程内日记仓库
#[derive(Debug, Default)]
pub struct MemoryJournalRepository {
    records: Mutex<HashMap<UserId, Vec<JournalRecord>>>,
}

impl MemoryJournalRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 某用户的全部记录，按写入顺序
    pub fn records(&self, user: &UserId) -> Vec<JournalRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user)
            .cloned()
            .unwrap_or_default()
    }

    /// 直接写入一条记录，可用于构造被篡改的数据
    pub fn insert(&self, user: &UserId, record: JournalRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(user.clone())
            .or_default()
            .push(record);
    }
}

#[async_trait]
impl JournalRepository for MemoryJournalRepository {
    async fn append(
        &self,
        user: &UserId,
        payload: &EncryptedPayload,
    ) -> Result<RecordId, JournalError> {
        if user.as_str().is_empty() {
            return Err(JournalError::Unauthenticated);
        }

        let id = RecordId::new(Uuid::new_v4().to_string());
        self.insert(
            user,
            JournalRecord {
                id: id.clone(),
                payload: payload.clone(),
                created_at: Utc::now(),
            },
        );

        Ok(id)
    }

    async fn recent(&self, user: &UserId, limit: usize) -> Result<Vec<JournalRecord>, JournalError> {
        Ok(self.records(user).into_iter().rev().take(limit).collect())
    }
}
