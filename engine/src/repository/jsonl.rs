//! 基于 JSON Lines 文件的日记仓库
//!
//! 目录布局：`<root>/<user>/journals.jsonl`，每行一条 JournalRecord。
//! 只追加，不修改已有行；多个进程同时写入时不做协调（后写者胜）。

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::warn;
use uuid::Uuid;

use super::{JournalRecord, JournalRepository, RecordId, UserId};
use crate::error::JournalError;
use crate::payload::EncryptedPayload;

const JOURNAL_FILE: &str = "journals.jsonl";

#[derive(Debug, Clone)]
pub struct JsonlJournalRepository {
    root: PathBuf,
}

impl JsonlJournalRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 用户标识直接作为目录名，必须先校验，防止路径穿越
    fn user_dir(&self, user: &UserId) -> Result<PathBuf, JournalError> {
        let id = user.as_str();

        if id.is_empty() {
            return Err(JournalError::Unauthenticated);
        }

        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        {
            return Err(JournalError::Unavailable(format!("invalid user id: {id:?}")));
        }

        Ok(self.root.join(id))
    }
}

fn unavailable(err: impl std::fmt::Display) -> JournalError {
    JournalError::Unavailable(err.to_string())
}

#[async_trait]
impl JournalRepository for JsonlJournalRepository {
    async fn append(
        &self,
        user: &UserId,
        payload: &EncryptedPayload,
    ) -> Result<RecordId, JournalError> {
        let dir = self.user_dir(user)?;
        fs::create_dir_all(&dir).await.map_err(unavailable)?;

        let record = JournalRecord {
            id: RecordId::new(Uuid::new_v4().to_string()),
            payload: payload.clone(),
            created_at: Utc::now(),
        };

        let mut line = serde_json::to_string(&record).map_err(unavailable)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(JOURNAL_FILE))
            .await
            .map_err(unavailable)?;

        file.write_all(line.as_bytes()).await.map_err(unavailable)?;
        file.flush().await.map_err(unavailable)?;

        Ok(record.id)
    }

    async fn recent(&self, user: &UserId, limit: usize) -> Result<Vec<JournalRecord>, JournalError> {
        let path = self.user_dir(user)?.join(JOURNAL_FILE);

        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(unavailable(e)),
        };

        let mut records = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<JournalRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(line = index + 1, error = %e, "skipping malformed journal record"),
            }
        }

        // 稳定排序：同一时刻写入的记录保持“后写在前”
        records.reverse();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);

        Ok(records)
    }
}
