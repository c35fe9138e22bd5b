//! 读取最近的日记并在本地解密
//!
//! 单条记录解密失败不会中断整个列表：该条以“无法读取”占位返回，
//! 记录本身保留在仓库中，不做删除。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::codec::CipherCodec;
use crate::error::JournalError;
use crate::repository::{JournalRecord, JournalRepository, RecordId, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryView {
    Readable {
        id: RecordId,
        created_at: DateTime<Utc>,
        text: String,
    },
    Unreadable {
        id: RecordId,
        created_at: DateTime<Utc>,
        reason: String,
    },
}

impl EntryView {
    pub fn id(&self) -> &RecordId {
        match self {
            Self::Readable { id, .. } | Self::Unreadable { id, .. } => id,
        }
    }

    pub fn is_readable(&self) -> bool {
        matches!(self, Self::Readable { .. })
    }
}

pub struct JournalReader {
    codec: Arc<CipherCodec>,
    repository: Arc<dyn JournalRepository>,
}

impl JournalReader {
    pub fn new(codec: Arc<CipherCodec>, repository: Arc<dyn JournalRepository>) -> Self {
        Self { codec, repository }
    }

    /// 最近的 `limit` 条日记，最新的在前
    ///
    /// 仓库错误直接返回；解密错误转换为 `EntryView::Unreadable`。
    /// 设备环境不可用属于整体故障，同样直接返回。
    pub async fn recent(&self, user: &UserId, limit: usize) -> Result<Vec<EntryView>, JournalError> {
        let records = self.repository.recent(user, limit).await?;

        let payloads = records.iter().map(|r| r.payload.clone()).collect();
        let opened = self.codec.open_batch(payloads).await?;

        records
            .into_iter()
            .zip(opened)
            .map(|(record, result)| view(record, result))
            .collect()
    }
}

fn view(record: JournalRecord, result: Result<String, JournalError>) -> Result<EntryView, JournalError> {
    match result {
        Ok(text) => Ok(EntryView::Readable {
            id: record.id,
            created_at: record.created_at,
            text,
        }),
        Err(e @ (JournalError::DecryptionFailed | JournalError::UnsupportedAlgorithm(_))) => {
            warn!(record = %record.id, error = %e, "journal entry unreadable");
            Ok(EntryView::Unreadable {
                id: record.id,
                created_at: record.created_at,
                reason: e.to_string(),
            })
        }
        Err(e) => Err(e),
    }
}
