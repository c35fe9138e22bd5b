//! 日记仓库接口
//!
//! 仓库是外部协作方（托管文档库），这里只定义最窄的接口：
//! 按用户追加加密 payload，以及按时间倒序读取最近的记录。
//! 仓库只接触密文，从不接触明文与密钥。

pub mod jsonl;
pub mod memory;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::JournalError;
use crate::payload::EncryptedPayload;

pub use jsonl::JsonlJournalRepository;
pub use memory::MemoryJournalRepository;

/// 默认读取的最近日记条数
pub const DEFAULT_RECENT_LIMIT: usize = 20;

/// 已认证用户的标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 仓库为每条记录分配的标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalRecord {
    pub id: RecordId,
    #[serde(flatten)]
    pub payload: EncryptedPayload,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait JournalRepository: Send + Sync {
    /// 追加一条加密日记
    ///
    /// #### 错误
    /// - 用户未认证：Unauthenticated
    /// - 仓库调用失败：Unavailable
    async fn append(
        &self,
        user: &UserId,
        payload: &EncryptedPayload,
    ) -> Result<RecordId, JournalError>;

    /// 最近的 `limit` 条记录，最新的在前
    async fn recent(&self, user: &UserId, limit: usize) -> Result<Vec<JournalRecord>, JournalError>;
}
