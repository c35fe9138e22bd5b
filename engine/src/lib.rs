pub mod algorithm;
pub mod autosave;
pub mod codec;
pub mod crypto;
pub mod error;
pub mod fs;
pub mod journal;
pub mod key_store;
pub mod payload;
pub mod repository;

pub use algorithm::CipherAlgorithm;
pub use autosave::{AutosaveConfig, AutosaveController, AutosaveState, SaveStatus, SessionEvent};
pub use codec::CipherCodec;
pub use error::JournalError;
pub use journal::{EntryView, JournalReader};
pub use key_store::{DeviceKey, DeviceKeyStore, FileStorage, KeyOrigin, KeyStorage, MemoryStorage};
pub use payload::EncryptedPayload;
pub use repository::{
    JournalRecord, JournalRepository, JsonlJournalRepository, MemoryJournalRepository, RecordId,
    UserId,
};

use std::path::Path;
use std::sync::Arc;

/// 以目录作为存储域打开设备密钥，返回可直接使用的 CipherCodec
pub fn open_codec(key_dir: &Path) -> Result<CipherCodec, JournalError> {
    let storage = FileStorage::open(key_dir)?;
    Ok(CipherCodec::new(Arc::new(DeviceKeyStore::new(storage))))
}
