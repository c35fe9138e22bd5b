//! 设备密钥存储
//!
//! 每个存储域（浏览器 origin / 数据目录）只持有一把对称密钥：
//! - 不存在时生成并持久化，再返回
//! - 存在且可解析时直接导入
//! - 存在但无法解析时重新生成（旧密文将无法解密，不可恢复）
//!
//! 重新生成不会作为错误返回，但会留下 warn 日志，
//! 并通过 `take_regeneration_notice` 交给界面提示一次。

pub mod file;
pub mod memory;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::algorithm::aes_256_gcm::KEY_SIZE;
use crate::crypto::{jwk, random};
use crate::error::JournalError;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// 设备密钥在存储中的固定标识
pub const DEVICE_KEY_ID: &str = "youmatter_device_key_jwk";

/// 持久化键值存储
pub trait KeyStorage: Send + Sync {
    fn load(&self, id: &str) -> Result<Option<String>, JournalError>;

    fn store(&self, id: &str, value: &str) -> Result<(), JournalError>;
}

impl<T: KeyStorage + ?Sized> KeyStorage for Arc<T> {
    fn load(&self, id: &str) -> Result<Option<String>, JournalError> {
        (**self).load(id)
    }

    fn store(&self, id: &str, value: &str) -> Result<(), JournalError> {
        (**self).store(id, value)
    }
}

/// 256 bit 设备密钥，离开作用域后自动清零
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceKey(Zeroizing<[u8; KEY_SIZE]>);

impl DeviceKey {
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DeviceKey(..)")
    }
}

/// 本次取得的密钥来自哪里
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOrigin {
    Loaded,
    Created,
    Regenerated { reason: String },
}

#[derive(Debug)]
pub struct KeyProvision {
    pub key: DeviceKey,
    pub origin: KeyOrigin,
}

pub struct DeviceKeyStore {
    storage: Box<dyn KeyStorage>,
    provisioning: Mutex<()>,
    regeneration_notice: Mutex<Option<String>>,
}

impl DeviceKeyStore {
    pub fn new(storage: impl KeyStorage + 'static) -> Self {
        Self {
            storage: Box::new(storage),
            provisioning: Mutex::new(()),
            regeneration_notice: Mutex::new(None),
        }
    }

    /// 取得设备密钥，必要时生成并持久化
    pub fn get_or_create_key(&self) -> Result<DeviceKey, JournalError> {
        Ok(self.provision()?.key)
    }

    /// 同 `get_or_create_key`，并报告密钥来源
    ///
    /// #### 错误
    /// - 随机源或存储不可用时返回 EnvironmentUnavailable
    /// - 存储读写失败时返回 Io
    pub fn provision(&self) -> Result<KeyProvision, JournalError> {
        // 检查与写入在同一把锁内完成，保证一个存储域只会生成一把密钥
        let _guard = self
            .provisioning
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let unusable = match self.storage.load(DEVICE_KEY_ID)? {
            Some(text) => match jwk::import(&text) {
                Ok(key) => {
                    return Ok(KeyProvision {
                        key: DeviceKey(key),
                        origin: KeyOrigin::Loaded,
                    });
                }
                Err(e) => Some(e.to_string()),
            },
            None => None,
        };

        let key = random::key_material()?;
        let exported = Zeroizing::new(jwk::export(&key)?);
        self.storage.store(DEVICE_KEY_ID, &exported)?;

        let origin = match unusable {
            Some(reason) => {
                warn!(
                    %reason,
                    "stored device key unusable, generated a new one; entries sealed with the old key are lost"
                );
                *self
                    .regeneration_notice
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(reason.clone());
                KeyOrigin::Regenerated { reason }
            }
            None => {
                info!("device key created");
                KeyOrigin::Created
            }
        };

        Ok(KeyProvision {
            key: DeviceKey(key),
            origin,
        })
    }

    /// 取出最近一次重新生成密钥的原因，每次重新生成只返回一次
    pub fn take_regeneration_notice(&self) -> Option<String> {
        self.regeneration_notice
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl fmt::Debug for DeviceKeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceKeyStore").finish_non_exhaustive()
    }
}
