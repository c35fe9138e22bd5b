//! 日记文本的加密 / 解密
//!
//! 加密流程（严格顺序）：
//! 1. 从 DeviceKeyStore 取得设备密钥（必要时生成）
//! 2. 生成全新的 96 bit IV
//! 3. AES-256-GCM 加密 UTF-8 明文
//! 4. 密文与 IV 以 base64 文本输出，附带算法标识
//!
//! 解密失败（密钥不符、密文或 IV 被篡改）一律返回 DecryptionFailed，
//! 由调用方决定如何展示，本模块不吞掉错误。
//!
//! 取密钥会读写密钥存储（可能是磁盘文件），异步调用方应使用
//! `seal_text` / `open_text` / `open_batch`，它们在 tokio 的阻塞线程池中执行。

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use tokio::task;
use tracing::error;
use zeroize::Zeroizing;

use crate::algorithm::aes_256_gcm::{self, NONCE_SIZE};
use crate::algorithm::{CipherAlgorithm, DEFAULT_ALGORITHM};
use crate::crypto::random;
use crate::error::JournalError;
use crate::key_store::{DeviceKey, DeviceKeyStore};
use crate::payload::EncryptedPayload;

#[derive(Debug, Clone)]
pub struct CipherCodec {
    keys: Arc<DeviceKeyStore>,
    algorithm: CipherAlgorithm,
}

impl CipherCodec {
    pub fn new(keys: Arc<DeviceKeyStore>) -> Self {
        Self {
            keys,
            algorithm: DEFAULT_ALGORITHM,
        }
    }

    pub fn key_store(&self) -> &DeviceKeyStore {
        &self.keys
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptedPayload, JournalError> {
        let key = self.keys.get_or_create_key()?;
        let nonce = random::nonce()?;

        let ciphertext = match self.algorithm {
            CipherAlgorithm::Aes256Gcm => {
                aes_256_gcm::seal(key.as_bytes(), &nonce, plaintext.as_bytes())?
            }
        };

        Ok(EncryptedPayload {
            ciphertext: STANDARD.encode(ciphertext),
            iv: STANDARD.encode(nonce),
            alg: self.algorithm.as_tag().to_owned(),
        })
    }

    pub fn decrypt(&self, payload: &EncryptedPayload) -> Result<String, JournalError> {
        CipherAlgorithm::from_tag(&payload.alg)?;
        let key = self.keys.get_or_create_key()?;
        self.decrypt_with(&key, payload)
    }

    /// 在阻塞线程池中加密
    pub async fn seal_text(self: &Arc<Self>, plaintext: &str) -> Result<EncryptedPayload, JournalError> {
        let codec = Arc::clone(self);
        let plaintext = Zeroizing::new(plaintext.to_owned());

        offload(move || codec.encrypt(&plaintext)).await?
    }

    /// 在阻塞线程池中解密单条记录
    pub async fn open_text(self: &Arc<Self>, payload: EncryptedPayload) -> Result<String, JournalError> {
        let codec = Arc::clone(self);

        offload(move || codec.decrypt(&payload)).await?
    }

    /// 在阻塞线程池中批量解密，整批只取一次设备密钥
    ///
    /// 外层错误表示取密钥失败（整体故障）；内层是每条记录各自的结果。
    pub async fn open_batch(
        self: &Arc<Self>,
        payloads: Vec<EncryptedPayload>,
    ) -> Result<Vec<Result<String, JournalError>>, JournalError> {
        if payloads.is_empty() {
            return Ok(Vec::new());
        }

        let codec = Arc::clone(self);

        offload(move || {
            let key = codec.keys.get_or_create_key()?;
            Ok(payloads
                .iter()
                .map(|payload| codec.decrypt_with(&key, payload))
                .collect())
        })
        .await?
    }

    fn decrypt_with(
        &self,
        key: &DeviceKey,
        payload: &EncryptedPayload,
    ) -> Result<String, JournalError> {
        let algorithm = CipherAlgorithm::from_tag(&payload.alg)?;

        let nonce: [u8; NONCE_SIZE] = STANDARD
            .decode(&payload.iv)
            .map_err(|_| JournalError::DecryptionFailed)?
            .try_into()
            .map_err(|_| JournalError::DecryptionFailed)?;

        let ciphertext = STANDARD
            .decode(&payload.ciphertext)
            .map_err(|_| JournalError::DecryptionFailed)?;

        let plaintext = match algorithm {
            CipherAlgorithm::Aes256Gcm => aes_256_gcm::open(key.as_bytes(), &nonce, &ciphertext)?,
        };

        String::from_utf8(plaintext).map_err(|_| JournalError::DecryptionFailed)
    }
}

async fn offload<T, F>(f: F) -> Result<T, JournalError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f).await.map_err(|e| {
        error!(error = %e, "cipher task failed");
        JournalError::Internal
    })
}
