//! 系统随机源
//!
//! 所有 IV 与设备密钥都来自 OsRng。
//! 随机源不可用时视为运行环境不满足，返回 EnvironmentUnavailable。

use rand::{RngCore, rngs::OsRng};
use zeroize::Zeroizing;

use crate::algorithm::aes_256_gcm::{KEY_SIZE, NONCE_SIZE};
use crate::error::JournalError;

pub fn fill(buf: &mut [u8]) -> Result<(), JournalError> {
    OsRng.try_fill_bytes(buf).map_err(|e| {
        JournalError::EnvironmentUnavailable(format!("system random source failed: {e}"))
    })
}

/// 生成全新的 96 bit nonce，每次加密调用一次
pub fn nonce() -> Result<[u8; NONCE_SIZE], JournalError> {
    let mut nonce = [0u8; NONCE_SIZE];
    fill(&mut nonce)?;
    Ok(nonce)
}

/// 生成 256 bit 密钥（自动 zeroize）
pub fn key_material() -> Result<Zeroizing<[u8; KEY_SIZE]>, JournalError> {
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    fill(&mut key[..])?;
    Ok(key)
}
