//! AES-256-GCM 加解密算法
//!
//! - 解密失败即表示：密钥错误 或 密文 / IV 被篡改
//! - nonce 由调用方提供，每次加密必须全新，严禁复用
//! - 认证未通过前不输出任何明文

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};

use crate::error::JournalError;

/// 96 bit nonce，GCM 标准推荐值
pub const NONCE_SIZE: usize = 12;

/// 256 bit 密钥
pub const KEY_SIZE: usize = 32;

/// GCM 认证标签长度，附加在密文末尾
pub const TAG_SIZE: usize = 16;

pub fn seal(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
) -> Result<Vec<u8>, JournalError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| JournalError::Internal)
}

pub fn open(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
) -> Result<Vec<u8>, JournalError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| JournalError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_output_carries_tag() {
        let key = [7u8; KEY_SIZE];
        let nonce = [1u8; NONCE_SIZE];

        let sealed = seal(&key, &nonce, b"hello").unwrap();
        assert_eq!(sealed.len(), 5 + TAG_SIZE);
        assert_eq!(open(&key, &nonce, &sealed).unwrap(), b"hello");
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let nonce = [1u8; NONCE_SIZE];
        let sealed = seal(&[7u8; KEY_SIZE], &nonce, b"hello").unwrap();

        let result = open(&[8u8; KEY_SIZE], &nonce, &sealed);
        assert!(matches!(result, Err(JournalError::DecryptionFailed)));
    }
}
