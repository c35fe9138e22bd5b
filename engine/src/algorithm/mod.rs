//! 日记加密算法模块。
//!
//! 统一管理算法与算法标识（写入 payload 的 `alg` 字段），
//! 具体实现见子模块。解密时必须按标识分派，
//! 以便将来引入新方案时旧 payload 仍可读取。

pub mod aes_256_gcm;

use crate::error::JournalError;

/// 支持的 AEAD 算法。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherAlgorithm {
    Aes256Gcm,
}

impl CipherAlgorithm {
    pub const AES_256_GCM_TAG: &'static str = "AES-GCM-256";

    pub fn as_tag(self) -> &'static str {
        match self {
            Self::Aes256Gcm => Self::AES_256_GCM_TAG,
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, JournalError> {
        match tag {
            Self::AES_256_GCM_TAG => Ok(Self::Aes256Gcm),
            other => Err(JournalError::UnsupportedAlgorithm(other.to_owned())),
        }
    }
}

/// 默认算法：AES-256-GCM。
pub const DEFAULT_ALGORITHM: CipherAlgorithm = CipherAlgorithm::Aes256Gcm;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_is_stable() {
        assert_eq!(DEFAULT_ALGORITHM.as_tag(), "AES-GCM-256");
        assert_eq!(
            CipherAlgorithm::from_tag("AES-GCM-256").unwrap(),
            CipherAlgorithm::Aes256Gcm
        );
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = CipherAlgorithm::from_tag("XCHACHA20").unwrap_err();
        assert!(matches!(err, JournalError::UnsupportedAlgorithm(tag) if tag == "XCHACHA20"));
    }
}
