use thiserror::Error;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 缺少随机数源或持久化存储，本功能整体不可用
    #[error("encryption environment unavailable: {0}")]
    EnvironmentUnavailable(String),

    /// 密钥错误、密文或 IV 被篡改
    #[error("journal entry could not be decrypted")]
    DecryptionFailed,

    #[error("unsupported cipher algorithm `{0}`")]
    UnsupportedAlgorithm(String),

    #[error("no authenticated user")]
    Unauthenticated,

    #[error("journal repository unavailable: {0}")]
    Unavailable(String),

    #[error("internal error")]
    Internal,
}
