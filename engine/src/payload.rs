use serde::{Deserialize, Serialize};

/// 一次日记保存产生的加密结果，原样写入日记仓库
///
/// - `ciphertext`：base64(密文 || 16 字节认证标签)
/// - `iv`：base64(12 字节随机 nonce)
/// - `alg`：算法标识，解密时据此分派
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    pub ciphertext: String,
    pub iv: String,
    pub alg: String,
}
