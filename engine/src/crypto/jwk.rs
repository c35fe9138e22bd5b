//! 设备密钥的 JWK（JSON Web Key）序列化
//!
//! 持久化格式与浏览器 WebCrypto `exportKey("jwk")` 的输出保持一致：
//!
//! ```json
//! {"kty":"oct","k":"<base64url>","alg":"A256GCM","ext":true,"key_ops":["encrypt","decrypt"]}
//! ```
//!
//! 解析失败不会作为错误向上抛出，而是返回原因，
//! 由 key_store 决定是否重新生成密钥。

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::algorithm::aes_256_gcm::KEY_SIZE;
use crate::error::JournalError;

pub const KEY_TYPE: &str = "oct";
pub const ALGORITHM: &str = "A256GCM";

#[derive(Debug, Serialize, Deserialize)]
struct Jwk {
    kty: String,
    k: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    alg: Option<String>,
    #[serde(default)]
    ext: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    key_ops: Vec<String>,
}

/// 存储中的 JWK 无法使用的原因
#[derive(Debug, Error)]
pub enum JwkError {
    #[error("stored key is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected key type `{0}`")]
    KeyType(String),

    #[error("unexpected key algorithm `{0}`")]
    Algorithm(String),

    #[error("key material is not base64url")]
    Encoding,

    #[error("key material has {0} bytes, expected 32")]
    Length(usize),
}

/// 将原始密钥导出为 JWK 文本
pub fn export(key: &[u8; KEY_SIZE]) -> Result<String, JournalError> {
    let jwk = Jwk {
        kty: KEY_TYPE.to_owned(),
        k: URL_SAFE_NO_PAD.encode(key),
        alg: Some(ALGORITHM.to_owned()),
        ext: true,
        key_ops: vec!["encrypt".to_owned(), "decrypt".to_owned()],
    };

    serde_json::to_string(&jwk).map_err(|_| JournalError::Internal)
}

/// 从 JWK 文本导入原始密钥
pub fn import(text: &str) -> Result<Zeroizing<[u8; KEY_SIZE]>, JwkError> {
    let jwk: Jwk = serde_json::from_str(text)?;

    if jwk.kty != KEY_TYPE {
        return Err(JwkError::KeyType(jwk.kty));
    }

    if let Some(alg) = jwk.alg {
        if alg != ALGORITHM {
            return Err(JwkError::Algorithm(alg));
        }
    }

    let bytes = Zeroizing::new(
        URL_SAFE_NO_PAD
            .decode(jwk.k.trim_end_matches('='))
            .map_err(|_| JwkError::Encoding)?,
    );

    if bytes.len() != KEY_SIZE {
        return Err(JwkError::Length(bytes.len()));
    }

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    key.copy_from_slice(&bytes);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_then_import_restores_key() {
        let key = [42u8; KEY_SIZE];
        let text = export(&key).unwrap();

        assert!(text.contains("\"kty\":\"oct\""));
        assert!(text.contains("\"alg\":\"A256GCM\""));
        assert_eq!(*import(&text).unwrap(), key);
    }

    #[test]
    fn accepts_browser_exported_key() {
        // WebCrypto 导出的 JWK 字段顺序不同，且 key_ops 可能缺失
        let text = r#"{"alg":"A256GCM","ext":true,"k":"AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA","kty":"oct"}"#;
        assert_eq!(*import(text).unwrap(), [0u8; KEY_SIZE]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(import("not json"), Err(JwkError::Json(_))));
        assert!(matches!(
            import(r#"{"kty":"RSA","k":"AAAA"}"#),
            Err(JwkError::KeyType(_))
        ));
        assert!(matches!(
            import(r#"{"kty":"oct","k":"AAAA"}"#),
            Err(JwkError::Length(3))
        ));
        assert!(matches!(
            import(r#"{"kty":"oct","k":"!!!"}"#),
            Err(JwkError::Encoding)
        ));
    }
}
