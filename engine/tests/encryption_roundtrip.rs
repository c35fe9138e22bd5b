use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use tempfile::tempdir;

use journal_engine::{
    CipherCodec, DeviceKeyStore, EncryptedPayload, JournalError, JournalRepository,
    MemoryJournalRepository, MemoryStorage, UserId,
};

fn memory_codec() -> CipherCodec {
    CipherCodec::new(Arc::new(DeviceKeyStore::new(MemoryStorage::new())))
}

fn flip_first_byte(b64: &str) -> String {
    let mut bytes = STANDARD.decode(b64).expect("decode base64");
    bytes[0] ^= 0x01;
    STANDARD.encode(bytes)
}

#[test]
fn encrypt_decrypt_roundtrip() {
    // 同一把设备密钥下，加密后再解密必须还原原文
    let codec = memory_codec();
    let long = "x".repeat(10_000);

    for plaintext in ["", "a", "Today was good.", "多字节文本 ✔ with émojis 🌱", long.as_str()] {
        let payload = codec.encrypt(plaintext).expect("encrypt");
        assert_eq!(codec.decrypt(&payload).expect("decrypt"), plaintext);
    }
}

#[test]
fn payload_format_contract() {
    let codec = memory_codec();
    let payload = codec.encrypt("hello").expect("encrypt");

    assert_eq!(payload.alg, "AES-GCM-256");
    assert_eq!(STANDARD.decode(&payload.iv).expect("iv").len(), 12);
    // 5 字节明文 + 16 字节认证标签
    assert_eq!(STANDARD.decode(&payload.ciphertext).expect("ciphertext").len(), 5 + 16);
}

#[test]
fn every_encryption_uses_a_fresh_iv() {
    let codec = memory_codec();

    let first = codec.encrypt("same text").expect("encrypt first");
    let second = codec.encrypt("same text").expect("encrypt second");

    assert_ne!(first.iv, second.iv);
    assert_ne!(first.ciphertext, second.ciphertext);
}

#[test]
fn tampered_ciphertext_fails() {
    let codec = memory_codec();
    let mut payload = codec.encrypt("secret thoughts").expect("encrypt");
    payload.ciphertext = flip_first_byte(&payload.ciphertext);

    let result = codec.decrypt(&payload);
    assert!(matches!(result, Err(JournalError::DecryptionFailed)));
}

#[test]
fn tampered_iv_fails() {
    let codec = memory_codec();
    let mut payload = codec.encrypt("secret thoughts").expect("encrypt");
    payload.iv = flip_first_byte(&payload.iv);

    let result = codec.decrypt(&payload);
    assert!(matches!(result, Err(JournalError::DecryptionFailed)));
}

#[test]
fn malformed_payload_fails() {
    let codec = memory_codec();
    let good = codec.encrypt("x").expect("encrypt");

    let bad_base64 = EncryptedPayload {
        ciphertext: "***".to_owned(),
        ..good.clone()
    };
    assert!(matches!(
        codec.decrypt(&bad_base64),
        Err(JournalError::DecryptionFailed)
    ));

    let short_iv = EncryptedPayload {
        iv: STANDARD.encode([0u8; 8]),
        ..good.clone()
    };
    assert!(matches!(
        codec.decrypt(&short_iv),
        Err(JournalError::DecryptionFailed)
    ));

    let unknown_alg = EncryptedPayload {
        alg: "ROT13".to_owned(),
        ..good
    };
    assert!(matches!(
        codec.decrypt(&unknown_alg),
        Err(JournalError::UnsupportedAlgorithm(_))
    ));
}

#[test]
fn decrypt_with_another_device_key_fails() {
    // 另一台设备（另一个存储域）的密钥无法解密
    let payload = memory_codec().encrypt("private").expect("encrypt");

    let result = memory_codec().decrypt(&payload);
    assert!(matches!(result, Err(JournalError::DecryptionFailed)));
}

#[test]
fn key_survives_reopening_the_storage_directory() {
    let temp_dir = tempdir().expect("create temp dir");
    let key_dir = temp_dir.path().join("keys");

    let payload = journal_engine::open_codec(&key_dir)
        .expect("open codec")
        .encrypt("written before restart")
        .expect("encrypt");

    let reopened = journal_engine::open_codec(&key_dir).expect("reopen codec");
    assert_eq!(
        reopened.decrypt(&payload).expect("decrypt"),
        "written before restart"
    );
}

#[tokio::test]
async fn end_to_end_through_repository() {
    // 加密 → 写入仓库 → 读出 → 解密，结果与原文一致，算法标识不变
    let codec = memory_codec();
    let repository = MemoryJournalRepository::new();
    let user = UserId::new("user-1");

    let payload = codec.encrypt("Today was good.").expect("encrypt");
    repository.append(&user, &payload).await.expect("append");

    let records = repository.recent(&user, 20).await.expect("recent");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].payload.alg, "AES-GCM-256");
    assert_eq!(records[0].payload, payload);
    assert_eq!(
        codec.decrypt(&records[0].payload).expect("decrypt"),
        "Today was good."
    );
}
