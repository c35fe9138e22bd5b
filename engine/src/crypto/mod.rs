//! 密钥材料相关工具：系统随机源与 JWK 序列化。

pub mod jwk;
pub mod random;
