//! 加密构造
//!
//! 仅实现导出兼容所需的两种构造，见 [`CipherVariant`]。

pub mod aead;
pub mod kdf;
pub mod legacy;

use zeroize::Zeroizing;

use crate::error::{RecoveryError, Result};

/// 容器 salt 允许的长度
pub const CONTAINER_SALT_LENS: [usize; 2] = [16, 32];

/// 备份容器的 scrypt + AES-256-GCM 参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScryptGcmParams {
    pub salt: Vec<u8>,
    pub nonce: [u8; aead::NONCE_LEN],
    pub tag: [u8; aead::TAG_LEN],
    pub cost_log2: u8,
}

/// 支持的加密构造
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CipherVariant {
    /// SHA-1 截断密钥 + AES-128-CTR，IV = key
    LegacyCtr,
    /// scrypt 派生密钥 + AES-256-GCM（带认证）
    ScryptGcm(ScryptGcmParams),
}

impl CipherVariant {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LegacyCtr => "legacy-ctr",
            Self::ScryptGcm(_) => "scrypt-gcm",
        }
    }
}

/// 根据构造派生密钥
pub fn derive_key(password: &str, variant: &CipherVariant) -> Result<Zeroizing<Vec<u8>>> {
    match variant {
        CipherVariant::LegacyCtr => {
            let key = kdf::derive_legacy_key(password);
            Ok(Zeroizing::new(key.to_vec()))
        }
        CipherVariant::ScryptGcm(params) => {
            if !CONTAINER_SALT_LENS.contains(&params.salt.len()) {
                return Err(RecoveryError::Configuration(format!(
                    "unsupported salt length {}",
                    params.salt.len()
                )));
            }
            let key = kdf::derive_container_key(password, &params.salt, params.cost_log2)?;
            Ok(Zeroizing::new(key.to_vec()))
        }
    }
}

/// 使用已派生的密钥解密
///
/// #### 错误
/// - 密钥长度与构造不符：ConfigurationError
/// - GCM 认证失败：AuthenticationFailed（不返回任何明文）
pub fn decrypt(key: &[u8], variant: &CipherVariant, ciphertext: &[u8]) -> Result<Vec<u8>> {
    match variant {
        CipherVariant::LegacyCtr => {
            let mut out = ciphertext.to_vec();
            legacy::LegacyCipher::from_slice(key)?.apply(&mut out);
            Ok(out)
        }
        CipherVariant::ScryptGcm(params) => {
            let key: &[u8; kdf::CONTAINER_KEY_LEN] = key.try_into().map_err(|_| {
                RecoveryError::Configuration(format!(
                    "container key must be {} bytes, got {}",
                    kdf::CONTAINER_KEY_LEN,
                    key.len()
                ))
            })?;
            aead::open_detached(key, &params.nonce, &params.tag, ciphertext)
        }
    }
}
