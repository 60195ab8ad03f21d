//! 旧版单文件加密：AES-128-CTR，IV = key
//!
//! 计数器为 128 bit 大端整数，初始值即 key 本身。
//! 每个文件必须使用全新的 cipher 实例；跨文件复用会导致密钥流错位。

use aes::Aes128;
use ctr::Ctr128BE;
use ctr::cipher::{KeyIvInit, StreamCipher, generic_array::GenericArray};

use crate::crypto::kdf::LEGACY_KEY_LEN;
use crate::error::{RecoveryError, Result};

type Aes128Ctr = Ctr128BE<Aes128>;

/// 单个文件的 CTR 密钥流状态
pub struct LegacyCipher {
    inner: Aes128Ctr,
}

impl LegacyCipher {
    /// 以固定 IV（= key）创建新的密钥流
    pub fn new(key: &[u8; LEGACY_KEY_LEN]) -> Self {
        Self {
            inner: Aes128Ctr::new(GenericArray::from_slice(key), GenericArray::from_slice(key)),
        }
    }

    /// 从任意长度切片创建；长度不是 16 字节时返回 ConfigurationError
    pub fn from_slice(key: &[u8]) -> Result<Self> {
        let key: &[u8; LEGACY_KEY_LEN] = key.try_into().map_err(|_| {
            RecoveryError::Configuration(format!(
                "legacy key must be {LEGACY_KEY_LEN} bytes, got {}",
                key.len()
            ))
        })?;
        Ok(Self::new(key))
    }

    /// 原地加/解密（CTR 对称）
    pub fn apply(&mut self, buf: &mut [u8]) {
        self.inner.apply_keystream(buf);
    }
}

/// 一次性解密整段数据
pub fn decrypt(key: &[u8; LEGACY_KEY_LEN], ciphertext: &[u8]) -> Vec<u8> {
    let mut out = ciphertext.to_vec();
    LegacyCipher::new(key).apply(&mut out);
    out
}

/// 加密与解密是同一操作，单独命名只为调用处语义清晰
pub fn encrypt(key: &[u8; LEGACY_KEY_LEN], plaintext: &[u8]) -> Vec<u8> {
    decrypt(key, plaintext)
}
