//! 备份容器 AEAD 模块
//!
//! 容器负载使用 AES-256-GCM，tag 与密文在文件中分开存放（detached）。
//!
//! 安全约束：
//! - 解密失败即表示：密码错误 或 数据被篡改
//! - 不允许在未校验通过的情况下输出任何明文
//! - 封装（seal）每次必须使用全新的随机 nonce

use aes_gcm::{
    Aes256Gcm, Key, Nonce, Tag,
    aead::{AeadCore, AeadInPlace, KeyInit, OsRng},
};
use zeroize::Zeroize;

use crate::error::{RecoveryError, Result};

/// AES-GCM nonce 长度（96 bit）
pub const NONCE_LEN: usize = 12;

/// GCM 认证标签长度
pub const TAG_LEN: usize = 16;

/// 封装结果
pub struct SealedPayload {
    pub nonce: [u8; NONCE_LEN],
    pub tag: [u8; TAG_LEN],
    pub ciphertext: Vec<u8>,
}

/// 校验 tag 并解密
///
/// #### 错误
/// - 认证失败返回 AuthenticationFailed，已解出的缓冲区会被清零丢弃
pub fn open_detached(
    key_bytes: &[u8; 32],
    nonce: &[u8; NONCE_LEN],
    tag: &[u8; TAG_LEN],
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key_bytes));

    let mut buffer = ciphertext.to_vec();
    let outcome = cipher.decrypt_in_place_detached(
        Nonce::from_slice(nonce),
        b"",
        &mut buffer,
        Tag::from_slice(tag),
    );

    if outcome.is_err() {
        buffer.zeroize();
        return Err(RecoveryError::AuthenticationFailed);
    }

    Ok(buffer)
}

/// 使用随机 nonce 加密并返回 detached tag
pub fn seal_detached(key_bytes: &[u8; 32], plaintext: &[u8]) -> Result<SealedPayload> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key_bytes));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(&nonce, b"", &mut buffer)
        .map_err(|_| RecoveryError::Configuration("AES-GCM seal failed".into()))?;

    Ok(SealedPayload {
        nonce: nonce.into(),
        tag: tag.into(),
        ciphertext: buffer,
    })
}
