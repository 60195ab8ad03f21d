//! 密钥派生函数（KDF）模块
//!
//! 两种导出格式各自使用一种派生方式：
//! - 旧版单文件：SHA-1(password) 取前 16 字节，同时作为 AES-128 key 与 CTR 初始计数器
//! - 备份容器：scrypt(password, salt, N = 2^14 或 2^18, r = 8, p = 1)，输出 32 字节
//!
//! 两者都不引入随机性：同一密码 + 同一 salt 永远得到同一密钥。
//! 敏感密钥材料在离开作用域后自动清零。

use scrypt::{Params, scrypt};
use sha1::{Digest, Sha1};
use zeroize::Zeroizing;

use crate::error::{RecoveryError, Result};

/// 旧版 CTR 密钥长度（AES-128）
pub const LEGACY_KEY_LEN: usize = 16;

/// 容器 AES-256-GCM 密钥长度
pub const CONTAINER_KEY_LEN: usize = 32;

/// scrypt 块大小 r
pub const SCRYPT_BLOCK_SIZE: u32 = 8;

/// scrypt 并行度 p
pub const SCRYPT_PARALLELISM: u32 = 1;

/// 容器格式允许的 log2(N)
pub const SUPPORTED_COST_LOG2: [u8; 2] = [14, 18];

/// 派生旧版密钥：SHA-1(password 的 UTF-8 字节) 的前 16 字节
pub fn derive_legacy_key(password: &str) -> Zeroizing<[u8; LEGACY_KEY_LEN]> {
    let digest = Sha1::digest(password.as_bytes());

    let mut key = Zeroizing::new([0u8; LEGACY_KEY_LEN]);
    key.copy_from_slice(&digest[..LEGACY_KEY_LEN]);
    key
}

/// 使用 scrypt 派生容器密钥
///
/// #### 错误
/// - `cost_log2` 不在 {14, 18} 内，或 scrypt 参数非法时返回 ConfigurationError
pub fn derive_container_key(
    password: &str,
    salt: &[u8],
    cost_log2: u8,
) -> Result<Zeroizing<[u8; CONTAINER_KEY_LEN]>> {
    if !SUPPORTED_COST_LOG2.contains(&cost_log2) {
        return Err(RecoveryError::Configuration(format!(
            "unsupported scrypt cost 2^{cost_log2}"
        )));
    }

    let params = Params::new(
        cost_log2,
        SCRYPT_BLOCK_SIZE,
        SCRYPT_PARALLELISM,
        CONTAINER_KEY_LEN,
    )
    .map_err(|e| RecoveryError::Configuration(format!("invalid scrypt params: {e}")))?;

    let mut key = Zeroizing::new([0u8; CONTAINER_KEY_LEN]);
    scrypt(password.as_bytes(), salt, &params, &mut key[..])
        .map_err(|e| RecoveryError::Configuration(format!("scrypt failed: {e}")))?;

    Ok(key)
}
