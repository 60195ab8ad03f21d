//! 批量处理前的口令校验
//!
//! 两种构造的校验方式不对称，且必须保持不对称：
//! - 旧版 CTR：没有任何校验值，只能对一个图片样本试解前 16 字节，
//!   看是否以 JPEG SOI（FF D8 FF）开头。错误口令碰巧命中的概率约 2^-24，
//!   这是旧格式本身的弱点
//! - 容器 GCM：认证解密本身就是校验，没有单独的探测步骤
//!   （见 [`crate::format::container::open_payload`]）

use std::fs::File;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::crypto::kdf::derive_legacy_key;
use crate::entry::EncryptedEntry;
use crate::error::{RecoveryError, Result};
use crate::extension::IMAGE_SAMPLE_EXTENSION;
use crate::format::stream::decrypt_prefix;

/// 试解的字节数
pub const PROBE_LEN: usize = 16;

/// JPEG SOI 标记
pub const JPEG_SOI: [u8; 3] = [0xff, 0xd8, 0xff];

/// 旧版探测结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid,
    /// 没有可用样本，无法判断
    Indeterminate,
}

/// 对样本密文的开头做试解，判断口令是否正确
pub fn validate(password: &str, sample: &[u8]) -> bool {
    let key = derive_legacy_key(password);
    let len = sample.len().min(PROBE_LEN);
    let head = crate::crypto::legacy::decrypt(&key, &sample[..len]);
    head.starts_with(&JPEG_SOI)
}

/// 在候选中找一个图片样本
pub fn find_sample(candidates: &[EncryptedEntry]) -> Option<&EncryptedEntry> {
    candidates
        .iter()
        .find(|e| e.obfuscated_ext == IMAGE_SAMPLE_EXTENSION)
}

/// 读取样本文件开头并试解
pub fn probe_file(password: &str, sample: &Path) -> std::io::Result<bool> {
    let key = derive_legacy_key(password);
    let head = decrypt_prefix(&key, File::open(sample)?, PROBE_LEN)?;
    Ok(head.starts_with(&JPEG_SOI))
}

/// 对一组旧版候选做探测
pub fn probe_legacy(password: &str, candidates: &[EncryptedEntry]) -> std::io::Result<Verdict> {
    let Some(sample) = find_sample(candidates) else {
        return Ok(Verdict::Indeterminate);
    };

    debug!(sample = %sample.path.display(), "probing password");
    Ok(if probe_file(password, &sample.path)? {
        Verdict::Valid
    } else {
        Verdict::Invalid
    })
}

/// 按调用方策略把探测结果转为通过/失败
///
/// `allow_unverified` 为 false 时，无样本即失败（fail closed）。
pub fn check_legacy(
    password: &str,
    candidates: &[EncryptedEntry],
    allow_unverified: bool,
) -> Result<Verdict> {
    match probe_legacy(password, candidates)? {
        Verdict::Valid => {
            info!("password verified against image sample");
            Ok(Verdict::Valid)
        }
        Verdict::Invalid => Err(RecoveryError::WrongPassword),
        Verdict::Indeterminate if allow_unverified => {
            warn!("no image sample available, continuing without password verification");
            Ok(Verdict::Indeterminate)
        }
        Verdict::Indeterminate => Err(RecoveryError::UnverifiedPassword),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::legacy::encrypt;

    fn jpeg_sample(password: &str) -> Vec<u8> {
        let key = derive_legacy_key(password);
        encrypt(&key, b"\xff\xd8\xff\xe0\x00\x10JFIF\x00\x01\x01\x00\x00\x01")
    }

    #[test]
    fn correct_password_validates() {
        assert!(validate("teszt123", &jpeg_sample("teszt123")));
    }

    #[test]
    fn wrong_password_fails() {
        assert!(!validate("rossz_jelszo", &jpeg_sample("teszt123")));
    }

    #[test]
    fn non_jpeg_plaintext_fails() {
        let key = derive_legacy_key("pw");
        let sample = encrypt(&key, b"\x89PNG\r\n\x1a\n0000000");
        assert!(!validate("pw", &sample));
    }
}
