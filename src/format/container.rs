//! 备份容器外层格式
//!
//! 布局为纯位置式，没有 magic 与长度前缀：
//!
//! salt (16 或 32) | nonce (12) | tag (16) | ciphertext (其余全部)
//!
//! 两个已知版本：
//! - V1：16 字节 salt，scrypt N = 2^14
//! - V2：32 字节 salt，scrypt N = 2^18
//!
//! 文件中没有版本标识，只能按顺序试解；GCM tag 校验通过即确定版本与密码。

use std::io::{Read, Write};

use rand::{RngCore, rngs::OsRng};
use tracing::debug;

use crate::crypto::aead::{self, NONCE_LEN, TAG_LEN};
use crate::crypto::{self, CipherVariant, ScryptGcmParams};
use crate::error::{RecoveryError, Result};

/// 容器版本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    V1,
    V2,
}

impl ContainerFormat {
    /// 试解顺序：先便宜的 V1
    pub const ALL: [ContainerFormat; 2] = [ContainerFormat::V1, ContainerFormat::V2];

    pub fn salt_len(self) -> usize {
        match self {
            Self::V1 => 16,
            Self::V2 => 32,
        }
    }

    pub fn cost_log2(self) -> u8 {
        match self {
            Self::V1 => 14,
            Self::V2 => 18,
        }
    }

    /// 头部总长度
    pub fn header_len(self) -> usize {
        self.salt_len() + NONCE_LEN + TAG_LEN
    }
}

/// 容器头
#[derive(Debug, Clone)]
pub struct ContainerHeader {
    pub format: ContainerFormat,
    pub salt: Vec<u8>,
    pub nonce: [u8; NONCE_LEN],
    pub tag: [u8; TAG_LEN],
}

impl ContainerHeader {
    /// 按指定版本从输入流读取头部
    pub fn read<R: Read>(mut reader: R, format: ContainerFormat) -> std::io::Result<Self> {
        let mut salt = vec![0u8; format.salt_len()];
        reader.read_exact(&mut salt)?;

        let mut nonce = [0u8; NONCE_LEN];
        reader.read_exact(&mut nonce)?;

        let mut tag = [0u8; TAG_LEN];
        reader.read_exact(&mut tag)?;

        Ok(Self {
            format,
            salt,
            nonce,
            tag,
        })
    }

    /// 写出顺序必须严格为 salt、nonce、tag
    pub fn write<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        writer.write_all(&self.salt)?;
        writer.write_all(&self.nonce)?;
        writer.write_all(&self.tag)?;
        Ok(())
    }

    pub fn variant(&self) -> CipherVariant {
        CipherVariant::ScryptGcm(ScryptGcmParams {
            salt: self.salt.clone(),
            nonce: self.nonce,
            tag: self.tag,
            cost_log2: self.format.cost_log2(),
        })
    }
}

/// 依次按 `formats` 试解整个容器文件内容，返回内层 ZIP 字节
///
/// #### 错误
/// - 数据比任一版本的头部都短：MalformedContainer
/// - 所有版本都认证失败：WrongPassword
pub fn open_payload(
    data: &[u8],
    password: &str,
    formats: &[ContainerFormat],
) -> Result<(ContainerFormat, Vec<u8>)> {
    let mut attempted = false;

    for &format in formats {
        if data.len() < format.header_len() {
            debug!(?format, len = data.len(), "container too short for format");
            continue;
        }
        attempted = true;

        let header = ContainerHeader::read(&data[..format.header_len()], format)?;
        let variant = header.variant();
        let key = crypto::derive_key(password, &variant)?;

        match crypto::decrypt(&key, &variant, &data[format.header_len()..]) {
            Ok(plaintext) => {
                debug!(?format, cipher = variant.name(), "container authenticated");
                return Ok((format, plaintext));
            }
            Err(RecoveryError::AuthenticationFailed) => {
                debug!(?format, "container tag mismatch");
            }
            Err(e) => return Err(e),
        }
    }

    if attempted {
        Err(RecoveryError::WrongPassword)
    } else {
        Err(RecoveryError::MalformedContainer(
            "file is shorter than the container header".into(),
        ))
    }
}

/// 以指定版本封装负载（随机 salt 与 nonce）
pub fn seal_payload(plaintext: &[u8], password: &str, format: ContainerFormat) -> Result<Vec<u8>> {
    let mut salt = vec![0u8; format.salt_len()];
    OsRng.fill_bytes(&mut salt);

    let key = crypto::kdf::derive_container_key(password, &salt, format.cost_log2())?;
    let sealed = aead::seal_detached(&key, plaintext)?;

    let header = ContainerHeader {
        format,
        salt,
        nonce: sealed.nonce,
        tag: sealed.tag,
    };

    let mut out = Vec::with_capacity(format.header_len() + sealed.ciphertext.len());
    header.write(&mut out)?;
    out.extend_from_slice(&sealed.ciphertext);
    Ok(out)
}
