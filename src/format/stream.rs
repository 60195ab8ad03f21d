//! 旧版单文件流式解密
//!
//! 旧版格式没有任何头部：整个文件都是 AES-128-CTR 密文，
//! 扩展名承担全部格式提示。
//!
//! 职责范围：
//! - 按固定大小分块读取密文，用同一个密钥流连续解密后写出
//! - 顺带保留明文开头若干字节，供魔数识别使用
//!
//! 设计前提与约束：
//! - 每个文件构造新的 StreamDecryptor（即新的计数器状态）
//! - 本模块不负责临时文件、命名或时间戳

use std::io::{Read, Write};

use crate::crypto::kdf::LEGACY_KEY_LEN;
use crate::crypto::legacy::LegacyCipher;

// 推荐的默认 chunk 大小：64 KiB
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// 保留给魔数识别的明文前缀长度
pub const HEAD_LEN: usize = 64;

/// 单个文件的解密结果概要
#[derive(Debug, Clone, Default)]
pub struct StreamSummary {
    pub bytes: u64,
    pub head: Vec<u8>,
}

/// 流式解密器
pub struct StreamDecryptor {
    cipher: LegacyCipher,
    chunk_size: usize,
}

impl StreamDecryptor {
    pub fn new(key: &[u8; LEGACY_KEY_LEN]) -> Self {
        Self::with_chunk_size(key, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(key: &[u8; LEGACY_KEY_LEN], chunk_size: usize) -> Self {
        Self {
            cipher: LegacyCipher::new(key),
            chunk_size: chunk_size.max(1),
        }
    }

    /// 从 reader 读取密文，解密后写入 writer
    pub fn decrypt<R: Read, W: Write>(
        mut self,
        mut reader: R,
        mut writer: W,
    ) -> std::io::Result<StreamSummary> {
        let mut buffer = vec![0u8; self.chunk_size];
        let mut summary = StreamSummary::default();

        loop {
            let read_len = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            let chunk = &mut buffer[..read_len];
            self.cipher.apply(chunk);

            if summary.head.len() < HEAD_LEN {
                let take = (HEAD_LEN - summary.head.len()).min(chunk.len());
                summary.head.extend_from_slice(&chunk[..take]);
            }

            writer.write_all(chunk)?;
            summary.bytes += read_len as u64;
        }

        Ok(summary)
    }
}

/// 只解密前 `len` 字节（口令探测用）
pub fn decrypt_prefix<R: Read>(
    key: &[u8; LEGACY_KEY_LEN],
    reader: R,
    len: usize,
) -> std::io::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(len);
    reader.take(len as u64).read_to_end(&mut head)?;
    LegacyCipher::new(key).apply(&mut head);
    Ok(head)
}
