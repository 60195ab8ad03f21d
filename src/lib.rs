//! pixrecover：相册保险箱导出文件的解密与还原
//!
//! 支持两种输入：
//! - 平铺导出：目录下逐个 AES-128-CTR 加密、扩展名被混淆的媒体文件
//! - 备份容器：scrypt + AES-256-GCM 封装的 ZIP，内含加密文件树与排序数据库
//!
//! 入口：
//! - [`Engine`]：后台线程运行，事件经 channel 返回，可取消
//! - [`recover`]：在当前线程同步运行，事件交给回调

pub mod container;
pub mod crypto;
pub mod engine;
pub mod entry;
pub mod error;
pub mod events;
pub mod extension;
pub mod format;
pub mod fs;
pub mod media;
pub mod metadata;
pub mod options;
pub mod pipeline;
pub mod sniff;
pub mod timestamp;
pub mod validate;

pub use engine::{Engine, RunHandle};
pub use error::{ErrorKind, RecoveryError, Result};
pub use events::{Event, RunReport, RunState};
pub use format::container::ContainerFormat;
pub use options::RecoveryOptions;

use std::path::Path;
use std::sync::atomic::AtomicBool;

use crypto::kdf::derive_legacy_key;

/// 同步执行一次恢复，不支持取消
pub fn recover(
    password: &str,
    input: &Path,
    output: &Path,
    options: &RecoveryOptions,
    sink: &dyn Fn(Event),
) -> RunReport {
    let never = AtomicBool::new(false);
    pipeline::run(password, input, output, options, sink, &never)
}

/// 以旧版构造加密（CTR 对称，同一口令可用 [`decrypt_legacy`] 还原）
pub fn encrypt_legacy(password: &str, plaintext: &[u8]) -> Vec<u8> {
    crypto::legacy::encrypt(&derive_legacy_key(password), plaintext)
}

pub fn decrypt_legacy(password: &str, ciphertext: &[u8]) -> Vec<u8> {
    crypto::legacy::decrypt(&derive_legacy_key(password), ciphertext)
}

/// 把内层 ZIP 封装为备份容器
pub fn seal_container(zip_bytes: &[u8], password: &str, format: ContainerFormat) -> Result<Vec<u8>> {
    format::container::seal_payload(zip_bytes, password, format)
}

/// 解开备份容器，返回版本与内层 ZIP
pub fn open_container(data: &[u8], password: &str) -> Result<(ContainerFormat, Vec<u8>)> {
    format::container::open_payload(data, password, &ContainerFormat::ALL)
}
