//! 待处理的加密条目与目录枚举
//!
//! - 平铺模式：只看输入目录第一层，按已知混淆扩展名过滤
//! - 容器模式：递归遍历解包后的加密子树，所有普通文件都是候选

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::extension;

/// 一个加密输入文件；枚举后只读，被流水线消费一次
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEntry {
    pub path: PathBuf,
    /// 小写、带点；没有扩展名时为空串
    pub obfuscated_ext: String,
    /// 去掉扩展名后的文件名；容器模式下即内容 id
    pub stem: String,
    pub len: u64,
}

impl EncryptedEntry {
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let len = path.metadata()?.len();

        let obfuscated_ext = path
            .extension()
            .and_then(OsStr::to_str)
            .map(extension::normalize)
            .unwrap_or_default();

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            path: path.to_path_buf(),
            obfuscated_ext,
            stem,
            len,
        })
    }

    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// 平铺模式枚举，结果按文件名排序
pub fn scan_flat(input_dir: &Path) -> io::Result<Vec<EncryptedEntry>> {
    if !input_dir.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a directory", input_dir.display()),
        ));
    }

    let mut entries = Vec::new();
    for dirent in std::fs::read_dir(input_dir)? {
        let dirent = dirent?;
        if !dirent.file_type()?.is_file() {
            continue;
        }

        let entry = EncryptedEntry::from_path(&dirent.path())?;
        if extension::is_known(&entry.obfuscated_ext) {
            entries.push(entry);
        } else {
            debug!(path = %entry.path.display(), "skipping unsupported file");
        }
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

/// 容器模式枚举：递归遍历，结果按路径排序
pub fn scan_tree(root: &Path) -> io::Result<Vec<EncryptedEntry>> {
    let mut entries = Vec::new();

    for dirent in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let dirent = dirent.map_err(walkdir_to_io)?;
        if dirent.file_type().is_file() {
            entries.push(EncryptedEntry::from_path(dirent.path())?);
        }
    }

    Ok(entries)
}

fn walkdir_to_io(err: walkdir::Error) -> io::Error {
    io::Error::other(err.to_string())
}
