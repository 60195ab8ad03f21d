//! 临时文件写出与不覆盖提交
//!
//! 每个输出文件都先写进同目录下的隐藏临时文件，完整写完后才改名为最终名。
//! 最终名一旦被占用就依次尝试 `_1`、`_2`…，绝不覆盖已有文件。
//!
//! 约束：
//! - 先用 `create_new` 占位再 rename，占位与检查之间没有竞态窗口
//! - [`TempOutput`] 未提交就被 drop 时自动删除临时文件（出错、取消都覆盖到）
//! - 为单个文件补建的目录由 [`CreatedDirs`] 记录，文件失败时回收

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// 同名冲突时最多尝试的后缀数
const MAX_SUFFIX: u32 = 10_000;

/// 临时文件名前缀，用于识别残留
pub const TMP_MARKER: &str = ".tmp-";

/// 正在写出的临时文件
#[derive(Debug)]
pub struct TempOutput {
    path: PathBuf,
    file: Option<File>,
    committed: bool,
}

impl TempOutput {
    /// 在已存在的 `dir` 下创建临时文件
    pub fn create(dir: &Path, base_name: &str) -> io::Result<Self> {
        let path = build_tmp_path(dir, base_name);
        let file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        Ok(Self {
            path,
            file: Some(file),
            committed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_mut(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("temporary output already closed"))
    }

    /// 刷盘并关闭句柄；之后仍可读取 [`Self::path`]
    pub fn finish_writing(&mut self) -> io::Result<()> {
        if let Some(file) = self.file.take() {
            file.sync_all()?;
        }
        Ok(())
    }

    /// 以 `stem + ext` 为目标提交，冲突时追加数字后缀
    ///
    /// #### 返回
    /// 实际落盘的最终路径
    pub fn commit_unique(mut self, dir: &Path, stem: &str, ext: &str) -> io::Result<PathBuf> {
        self.finish_writing()?;

        let target = reserve_unique(dir, stem, ext)?;
        if let Err(err) = fs::rename(&self.path, &target) {
            let _ = fs::remove_file(&target);
            return Err(err);
        }

        self.committed = true;
        debug!(target = %target.display(), "output committed");
        Ok(target)
    }

    /// 放弃输出并删除临时文件
    pub fn discard(mut self) -> io::Result<()> {
        self.file.take();
        self.committed = true;
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl Drop for TempOutput {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        self.file.take();
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove temporary output");
            }
        }
    }
}

/// 本次补建的目录，由深到浅排列
#[derive(Debug, Default)]
pub struct CreatedDirs(Vec<PathBuf>);

impl CreatedDirs {
    /// 确保 `dir` 存在，并记下其中原本不存在的各级目录
    pub fn ensure(dir: &Path) -> io::Result<Self> {
        let missing: Vec<PathBuf> = dir
            .ancestors()
            .take_while(|p| !p.as_os_str().is_empty() && !p.exists())
            .map(Path::to_path_buf)
            .collect();
        fs::create_dir_all(dir)?;
        Ok(Self(missing))
    }

    /// 删除补建的目录；已有内容的目录保留
    pub fn rollback(self) {
        for dir in &self.0 {
            if let Err(e) = fs::remove_dir(dir) {
                debug!(dir = %dir.display(), error = %e, "created directory kept");
                return;
            }
        }
    }
}

/// 第 n 个候选名：0 为原名，其余为 `stem_n`
pub fn candidate_name(stem: &str, ext: &str, n: u32) -> String {
    if n == 0 {
        format!("{stem}{ext}")
    } else {
        format!("{stem}_{n}{ext}")
    }
}

/// 以 `create_new` 占下第一个空闲的候选名
pub fn reserve_unique(dir: &Path, stem: &str, ext: &str) -> io::Result<PathBuf> {
    for n in 0..=MAX_SUFFIX {
        let candidate = dir.join(candidate_name(stem, ext, n));
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free name for {stem}{ext} in {}", dir.display()),
    ))
}

/// 把目录改名为 `parent/label`，被占用时追加数字后缀
pub fn rename_dir_unique(src: &Path, label: &str) -> io::Result<PathBuf> {
    let parent = src.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "directory has no parent")
    })?;

    if src.file_name().and_then(|n| n.to_str()) == Some(label) {
        return Ok(src.to_path_buf());
    }

    for n in 0..=MAX_SUFFIX {
        let candidate = parent.join(candidate_name(label, "", n));
        if candidate.exists() {
            continue;
        }
        fs::rename(src, &candidate)?;
        return Ok(candidate);
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free directory name for {label} in {}", parent.display()),
    ))
}

/// 设置文件修改时间
pub fn set_mtime(path: &Path, time: SystemTime) -> io::Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_modified(time)
}

/// 是否是本模块产生的临时文件名
pub fn is_tmp_name(name: &str) -> bool {
    name.starts_with('.') && name.contains(TMP_MARKER)
}

fn build_tmp_path(parent: &Path, base_name: &str) -> PathBuf {
    let base_name = Some(base_name)
        .filter(|s| !s.is_empty())
        .unwrap_or("pixrecover-output");

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();

    let counter = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);

    parent.join(format!(
        ".{base_name}{TMP_MARKER}{}-{timestamp}-{counter}",
        std::process::id()
    ))
}
