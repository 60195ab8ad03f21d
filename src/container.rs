//! 备份容器解包
//!
//! 流程（严格顺序）：
//! 1. 读入容器文件，按版本试解外层 AES-256-GCM（认证通过即口令正确）
//! 2. 分配独占的临时工作目录
//! 3. 将内层 ZIP 全部解包到该目录，条目路径逐一做越界校验，
//!    并把条目记录的修改时间还原到解出的文件上
//! 4. 在解包根目录定位排序数据库与加密子树
//!
//! 临时目录由 [`ExtractedContainer`] 持有，任何返回路径（成功、出错、取消）
//! 在其 drop 时都会被删除。

use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tempfile::TempDir;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::error::{RecoveryError, Result};
use crate::format::container::{ContainerFormat, open_payload};
use crate::fs::paths::{safe_join, validate_relative_path};
use crate::metadata::METADATA_DB_NAME;
use crate::timestamp::{self, Timestamp};

/// 解包根目录下的加密子树目录名
pub const ENCRYPTED_TREE_DIR: &str = "encrypted";

const WORKDIR_PREFIX: &str = "pixrecover-";

/// 已解包的容器；drop 时删除工作目录
#[derive(Debug)]
pub struct ExtractedContainer {
    _workdir: TempDir,
    pub format: ContainerFormat,
    pub metadata_db: Option<PathBuf>,
    pub encrypted_root: PathBuf,
}

/// 打开并解包容器
///
/// `work_parent` 为 None 时临时目录建在系统临时目录下。
///
/// #### 错误
/// - 口令错误：WrongPassword
/// - 内层不是 ZIP，或缺少加密子树：MalformedContainer
pub fn open(
    container_path: &Path,
    password: &str,
    formats: &[ContainerFormat],
    work_parent: Option<&Path>,
) -> Result<ExtractedContainer> {
    let data = fs::read(container_path)?;
    let (format, zip_bytes) = open_payload(&data, password, formats)?;
    info!(?format, bytes = zip_bytes.len(), "container decrypted");

    let mut builder = tempfile::Builder::new();
    builder.prefix(WORKDIR_PREFIX);
    let workdir = match work_parent {
        Some(parent) => builder.tempdir_in(parent)?,
        None => builder.tempdir()?,
    };
    unpack(&zip_bytes, workdir.path())?;

    let root = workdir.path();

    let encrypted_root = root.join(ENCRYPTED_TREE_DIR);
    if !encrypted_root.is_dir() {
        return Err(RecoveryError::MalformedContainer(format!(
            "missing {ENCRYPTED_TREE_DIR}/ directory"
        )));
    }

    let db = root.join(METADATA_DB_NAME);
    let metadata_db = if db.is_file() {
        Some(db)
    } else {
        warn!("container has no {METADATA_DB_NAME}, falling back to positional naming");
        None
    };

    Ok(ExtractedContainer {
        _workdir: workdir,
        format,
        metadata_db,
        encrypted_root,
    })
}

/// 解包内层 ZIP；越界或无法表示的条目跳过并告警
pub fn unpack(zip_bytes: &[u8], dest: &Path) -> Result<usize> {
    let mut archive = ZipArchive::new(Cursor::new(zip_bytes))?;
    let mut written = 0usize;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;

        let Some(rel) = entry
            .enclosed_name()
            .and_then(|p| validate_relative_path(&p).ok())
        else {
            warn!(name = entry.name(), "skipping archive entry with unsafe path");
            continue;
        };

        let target = safe_join(dest, &rel)?;

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let recorded = entry.last_modified().and_then(zip_time);

        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;

        // 条目时间是后续时间戳回退链的一环
        if let Some(ts) = recorded {
            if let Err(err) = out.set_modified(timestamp::to_system_time(&ts)) {
                warn!(entry = %rel.display(), error = %err, "could not restore entry mtime");
            }
        }

        written += 1;
        debug!(entry = %rel.display(), "unpacked");
    }

    Ok(written)
}

/// ZIP 的 DOS 时间不带时区，与其余时间一样按 UTC 解释
fn zip_time(dt: zip::DateTime) -> Option<Timestamp> {
    NaiveDate::from_ymd_opt(dt.year().into(), dt.month().into(), dt.day().into())?
        .and_hms_opt(dt.hour().into(), dt.minute().into(), dt.second().into())
        .map(|naive| naive.and_utc())
}
