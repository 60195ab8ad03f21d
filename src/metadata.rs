//! 备份容器内的排序数据库
//!
//! 主表 `files` 按整数 `sort` 列排序，记录每个内容 id 原先所在的目录、
//! 相对顺序，以及（较新版本才有的）修改时间与原始路径。
//!
//! 约束：
//! - 可选列用 `PRAGMA table_info` 探测，旧表结构不得导致整体失败
//! - 单行损坏只跳过并告警
//! - 建好后只读，可在多个 worker 之间共享

use std::collections::HashMap;
use std::path::Path;

use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info, warn};

use crate::error::{RecoveryError, Result};
use crate::timestamp::{self, Timestamp};

/// 解包根目录下的数据库文件名
pub const METADATA_DB_NAME: &str = "sort.db";

/// 主表名
pub const TABLE_NAME: &str = "files";

const REQUIRED_COLUMNS: [&str; 3] = ["id", "dir", "sort"];
const DATE_COLUMN: &str = "date_modified";
const PATH_COLUMN: &str = "path";

/// 数据库中的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMappingEntry {
    pub id: String,
    pub dir: String,
    pub sort: i64,
    pub date_modified: Option<Timestamp>,
    pub original_path: Option<String>,
}

impl FileMappingEntry {
    /// 原始路径中的文件名部分
    pub fn original_file_name(&self) -> Option<&str> {
        self.original_path
            .as_deref()
            .and_then(|p| p.rsplit(['/', '\\']).next())
            .filter(|name| !name.is_empty() && *name != "." && *name != "..")
    }
}

/// id → 映射条目
#[derive(Debug, Clone, Default)]
pub struct MetadataIndex {
    entries: HashMap<String, FileMappingEntry>,
}

impl MetadataIndex {
    pub fn get(&self, id: &str) -> Option<&FileMappingEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, entry: FileMappingEntry) {
        if let Some(existing) = self.entries.get(&entry.id) {
            warn!(id = %entry.id, kept_sort = existing.sort, "duplicate id in metadata, keeping first");
            return;
        }
        self.entries.insert(entry.id.clone(), entry);
    }
}

impl FromIterator<FileMappingEntry> for MetadataIndex {
    fn from_iter<I: IntoIterator<Item = FileMappingEntry>>(iter: I) -> Self {
        let mut index = Self::default();
        for entry in iter {
            index.insert(entry);
        }
        index
    }
}

/// 读取数据库并建立索引
///
/// #### 错误
/// - 无法打开、缺表或缺必需列：MetadataUnavailable（调用方应降级为回退命名）
pub fn index(db_path: &Path) -> Result<MetadataIndex> {
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;

    let columns = table_columns(&conn)?;
    if let Some(missing) = REQUIRED_COLUMNS
        .iter()
        .find(|c| !columns.iter().any(|have| have.as_str() == **c))
    {
        return Err(RecoveryError::MetadataUnavailable(format!(
            "table {TABLE_NAME} has no column {missing}"
        )));
    }

    let has_date = columns.iter().any(|c| c == DATE_COLUMN);
    let has_path = columns.iter().any(|c| c == PATH_COLUMN);
    debug!(has_date, has_path, "metadata schema probed");

    let sql = format!(
        "SELECT id, dir, sort, {}, {} FROM {TABLE_NAME} ORDER BY sort",
        if has_date { DATE_COLUMN } else { "NULL" },
        if has_path { PATH_COLUMN } else { "NULL" },
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        Ok(RawRow {
            id: row.get(0)?,
            dir: row.get(1)?,
            sort: row.get(2)?,
            date_modified: row.get(3)?,
            path: row.get(4)?,
        })
    })?;

    let mut index = MetadataIndex::default();
    let mut skipped = 0usize;

    for row in rows {
        match row {
            Ok(raw) => index.insert(raw.into_entry()),
            Err(e) => {
                skipped += 1;
                warn!(error = %e, "skipping unreadable metadata row");
            }
        }
    }

    info!(entries = index.len(), skipped, "metadata indexed");
    Ok(index)
}

struct RawRow {
    id: String,
    dir: Option<String>,
    sort: i64,
    date_modified: Option<String>,
    path: Option<String>,
}

impl RawRow {
    fn into_entry(self) -> FileMappingEntry {
        let date_modified = self.date_modified.as_deref().and_then(|text| {
            let parsed = timestamp::parse(text);
            if parsed.is_none() {
                warn!(id = %self.id, value = text, "unparseable date_modified");
            }
            parsed
        });

        FileMappingEntry {
            id: self.id,
            dir: self.dir.unwrap_or_default(),
            sort: self.sort,
            date_modified,
            original_path: self.path.filter(|p| !p.trim().is_empty()),
        }
    }
}

fn table_columns(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({TABLE_NAME})"))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    if columns.is_empty() {
        return Err(RecoveryError::MetadataUnavailable(format!(
            "no table named {TABLE_NAME}"
        )));
    }
    Ok(columns)
}
