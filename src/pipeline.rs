//! 恢复流水线
//!
//! 状态流转：Idle → ValidatingPassword → Processing → Completed | Failed | Cancelled
//!
//! 流程（严格顺序）：
//! 1. 判断输入形态：目录为平铺模式，文件为备份容器
//! 2. 枚举候选并校验口令；任何批次级错误在此中止，不产生输出
//! 3. 创建输出根目录
//! 4. 逐个文件：解密到临时文件 → 定扩展名 → 定文件名 → 不覆盖提交 → 恢复时间戳
//! 5. （可选）按日期范围重命名输出子目录
//!
//! 单个文件失败只记日志并计入失败数，为它补建的空目录随即回收；
//! 取消请求在文件之间以及每个文件提交前检查，未提交的临时文件随即删除。

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use crate::container::{self, ExtractedContainer};
use crate::crypto::kdf::{LEGACY_KEY_LEN, derive_legacy_key};
use crate::entry::{self, EncryptedEntry};
use crate::error::{RecoveryError, Result};
use crate::events::{Event, ProgressTracker, RunReport, RunState};
use crate::extension::{self, MediaKind};
use crate::format::stream::StreamDecryptor;
use crate::fs::atomic::{self, CreatedDirs, TempOutput};
use crate::fs::paths::{recorded_dir, safe_join};
use crate::media;
use crate::metadata::{self, FileMappingEntry, MetadataIndex};
use crate::options::RecoveryOptions;
use crate::timestamp::{self, Timestamp};
use crate::validate;

/// 一个待处理的任务：加密条目 + 可选映射 + 输出相对目录
#[derive(Debug)]
struct Job {
    entry: EncryptedEntry,
    mapping: Option<FileMappingEntry>,
    rel_dir: PathBuf,
}

/// 单个文件的处理结果
#[derive(Debug)]
struct Reconstructed {
    path: PathBuf,
    timestamp: Timestamp,
}

/// 枚举阶段的产物；容器模式下持有临时解包目录直到运行结束
struct Plan {
    jobs: Vec<Job>,
    flat: bool,
    _container: Option<ExtractedContainer>,
}

#[derive(Debug, Default)]
struct Tally {
    processed: usize,
    succeeded: usize,
    total: usize,
    cancelled: bool,
}

/// 执行一次完整的恢复运行
///
/// 本函数不会返回错误：所有结果（包括批次级失败）都体现在 [`RunReport`]
/// 与最后一个 [`Event::Completed`] 事件中。
///
/// #### 参数
/// - `sink`：事件回调，在执行线程上同步调用
/// - `cancel`：协作式取消标志
pub fn run(
    password: &str,
    input: &Path,
    output: &Path,
    options: &RecoveryOptions,
    sink: &dyn Fn(Event),
    cancel: &AtomicBool,
) -> RunReport {
    info!(input = %input.display(), output = %output.display(), "recovery run started");

    let mut tally = Tally::default();
    let result = execute(password, input, output, options, sink, cancel, &mut tally);

    let report = match result {
        Ok(()) if tally.cancelled => RunReport {
            state: RunState::Cancelled,
            processed: tally.processed,
            succeeded: tally.succeeded,
            total: tally.total,
            summary: format!(
                "cancelled: {}/{} files recovered",
                tally.succeeded, tally.total
            ),
            error: Some(RecoveryError::Cancelled.kind()),
        },
        Ok(()) => RunReport {
            state: if tally.succeeded > 0 {
                RunState::Completed
            } else {
                RunState::Failed
            },
            processed: tally.processed,
            succeeded: tally.succeeded,
            total: tally.total,
            summary: format!("{}/{} files recovered", tally.succeeded, tally.total),
            error: None,
        },
        Err(err) => {
            error!(error = %err, "recovery run aborted");
            RunReport {
                state: RunState::Failed,
                processed: tally.processed,
                succeeded: tally.succeeded,
                total: tally.total,
                summary: err.to_string(),
                error: Some(err.kind()),
            }
        }
    };

    info!(state = ?report.state, summary = %report.summary, "recovery run finished");
    sink(Event::Completed {
        success: report.success(),
        summary: report.summary.clone(),
    });
    report
}

fn execute(
    password: &str,
    input: &Path,
    output: &Path,
    options: &RecoveryOptions,
    sink: &dyn Fn(Event),
    cancel: &AtomicBool,
    tally: &mut Tally,
) -> Result<()> {
    // ---------- 1. 枚举与口令校验 ----------
    debug!(state = ?RunState::ValidatingPassword, "validating password");
    sink(Event::Status("validating password".into()));

    let plan = plan(password, input, options, sink)?;
    tally.total = plan.jobs.len();

    // ---------- 2. 输出根目录 ----------
    fs::create_dir_all(output)?;

    // ---------- 3. 逐个处理 ----------
    debug!(state = ?RunState::Processing, total = tally.total, "processing entries");
    let key = derive_legacy_key(password);
    let mut progress = ProgressTracker::new(sink, tally.total);
    let mut dir_times: HashMap<PathBuf, (Timestamp, Timestamp)> = HashMap::new();

    for (index, job) in plan.jobs.iter().enumerate() {
        if cancel.load(Ordering::SeqCst) {
            info!(processed = tally.processed, "cancellation requested, stopping");
            tally.cancelled = true;
            break;
        }

        let name = job.entry.display_name();
        sink(Event::Status(format!("processing {name}")));

        match process_one(&key, job, index + 1, plan.flat, output, options, cancel) {
            Ok(done) => {
                debug!(output = %done.path.display(), "file recovered");
                tally.succeeded += 1;
                if let Some(dir) = done.path.parent().filter(|d| *d != output) {
                    dir_times
                        .entry(dir.to_path_buf())
                        .and_modify(|(lo, hi)| {
                            *lo = (*lo).min(done.timestamp);
                            *hi = (*hi).max(done.timestamp);
                        })
                        .or_insert((done.timestamp, done.timestamp));
                }
                sink(Event::Status(format!("completed {name}")));
            }
            Err(RecoveryError::Cancelled) => {
                info!(file = %name, "cancelled before commit, temporary output removed");
                tally.cancelled = true;
                break;
            }
            Err(err) => {
                let failure = RecoveryError::PerFileFailure {
                    name: name.clone(),
                    reason: err.to_string(),
                };
                error!(error = %failure, "skipping file");
                sink(Event::Status(format!("error {name}: {err}")));
            }
        }

        tally.processed += 1;
        progress.advance();
    }

    // ---------- 4. 目录按日期改名 ----------
    if options.rename_dirs_by_date && !tally.cancelled {
        rename_dirs_by_date(dir_times);
    }

    Ok(())
}

/// 判断输入形态、枚举候选并完成口令校验
///
/// 排序数据库不可用不算批次错误：发出状态事件后按无映射继续。
fn plan(
    password: &str,
    input: &Path,
    options: &RecoveryOptions,
    sink: &dyn Fn(Event),
) -> Result<Plan> {
    if input.is_dir() {
        let entries = entry::scan_flat(input)?;
        if entries.is_empty() {
            return Err(RecoveryError::NoCandidateFiles);
        }

        validate::check_legacy(password, &entries, options.allow_unverified)?;
        info!(files = entries.len(), "flat export enumerated");

        let jobs = entries
            .into_iter()
            .map(|entry| Job {
                entry,
                mapping: None,
                rel_dir: PathBuf::new(),
            })
            .collect();

        return Ok(Plan {
            jobs,
            flat: true,
            _container: None,
        });
    }

    if input.is_file() {
        let extracted = container::open(
            input,
            password,
            &options.container_formats(),
            options.work_dir.as_deref(),
        )?;

        let index = match &extracted.metadata_db {
            Some(db) => metadata::index(db).unwrap_or_else(|err| {
                warn!(error = %err, "metadata unavailable, using fallback naming");
                let message = match &err {
                    RecoveryError::MetadataUnavailable(_) => err.to_string(),
                    other => format!("metadata unavailable: {other}"),
                };
                sink(Event::Status(message));
                MetadataIndex::default()
            }),
            None => MetadataIndex::default(),
        };

        let leaves = entry::scan_tree(&extracted.encrypted_root)?;
        if leaves.is_empty() {
            return Err(RecoveryError::NoCandidateFiles);
        }
        info!(files = leaves.len(), mapped = index.len(), "container tree enumerated");

        return Ok(Plan {
            jobs: container_jobs(leaves, &index),
            flat: false,
            _container: Some(extracted),
        });
    }

    Err(RecoveryError::Configuration(format!(
        "input {} does not exist",
        input.display()
    )))
}

/// 映射到的叶子按 sort 升序在前，未映射的按路径顺序在后
fn container_jobs(leaves: Vec<EncryptedEntry>, index: &MetadataIndex) -> Vec<Job> {
    let (mut mapped, unmapped): (Vec<Job>, Vec<Job>) = leaves
        .into_iter()
        .map(|entry| {
            let mapping = index.get(&entry.stem).cloned();
            let rel_dir = mapping
                .as_ref()
                .map(|m| recorded_dir(&m.dir))
                .unwrap_or_default();
            Job {
                entry,
                mapping,
                rel_dir,
            }
        })
        .partition(|job| job.mapping.is_some());

    mapped.sort_by_key(|job| job.mapping.as_ref().map(|m| m.sort));
    if !unmapped.is_empty() {
        debug!(count = unmapped.len(), "leaves without metadata");
    }

    mapped.extend(unmapped);
    mapped
}

fn process_one(
    key: &Zeroizing<[u8; LEGACY_KEY_LEN]>,
    job: &Job,
    position: usize,
    flat: bool,
    output: &Path,
    options: &RecoveryOptions,
    cancel: &AtomicBool,
) -> Result<Reconstructed> {
    let target_dir = safe_join(output, &job.rel_dir)?;
    let created = CreatedDirs::ensure(&target_dir)?;

    let result = reconstruct(key, job, position, flat, &target_dir, options, cancel);
    if result.is_err() {
        created.rollback();
    }
    result
}

fn reconstruct(
    key: &Zeroizing<[u8; LEGACY_KEY_LEN]>,
    job: &Job,
    position: usize,
    flat: bool,
    target_dir: &Path,
    options: &RecoveryOptions,
    cancel: &AtomicBool,
) -> Result<Reconstructed> {
    let entry = &job.entry;

    // ---------- 解密到临时文件 ----------
    let mut tmp = TempOutput::create(target_dir, &entry.display_name())?;
    let summary = {
        let reader = BufReader::new(File::open(&entry.path)?);
        let mut writer = BufWriter::new(tmp.file_mut()?);
        let summary = StreamDecryptor::new(key).decrypt(reader, &mut writer)?;
        writer.flush()?;
        summary
    };
    tmp.finish_writing()?;
    debug!(file = %entry.display_name(), bytes = summary.bytes, "decrypted");

    if cancel.load(Ordering::SeqCst) {
        tmp.discard()?;
        return Err(RecoveryError::Cancelled);
    }

    // ---------- 扩展名与内嵌时间 ----------
    let (ext, resolved_by) = extension::resolve(&entry.obfuscated_ext, &summary.head);
    let kind = extension::media_kind(ext);
    debug!(ext, ?resolved_by, ?kind, "extension resolved");

    let embedded = File::open(tmp.path())
        .and_then(|f| media::capture_time(BufReader::new(f), kind))
        .unwrap_or_else(|err| {
            warn!(error = %err, "failed to read embedded date");
            None
        });

    // ---------- 命名与提交 ----------
    let (stem, final_ext) = choose_name(job, flat, options, ext, kind, embedded, position);
    let path = tmp.commit_unique(target_dir, &stem, &final_ext)?;

    // ---------- 恢复时间戳 ----------
    let timestamp = job
        .mapping
        .as_ref()
        .and_then(|m| m.date_modified)
        .or(embedded)
        .or_else(|| {
            fs::metadata(&entry.path)
                .and_then(|m| m.modified())
                .ok()
                .map(timestamp::from_system_time)
        })
        .unwrap_or_else(Utc::now);

    if let Err(err) = atomic::set_mtime(&path, timestamp::to_system_time(&timestamp)) {
        warn!(path = %path.display(), error = %err, "failed to restore modification time");
    }

    Ok(Reconstructed { path, timestamp })
}

/// 命名优先级：记录的原始文件名 → 源文件名主干 → 内嵌日期 → 序号
fn choose_name(
    job: &Job,
    flat: bool,
    options: &RecoveryOptions,
    ext: &str,
    kind: MediaKind,
    embedded: Option<Timestamp>,
    position: usize,
) -> (String, String) {
    if let Some(original) = job.mapping.as_ref().and_then(|m| m.original_file_name()) {
        return split_file_name(original, ext);
    }

    if flat && options.keep_source_names && !job.entry.stem.is_empty() {
        return (job.entry.stem.clone(), ext.to_string());
    }

    let prefix = match kind {
        MediaKind::Image => Some("IMG"),
        MediaKind::Video => Some("VID"),
        MediaKind::Other => None,
    };
    if let (Some(prefix), Some(ts)) = (prefix, embedded) {
        return (
            format!("{prefix}_{}", timestamp::name_stamp(&ts)),
            ext.to_string(),
        );
    }

    (format!("file_{position:03}"), ext.to_string())
}

/// 记录的文件名自带扩展名时原样保留，否则补上识别出的扩展名
fn split_file_name(name: &str, fallback_ext: &str) -> (String, String) {
    match name.rfind('.') {
        Some(dot) if dot > 0 && dot + 1 < name.len() => {
            (name[..dot].to_string(), name[dot..].to_string())
        }
        _ => (name.to_string(), fallback_ext.to_string()),
    }
}

/// 由深到浅改名，避免先改父目录使子目录路径失效
fn rename_dirs_by_date(dir_times: HashMap<PathBuf, (Timestamp, Timestamp)>) {
    let mut dirs: Vec<_> = dir_times.into_iter().collect();
    dirs.sort_by(|(a, _), (b, _)| {
        b.components()
            .count()
            .cmp(&a.components().count())
            .then_with(|| a.cmp(b))
    });

    for (dir, (lo, hi)) in dirs {
        let label = timestamp::range_label(&lo, &hi);
        match atomic::rename_dir_unique(&dir, &label) {
            Ok(renamed) => info!(from = %dir.display(), to = %renamed.display(), "directory renamed"),
            Err(err) => warn!(dir = %dir.display(), error = %err, "directory rename failed"),
        }
    }
}
