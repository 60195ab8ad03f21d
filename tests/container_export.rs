mod common;

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use std::time::SystemTime;

use chrono::{TimeZone, Utc};
use common::{PASSWORD, Recorder, jpeg_bytes, list_files};
use pixrecover::{ContainerFormat, ErrorKind, RecoveryOptions, RunState};
use rusqlite::Connection;
use tempfile::tempdir;
use zip::write::SimpleFileOptions;

/// 建一个排序数据库并返回其字节
fn sort_db(dir: &Path, ddl: &str, rows: &[&str]) -> Vec<u8> {
    let path = dir.join("fixture-sort.db");
    {
        let conn = Connection::open(&path).expect("create db");
        conn.execute_batch(ddl).expect("create table");
        for row in rows {
            conn.execute(row, []).expect("insert row");
        }
    }
    fs::read(&path).expect("read db")
}

/// 打包内层 ZIP，所有条目共用 `entry_options`
fn zip_bytes(files: &[(&str, Vec<u8>)], entry_options: SimpleFileOptions) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in files {
        writer
            .start_file(*name, entry_options)
            .expect("start zip entry");
        writer.write_all(body).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

fn seal_to(path: &Path, zip: &[u8], format: ContainerFormat) {
    let sealed = pixrecover::seal_container(zip, PASSWORD, format).expect("seal");
    fs::write(path, sealed).expect("write container");
}

/// 打包内层 ZIP 并封装为 V1 容器文件
fn write_container(path: &Path, files: &[(&str, Vec<u8>)]) {
    seal_to(
        path,
        &zip_bytes(files, SimpleFileOptions::default()),
        ContainerFormat::V1,
    );
}

fn options(work: &Path) -> RecoveryOptions {
    RecoveryOptions {
        container_format: Some(ContainerFormat::V1),
        work_dir: Some(work.to_path_buf()),
        ..RecoveryOptions::default()
    }
}

fn leaf(fill: u8) -> Vec<u8> {
    pixrecover::encrypt_legacy(PASSWORD, &jpeg_bytes(fill))
}

#[test]
fn mapped_entry_lands_in_recorded_directory_with_recorded_time() {
    let temp_dir = tempdir().expect("create temp dir");
    let work = temp_dir.path().join("work");
    let output = temp_dir.path().join("out");
    fs::create_dir(&work).expect("create work dir");

    let db = sort_db(
        temp_dir.path(),
        "CREATE TABLE files (id TEXT, dir TEXT, sort INTEGER, date_modified TEXT);",
        &["INSERT INTO files VALUES ('abc123', 'Vacation/2021', 1, '2021-07-04T10:00:00')"],
    );
    let backup = temp_dir.path().join("backup.bin");
    write_container(
        &backup,
        &[("sort.db", db), ("encrypted/abc123.6zu", leaf(7))],
    );

    let recorder = Recorder::default();
    let report = pixrecover::recover(PASSWORD, &backup, &output, &options(&work), &|e| {
        recorder.push(e)
    });

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(list_files(&output), vec!["Vacation/2021/file_001.jpg"]);

    let recovered = output.join("Vacation/2021/file_001.jpg");
    assert_eq!(fs::read(&recovered).expect("read output"), jpeg_bytes(7));

    let expected = SystemTime::from(Utc.with_ymd_and_hms(2021, 7, 4, 10, 0, 0).unwrap());
    let mtime = fs::metadata(&recovered)
        .and_then(|m| m.modified())
        .expect("read mtime");
    assert_eq!(mtime, expected);

    assert_eq!(recorder.completed(), Some((true, "1/1 files recovered".to_string())));
    assert_eq!(fs::read_dir(&work).expect("read work dir").count(), 0);
}

#[test]
fn recorded_names_order_and_unmapped_leaves() {
    let temp_dir = tempdir().expect("create temp dir");
    let work = temp_dir.path().join("work");
    let output = temp_dir.path().join("out");
    fs::create_dir(&work).expect("create work dir");

    let db = sort_db(
        temp_dir.path(),
        "CREATE TABLE files (id TEXT, dir TEXT, sort INTEGER, date_modified TEXT, path TEXT);",
        &[
            "INSERT INTO files VALUES ('second', 'Album', 2, NULL, '/storage/DCIM/beach.jpg')",
            "INSERT INTO files VALUES ('first', 'Album', 1, NULL, '/storage/DCIM/beach.jpg')",
        ],
    );
    let backup = temp_dir.path().join("backup.bin");
    write_container(
        &backup,
        &[
            ("sort.db", db),
            ("encrypted/aa/second.6zu", leaf(2)),
            ("encrypted/bb/first.6zu", leaf(1)),
            ("encrypted/cc/stray.6zu", leaf(3)),
        ],
    );

    let report = pixrecover::recover(PASSWORD, &backup, &output, &options(&work), &|_| {});

    assert_eq!(report.succeeded, 3);
    assert_eq!(
        list_files(&output),
        vec!["Album/beach.jpg", "Album/beach_1.jpg", "file_003.jpg"]
    );
    // sort 小的先提交，占到不带后缀的名字
    assert_eq!(fs::read(output.join("Album/beach.jpg")).expect("read"), jpeg_bytes(1));
    assert_eq!(fs::read(output.join("Album/beach_1.jpg")).expect("read"), jpeg_bytes(2));
}

#[test]
fn directories_can_be_renamed_by_date() {
    let temp_dir = tempdir().expect("create temp dir");
    let work = temp_dir.path().join("work");
    let output = temp_dir.path().join("out");
    fs::create_dir(&work).expect("create work dir");

    let db = sort_db(
        temp_dir.path(),
        "CREATE TABLE files (id TEXT, dir TEXT, sort INTEGER, date_modified TEXT);",
        &[
            "INSERT INTO files VALUES ('a', 'Trip', 1, '2021-07-04T10:00:00')",
            "INSERT INTO files VALUES ('b', 'Trip', 2, '2021-07-06T08:30:00')",
            "INSERT INTO files VALUES ('c', 'Home', 3, '2022-01-01 12:00:00')",
        ],
    );
    let backup = temp_dir.path().join("backup.bin");
    write_container(
        &backup,
        &[
            ("sort.db", db),
            ("encrypted/a.6zu", leaf(1)),
            ("encrypted/b.6zu", leaf(2)),
            ("encrypted/c.6zu", leaf(3)),
        ],
    );

    let options = RecoveryOptions {
        rename_dirs_by_date: true,
        ..options(&work)
    };
    let report = pixrecover::recover(PASSWORD, &backup, &output, &options, &|_| {});

    assert!(report.success());
    assert_eq!(
        list_files(&output),
        vec![
            "20210704-20210706/file_001.jpg",
            "20210704-20210706/file_002.jpg",
            "20220101/file_003.jpg",
        ]
    );
}

#[test]
fn missing_database_degrades_to_positional_names() {
    let temp_dir = tempdir().expect("create temp dir");
    let work = temp_dir.path().join("work");
    let output = temp_dir.path().join("out");
    fs::create_dir(&work).expect("create work dir");

    let backup = temp_dir.path().join("backup.bin");
    write_container(&backup, &[("encrypted/x/abc.6zu", leaf(4))]);

    let report = pixrecover::recover(PASSWORD, &backup, &output, &options(&work), &|_| {});

    assert!(report.success());
    assert_eq!(list_files(&output), vec!["file_001.jpg"]);
}

#[test]
fn wrong_container_password_fails_without_output() {
    let temp_dir = tempdir().expect("create temp dir");
    let work = temp_dir.path().join("work");
    let output = temp_dir.path().join("out");
    fs::create_dir(&work).expect("create work dir");

    let backup = temp_dir.path().join("backup.bin");
    write_container(&backup, &[("encrypted/abc.6zu", leaf(0))]);

    let recorder = Recorder::default();
    let report = pixrecover::recover("nope", &backup, &output, &options(&work), &|e| {
        recorder.push(e)
    });

    assert_eq!(report.error, Some(ErrorKind::WrongPassword));
    assert_eq!(recorder.completed(), Some((false, "wrong password".to_string())));
    assert!(!output.exists());
    assert_eq!(fs::read_dir(&work).expect("read work dir").count(), 0);
}

#[test]
fn container_without_encrypted_tree_is_malformed() {
    let temp_dir = tempdir().expect("create temp dir");
    let work = temp_dir.path().join("work");
    let output = temp_dir.path().join("out");
    fs::create_dir(&work).expect("create work dir");

    let backup = temp_dir.path().join("backup.bin");
    write_container(&backup, &[("notes.txt", b"nothing here".to_vec())]);

    let report = pixrecover::recover(PASSWORD, &backup, &output, &options(&work), &|_| {});

    assert_eq!(report.error, Some(ErrorKind::MalformedContainer));
    assert!(!output.exists());
}

#[test]
fn version_two_container_opens_with_default_trial_order() {
    let temp_dir = tempdir().expect("create temp dir");
    let work = temp_dir.path().join("work");
    let output = temp_dir.path().join("out");
    fs::create_dir(&work).expect("create work dir");

    let backup = temp_dir.path().join("backup.bin");
    let zip = zip_bytes(&[("encrypted/abc.6zu", leaf(5))], SimpleFileOptions::default());
    seal_to(&backup, &zip, ContainerFormat::V2);

    let (format, _) = pixrecover::open_container(&fs::read(&backup).expect("read"), PASSWORD)
        .expect("open container");
    assert_eq!(format, ContainerFormat::V2);

    // 不指定版本：先按 V1 试解失败，再按 V2 成功
    let options = RecoveryOptions {
        container_format: None,
        ..options(&work)
    };
    let report = pixrecover::recover(PASSWORD, &backup, &output, &options, &|_| {});

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(list_files(&output), vec!["file_001.jpg"]);
    assert_eq!(fs::read(output.join("file_001.jpg")).expect("read"), jpeg_bytes(5));
}

#[test]
fn failing_entry_is_skipped_and_run_continues() {
    let temp_dir = tempdir().expect("create temp dir");
    let work = temp_dir.path().join("work");
    let output = temp_dir.path().join("out");
    fs::create_dir(&work).expect("create work dir");

    let db = sort_db(
        temp_dir.path(),
        "CREATE TABLE files (id TEXT, dir TEXT, sort INTEGER);",
        &[
            "INSERT INTO files VALUES ('good', 'Album', 1)",
            "INSERT INTO files VALUES ('bad', '../escape', 2)",
        ],
    );
    let backup = temp_dir.path().join("backup.bin");
    write_container(
        &backup,
        &[
            ("sort.db", db),
            ("encrypted/good.6zu", leaf(1)),
            ("encrypted/bad.6zu", leaf(2)),
        ],
    );

    let recorder = Recorder::default();
    let report = pixrecover::recover(PASSWORD, &backup, &output, &options(&work), &|e| {
        recorder.push(e)
    });

    assert_eq!(report.state, RunState::Completed);
    assert_eq!((report.processed, report.succeeded, report.total), (2, 1, 2));
    assert_eq!(recorder.completed(), Some((true, "1/2 files recovered".to_string())));
    assert!(
        recorder
            .statuses()
            .iter()
            .any(|s| s.starts_with("error bad.6zu"))
    );

    assert_eq!(list_files(&output), vec!["Album/file_001.jpg"]);
    assert!(!temp_dir.path().join("escape").exists());
}

#[test]
fn unreadable_database_is_reported_and_naming_falls_back() {
    let temp_dir = tempdir().expect("create temp dir");
    let work = temp_dir.path().join("work");
    let output = temp_dir.path().join("out");
    fs::create_dir(&work).expect("create work dir");

    let db = sort_db(
        temp_dir.path(),
        "CREATE TABLE albums (name TEXT);",
        &["INSERT INTO albums VALUES ('Trip')"],
    );
    let backup = temp_dir.path().join("backup.bin");
    write_container(&backup, &[("sort.db", db), ("encrypted/abc.6zu", leaf(6))]);

    let recorder = Recorder::default();
    let report = pixrecover::recover(PASSWORD, &backup, &output, &options(&work), &|e| {
        recorder.push(e)
    });

    assert!(report.success());
    assert_eq!(list_files(&output), vec!["file_001.jpg"]);
    assert!(
        recorder
            .statuses()
            .iter()
            .any(|s| s.starts_with("metadata unavailable"))
    );
}

#[test]
fn entry_time_is_used_when_nothing_else_is_recorded() {
    let temp_dir = tempdir().expect("create temp dir");
    let work = temp_dir.path().join("work");
    let output = temp_dir.path().join("out");
    fs::create_dir(&work).expect("create work dir");

    let stamp = zip::DateTime::from_date_and_time(2015, 3, 1, 12, 0, 0).expect("zip time");
    let zip = zip_bytes(
        &[("encrypted/abc.6zu", leaf(8))],
        SimpleFileOptions::default().last_modified_time(stamp),
    );
    let backup = temp_dir.path().join("backup.bin");
    seal_to(&backup, &zip, ContainerFormat::V1);

    let report = pixrecover::recover(PASSWORD, &backup, &output, &options(&work), &|_| {});
    assert!(report.success());

    let expected = SystemTime::from(Utc.with_ymd_and_hms(2015, 3, 1, 12, 0, 0).unwrap());
    let mtime = fs::metadata(output.join("file_001.jpg"))
        .and_then(|m| m.modified())
        .expect("read mtime");
    assert_eq!(mtime, expected);
}
