#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::path::Path;

use pixrecover::Event;

pub const PASSWORD: &str = "teszt123";

/// 最小的 JFIF 头 + 填充，足以通过口令探测与魔数识别
pub fn jpeg_bytes(fill: u8) -> Vec<u8> {
    let mut data = b"\xff\xd8\xff\xe0\x00\x10JFIF\x00\x01\x01\x00\x00\x01\x00\x01\x00\x00".to_vec();
    data.extend(std::iter::repeat_n(fill, 256));
    data.extend_from_slice(&[0xff, 0xd9]);
    data
}

pub fn write_encrypted(dir: &Path, name: &str, plaintext: &[u8]) {
    let ciphertext = pixrecover::encrypt_legacy(PASSWORD, plaintext);
    fs::write(dir.join(name), ciphertext).expect("write encrypted fixture");
}

/// 收集事件的回调
#[derive(Default)]
pub struct Recorder {
    pub events: RefCell<Vec<Event>>,
}

impl Recorder {
    pub fn push(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    pub fn completed(&self) -> Option<(bool, String)> {
        self.events.borrow().iter().rev().find_map(|e| match e {
            Event::Completed { success, summary } => Some((*success, summary.clone())),
            _ => None,
        })
    }

    pub fn progress(&self) -> Vec<u8> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::Progress(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::Status(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }
}

/// 目录下所有文件名（递归，相对路径，排序）
pub fn list_files(root: &Path) -> Vec<String> {
    let mut names: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .expect("inside root")
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    names.sort();
    names
}
