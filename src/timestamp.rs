//! 时间戳解析与格式化
//!
//! 导出数据中的时间（数据库 ISO-8601、EXIF、目录标签）都不带时区，
//! 一律按 UTC 解释，保证同样输入在任何机器上得到同样的结果。

use std::time::SystemTime;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

pub type Timestamp = DateTime<Utc>;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y:%m:%d %H:%M:%S",
];

/// 解析 ISO-8601（带或不带时区）以及 EXIF 风格时间
pub fn parse(text: &str) -> Option<Timestamp> {
    let text = text.trim().trim_end_matches('\0');
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub fn from_system_time(time: SystemTime) -> Timestamp {
    DateTime::<Utc>::from(time)
}

pub fn to_system_time(ts: &Timestamp) -> SystemTime {
    SystemTime::from(*ts)
}

/// `YYYYMMDD_HHMMSS`，用于 IMG_/VID_ 文件名
pub fn name_stamp(ts: &Timestamp) -> String {
    ts.format("%Y%m%d_%H%M%S").to_string()
}

/// `YYYYMMDD`
pub fn day_label(ts: &Timestamp) -> String {
    ts.format("%Y%m%d").to_string()
}

/// 同一天为 `YYYYMMDD`，否则 `YYYYMMDD-YYYYMMDD`
pub fn range_label(min: &Timestamp, max: &Timestamp) -> String {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    let (a, b) = (day_label(lo), day_label(hi));
    if a == b { a } else { format!("{a}-{b}") }
}
