//! 混淆扩展名 → 真实扩展名
//!
//! 解析顺序：
//! 1. 静态映射表（大小写不敏感）；表是权威的，即使魔数识别结果不同也以表为准
//! 2. 表中没有时，对解密后的开头字节做魔数识别
//! 3. 仍无法识别时使用 `.unknown` 并记录警告

use tracing::warn;

use crate::sniff;

/// 无法识别时使用的扩展名
pub const UNKNOWN_EXTENSION: &str = ".unknown";

/// 图片类内容的混淆扩展名，口令探测只用它的样本
pub const IMAGE_SAMPLE_EXTENSION: &str = ".6zu";

/// 混淆扩展名映射表
pub const EXTENSION_RULES: &[(&str, &str)] = &[
    (".vp3", ".mp4"),
    (".vo1", ".webm"),
    (".v27", ".mpg"),
    (".vb9", ".avi"),
    (".v77", ".mov"),
    (".v78", ".wmv"),
    (".v82", ".dv"),
    (".vz9", ".divx"),
    (".vi3", ".ogv"),
    (".v1u", ".h261"),
    (".v6m", ".h264"),
    (".6zu", ".jpg"),
    (".tr7", ".gif"),
    (".p5o", ".png"),
    (".8ur", ".bmp"),
    (".33t", ".tiff"),
    (".20i", ".webp"),
    (".v93", ".heic"),
    // 同一个键同时用于 .flv 与 .eps
    (".v91", ".flv"),
    (".v80", ".3gpp"),
    (".vo4", ".ts"),
    (".v99", ".mkv"),
    (".vr2", ".mpeg"),
    (".vv3", ".dpg"),
    (".v81", ".rmvb"),
    (".vz8", ".vob"),
    (".wi2", ".asf"),
    (".vi4", ".h263"),
    (".v2u", ".f4v"),
    (".v76", ".m4v"),
    (".v75", ".ram"),
    (".v74", ".rm"),
    (".v3u", ".mts"),
    (".v92", ".dng"),
    (".r89", ".ps"),
    (".v79", ".3gp"),
];

/// 扩展名的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedBy {
    Table,
    Sniffed,
    Unknown,
}

/// 内容大类，决定命名前缀
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Other,
}

const IMAGE_EXTENSIONS: &[&str] = &[
    ".jpg", ".png", ".gif", ".bmp", ".tiff", ".webp", ".heic", ".dng", ".ico",
];

const VIDEO_EXTENSIONS: &[&str] = &[
    ".mp4", ".webm", ".mpg", ".avi", ".mov", ".wmv", ".dv", ".divx", ".ogv", ".h261", ".h264",
    ".flv", ".3gpp", ".ts", ".mkv", ".mpeg", ".dpg", ".rmvb", ".vob", ".asf", ".h263", ".f4v",
    ".m4v", ".mts", ".3gp",
];

/// 统一为小写并带前导点
pub fn normalize(ext: &str) -> String {
    let lower = ext.trim().to_ascii_lowercase();
    if lower.starts_with('.') || lower.is_empty() {
        lower
    } else {
        format!(".{lower}")
    }
}

/// 在映射表中查找
pub fn lookup(obfuscated_ext: &str) -> Option<&'static str> {
    let key = normalize(obfuscated_ext);
    EXTENSION_RULES
        .iter()
        .find(|(from, _)| *from == key)
        .map(|&(_, to)| to)
}

/// 是否为已知的混淆扩展名
pub fn is_known(obfuscated_ext: &str) -> bool {
    lookup(obfuscated_ext).is_some()
}

/// 解析最终扩展名
pub fn resolve(obfuscated_ext: &str, decrypted_head: &[u8]) -> (&'static str, ResolvedBy) {
    if let Some(ext) = lookup(obfuscated_ext) {
        return (ext, ResolvedBy::Table);
    }

    if let Some(ext) = sniff::sniff_known(decrypted_head) {
        return (ext, ResolvedBy::Sniffed);
    }

    warn!(obfuscated_ext, "unrecognized extension and content, using {UNKNOWN_EXTENSION}");
    (UNKNOWN_EXTENSION, ResolvedBy::Unknown)
}

/// 按真实扩展名归类
pub fn media_kind(canonical_ext: &str) -> MediaKind {
    let ext = normalize(canonical_ext);
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Image
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Video
    } else {
        MediaKind::Other
    }
}
