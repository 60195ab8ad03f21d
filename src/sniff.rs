//! 按魔数识别解密后的内容类型
//!
//! 规则按固定优先级匹配，先命中者胜出：
//! 1. 偏移 4..8 为 ISO BMFF `ftyp` → `.mp4`
//! 2. `RIFF` 开头时看偏移 8..12 的子类型
//! 3. 签名表中的字面前缀（表内顺序即优先级）
//! 4. 都不匹配 → `.bin`

/// 未识别内容的扩展名
pub const FALLBACK_EXTENSION: &str = ".bin";

/// 字面前缀签名表，顺序有意义
pub const SIGNATURES: &[(&[u8], &str)] = &[
    (b"\x89PNG\r\n\x1a\n", ".png"),
    (b"\xff\xd8\xff", ".jpg"),
    (b"GIF87a", ".gif"),
    (b"GIF89a", ".gif"),
    (b"%PDF", ".pdf"),
    (b"PK\x03\x04", ".zip"),
    (b"PK\x01\x02", ".zip"),
    (b"PK\x05\x06", ".zip"),
    (b"BM", ".bmp"),
    (b"OggS", ".ogg"),
    (b"ID3", ".mp3"),
    (b"fLaC", ".flac"),
    (b"\x1a\x45\xdf\xa3", ".mkv"),
    (b"II*\x00", ".tiff"),
    (b"MM\x00*", ".tiff"),
    (b"%!PS", ".ps"),
    (b"\x00\x00\x01\x00", ".ico"),
    (b"Rar!\x1a\x07", ".rar"),
    (b"7z\xbc\xaf\x27\x1c", ".7z"),
];

/// 识别内容类型，返回带点的扩展名
pub fn sniff(bytes: &[u8]) -> &'static str {
    sniff_known(bytes).unwrap_or(FALLBACK_EXTENSION)
}

/// 与 [`sniff`] 相同，但未命中时返回 None
pub fn sniff_known(bytes: &[u8]) -> Option<&'static str> {
    if bytes.get(4..8) == Some(b"ftyp".as_slice()) {
        return Some(".mp4");
    }

    if bytes.starts_with(b"RIFF") {
        return Some(match bytes.get(8..12) {
            Some(b"WEBP") => ".webp",
            Some(b"WAVE") => ".wav",
            _ => ".riff",
        });
    }

    SIGNATURES
        .iter()
        .find(|(prefix, _)| bytes.starts_with(prefix))
        .map(|&(_, ext)| ext)
}
