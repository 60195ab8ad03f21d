//! 从解密后的内容里读取拍摄/创建时间
//!
//! - 图片：JPEG APP1 或裸 TIFF 中的 EXIF，优先 DateTimeOriginal（0x9003），
//!   其次 IFD0 的 DateTime（0x0132）
//! - 视频：ISO-BMFF `moov/mvhd` 的 creation_time（1904 纪元秒，0 视为缺失）
//!
//! 只做最小限度的结构解析；任何越界或格式不符都返回 None，不报错。

use std::io::{self, Read, Seek, SeekFrom};

use chrono::DateTime;

use crate::extension::MediaKind;
use crate::timestamp::{self, Timestamp};

/// 为找 EXIF 最多读取的图片前缀
pub const EXIF_SCAN_LEN: u64 = 256 * 1024;

const TAG_DATETIME: u16 = 0x0132;
const TAG_EXIF_IFD: u16 = 0x8769;
const TAG_DATETIME_ORIGINAL: u16 = 0x9003;
const TYPE_ASCII: u16 = 2;

/// 1904-01-01 到 1970-01-01 的秒数
const MAC_EPOCH_OFFSET: i64 = 2_082_844_800;

/// 按内容大类读取内嵌时间
pub fn capture_time<R: Read + Seek>(reader: R, kind: MediaKind) -> io::Result<Option<Timestamp>> {
    match kind {
        MediaKind::Image => {
            let mut head = Vec::new();
            reader.take(EXIF_SCAN_LEN).read_to_end(&mut head)?;
            Ok(exif_datetime(&head))
        }
        MediaKind::Video => mp4_creation_time(reader),
        MediaKind::Other => Ok(None),
    }
}

/// JPEG 或 TIFF 字节中的 EXIF 时间
pub fn exif_datetime(data: &[u8]) -> Option<Timestamp> {
    if data.starts_with(&[0xff, 0xd8]) {
        jpeg_exif_payload(data).and_then(tiff_datetime)
    } else {
        tiff_datetime(data)
    }
}

fn jpeg_exif_payload(data: &[u8]) -> Option<&[u8]> {
    let mut pos = 2usize;

    while pos + 4 <= data.len() {
        if data[pos] != 0xff {
            return None;
        }
        let marker = data[pos + 1];
        match marker {
            0xff => {
                pos += 1;
                continue;
            }
            0x01 | 0xd0..=0xd7 => {
                pos += 2;
                continue;
            }
            // SOS / EOI 之后不会再有元数据段
            0xda | 0xd9 => return None,
            _ => {}
        }

        let seg_len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if seg_len < 2 {
            return None;
        }
        let start = pos + 4;
        let end = (pos + 2 + seg_len).min(data.len());

        if marker == 0xe1 {
            if let Some(tiff) = data.get(start..end).and_then(|s| s.strip_prefix(b"Exif\0\0")) {
                return Some(tiff);
            }
        }
        pos += 2 + seg_len;
    }

    None
}

#[derive(Clone, Copy)]
enum ByteOrder {
    Little,
    Big,
}

struct Tiff<'a> {
    data: &'a [u8],
    order: ByteOrder,
}

impl<'a> Tiff<'a> {
    fn parse(data: &'a [u8]) -> Option<Self> {
        let order = match data.get(0..2)? {
            b"II" => ByteOrder::Little,
            b"MM" => ByteOrder::Big,
            _ => return None,
        };
        let tiff = Self { data, order };
        (tiff.u16_at(2)? == 42).then_some(tiff)
    }

    fn u16_at(&self, off: usize) -> Option<u16> {
        let b: [u8; 2] = self.data.get(off..off + 2)?.try_into().ok()?;
        Some(match self.order {
            ByteOrder::Little => u16::from_le_bytes(b),
            ByteOrder::Big => u16::from_be_bytes(b),
        })
    }

    fn u32_at(&self, off: usize) -> Option<u32> {
        let b: [u8; 4] = self.data.get(off..off + 4)?.try_into().ok()?;
        Some(match self.order {
            ByteOrder::Little => u32::from_le_bytes(b),
            ByteOrder::Big => u32::from_be_bytes(b),
        })
    }

    /// 在 IFD 中查找指定 tag，返回条目起始偏移
    fn find(&self, ifd: usize, tag: u16) -> Option<usize> {
        let count = self.u16_at(ifd)? as usize;
        (0..count)
            .map(|i| ifd + 2 + i * 12)
            .take_while(|entry| entry + 12 <= self.data.len())
            .find(|&entry| self.u16_at(entry) == Some(tag))
    }

    fn ascii(&self, entry: usize) -> Option<&'a str> {
        if self.u16_at(entry + 2)? != TYPE_ASCII {
            return None;
        }
        let count = self.u32_at(entry + 4)? as usize;
        let start = if count <= 4 {
            entry + 8
        } else {
            self.u32_at(entry + 8)? as usize
        };
        let raw = self.data.get(start..start.checked_add(count)?)?;
        std::str::from_utf8(raw).ok()
    }

    fn datetime(&self, ifd: usize, tag: u16) -> Option<Timestamp> {
        self.find(ifd, tag)
            .and_then(|entry| self.ascii(entry))
            .and_then(timestamp::parse)
    }
}

fn tiff_datetime(data: &[u8]) -> Option<Timestamp> {
    let tiff = Tiff::parse(data)?;
    let ifd0 = tiff.u32_at(4)? as usize;

    let original = tiff
        .find(ifd0, TAG_EXIF_IFD)
        .and_then(|entry| tiff.u32_at(entry + 8))
        .and_then(|exif_ifd| tiff.datetime(exif_ifd as usize, TAG_DATETIME_ORIGINAL));

    original.or_else(|| tiff.datetime(ifd0, TAG_DATETIME))
}

/// `moov/mvhd` 的创建时间
pub fn mp4_creation_time<R: Read + Seek>(mut reader: R) -> io::Result<Option<Timestamp>> {
    let end = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;

    let Some((moov_start, moov_end)) = find_box(&mut reader, 0, end, b"moov")? else {
        return Ok(None);
    };
    let Some((mvhd_start, mvhd_end)) = find_box(&mut reader, moov_start, moov_end, b"mvhd")? else {
        return Ok(None);
    };

    reader.seek(SeekFrom::Start(mvhd_start))?;
    let mut version = [0u8; 4];
    reader.read_exact(&mut version)?;

    let secs = if version[0] == 1 {
        if mvhd_end - mvhd_start < 12 {
            return Ok(None);
        }
        let mut b = [0u8; 8];
        reader.read_exact(&mut b)?;
        u64::from_be_bytes(b)
    } else {
        if mvhd_end - mvhd_start < 8 {
            return Ok(None);
        }
        let mut b = [0u8; 4];
        reader.read_exact(&mut b)?;
        u32::from_be_bytes(b) as u64
    };

    if secs == 0 {
        return Ok(None);
    }

    let unix = i64::try_from(secs)
        .ok()
        .and_then(|s| s.checked_sub(MAC_EPOCH_OFFSET));
    Ok(unix.and_then(|s| DateTime::from_timestamp(s, 0)))
}

/// 在 `[start, end)` 范围内逐个扫描同级 box，返回目标 box 的内容区间
fn find_box<R: Read + Seek>(
    reader: &mut R,
    start: u64,
    end: u64,
    kind: &[u8; 4],
) -> io::Result<Option<(u64, u64)>> {
    let mut pos = start;

    while pos + 8 <= end {
        reader.seek(SeekFrom::Start(pos))?;
        let mut header = [0u8; 8];
        reader.read_exact(&mut header)?;

        let size32 = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as u64;
        let (header_len, size) = match size32 {
            0 => (8, end - pos),
            1 => {
                if pos + 16 > end {
                    return Ok(None);
                }
                let mut large = [0u8; 8];
                reader.read_exact(&mut large)?;
                (16, u64::from_be_bytes(large))
            }
            n => (8, n),
        };

        if size < header_len || pos.saturating_add(size) > end {
            return Ok(None);
        }

        if &header[4..8] == kind {
            return Ok(Some((pos + header_len, pos + size)));
        }
        pos += size;
    }

    Ok(None)
}
