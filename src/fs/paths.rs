//! 相对路径校验
//!
//! 容器内的 ZIP 条目名与数据库里记录的目录都来自不可信输入，
//! 拼接到输出根目录前必须确认不会越界。

use std::io;
use std::path::{Component, Path, PathBuf};

/// 校验相对路径仅包含安全组件，拒绝 `..`、绝对路径、盘符路径
pub fn validate_relative_path(rel: &Path) -> io::Result<PathBuf> {
    let mut safe = PathBuf::new();
    for comp in rel.components() {
        match comp {
            Component::CurDir => {}
            Component::Normal(v) => safe.push(v),
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unsafe path component in {rel:?}"),
                ));
            }
        }
    }
    Ok(safe)
}

/// 在根目录下拼接已校验的相对路径，并再次确认结果不越界
pub fn safe_join(root: &Path, rel: &Path) -> io::Result<PathBuf> {
    let rel = validate_relative_path(rel)?;
    let joined = root.join(rel);
    if !joined.starts_with(root) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("path escapes output root: {joined:?}"),
        ));
    }
    Ok(joined)
}

/// 数据库里的目录字符串统一用 `/` 分隔，`\` 也视为分隔符
pub fn recorded_dir(dir: &str) -> PathBuf {
    dir.split(['/', '\\'])
        .filter(|part| !part.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_traversal() {
        assert!(validate_relative_path(Path::new("../etc")).is_err());
        assert!(validate_relative_path(Path::new("/abs")).is_err());
        assert!(safe_join(Path::new("/out"), Path::new("a/../../b")).is_err());
    }

    #[test]
    fn accepts_plain_relative() {
        assert_eq!(
            safe_join(Path::new("/out"), Path::new("./Vacation/2021")).unwrap(),
            PathBuf::from("/out/Vacation/2021")
        );
    }

    #[test]
    fn recorded_dirs_are_split_on_both_separators() {
        assert_eq!(recorded_dir("Vacation/2021"), PathBuf::from("Vacation").join("2021"));
        assert_eq!(recorded_dir("\\Camera\\"), PathBuf::from("Camera"));
        assert_eq!(recorded_dir(""), PathBuf::new());
    }
}
