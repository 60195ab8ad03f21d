//! 单次恢复运行的调用方配置

use std::path::PathBuf;

use crate::format::container::ContainerFormat;

/// 恢复选项
#[derive(Debug, Clone)]
pub struct RecoveryOptions {
    /// 旧版格式找不到图片样本时是否继续（不校验口令）
    pub allow_unverified: bool,
    /// 结束后把输出子目录改名为文件日期范围
    pub rename_dirs_by_date: bool,
    /// 平铺模式沿用加密文件的文件名主干
    pub keep_source_names: bool,
    /// 指定容器版本；None 时依次尝试全部版本
    pub container_format: Option<ContainerFormat>,
    /// 容器解包的临时目录位置；None 时用系统临时目录
    pub work_dir: Option<PathBuf>,
}

impl Default for RecoveryOptions {
    fn default() -> Self {
        Self {
            allow_unverified: false,
            rename_dirs_by_date: false,
            keep_source_names: true,
            container_format: None,
            work_dir: None,
        }
    }
}

impl RecoveryOptions {
    /// 本次运行要尝试的容器版本
    pub fn container_formats(&self) -> Vec<ContainerFormat> {
        match self.container_format {
            Some(format) => vec![format],
            None => ContainerFormat::ALL.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fail_closed() {
        let options = RecoveryOptions::default();
        assert!(!options.allow_unverified);
        assert!(options.keep_source_names);
        assert_eq!(options.container_formats(), ContainerFormat::ALL.to_vec());
    }
}
