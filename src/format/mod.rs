//! 导出文件的字节格式

pub mod container;
pub mod stream;
