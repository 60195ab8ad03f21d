//! 输出侧的文件系统操作

pub mod atomic;
pub mod paths;
