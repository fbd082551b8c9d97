//! Truvis 工具集
//!
//! 宿主程序与测试共用的日志初始化。

pub mod init_log;
