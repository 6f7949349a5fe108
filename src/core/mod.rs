// 核心数据结构和类型定义

pub mod config;
pub mod error;
pub mod types;

pub use config::*;
pub use error::*;
pub use types::*;

use std::process;
use std::thread;

/// 日志上下文前缀（进程号 + 线程号），跨线程排查时用
pub fn log_ctx() -> String {
    format!("[pid:{} tid:{:?}]", process::id(), thread::current().id())
}
