//! 基础设施模块
//!
//! 封装外部依赖（子进程执行、本地服务启动）

pub mod command;
pub mod launcher;

pub use command::{CommandError, CommandRunner, ToolExit, ToolRunner};
pub use launcher::{Launcher, SystemLauncher};
