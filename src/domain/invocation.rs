//! 外部工具调用描述
//!
//! 只描述"要执行什么"，执行交给 `infra::command`

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::PathBuf;

/// 一次外部进程调用
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    /// 可执行程序
    pub program: OsString,
    /// 命令行参数
    pub args: Vec<OsString>,
    /// 工作目录
    pub work_dir: PathBuf,
}

impl Invocation {
    /// 创建调用
    pub fn new(program: impl Into<OsString>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            work_dir: work_dir.into(),
        }
    }

    /// 追加单个参数
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// 追加多个参数
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// 程序名（有损转换，用于日志和断言）
    pub fn program_lossy(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// 参数列表（有损转换，用于日志和断言）
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program_lossy())?;
        for arg in self.args_lossy() {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}
