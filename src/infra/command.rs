//! 命令执行器
//!
//! 提供统一的外部工具执行接口，支持：
//! - 可选的超时控制
//! - 取消支持（Ctrl-C）
//! - stdout/stderr 直接继承，工具输出原样呈现给用户

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::domain::Invocation;

/// 命令执行错误
#[derive(Debug, Error)]
pub enum CommandError {
    /// 命令启动失败
    #[error("Failed to spawn `{program}`: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: io::Error,
    },
    /// 命令超时
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),
    /// 命令被取消
    #[error("Command was cancelled")]
    Cancelled,
    /// 等待命令完成失败
    #[error("Failed to wait for command: {0}")]
    WaitFailed(#[source] io::Error),
}

impl CommandError {
    /// 对应的进程退出码（沿用 shell 约定）
    pub fn exit_code(&self) -> i32 {
        match self {
            CommandError::SpawnFailed { source, .. }
                if source.kind() == io::ErrorKind::NotFound =>
            {
                127
            }
            CommandError::SpawnFailed { .. } | CommandError::WaitFailed(_) => 1,
            CommandError::Timeout(_) => 124,
            CommandError::Cancelled => 130,
        }
    }
}

/// 工具退出结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToolExit {
    /// 退出码；被信号终止时为 None
    pub code: Option<i32>,
}

impl ToolExit {
    /// 成功退出
    pub fn success() -> Self {
        Self { code: Some(0) }
    }

    /// 以指定退出码结束
    pub fn with_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    /// 是否成功
    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ToolExit {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

/// 外部工具执行接口
///
/// 流水线只依赖这个 trait，测试中替换为记录调用的假实现
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// 执行一次调用并等待退出
    async fn run(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
        timeout: Option<Duration>,
    ) -> Result<ToolExit, CommandError>;
}

/// 命令执行器
pub struct CommandRunner;

impl CommandRunner {
    /// 执行命令，继承 stdout/stderr
    ///
    /// # Arguments
    /// * `invocation` - 程序、参数和工作目录
    /// * `cancel` - 取消令牌
    /// * `timeout` - 超时时间，None 表示不限时
    pub async fn run_inherited(
        invocation: &Invocation,
        cancel: &CancellationToken,
        timeout: Option<Duration>,
    ) -> Result<ToolExit, CommandError> {
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.work_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandError::SpawnFailed {
                program: invocation.program_lossy(),
                source,
            })?;

        let deadline = async move {
            match timeout {
                Some(limit) => {
                    tokio::time::sleep(limit).await;
                    limit
                }
                None => std::future::pending().await,
            }
        };

        // 等待命令完成，支持超时和取消；取消优先
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                warn!(program = %invocation.program_lossy(), "Command cancelled, killing process");
                let _ = child.kill().await;
                Err(CommandError::Cancelled)
            }
            limit = deadline => {
                error!(
                    program = %invocation.program_lossy(),
                    "Command timed out after {:?}",
                    limit
                );
                let _ = child.kill().await;
                // 等待进程实际终止
                let _ = child.wait().await;
                Err(CommandError::Timeout(limit))
            }
            status = child.wait() => {
                let status = status.map_err(CommandError::WaitFailed)?;
                // 终端 Ctrl-C 同时发给子进程，子进程可能先于取消令牌退出
                if cancel.is_cancelled() {
                    return Err(CommandError::Cancelled);
                }
                Ok(ToolExit::from(status))
            }
        }
    }
}

#[async_trait]
impl ToolRunner for CommandRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
        timeout: Option<Duration>,
    ) -> Result<ToolExit, CommandError> {
        Self::run_inherited(invocation, cancel, timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_run_not_found() {
        let inv = Invocation::new("nonexistent_command_12345", PathBuf::from("."));
        let result = CommandRunner
            .run(&inv, &CancellationToken::new(), None)
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, CommandError::SpawnFailed { .. }));
        assert_eq!(err.exit_code(), 127);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_reports_exit_code() {
        let inv = Invocation::new("sh", PathBuf::from(".")).args(["-c", "exit 3"]);
        let exit = CommandRunner
            .run(&inv, &CancellationToken::new(), None)
            .await
            .unwrap();

        assert_eq!(exit, ToolExit::with_code(3));
        assert!(!exit.is_success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_success_in_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        let inv = Invocation::new("sh", dir.path()).args(["-c", "touch marker"]);
        let exit = CommandRunner
            .run(&inv, &CancellationToken::new(), None)
            .await
            .unwrap();

        assert!(exit.is_success());
        assert!(dir.path().join("marker").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_timeout_kills_process() {
        let inv = Invocation::new("sleep", PathBuf::from(".")).arg("5");
        let result = CommandRunner
            .run(
                &inv,
                &CancellationToken::new(),
                Some(Duration::from_millis(100)),
            )
            .await;

        assert!(matches!(result, Err(CommandError::Timeout(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let inv = Invocation::new("sleep", PathBuf::from(".")).arg("5");
        let result = CommandRunner.run(&inv, &cancel, None).await;

        assert!(matches!(result, Err(CommandError::Cancelled)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_wins_over_exited_child() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        // 进程立即退出，取消仍然优先
        let inv = Invocation::new("true", PathBuf::from("."));
        for _ in 0..20 {
            let result = CommandRunner.run(&inv, &cancel, None).await;
            assert!(matches!(result, Err(CommandError::Cancelled)));
        }
    }
}
