//! 统一错误处理
//!
//! `ConfigError` 覆盖配置解析，`PipelineError` 覆盖流水线执行；
//! 每个致命错误都映射到进程退出码

use std::path::PathBuf;

use thiserror::Error;

use crate::infra::command::CommandError;

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    ReadManifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    ParseManifest {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{} has no [package].name; pass --package or set BUNDLE_PACKAGE", path.display())]
    MissingPackageName { path: PathBuf },

    #[error("Invalid optimization level `{0}` (expected one of O0, O1, O2, O3, O4, Os, Oz)")]
    InvalidOptLevel(String),

    #[error("Invalid server backend `{0}` (expected `builtin` or `external:<program>`)")]
    InvalidServer(String),
}

/// 流水线错误
///
/// 只有前三个阶段会产生；启动阶段的失败仅记录日志
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Stage `{stage}` failed ({})", describe_exit(*code))]
    StageFailed {
        stage: &'static str,
        code: Option<i32>,
    },

    #[error("Stage `{stage}` expected {} to exist", path.display())]
    MissingArtifact { stage: &'static str, path: PathBuf },

    #[error("Stage `{stage}`: {source}")]
    Command {
        stage: &'static str,
        #[source]
        source: CommandError,
    },
}

impl PipelineError {
    /// 出错的阶段
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::StageFailed { stage, .. }
            | PipelineError::MissingArtifact { stage, .. }
            | PipelineError::Command { stage, .. } => stage,
        }
    }

    /// 进程退出码：优先使用失败工具自身的退出码
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::StageFailed {
                code: Some(code), ..
            } if (1..=255).contains(code) => *code,
            PipelineError::StageFailed { .. } => 1,
            PipelineError::MissingArtifact { .. } => 1,
            PipelineError::Command { source, .. } => source.exit_code(),
        }
    }
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code: {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// 便捷类型别名
pub type PipelineResult<T> = Result<T, PipelineError>;
