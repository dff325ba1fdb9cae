//! 流水线上下文
//!
//! 统一的执行上下文，包含运行 ID、取消令牌和超时配置

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// 流水线执行上下文
#[derive(Clone)]
pub struct PipelineContext {
    /// 运行 ID
    pub run_id: String,
    /// 取消令牌
    pub cancel_token: CancellationToken,
    /// 单阶段超时
    pub stage_timeout: Option<Duration>,
}

impl PipelineContext {
    /// 创建新的上下文
    pub fn new(stage_timeout: Option<Duration>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            cancel_token: CancellationToken::new(),
            stage_timeout,
        }
    }

    /// 输出进度信息
    pub fn log_stdout(&self, content: &str) {
        tracing::info!(run_id = %self.run_id, "{}", content);
    }

    /// 输出错误信息
    pub fn log_stderr(&self, content: &str) {
        tracing::error!(run_id = %self.run_id, "{}", content);
    }

    /// 检查是否被取消
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new(None)
    }
}
