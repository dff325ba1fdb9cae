//! 流水线相关领域模型

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 流水线运行状态
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Running,
    Success,
    Failed,
}

/// 阶段状态
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

/// 流水线阶段信息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineStage {
    /// 阶段标识 (e.g., "compile", "bindgen", "optimize", "launch")
    pub name: String,
    /// 显示名称 (e.g., "Cargo Build", "wasm-opt")
    pub display_name: String,
    /// 开始时间
    pub started_at: Option<DateTime<Utc>>,
    /// 结束时间
    pub finished_at: Option<DateTime<Utc>>,
    /// 持续时间（毫秒）
    pub duration_ms: Option<i64>,
    /// 阶段状态
    pub status: StageStatus,
    /// 附加信息
    pub message: Option<String>,
}

impl PipelineStage {
    /// 创建新的待执行阶段
    pub fn new(name: &str, display_name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            started_at: None,
            finished_at: None,
            duration_ms: None,
            status: StageStatus::Pending,
            message: None,
        }
    }

    /// 开始执行阶段
    pub fn start(&mut self) {
        self.started_at = Some(Utc::now());
        self.status = StageStatus::Running;
    }

    /// 完成阶段
    pub fn finish(&mut self, success: bool, message: Option<String>) {
        let now = Utc::now();
        self.finished_at = Some(now);
        self.status = if success {
            StageStatus::Success
        } else {
            StageStatus::Failed
        };
        self.message = message;
        if let Some(started) = self.started_at {
            self.duration_ms = Some((now - started).num_milliseconds());
        }
    }

    /// 跳过阶段
    pub fn skip(&mut self, reason: Option<String>) {
        self.status = StageStatus::Skipped;
        self.message = reason;
    }

    /// 是否已实际执行（成功或失败）
    pub fn was_executed(&self) -> bool {
        matches!(self.status, StageStatus::Success | StageStatus::Failed)
    }
}

/// 一次流水线运行的报告
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub status: PipelineStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub stages: Vec<PipelineStage>,
}

impl PipelineReport {
    /// 创建新报告，所有阶段处于 pending
    pub fn new(run_id: impl Into<String>, stages: Vec<PipelineStage>) -> Self {
        Self {
            run_id: run_id.into(),
            status: PipelineStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            exit_code: None,
            stages,
        }
    }

    /// 设置运行完成
    pub fn complete(&mut self, status: PipelineStatus, exit_code: Option<i32>) {
        self.status = status;
        self.finished_at = Some(Utc::now());
        self.exit_code = exit_code;
    }

    /// 按标识查找阶段
    pub fn stage(&self, name: &str) -> Option<&PipelineStage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// 已执行阶段的名称，按执行顺序
    pub fn executed_stages(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|s| s.was_executed())
            .map(|s| s.name.as_str())
            .collect()
    }

    /// 写出 JSON 报告
    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let body = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, body)
    }
}
