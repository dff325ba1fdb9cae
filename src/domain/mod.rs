//! 领域模型模块
//!
//! 纯数据结构，不依赖 tokio 和进程执行

pub mod invocation;
pub mod launch;
pub mod pipeline;

// Re-exports for convenience
pub use invocation::Invocation;
pub use launch::{LaunchOutcome, LaunchPlan, ServerOutcome, ViewerOutcome};
pub use pipeline::{PipelineReport, PipelineStage, PipelineStatus, StageStatus};
