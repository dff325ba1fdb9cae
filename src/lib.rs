//! XJP WASM Bundler - 浏览器 wasm 发布流水线
//!
//! cargo build → wasm-bindgen → wasm-opt → 本地静态服务 + 打开浏览器

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod services;

use std::sync::Arc;

use tracing::{info, warn};

pub use config::BundleConfig;
pub use services::pipeline::{Pipeline, PipelineContext, PipelineDriver, PipelineOutcome};

use infra::{CommandRunner, SystemLauncher};

/// 使用真实工具执行完整流水线
///
/// Ctrl-C 会取消正在执行的阶段；配置了报告路径时写出 JSON 报告
pub async fn run_pipeline(config: BundleConfig) -> PipelineOutcome {
    let ctx = PipelineContext::new(config.stage_timeout);

    info!(
        run_id = %ctx.run_id,
        package = %config.package,
        out_dir = %config.bundle_dir().display(),
        opt_level = %config.optimizer.level,
        fast_math = config.optimizer.fast_math,
        debug_symbols = config.optimizer.debug_symbols,
        "Starting release pipeline"
    );

    let cancel = ctx.cancel_token.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl-C, cancelling pipeline");
            cancel.cancel();
        }
    });

    let driver = PipelineDriver::new(Arc::new(CommandRunner), Arc::new(SystemLauncher));
    let outcome = driver.run(&Pipeline::from_config(&config), &ctx).await;
    signal_task.abort();

    if let Some(path) = &config.report_path {
        let path = config.resolve_path(path);
        match outcome.report.write_json(&path) {
            Ok(()) => info!(path = %path.display(), "Pipeline report written"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to write pipeline report"),
        }
    }

    outcome
}
