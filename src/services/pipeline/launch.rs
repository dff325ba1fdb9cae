//! 第 4 阶段：启动静态服务并打开浏览器
//!
//! 两个动作互不等待，分别在独立任务中发出，任何一个失败都不会让流水线失败

use std::sync::Arc;

use crate::config::BundleConfig;
use crate::domain::{LaunchOutcome, LaunchPlan, ServerOutcome, ViewerOutcome};
use crate::infra::Launcher;

use super::context::PipelineContext;

pub const STAGE_ID: &str = "launch";

pub fn plan(config: &BundleConfig) -> LaunchPlan {
    LaunchPlan {
        host: config.host,
        port: config.port,
        serve_root: config.serve_root(),
        entry_page: config.entry_page(),
        url: config.viewer_url(),
        server: config.server.clone(),
        serve: config.serve,
        open_viewer: config.open_viewer,
    }
}

/// 发出两个启动动作并收集结果
///
/// 只等待进程启动请求本身，服务进程在返回后继续运行
pub async fn execute(
    ctx: &PipelineContext,
    launcher: Arc<dyn Launcher>,
    plan: &LaunchPlan,
) -> LaunchOutcome {
    if !plan.entry_page.exists() {
        tracing::warn!(
            path = %plan.entry_page.display(),
            "Entry page not found, the viewer will show a 404"
        );
    }

    ctx.log_stdout(&format!(">>> serve {} on {}", plan.serve_root.display(), plan.addr()));

    let plan = Arc::new(plan.clone());

    let server_task = {
        let launcher = launcher.clone();
        let plan = plan.clone();
        tokio::spawn(async move { launcher.start_server(&plan).await })
    };
    let viewer_task = {
        let plan = plan.clone();
        tokio::spawn(async move { launcher.open_viewer(&plan).await })
    };

    let (server, viewer) = tokio::join!(server_task, viewer_task);

    let server = server.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Server launch task panicked");
        ServerOutcome::Failed {
            error: e.to_string(),
        }
    });
    let viewer = viewer.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Viewer launch task panicked");
        ViewerOutcome::UrlPrinted {
            reason: e.to_string(),
        }
    });

    LaunchOutcome {
        url: plan.url.clone(),
        server,
        viewer,
    }
}
