//! 内置静态文件服务
//!
//! `serve` 子命令的实现：以 bundle 目录的父目录为根提供静态文件，无动态路由

use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::info;

/// 构建静态文件路由
pub fn router(root: &Path) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(root).append_index_html_on_directories(true))
        .layer(TraceLayer::new_for_http())
}

/// 绑定端口并运行，直到收到 Ctrl-C
pub async fn serve(root: PathBuf, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(addr = %addr, root = %root.display(), "Static server listening");
    serve_listener(listener, root, shutdown_signal())
        .await
        .context("Static server error")?;
    info!("Static server stopped");
    Ok(())
}

/// 在已绑定的 listener 上运行，`shutdown` 完成后优雅退出
pub async fn serve_listener<F>(
    listener: TcpListener,
    root: PathBuf,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(&root))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
