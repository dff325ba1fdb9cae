//! 本地服务与浏览器启动的领域模型

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use serde::Serialize;

use crate::config::ServerBackend;

/// 第 4 阶段的启动计划
#[derive(Clone, Debug)]
pub struct LaunchPlan {
    /// 监听地址
    pub host: IpAddr,
    /// 监听端口
    pub port: u16,
    /// 静态服务根目录（bundle 目录的父目录）
    pub serve_root: PathBuf,
    /// 入口页面路径（用于检查是否存在）
    pub entry_page: PathBuf,
    /// 浏览器打开的 URL
    pub url: String,
    /// 服务实现
    pub server: ServerBackend,
    /// 是否启动服务
    pub serve: bool,
    /// 是否打开浏览器
    pub open_viewer: bool,
}

impl LaunchPlan {
    /// 监听的 socket 地址
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// 启动服务的结果
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServerOutcome {
    /// 已在后台启动
    Started { pid: Option<u32> },
    /// 端口已被占用，沿用之前的服务
    AlreadyRunning,
    /// 配置为不启动服务
    Disabled,
    /// 启动失败（不影响流水线结果）
    Failed { error: String },
}

/// 打开浏览器的结果
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViewerOutcome {
    /// 已交给系统默认浏览器
    Opened,
    /// 无法打开或未启用，已打印 URL
    UrlPrinted { reason: String },
}

/// 第 4 阶段的整体结果
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct LaunchOutcome {
    pub url: String,
    pub server: ServerOutcome,
    pub viewer: ViewerOutcome,
}

impl LaunchOutcome {
    /// 服务是否可用（已启动、沿用或被禁用）
    pub fn is_healthy(&self) -> bool {
        !matches!(self.server, ServerOutcome::Failed { .. })
    }

    /// 单行摘要，写入阶段信息
    pub fn summary(&self) -> String {
        let server = match &self.server {
            ServerOutcome::Started { pid: Some(pid) } => format!("server started (pid {})", pid),
            ServerOutcome::Started { pid: None } => "server started".to_string(),
            ServerOutcome::AlreadyRunning => "port in use, reusing running server".to_string(),
            ServerOutcome::Disabled => "server disabled".to_string(),
            ServerOutcome::Failed { error } => format!("server failed: {}", error),
        };
        let viewer = match &self.viewer {
            ViewerOutcome::Opened => "viewer opened".to_string(),
            ViewerOutcome::UrlPrinted { reason } => format!("url printed ({})", reason),
        };
        format!("{}; {}; {}", server, viewer, self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(server: ServerOutcome) -> LaunchOutcome {
        LaunchOutcome {
            url: "http://127.0.0.1:8888/docs/index.html".to_string(),
            server,
            viewer: ViewerOutcome::Opened,
        }
    }

    #[test]
    fn test_port_in_use_is_healthy() {
        assert!(outcome(ServerOutcome::AlreadyRunning).is_healthy());
        assert!(outcome(ServerOutcome::Disabled).is_healthy());
        assert!(!outcome(ServerOutcome::Failed {
            error: "boom".to_string()
        })
        .is_healthy());
    }

    #[test]
    fn test_summary() {
        let summary = outcome(ServerOutcome::Started { pid: Some(42) }).summary();
        assert_eq!(
            summary,
            "server started (pid 42); viewer opened; http://127.0.0.1:8888/docs/index.html"
        );
    }
}
