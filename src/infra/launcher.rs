//! 本地服务与浏览器启动
//!
//! 两个动作都是 best-effort：失败只记录日志，不影响流水线退出码

use std::ffi::OsString;
use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::ServerBackend;
use crate::domain::{Invocation, LaunchPlan, ServerOutcome, ViewerOutcome};

/// 启动动作接口
///
/// 流水线只依赖这个 trait，测试中替换为记录调用的假实现
#[async_trait]
pub trait Launcher: Send + Sync {
    /// 在后台启动静态文件服务，不等待其退出
    async fn start_server(&self, plan: &LaunchPlan) -> ServerOutcome;

    /// 请求系统默认浏览器打开 URL
    async fn open_viewer(&self, plan: &LaunchPlan) -> ViewerOutcome;
}

/// 基于真实进程的启动器
pub struct SystemLauncher;

impl SystemLauncher {
    /// 构造服务进程的调用
    pub fn server_invocation(plan: &LaunchPlan) -> io::Result<Invocation> {
        let addr = plan.addr().to_string();
        let invocation = match &plan.server {
            ServerBackend::Builtin => {
                let exe = std::env::current_exe()?;
                Invocation::new(exe, &plan.serve_root)
                    .arg("serve")
                    .arg("--root")
                    .arg(&plan.serve_root)
                    .arg("--host")
                    .arg(plan.host.to_string())
                    .arg("--port")
                    .arg(plan.port.to_string())
            }
            ServerBackend::External { program } => Invocation::new(program, &plan.serve_root)
                .arg("--addr")
                .arg(addr)
                .arg(&plan.serve_root),
        };
        Ok(invocation)
    }

    /// 探测端口是否已被占用
    async fn port_in_use(plan: &LaunchPlan) -> io::Result<bool> {
        match TcpListener::bind(plan.addr()).await {
            Ok(listener) => {
                drop(listener);
                Ok(false)
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => Ok(true),
            Err(e) => Err(e),
        }
    }

    /// 以分离方式启动服务进程
    fn spawn_detached(invocation: &Invocation) -> io::Result<u32> {
        let mut command = std::process::Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .current_dir(&invocation.work_dir)
            .stdin(Stdio::null());

        // 独立进程组，终端的 Ctrl-C 不会波及后台服务
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let child = command.spawn()?;
        Ok(child.id())
    }
}

/// 平台默认浏览器的打开命令
pub fn viewer_command(url: &str) -> (OsString, Vec<OsString>) {
    if cfg!(target_os = "macos") {
        ("open".into(), vec![url.into()])
    } else if cfg!(windows) {
        // start 的第一个带引号参数是窗口标题
        (
            "cmd".into(),
            vec!["/C".into(), "start".into(), "".into(), url.into()],
        )
    } else {
        ("xdg-open".into(), vec![url.into()])
    }
}

fn print_url(url: &str, reason: &str) -> ViewerOutcome {
    println!("Open {} in your browser", url);
    ViewerOutcome::UrlPrinted {
        reason: reason.to_string(),
    }
}

#[async_trait]
impl Launcher for SystemLauncher {
    async fn start_server(&self, plan: &LaunchPlan) -> ServerOutcome {
        if !plan.serve {
            return ServerOutcome::Disabled;
        }

        match Self::port_in_use(plan).await {
            Ok(true) => {
                info!(
                    port = plan.port,
                    "Port already bound, assuming a previous server is serving the bundle"
                );
                return ServerOutcome::AlreadyRunning;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(port = plan.port, error = %e, "Failed to probe server port");
                return ServerOutcome::Failed {
                    error: e.to_string(),
                };
            }
        }

        let invocation = match Self::server_invocation(plan) {
            Ok(invocation) => invocation,
            Err(e) => {
                warn!(error = %e, "Failed to resolve server command");
                return ServerOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        info!(">>> {}", invocation);
        match Self::spawn_detached(&invocation) {
            Ok(pid) => {
                info!(
                    pid,
                    addr = %plan.addr(),
                    root = %plan.serve_root.display(),
                    "Static server started"
                );
                ServerOutcome::Started { pid: Some(pid) }
            }
            Err(e) => {
                warn!(
                    program = %invocation.program_lossy(),
                    error = %e,
                    "Failed to start static server"
                );
                ServerOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn open_viewer(&self, plan: &LaunchPlan) -> ViewerOutcome {
        if !plan.open_viewer {
            return print_url(&plan.url, "viewer disabled");
        }

        let (program, args) = viewer_command(&plan.url);
        spawn_viewer(&program, &args, &plan.url)
    }
}

/// 启动浏览器命令，不等待其退出
///
/// 子进程在后台任务中回收，退出状态只记录日志
fn spawn_viewer(program: &OsString, args: &[OsString], url: &str) -> ViewerOutcome {
    let spawned = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            warn!(program = ?program, error = %e, "No default viewer available");
            return print_url(url, "no default viewer");
        }
    };

    let program = program.clone();
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) if status.success() => {}
            Ok(status) => warn!(program = ?program, code = ?status.code(), "Viewer command failed"),
            Err(e) => warn!(program = ?program, error = %e, "Failed to wait for viewer command"),
        }
    });

    info!(url = %url, "Opened viewer");
    ViewerOutcome::Opened
}
