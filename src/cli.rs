//! 命令行参数
//!
//! 不带参数时执行完整流水线；所有参数都只是覆盖内置默认值

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::config::env::constants::{DEFAULT_HOST, DEFAULT_PORT};
use crate::config::{BundleOverrides, OptLevel, ServerBackend};

#[derive(Debug, Parser)]
#[command(
    name = "xjp-wasm-bundler",
    version,
    about = "Build, bind, optimize and serve a browser WebAssembly bundle"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve a directory over HTTP (used as the default background server)
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Directory to serve
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    #[arg(long, default_value_t = DEFAULT_HOST)]
    pub host: IpAddr,

    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

impl ServeArgs {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[derive(Debug, Default, Args)]
pub struct PipelineArgs {
    /// Cargo package to build (default: [package].name of ./Cargo.toml)
    #[arg(long)]
    pub package: Option<String>,

    /// Bundle output directory (default: docs)
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Address the static server listens on (default: 127.0.0.1)
    #[arg(long)]
    pub host: Option<IpAddr>,

    /// Port the static server listens on (default: 8888)
    #[arg(long)]
    pub port: Option<u16>,

    /// wasm-opt level: O0, O1, O2, O3, O4, Os, Oz (default: O2)
    #[arg(long)]
    pub opt_level: Option<OptLevel>,

    /// Keep strict IEEE floating point semantics in wasm-opt
    #[arg(long)]
    pub no_fast_math: bool,

    /// Keep debug symbols in the optimized module
    #[arg(long)]
    pub debug_symbols: bool,

    /// Print the URL instead of opening a browser
    #[arg(long)]
    pub no_open: bool,

    /// Do not start the static server
    #[arg(long)]
    pub no_serve: bool,

    /// Static server: `builtin` or `external:<program>`
    #[arg(long)]
    pub server: Option<ServerBackend>,

    /// Kill a stage that runs longer than this many seconds
    #[arg(long, value_name = "SECS")]
    pub stage_timeout: Option<u64>,

    /// Write a JSON run report to this path
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl PipelineArgs {
    /// 转换为配置覆盖项；未给出的开关保持 None，交给环境变量或默认值
    pub fn into_overrides(self) -> BundleOverrides {
        BundleOverrides {
            package: self.package,
            out_dir: self.out_dir,
            host: self.host,
            port: self.port,
            opt_level: self.opt_level,
            fast_math: self.no_fast_math.then_some(false),
            debug_symbols: self.debug_symbols.then_some(true),
            open_viewer: self.no_open.then_some(false),
            serve: self.no_serve.then_some(false),
            server: self.server,
            stage_timeout: self.stage_timeout.map(Duration::from_secs),
            report_path: self.report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_arguments_runs_pipeline_with_defaults() {
        let cli = Cli::try_parse_from(["xjp-wasm-bundler"]).unwrap();
        assert!(cli.command.is_none());

        let overrides = cli.pipeline.into_overrides();
        assert!(overrides.port.is_none());
        assert!(overrides.fast_math.is_none());
        assert!(overrides.debug_symbols.is_none());
        assert!(overrides.open_viewer.is_none());
    }

    #[test]
    fn test_pipeline_flags() {
        let cli = Cli::try_parse_from([
            "xjp-wasm-bundler",
            "--port",
            "9000",
            "--opt-level",
            "Oz",
            "--no-fast-math",
            "--debug-symbols",
            "--no-open",
            "--server",
            "external:basic-http-server",
            "--stage-timeout",
            "120",
        ])
        .unwrap();
        let overrides = cli.pipeline.into_overrides();

        assert_eq!(overrides.port, Some(9000));
        assert_eq!(overrides.opt_level, Some(OptLevel::Oz));
        assert_eq!(overrides.fast_math, Some(false));
        assert_eq!(overrides.debug_symbols, Some(true));
        assert_eq!(overrides.open_viewer, Some(false));
        assert_eq!(overrides.serve, None);
        assert_eq!(
            overrides.server,
            Some(ServerBackend::External {
                program: "basic-http-server".to_string()
            })
        );
        assert_eq!(overrides.stage_timeout, Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_invalid_opt_level_rejected() {
        assert!(Cli::try_parse_from(["xjp-wasm-bundler", "--opt-level", "O9"]).is_err());
    }

    #[test]
    fn test_serve_subcommand() {
        let cli = Cli::try_parse_from([
            "xjp-wasm-bundler",
            "serve",
            "--root",
            "/srv/project",
            "--port",
            "8080",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Serve(args)) => {
                assert_eq!(args.root, PathBuf::from("/srv/project"));
                assert_eq!(args.addr().to_string(), "127.0.0.1:8080");
            }
            None => panic!("expected serve subcommand"),
        }
    }
}
