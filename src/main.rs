//! XJP WASM Bundler
//!
//! Usage:
//! - Full pipeline: `xjp-wasm-bundler`
//! - Keep debug symbols: `xjp-wasm-bundler --debug-symbols`
//! - Strict float semantics: `xjp-wasm-bundler --no-fast-math`
//! - Serve a directory: `xjp-wasm-bundler serve --root . --port 8888`

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use xjp_wasm_bundler::cli::{Cli, Commands};
use xjp_wasm_bundler::services::static_server;
use xjp_wasm_bundler::{run_pipeline, BundleConfig};

/// 初始化日志，默认 info，可用 RUST_LOG 覆盖
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let rt = tokio::runtime::Runtime::new().context("Failed to create runtime")?;

    match cli.command {
        Some(Commands::Serve(args)) => {
            rt.block_on(static_server::serve(args.root.clone(), args.addr()))?;
            Ok(ExitCode::SUCCESS)
        }
        None => {
            let project_dir = std::env::current_dir().context("Failed to read current directory")?;
            let config = BundleConfig::from_env(project_dir, cli.pipeline.into_overrides())?;
            let outcome = rt.block_on(run_pipeline(config));
            // exit_code 保证在 0..=255 内
            Ok(ExitCode::from(outcome.exit_code() as u8))
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
