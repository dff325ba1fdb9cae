//! 第 3 阶段：wasm-opt 原地改写 bundle 中的 wasm
//!
//! fast-math 默认开启，允许算术和超越函数重结合、降低精度，
//! 优化结果与严格浮点构建不保证逐位一致。
//! 需要时用 `--no-fast-math` / `BUNDLE_FAST_MATH=false` 关闭

use std::ffi::OsString;
use std::path::Path;

use crate::config::{BundleConfig, OptimizerConfig};
use crate::domain::Invocation;

use super::Stage;

pub const STAGE_ID: &str = "optimize";

/// 对 `bundle_wasm` 原地执行 `wasm-opt` 的参数
pub fn optimizer_args(bundle_wasm: &Path, opts: &OptimizerConfig) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![bundle_wasm.into(), opts.level.flag().into()];
    if opts.fast_math {
        args.push("--fast-math".into());
    }
    if opts.debug_symbols {
        args.push("-g".into());
    }
    args.push("-o".into());
    args.push(bundle_wasm.into());
    args
}

/// `bundle_wasm` 必须是 bindgen 阶段声明的输出路径
pub fn stage(config: &BundleConfig, bundle_wasm: &Path) -> Stage {
    let invocation = Invocation::new(&config.tools.wasm_opt, &config.project_dir)
        .args(optimizer_args(bundle_wasm, &config.optimizer));

    Stage {
        id: STAGE_ID,
        display_name: "wasm-opt",
        invocation,
        requires: vec![bundle_wasm.to_path_buf()],
        produces: vec![bundle_wasm.to_path_buf()],
    }
}
