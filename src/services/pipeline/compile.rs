//! 第 1 阶段：针对 wasm 目标的 cargo release 构建

use crate::config::env::constants::WASM_TARGET;
use crate::config::BundleConfig;
use crate::domain::Invocation;

use super::Stage;

pub const STAGE_ID: &str = "compile";

/// 构建 `cargo build` 阶段
///
/// 产物位于由目标三元组和 release profile 决定的 cargo 输出路径
pub fn stage(config: &BundleConfig) -> Stage {
    let invocation = Invocation::new(&config.tools.cargo, &config.project_dir)
        .args(["build", "--release", "--lib", "--target", WASM_TARGET, "-p"])
        .arg(&config.package);

    Stage {
        id: STAGE_ID,
        display_name: "Cargo Build",
        invocation,
        requires: Vec::new(),
        produces: vec![config.artifact_path()],
    }
}
