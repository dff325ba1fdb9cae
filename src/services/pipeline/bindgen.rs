//! 第 2 阶段：`--no-modules` 模式的 wasm-bindgen
//!
//! 生成的加载器暴露全局 `wasm_bindgen` 函数，页面无需模块系统；不生成 TypeScript 声明

use std::path::PathBuf;

use crate::config::BundleConfig;
use crate::domain::Invocation;

use super::Stage;

pub const STAGE_ID: &str = "bindgen";

/// wasm-bindgen 写入 bundle 目录的文件
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindgenOutputs {
    /// `<out>/<module>_bg.wasm`，优化阶段原地改写的文件
    pub bundle_wasm: PathBuf,
    /// `<out>/<module>.js`
    pub shim: PathBuf,
}

impl BindgenOutputs {
    pub fn for_config(config: &BundleConfig) -> Self {
        Self {
            bundle_wasm: config.bundle_wasm_path(),
            shim: config.shim_path(),
        }
    }
}

pub fn stage(config: &BundleConfig, outputs: &BindgenOutputs) -> Stage {
    let artifact = config.artifact_path();
    let invocation = Invocation::new(&config.tools.wasm_bindgen, &config.project_dir)
        .arg(&artifact)
        .arg("--out-dir")
        .arg(config.bundle_dir())
        .args(["--no-modules", "--no-typescript"]);

    Stage {
        id: STAGE_ID,
        display_name: "wasm-bindgen",
        invocation,
        requires: vec![artifact],
        produces: vec![outputs.bundle_wasm.clone(), outputs.shim.clone()],
    }
}
