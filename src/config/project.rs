//! 项目配置
//!
//! 从项目根目录的 Cargo.toml 读取包名

use serde::Deserialize;
use std::path::Path;

use crate::error::ConfigError;

#[derive(Debug, Deserialize)]
struct Manifest {
    package: Option<ManifestPackage>,
}

#[derive(Debug, Deserialize)]
struct ManifestPackage {
    name: Option<String>,
}

/// 读取 `<project_dir>/Cargo.toml` 中的 `[package].name`
pub fn read_package_name(project_dir: &Path) -> Result<String, ConfigError> {
    let path = project_dir.join("Cargo.toml");
    let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::ReadManifest {
        path: path.clone(),
        source,
    })?;
    let manifest: Manifest =
        toml::from_str(&content).map_err(|source| ConfigError::ParseManifest {
            path: path.clone(),
            source,
        })?;

    manifest
        .package
        .and_then(|p| p.name)
        .filter(|name| !name.is_empty())
        .ok_or(ConfigError::MissingPackageName { path })
}

/// cargo / wasm-bindgen 使用的模块名（`-` 替换为 `_`）
pub fn module_name(package: &str) -> String {
    package.replace('-', "_")
}
