//! 环境变量配置加载
//!
//! 优先级：命令行参数 > 环境变量 > 内置默认值。配置在流水线开始时一次性解析

use std::env;
use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::config::project::{module_name, read_package_name};
use crate::error::ConfigError;

use self::constants::*;

/// wasm-opt 优化级别
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OptLevel {
    O0,
    O1,
    #[default]
    O2,
    O3,
    O4,
    Os,
    Oz,
}

impl OptLevel {
    /// wasm-opt 命令行参数
    pub fn flag(&self) -> &'static str {
        match self {
            OptLevel::O0 => "-O0",
            OptLevel::O1 => "-O1",
            OptLevel::O2 => "-O2",
            OptLevel::O3 => "-O3",
            OptLevel::O4 => "-O4",
            OptLevel::Os => "-Os",
            OptLevel::Oz => "-Oz",
        }
    }
}

impl fmt::Display for OptLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.flag()[1..])
    }
}

impl FromStr for OptLevel {
    type Err = ConfigError;

    /// 接受 `O2`、`-O2`、`2`、`s`、`z` 等写法
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let level = raw.trim_start_matches('-');
        let level = level
            .strip_prefix('O')
            .or_else(|| level.strip_prefix('o'))
            .unwrap_or(level);

        match level {
            "0" => Ok(OptLevel::O0),
            "1" => Ok(OptLevel::O1),
            "2" => Ok(OptLevel::O2),
            "3" => Ok(OptLevel::O3),
            "4" => Ok(OptLevel::O4),
            "s" => Ok(OptLevel::Os),
            "z" => Ok(OptLevel::Oz),
            _ => Err(ConfigError::InvalidOptLevel(raw.to_string())),
        }
    }
}

/// 静态文件服务实现
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ServerBackend {
    /// 自身的 `serve` 子命令
    #[default]
    Builtin,
    /// 外部程序，调用方式 `<program> --addr <host:port> <root>`
    External { program: String },
}

impl FromStr for ServerBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.eq_ignore_ascii_case("builtin") {
            return Ok(ServerBackend::Builtin);
        }
        match raw.strip_prefix("external:") {
            Some(program) if !program.trim().is_empty() => Ok(ServerBackend::External {
                program: program.trim().to_string(),
            }),
            _ => Err(ConfigError::InvalidServer(raw.to_string())),
        }
    }
}

/// wasm-opt 配置
///
/// fast-math 默认开启：以放弃 IEEE 严格浮点一致性换取体积和速度。
/// 需要逐位一致数值结果的调用方应显式关闭
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptimizerConfig {
    pub level: OptLevel,
    pub fast_math: bool,
    /// 保留调试符号（`-g`）
    pub debug_symbols: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            level: OptLevel::default(),
            fast_math: true,
            debug_symbols: false,
        }
    }
}

/// 外部工具路径
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolPaths {
    pub cargo: String,
    pub wasm_bindgen: String,
    pub wasm_opt: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            cargo: "cargo".to_string(),
            wasm_bindgen: "wasm-bindgen".to_string(),
            wasm_opt: "wasm-opt".to_string(),
        }
    }
}

/// 命令行覆盖项，None 表示未指定
#[derive(Clone, Debug, Default)]
pub struct BundleOverrides {
    pub package: Option<String>,
    pub out_dir: Option<PathBuf>,
    pub host: Option<IpAddr>,
    pub port: Option<u16>,
    pub opt_level: Option<OptLevel>,
    pub fast_math: Option<bool>,
    pub debug_symbols: Option<bool>,
    pub open_viewer: Option<bool>,
    pub serve: Option<bool>,
    pub server: Option<ServerBackend>,
    pub stage_timeout: Option<Duration>,
    pub report_path: Option<PathBuf>,
}

/// 打包流水线配置
#[derive(Clone, Debug)]
pub struct BundleConfig {
    /// 项目根目录（源码树，只读）
    pub project_dir: PathBuf,
    /// Cargo 包名
    pub package: String,
    /// cargo 输出目录
    pub target_dir: PathBuf,
    /// bundle 输出目录
    pub out_dir: PathBuf,
    /// 服务监听地址
    pub host: IpAddr,
    /// 服务监听端口
    pub port: u16,
    /// wasm-opt 配置
    pub optimizer: OptimizerConfig,
    /// 外部工具路径
    pub tools: ToolPaths,
    /// 服务实现
    pub server: ServerBackend,
    /// 是否启动服务
    pub serve: bool,
    /// 是否打开浏览器
    pub open_viewer: bool,
    /// 单阶段超时，None 表示不限时
    pub stage_timeout: Option<Duration>,
    /// JSON 报告输出路径
    pub report_path: Option<PathBuf>,
}

type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

impl BundleConfig {
    /// 使用内置默认值创建配置
    pub fn new(project_dir: impl Into<PathBuf>, package: impl Into<String>) -> Self {
        Self {
            project_dir: project_dir.into(),
            package: package.into(),
            target_dir: PathBuf::from(DEFAULT_TARGET_DIR),
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            host: DEFAULT_HOST,
            port: DEFAULT_PORT,
            optimizer: OptimizerConfig::default(),
            tools: ToolPaths::default(),
            server: ServerBackend::default(),
            serve: true,
            open_viewer: true,
            stage_timeout: None,
            report_path: None,
        }
    }

    /// 从环境变量加载配置，再叠加命令行覆盖项
    pub fn from_env(
        project_dir: impl Into<PathBuf>,
        overrides: BundleOverrides,
    ) -> Result<Self, ConfigError> {
        Self::resolve(project_dir, overrides, |key| env::var(key).ok())
    }

    /// 使用给定的变量查找函数解析配置
    pub fn resolve<F>(
        project_dir: impl Into<PathBuf>,
        overrides: BundleOverrides,
        lookup: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup: Lookup<'_> = &lookup;
        let project_dir = project_dir.into();

        // Package - 未指定时读取 Cargo.toml
        let package = match overrides
            .package
            .or_else(|| lookup("BUNDLE_PACKAGE"))
            .filter(|p| !p.trim().is_empty())
        {
            Some(package) => package,
            None => read_package_name(&project_dir)?,
        };

        let mut config = Self::new(project_dir, package);

        if let Some(dir) = lookup("CARGO_TARGET_DIR").filter(|v| !v.is_empty()) {
            config.target_dir = PathBuf::from(dir);
        }

        config.out_dir = overrides
            .out_dir
            .or_else(|| lookup("BUNDLE_OUT_DIR").filter(|v| !v.is_empty()).map(PathBuf::from))
            .unwrap_or(config.out_dir);

        config.host = overrides
            .host
            .or_else(|| parse_var(lookup, "BUNDLE_HOST"))
            .unwrap_or(config.host);

        config.port = overrides
            .port
            .or_else(|| parse_var(lookup, "BUNDLE_PORT"))
            .unwrap_or(config.port);

        config.optimizer.level = overrides
            .opt_level
            .or_else(|| parse_var(lookup, "BUNDLE_OPT_LEVEL"))
            .unwrap_or(config.optimizer.level);

        config.optimizer.fast_math = overrides
            .fast_math
            .or_else(|| bool_var(lookup, "BUNDLE_FAST_MATH"))
            .unwrap_or(config.optimizer.fast_math);

        config.optimizer.debug_symbols = overrides
            .debug_symbols
            .or_else(|| bool_var(lookup, "BUNDLE_DEBUG_SYMBOLS"))
            .unwrap_or(config.optimizer.debug_symbols);

        config.open_viewer = overrides
            .open_viewer
            .or_else(|| bool_var(lookup, "BUNDLE_OPEN_VIEWER"))
            .unwrap_or(config.open_viewer);

        config.serve = overrides
            .serve
            .or_else(|| bool_var(lookup, "BUNDLE_SERVE"))
            .unwrap_or(config.serve);

        config.server = overrides
            .server
            .or_else(|| parse_var(lookup, "BUNDLE_SERVER"))
            .unwrap_or(config.server);

        // 0 视为不限时
        config.stage_timeout = overrides
            .stage_timeout
            .or_else(|| {
                parse_var::<u64>(lookup, "BUNDLE_STAGE_TIMEOUT_SECS").map(Duration::from_secs)
            })
            .filter(|d| !d.is_zero());

        config.report_path = overrides
            .report_path
            .or_else(|| lookup("BUNDLE_REPORT").filter(|v| !v.is_empty()).map(PathBuf::from));

        // Tools
        if let Some(cargo) = lookup("CARGO").filter(|v| !v.is_empty()) {
            config.tools.cargo = cargo;
        }
        if let Some(bindgen) = lookup("WASM_BINDGEN").filter(|v| !v.is_empty()) {
            config.tools.wasm_bindgen = bindgen;
        }
        if let Some(opt) = lookup("WASM_OPT").filter(|v| !v.is_empty()) {
            config.tools.wasm_opt = opt;
        }

        Ok(config)
    }

    /// cargo / wasm-bindgen 生成文件使用的模块名
    pub fn module_name(&self) -> String {
        module_name(&self.package)
    }

    /// 相对路径按项目根目录解析
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }

    /// 第 1 阶段产物：`<target>/wasm32-unknown-unknown/release/<module>.wasm`
    pub fn artifact_path(&self) -> PathBuf {
        self.resolve_path(&self.target_dir)
            .join(WASM_TARGET)
            .join(RELEASE_PROFILE_DIR)
            .join(format!("{}.wasm", self.module_name()))
    }

    /// bundle 目录
    pub fn bundle_dir(&self) -> PathBuf {
        self.resolve_path(&self.out_dir)
    }

    /// bundle 中的 wasm 文件：`<out>/<module>_bg.wasm`
    pub fn bundle_wasm_path(&self) -> PathBuf {
        self.bundle_dir()
            .join(format!("{}{}.wasm", self.module_name(), BUNDLE_WASM_SUFFIX))
    }

    /// 运行时 shim：`<out>/<module>.js`
    pub fn shim_path(&self) -> PathBuf {
        self.bundle_dir().join(format!("{}.js", self.module_name()))
    }

    /// 入口页面（预先存在，不由流水线生成）
    pub fn entry_page(&self) -> PathBuf {
        self.bundle_dir().join(ENTRY_PAGE)
    }

    /// 静态服务根目录：bundle 目录的父目录
    pub fn serve_root(&self) -> PathBuf {
        let bundle_dir = self.bundle_dir();
        match (bundle_dir.parent(), bundle_dir.file_name()) {
            (Some(parent), Some(_)) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            (Some(_), Some(_)) => PathBuf::from("."),
            _ => bundle_dir,
        }
    }

    /// 浏览器打开的 URL
    pub fn viewer_url(&self) -> String {
        let addr = std::net::SocketAddr::new(self.host, self.port);
        let bundle_dir = self.bundle_dir();
        match bundle_dir.file_name().filter(|_| bundle_dir.parent().is_some()) {
            Some(name) => format!("http://{}/{}/{}", addr, name.to_string_lossy(), ENTRY_PAGE),
            None => format!("http://{}/{}", addr, ENTRY_PAGE),
        }
    }
}

/// 解析环境变量，非法值记录警告并忽略
fn parse_var<T: FromStr>(lookup: Lookup<'_>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    if raw.trim().is_empty() {
        return None;
    }
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring invalid environment variable");
            None
        }
    }
}

/// 解析布尔环境变量
fn bool_var(lookup: Lookup<'_>, key: &str) -> Option<bool> {
    let raw = lookup(key)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "" => None,
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!(key, value = %raw, "Ignoring invalid boolean environment variable");
            None
        }
    }
}

/// 常量
pub mod constants {
    use std::net::{IpAddr, Ipv4Addr};

    /// 编译目标
    pub const WASM_TARGET: &str = "wasm32-unknown-unknown";

    /// release profile 的输出目录
    pub const RELEASE_PROFILE_DIR: &str = "release";

    /// 默认 cargo 输出目录
    pub const DEFAULT_TARGET_DIR: &str = "target";

    /// 默认 bundle 目录
    pub const DEFAULT_OUT_DIR: &str = "docs";

    /// wasm-bindgen 输出 wasm 文件名后缀
    pub const BUNDLE_WASM_SUFFIX: &str = "_bg";

    /// 入口页面
    pub const ENTRY_PAGE: &str = "index.html";

    /// 默认监听地址
    pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    /// 默认监听端口
    pub const DEFAULT_PORT: u16 = 8888;
}
