//! 发布流水线
//!
//! 编译 → wasm-bindgen → wasm-opt → 本地服务，严格顺序执行，任一阶段失败立即停止

pub mod bindgen;
pub mod compile;
pub mod context;
pub mod launch;
pub mod optimize;

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::BundleConfig;
use crate::domain::{
    Invocation, LaunchOutcome, LaunchPlan, PipelineReport, PipelineStage, PipelineStatus,
};
use crate::error::{PipelineError, PipelineResult};
use crate::infra::{CommandError, Launcher, ToolRunner};

pub use bindgen::BindgenOutputs;
pub use context::PipelineContext;

/// 流水线中的一个工具阶段
#[derive(Clone, Debug)]
pub struct Stage {
    /// 阶段标识
    pub id: &'static str,
    /// 显示名称
    pub display_name: &'static str,
    /// 外部工具调用
    pub invocation: Invocation,
    /// 执行前必须存在的文件
    pub requires: Vec<PathBuf>,
    /// 执行成功后必须存在的文件
    pub produces: Vec<PathBuf>,
}

/// 完整的流水线定义
#[derive(Clone, Debug)]
pub struct Pipeline {
    /// 工具阶段（按顺序）
    pub stages: Vec<Stage>,
    /// 最后的启动阶段
    pub launch: LaunchPlan,
}

impl Pipeline {
    /// 根据配置构建流水线
    pub fn from_config(config: &BundleConfig) -> Self {
        let outputs = BindgenOutputs::for_config(config);
        let stages = vec![
            compile::stage(config),
            bindgen::stage(config, &outputs),
            // 优化阶段的输入直接取自 bindgen 声明的输出
            optimize::stage(config, &outputs.bundle_wasm),
        ];

        Self {
            stages,
            launch: launch::plan(config),
        }
    }

    /// 按标识查找阶段
    pub fn stage(&self, id: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == id)
    }

    /// 报告中的全部阶段（含启动阶段）
    fn report_stages(&self) -> Vec<PipelineStage> {
        self.stages
            .iter()
            .map(|s| PipelineStage::new(s.id, s.display_name))
            .chain(std::iter::once(PipelineStage::new(
                launch::STAGE_ID,
                "Serve & Open",
            )))
            .collect()
    }
}

/// 一次运行的结果
#[derive(Debug)]
pub struct PipelineOutcome {
    pub report: PipelineReport,
    /// 第一个致命错误
    pub error: Option<PipelineError>,
    /// 启动阶段结果（仅在前三个阶段成功时存在）
    pub launch: Option<LaunchOutcome>,
}

impl PipelineOutcome {
    /// 进程退出码
    pub fn exit_code(&self) -> i32 {
        self.error.as_ref().map(PipelineError::exit_code).unwrap_or(0)
    }

    /// 是否成功
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// 流水线驱动器
pub struct PipelineDriver {
    runner: Arc<dyn ToolRunner>,
    launcher: Arc<dyn Launcher>,
}

impl PipelineDriver {
    pub fn new(runner: Arc<dyn ToolRunner>, launcher: Arc<dyn Launcher>) -> Self {
        Self { runner, launcher }
    }

    /// 执行流水线
    pub async fn run(&self, pipeline: &Pipeline, ctx: &PipelineContext) -> PipelineOutcome {
        let mut report = PipelineReport::new(ctx.run_id.clone(), pipeline.report_stages());
        let total = pipeline.stages.len() + 1;

        for (index, stage) in pipeline.stages.iter().enumerate() {
            report.stages[index].start();
            ctx.log_stdout(&format!(
                "[{}/{}] {}...",
                index + 1,
                total,
                stage.display_name
            ));

            match self.execute_stage(stage, ctx).await {
                Ok(()) => {
                    report.stages[index].finish(true, None);
                    tracing::info!(
                        stage = stage.id,
                        duration_ms = ?report.stages[index].duration_ms,
                        "Stage finished"
                    );
                }
                Err(err) => {
                    ctx.log_stderr(&format!("=== Pipeline failed: {} ===", err));
                    tracing::error!(
                        stage = err.stage(),
                        exit_code = err.exit_code(),
                        "Aborting remaining stages"
                    );
                    report.stages[index].finish(false, Some(err.to_string()));
                    for later in &mut report.stages[index + 1..] {
                        later.skip(Some(format!("stage `{}` failed", err.stage())));
                    }
                    report.complete(PipelineStatus::Failed, Some(err.exit_code()));
                    return PipelineOutcome {
                        report,
                        error: Some(err),
                        launch: None,
                    };
                }
            }
        }

        // 启动阶段：失败不影响退出码
        let launch_index = pipeline.stages.len();
        report.stages[launch_index].start();
        ctx.log_stdout(&format!("[{}/{}] Serve & Open...", total, total));

        let outcome = launch::execute(ctx, self.launcher.clone(), &pipeline.launch).await;
        if !outcome.is_healthy() {
            tracing::warn!(summary = %outcome.summary(), "Launch stage degraded");
        }
        report.stages[launch_index].finish(outcome.is_healthy(), Some(outcome.summary()));

        report.complete(PipelineStatus::Success, Some(0));
        ctx.log_stdout(&format!("=== Bundle ready: {} ===", outcome.url));

        PipelineOutcome {
            report,
            error: None,
            launch: Some(outcome),
        }
    }

    /// 执行单个工具阶段
    async fn execute_stage(&self, stage: &Stage, ctx: &PipelineContext) -> PipelineResult<()> {
        if ctx.is_cancelled() {
            return Err(PipelineError::Command {
                stage: stage.id,
                source: CommandError::Cancelled,
            });
        }

        if let Some(path) = stage.requires.iter().find(|p| !p.exists()) {
            return Err(PipelineError::MissingArtifact {
                stage: stage.id,
                path: path.clone(),
            });
        }

        ctx.log_stdout(&format!(">>> {}", stage.invocation));

        let exit = self
            .runner
            .run(&stage.invocation, &ctx.cancel_token, ctx.stage_timeout)
            .await
            .map_err(|source| PipelineError::Command {
                stage: stage.id,
                source,
            })?;

        if !exit.is_success() {
            return Err(PipelineError::StageFailed {
                stage: stage.id,
                code: exit.code,
            });
        }

        if let Some(path) = stage.produces.iter().find(|p| !p.exists()) {
            return Err(PipelineError::MissingArtifact {
                stage: stage.id,
                path: path.clone(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ServerOutcome, StageStatus, ViewerOutcome};
    use crate::infra::command::ToolExit;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    /// 假工具：写出确定的产物，可让某个工具失败
    struct FakeTools {
        config: BundleConfig,
        fail_program: Option<String>,
        calls: Mutex<Vec<Invocation>>,
    }

    impl FakeTools {
        fn new(config: &BundleConfig) -> Self {
            Self {
                config: config.clone(),
                fail_program: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(config: &BundleConfig, program: &str) -> Self {
            Self {
                fail_program: Some(program.to_string()),
                ..Self::new(config)
            }
        }

        fn programs(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|c| c.program_lossy())
                .collect()
        }
    }

    fn write(path: &Path, bytes: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    #[async_trait]
    impl ToolRunner for FakeTools {
        async fn run(
            &self,
            invocation: &Invocation,
            _cancel: &CancellationToken,
            _timeout: Option<Duration>,
        ) -> Result<ToolExit, CommandError> {
            self.calls.lock().unwrap().push(invocation.clone());
            let program = invocation.program_lossy();
            if self.fail_program.as_deref() == Some(program.as_str()) {
                return Ok(ToolExit::with_code(101));
            }
            match program.as_str() {
                "cargo" => write(&self.config.artifact_path(), &[0u8; 4096]),
                "wasm-bindgen" => {
                    write(&self.config.bundle_wasm_path(), &[1u8; 4096]);
                    write(&self.config.shim_path(), b"let wasm_bindgen;");
                }
                "wasm-opt" => write(&self.config.bundle_wasm_path(), &[2u8; 1024]),
                _ => {}
            }
            Ok(ToolExit::success())
        }
    }

    struct FakeLauncher;

    #[async_trait]
    impl Launcher for FakeLauncher {
        async fn start_server(&self, _plan: &LaunchPlan) -> ServerOutcome {
            ServerOutcome::Started { pid: Some(1) }
        }

        async fn open_viewer(&self, _plan: &LaunchPlan) -> ViewerOutcome {
            ViewerOutcome::Opened
        }
    }

    fn config_in(dir: &Path) -> BundleConfig {
        BundleConfig::new(dir, "demo-app")
    }

    #[tokio::test]
    async fn test_full_run_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let tools = Arc::new(FakeTools::new(&config));
        let driver = PipelineDriver::new(tools.clone(), Arc::new(FakeLauncher));

        let outcome = driver
            .run(&Pipeline::from_config(&config), &PipelineContext::default())
            .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(tools.programs(), vec!["cargo", "wasm-bindgen", "wasm-opt"]);
        assert_eq!(
            outcome.report.executed_stages(),
            vec!["compile", "bindgen", "optimize", "launch"]
        );
        assert_eq!(outcome.report.status, PipelineStatus::Success);
        assert_eq!(
            std::fs::read(config.bundle_wasm_path()).unwrap(),
            vec![2u8; 1024]
        );
    }

    #[tokio::test]
    async fn test_compile_failure_stops_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let tools = Arc::new(FakeTools::failing(&config, "cargo"));
        let driver = PipelineDriver::new(tools.clone(), Arc::new(FakeLauncher));

        let outcome = driver
            .run(&Pipeline::from_config(&config), &PipelineContext::default())
            .await;

        assert_eq!(outcome.exit_code(), 101);
        assert_eq!(tools.programs(), vec!["cargo"]);
        assert!(outcome.launch.is_none());
        assert!(!config.bundle_dir().exists());
        assert_eq!(outcome.report.executed_stages(), vec!["compile"]);
        for id in ["bindgen", "optimize", "launch"] {
            assert_eq!(
                outcome.report.stage(id).unwrap().status,
                StageStatus::Skipped
            );
        }
    }

    #[tokio::test]
    async fn test_bindgen_failure_skips_optimizer() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let tools = Arc::new(FakeTools::failing(&config, "wasm-bindgen"));
        let driver = PipelineDriver::new(tools.clone(), Arc::new(FakeLauncher));

        let outcome = driver
            .run(&Pipeline::from_config(&config), &PipelineContext::default())
            .await;

        assert!(matches!(
            outcome.error,
            Some(PipelineError::StageFailed {
                stage: "bindgen",
                ..
            })
        ));
        assert_eq!(tools.programs(), vec!["cargo", "wasm-bindgen"]);
        assert!(outcome.launch.is_none());
        for id in ["optimize", "launch"] {
            assert_eq!(
                outcome.report.stage(id).unwrap().status,
                StageStatus::Skipped
            );
        }
    }

    #[tokio::test]
    async fn test_optimizer_failure_skips_launch() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let tools = Arc::new(FakeTools::failing(&config, "wasm-opt"));
        let driver = PipelineDriver::new(tools.clone(), Arc::new(FakeLauncher));

        let outcome = driver
            .run(&Pipeline::from_config(&config), &PipelineContext::default())
            .await;

        assert_eq!(outcome.exit_code(), 101);
        assert!(outcome.launch.is_none());
        assert_eq!(tools.programs(), vec!["cargo", "wasm-bindgen", "wasm-opt"]);
        assert_eq!(
            outcome.report.stage("optimize").unwrap().status,
            StageStatus::Failed
        );
        assert_eq!(
            outcome.report.stage("launch").unwrap().status,
            StageStatus::Skipped
        );
        assert_eq!(outcome.report.status, PipelineStatus::Failed);
        // 优化失败时 bundle 保持 bindgen 的输出
        assert_eq!(
            std::fs::read(config.bundle_wasm_path()).unwrap(),
            vec![1u8; 4096]
        );
    }

    #[tokio::test]
    async fn test_missing_declared_output_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        // cargo 成功退出但没有生成产物
        let tools = Arc::new(FakeTools {
            config: BundleConfig::new(dir.path().join("elsewhere"), "demo-app"),
            fail_program: None,
            calls: Mutex::new(Vec::new()),
        });
        let driver = PipelineDriver::new(tools.clone(), Arc::new(FakeLauncher));

        let outcome = driver
            .run(&Pipeline::from_config(&config), &PipelineContext::default())
            .await;

        assert!(matches!(
            outcome.error,
            Some(PipelineError::MissingArtifact {
                stage: "compile",
                ..
            })
        ));
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(tools.programs(), vec!["cargo"]);
    }

    #[tokio::test]
    async fn test_cancelled_run_spawns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let tools = Arc::new(FakeTools::new(&config));
        let driver = PipelineDriver::new(tools.clone(), Arc::new(FakeLauncher));

        let ctx = PipelineContext::default();
        ctx.cancel_token.cancel();
        let outcome = driver.run(&Pipeline::from_config(&config), &ctx).await;

        assert_eq!(outcome.exit_code(), 130);
        assert!(tools.programs().is_empty());
    }

    #[test]
    fn test_optimizer_targets_bindgen_output() {
        let config = BundleConfig::new("/project", "demo-app");
        let pipeline = Pipeline::from_config(&config);

        let bindgen = pipeline.stage("bindgen").unwrap();
        let optimize = pipeline.stage("optimize").unwrap();
        let bundle = &bindgen.produces[0];

        assert_eq!(bundle, &PathBuf::from("/project/docs/demo_app_bg.wasm"));
        assert_eq!(optimize.requires, vec![bundle.clone()]);
        assert_eq!(optimize.invocation.args.first(), Some(&bundle.clone().into_os_string()));
        let out_index = optimize.invocation.args_lossy().iter().position(|a| a == "-o").unwrap();
        assert_eq!(
            PathBuf::from(&optimize.invocation.args[out_index + 1]),
            *bundle
        );
    }

    #[test]
    fn test_stage_order() {
        let pipeline = Pipeline::from_config(&BundleConfig::new("/project", "demo-app"));
        let ids: Vec<&str> = pipeline.stages.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["compile", "bindgen", "optimize"]);
    }
}
