//! 配方运行器 - 编排层
//!
//! ## 职责
//!
//! 1. **准备目录**：创建供应商的下载暂存区和文档库目录
//! 2. **资源管理**：每个配方启动一个浏览器会话，结束后关闭
//! 3. **选择执行器**：按配方类型选 `BrowserSteps` 或 `OAuth2Steps`
//! 4. **批量运行**：顺序执行配方，计算整批进度，写运行日志
//!
//! 本模块不做任何步骤级判断，步骤语义全部委托给 workflow 层。

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{ChromeSession, DocumentArchive};
use crate::models::{CredentialSource, Recipe, RecipeKind, RecipeResult};
use crate::services::file_ops::prepare_supplier_dirs;
use crate::utils::logging;
use crate::workflow::{
    dispatch, BatchPosition, BrowserSteps, OAuth2Steps, ProgressSink, RunContext, StepExecutor,
};

pub struct RecipeRunner {
    config: Config,
    credentials: Arc<dyn CredentialSource>,
    archive: Arc<dyn DocumentArchive>,
}

impl RecipeRunner {
    pub fn new(
        config: Config,
        credentials: Arc<dyn CredentialSource>,
        archive: Arc<dyn DocumentArchive>,
    ) -> Self {
        Self {
            config,
            credentials,
            archive,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 运行单个配方
    ///
    /// 浏览器启动失败以 `Err` 返回；步骤层面的失败都体现在 `RecipeResult` 中。
    pub async fn run_recipe(
        &self,
        recipe: &Recipe,
        progress: &dyn ProgressSink,
        position: BatchPosition,
    ) -> AppResult<RecipeResult> {
        let dirs = prepare_supplier_dirs(&self.config.documents_root, &recipe.supplier)?;
        let credentials = self.credentials.credentials(&recipe.supplier)?;
        let ctx = Arc::new(RunContext::new(
            recipe.supplier.clone(),
            recipe.version.clone(),
            dirs,
            credentials,
        ));

        let session_config = Config {
            headless: self.config.headless_for(recipe.kind()),
            ..self.config.clone()
        };
        let session = Arc::new(ChromeSession::launch(&session_config).await?);

        let executor: Arc<dyn StepExecutor> = match recipe.kind() {
            RecipeKind::Browser => Arc::new(BrowserSteps::new(
                session.clone(),
                self.archive.clone(),
                &self.config,
            )),
            RecipeKind::OAuth2 => Arc::new(OAuth2Steps::new(
                session.clone(),
                self.archive.clone(),
                &self.config,
            )),
        };
        info!("{} 执行器: {:?}", ctx, recipe.kind());

        let result = match executor.prepare(&ctx).await {
            Ok(()) => dispatch(recipe, executor.clone(), ctx.clone(), progress, position).await,
            Err(e) => {
                error!("{} 准备失败: {}", ctx, e);
                RecipeResult::error(&recipe.supplier, String::new(), "", &e.to_string(), 0)
            }
        };
        drop(executor);

        // 超时被放弃的步骤任务可能仍持有会话
        match Arc::try_unwrap(session) {
            Ok(session) => session.close().await,
            Err(shared) => {
                warn!("{} 仍有步骤任务持有浏览器会话，取消会话", ctx);
                shared.cancellation().cancel();
            }
        }

        info!("{} 🏁 {}", ctx, result.status_text);
        Ok(result)
    }

    /// 顺序运行所有配方
    ///
    /// 单个配方失败（包括浏览器启动失败）不影响后续配方。
    pub async fn run_all(
        &self,
        recipes: &[Recipe],
        progress: &dyn ProgressSink,
    ) -> Vec<RecipeResult> {
        let mut results = Vec::with_capacity(recipes.len());

        for (recipe, position) in recipes.iter().zip(batch_positions(recipes)) {
            let result = match self.run_recipe(recipe, progress, position).await {
                Ok(result) => result,
                Err(e) => {
                    error!("❌ 配方 {} 无法运行: {}", recipe.supplier, e);
                    RecipeResult::error(&recipe.supplier, String::new(), "", &e.to_string(), 0)
                }
            };

            if let Err(e) = logging::append_result(&self.config.output_log_file, &result) {
                warn!("写入运行日志失败: {}", e);
            }
            results.push(result);
        }

        results
    }
}

/// 每个配方在整批中的位置
pub fn batch_positions(recipes: &[Recipe]) -> Vec<BatchPosition> {
    let total_steps = recipes.iter().map(|r| r.steps.len()).sum();
    let mut steps_before = 0;
    recipes
        .iter()
        .map(|recipe| {
            let position = BatchPosition {
                steps_before,
                total_steps,
            };
            steps_before += recipe.steps.len();
            position
        })
        .collect()
}
