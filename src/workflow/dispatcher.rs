//! 步骤调度器 - 流程层
//!
//! 按顺序执行配方的每个步骤。每个步骤在单独的任务中运行，
//! 结果通过单槽通道交回；调度器同时等待结果和步骤超时。
//!
//! - 成功：记录成功结果，继续
//! - 硬失败：记录错误，按执行器策略清空暂存区，立即返回
//! - 软失败：记录错误，继续下一步
//! - 超时：清空暂存区，立即返回；被放弃的任务的结果会被丢弃

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::models::{Recipe, RecipeResult};
use crate::services::file_ops::purge_directory;
use crate::workflow::context::{RunContext, RunState};
use crate::workflow::executor::StepExecutor;
use crate::workflow::progress::{ProgressEvent, ProgressSink};

const TIMEOUT_MESSAGE: &str = "步骤超时";
const LOST_RESULT_MESSAGE: &str = "步骤任务异常退出，没有返回结果";

/// 本配方在整批配方中的位置，用于计算总进度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPosition {
    /// 之前的配方一共完成了多少步
    pub steps_before: usize,
    /// 整批配方的总步数
    pub total_steps: usize,
}

impl BatchPosition {
    /// 只运行一个配方
    pub fn single(recipe: &Recipe) -> Self {
        Self {
            steps_before: 0,
            total_steps: recipe.steps.len(),
        }
    }

    fn fraction(&self, steps_done: usize) -> f64 {
        if self.total_steps == 0 {
            return 1.0;
        }
        (self.steps_before + steps_done) as f64 / self.total_steps as f64
    }
}

/// 执行整个配方，返回唯一的 `RecipeResult`
pub async fn dispatch(
    recipe: &Recipe,
    executor: Arc<dyn StepExecutor>,
    ctx: Arc<RunContext>,
    progress: &dyn ProgressSink,
    position: BatchPosition,
) -> RecipeResult {
    let profile = executor.profile();
    let step_count = recipe.steps.len();
    let mut state = RunState::default();
    let mut result = RecipeResult::empty(&recipe.supplier);

    info!("{} 开始执行配方，共 {} 步", ctx, step_count);

    for (offset, step) in recipe.steps.iter().enumerate() {
        let n = offset + 1;
        let step_id = recipe.step_id(n, step);
        progress.report(ProgressEvent::Step {
            title: format!(
                "Downloading invoices from {} ({}/{}):",
                recipe.supplier, n, step_count
            ),
            description: step.description.clone(),
        });
        debug!("{} 执行步骤 {}: {}", ctx, step_id, step.description);

        let new_files_before = state.new_files;
        let (tx, rx) = oneshot::channel();
        {
            let executor = Arc::clone(&executor);
            let ctx = Arc::clone(&ctx);
            let step = step.clone();
            tokio::spawn(async move {
                let outcome = executor.execute(&step, &ctx, state).await;
                // 超时后接收方已被丢弃，结果作废
                let _ = tx.send(outcome);
            });
        }

        match tokio::time::timeout(profile.step_timeout, rx).await {
            Ok(Ok((step_result, next_state))) => {
                state = next_state;
                if step_result.is_success() {
                    result = RecipeResult::success(
                        &recipe.supplier,
                        step_id,
                        &step.description,
                        state.new_files,
                    );
                } else {
                    result = RecipeResult::error(
                        &recipe.supplier,
                        step_id,
                        &step.description,
                        &step_result.message,
                        state.new_files,
                    );
                    if step_result.break_recipe {
                        error!("❌ {} 步骤失败，中止配方: {}", ctx, step_result.message);
                        if profile.purge_staging {
                            purge_staging(&ctx);
                        }
                        return result;
                    }
                    warn!("⚠️ {} 步骤失败，继续执行: {}", ctx, step_result.message);
                }
            }
            Ok(Err(_)) => {
                error!("❌ {} {}", ctx, LOST_RESULT_MESSAGE);
                purge_staging(&ctx);
                return RecipeResult::error(
                    &recipe.supplier,
                    step_id,
                    &step.description,
                    LOST_RESULT_MESSAGE,
                    new_files_before,
                );
            }
            Err(_) => {
                error!("⏰ {} 步骤 {} 超过 {:?}", ctx, step_id, profile.step_timeout);
                purge_staging(&ctx);
                return RecipeResult::timeout(
                    &recipe.supplier,
                    step_id,
                    &step.description,
                    TIMEOUT_MESSAGE,
                    new_files_before,
                );
            }
        }

        progress.report(ProgressEvent::Percent(position.fraction(n)));
    }

    if profile.purge_staging {
        purge_staging(&ctx);
    }
    info!("✅ {} 配方执行完毕: {}", ctx, result.status_text);
    result
}

fn purge_staging(ctx: &RunContext) {
    if let Err(e) = purge_directory(&ctx.dirs.staging) {
        warn!("清空下载暂存区失败: {}", e);
    }
}
