//! 浏览器配方的步骤 - 流程层
//!
//! 每个步骤只是对 `PageDriver` 和 `file_ops` 的一次或几次调用。
//! 任何底层错误都是硬失败。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{AppResult, RecipeError};
use crate::infrastructure::{DocumentArchive, DownloadMode, Locator, PageDriver, WaitUntil};
use crate::models::{Step, StepAction, StepResult};
use crate::services::file_ops::{move_matching, unzip_all};
use crate::services::placeholders::fill_credentials;
use crate::workflow::context::{RunContext, RunState};
use crate::workflow::executor::{ExecutionProfile, StepExecutor};

pub struct BrowserSteps<P> {
    page: Arc<P>,
    archive: Arc<dyn DocumentArchive>,
    profile: ExecutionProfile,
    max_downloads: usize,
    click_delay: Duration,
}

impl<P: PageDriver> BrowserSteps<P> {
    pub fn new(page: Arc<P>, archive: Arc<dyn DocumentArchive>, config: &Config) -> Self {
        Self {
            page,
            archive,
            profile: ExecutionProfile::browser(config),
            max_downloads: config.max_downloads_per_step,
            click_delay: config.download_click_delay(),
        }
    }

    async fn run_action(
        &self,
        action: &StepAction,
        ctx: &RunContext,
        state: &mut RunState,
    ) -> AppResult<()> {
        match action {
            StepAction::Open { url } => {
                debug!("打开页面: {}", url);
                self.page.navigate(url).await
            }
            StepAction::RemoveElement { selector } => {
                debug!("删除元素: {}", selector);
                self.page.remove_element(selector).await
            }
            StepAction::Click { selector } => {
                debug!("点击: {}", selector);
                self.page.click(&Locator::css(selector)).await
            }
            StepAction::Type { selector, value } => {
                debug!("输入: {}", selector);
                let text = fill_credentials(value, &ctx.credentials);
                self.page.type_text(selector, &text).await
            }
            StepAction::Sleep { seconds } => {
                debug!("等待 {} 秒", seconds);
                sleep(Duration::from_secs(*seconds)).await;
                Ok(())
            }
            StepAction::WaitFor { selector } => {
                debug!("等待元素: {}", selector);
                self.page
                    .wait_for(&Locator::css(selector), WaitUntil::Ready, None)
                    .await
            }
            StepAction::DownloadAll { selector, value } => self.download_all(selector, value).await,
            StepAction::Transform { value } => transform(value, ctx),
            StepAction::Move { value } => self.move_documents(value, ctx, state),
            StepAction::RunScript { value } => {
                debug!("执行脚本");
                self.page.run_script(value).await
            }
            StepAction::RunScriptDownloadUrls { value } => self.download_urls(value, ctx).await,
            other => Err(RecipeError::UnsupportedAction {
                action: other.name().to_string(),
            }
            .into()),
        }
    }

    /// 逐个点击命中的节点触发下载，最多 `max_downloads` 个，等全部下载完成
    async fn download_all(&self, selector: &str, trigger_suffix: &str) -> AppResult<()> {
        debug!("批量下载: {} + {}", selector, trigger_suffix);
        self.page
            .wait_for(&Locator::css(selector), WaitUntil::Ready, None)
            .await?;
        let paths = self.page.node_paths(selector).await?;

        let selected = paths.len().min(self.max_downloads);
        if paths.len() > selected {
            info!("命中 {} 个节点，只下载前 {} 个", paths.len(), selected);
        }

        let baseline = self.page.downloads().completed();
        for (index, path) in paths.iter().take(selected).enumerate() {
            if index > 0 {
                sleep(self.click_delay).await;
            }
            let trigger = Locator::xpath(format!("{}{}", path, trigger_suffix));
            debug!("触发下载: {}", trigger.as_str());
            self.page.click(&Locator::xpath(path.as_str())).await?;
            self.page.wait_for(&trigger, WaitUntil::Visible, None).await?;
            self.page.click(&trigger).await?;
        }

        self.page.downloads().wait_for(baseline + selected).await?;
        info!("✓ {} 个下载全部完成", selected);
        Ok(())
    }

    fn move_documents(&self, pattern: &str, ctx: &RunContext, state: &mut RunState) -> AppResult<()> {
        debug!("移动文件: {}", pattern);
        let regex = Regex::new(pattern).map_err(|e| RecipeError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        state.new_files = 0;
        state.new_files = move_matching(&ctx.dirs, &regex, self.archive.as_ref())?;
        info!("✓ 新入库 {} 个文件", state.new_files);
        Ok(())
    }

    /// 求值得到地址列表，逐个导航触发下载
    async fn download_urls(&self, expression: &str, ctx: &RunContext) -> AppResult<()> {
        let urls = self.page.eval_object_values(expression).await?;
        info!("脚本返回 {} 个下载地址", urls.len());
        for url in urls {
            debug!("下载: {}", url);
            self.page
                .set_download_behavior(DownloadMode::AllowAndName, &ctx.dirs.staging)
                .await?;
            self.page.navigate(&url).await?;
        }
        Ok(())
    }
}

fn transform(value: &str, ctx: &RunContext) -> AppResult<()> {
    match value {
        "unzip" => {
            let count = unzip_all(&ctx.dirs.staging)?;
            info!("📦 解压了 {} 个压缩包", count);
        }
        other => warn!("未知的 transform: {}，跳过", other),
    }
    Ok(())
}

#[async_trait]
impl<P: PageDriver + 'static> StepExecutor for BrowserSteps<P> {
    fn profile(&self) -> ExecutionProfile {
        self.profile
    }

    async fn prepare(&self, ctx: &RunContext) -> AppResult<()> {
        self.page
            .set_download_behavior(DownloadMode::Allow, &ctx.dirs.staging)
            .await
    }

    async fn execute(
        &self,
        step: &Step,
        ctx: &RunContext,
        mut state: RunState,
    ) -> (StepResult, RunState) {
        let result = match self.run_action(&step.action, ctx, &mut state).await {
            Ok(()) => StepResult::success(),
            Err(e) => {
                error!("{} {} 失败: {}", ctx, step.action.name(), e);
                StepResult::from_error(&e, true)
            }
        };
        (result, state)
    }
}
