//! 浏览器会话 - 基础设施层
//!
//! 每次配方运行启动一个浏览器，持有 page、事件处理任务和运行级取消令牌。
//! 所有后台监听任务都挂在同一个 `CancellationToken` 上，会话结束或安全超时时一起退出。

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::{
    DownloadProgressState, EventDownloadProgress, SetDownloadBehaviorBehavior,
    SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::fetch::{
    self, ContinueRequestParams, EventRequestPaused, FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, LoaderId, ResourceType};
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, NavigateParams, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, BrowserError};
use crate::infrastructure::page_driver::{DownloadMode, Locator, PageDriver, WaitUntil};
use crate::infrastructure::{DownloadTracker, JsExecutor};

/// 等待元素时的轮询间隔
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 浏览器把导航转成下载时返回的错误
const DOWNLOAD_ABORTED: &str = "net::ERR_ABORTED";

/// 关闭命令和进程退出各自的等待上限
const EXIT_GRACE: Duration = Duration::from_secs(5);

pub struct ChromeSession {
    browser: Browser,
    executor: JsExecutor,
    downloads: DownloadTracker,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ChromeSession {
    /// 启动浏览器并完成会话级设置
    ///
    /// 包括：安全超时、生命周期事件、图片拦截、下载进度监听。
    pub async fn launch(config: &Config) -> AppResult<Self> {
        info!("🚀 启动浏览器...");
        let browser_config = browser_config(config)?;

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
            error!("启动浏览器失败: {}", e);
            BrowserError::LaunchFailed {
                source: Box::new(e),
            }
        })?;
        debug!("浏览器启动成功");

        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();

        // 在后台处理浏览器事件
        let token = cancel.clone();
        tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = handler.next() => match event {
                        Some(Err(e)) => debug!("浏览器事件处理出错: {}", e),
                        Some(Ok(())) => {}
                        None => break,
                    },
                }
            }
        }));

        // 安全超时：到点后取消整个会话
        let token = cancel.clone();
        let limit = config.session_timeout();
        tasks.push(tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = sleep(limit) => {
                    warn!("⏰ 浏览器会话超过 {:?}，强制取消", limit);
                    token.cancel();
                }
            }
        }));

        // 添加短暂延迟以等待浏览器状态同步
        sleep(Duration::from_millis(300)).await;

        let page = browser.new_page("about:blank").await.map_err(|e| {
            error!("创建页面失败: {}", e);
            BrowserError::PageCreationFailed {
                source: Box::new(e),
            }
        })?;

        match browser.version().await {
            Ok(version) => info!("✓ 浏览器版本: {}", version.product),
            Err(e) => warn!("无法获取浏览器版本: {}", e),
        }

        page.execute(SetLifecycleEventsEnabledParams::new(true))
            .await?;

        let downloads = DownloadTracker::new();
        tasks.push(spawn_image_blocker(&page, cancel.clone()).await?);
        tasks.push(spawn_download_listener(&page, downloads.clone(), cancel.clone()).await?);

        info!("✅ 浏览器会话已就绪");
        Ok(Self {
            browser,
            executor: JsExecutor::new(page),
            downloads,
            cancel,
            tasks,
        })
    }

    fn page(&self) -> &Page {
        self.executor.page()
    }

    /// 会话级取消令牌
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 关闭浏览器，结束所有后台任务
    pub async fn close(mut self) {
        shutdown(&mut self.browser, &self.cancel, EXIT_GRACE).await;
        for task in self.tasks.drain(..) {
            task.abort();
        }
        info!("🛑 浏览器已关闭");
    }

    /// 在会话取消时提前结束 `fut`
    async fn guarded<T>(&self, fut: impl Future<Output = AppResult<T>>) -> AppResult<T> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(BrowserError::Cancelled.into()),
            result = fut => result,
        }
    }

    /// 轮询直到元素满足条件
    async fn poll_element(
        &self,
        locator: &Locator,
        until: WaitUntil,
        timeout: Option<Duration>,
    ) -> AppResult<()> {
        let script = element_probe_script(locator, until);
        let poll = async {
            loop {
                // 页面切换时执行上下文会被销毁，此时当作"还没出现"
                if self.executor.eval_as::<bool>(script.as_str()).await.unwrap_or(false) {
                    return;
                }
                sleep(POLL_INTERVAL).await;
            }
        };

        match timeout {
            Some(limit) => tokio::time::timeout(limit, poll).await.map_err(|_| {
                AppError::element_failed(locator.as_str(), format!("{:?} 内未出现", limit))
            }),
            None => {
                poll.await;
                Ok(())
            }
        }
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.cancel.cancel();
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[async_trait]
impl PageDriver for ChromeSession {
    async fn navigate(&self, url: &str) -> AppResult<()> {
        self.guarded(async {
            let mut lifecycle = self.page().event_listener::<EventLifecycleEvent>().await?;
            let navigated = self.page().execute(NavigateParams::new(url)).await?;

            if let Some(reason) = navigated.error_text.as_deref() {
                if reason == DOWNLOAD_ABORTED {
                    debug!("导航变成了下载: {}", url);
                    return Ok(());
                }
                return Err(BrowserError::NavigationFailed {
                    url: url.to_string(),
                    reason: reason.to_string(),
                }
                .into());
            }

            let loader = navigated.loader_id.clone();
            while let Some(event) = lifecycle.next().await {
                if settles(&event.name, &event.loader_id, loader.as_ref()) {
                    debug!("页面已稳定: {}", url);
                    return Ok(());
                }
            }
            Err(BrowserError::Cancelled.into())
        })
        .await
    }

    async fn remove_element(&self, selector: &str) -> AppResult<()> {
        let script = format!(
            r#"
            (() => {{
                const el = document.querySelector({selector});
                el.parentNode.removeChild(el);
            }})()
            "#,
            selector = js_string(selector)
        );
        self.guarded(async {
            self.executor
                .run(script)
                .await
                .map_err(|e| AppError::element_failed(selector, e))
        })
        .await
    }

    async fn click(&self, locator: &Locator) -> AppResult<()> {
        self.guarded(async {
            self.poll_element(locator, WaitUntil::Ready, None).await?;
            let element = match locator {
                Locator::Css(selector) => self.page().find_element(selector.as_str()).await,
                Locator::XPath(path) => self.page().find_xpath(path.as_str()).await,
            }
            .map_err(|e| AppError::element_failed(locator.as_str(), e))?;
            element
                .click()
                .await
                .map_err(|e| AppError::element_failed(locator.as_str(), e))?;
            Ok(())
        })
        .await
    }

    async fn type_text(&self, selector: &str, text: &str) -> AppResult<()> {
        self.guarded(async {
            self.poll_element(&Locator::css(selector), WaitUntil::Ready, None)
                .await?;
            let element = self
                .page()
                .find_element(selector)
                .await
                .map_err(|e| AppError::element_failed(selector, e))?;
            element
                .click()
                .await
                .map_err(|e| AppError::element_failed(selector, e))?
                .type_str(text)
                .await
                .map_err(|e| AppError::element_failed(selector, e))?;
            Ok(())
        })
        .await
    }

    async fn wait_for(
        &self,
        locator: &Locator,
        until: WaitUntil,
        timeout: Option<Duration>,
    ) -> AppResult<()> {
        self.guarded(self.poll_element(locator, until, timeout)).await
    }

    async fn node_paths(&self, selector: &str) -> AppResult<Vec<String>> {
        let script = format!(
            r#"
            (() => {{
                const fullPath = (node) => {{
                    const parts = [];
                    for (let el = node; el && el.nodeType === Node.ELEMENT_NODE; el = el.parentNode) {{
                        let index = 1;
                        for (let sib = el.previousElementSibling; sib; sib = sib.previousElementSibling) {{
                            if (sib.nodeName === el.nodeName) index++;
                        }}
                        parts.unshift(el.nodeName.toLowerCase() + '[' + index + ']');
                    }}
                    return '/' + parts.join('/');
                }};
                return Array.from(document.querySelectorAll({selector})).map(fullPath);
            }})()
            "#,
            selector = js_string(selector)
        );
        self.guarded(self.executor.eval_as::<Vec<String>>(script))
            .await
    }

    async fn run_script(&self, script: &str) -> AppResult<()> {
        self.guarded(self.executor.run(script)).await
    }

    async fn eval_object_values(&self, expression: &str) -> AppResult<Vec<String>> {
        let script = format!("Object.values({})", expression);
        let values = self
            .guarded(self.executor.eval_as::<Vec<serde_json::Value>>(script))
            .await?;
        Ok(values
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect())
    }

    async fn set_download_behavior(&self, mode: DownloadMode, dir: &Path) -> AppResult<()> {
        let behavior = match mode {
            DownloadMode::Allow => SetDownloadBehaviorBehavior::Allow,
            DownloadMode::AllowAndName => SetDownloadBehaviorBehavior::AllowAndName,
        };
        let params = SetDownloadBehaviorParams::builder()
            .behavior(behavior)
            .download_path(dir.to_string_lossy().to_string())
            .events_enabled(true)
            .build()
            .map_err(|message| BrowserError::ConfigurationFailed { message })?;
        self.guarded(async {
            self.page().execute(params).await?;
            debug!("下载目录: {} ({:?})", dir.display(), mode);
            Ok(())
        })
        .await
    }

    async fn current_url(&self) -> AppResult<String> {
        self.guarded(async { Ok(self.page().url().await?.unwrap_or_default()) })
            .await
    }

    fn downloads(&self) -> &DownloadTracker {
        &self.downloads
    }
}

fn browser_config(config: &Config) -> AppResult<BrowserConfig> {
    let mut builder = BrowserConfig::builder();
    builder = if config.headless {
        builder.new_headless_mode()
    } else {
        builder.with_head()
    };
    if let Some(executable) = &config.chrome_executable {
        builder = builder.chrome_executable(executable);
    }
    builder
        .args(vec![
            "--disable-gpu",
            "--no-sandbox",
            "--disable-dev-shm-usage",
        ])
        .build()
        .map_err(|message| {
            error!("配置浏览器失败: {}", message);
            BrowserError::ConfigurationFailed { message }.into()
        })
}

/// 拦截所有请求：图片直接失败，其余原样放行
async fn spawn_image_blocker(page: &Page, cancel: CancellationToken) -> AppResult<JoinHandle<()>> {
    let mut paused = page.event_listener::<EventRequestPaused>().await?;
    page.execute(fetch::EnableParams::default()).await?;

    let page = page.clone();
    Ok(tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = paused.next() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            let outcome = match interception_for(&event.resource_type) {
                Interception::Fail => page
                    .execute(FailRequestParams::new(
                        event.request_id.clone(),
                        ErrorReason::BlockedByClient,
                    ))
                    .await
                    .map(|_| ()),
                Interception::Continue => page
                    .execute(ContinueRequestParams::new(event.request_id.clone()))
                    .await
                    .map(|_| ()),
            };
            if let Err(e) = outcome {
                debug!("处理被拦截的请求失败: {}", e);
            }
        }
    }))
}

/// 被拦截请求的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interception {
    Fail,
    Continue,
}

fn interception_for(resource: &ResourceType) -> Interception {
    match resource {
        ResourceType::Image => Interception::Fail,
        _ => Interception::Continue,
    }
}

/// 生命周期事件是否表示本次导航已稳定
///
/// 同文档导航没有 loader id，此时任何 `networkIdle` 都算数。
fn settles(event_name: &str, loader: &LoaderId, expected: Option<&LoaderId>) -> bool {
    event_name == "networkIdle" && expected.map_or(true, |id| id == loader)
}

/// 浏览器进程的关闭操作
#[async_trait]
trait BrowserProcess: Send {
    /// 发送关闭命令（需要事件处理任务仍在运行）
    async fn request_close(&mut self) -> AppResult<()>;
    async fn wait_exit(&mut self) -> AppResult<()>;
    async fn force_kill(&mut self) -> AppResult<()>;
}

#[async_trait]
impl BrowserProcess for Browser {
    async fn request_close(&mut self) -> AppResult<()> {
        self.close().await?;
        Ok(())
    }

    async fn wait_exit(&mut self) -> AppResult<()> {
        self.wait().await?;
        Ok(())
    }

    async fn force_kill(&mut self) -> AppResult<()> {
        match self.kill().await {
            Some(result) => Ok(result?),
            None => Ok(()),
        }
    }
}

/// 先关闭浏览器，再取消事件处理任务
///
/// 进程在 `grace` 内没有退出时强制结束。
async fn shutdown<B: BrowserProcess>(browser: &mut B, cancel: &CancellationToken, grace: Duration) {
    match tokio::time::timeout(grace, browser.request_close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("关闭浏览器失败: {}", e),
        Err(_) => warn!("⏰ 浏览器没有响应关闭命令"),
    }
    match tokio::time::timeout(grace, browser.wait_exit()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("等待浏览器退出失败: {}", e),
        Err(_) => {
            warn!("⏰ 浏览器 {:?} 内未退出，强制结束", grace);
            if let Err(e) = browser.force_kill().await {
                error!("强制结束浏览器失败: {}", e);
            }
        }
    }
    cancel.cancel();
}

/// 下载进度监听：完成事件写入计数器
async fn spawn_download_listener(
    page: &Page,
    downloads: DownloadTracker,
    cancel: CancellationToken,
) -> AppResult<JoinHandle<()>> {
    let mut progress = page.event_listener::<EventDownloadProgress>().await?;
    Ok(tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = progress.next() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            if event.state == DownloadProgressState::Completed {
                info!("📥 下载完成: {}", event.guid);
                downloads.mark_completed(&event.guid);
            }
        }
    }))
}

/// 把字符串转成 JS 字符串字面量
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn element_probe_script(locator: &Locator, until: WaitUntil) -> String {
    let lookup = match locator {
        Locator::Css(selector) => format!("document.querySelector({})", js_string(selector)),
        Locator::XPath(path) => format!(
            "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
            js_string(path)
        ),
    };
    let check = match until {
        WaitUntil::Ready => "true",
        WaitUntil::Visible => {
            "(() => { const r = el.getBoundingClientRect(); const s = getComputedStyle(el); \
             return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none'; })()"
        }
    };
    format!(
        r#"
        (() => {{
            const el = {lookup};
            if (!el) return false;
            return {check};
        }})()
        "#
    )
}
