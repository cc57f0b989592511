//! 测试用的页面驱动：记录所有操作，元素是否存在由测试决定

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::{AppError, AppResult};
use crate::infrastructure::{DownloadMode, DownloadTracker, Locator, PageDriver, WaitUntil};

#[derive(Debug, Default)]
pub struct FakePage {
    /// `node_paths` 返回的节点
    pub nodes: Vec<String>,
    /// `eval_object_values` 返回的值
    pub object_values: Vec<String>,
    /// 永远不会出现的元素
    pub missing: HashSet<String>,
    /// 最终地址
    pub location: String,
    /// 点击以它结尾的 XPath 时视为触发了一次下载并立即完成
    pub completing_suffix: Option<String>,
    pub calls: Mutex<Vec<String>>,
    pub clicks: Mutex<Vec<(String, Instant)>>,
    pub download_dirs: Mutex<Vec<(DownloadMode, PathBuf)>>,
    downloads: DownloadTracker,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clicks(&self) -> Vec<(String, Instant)> {
        self.clicks.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn is_missing(&self, locator: &Locator) -> bool {
        self.missing.contains(locator.as_str())
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn navigate(&self, url: &str) -> AppResult<()> {
        self.record(format!("navigate {}", url));
        Ok(())
    }

    async fn remove_element(&self, selector: &str) -> AppResult<()> {
        if self.missing.contains(selector) {
            return Err(AppError::element_failed(selector, "not found"));
        }
        self.record(format!("remove {}", selector));
        Ok(())
    }

    async fn click(&self, locator: &Locator) -> AppResult<()> {
        if self.is_missing(locator) {
            return Err(AppError::element_failed(locator.as_str(), "not found"));
        }
        self.record(format!("click {}", locator.as_str()));
        self.clicks
            .lock()
            .unwrap()
            .push((locator.as_str().to_string(), Instant::now()));
        if let Some(suffix) = &self.completing_suffix {
            if locator.as_str().ends_with(suffix.as_str()) {
                self.downloads.mark_completed(locator.as_str());
            }
        }
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> AppResult<()> {
        if self.missing.contains(selector) {
            return Err(AppError::element_failed(selector, "not found"));
        }
        self.record(format!("type {} {}", selector, text));
        Ok(())
    }

    async fn wait_for(
        &self,
        locator: &Locator,
        _until: WaitUntil,
        timeout: Option<Duration>,
    ) -> AppResult<()> {
        if !self.is_missing(locator) {
            self.record(format!("wait {}", locator.as_str()));
            return Ok(());
        }
        match timeout {
            Some(limit) => {
                tokio::time::sleep(limit).await;
                Err(AppError::element_failed(locator.as_str(), "timeout"))
            }
            None => std::future::pending().await,
        }
    }

    async fn node_paths(&self, _selector: &str) -> AppResult<Vec<String>> {
        Ok(self.nodes.clone())
    }

    async fn run_script(&self, script: &str) -> AppResult<()> {
        self.record(format!("script {}", script));
        Ok(())
    }

    async fn eval_object_values(&self, _expression: &str) -> AppResult<Vec<String>> {
        Ok(self.object_values.clone())
    }

    async fn set_download_behavior(&self, mode: DownloadMode, dir: &Path) -> AppResult<()> {
        self.download_dirs
            .lock()
            .unwrap()
            .push((mode, dir.to_path_buf()));
        Ok(())
    }

    async fn current_url(&self) -> AppResult<String> {
        Ok(self.location.clone())
    }

    fn downloads(&self) -> &DownloadTracker {
        &self.downloads
    }
}
