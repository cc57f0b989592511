//! 页面驱动接口
//!
//! 浏览器步骤只依赖这个 trait，`ChromeSession` 是它的真实实现。

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::infrastructure::DownloadTracker;

/// 元素定位方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(path: impl Into<String>) -> Self {
        Locator::XPath(path.into())
    }

    /// 用于日志和错误信息
    pub fn as_str(&self) -> &str {
        match self {
            Locator::Css(s) | Locator::XPath(s) => s,
        }
    }
}

/// 等待条件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// 元素已在 DOM 中
    Ready,
    /// 元素已在 DOM 中且可见
    Visible,
}

/// 下载行为
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadMode {
    /// 允许下载，按服务器给出的文件名保存
    Allow,
    /// 允许下载，以下载 guid 命名
    AllowAndName,
}

#[async_trait]
pub trait PageDriver: Send + Sync {
    /// 导航并等待页面进入 networkIdle
    async fn navigate(&self, url: &str) -> AppResult<()>;

    async fn remove_element(&self, selector: &str) -> AppResult<()>;

    /// 等元素出现后点击
    async fn click(&self, locator: &Locator) -> AppResult<()>;

    /// 等元素出现后聚焦并逐字输入
    async fn type_text(&self, selector: &str, text: &str) -> AppResult<()>;

    /// `timeout` 为 `None` 时一直等待，由步骤超时兜底
    async fn wait_for(
        &self,
        locator: &Locator,
        until: WaitUntil,
        timeout: Option<Duration>,
    ) -> AppResult<()>;

    /// `selector` 命中的所有节点的完整 XPath
    async fn node_paths(&self, selector: &str) -> AppResult<Vec<String>>;

    /// 执行脚本并丢弃结果
    async fn run_script(&self, script: &str) -> AppResult<()>;

    /// 对象表达式求值，返回对象中所有字符串值
    async fn eval_object_values(&self, expression: &str) -> AppResult<Vec<String>>;

    async fn set_download_behavior(&self, mode: DownloadMode, dir: &Path) -> AppResult<()>;

    async fn current_url(&self) -> AppResult<String>;

    fn downloads(&self) -> &DownloadTracker;
}
