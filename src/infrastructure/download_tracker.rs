//! 下载完成计数器
//!
//! 下载进度监听器只负责 `mark_completed`，步骤通过 `wait_for` 等待计数达到目标值。

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::debug;

use crate::error::{AppResult, BrowserError};

#[derive(Debug, Clone)]
pub struct DownloadTracker {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    completed: watch::Sender<usize>,
    guids: Mutex<HashSet<String>>,
}

impl Default for DownloadTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadTracker {
    pub fn new() -> Self {
        let (completed, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                completed,
                guids: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// 记录一次下载完成，同一个 guid 只计一次
    pub fn mark_completed(&self, guid: &str) {
        let first_time = self
            .inner
            .guids
            .lock()
            .map(|mut guids| guids.insert(guid.to_string()))
            .unwrap_or(false);
        if first_time {
            self.inner.completed.send_modify(|n| *n += 1);
            debug!("下载完成: {} (累计 {})", guid, self.completed());
        }
    }

    /// 到目前为止完成的下载数
    pub fn completed(&self) -> usize {
        *self.inner.completed.borrow()
    }

    /// 等待累计完成数达到 `target`
    pub async fn wait_for(&self, target: usize) -> AppResult<()> {
        let mut rx = self.inner.completed.subscribe();
        rx.wait_for(|n| *n >= target)
            .await
            .map_err(|_| BrowserError::Cancelled)?;
        Ok(())
    }
}
