//! 进度事件
//!
//! 每个步骤开始前发出 `Step`，结束后发出 `Percent`。

use tokio::sync::mpsc;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Step { title: String, description: String },
    /// 0.0 ..= 1.0
    Percent(f64),
}

pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// 把进度写到日志
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Step { title, description } => info!("▶ {} {}", title, description),
            ProgressEvent::Percent(p) => info!("📊 总进度: {:.0}%", p * 100.0),
        }
    }
}

/// 把进度发到通道，由调用方消费（界面、测试）
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn report(&self, event: ProgressEvent) {
        // 接收方已经关闭时直接丢弃
        let _ = self.tx.send(event);
    }
}
