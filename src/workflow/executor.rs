//! 步骤执行器接口
//!
//! 调度器只认识 `StepExecutor`，浏览器配方和 OAuth2 配方各有一个实现。

use std::time::Duration;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::AppResult;
use crate::models::{Step, StepResult};
use crate::workflow::context::{RunContext, RunState};

/// 执行器的超时与清理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionProfile {
    /// 单个步骤的超时
    pub step_timeout: Duration,
    /// 硬失败和正常结束时是否清空下载暂存区
    pub purge_staging: bool,
}

impl ExecutionProfile {
    /// 浏览器配方：默认 60 秒，清空暂存区
    pub fn browser(config: &Config) -> Self {
        Self {
            step_timeout: config.browser_step_timeout(),
            purge_staging: true,
        }
    }

    /// OAuth2 配方：默认 120 秒，只在超时时清空暂存区
    pub fn oauth2(config: &Config) -> Self {
        Self {
            step_timeout: config.oauth2_step_timeout(),
            purge_staging: false,
        }
    }
}

#[async_trait]
pub trait StepExecutor: Send + Sync {
    fn profile(&self) -> ExecutionProfile;

    /// 第一个步骤之前调用一次
    async fn prepare(&self, _ctx: &RunContext) -> AppResult<()> {
        Ok(())
    }

    /// 执行单个步骤
    ///
    /// 不返回 `Err`：所有错误都变成 `StepResult`，由实现决定是否中断配方。
    async fn execute(&self, step: &Step, ctx: &RunContext, state: RunState) -> (StepResult, RunState);
}
