//! # Invoice Harvest
//!
//! 按配方从供应商门户和云端 API 下载发票文档的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（浏览器、令牌文件、文档库），只暴露能力
//! - `ChromeSession` - 唯一的 page owner，实现 `PageDriver`
//! - `DownloadTracker` - 下载完成计数
//! - `TokenCache` / `DocumentArchive` - 令牌缓存与文档库网关
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `pkce` / `OAuth2Client` - 授权码 + PKCE、令牌交换与刷新
//! - `json_path` / `DocumentFetcher` - 文档 id 提取与下载
//! - `file_ops` - 解压、移动、清空暂存区
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个配方"的执行流程
//! - `dispatch` - 逐步执行，单步超时，硬失败 / 软失败
//! - `BrowserSteps` / `OAuth2Steps` - 两种步骤执行器
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/recipe_runner` - 启动会话、选择执行器、顺序运行配方
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, RefreshPolicy};
pub use error::{AppError, AppResult};
pub use infrastructure::{ChromeSession, DocumentArchive, HashedArchive, PageDriver};
pub use models::{Recipe, RecipeResult, Step, StepAction, StepResult};
pub use orchestrator::RecipeRunner;
pub use workflow::{dispatch, BatchPosition, ProgressEvent, ProgressSink, TracingProgress};
