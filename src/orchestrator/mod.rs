//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责配方的批量运行和资源调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `recipe_runner` - 配方运行器
//! - 创建供应商目录
//! - 每个配方启动并关闭一个浏览器会话（ChromeSession）
//! - 按配方类型选择执行器（BrowserSteps / OAuth2Steps）
//! - 顺序运行整批配方，计算进度位置，写运行日志
//!
//! ## 层次关系
//!
//! ```text
//! recipe_runner (处理 Vec<Recipe>)
//!     ↓
//! workflow::dispatch (处理单个 Recipe 的步骤)
//!     ↓
//! workflow::BrowserSteps / OAuth2Steps (处理单个 Step)
//!     ↓
//! services (能力层：pkce / oauth2 / fetch / file_ops)
//!     ↓
//! infrastructure (基础设施：ChromeSession / TokenCache / DocumentArchive)
//! ```
//!
//! ## 设计原则
//!
//! 1. **资源隔离**：只有编排层创建浏览器会话
//! 2. **向下依赖**：编排层 → workflow → services → infrastructure
//! 3. **无业务逻辑**：只做调度和统计，不做步骤判断

pub mod recipe_runner;

pub use recipe_runner::{batch_positions, RecipeRunner};
