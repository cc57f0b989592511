//! 配方运行上下文
//!
//! `RunContext` 在一次运行中不可变；`RunState` 是步骤之间传递的值，
//! 由调度器交给处理函数，处理函数连同结果一起交回。

use std::fmt::Display;

use crate::models::{Credentials, OAuth2Settings};
use crate::services::SupplierDirs;

/// 一次配方运行的只读信息
#[derive(Debug, Clone)]
pub struct RunContext {
    pub supplier: String,
    pub version: String,
    pub dirs: SupplierDirs,
    pub credentials: Credentials,
}

impl RunContext {
    pub fn new(
        supplier: impl Into<String>,
        version: impl Into<String>,
        dirs: SupplierDirs,
        credentials: Credentials,
    ) -> Self {
        Self {
            supplier: supplier.into(),
            version: version.into(),
            dirs,
            credentials,
        }
    }
}

impl Display for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} v{}]", self.supplier, self.version)
    }
}

/// 步骤之间传递的状态
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    /// 自上次重置以来新入库的文件数
    pub new_files: usize,
    /// `oauth2-setup` 写入
    pub oauth2: Option<OAuth2Settings>,
    /// 当前可用的访问令牌
    pub access_token: Option<String>,
}
