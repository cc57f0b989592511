//! 步骤结果与配方结果

use serde::Serialize;

use crate::error::AppError;

/// 执行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// 单个步骤的结果
///
/// `break_recipe` 区分硬失败（立即中止配方）与软失败（记录错误，继续下一步）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepResult {
    pub status: Status,
    pub message: String,
    pub break_recipe: bool,
}

impl StepResult {
    pub fn success() -> Self {
        Self::success_with("")
    }

    pub fn success_with(message: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            message: message.into(),
            break_recipe: false,
        }
    }

    /// 硬失败：中止配方
    pub fn hard_error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
            break_recipe: true,
        }
    }

    /// 软失败：记录错误，后续步骤仍会执行
    pub fn soft_error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
            break_recipe: false,
        }
    }

    pub fn from_error(err: &AppError, break_recipe: bool) -> Self {
        Self {
            status: Status::Error,
            message: err.to_string(),
            break_recipe,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// 一次配方运行的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeResult {
    pub status: Status,
    pub status_text: String,
    pub status_text_formatted: String,
    pub last_step_id: String,
    pub last_step_description: String,
    pub last_error_message: Option<String>,
    pub new_files_count: usize,
}

impl RecipeResult {
    pub fn success(
        supplier: &str,
        step_id: String,
        step_description: &str,
        new_files_count: usize,
    ) -> Self {
        let documents = new_documents_text(new_files_count);
        Self {
            status: Status::Success,
            status_text: format!("{}: {}", supplier, documents),
            status_text_formatted: format!("- {}: {}", bold(supplier), documents),
            last_step_id: step_id,
            last_step_description: step_description.to_string(),
            last_error_message: None,
            new_files_count,
        }
    }

    pub fn error(
        supplier: &str,
        step_id: String,
        step_description: &str,
        message: &str,
        new_files_count: usize,
    ) -> Self {
        Self {
            status: Status::Error,
            status_text: format!("{} aborted with error.", supplier),
            status_text_formatted: format!("x {} aborted with error.", bold(supplier)),
            last_step_id: step_id,
            last_step_description: step_description.to_string(),
            last_error_message: Some(message.to_string()),
            new_files_count,
        }
    }

    pub fn timeout(
        supplier: &str,
        step_id: String,
        step_description: &str,
        message: &str,
        new_files_count: usize,
    ) -> Self {
        Self {
            status: Status::Error,
            status_text: format!("{} aborted with timeout.", supplier),
            status_text_formatted: format!("x {} aborted with timeout.", bold(supplier)),
            last_step_id: step_id,
            last_step_description: step_description.to_string(),
            last_error_message: Some(message.to_string()),
            new_files_count,
        }
    }

    /// 配方没有任何步骤时的结果
    pub fn empty(supplier: &str) -> Self {
        Self::success(supplier, String::new(), "", 0)
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// 新文档数量文案
pub fn new_documents_text(count: usize) -> String {
    match count {
        0 => "No new documents".to_string(),
        1 => "One new document".to_string(),
        n => format!("{} new documents", n),
    }
}

fn bold(text: &str) -> String {
    format!("\x1b[1m{}\x1b[0m", text)
}
