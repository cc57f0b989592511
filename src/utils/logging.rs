/// 日志工具模块
///
/// 提供日志初始化、运行日志文件和统计输出的辅助函数
use std::fs::{self, OpenOptions};
use std::io::Write;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::{AppResult, FileError};
use crate::models::RecipeResult;

/// 初始化 tracing 输出
///
/// `RUST_LOG` 优先；否则默认 `info`，详细模式为 `debug`。重复调用无副作用。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化运行日志文件
pub fn init_log_file(log_file_path: &str) -> AppResult<()> {
    let log_header = format!(
        "{}\n发票下载日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header).map_err(|e| FileError::WriteFailed {
        path: log_file_path.to_string(),
        source: Box::new(e),
    })?;
    Ok(())
}

/// 追加一条配方结果
pub fn append_result(log_file_path: &str, result: &RecipeResult) -> AppResult<()> {
    let mut line = format!(
        "[{}] {} (最后步骤: {})",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        result.status_text,
        result.last_step_id
    );
    if let Some(message) = &result.last_error_message {
        line.push_str(&format!(" 错误: {}", message));
    }
    line.push('\n');

    let write_failed = |e: std::io::Error| FileError::WriteFailed {
        path: log_file_path.to_string(),
        source: Box::new(e),
    };
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .map_err(write_failed)?;
    file.write_all(line.as_bytes()).map_err(write_failed)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(recipe_count: usize, total_steps: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 发票下载");
    info!("📋 配方数: {}，总步数: {}", recipe_count, total_steps);
    info!("{}", "=".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(results: &[RecipeResult], log_file_path: &str) {
    let success = results.iter().filter(|r| r.is_success()).count();
    let new_files: usize = results.iter().map(|r| r.new_files_count).sum();

    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    for result in results {
        info!("{}", result.status_text_formatted);
    }
    info!("✅ 成功: {}/{}", success, results.len());
    info!("❌ 失败: {}", results.len() - success);
    info!("📄 新文档: {}", new_files);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}
