use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;

use invoice_harvest::models::{load_recipes, EnvCredentialSource};
use invoice_harvest::utils::logging;
use invoice_harvest::{Config, HashedArchive, RecipeRunner, TracingProgress};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env();

    // 初始化日志
    logging::init(config.verbose_logging);
    logging::init_log_file(&config.output_log_file)?;

    let recipes = load_recipes(&config.recipe_file)
        .await
        .with_context(|| format!("无法加载配方: {}", config.recipe_file.display()))?;
    if recipes.is_empty() {
        warn!("⚠️ 没有找到任何配方，程序结束");
        return Ok(());
    }

    let total_steps = recipes.iter().map(|r| r.steps.len()).sum();
    logging::log_startup(recipes.len(), total_steps);

    let archive = HashedArchive::open(&config.documents_root)?;
    let log_file = config.output_log_file.clone();
    let runner = RecipeRunner::new(config, Arc::new(EnvCredentialSource), Arc::new(archive));

    let results = runner.run_all(&recipes, &TracingProgress).await;
    logging::print_final_stats(&results, &log_file);

    Ok(())
}
