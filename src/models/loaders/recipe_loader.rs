use crate::error::{AppError, AppResult, RecipeError};
use crate::models::recipe::Recipe;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 从单个文件加载配方（`.json` 或 `.toml`）
///
/// 文件内容可以是单个配方、配方数组，或带 `recipes` 列表的对象。
pub async fn load_recipe_file(path: &Path) -> AppResult<Vec<Recipe>> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| crate::error::FileError::ReadFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;

    let parsed = match path.extension().and_then(|s| s.to_str()) {
        Some("toml") => parse_toml(&content),
        _ => parse_json(&content),
    };

    parsed.map_err(|reason| {
        AppError::Recipe(RecipeError::ParseFailed {
            path: path.display().to_string(),
            reason,
        })
    })
}

/// 从文件或文件夹加载所有配方
///
/// 文件夹中解析失败的文件只记录警告，不影响其它文件。
pub async fn load_recipes(path: &Path) -> AppResult<Vec<Recipe>> {
    if !path.is_dir() {
        return load_recipe_file(path).await;
    }

    let mut files: Vec<PathBuf> = Vec::new();
    let mut entries = fs::read_dir(path)
        .await
        .map_err(|e| AppError::directory_failed(path, e))?;

    while let Some(entry) = entries.next_entry().await? {
        let file = entry.path();
        if matches!(
            file.extension().and_then(|s| s.to_str()),
            Some("json") | Some("toml")
        ) {
            files.push(file);
        }
    }
    files.sort();

    let mut recipes = Vec::new();
    for file in files {
        tracing::info!(
            "正在加载: {}",
            file.file_name().unwrap_or_default().to_string_lossy()
        );
        match load_recipe_file(&file).await {
            Ok(mut loaded) => {
                tracing::info!("成功加载 {} 个配方", loaded.len());
                recipes.append(&mut loaded);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {}", file.display(), e);
            }
        }
    }

    Ok(recipes)
}

fn parse_json(content: &str) -> Result<Vec<Recipe>, String> {
    let value: serde_json::Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
    let recipes = match value {
        serde_json::Value::Array(_) => serde_json::from_value(value),
        serde_json::Value::Object(ref map) if map.contains_key("recipes") => {
            serde_json::from_value(map["recipes"].clone())
        }
        other => serde_json::from_value(other).map(|r| vec![r]),
    };
    recipes.map_err(|e| e.to_string())
}

fn parse_toml(content: &str) -> Result<Vec<Recipe>, String> {
    let mut table: toml::Table = toml::from_str(content).map_err(|e| e.to_string())?;
    match table.remove("recipes") {
        Some(list) => list.try_into().map_err(|e: toml::de::Error| e.to_string()),
        None => toml::Value::Table(table)
            .try_into()
            .map(|r| vec![r])
            .map_err(|e: toml::de::Error| e.to_string()),
    }
}
