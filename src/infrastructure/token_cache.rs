//! OAuth2 令牌缓存
//!
//! 每个 `supplier|credentialId` 一个 JSON 文件。

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::debug;

use crate::error::{AppError, AppResult, FileError};
use crate::models::OAuth2Tokens;

#[derive(Debug, Clone)]
pub struct TokenCache {
    dir: PathBuf,
}

impl TokenCache {
    /// `config_dir/oauth2` 下存放令牌文件
    pub fn new(config_dir: &Path) -> Self {
        Self {
            dir: config_dir.join("oauth2"),
        }
    }

    /// 读取缓存，不存在时返回 `None`
    pub async fn load(&self, key: &str) -> AppResult<Option<OAuth2Tokens>> {
        let path = self.path_for(key);
        if !fs::try_exists(&path).await.unwrap_or(false) {
            debug!("令牌缓存不存在: {}", path.display());
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| FileError::ReadFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;
        let tokens = serde_json::from_str(&content)?;
        Ok(Some(tokens))
    }

    /// 写入缓存
    pub async fn save(&self, key: &str, tokens: &OAuth2Tokens) -> AppResult<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::directory_failed(&self.dir, e))?;
        let path = self.path_for(key);
        let content = serde_json::to_string_pretty(tokens)?;
        fs::write(&path, content)
            .await
            .map_err(|e| FileError::WriteFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;
        debug!("令牌已写入缓存: {}", path.display());
        Ok(())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{:x}.json", digest))
    }
}
