//! 文档库网关
//!
//! 只暴露"是否已存在"和"登记文件"两个能力；按文件内容的 SHA-256 去重。

use std::collections::HashSet;
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{AppError, AppResult, FileError};
use crate::services::file_ops::STAGING_DIR_NAME;

/// 文档库网关
///
/// 假设单进程、同一时间只有一个配方在写入。
pub trait DocumentArchive: Send + Sync {
    /// 文档库中是否已有相同内容的文件
    fn file_exists(&self, path: &Path) -> bool;

    /// 将文件登记到文档库
    fn add_file(&self, path: &Path) -> AppResult<()>;
}

/// 以内容哈希为索引的文档库
#[derive(Debug, Default)]
pub struct HashedArchive {
    hashes: Mutex<HashSet<String>>,
}

impl HashedArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// 扫描文档根目录建立索引（跳过下载暂存区）
    pub fn open(root: &Path) -> AppResult<Self> {
        let archive = Self::new();
        if root.exists() {
            archive.index_dir(root)?;
        }
        debug!("文档库索引完成: {} 个文件", archive.len());
        Ok(archive)
    }

    pub fn len(&self) -> usize {
        self.hashes.lock().map(|h| h.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn index_dir(&self, dir: &Path) -> AppResult<()> {
        let entries = std::fs::read_dir(dir).map_err(|e| AppError::directory_failed(dir, e))?;
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                if path.file_name().and_then(|n| n.to_str()) == Some(STAGING_DIR_NAME) {
                    continue;
                }
                self.index_dir(&path)?;
            } else {
                match hash_file(&path) {
                    Ok(hash) => self.insert(hash),
                    Err(e) => warn!("无法读取文档 {}: {}", path.display(), e),
                }
            }
        }
        Ok(())
    }

    fn insert(&self, hash: String) {
        if let Ok(mut hashes) = self.hashes.lock() {
            hashes.insert(hash);
        }
    }
}

impl DocumentArchive for HashedArchive {
    fn file_exists(&self, path: &Path) -> bool {
        let Ok(hash) = hash_file(path) else {
            return false;
        };
        self.hashes
            .lock()
            .map(|hashes| hashes.contains(&hash))
            .unwrap_or(false)
    }

    fn add_file(&self, path: &Path) -> AppResult<()> {
        let hash = hash_file(path).map_err(|e| FileError::ReadFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        self.insert(hash);
        Ok(())
    }
}

fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}
