//! 文件操作 - 业务能力层
//!
//! 暂存区 / 文档库目录、解压、按规则移动、清空暂存区。

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info};

use crate::error::{AppError, AppResult, FileError};
use crate::infrastructure::DocumentArchive;

/// 文档根目录下存放所有供应商下载暂存区的目录名
pub const STAGING_DIR_NAME: &str = "_downloads";

/// 每个供应商的两个目录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplierDirs {
    /// 下载暂存区，运行结束或失败时清空
    pub staging: PathBuf,
    /// 文档库，只追加
    pub documents: PathBuf,
}

/// 创建供应商目录
pub fn prepare_supplier_dirs(documents_root: &Path, supplier: &str) -> AppResult<SupplierDirs> {
    let dirs = SupplierDirs {
        staging: documents_root.join(STAGING_DIR_NAME).join(supplier),
        documents: documents_root.join(supplier),
    };
    for dir in [&dirs.staging, &dirs.documents] {
        fs::create_dir_all(dir).map_err(|e| AppError::directory_failed(dir, e))?;
    }
    Ok(dirs)
}

/// 清空目录内容，保留目录本身
pub fn purge_directory(dir: &Path) -> AppResult<()> {
    if !dir.exists() {
        return Ok(());
    }
    let entries = fs::read_dir(dir).map_err(|e| AppError::directory_failed(dir, e))?;
    for entry in entries {
        let path = entry?.path();
        let removed = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.map_err(|e| AppError::directory_failed(&path, e))?;
    }
    debug!("已清空目录: {}", dir.display());
    Ok(())
}

/// 将暂存区中的每个 `.zip` 解压到暂存区
pub fn unzip_all(staging: &Path) -> AppResult<usize> {
    let mut count = 0;
    for zip_path in files_in(staging)? {
        let is_zip = zip_path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("zip"));
        if !is_zip {
            continue;
        }

        info!("📦 解压文件: {} -> {}", zip_path.display(), staging.display());
        let unzip_failed = |source: Box<dyn std::error::Error + Send + Sync>| FileError::UnzipFailed {
            path: zip_path.display().to_string(),
            source,
        };
        let file = File::open(&zip_path).map_err(|e| unzip_failed(Box::new(e)))?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| unzip_failed(Box::new(e)))?;
        archive
            .extract(staging)
            .map_err(|e| unzip_failed(Box::new(e)))?;
        count += 1;
    }
    Ok(count)
}

/// 把暂存区中文件名匹配 `pattern` 的文件复制到文档库
///
/// 文档库已有相同内容的文件会被跳过；复制后的文件登记到文档库。返回新文件数量。
pub fn move_matching(
    dirs: &SupplierDirs,
    pattern: &Regex,
    archive: &dyn DocumentArchive,
) -> AppResult<usize> {
    let mut new_files = 0;
    for source in files_in(&dirs.staging)? {
        let Some(name) = source.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !pattern.is_match(name) {
            continue;
        }
        if archive.file_exists(&source) {
            debug!("文档已存在，跳过: {}", name);
            continue;
        }

        let destination = dirs.documents.join(name);
        info!("📄 移动文件: {} -> {}", source.display(), destination.display());
        copy_file(&source, &destination)?;
        archive.add_file(&destination)?;
        new_files += 1;
    }
    Ok(new_files)
}

/// 复制单个文件
pub fn copy_file(from: &Path, to: &Path) -> AppResult<u64> {
    fs::copy(from, to).map_err(|e| {
        AppError::File(FileError::CopyFailed {
            from: from.display().to_string(),
            to: to.display().to_string(),
            source: Box::new(e),
        })
    })
}

/// 目录下的普通文件（不递归），按文件名排序
fn files_in(dir: &Path) -> AppResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| AppError::directory_failed(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::HashedArchive;
    use std::io::Write;
    use tempfile::TempDir;

    fn dirs_in(root: &TempDir) -> SupplierDirs {
        prepare_supplier_dirs(root.path(), "acme").unwrap()
    }

    #[test]
    fn test_prepare_supplier_dirs() {
        let root = TempDir::new().unwrap();
        let dirs = dirs_in(&root);
        assert!(dirs.staging.ends_with("_downloads/acme"));
        assert!(dirs.documents.ends_with("acme"));
        assert!(dirs.staging.is_dir());
        assert!(dirs.documents.is_dir());
    }

    #[test]
    fn test_move_matching_skips_known_and_unmatched() {
        let root = TempDir::new().unwrap();
        let dirs = dirs_in(&root);
        fs::write(dirs.staging.join("invoice-1.pdf"), b"one").unwrap();
        fs::write(dirs.staging.join("invoice-2.pdf"), b"two").unwrap();
        fs::write(dirs.staging.join("readme.txt"), b"text").unwrap();

        let archive = HashedArchive::new();
        fs::write(root.path().join("known.pdf"), b"two").unwrap();
        archive.add_file(&root.path().join("known.pdf")).unwrap();

        let pattern = Regex::new(r"^invoice-.*\.pdf$").unwrap();
        let moved = move_matching(&dirs, &pattern, &archive).unwrap();

        assert_eq!(moved, 1);
        assert!(dirs.documents.join("invoice-1.pdf").exists());
        assert!(!dirs.documents.join("invoice-2.pdf").exists());
        assert!(!dirs.documents.join("readme.txt").exists());

        // 第二次运行不会重复入库
        assert_eq!(move_matching(&dirs, &pattern, &archive).unwrap(), 0);
    }

    #[test]
    fn test_unzip_all() {
        let root = TempDir::new().unwrap();
        let dirs = dirs_in(&root);
        let zip_path = dirs.staging.join("bundle.zip");
        {
            let file = File::create(&zip_path).unwrap();
            let mut writer = zip::ZipWriter::new(file);
            let options = zip::write::SimpleFileOptions::default();
            writer.start_file("march.pdf", options).unwrap();
            writer.write_all(b"pdf bytes").unwrap();
            writer.finish().unwrap();
        }
        fs::write(dirs.staging.join("plain.pdf"), b"x").unwrap();

        assert_eq!(unzip_all(&dirs.staging).unwrap(), 1);
        assert_eq!(fs::read(dirs.staging.join("march.pdf")).unwrap(), b"pdf bytes");
    }

    #[test]
    fn test_unzip_rejects_broken_archive() {
        let root = TempDir::new().unwrap();
        let dirs = dirs_in(&root);
        fs::write(dirs.staging.join("broken.zip"), b"not a zip").unwrap();
        assert!(unzip_all(&dirs.staging).is_err());
    }

    #[test]
    fn test_purge_directory_keeps_dir() {
        let root = TempDir::new().unwrap();
        let dirs = dirs_in(&root);
        fs::write(dirs.staging.join("a.pdf"), b"a").unwrap();
        fs::create_dir_all(dirs.staging.join("nested")).unwrap();
        fs::write(dirs.staging.join("nested/b.pdf"), b"b").unwrap();

        purge_directory(&dirs.staging).unwrap();
        assert!(dirs.staging.is_dir());
        assert_eq!(fs::read_dir(&dirs.staging).unwrap().count(), 0);
        purge_directory(&root.path().join("missing")).unwrap();
    }
}
