//! 文档拉取 - 业务能力层
//!
//! 带令牌请求文档列表，按 JSON 路径提取文档 ID，逐个下载到暂存区并入库。

use std::path::Path;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::error::{ApiError, AppError, AppResult};
use crate::infrastructure::DocumentArchive;
use crate::models::ItemsRequest;
use crate::services::file_ops::{copy_file, SupplierDirs};
use crate::services::json_path::extract_json_values;
use crate::services::placeholders::{fill_document_url, fill_header};

#[derive(Debug, Clone, Default)]
pub struct DocumentFetcher {
    http: reqwest::Client,
}

impl DocumentFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// 请求文档列表并下载所有文档，返回新入库的文件数
    ///
    /// 错误分类：
    /// - 请求无法构建或发送：`ApiError::RequestFailed`
    /// - 列表接口返回 400：`ApiError::Unauthorized`，其它非 200：`ApiError::UnexpectedStatus`
    /// - 没有提取到任何 ID：`ApiError::NoDocumentIds`
    /// - 任一文档下载失败：`ApiError::DownloadFailed`
    pub async fn fetch(
        &self,
        request: &ItemsRequest,
        access_token: &str,
        dirs: &SupplierDirs,
        archive: &dyn DocumentArchive,
    ) -> AppResult<usize> {
        let items = self.request_items(request, access_token).await?;

        let ids = extract_json_values(&items, &request.extract_document_ids);
        if ids.is_empty() {
            return Err(ApiError::NoDocumentIds {
                path: request.extract_document_ids.clone(),
            }
            .into());
        }
        let filenames = request
            .filename_path()
            .map(|path| extract_json_values(&items, path))
            .unwrap_or_default();
        info!("✓ 找到 {} 个文档", ids.len());

        let mut new_files = 0;
        for (index, id) in ids.iter().enumerate() {
            let filename = document_filename(filenames.get(index).map(String::as_str), id);
            let url = fill_document_url(&request.document_url, id);
            let staged = dirs.staging.join(&filename);

            self.download(&url, request, access_token, &staged).await?;
            if archive.file_exists(&staged) {
                debug!("文档已存在，跳过: {}", filename);
                continue;
            }

            let destination = dirs.documents.join(&filename);
            copy_file(&staged, &destination)?;
            archive.add_file(&destination)?;
            info!("📄 新文档: {}", destination.display());
            new_files += 1;
        }
        Ok(new_files)
    }

    async fn request_items(&self, request: &ItemsRequest, access_token: &str) -> AppResult<JsonValue> {
        debug!("请求文档列表: {} {}", request.method, request.url);
        let method = parse_method(&request.method, &request.url)?;
        let mut builder = self
            .http
            .request(method, &request.url)
            .header(CONTENT_TYPE, "application/json")
            .body(request.body_text());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), fill_header(name, value, access_token));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(&request.url, e))?;
        match response.status() {
            StatusCode::OK => {
                let body = response
                    .text()
                    .await
                    .map_err(|e| AppError::api_request_failed(&request.url, e))?;
                Ok(serde_json::from_str(&body)?)
            }
            StatusCode::BAD_REQUEST => Err(ApiError::Unauthorized {
                endpoint: request.url.clone(),
            }
            .into()),
            status => Err(ApiError::UnexpectedStatus {
                endpoint: request.url.clone(),
                status: status.as_u16(),
            }
            .into()),
        }
    }

    async fn download(
        &self,
        url: &str,
        request: &ItemsRequest,
        access_token: &str,
        target: &Path,
    ) -> AppResult<()> {
        debug!("下载文档: {} -> {}", url, target.display());
        let download_failed = |reason: String| ApiError::DownloadFailed {
            url: url.to_string(),
            reason,
        };

        let method = parse_method(&request.document_request_method, url)?;
        let mut builder = self
            .http
            .request(method, url)
            .header(CONTENT_TYPE, "application/json");
        for (name, value) in &request.document_request_headers {
            builder = builder.header(name.as_str(), fill_header(name, value, access_token));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| download_failed(e.to_string()))?;
        if response.status() != StatusCode::OK {
            return Err(download_failed(format!("HTTP {}", response.status().as_u16())).into());
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| download_failed(e.to_string()))?;
        tokio::fs::write(target, &bytes)
            .await
            .map_err(|e| download_failed(e.to_string()))?;
        Ok(())
    }
}

fn parse_method(method: &str, url: &str) -> AppResult<Method> {
    Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|e| AppError::api_request_failed(url, e))
}

/// 文档文件名：优先用提取到的文件名（去掉目录部分），否则 `{id}.pdf`
fn document_filename(extracted: Option<&str>, id: &str) -> String {
    extracted
        .and_then(|name| Path::new(name).file_name())
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}.pdf", id.replace(['/', '\\'], "_")))
}
