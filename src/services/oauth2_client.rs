//! OAuth2 客户端 - 业务能力层
//!
//! 构建授权地址、用授权码 / 刷新令牌换取令牌并写入缓存。

use reqwest::StatusCode;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info};
use url::Url;

use crate::error::{ApiError, AppError, AppResult, RecipeError};
use crate::infrastructure::TokenCache;
use crate::models::{OAuth2Settings, OAuth2Tokens};
use crate::services::pkce::PkcePair;

/// 令牌端点客户端
#[derive(Debug, Clone, Default)]
pub struct OAuth2Client {
    http: reqwest::Client,
}

impl OAuth2Client {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// 向令牌端点 POST JSON，200 时解析并写入缓存
    ///
    /// 400 归类为授权失败，其余状态为未分类错误。
    pub async fn exchange(
        &self,
        token_url: &str,
        payload: &JsonValue,
        cache: &TokenCache,
        cache_key: &str,
    ) -> AppResult<OAuth2Tokens> {
        debug!("请求 OAuth2 令牌: {}", token_url);
        let response = self
            .http
            .post(token_url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload.to_string())
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(token_url, e))?;

        match response.status() {
            StatusCode::OK => {
                let body = response
                    .text()
                    .await
                    .map_err(|e| AppError::api_request_failed(token_url, e))?;
                let mut tokens: OAuth2Tokens = serde_json::from_str(&body)?;
                if tokens.created_at == 0 {
                    tokens.created_at = chrono::Utc::now().timestamp();
                }
                cache.save(cache_key, &tokens).await?;
                info!("✓ 已获取并缓存 OAuth2 令牌");
                Ok(tokens)
            }
            StatusCode::BAD_REQUEST => Err(ApiError::Unauthorized {
                endpoint: token_url.to_string(),
            }
            .into()),
            status => Err(ApiError::UnexpectedStatus {
                endpoint: token_url.to_string(),
                status: status.as_u16(),
            }
            .into()),
        }
    }
}

/// 授权码换令牌的请求体
pub fn authorization_code_payload(settings: &OAuth2Settings, verifier: &str, code: &str) -> JsonValue {
    json!({
        "grant_type": "authorization_code",
        "client_id": settings.client_id,
        "code_verifier": verifier,
        "code": code,
        "redirect_uri": settings.redirect_url,
    })
}

/// 刷新令牌的请求体
pub fn refresh_payload(settings: &OAuth2Settings, refresh_token: &str) -> JsonValue {
    json!({
        "grant_type": "refresh_token",
        "client_id": settings.client_id,
        "refresh_token": refresh_token,
        "scope": settings.scope,
    })
}

/// 构建授权地址
pub fn authorization_url(settings: &OAuth2Settings, state: &str, pkce: &PkcePair) -> AppResult<String> {
    let url = Url::parse_with_params(
        &settings.auth_url,
        &[
            ("client_id", settings.client_id.as_str()),
            ("prompt", "login"),
            ("redirect_uri", settings.redirect_url.as_str()),
            ("scope", settings.scope.as_str()),
            ("response_type", "code"),
            ("state", state),
            ("code_challenge", pkce.challenge.as_str()),
            ("code_challenge_method", pkce.method.as_str()),
        ],
    )
    .map_err(|e| AppError::Other(format!("无效的授权地址 {}: {}", settings.auth_url, e)))?;
    Ok(url.into())
}

/// 从登录结束后的地址中取出 `code`
pub fn authorization_code(location: &str) -> Result<String, RecipeError> {
    Url::parse(location)
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(k, _)| k == "code")
                .map(|(_, v)| v.into_owned())
        })
        .filter(|code| !code.is_empty())
        .ok_or_else(|| RecipeError::MissingAuthorizationCode {
            location: location.to_string(),
        })
}
