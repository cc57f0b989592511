//! OAuth2 配方的步骤 - 流程层
//!
//! 预期顺序：setup → check-tokens → authenticate → post-and-get-items。
//! check-tokens 在没有缓存时软失败，让 authenticate 接着走交互式登录。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::{Config, RefreshPolicy};
use crate::error::{ApiError, AppError, AppResult, BrowserError, RecipeError};
use crate::infrastructure::{DocumentArchive, Locator, PageDriver, TokenCache, WaitUntil};
use crate::models::{token_cache_key, ItemsRequest, OAuth2Settings, OAuth2Tokens, Step, StepAction, StepResult};
use crate::services::oauth2_client::{
    authorization_code, authorization_code_payload, authorization_url, refresh_payload,
};
use crate::services::pkce::{random_state, PkcePair};
use crate::services::{DocumentFetcher, OAuth2Client};
use crate::workflow::context::{RunContext, RunState};
use crate::workflow::executor::{ExecutionProfile, StepExecutor};

const IDENTITY_FIELD: &str = "#form-input-identity";
const CONTINUE_BUTTON: &str = "#form-submit-continue";
const CREDENTIAL_FIELD: &str = "#form-input-credential";
const PASSCODE_FIELD: &str = "#form-input-passcode";
const SUBMIT_BUTTON: &str = "#form-submit";

const NO_TOKEN_MESSAGE: &str = "没有可用的访问令牌，需要重新登录";
const REFRESHED_MESSAGE: &str = "已用刷新令牌换取新的访问令牌";

/// 登录表单各操作之间的等待，给页面上的前端校验留时间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginPacing {
    /// 打开授权地址的上限
    pub open_page: Duration,
    pub before_identity: Duration,
    pub before_continue: Duration,
    pub before_credential: Duration,
    pub before_submit: Duration,
    pub after_submit: Duration,
    /// 二次验证输入框最多等多久
    pub passcode_probe: Duration,
    pub before_location: Duration,
}

impl Default for LoginPacing {
    fn default() -> Self {
        Self {
            open_page: Duration::from_secs(5),
            before_identity: Duration::from_secs(1),
            before_continue: Duration::from_secs(1),
            before_credential: Duration::from_secs(3),
            before_submit: Duration::from_secs(2),
            after_submit: Duration::from_secs(2),
            passcode_probe: Duration::from_secs(5),
            before_location: Duration::from_secs(2),
        }
    }
}

pub struct OAuth2Steps<P> {
    page: Arc<P>,
    archive: Arc<dyn DocumentArchive>,
    client: OAuth2Client,
    fetcher: DocumentFetcher,
    tokens: TokenCache,
    refresh_policy: RefreshPolicy,
    pacing: LoginPacing,
    profile: ExecutionProfile,
}

impl<P: PageDriver> OAuth2Steps<P> {
    pub fn new(page: Arc<P>, archive: Arc<dyn DocumentArchive>, config: &Config) -> Self {
        let http = reqwest::Client::new();
        Self {
            page,
            archive,
            client: OAuth2Client::new(http.clone()),
            fetcher: DocumentFetcher::new(http),
            tokens: TokenCache::new(&config.config_dir),
            refresh_policy: config.refresh_policy,
            pacing: LoginPacing::default(),
            profile: ExecutionProfile::oauth2(config),
        }
    }

    pub fn with_pacing(mut self, pacing: LoginPacing) -> Self {
        self.pacing = pacing;
        self
    }

    fn setup(&self, settings: &OAuth2Settings, state: &mut RunState) -> StepResult {
        info!("OAuth2 配置: client_id={}", settings.client_id);
        state.oauth2 = Some(settings.clone());
        StepResult::success_with("OAuth2 配置完成")
    }

    async fn check_tokens(&self, ctx: &RunContext, state: &mut RunState) -> StepResult {
        info!("🔑 检查 OAuth2 令牌...");
        let key = token_cache_key(&ctx.supplier, &ctx.credentials.id);
        let cached = match self.tokens.load(&key).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!("令牌缓存无法读取: {}", e);
                None
            }
        };
        let Some(cached) = cached else {
            info!("缓存中没有令牌");
            return StepResult::soft_error(NO_TOKEN_MESSAGE);
        };

        if cached.is_valid() {
            info!("✓ 缓存中的访问令牌有效");
            state.access_token = Some(cached.access_token);
            return StepResult::success_with("缓存中的访问令牌有效");
        }

        let Some(settings) = state.oauth2.as_ref() else {
            return StepResult::from_error(&RecipeError::MissingOAuth2Setup.into(), true);
        };
        info!("访问令牌已过期，尝试刷新");
        let payload = refresh_payload(settings, &cached.refresh_token);
        match self
            .client
            .exchange(&settings.token_url, &payload, &self.tokens, &key)
            .await
        {
            Ok(fresh) => {
                state.access_token = Some(fresh.access_token);
                match self.refresh_policy {
                    RefreshPolicy::AbortAfterRefresh => StepResult::hard_error(REFRESHED_MESSAGE),
                    RefreshPolicy::ContinueAfterRefresh => StepResult::success_with(REFRESHED_MESSAGE),
                }
            }
            Err(e) => {
                warn!("刷新令牌失败: {}", e);
                StepResult::soft_error(NO_TOKEN_MESSAGE)
            }
        }
    }

    async fn authenticate(&self, ctx: &RunContext, state: &mut RunState) -> StepResult {
        if state.access_token.is_some() {
            debug!("已有访问令牌，跳过登录");
            return StepResult::success();
        }
        let Some(settings) = state.oauth2.clone() else {
            return StepResult::from_error(&RecipeError::MissingOAuth2Setup.into(), true);
        };

        info!("🔐 OAuth2 登录...");
        match self.login(&settings, ctx).await {
            Ok(tokens) => {
                state.access_token = Some(tokens.access_token);
                StepResult::success_with("已获取 OAuth2 令牌")
            }
            Err(e) => {
                error!("{} 登录失败: {}", ctx, e);
                StepResult::hard_error(format!("登录失败: {}", e))
            }
        }
    }

    /// 在浏览器里完成授权码登录并换取令牌
    async fn login(&self, settings: &OAuth2Settings, ctx: &RunContext) -> AppResult<OAuth2Tokens> {
        let pacing = self.pacing;
        let pkce = PkcePair::generate(settings.pkce_verifier_length, &settings.pkce_method)?;
        let url = authorization_url(settings, &random_state(20), &pkce)?;

        match tokio::time::timeout(pacing.open_page, self.page.navigate(&url)).await {
            Ok(opened) => opened?,
            Err(_) => debug!("登录页 {:?} 内未稳定，继续", pacing.open_page),
        }

        self.page
            .wait_for(&Locator::css(IDENTITY_FIELD), WaitUntil::Ready, None)
            .await?;
        sleep(pacing.before_identity).await;
        self.page
            .type_text(IDENTITY_FIELD, &ctx.credentials.username)
            .await?;
        sleep(pacing.before_continue).await;
        self.page.click(&Locator::css(CONTINUE_BUTTON)).await?;

        self.page
            .wait_for(&Locator::css(CREDENTIAL_FIELD), WaitUntil::Visible, None)
            .await?;
        sleep(pacing.before_credential).await;
        self.page
            .type_text(CREDENTIAL_FIELD, &ctx.credentials.password)
            .await?;
        sleep(pacing.before_submit).await;
        self.page.click(&Locator::css(CONTINUE_BUTTON)).await?;
        sleep(pacing.after_submit).await;

        let passcode = Locator::css(PASSCODE_FIELD);
        match self
            .page
            .wait_for(&passcode, WaitUntil::Visible, Some(pacing.passcode_probe))
            .await
        {
            Ok(()) => {
                info!("需要二次验证");
                self.page
                    .type_text(PASSCODE_FIELD, &ctx.credentials.totp)
                    .await?;
                self.page.click(&Locator::css(SUBMIT_BUTTON)).await?;
            }
            Err(AppError::Browser(BrowserError::ElementFailed { .. })) => {
                debug!("没有二次验证");
            }
            Err(e) => return Err(e),
        }

        sleep(pacing.before_location).await;
        let location = self.page.current_url().await?;
        let code = authorization_code(&location)?;

        let key = token_cache_key(&ctx.supplier, &ctx.credentials.id);
        let payload = authorization_code_payload(settings, &pkce.verifier, &code);
        self.client
            .exchange(&settings.token_url, &payload, &self.tokens, &key)
            .await
    }

    async fn post_and_get_items(
        &self,
        request: &ItemsRequest,
        ctx: &RunContext,
        state: &mut RunState,
    ) -> StepResult {
        info!("📥 拉取文档列表: {}", request.url);
        let token = state.access_token.clone().unwrap_or_default();
        match self
            .fetcher
            .fetch(request, &token, &ctx.dirs, self.archive.as_ref())
            .await
        {
            Ok(count) => {
                state.new_files = count;
                StepResult::success()
            }
            Err(e) => {
                let soft = match &e {
                    AppError::Api(ApiError::NoDocumentIds { .. }) => {
                        state.new_files = 0;
                        true
                    }
                    AppError::Api(ApiError::Unauthorized { .. } | ApiError::UnexpectedStatus { .. }) => true,
                    _ => false,
                };
                if soft {
                    warn!("{} 拉取文档失败: {}", ctx, e);
                } else {
                    error!("{} 拉取文档失败: {}", ctx, e);
                }
                StepResult::from_error(&e, !soft)
            }
        }
    }
}

#[async_trait]
impl<P: PageDriver + 'static> StepExecutor for OAuth2Steps<P> {
    fn profile(&self) -> ExecutionProfile {
        self.profile
    }

    async fn execute(
        &self,
        step: &Step,
        ctx: &RunContext,
        mut state: RunState,
    ) -> (StepResult, RunState) {
        debug!("执行步骤: {}", step.action.name());
        let result = match &step.action {
            StepAction::OAuth2Setup { oauth2 } => self.setup(oauth2, &mut state),
            StepAction::OAuth2CheckTokens => self.check_tokens(ctx, &mut state).await,
            StepAction::OAuth2Authenticate => self.authenticate(ctx, &mut state).await,
            StepAction::OAuth2PostAndGetItems(request) => {
                self.post_and_get_items(request, ctx, &mut state).await
            }
            other => StepResult::from_error(
                &RecipeError::UnsupportedAction {
                    action: other.name().to_string(),
                }
                .into(),
                true,
            ),
        };
        (result, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::HashedArchive;
    use crate::models::Credentials;
    use crate::services::file_ops::prepare_supplier_dirs;
    use crate::workflow::fake_page::FakePage;
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;
    use tempfile::TempDir;

    struct Fixture {
        _root: TempDir,
        config: Config,
        ctx: RunContext,
    }

    fn fixture() -> Fixture {
        let root = TempDir::new().unwrap();
        let dirs = prepare_supplier_dirs(&root.path().join("docs"), "acme").unwrap();
        let credentials = Credentials {
            id: "cred-1".to_string(),
            username: "alice@example.com".to_string(),
            password: "pw".to_string(),
            totp: "654321".to_string(),
        };
        let config = Config {
            config_dir: root.path().join("config"),
            ..Config::default()
        };
        Fixture {
            ctx: RunContext::new("acme", "1.0", dirs, credentials),
            config,
            _root: root,
        }
    }

    fn settings(server: &ServerGuard) -> OAuth2Settings {
        OAuth2Settings {
            auth_url: format!("{}/authorize", server.url()),
            token_url: format!("{}/token", server.url()),
            redirect_url: "https://app.acme.test/callback".to_string(),
            client_id: "client-1".to_string(),
            scope: "invoices".to_string(),
            pkce_method: "S256".to_string(),
            pkce_verifier_length: 64,
        }
    }

    fn immediate() -> LoginPacing {
        LoginPacing {
            open_page: Duration::from_millis(100),
            before_identity: Duration::ZERO,
            before_continue: Duration::ZERO,
            before_credential: Duration::ZERO,
            before_submit: Duration::ZERO,
            after_submit: Duration::ZERO,
            passcode_probe: Duration::from_millis(20),
            before_location: Duration::ZERO,
        }
    }

    fn steps(fx: &Fixture, page: FakePage) -> (Arc<FakePage>, OAuth2Steps<FakePage>) {
        let page = Arc::new(page);
        let steps = OAuth2Steps::new(page.clone(), Arc::new(HashedArchive::new()), &fx.config)
            .with_pacing(immediate());
        (page, steps)
    }

    fn step(action: StepAction) -> Step {
        Step {
            description: String::new(),
            action,
        }
    }

    fn key(fx: &Fixture) -> String {
        token_cache_key(&fx.ctx.supplier, &fx.ctx.credentials.id)
    }

    async fn seed_cache(fx: &Fixture, created_at: i64, expires_in: i64) {
        TokenCache::new(&fx.config.config_dir)
            .save(
                &key(fx),
                &OAuth2Tokens {
                    access_token: "cached-access".to_string(),
                    refresh_token: "cached-refresh".to_string(),
                    created_at,
                    expires_in,
                },
            )
            .await
            .unwrap();
    }

    async fn refresh_mock(server: &mut ServerGuard) -> mockito::Mock {
        server
            .mock("POST", "/token")
            .match_body(Matcher::PartialJson(json!({
                "grant_type": "refresh_token",
                "refresh_token": "cached-refresh"
            })))
            .with_status(200)
            .with_body(r#"{"access_token":"refreshed","refresh_token":"r2","expires_in":3600}"#)
            .create_async()
            .await
    }

    fn state_with(settings: OAuth2Settings) -> RunState {
        RunState {
            oauth2: Some(settings),
            ..RunState::default()
        }
    }

    #[tokio::test]
    async fn test_setup_captures_settings() {
        let fx = fixture();
        let server = Server::new_async().await;
        let (_page, steps) = steps(&fx, FakePage::new());
        let s = settings(&server);

        let (result, state) = steps
            .execute(&step(StepAction::OAuth2Setup { oauth2: s.clone() }), &fx.ctx, RunState::default())
            .await;
        assert!(result.is_success());
        assert_eq!(state.oauth2, Some(s));
    }

    #[tokio::test]
    async fn test_check_tokens_without_cache_is_soft() {
        let fx = fixture();
        let (_page, steps) = steps(&fx, FakePage::new());

        let (result, state) = steps
            .execute(&step(StepAction::OAuth2CheckTokens), &fx.ctx, RunState::default())
            .await;
        assert!(!result.is_success());
        assert!(!result.break_recipe);
        assert_eq!(state.access_token, None);
    }

    #[tokio::test]
    async fn test_check_tokens_adopts_valid_cache() {
        let fx = fixture();
        seed_cache(&fx, chrono::Utc::now().timestamp(), 3600).await;
        let (_page, steps) = steps(&fx, FakePage::new());

        let (result, state) = steps
            .execute(&step(StepAction::OAuth2CheckTokens), &fx.ctx, RunState::default())
            .await;
        assert!(result.is_success());
        assert_eq!(state.access_token.as_deref(), Some("cached-access"));
    }

    #[tokio::test]
    async fn test_refresh_success_aborts_by_default() {
        let fx = fixture();
        let mut server = Server::new_async().await;
        let _m = refresh_mock(&mut server).await;
        seed_cache(&fx, 1_000, 50).await;
        let (_page, steps) = steps(&fx, FakePage::new());

        let (result, state) = steps
            .execute(&step(StepAction::OAuth2CheckTokens), &fx.ctx, state_with(settings(&server)))
            .await;

        assert!(!result.is_success());
        assert!(result.break_recipe);
        assert_eq!(state.access_token.as_deref(), Some("refreshed"));
        let cached = TokenCache::new(&fx.config.config_dir)
            .load(&key(&fx))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached.access_token, "refreshed");
    }

    #[tokio::test]
    async fn test_refresh_success_continues_when_configured() {
        let mut fx = fixture();
        fx.config.refresh_policy = RefreshPolicy::ContinueAfterRefresh;
        let mut server = Server::new_async().await;
        let _m = refresh_mock(&mut server).await;
        seed_cache(&fx, 1_000, 50).await;
        let (_page, steps) = steps(&fx, FakePage::new());

        let (result, state) = steps
            .execute(&step(StepAction::OAuth2CheckTokens), &fx.ctx, state_with(settings(&server)))
            .await;

        assert!(result.is_success());
        assert_eq!(state.access_token.as_deref(), Some("refreshed"));
    }

    /// 刷新成功后应当采用新令牌并继续；默认策略切换前保持忽略
    #[tokio::test]
    #[ignore = "刷新成功仍中断配方，等待产品决定后切换默认策略"]
    async fn test_refresh_success_continues_with_default_config() {
        let fx = fixture();
        let mut server = Server::new_async().await;
        let _m = refresh_mock(&mut server).await;
        seed_cache(&fx, 1_000, 50).await;
        let (_page, steps) = steps(&fx, FakePage::new());

        let (result, _) = steps
            .execute(&step(StepAction::OAuth2CheckTokens), &fx.ctx, state_with(settings(&server)))
            .await;
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_refresh_failure_falls_through_to_login() {
        let fx = fixture();
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;
        seed_cache(&fx, 1_000, 50).await;
        let (_page, steps) = steps(&fx, FakePage::new());

        let (result, state) = steps
            .execute(&step(StepAction::OAuth2CheckTokens), &fx.ctx, state_with(settings(&server)))
            .await;
        assert!(!result.is_success());
        assert!(!result.break_recipe);
        assert_eq!(state.access_token, None);
    }

    #[tokio::test]
    async fn test_authenticate_skips_with_token() {
        let fx = fixture();
        let (page, steps) = steps(&fx, FakePage::new());
        let state = RunState {
            access_token: Some("t".to_string()),
            ..RunState::default()
        };

        let (result, _) = steps
            .execute(&step(StepAction::OAuth2Authenticate), &fx.ctx, state)
            .await;
        assert!(result.is_success());
        assert!(page.calls().is_empty());
    }

    #[tokio::test]
    async fn test_authenticate_login_flow_without_second_factor() {
        let fx = fixture();
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/token")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(json!({
                "grant_type": "authorization_code",
                "code": "the-code",
                "client_id": "client-1"
            })))
            .with_status(200)
            .with_body(r#"{"access_token":"fresh","refresh_token":"r","expires_in":60}"#)
            .create_async()
            .await;

        let mut fake = FakePage::new();
        fake.missing.insert(PASSCODE_FIELD.to_string());
        fake.location = "https://app.acme.test/callback?code=the-code&state=x".to_string();
        let (page, steps) = steps(&fx, fake);

        let (result, state) = steps
            .execute(&step(StepAction::OAuth2Authenticate), &fx.ctx, state_with(settings(&server)))
            .await;

        assert!(result.is_success(), "{}", result.message);
        assert_eq!(state.access_token.as_deref(), Some("fresh"));

        let calls = page.calls();
        assert!(calls[0].starts_with(&format!("navigate {}/authorize?client_id=client-1", server.url())));
        assert!(calls.contains(&"type #form-input-identity alice@example.com".to_string()));
        assert!(calls.contains(&"type #form-input-credential pw".to_string()));
        assert!(!calls.iter().any(|c| c.contains(PASSCODE_FIELD)));
        assert!(TokenCache::new(&fx.config.config_dir)
            .load(&key(&fx))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_authenticate_enters_second_factor() {
        let fx = fixture();
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"access_token":"fresh","expires_in":60}"#)
            .create_async()
            .await;

        let mut fake = FakePage::new();
        fake.location = "https://app.acme.test/callback?code=c".to_string();
        let (page, steps) = steps(&fx, fake);

        let (result, _) = steps
            .execute(&step(StepAction::OAuth2Authenticate), &fx.ctx, state_with(settings(&server)))
            .await;

        assert!(result.is_success(), "{}", result.message);
        let calls = page.calls();
        assert!(calls.contains(&"type #form-input-passcode 654321".to_string()));
        assert!(calls.contains(&"click #form-submit".to_string()));
    }

    #[tokio::test]
    async fn test_authenticate_without_code_is_hard_failure() {
        let fx = fixture();
        let server = Server::new_async().await;
        let mut fake = FakePage::new();
        fake.missing.insert(PASSCODE_FIELD.to_string());
        fake.location = "https://app.acme.test/callback?error=denied".to_string();
        let (_page, steps) = steps(&fx, fake);

        let (result, state) = steps
            .execute(&step(StepAction::OAuth2Authenticate), &fx.ctx, state_with(settings(&server)))
            .await;
        assert!(result.break_recipe);
        assert_eq!(state.access_token, None);
    }

    #[tokio::test]
    async fn test_post_and_get_items_classification() {
        let fx = fixture();
        let mut server = Server::new_async().await;
        let _list = server
            .mock("POST", "/items")
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body(r#"{"items": [{"id": "a1"}]}"#)
            .create_async()
            .await;
        let _doc = server
            .mock("GET", "/doc/a1")
            .with_status(200)
            .with_body("pdf")
            .create_async()
            .await;
        let _denied = server
            .mock("POST", "/denied")
            .with_status(400)
            .create_async()
            .await;

        let (_page, steps) = steps(&fx, FakePage::new());
        let request: ItemsRequest = serde_json::from_value(json!({
            "url": format!("{}/items", server.url()),
            "headers": {"Authorization": "Bearer {{ token }}"},
            "extractDocumentIds": "items.id",
            "documentUrl": format!("{}/doc/{{{{ id }}}}", server.url())
        }))
        .unwrap();
        let state = RunState {
            access_token: Some("tok".to_string()),
            new_files: 5,
            ..RunState::default()
        };

        let (result, state) = steps
            .execute(&step(StepAction::OAuth2PostAndGetItems(request.clone())), &fx.ctx, state)
            .await;
        assert!(result.is_success(), "{}", result.message);
        assert_eq!(state.new_files, 1);

        let denied = ItemsRequest {
            url: format!("{}/denied", server.url()),
            ..request
        };
        let (result, _) = steps
            .execute(&step(StepAction::OAuth2PostAndGetItems(denied)), &fx.ctx, state)
            .await;
        assert!(!result.is_success());
        assert!(!result.break_recipe);
    }

    #[tokio::test]
    async fn test_transport_error_is_hard_failure() {
        let fx = fixture();
        let (_page, steps) = steps(&fx, FakePage::new());
        let request: ItemsRequest = serde_json::from_value(json!({
            "url": "http://127.0.0.1:9/items",
            "extractDocumentIds": "items.id",
            "documentUrl": "http://127.0.0.1:9/doc/{{ id }}"
        }))
        .unwrap();

        let (result, _) = steps
            .execute(&step(StepAction::OAuth2PostAndGetItems(request)), &fx.ctx, RunState::default())
            .await;
        assert!(result.break_recipe);
    }
}
