use std::path::PathBuf;
use std::time::Duration;

use crate::models::RecipeKind;

/// 令牌刷新成功后 check-tokens 步骤的行为
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// 采用新令牌，但报告中断错误（沿用现有行为）
    AbortAfterRefresh,
    /// 采用新令牌并继续执行
    ContinueAfterRefresh,
}

impl RefreshPolicy {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "abort" => Some(Self::AbortAfterRefresh),
            "continue" => Some(Self::ContinueAfterRefresh),
            _ => None,
        }
    }
}

/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    /// 文档根目录（下载暂存区和文档库都在这里）
    pub documents_root: PathBuf,
    /// 配置目录（存放 OAuth2 令牌缓存）
    pub config_dir: PathBuf,
    /// 配方文件
    pub recipe_file: PathBuf,
    /// 浏览器可执行文件，不设置则自动查找
    pub chrome_executable: Option<PathBuf>,
    /// 浏览器配方是否使用无头模式
    pub headless: bool,
    /// OAuth2 配方是否使用无头模式（登录页面默认可见）
    pub oauth2_headless: bool,
    /// 浏览器配方的单步超时（秒）
    pub browser_step_timeout_secs: u64,
    /// OAuth2 配方的单步超时（秒）
    pub oauth2_step_timeout_secs: u64,
    /// 整个浏览器会话的安全超时（秒）
    pub session_timeout_secs: u64,
    /// downloadAll 每步最多触发的下载数
    pub max_downloads_per_step: usize,
    /// downloadAll 两次点击之间的间隔（毫秒）
    pub download_click_delay_ms: u64,
    /// 刷新令牌成功后的行为
    pub refresh_policy: RefreshPolicy,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            documents_root: PathBuf::from("documents"),
            config_dir: PathBuf::from(".invoice_harvest"),
            recipe_file: PathBuf::from("recipes.json"),
            chrome_executable: None,
            headless: true,
            oauth2_headless: false,
            browser_step_timeout_secs: 60,
            oauth2_step_timeout_secs: 120,
            session_timeout_secs: 600,
            max_downloads_per_step: 2,
            download_click_delay_ms: 1500,
            refresh_policy: RefreshPolicy::AbortAfterRefresh,
            verbose_logging: false,
            output_log_file: "harvest.log".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            documents_root: std::env::var("INVOICE_DOCUMENTS_DIR").map(PathBuf::from).unwrap_or(default.documents_root),
            config_dir: std::env::var("INVOICE_CONFIG_DIR").map(PathBuf::from).unwrap_or(default.config_dir),
            recipe_file: std::env::var("RECIPE_FILE").map(PathBuf::from).unwrap_or(default.recipe_file),
            chrome_executable: std::env::var("CHROME_EXECUTABLE").ok().map(PathBuf::from).or(default.chrome_executable),
            headless: std::env::var("BROWSER_HEADLESS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.headless),
            oauth2_headless: std::env::var("OAUTH2_BROWSER_HEADLESS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.oauth2_headless),
            browser_step_timeout_secs: std::env::var("BROWSER_STEP_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.browser_step_timeout_secs),
            oauth2_step_timeout_secs: std::env::var("OAUTH2_STEP_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.oauth2_step_timeout_secs),
            session_timeout_secs: std::env::var("SESSION_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.session_timeout_secs),
            max_downloads_per_step: std::env::var("MAX_DOWNLOADS_PER_STEP").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_downloads_per_step),
            download_click_delay_ms: std::env::var("DOWNLOAD_CLICK_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.download_click_delay_ms),
            refresh_policy: std::env::var("OAUTH2_REFRESH_POLICY").ok().and_then(|v| RefreshPolicy::parse(&v)).unwrap_or(default.refresh_policy),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
        }
    }

    /// 某种配方的浏览器是否无头
    pub fn headless_for(&self, kind: RecipeKind) -> bool {
        match kind {
            RecipeKind::Browser => self.headless,
            RecipeKind::OAuth2 => self.oauth2_headless,
        }
    }

    pub fn browser_step_timeout(&self) -> Duration {
        Duration::from_secs(self.browser_step_timeout_secs)
    }

    pub fn oauth2_step_timeout(&self) -> Duration {
        Duration::from_secs(self.oauth2_step_timeout_secs)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn download_click_delay(&self) -> Duration {
        Duration::from_millis(self.download_click_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_driver_timeouts() {
        let config = Config::default();
        assert_eq!(config.browser_step_timeout(), Duration::from_secs(60));
        assert_eq!(config.oauth2_step_timeout(), Duration::from_secs(120));
        assert_eq!(config.session_timeout(), Duration::from_secs(600));
        assert_eq!(config.max_downloads_per_step, 2);
        assert_eq!(config.download_click_delay(), Duration::from_millis(1500));
        assert_eq!(config.refresh_policy, RefreshPolicy::AbortAfterRefresh);
    }

    #[test]
    fn test_oauth2_login_browser_is_visible_by_default() {
        let config = Config::default();
        assert!(config.headless_for(RecipeKind::Browser));
        assert!(!config.headless_for(RecipeKind::OAuth2));

        let config = Config {
            oauth2_headless: true,
            ..Config::default()
        };
        assert!(config.headless_for(RecipeKind::OAuth2));
    }

    #[test]
    fn test_refresh_policy_parse() {
        assert_eq!(RefreshPolicy::parse("continue"), Some(RefreshPolicy::ContinueAfterRefresh));
        assert_eq!(RefreshPolicy::parse(" Abort "), Some(RefreshPolicy::AbortAfterRefresh));
        assert_eq!(RefreshPolicy::parse("maybe"), None);
    }
}
