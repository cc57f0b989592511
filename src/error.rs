use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// HTTP / OAuth2 调用错误
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 配方内容错误
    #[error("配方错误: {0}")]
    Recipe(#[from] RecipeError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 启动浏览器失败
    #[error("启动浏览器失败: {source}")]
    LaunchFailed { source: BoxError },
    /// 浏览器配置失败
    #[error("浏览器配置失败: {message}")]
    ConfigurationFailed { message: String },
    /// 创建页面失败
    #[error("创建页面失败: {source}")]
    PageCreationFailed { source: BoxError },
    /// 导航失败
    #[error("导航到 {url} 失败: {reason}")]
    NavigationFailed { url: String, reason: String },
    /// 执行脚本失败
    #[error("执行脚本失败: {source}")]
    ScriptExecutionFailed { source: BoxError },
    /// 元素不存在或无法操作
    #[error("元素操作失败 ({selector}): {reason}")]
    ElementFailed { selector: String, reason: String },
    /// 会话已取消（安全超时或运行结束）
    #[error("浏览器会话已取消")]
    Cancelled,
}

/// HTTP / OAuth2 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败
    #[error("API请求失败 ({endpoint}): {source}")]
    RequestFailed { endpoint: String, source: BoxError },
    /// 400：授权无效或 grant 过期
    #[error("获取 OAuth2 令牌时授权失败 ({endpoint})")]
    Unauthorized { endpoint: String },
    /// 未分类的状态码
    #[error("API返回未知状态 ({endpoint}): HTTP {status}")]
    UnexpectedStatus { endpoint: String, status: u16 },
    /// JSON 解析失败
    #[error("JSON解析失败: {source}")]
    JsonParseFailed { source: BoxError },
    /// 响应中没有文档 ID
    #[error("响应中未找到文档ID (路径: {path})")]
    NoDocumentIds { path: String },
    /// 文档下载失败
    #[error("下载文档失败 ({url}): {reason}")]
    DownloadFailed { url: String, reason: String },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed { path: String, source: BoxError },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed { path: String, source: BoxError },
    /// 复制文件失败
    #[error("复制文件失败 ({from} -> {to}): {source}")]
    CopyFailed {
        from: String,
        to: String,
        source: BoxError,
    },
    /// 解压失败
    #[error("解压文件失败 ({path}): {source}")]
    UnzipFailed { path: String, source: BoxError },
    /// 目录操作失败
    #[error("目录操作失败 ({path}): {source}")]
    DirectoryFailed { path: String, source: BoxError },
}

/// 配方内容错误
#[derive(Debug, Error)]
pub enum RecipeError {
    /// 配方文件解析失败
    #[error("配方解析失败 ({path}): {reason}")]
    ParseFailed { path: String, reason: String },
    /// 正则表达式无效
    #[error("无效的文件名匹配规则 '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    /// PKCE verifier 长度不合法
    #[error("PKCE verifier 长度 {length} 不在 43..=128 范围内")]
    InvalidPkceLength { length: usize },
    /// 不支持的 PKCE 方法
    #[error("不支持的 PKCE 方法: {method}")]
    UnsupportedPkceMethod { method: String },
    /// 执行 OAuth2 步骤前未执行 oauth2-setup
    #[error("OAuth2 尚未配置 (缺少 oauth2-setup 步骤)")]
    MissingOAuth2Setup,
    /// 登录结束后地址中没有授权码
    #[error("登录后的地址中没有授权码: {location}")]
    MissingAuthorizationCode { location: String },
    /// 当前驱动不支持该动作
    #[error("当前配方类型不支持动作 {action}")]
    UnsupportedAction { action: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 环境变量不存在
    #[error("环境变量 {var_name} 不存在")]
    EnvVarNotFound { var_name: String },
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::ScriptExecutionFailed {
            source: Box::new(err),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Api(ApiError::JsonParseFailed {
            source: Box::new(err),
        })
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Recipe(RecipeError::ParseFailed {
            path: String::new(),
            reason: err.to_string(),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err.url().map(|u| u.to_string()).unwrap_or_default();
        AppError::api_request_failed(endpoint, err)
    }
}

impl From<zip::result::ZipError> for AppError {
    fn from(err: zip::result::ZipError) -> Self {
        AppError::File(FileError::UnzipFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建API请求失败错误
    pub fn api_request_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Api(ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        })
    }

    /// 创建元素操作错误
    pub fn element_failed(selector: impl Into<String>, reason: impl ToString) -> Self {
        AppError::Browser(BrowserError::ElementFailed {
            selector: selector.into(),
            reason: reason.to_string(),
        })
    }

    /// 创建目录操作错误
    pub fn directory_failed(
        path: impl AsRef<std::path::Path>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::DirectoryFailed {
            path: path.as_ref().display().to_string(),
            source: Box::new(source),
        })
    }

    /// 是否是 400 授权失败
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AppError::Api(ApiError::Unauthorized { .. }))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
