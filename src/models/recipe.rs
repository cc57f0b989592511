//! 配方与步骤
//!
//! `Step` 是对动作类型的封闭和类型，每个动作只携带自己需要的字段。

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// 配方：某个供应商的、带版本号的有序步骤列表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(alias = "provider")]
    pub supplier: String,
    pub version: String,
    pub steps: Vec<Step>,
}

/// 配方由哪种驱动执行
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeKind {
    /// 通过浏览器操作登录和下载界面
    Browser,
    /// 通过浏览器完成授权后调用 REST API
    OAuth2,
}

impl Recipe {
    pub fn kind(&self) -> RecipeKind {
        if self.steps.iter().any(|s| s.action.is_oauth2()) {
            RecipeKind::OAuth2
        } else {
            RecipeKind::Browser
        }
    }

    /// 步骤标识：`<supplier>-<version>-<从1开始的序号>-<action>`
    pub fn step_id(&self, index: usize, step: &Step) -> String {
        format!(
            "{}-{}-{}-{}",
            self.supplier,
            self.version,
            index,
            step.action.name()
        )
    }
}

/// 单个步骤
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub action: StepAction,
}

/// 步骤动作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum StepAction {
    #[serde(rename = "open")]
    Open { url: String },
    #[serde(rename = "removeElement")]
    RemoveElement { selector: String },
    #[serde(rename = "click")]
    Click { selector: String },
    /// `value` 中的 `{{ username }}` / `{{ password }}` / `{{ totp }}` 在输入前替换
    #[serde(rename = "type")]
    Type { selector: String, value: String },
    #[serde(rename = "sleep")]
    Sleep {
        #[serde(rename = "value", deserialize_with = "seconds_from_any")]
        seconds: u64,
    },
    #[serde(rename = "waitFor")]
    WaitFor { selector: String },
    /// 对 `selector` 命中的节点逐个点击，再点击 `节点路径 + value` 触发下载
    #[serde(rename = "downloadAll")]
    DownloadAll {
        selector: String,
        #[serde(default)]
        value: String,
    },
    #[serde(rename = "transform")]
    Transform { value: String },
    /// `value` 是匹配文件名的正则表达式
    #[serde(rename = "move")]
    Move { value: String },
    #[serde(rename = "runScript")]
    RunScript { value: String },
    /// `value` 是一个求值结果为对象的表达式，对象的值都是下载地址
    #[serde(rename = "runScriptDownloadUrls")]
    RunScriptDownloadUrls { value: String },
    #[serde(rename = "oauth2-setup")]
    OAuth2Setup { oauth2: OAuth2Settings },
    #[serde(rename = "oauth2-check-tokens")]
    OAuth2CheckTokens,
    #[serde(rename = "oauth2-authenticate")]
    OAuth2Authenticate,
    #[serde(rename = "oauth2-post-and-get-items")]
    OAuth2PostAndGetItems(ItemsRequest),
}

impl StepAction {
    /// 配方文件中使用的动作名
    pub fn name(&self) -> &'static str {
        match self {
            StepAction::Open { .. } => "open",
            StepAction::RemoveElement { .. } => "removeElement",
            StepAction::Click { .. } => "click",
            StepAction::Type { .. } => "type",
            StepAction::Sleep { .. } => "sleep",
            StepAction::WaitFor { .. } => "waitFor",
            StepAction::DownloadAll { .. } => "downloadAll",
            StepAction::Transform { .. } => "transform",
            StepAction::Move { .. } => "move",
            StepAction::RunScript { .. } => "runScript",
            StepAction::RunScriptDownloadUrls { .. } => "runScriptDownloadUrls",
            StepAction::OAuth2Setup { .. } => "oauth2-setup",
            StepAction::OAuth2CheckTokens => "oauth2-check-tokens",
            StepAction::OAuth2Authenticate => "oauth2-authenticate",
            StepAction::OAuth2PostAndGetItems(_) => "oauth2-post-and-get-items",
        }
    }

    pub fn is_oauth2(&self) -> bool {
        matches!(
            self,
            StepAction::OAuth2Setup { .. }
                | StepAction::OAuth2CheckTokens
                | StepAction::OAuth2Authenticate
                | StepAction::OAuth2PostAndGetItems(_)
        )
    }
}

/// OAuth2 子配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2Settings {
    pub auth_url: String,
    pub token_url: String,
    pub redirect_url: String,
    pub client_id: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default = "default_pkce_method")]
    pub pkce_method: String,
    #[serde(default = "default_pkce_verifier_length")]
    pub pkce_verifier_length: usize,
}

/// 拉取文档列表并逐个下载
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemsRequest {
    pub url: String,
    #[serde(default = "default_items_method")]
    pub method: String,
    /// 字符串原样发送，其它 JSON 值序列化后发送
    #[serde(default)]
    pub body: Option<serde_json::Value>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub extract_document_ids: String,
    #[serde(default)]
    pub extract_document_filenames: Option<String>,
    /// 含 `{{ id }}` 占位符
    pub document_url: String,
    #[serde(default = "default_document_method")]
    pub document_request_method: String,
    #[serde(default)]
    pub document_request_headers: BTreeMap<String, String>,
}

impl ItemsRequest {
    /// 请求体文本
    pub fn body_text(&self) -> String {
        match &self.body {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    /// 文件名路径（空字符串视为未配置）
    pub fn filename_path(&self) -> Option<&str> {
        self.extract_document_filenames
            .as_deref()
            .filter(|p| !p.trim().is_empty())
    }
}

fn default_pkce_method() -> String {
    "S256".to_string()
}

fn default_pkce_verifier_length() -> usize {
    64
}

fn default_items_method() -> String {
    "POST".to_string()
}

fn default_document_method() -> String {
    "GET".to_string()
}

/// `sleep` 的秒数既可能写成数字也可能写成字符串
fn seconds_from_any<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(u64),
        Text(String),
    }

    match Seconds::deserialize(deserializer)? {
        Seconds::Number(n) => Ok(n),
        Seconds::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("无效的秒数: {}", s))),
    }
}
