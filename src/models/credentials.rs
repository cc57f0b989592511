//! 凭据
//!
//! 凭据由外部保险库提供，运行期间只读。

use crate::error::{AppResult, ConfigError};

/// 登录凭据
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// 稳定标识，用于令牌缓存键
    pub id: String,
    pub username: String,
    pub password: String,
    /// 一次性验证码
    pub totp: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("id", &self.id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// 凭据来源
pub trait CredentialSource: Send + Sync {
    /// 为某个供应商取得凭据
    fn credentials(&self, supplier: &str) -> AppResult<Credentials>;
}

/// 从环境变量读取凭据
///
/// 读取 `INVOICE_CREDENTIAL_ID` / `INVOICE_USERNAME` / `INVOICE_PASSWORD` / `INVOICE_TOTP`，
/// 用户名必须存在。
#[derive(Debug, Default)]
pub struct EnvCredentialSource;

impl CredentialSource for EnvCredentialSource {
    fn credentials(&self, supplier: &str) -> AppResult<Credentials> {
        let username = std::env::var("INVOICE_USERNAME").map_err(|_| ConfigError::EnvVarNotFound {
            var_name: "INVOICE_USERNAME".to_string(),
        })?;
        Ok(Credentials {
            id: std::env::var("INVOICE_CREDENTIAL_ID").unwrap_or_else(|_| supplier.to_string()),
            username,
            password: std::env::var("INVOICE_PASSWORD").unwrap_or_default(),
            totp: std::env::var("INVOICE_TOTP").unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_secrets() {
        let creds = Credentials {
            id: "c1".to_string(),
            username: "alice".to_string(),
            password: "hunter2".to_string(),
            totp: "123456".to_string(),
        };
        let printed = format!("{:?}", creds);
        assert!(printed.contains("alice"));
        assert!(!printed.contains("hunter2"));
        assert!(!printed.contains("123456"));
    }
}
