use serde::{Deserialize, Serialize};

/// OAuth2 令牌，按 `supplier|credentialId` 缓存在磁盘上
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth2Tokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Unix 秒
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub expires_in: i64,
}

impl OAuth2Tokens {
    /// 有效期：created_at + expires_in > now
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.created_at.saturating_add(self.expires_in) > now
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(chrono::Utc::now().timestamp())
    }
}

/// 令牌缓存键
pub fn token_cache_key(supplier: &str, credential_id: &str) -> String {
    format!("{}|{}", supplier, credential_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_validity_boundary() {
        let tokens = OAuth2Tokens {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            created_at: 1000,
            expires_in: 50,
        };
        assert!(tokens.is_valid_at(1049));
        assert!(!tokens.is_valid_at(1050));
        assert!(!tokens.is_valid_at(1051));
    }

    #[test]
    fn test_token_response_without_timestamps() {
        let tokens: OAuth2Tokens =
            serde_json::from_str(r#"{"access_token":"abc","token_type":"Bearer"}"#).unwrap();
        assert_eq!(tokens.access_token, "abc");
        assert_eq!(tokens.created_at, 0);
        assert!(!tokens.is_valid_at(1));
    }

    #[test]
    fn test_huge_expires_in_stays_valid() {
        let tokens: OAuth2Tokens = serde_json::from_str(
            r#"{"access_token":"abc","created_at":1700000000,"expires_in":9223372036854775807}"#,
        )
        .unwrap();
        assert!(tokens.is_valid_at(1_700_000_001));
    }

    #[test]
    fn test_cache_key() {
        assert_eq!(token_cache_key("acme", "cred-7"), "acme|cred-7");
    }
}
