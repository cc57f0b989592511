//! PKCE 与随机 state 生成

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::RecipeError;

const UNRESERVED: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// PKCE verifier 与 challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
    pub method: String,
}

impl PkcePair {
    /// 生成指定长度的 verifier 及对应 challenge
    ///
    /// `method` 支持 `S256` 和 `plain`（大小写不敏感）。
    pub fn generate(length: usize, method: &str) -> Result<Self, RecipeError> {
        if !(43..=128).contains(&length) {
            return Err(RecipeError::InvalidPkceLength { length });
        }
        let verifier = random_string(length, UNRESERVED);
        let challenge = challenge_for(&verifier, method)?;
        Ok(Self {
            verifier,
            challenge,
            method: normalize_method(method),
        })
    }
}

/// 计算 challenge
pub fn challenge_for(verifier: &str, method: &str) -> Result<String, RecipeError> {
    match normalize_method(method).as_str() {
        "S256" => Ok(URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))),
        "plain" => Ok(verifier.to_string()),
        _ => Err(RecipeError::UnsupportedPkceMethod {
            method: method.to_string(),
        }),
    }
}

/// 随机的不透明 state 值
pub fn random_state(length: usize) -> String {
    random_string(
        length,
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789",
    )
}

fn random_string(length: usize, charset: &[u8]) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| charset[rng.gen_range(0..charset.len())] as char)
        .collect()
}

fn normalize_method(method: &str) -> String {
    if method.eq_ignore_ascii_case("s256") {
        "S256".to_string()
    } else if method.eq_ignore_ascii_case("plain") {
        "plain".to_string()
    } else {
        method.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s256_known_vector() {
        let challenge =
            challenge_for("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk", "S256").unwrap();
        assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn test_generate_respects_length_and_charset() {
        let pair = PkcePair::generate(64, "s256").unwrap();
        assert_eq!(pair.verifier.len(), 64);
        assert!(pair.verifier.bytes().all(|b| UNRESERVED.contains(&b)));
        assert_eq!(pair.method, "S256");
        assert_eq!(pair.challenge, challenge_for(&pair.verifier, "S256").unwrap());
    }

    #[test]
    fn test_plain_method() {
        let pair = PkcePair::generate(43, "plain").unwrap();
        assert_eq!(pair.verifier, pair.challenge);
    }

    #[test]
    fn test_invalid_length_and_method() {
        assert!(matches!(
            PkcePair::generate(12, "S256"),
            Err(RecipeError::InvalidPkceLength { length: 12 })
        ));
        assert!(matches!(
            PkcePair::generate(50, "S512"),
            Err(RecipeError::UnsupportedPkceMethod { .. })
        ));
    }

    #[test]
    fn test_random_state() {
        let a = random_state(20);
        let b = random_state(20);
        assert_eq!(a.len(), 20);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
