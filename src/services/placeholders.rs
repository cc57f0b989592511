//! 占位符替换
//!
//! 只做字面量替换，不是模板语言。

use crate::models::Credentials;

pub const USERNAME: &str = "{{ username }}";
pub const PASSWORD: &str = "{{ password }}";
pub const TOTP: &str = "{{ totp }}";
pub const TOKEN: &str = "{{ token }}";
pub const DOCUMENT_ID: &str = "{{ id }}";

/// 替换凭据占位符
pub fn fill_credentials(value: &str, credentials: &Credentials) -> String {
    value
        .replace(USERNAME, &credentials.username)
        .replace(PASSWORD, &credentials.password)
        .replace(TOTP, &credentials.totp)
}

/// 只替换 `Authorization` 头中的 `{{ token }}`
pub fn fill_header(name: &str, value: &str, access_token: &str) -> String {
    if name.eq_ignore_ascii_case("authorization") {
        value.replace(TOKEN, access_token)
    } else {
        value.to_string()
    }
}

/// 替换文档地址模板中的 `{{ id }}`
pub fn fill_document_url(template: &str, id: &str) -> String {
    template.replace(DOCUMENT_ID, id)
}
