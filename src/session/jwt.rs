use base64::Engine;
use serde::Deserialize;

/// 访问令牌中的声明（仅用于展示，不做签名校验）
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct JwtClaims {
    pub sub: Option<String>,
    pub is_superuser: Option<bool>,
    pub exp: Option<i64>,
}

pub fn peek_claims(token: &str) -> Option<JwtClaims> {
    let payload = token.split('.').nth(1)?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}
