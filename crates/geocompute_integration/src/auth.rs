use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;

/// Scope claim the gateway expects on every compute token.
pub const TOKEN_SCOPE: &str = "compute:execute";

#[derive(Debug, Clone)]
pub struct AccessTokenConfig {
    pub api_key: String,
    /// Shared HS256 secret, base64 encoded the way the gateway hands it out.
    pub api_secret_b64: String,
    pub ttl_seconds: i64,
}

#[derive(Debug, Serialize)]
struct Claims {
    iss: String,
    scope: String,
    exp: i64,
    iat: i64,
}

pub fn mint_access_token(
    cfg: &AccessTokenConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::seconds(cfg.ttl_seconds);
    let claims = Claims {
        iss: cfg.api_key.clone(),
        scope: TOKEN_SCOPE.to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_base64_secret(&cfg.api_secret_b64)?,
    )
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
