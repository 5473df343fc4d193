use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::error::AppError;

/// Distinguishes short-lived access tokens from refresh tokens.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Represents the claims encoded within a JWT (JSON Web Token).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject of the token, the user's unique identifier.
    pub sub: i32,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: usize,
    /// Expiration timestamp (seconds since epoch).
    pub exp: usize,
    /// Unique token identifier.
    pub jti: String,
    /// Whether this is an access or a refresh token.
    pub token_type: TokenKind,
}

/// Signing material and lifetimes for issuing and verifying tokens.
///
/// Built once from configuration at start-up and shared with handlers and the
/// authentication middleware through `web::Data`.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &JwtConfig) -> Self {
        Self::new(
            &config.secret,
            Duration::minutes(config.access_ttl_minutes),
            Duration::minutes(config.refresh_ttl_minutes),
        )
    }

    fn issue(&self, user_id: i32, kind: TokenKind) -> Result<String, AppError> {
        let now = Utc::now();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: user_id,
            iat: now.timestamp() as usize,
            exp: (now + ttl).timestamp() as usize,
            jti: Uuid::new_v4().simple().to_string(),
            token_type: kind,
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::InternalServerError(format!("Failed to generate token: {}", e)))
    }

    /// Issues a short-lived token that authorizes API requests.
    pub fn issue_access(&self, user_id: i32) -> Result<String, AppError> {
        self.issue(user_id, TokenKind::Access)
    }

    /// Issues a longer-lived token that can only be exchanged for access tokens.
    pub fn issue_refresh(&self, user_id: i32) -> Result<String, AppError> {
        self.issue(user_id, TokenKind::Refresh)
    }

    /// Verifies the signature and expiry of `token` and checks that it is of the
    /// `expected` kind.
    ///
    /// Returns `AppError::Unauthorized` if the token is malformed, signed with a different
    /// key, expired, or of the wrong kind.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding, &validation)?.claims;
        if claims.token_type != expected {
            return Err(AppError::Unauthorized("Token has wrong type".into()));
        }
        Ok(claims)
    }
}
