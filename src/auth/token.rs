use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;

/// Password-reset tokens have a fixed lifetime.
pub const PASSWORD_RESET_TTL_HOURS: i64 = 1;

/// What a token may be used for. Serialized into the `type` claim.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
    PasswordReset,
}

/// Represents the claims encoded within a JWT (JSON Web Token).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject of the token: the user id. Absent on password-reset tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<i64>,
    pub email: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: i64,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
    pub jti: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("expected a {expected:?} token, got {found:?}")]
    KindMismatch {
        expected: TokenKind,
        found: TokenKind,
    },
    #[error("failed to sign token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    #[error("token lifetime {0} is out of range")]
    LifetimeOutOfRange(Duration),
}

/// Issues and verifies signed, expiring tokens.
///
/// Tokens are stateless: validity is decided by signature, expiry and the `type` claim
/// at verification time. The key and algorithm are fixed for the life of the process.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(
        secret: &str,
        algorithm: Algorithm,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            algorithm,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.jwt_secret,
            config.jwt_algorithm,
            Duration::minutes(config.access_token_expire_minutes),
            Duration::days(config.refresh_token_expire_days),
        )
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Signs a token of `kind` for `subject` that expires `ttl` from now.
    pub fn issue_token(
        &self,
        subject: Option<i64>,
        email: &str,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or(TokenError::LifetimeOutOfRange(ttl))?;
        let claims = Claims {
            sub: subject,
            email: email.to_string(),
            kind,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4(),
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding).map_err(TokenError::Encoding)
    }

    pub fn issue_access_token(&self, user_id: i64, email: &str) -> Result<String, TokenError> {
        self.issue_token(Some(user_id), email, TokenKind::Access, self.access_ttl)
    }

    pub fn issue_refresh_token(&self, user_id: i64, email: &str) -> Result<String, TokenError> {
        self.issue_token(Some(user_id), email, TokenKind::Refresh, self.refresh_ttl)
    }

    /// Reset tokens identify the account by email rather than by id.
    pub fn issue_password_reset_token(&self, email: &str) -> Result<String, TokenError> {
        self.issue_token(
            None,
            email,
            TokenKind::PasswordReset,
            Duration::hours(PASSWORD_RESET_TTL_HOURS),
        )
    }

    /// Checks signature, then expiry, then that the token is of the `expected` kind.
    pub fn verify_token(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::InvalidSignature,
            })?;

        if claims.kind != expected {
            return Err(TokenError::KindMismatch {
                expected,
                found: claims.kind,
            });
        }

        Ok(claims)
    }

    /// Returns the email a valid password-reset token was issued for.
    pub fn verify_password_reset_token(&self, token: &str) -> Result<String, TokenError> {
        self.verify_token(token, TokenKind::PasswordReset)
            .map(|claims| claims.email)
    }
}
