//! JWT authentication for socket handshakes.
//!
//! Tokens are HMAC-SHA256 signed, valid for seven days, and must carry
//! `userId`, `username` and `email` string claims. They arrive either in
//! the handshake payload (`?token=` query) or an `Authorization: Bearer`
//! header; both paths end up in [`AuthVerifier::verify`].

use std::env;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Player, UserId, Username};

/// Token lifetime: 7 days.
const TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

const DEFAULT_DEV_SECRET: &str = "dev-secret-change-in-production";

/// Token Claims
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    pub user_id: String,
    pub username: String,
    pub email: String,
    /// Expiry (Unix timestamp, seconds)
    pub exp: i64,
}

/// Connection-level authentication failure. Every variant surfaces to
/// the client as the single contract string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Unauthorized")]
    MissingToken,
    #[error("Unauthorized")]
    InvalidToken,
    #[error("Unauthorized")]
    InvalidClaims,
}

/// Identity attached to a connection for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub username: Username,
    pub email: String,
}

impl AuthenticatedUser {
    pub fn as_player(&self) -> Player {
        Player {
            user_id: self.user_id.clone(),
            username: self.username.clone(),
        }
    }
}

/// HS256 verifier/issuer over a shared secret.
pub struct AuthVerifier {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
}

impl AuthVerifier {
    pub fn new(secret: &[u8]) -> Self {
        let validation = Validation::new(Algorithm::HS256);
        Self {
            decoding: DecodingKey::from_secret(secret),
            encoding: EncodingKey::from_secret(secret),
            validation,
        }
    }

    /// Build from the `JWT_SECRET` environment variable, falling back to
    /// a development secret.
    pub fn from_env() -> Self {
        let secret = env::var("JWT_SECRET").unwrap_or_else(|_| DEFAULT_DEV_SECRET.to_string());
        Self::new(secret.as_bytes())
    }

    /// Extract the token from an `Authorization` header value.
    pub fn bearer(header_value: &str) -> Option<&str> {
        header_value.strip_prefix("Bearer ").map(str::trim)
    }

    /// Verify a token and materialize the connection identity.
    pub fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let data = decode::<TokenClaims>(token, &self.decoding, &self.validation)
            .map_err(|_| AuthError::InvalidToken)?;
        let claims = data.claims;
        let user_id = UserId::new(claims.user_id).map_err(|_| AuthError::InvalidClaims)?;
        let username = Username::new(claims.username).map_err(|_| AuthError::InvalidClaims)?;
        Ok(AuthenticatedUser {
            user_id,
            username,
            email: claims.email,
        })
    }

    /// Issue a token expiring in seven days.
    pub fn issue(&self, user_id: &str, username: &str, email: &str) -> Result<String, AuthError> {
        self.issue_with_exp(user_id, username, email, Utc::now().timestamp() + TOKEN_TTL_SECS)
    }

    /// Issue a token with an explicit expiry timestamp (seconds).
    pub fn issue_with_exp(
        &self,
        user_id: &str,
        username: &str,
        email: &str,
        exp: i64,
    ) -> Result<String, AuthError> {
        let claims = TokenClaims {
            user_id: user_id.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            exp,
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(|_| AuthError::InvalidToken)
    }
}
