//! ## 日本語
//!
//! セッション token に埋め込まれるクレームと、検証後に handler へ渡される identity です。
//!
//! ## English
//!
//! Claims embedded in a session token, and the identity handed to handlers
//! once a token has been verified.

use crate::models::AuthError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// `token_type` reported alongside an issued token.
pub const TOKEN_TYPE: &str = "bearer";

/// Claims signed into every session token.
///
/// Timestamps are Unix seconds, as JWT expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Username of the authenticated user.
    pub sub: String,
    #[serde(default)]
    pub scopes: BTreeSet<String>,
    pub iat: i64,
    pub exp: i64,
    /// Random UUID v4; makes every issued token distinct.
    pub jti: String,
}

/// The authenticated caller, decoded from a verified token.
///
/// The token is the only source of truth: building an `Identity` never
/// consults the user table.
///
/// ## 日本語
///
/// 検証済み token から復元された呼び出し元です。
///
/// token が唯一の情報源であり、`Identity` の構築時にユーザーテーブルは参照しません。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub username: String,
    pub scopes: BTreeSet<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Identity {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    /// Fails with [`AuthError::InsufficientScope`] unless `scope` was granted.
    pub fn require_scope(&self, scope: &str) -> Result<(), AuthError> {
        if self.has_scope(scope) {
            Ok(())
        } else {
            Err(AuthError::InsufficientScope(scope.to_string()))
        }
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.expires_at - Utc::now()
    }

    /// Minutes remaining until expiry, floored at zero (for display).
    pub fn minutes_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_minutes().max(0)
    }
}

impl TryFrom<SessionClaims> for Identity {
    type Error = AuthError;

    fn try_from(claims: SessionClaims) -> Result<Self, Self::Error> {
        let issued_at = DateTime::from_timestamp(claims.iat, 0).ok_or(AuthError::InvalidToken)?;
        let expires_at = DateTime::from_timestamp(claims.exp, 0).ok_or(AuthError::InvalidToken)?;
        Ok(Self {
            username: claims.sub,
            scopes: claims.scopes,
            issued_at,
            expires_at,
        })
    }
}

/// Body returned by the JSON token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
}

impl AccessToken {
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: TOKEN_TYPE.to_string(),
        }
    }
}
