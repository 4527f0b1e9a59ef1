//! Error types for trader-auth.
//!
//! [`AuthError`] is returned by [`crate::SessionAuthenticator`] and can be returned
//! directly from axum handlers because it implements `IntoResponse`.
//! [`ConfigError`] is only produced while loading [`crate::AuthConfig`] at startup.
//!
//! ## 日本語
//!
//! trader-auth のエラー型です。
//!
//! [`AuthError`] は [`crate::SessionAuthenticator`] が返し、`IntoResponse` を実装しているため
//! axum の handler からそのまま返せます。[`ConfigError`] は起動時の設定読み込みでのみ発生します。

use thiserror::Error;

/// Errors returned while authenticating credentials or authorizing a token.
///
/// Every variant except [`AuthError::Internal`] is the caller's to recover from
/// by logging in again. None of them is fatal to the process.
///
/// ## 日本語
///
/// 認証・認可で返されるエラーの集合です。
///
/// [`AuthError::Internal`] 以外はすべて再ログインで回復でき、プロセスを停止させるものはありません。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Unknown username or wrong password. The two cases are deliberately
    /// indistinguishable.
    ///
    /// ## 日本語
    ///
    /// ユーザー名が存在しない、またはパスワードが一致しない。両者は区別しません。
    #[error("Incorrect username or password")]
    InvalidCredentials,

    /// The password was correct but the account is disabled.
    #[error("Account is disabled")]
    AccountDisabled,

    /// The token is malformed or its signature does not verify.
    #[error("Could not validate credentials")]
    InvalidToken,

    /// The token verified but its expiry is in the past.
    #[error("Token expired")]
    TokenExpired,

    /// The token is valid but lacks the named scope.
    #[error("Missing required scope: {0}")]
    InsufficientScope(String),

    /// Signing or hashing failed for a reason unrelated to the caller's input.
    #[error("Internal authentication error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Whether re-authenticating could resolve this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, AuthError::Internal(_))
    }
}

/// Errors raised while loading configuration at process start.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No signing secret was supplied (or it was empty).
    #[error("SECRET_KEY is not set; refusing to issue tokens without a signing secret")]
    MissingSecret,

    /// The token lifetime could not be parsed, was not positive, or was too long.
    #[error("Invalid token lifetime: {0}")]
    InvalidTtl(String),

    /// A boolean setting held something other than true/false.
    #[error("Invalid value for {0}: {1}")]
    InvalidFlag(&'static str, String),
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::{HeaderValue, StatusCode, header};

        let status = match &self {
            AuthError::InvalidCredentials | AuthError::InvalidToken | AuthError::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::AccountDisabled | AuthError::InsufficientScope(_) => StatusCode::FORBIDDEN,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Internal details stay in the logs.
        let body = match &self {
            AuthError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let mut resp = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            resp.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer"),
            );
        }
        resp
    }
}
