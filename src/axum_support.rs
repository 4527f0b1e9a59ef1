//! ## 日本語
//!
//! axum 向けの extractor 実装です。
//!
//! - `Extension<SessionAuthenticator>` を state から取得し
//! - Header/Cookie から token を抽出して検証し
//! - `AuthUser` を handler 引数として利用できるようにします
//!
//! ## English
//!
//! Axum extractor implementation.
//!
//! - Fetches `Extension<SessionAuthenticator>` from request state
//! - Extracts a token from headers/cookies and authorizes it
//! - Enables `AuthUser` as a handler parameter

use crate::{AuthError, Identity, SessionAuthenticator, TokenSourceConfig, extract_token_with_config};
use axum::{
    extract::{Extension, FromRequestParts},
    http::{HeaderValue, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};

/// ## 日本語
///
/// axum から抽出される認証済みユーザーコンテキストです。
///
/// 抽出が成功した場合：
/// - `identity` は token から復元されたユーザー名と scope
/// - `token` はリクエストに含まれていた token の生文字列
///
/// ## English
///
/// An authenticated request context extracted from axum.
///
/// If extraction succeeds:
/// - `identity` holds the username and scopes decoded from the token
/// - `token` is the raw token string from the request
///
/// Use `Result<AuthUser, AuthRejection>` as the handler parameter to handle
/// failures yourself (e.g. redirect to a login page).
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub identity: Identity,
    pub token: String,
}

impl AuthUser {
    pub fn username(&self) -> &str {
        &self.identity.username
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.identity.has_scope(scope)
    }

    /// Fails with [`AuthError::InsufficientScope`] unless the token carries `scope`.
    pub fn require_scope(&self, scope: &str) -> Result<(), AuthError> {
        self.identity.require_scope(scope)
    }
}

/// Why [`AuthUser`] extraction failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthRejection {
    /// The router has no `Extension<SessionAuthenticator>` layer.
    AuthenticatorMissing,
    /// No token in any configured header or cookie.
    TokenMissing,
    /// A token was found but did not authorize.
    Auth(AuthError),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            AuthRejection::AuthenticatorMissing => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Authenticator not found").into_response()
            }
            AuthRejection::TokenMissing => {
                let mut resp = (StatusCode::UNAUTHORIZED, "Not authenticated").into_response();
                resp.headers_mut().insert(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static("Bearer"),
                );
                resp
            }
            AuthRejection::Auth(err) => err.into_response(),
        }
    }
}

impl From<AuthError> for AuthRejection {
    fn from(err: AuthError) -> Self {
        AuthRejection::Auth(err)
    }
}

fn cookie_header_string(parts: &Parts) -> Option<String> {
    // 日本語: Cookie header は複数来る可能性があるため結合して扱う。
    // English: Cookie headers may appear multiple times; concatenate them.
    let mut out = String::new();
    for v in parts.headers.get_all(header::COOKIE).iter() {
        let Ok(s) = v.to_str() else {
            continue;
        };
        if !out.is_empty() {
            out.push_str("; ");
        }
        out.push_str(s);
    }
    if out.is_empty() { None } else { Some(out) }
}

fn find_cookie_value(cookie_header: &str, target_name: &str) -> Option<String> {
    // 日本語: "name=value; name2=value2" 形式の最小パーサ。デコードは行わない。
    // English: Minimal parser for "name=value; name2=value2"; no decoding.
    for part in cookie_header.split(';') {
        let Some((name, value)) = part.trim().split_once('=') else {
            continue;
        };
        if name.trim() == target_name {
            return Some(value.trim().trim_matches('"').to_string());
        }
    }
    None
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // 日本語: 1) state から SessionAuthenticator を取り出す。
        //        ルータに `.layer(Extension(authenticator))` が必要。
        // English: 1) Fetch the SessionAuthenticator from request state.
        //          The router must install `.layer(Extension(authenticator))`.
        let Extension(authenticator) =
            Extension::<SessionAuthenticator>::from_request_parts(parts, state)
                .await
                .map_err(|_| AuthRejection::AuthenticatorMissing)?;

        // 日本語: 2) TokenSourceConfig を任意で読む（無ければデフォルト）。
        // English: 2) Read TokenSourceConfig if provided; otherwise use defaults.
        let cfg = match Extension::<TokenSourceConfig>::from_request_parts(parts, state).await {
            Ok(Extension(cfg)) => cfg,
            Err(_) => TokenSourceConfig::default(),
        };

        let cookie_header = cookie_header_string(parts);

        // 日本語: 3) header/cookie から token を抽出する（優先順位は cfg に従う）。
        // English: 3) Extract the token from header/cookie (priority controlled by cfg).
        let token = extract_token_with_config(
            &cfg,
            |name| {
                parts
                    .headers
                    .get(name)
                    .and_then(|h| h.to_str().ok())
                    .map(|s| s.to_string())
            },
            |name| {
                cookie_header
                    .as_deref()
                    .and_then(|h| find_cookie_value(h, name))
            },
        )
        .ok_or(AuthRejection::TokenMissing)?;

        // 日本語: 4) 署名と有効期限を検証する。scope の確認は handler 側で行う。
        // English: 4) Verify signature and expiry. Scope checks are left to the handler.
        let identity = authenticator.authorize(&token, None)?;
        Ok(Self { identity, token })
    }
}
