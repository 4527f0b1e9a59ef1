#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::empty_loop)]
#![deny(clippy::indexing_slicing)]
#![deny(unused)]
//! # trader-auth
//!
//! Stateless session authentication for the trader web front end.
//!
//! The library exposes a few building blocks:
//! - [`SessionAuthenticator`]: verifies credentials against an injected, read-only
//!   [`UserTable`], issues signed time-bound tokens (HS256 JWT) and authorizes them.
//! - [`AuthConfig`]: the signing secret and token TTL, loaded from the environment.
//! - [`AuthUser`] (feature `axum`): an axum extractor that authorizes the request and
//!   hands the decoded [`Identity`] to the handler.
//!
//! ## How authentication works
//!
//! 1. The login handler calls [`SessionAuthenticator::authenticate`] with the submitted
//!    username and password.
//! 2. The token is returned to the client (JSON body and/or an HTTP-only cookie).
//! 3. The client sends the token back via the `Authorization` header or the cookie:
//!    - `Authorization: Bearer <token>`
//!    - `Cookie: access_token=<token>`
//! 4. Any handler that declares an [`AuthUser`] parameter becomes a protected endpoint.
//!    Scope checks go through [`Identity::require_scope`].
//!
//! Tokens expire [`config::DEFAULT_TTL_MINUTES`] minutes after issuance unless configured
//! otherwise. There is no server-side session store, so there is nothing to revoke.
//!
//! ## 日本語
//!
//! trader の Web フロントエンド向けのステートレスなセッション認証ライブラリです。
//!
//! 主な構成要素：
//! - [`SessionAuthenticator`]: 注入された読み取り専用の [`UserTable`] で資格情報を検証し、
//!   署名付きの期限付き token（HS256 JWT）を発行・検証します。
//! - [`AuthConfig`]: 署名鍵と token の TTL。環境変数から読み込みます。
//! - [`AuthUser`]（`axum` feature）: リクエストを認可し、復元した [`Identity`] を handler に渡す extractor。
//!
//! ## 認証フロー
//!
//! 1. ログイン handler が [`SessionAuthenticator::authenticate`] にユーザー名とパスワードを渡す。
//! 2. token をクライアントに返す（JSON ボディおよび/または HTTP-only cookie）。
//! 3. クライアントは `Authorization` header または cookie で token を送り返す。
//! 4. [`AuthUser`] を引数に持つ handler は保護されたエンドポイントになる。

mod authenticator;
pub mod config;
mod models;
pub mod password;

#[cfg(feature = "axum")]
mod axum_support;
#[cfg(feature = "axum")]
pub mod routes;

pub use crate::authenticator::SessionAuthenticator;
pub use crate::config::AuthConfig;
pub use crate::models::{
    AccessToken, AuthError, ConfigError, Identity, SessionClaims, TOKEN_TYPE, UserRecord,
    UserTable, UserTableBuilder,
};

#[cfg(feature = "axum")]
pub use crate::axum_support::{AuthRejection, AuthUser};

/// Default cookie name used to carry the session token.
pub const TOKEN_COOKIE_NAME: &str = "access_token";

/// Order in which token sources are consulted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TokenSourcePriority {
    /// Headers first, then cookies.
    #[default]
    HeaderFirst,
    /// Cookies first, then headers.
    CookieFirst,
}

/// ## 日本語
///
/// token をどこから読むかの設定です。
///
/// router に `Extension(TokenSourceConfig { .. })` を追加すると、header/cookie の名前と
/// 優先順位を上書きできます。未設定の場合は [`TokenSourceConfig::default`] が使われます。
///
/// ## English
///
/// Where to look for the token.
///
/// Install `Extension(TokenSourceConfig { .. })` on the router to override header/cookie
/// names and their priority. Without it, [`TokenSourceConfig::default`] applies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenSourceConfig {
    pub priority: TokenSourcePriority,
    pub header_names: Vec<String>,
    pub cookie_names: Vec<String>,
}

impl Default for TokenSourceConfig {
    fn default() -> Self {
        Self {
            priority: TokenSourcePriority::HeaderFirst,
            header_names: vec!["Authorization".to_string()],
            cookie_names: vec![TOKEN_COOKIE_NAME.to_string()],
        }
    }
}

/// Strips an optional `Bearer ` prefix and surrounding whitespace.
///
/// Returns `None` when nothing is left, or when the value names another
/// authorization scheme (`Basic xyz`), so the next source gets a chance.
pub fn normalize_token(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let token = match raw.split_once(char::is_whitespace) {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        Some(_) => return None,
        None if raw.eq_ignore_ascii_case("bearer") => "",
        None => raw,
    };
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Resolves a token from headers and cookies following `cfg`.
///
/// `header` and `cookie` look up a value by name. The first usable value wins;
/// `Bearer ` prefixes are accepted in both sources, other schemes are skipped.
pub fn extract_token_with_config<H, C>(
    cfg: &TokenSourceConfig,
    header: H,
    cookie: C,
) -> Option<String>
where
    H: Fn(&str) -> Option<String>,
    C: Fn(&str) -> Option<String>,
{
    let from_headers = || {
        cfg.header_names
            .iter()
            .find_map(|name| header(name.as_str()).as_deref().and_then(normalize_token))
    };
    let from_cookies = || {
        cfg.cookie_names
            .iter()
            .find_map(|name| cookie(name.as_str()).as_deref().and_then(normalize_token))
    };

    match cfg.priority {
        TokenSourcePriority::HeaderFirst => from_headers().or_else(from_cookies),
        TokenSourcePriority::CookieFirst => from_cookies().or_else(from_headers),
    }
}
