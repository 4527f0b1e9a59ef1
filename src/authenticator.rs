use crate::config::AuthConfig;
use crate::models::{AuthError, Identity, SessionClaims, UserRecord, UserTable};
use crate::password;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// ## 日本語
///
/// 資格情報を検証し、署名付きの期限付きセッション token を発行・検証するオーセンティケータです。
///
/// 状態はすべて構築時に確定し、以後は読み取り専用です（署名鍵・TTL・ユーザーテーブル）。
/// 内部は `Arc` で共有されるため、`Clone` は同じ設定へのハンドルを増やすだけで、
/// 複数リクエストからロックなしで同時に利用できます。
///
/// token は HS256 の JWT で、サーバ側には何も保存しません（ステートレスな bearer token）。
///
/// ## English
///
/// Validates credentials and issues/verifies signed, time-bound session tokens.
///
/// All state is fixed at construction and read-only afterwards (signing key, TTL,
/// user table). It lives behind an `Arc`, so `Clone` only creates another handle
/// and concurrent requests can share it without locking.
///
/// Tokens are HS256 JWTs; nothing is stored server-side (stateless bearer tokens).
#[derive(Clone)]
pub struct SessionAuthenticator {
    inner: Arc<Inner>,
}

struct Inner {
    users: UserTable,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
    secure_cookies: bool,
}

impl SessionAuthenticator {
    /// ## 日本語
    ///
    /// 設定とユーザーテーブルからオーセンティケータを作成します。
    ///
    /// ## English
    ///
    /// Creates an authenticator from a validated config and a frozen user table.
    pub fn new(config: &AuthConfig, users: UserTable) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is compared against an explicit clock in `authorize_at`.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            inner: Arc::new(Inner {
                users,
                encoding_key: EncodingKey::from_secret(config.secret()),
                decoding_key: DecodingKey::from_secret(config.secret()),
                validation,
                ttl: config.ttl(),
                secure_cookies: config.secure_cookies(),
            }),
        }
    }

    /// Lifetime given to every issued token.
    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Whether session cookies should be marked `Secure`.
    pub fn secure_cookies(&self) -> bool {
        self.inner.secure_cookies
    }

    /// ## 日本語
    ///
    /// ユーザー名とパスワードを検証し、成功すれば新しいセッション token を返します。
    ///
    /// - ユーザーが存在しない、またはパスワードが一致しない場合は [`AuthError::InvalidCredentials`]
    ///   （両者は区別しません）
    /// - パスワードは正しいが無効化されたアカウントの場合は [`AuthError::AccountDisabled`]
    ///
    /// パスワード検証は意図的に低速（Argon2id）です。async ランタイム上では
    /// blocking スレッドで呼び出してください。
    ///
    /// ## English
    ///
    /// Verifies a username/password pair and returns a fresh session token.
    ///
    /// - [`AuthError::InvalidCredentials`] for an unknown user or a wrong password
    ///   (the two are indistinguishable)
    /// - [`AuthError::AccountDisabled`] if the password is right but the account is disabled
    ///
    /// Password verification is deliberately slow (Argon2id); call it from a
    /// blocking thread when running on an async runtime.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<String, AuthError> {
        self.authenticate_at(username, password, Utc::now())
    }

    /// Same as [`authenticate`](Self::authenticate), with the token issued at `now`.
    pub fn authenticate_at(
        &self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let Some(user) = self.inner.users.get(username) else {
            warn!(username, "login rejected: unknown user");
            return Err(AuthError::InvalidCredentials);
        };

        if !password::verify_password(password, &user.hashed_password)? {
            warn!(username, "login rejected: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        if user.disabled {
            warn!(username, "login rejected: account disabled");
            return Err(AuthError::AccountDisabled);
        }

        let token = self.issue_token_at(user, now)?;
        info!(username, scopes = ?user.scopes, "session token issued");
        Ok(token)
    }

    /// ## 日本語
    ///
    /// token の署名と有効期限を検証し、必要であれば scope を確認します。
    ///
    /// 成功時は token に埋め込まれた identity を返します。ユーザーテーブルは参照しません。
    ///
    /// ## English
    ///
    /// Verifies a token's signature and expiry and, when `required_scope` is
    /// given, that the scope was granted.
    ///
    /// - [`AuthError::InvalidToken`] for a bad signature or a malformed token
    /// - [`AuthError::TokenExpired`] once the current time is past the embedded expiry
    /// - [`AuthError::InsufficientScope`] if the scope is missing
    ///
    /// On success returns the identity carried by the token. The user table is not consulted.
    pub fn authorize(
        &self,
        token: &str,
        required_scope: Option<&str>,
    ) -> Result<Identity, AuthError> {
        self.authorize_at(token, required_scope, Utc::now())
    }

    /// Same as [`authorize`](Self::authorize), judging expiry against `now`.
    pub fn authorize_at(
        &self,
        token: &str,
        required_scope: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Identity, AuthError> {
        let claims = jsonwebtoken::decode::<SessionClaims>(
            token,
            &self.inner.decoding_key,
            &self.inner.validation,
        )
        .map_err(|e| {
            debug!(error = ?e.kind(), "token rejected");
            AuthError::InvalidToken
        })?
        .claims;

        if now.timestamp() > claims.exp {
            debug!(subject = %claims.sub, "token rejected: expired");
            return Err(AuthError::TokenExpired);
        }

        let identity = Identity::try_from(claims)?;
        if let Some(scope) = required_scope {
            identity.require_scope(scope).inspect_err(|_| {
                debug!(subject = %identity.username, scope, "token rejected: missing scope");
            })?;
        }
        Ok(identity)
    }

    /// ## 日本語
    ///
    /// `user` に対して `issued_at` 時点で発行された token を署名します。
    ///
    /// パスワードも `disabled` フラグも確認しません。無効化されたユーザーに発行するかどうかは
    /// 呼び出し側の判断です。通常のログインでは [`authenticate`](Self::authenticate) を使ってください。
    ///
    /// ## English
    ///
    /// Signs a token for `user` as if issued at `issued_at`, expiring one TTL later.
    ///
    /// Neither the password nor the `disabled` flag is checked: issuing for a
    /// disabled record is the caller's decision. Logins go through
    /// [`authenticate`](Self::authenticate), which only reaches this after both checks pass.
    ///
    /// Fails with [`AuthError::Internal`] if the expiry is not representable.
    pub fn issue_token_at(
        &self,
        user: &UserRecord,
        issued_at: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let expires_at = issued_at
            .checked_add_signed(self.inner.ttl)
            .ok_or_else(|| AuthError::Internal("Token expiry out of range".to_string()))?;
        let claims = SessionClaims {
            sub: user.username.clone(),
            scopes: user.scopes.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.inner.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Token signing failed: {}", e)))
    }
}
