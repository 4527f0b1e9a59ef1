//! HTTP routes for the login flow and the protected pages.
//!
//! - `GET /`, `GET /login`: login form
//! - `POST /token`: form login, sets the session cookie and redirects to `/home`
//! - `POST /api/token`: form login, returns [`AccessToken`] JSON (and the cookie)
//! - `GET /home`: protected page; redirects to `/login` without a valid session
//! - `GET /api/me`: protected; the caller's [`Identity`](crate::Identity) as JSON
//! - `GET /admin`: protected, requires the `admin` scope
//! - `POST /logout`: clears the session cookie

use crate::{
    AccessToken, AuthError, AuthRejection, AuthUser, SessionAuthenticator, TOKEN_COOKIE_NAME,
};
use axum::{
    Form, Json, Router,
    extract::Extension,
    http::{HeaderValue, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use cookie::{Cookie, SameSite};
use serde::Deserialize;
use tracing::error;

/// Scope required by `GET /admin`.
pub const ADMIN_SCOPE: &str = "admin";

const LOGIN_PAGE: &str = r#"<!doctype html>
<html>
<head><title>Login</title></head>
<body>
<h1>Sign in</h1>
<form method="post" action="/token">
<label>Username <input name="username" autocomplete="username"></label>
<label>Password <input name="password" type="password" autocomplete="current-password"></label>
<button type="submit">Sign in</button>
</form>
</body>
</html>
"#;

/// Form-encoded credential submission.
#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Builds the application router with `authenticator` installed as an extension.
pub fn router(authenticator: SessionAuthenticator) -> Router {
    Router::new()
        .route("/", get(login_page))
        .route("/login", get(login_page))
        .route("/token", post(login))
        .route("/api/token", post(api_login))
        .route("/home", get(home))
        .route("/api/me", get(me))
        .route("/admin", get(admin))
        .route("/logout", post(logout))
        .layer(Extension(authenticator))
}

async fn login_page() -> Html<&'static str> {
    Html(LOGIN_PAGE)
}

async fn login(
    Extension(authenticator): Extension<SessionAuthenticator>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AuthError> {
    let token = authenticate_blocking(&authenticator, form).await?;
    let mut resp = Redirect::to("/home").into_response();
    set_session_cookie(&mut resp, &authenticator, token)?;
    Ok(resp)
}

async fn api_login(
    Extension(authenticator): Extension<SessionAuthenticator>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AuthError> {
    let token = authenticate_blocking(&authenticator, form).await?;
    let mut resp = Json(AccessToken::bearer(token.clone())).into_response();
    set_session_cookie(&mut resp, &authenticator, token)?;
    Ok(resp)
}

async fn home(user: Result<AuthUser, AuthRejection>) -> Response {
    match user {
        Ok(user) => Html(format!(
            "<!doctype html>\n<html><body><h1>Welcome, {}</h1>\
             <p>Session expires in {} minutes.</p>\
             <form method=\"post\" action=\"/logout\"><button>Sign out</button></form>\
             </body></html>\n",
            escape_html(user.username()),
            user.identity.minutes_until_expiry()
        ))
        .into_response(),
        Err(AuthRejection::AuthenticatorMissing) => {
            AuthRejection::AuthenticatorMissing.into_response()
        }
        Err(_) => Redirect::to("/login").into_response(),
    }
}

async fn me(user: AuthUser) -> Json<crate::Identity> {
    Json(user.identity)
}

async fn admin(user: AuthUser) -> Result<Html<String>, AuthError> {
    user.require_scope(ADMIN_SCOPE)?;
    Ok(Html(format!(
        "<!doctype html>\n<html><body><h1>Administration</h1><p>Signed in as {}</p></body></html>\n",
        escape_html(user.username())
    )))
}

async fn logout(
    Extension(authenticator): Extension<SessionAuthenticator>,
) -> Result<Response, AuthError> {
    let cookie = Cookie::build((TOKEN_COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .secure(authenticator.secure_cookies())
        .same_site(SameSite::Lax)
        .max_age(cookie::time::Duration::ZERO)
        .build();
    let mut resp = Redirect::to("/login").into_response();
    insert_cookie(&mut resp, &cookie)?;
    Ok(resp)
}

/// Runs the (slow) password check off the async worker threads.
async fn authenticate_blocking(
    authenticator: &SessionAuthenticator,
    form: LoginForm,
) -> Result<String, AuthError> {
    let authenticator = authenticator.clone();
    tokio::task::spawn_blocking(move || authenticator.authenticate(&form.username, &form.password))
        .await
        .map_err(|e| {
            error!(error = %e, "authentication task failed");
            AuthError::Internal(format!("Authentication task failed: {}", e))
        })?
}

fn set_session_cookie(
    resp: &mut Response,
    authenticator: &SessionAuthenticator,
    token: String,
) -> Result<(), AuthError> {
    let max_age = cookie::time::Duration::seconds(authenticator.ttl().num_seconds());
    let cookie = Cookie::build((TOKEN_COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .secure(authenticator.secure_cookies())
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build();
    insert_cookie(resp, &cookie)
}

fn insert_cookie(resp: &mut Response, cookie: &Cookie<'_>) -> Result<(), AuthError> {
    let value = HeaderValue::from_str(cookie.to_string().as_str())
        .map_err(|_| AuthError::Internal("Invalid cookie".to_string()))?;
    resp.headers_mut().append(header::SET_COOKIE, value);
    Ok(())
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
