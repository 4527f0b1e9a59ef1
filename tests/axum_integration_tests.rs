#![cfg(feature = "axum")]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use http_body_util::BodyExt;
use tower::ServiceExt;
use trader_auth::{
    AccessToken, AuthConfig, AuthUser, SessionAuthenticator, TOKEN_COOKIE_NAME, TokenSourceConfig,
    TokenSourcePriority, UserTable, routes,
};

type TestResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

fn authenticator() -> SessionAuthenticator {
    let users = UserTable::builder()
        .user("admin", "admin")
        .scope("admin")
        .user("trader", "hunter2")
        .scope("quotes")
        .user("ghost", "boo")
        .disabled(true)
        .build()
        .unwrap();
    SessionAuthenticator::new(&AuthConfig::new("axum-test-secret").unwrap(), users)
}

async fn protected(user: AuthUser) -> impl IntoResponse {
    format!("User: {}", user.username())
}

fn protected_app(authenticator: SessionAuthenticator) -> Router {
    Router::new()
        .route("/protected", get(protected))
        .layer(axum::extract::Extension(authenticator))
}

async fn body_string(resp: Response<Body>) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let body = resp
        .into_body()
        .collect()
        .await
        .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> { Box::new(e) })?
        .to_bytes();
    Ok(std::str::from_utf8(body.as_ref())?.to_string())
}

fn login_request(uri: &str, username: &str, password: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("username={}&password={}", username, password)))
        .unwrap()
}

// ============ AuthUser extractor ============

#[tokio::test]
async fn protected_route_without_token() -> TestResult {
    let app = protected_app(authenticator());

    let req = Request::builder().uri("/protected").body(Body::empty())?;

    let resp = app.oneshot(req).await.map_err(|e| match e {})?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.headers()
            .get(header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok()),
        Some("Bearer")
    );
    Ok(())
}

#[tokio::test]
async fn protected_route_with_invalid_token() -> TestResult {
    let app = protected_app(authenticator());

    let req = Request::builder()
        .uri("/protected")
        .header("Authorization", "Bearer invalid-token-xyz")
        .body(Body::empty())?;

    let resp = app.oneshot(req).await.map_err(|e| match e {})?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn protected_route_with_bearer_token() -> TestResult {
    let auth = authenticator();
    let token = auth.authenticate("trader", "hunter2")?;
    let app = protected_app(auth);

    let req = Request::builder()
        .uri("/protected")
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())?;

    let resp = app.oneshot(req).await.map_err(|e| match e {})?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await?, "User: trader");
    Ok(())
}

#[tokio::test]
async fn protected_route_with_cookie_token() -> TestResult {
    let auth = authenticator();
    let token = auth.authenticate("trader", "hunter2")?;
    let app = protected_app(auth);

    let req = Request::builder()
        .uri("/protected")
        .header(header::COOKIE, format!("theme=dark; {}={}", TOKEN_COOKIE_NAME, token))
        .body(Body::empty())?;

    let resp = app.oneshot(req).await.map_err(|e| match e {})?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await?, "User: trader");
    Ok(())
}

#[tokio::test]
async fn authorization_header_takes_precedence_over_cookie() -> TestResult {
    let auth = authenticator();
    let token = auth.authenticate("trader", "hunter2")?;
    let app = protected_app(auth);

    let req = Request::builder()
        .uri("/protected")
        .header("Authorization", "invalid-token-xyz")
        .header(header::COOKIE, format!("{}={}", TOKEN_COOKIE_NAME, token))
        .body(Body::empty())?;

    let resp = app.oneshot(req).await.map_err(|e| match e {})?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn token_source_config_cookie_first_can_override_header() -> TestResult {
    let auth = authenticator();
    let token = auth.authenticate("trader", "hunter2")?;
    let cfg = TokenSourceConfig {
        priority: TokenSourcePriority::CookieFirst,
        header_names: vec!["Authorization".to_string()],
        cookie_names: vec![TOKEN_COOKIE_NAME.to_string()],
    };

    let app = Router::new()
        .route("/protected", get(protected))
        .layer(axum::extract::Extension(cfg))
        .layer(axum::extract::Extension(auth));

    let req = Request::builder()
        .uri("/protected")
        .header("Authorization", "invalid-token-xyz")
        .header(header::COOKIE, format!("{}={}", TOKEN_COOKIE_NAME, token))
        .body(Body::empty())?;

    let resp = app.oneshot(req).await.map_err(|e| match e {})?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await?, "User: trader");
    Ok(())
}

#[tokio::test]
async fn cookie_value_with_bearer_prefix_is_accepted() -> TestResult {
    let auth = authenticator();
    let token = auth.authenticate("trader", "hunter2")?;
    let app = protected_app(auth);

    let req = Request::builder()
        .uri("/protected")
        .header(
            header::COOKIE,
            format!("{}=\"Bearer {}\"", TOKEN_COOKIE_NAME, token),
        )
        .body(Body::empty())?;

    let resp = app.oneshot(req).await.map_err(|e| match e {})?;
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn missing_authenticator_returns_500() -> TestResult {
    let app = Router::new().route("/protected", get(protected));

    let req = Request::builder()
        .uri("/protected")
        .header("Authorization", "any")
        .body(Body::empty())?;

    let resp = app.oneshot(req).await.map_err(|e| match e {})?;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    Ok(())
}

// ============ application routes ============

#[tokio::test]
async fn login_form_is_served() -> TestResult {
    let app = routes::router(authenticator());

    let req = Request::builder().uri("/login").body(Body::empty())?;
    let resp = app.oneshot(req).await.map_err(|e| match e {})?;

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_string(resp).await?.contains("action=\"/token\""));
    Ok(())
}

#[tokio::test]
async fn login_sets_http_only_cookie_and_redirects_home() -> TestResult {
    let app = routes::router(authenticator());

    let resp = app
        .oneshot(login_request("/token", "admin", "admin"))
        .await
        .map_err(|e| match e {})?;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        resp.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()),
        Some("/home")
    );

    let cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .ok_or("missing Set-Cookie")?;
    assert!(cookie.starts_with(&format!("{}=", TOKEN_COOKIE_NAME)));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Secure"));
    assert!(cookie.contains("Max-Age=1800"));
    Ok(())
}

#[tokio::test]
async fn secure_attribute_can_be_turned_off() -> TestResult {
    let users = UserTable::builder().user("admin", "admin").build()?;
    let config = AuthConfig::new("axum-test-secret")?.with_secure_cookies(false);
    let app = routes::router(SessionAuthenticator::new(&config, users));

    let resp = app
        .oneshot(login_request("/token", "admin", "admin"))
        .await
        .map_err(|e| match e {})?;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .ok_or("missing Set-Cookie")?;
    assert!(cookie.contains("HttpOnly"));
    assert!(!cookie.contains("Secure"));
    Ok(())
}

#[tokio::test]
async fn basic_authorization_header_falls_back_to_cookie() -> TestResult {
    let auth = authenticator();
    let token = auth.authenticate("admin", "admin")?;
    let app = routes::router(auth);

    let req = Request::builder()
        .uri("/api/me")
        .header("Authorization", "Basic dXNlcjpwYXNz")
        .header(header::COOKIE, format!("{}={}", TOKEN_COOKIE_NAME, token))
        .body(Body::empty())?;
    let resp = app.oneshot(req).await.map_err(|e| match e {})?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_string(resp).await?.contains("\"admin\""));
    Ok(())
}

#[tokio::test]
async fn login_with_bad_credentials_is_401() -> TestResult {
    for (username, password) in [("admin", "nope"), ("nobody", "admin")] {
        let app = routes::router(authenticator());
        let resp = app
            .oneshot(login_request("/token", username, password))
            .await
            .map_err(|e| match e {})?;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(body_string(resp).await?, "Incorrect username or password");
    }
    Ok(())
}

#[tokio::test]
async fn login_for_disabled_account_is_403() -> TestResult {
    let app = routes::router(authenticator());
    let resp = app
        .oneshot(login_request("/token", "ghost", "boo"))
        .await
        .map_err(|e| match e {})?;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn api_token_returns_bearer_json() -> TestResult {
    let auth = authenticator();
    let app = routes::router(auth.clone());

    let resp = app
        .oneshot(login_request("/api/token", "trader", "hunter2"))
        .await
        .map_err(|e| match e {})?;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: AccessToken = serde_json::from_str(&body_string(resp).await?)?;
    assert_eq!(body.token_type, "bearer");

    let identity = auth.authorize(&body.access_token, Some("quotes"))?;
    assert_eq!(identity.username, "trader");
    Ok(())
}

#[tokio::test]
async fn home_redirects_to_login_without_session() -> TestResult {
    let app = routes::router(authenticator());

    let req = Request::builder().uri("/home").body(Body::empty())?;
    let resp = app.oneshot(req).await.map_err(|e| match e {})?;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        resp.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()),
        Some("/login")
    );
    Ok(())
}

#[tokio::test]
async fn home_greets_user_with_cookie() -> TestResult {
    let auth = authenticator();
    let token = auth.authenticate("trader", "hunter2")?;
    let app = routes::router(auth);

    let req = Request::builder()
        .uri("/home")
        .header(header::COOKIE, format!("{}={}", TOKEN_COOKIE_NAME, token))
        .body(Body::empty())?;
    let resp = app.oneshot(req).await.map_err(|e| match e {})?;

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_string(resp).await?.contains("Welcome, trader"));
    Ok(())
}

#[tokio::test]
async fn me_returns_identity_json() -> TestResult {
    let auth = authenticator();
    let token = auth.authenticate("admin", "admin")?;
    let app = routes::router(auth);

    let req = Request::builder()
        .uri("/api/me")
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())?;
    let resp = app.oneshot(req).await.map_err(|e| match e {})?;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = serde_json::from_str(&body_string(resp).await?)?;
    assert_eq!(body["username"], "admin");
    assert_eq!(body["scopes"], serde_json::json!(["admin"]));
    Ok(())
}

#[tokio::test]
async fn admin_page_requires_admin_scope() -> TestResult {
    let auth = authenticator();
    let admin_token = auth.authenticate("admin", "admin")?;
    let trader_token = auth.authenticate("trader", "hunter2")?;

    let app = routes::router(auth.clone());
    let req = Request::builder()
        .uri("/admin")
        .header("Authorization", format!("Bearer {}", admin_token))
        .body(Body::empty())?;
    let resp = app.oneshot(req).await.map_err(|e| match e {})?;
    assert_eq!(resp.status(), StatusCode::OK);

    let app = routes::router(auth);
    let req = Request::builder()
        .uri("/admin")
        .header("Authorization", format!("Bearer {}", trader_token))
        .body(Body::empty())?;
    let resp = app.oneshot(req).await.map_err(|e| match e {})?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn expired_session_is_401() -> TestResult {
    let auth = authenticator();
    let issued_at = chrono::Utc::now() - chrono::Duration::hours(2);
    let admin = UserTable::seeded()?.get("admin").cloned().ok_or("no admin")?;
    let token = auth.issue_token_at(&admin, issued_at)?;
    let app = routes::router(auth);

    let req = Request::builder()
        .uri("/api/me")
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())?;
    let resp = app.oneshot(req).await.map_err(|e| match e {})?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_string(resp).await?, "Token expired");
    Ok(())
}

#[tokio::test]
async fn logout_clears_cookie() -> TestResult {
    let app = routes::router(authenticator());

    let req = Request::builder()
        .method("POST")
        .uri("/logout")
        .body(Body::empty())?;
    let resp = app.oneshot(req).await.map_err(|e| match e {})?;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .ok_or("missing Set-Cookie")?;
    assert!(cookie.contains("Max-Age=0"));
    Ok(())
}
