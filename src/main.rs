//! # trader-auth server
//!
//! Serves the login flow and the protected pages of the trader front end.
//!
//! ## Quick Start
//!
//! 1. **Start the server** (`SECRET_KEY` is required, `.env` is honoured):
//!    ```bash
//!    SECRET_KEY=change-me cargo run
//!    ```
//!
//! 2. **Login to get a token**:
//!    ```bash
//!    curl -X POST http://127.0.0.1:8000/api/token \
//!      -d "username=admin&password=admin"
//!    ```
//!
//! 3. **Access a protected endpoint**:
//!    ```bash
//!    curl -H "Authorization: Bearer <your-token>" \
//!      http://127.0.0.1:8000/api/me
//!    ```

use std::io;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use trader_auth::{AuthConfig, SessionAuthenticator, UserTable, routes};

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = AuthConfig::from_env().context("Failed to load configuration")?;
    let users = UserTable::seeded().context("Failed to seed user table")?;
    info!(
        users = users.len(),
        ttl_minutes = config.ttl().num_minutes(),
        secure_cookies = config.secure_cookies(),
        "user table ready"
    );

    let authenticator = SessionAuthenticator::new(&config, users);
    let app = routes::router(authenticator);

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;
    info!(addr = config.bind_addr(), "trader-auth listening");
    axum::serve(listener, app).await?;
    Ok(())
}
