//! Models and error types for the trader-auth library.
//!
//! This module contains the user table, the token claims, the decoded
//! identity handed to handlers, and the error types used throughout the
//! library.

mod auth_error;
mod session_claims;
mod user_record;

pub use auth_error::{AuthError, ConfigError};
pub use session_claims::{AccessToken, Identity, SessionClaims, TOKEN_TYPE};
pub use user_record::{UserRecord, UserTable, UserTableBuilder};
