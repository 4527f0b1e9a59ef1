//! User records and the read-only user table.
//!
//! ## 日本語
//!
//! ユーザーレコードと読み取り専用のユーザーテーブルです。
//! テーブルは起動時に一度だけ構築され、プロセス実行中は変更されません。

use crate::models::AuthError;
use crate::password;
use std::collections::{BTreeSet, HashMap};

/// A user known to the authenticator.
///
/// Only the salted hash of the password is kept; the plaintext never outlives
/// [`UserTableBuilder::build`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    /// Argon2id PHC string.
    pub hashed_password: String,
    pub disabled: bool,
    pub scopes: BTreeSet<String>,
}

impl UserRecord {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }
}

/// Immutable `username -> UserRecord` map.
///
/// The table is constructed once and handed to [`crate::SessionAuthenticator::new`];
/// nothing can add or remove users afterwards.
///
/// ## 日本語
///
/// `username -> UserRecord` の不変マップです。
///
/// 一度だけ構築して [`crate::SessionAuthenticator::new`] に渡します。以後ユーザーの追加・削除はできません。
#[derive(Clone, Debug, Default)]
pub struct UserTable {
    users: HashMap<String, UserRecord>,
}

impl UserTable {
    pub fn builder() -> UserTableBuilder {
        UserTableBuilder::default()
    }

    /// The default table: a single enabled `admin` user (password `admin`)
    /// holding the `admin` scope.
    ///
    /// Hashing is deliberately slow, so call this once at startup.
    pub fn seeded() -> Result<Self, AuthError> {
        Self::builder()
            .user("admin", "admin")
            .full_name("Administrator")
            .email("admin@example.com")
            .scope("admin")
            .build()
    }

    /// Builds a table from records whose passwords are already hashed.
    ///
    /// Later records with the same username replace earlier ones.
    pub fn from_records(records: impl IntoIterator<Item = UserRecord>) -> Self {
        let users = records
            .into_iter()
            .map(|record| (record.username.clone(), record))
            .collect();
        Self { users }
    }

    pub fn get(&self, username: &str) -> Option<&UserRecord> {
        self.users.get(username)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

struct PendingUser {
    username: String,
    password: String,
    full_name: Option<String>,
    email: Option<String>,
    disabled: bool,
    scopes: BTreeSet<String>,
}

/// Collects seed users with plaintext passwords and hashes them on [`build`](Self::build).
///
/// Attribute setters (`full_name`, `email`, `scope`, `disabled`, ...) apply to the
/// most recently added user and are ignored if no user was added yet.
#[derive(Default)]
pub struct UserTableBuilder {
    pending: Vec<PendingUser>,
}

impl UserTableBuilder {
    pub fn user(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.pending.push(PendingUser {
            username: username.into(),
            password: password.into(),
            full_name: None,
            email: None,
            disabled: false,
            scopes: BTreeSet::new(),
        });
        self
    }

    pub fn full_name(mut self, full_name: impl Into<String>) -> Self {
        if let Some(last) = self.pending.last_mut() {
            last.full_name = Some(full_name.into());
        }
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        if let Some(last) = self.pending.last_mut() {
            last.email = Some(email.into());
        }
        self
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        if let Some(last) = self.pending.last_mut() {
            last.scopes.insert(scope.into());
        }
        self
    }

    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(last) = self.pending.last_mut() {
            last.scopes.extend(scopes.into_iter().map(Into::into));
        }
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        if let Some(last) = self.pending.last_mut() {
            last.disabled = disabled;
        }
        self
    }

    /// Hashes every pending password and freezes the table.
    pub fn build(self) -> Result<UserTable, AuthError> {
        let mut records = Vec::with_capacity(self.pending.len());
        for pending in self.pending {
            let hashed_password = password::hash_password(&pending.password)?;
            records.push(UserRecord {
                username: pending.username,
                full_name: pending.full_name,
                email: pending.email,
                hashed_password,
                disabled: pending.disabled,
                scopes: pending.scopes,
            });
        }
        Ok(UserTable::from_records(records))
    }
}
