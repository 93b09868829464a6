//! User accounts stored in the `user` collection.

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::{NearbyError, Result};
use crate::ingest::DEFAULT_STEP_TIMEOUT;
use crate::query::TermQuery;
use crate::record::{StoredDocument, USER_COLLECTION, UserAccount};
use crate::store::DocumentStore;
use crate::util::with_deadline;

const USERNAME_PATTERN: &str = "^[a-z0-9_]+$";

/// A signup request.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub age: i64,
    #[serde(default)]
    pub gender: String,
}

/// Salted SHA-256 of a password, hex encoded.
pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare two strings without stopping at the first difference.
fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a.bytes()
            .zip(b.bytes())
            .fold(0u8, |acc, (x, y)| acc | (x ^ y))
            == 0
}

/// Registers and checks accounts. The document id of an account is its
/// username.
#[derive(Debug, Clone)]
pub struct UserDirectory {
    documents: Arc<dyn DocumentStore>,
    username_pattern: Regex,
    step_timeout: Duration,
}

impl UserDirectory {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Result<Self> {
        let username_pattern = Regex::new(USERNAME_PATTERN)
            .map_err(|e| NearbyError::config(format!("Invalid username pattern: {e}")))?;

        Ok(UserDirectory {
            documents,
            username_pattern,
            step_timeout: DEFAULT_STEP_TIMEOUT,
        })
    }

    pub fn with_step_timeout(mut self, step_timeout: Duration) -> Self {
        self.step_timeout = step_timeout;
        self
    }

    /// Create an account. Returns `false` if the username is taken.
    pub async fn register(&self, user: NewUser) -> Result<bool> {
        if !self.username_pattern.is_match(&user.username) {
            return Err(NearbyError::invalid_input(format!(
                "invalid username '{}': use lowercase letters, digits and '_'",
                user.username
            )));
        }
        if user.password.is_empty() {
            return Err(NearbyError::invalid_input("password is empty"));
        }

        let salt = hex::encode(rand::random::<[u8; 16]>());
        let account = UserAccount {
            password_hash: hash_password(&salt, &user.password),
            salt,
            username: user.username,
            age: user.age,
            gender: user.gender,
        };

        // Keyed by username, so the store settles concurrent signups.
        let document = StoredDocument::User(account.clone()).to_json()?;
        let created = with_deadline(
            "document create",
            self.step_timeout,
            self.documents
                .create(USER_COLLECTION, &account.username, document),
        )
        .await?;
        if !created {
            tracing::debug!(username = %account.username, "username already taken");
            return Ok(false);
        }

        tracing::info!(username = %account.username, "user registered");
        Ok(true)
    }

    /// Whether `password` is right for `username`. Unknown users are simply
    /// `false`.
    pub async fn check_credentials(&self, username: &str, password: &str) -> Result<bool> {
        let Some(account) = self.lookup(username).await? else {
            return Ok(false);
        };
        let presented = hash_password(&account.salt, password);
        Ok(constant_time_eq(&presented, &account.password_hash))
    }

    /// Find an account by exact username.
    pub async fn lookup(&self, username: &str) -> Result<Option<UserAccount>> {
        if username.is_empty() {
            return Ok(None);
        }
        let query = TermQuery::new("username", username).into();
        let hits = with_deadline(
            "document search",
            self.step_timeout,
            self.documents.search(USER_COLLECTION, &query, 1),
        )
        .await?;

        Ok(hits.hits.into_iter().find_map(|hit| {
            StoredDocument::from_json(hit.source)
                .ok()
                .and_then(StoredDocument::into_user)
        }))
    }
}
