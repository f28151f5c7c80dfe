//! The user store: persisted users and sessions, password hashing, and
//! session lifecycle.
//!
//! `UserStore` itself is not internally synchronized — it is the single
//! piece of mutable shared state in the process, and callers wrap it in
//! `Arc<tokio::sync::RwLock<UserStore>>` so reads (token validation from
//! the screen/input channels) and writes (auth service mutations)
//! serialize through one exclusion region.

pub mod model;
mod persistence;

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{Duration, Utc};
use data_encoding::HEXLOWER;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::hash;
use model::{Session, StoreSnapshot, User};

pub use model::User as StoreUser;

pub struct UserStore {
    db_path: PathBuf,
    session_lifetime: Duration,
    users: HashMap<String, User>,
    sessions: HashMap<String, Session>,
}

impl UserStore {
    /// Loads the snapshot at `db_path` (or starts empty if it doesn't
    /// exist), pruning any sessions that already expired while the process
    /// was down.
    pub fn open(db_path: PathBuf, session_lifetime: std::time::Duration) -> anyhow::Result<Self> {
        let snapshot = persistence::load(&db_path)?;
        let mut store = Self {
            db_path,
            session_lifetime: Duration::from_std(session_lifetime)
                .unwrap_or_else(|_| Duration::hours(24)),
            users: snapshot.users,
            sessions: snapshot.sessions,
        };
        let pruned = store.prune_expired_sessions();
        info!(
            users = store.users.len(),
            sessions = store.sessions.len(),
            pruned,
            "user store loaded"
        );
        Ok(store)
    }

    fn prune_expired_sessions(&mut self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.expires_at >= now);
        before - self.sessions.len()
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        self.prune_expired_sessions();
        let snapshot = StoreSnapshot {
            users: self.users.clone(),
            sessions: self.sessions.clone(),
        };
        persistence::save(&self.db_path, &snapshot).map_err(StoreError::Io)
    }

    /// Registers a new user. Fails without mutating the store if the
    /// username or email is already taken.
    pub fn register_user(
        &mut self,
        username: &str,
        password: &str,
        email: &str,
        fullname: Option<String>,
    ) -> Result<(), StoreError> {
        if self.users.contains_key(username) {
            return Err(StoreError::UsernameExists);
        }
        if self.users.values().any(|u| u.email == email) {
            return Err(StoreError::EmailExists);
        }

        let password_hash = hash::hash_password(password).to_vec();
        let user = User {
            username: username.to_owned(),
            email: email.to_owned(),
            password_hash,
            fullname,
            created_at: Utc::now(),
            last_login: None,
            is_active: true,
        };
        self.users.insert(username.to_owned(), user);
        self.persist()?;
        info!(username, "registered new user");
        Ok(())
    }

    /// Authenticates a user and creates a new session on success. Unknown
    /// username and bad password both fail with the same opaque message to
    /// prevent enumeration.
    pub fn authenticate(&mut self, username: &str, password: &str) -> Result<String, StoreError> {
        let user = self
            .users
            .get(username)
            .ok_or(StoreError::InvalidCredentials)?;

        if !user.is_active {
            return Err(StoreError::AccountDeactivated);
        }
        if !hash::verify_password(&user.password_hash, password) {
            return Err(StoreError::InvalidCredentials);
        }

        // Updated before session creation so a failed session write never
        // loses the login-attempt timestamp.
        if let Some(user) = self.users.get_mut(username) {
            user.last_login = Some(Utc::now());
        }

        let token = Self::generate_token();
        let now = Utc::now();
        self.sessions.insert(
            token.clone(),
            Session {
                username: username.to_owned(),
                created_at: now,
                expires_at: now + self.session_lifetime,
                is_active: true,
            },
        );

        self.persist()?;
        info!(username, "authenticated");
        Ok(token)
    }

    fn generate_token() -> String {
        let mut bytes = [0u8; 64];
        rand::thread_rng().fill_bytes(&mut bytes);
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        HEXLOWER.encode(&hasher.finalize())
    }

    /// Validates a session token. Validating an expired session is itself
    /// a side effect: it flips `is_active` to false and persists, so it
    /// can never be resurrected.
    pub fn validate_session(&mut self, token: &str) -> Result<User, StoreError> {
        let now = Utc::now();

        let (username, expired) = {
            let session = self
                .sessions
                .get(token)
                .ok_or(StoreError::InvalidToken)?;
            if !session.is_active {
                return Err(StoreError::SessionInactive);
            }
            (session.username.clone(), session.expires_at < now)
        };

        if expired {
            if let Some(session) = self.sessions.get_mut(token) {
                session.is_active = false;
            }
            self.persist()?;
            debug!(token = %short(token), "session expired on validation");
            return Err(StoreError::SessionExpired);
        }

        self.users
            .get(&username)
            .cloned()
            .ok_or(StoreError::UserNotFound)
    }

    /// Invalidates (logs out) a session. Idempotent at the wire level: a
    /// second call on the same token returns `SessionNotFound`, never a
    /// second success — the first call leaves the token in the map marked
    /// inactive, and a present-but-inactive session is treated as already
    /// logged out.
    pub fn invalidate_session(&mut self, token: &str) -> Result<(), StoreError> {
        let session = self
            .sessions
            .get_mut(token)
            .ok_or(StoreError::SessionNotFound)?;
        if !session.is_active {
            return Err(StoreError::SessionNotFound);
        }
        session.is_active = false;
        self.persist()?;
        Ok(())
    }

    pub fn get_user_info(&self, username: &str) -> Option<rdesk_common::UserInfo> {
        self.users.get(username).map(User::to_public_info)
    }

    #[cfg(test)]
    pub fn force_expire(&mut self, token: &str) {
        if let Some(session) = self.sessions.get_mut(token) {
            session.expires_at = Utc::now() - Duration::seconds(1);
        }
    }
}

fn short(token: &str) -> &str {
    &token[..token.len().min(8)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    fn new_store() -> UserStore {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        // Leak the tempdir so the file stays alive for the test's duration.
        std::mem::forget(dir);
        UserStore::open(path, StdDuration::from_secs(86400)).unwrap()
    }

    #[test]
    fn register_then_login_then_validate() {
        let mut store = new_store();
        store
            .register_user("alice", "pw", "alice@example.com", None)
            .unwrap();
        let token = store.authenticate("alice", "pw").unwrap();
        let user = store.validate_session(&token).unwrap();
        assert_eq!(user.username, "alice");
    }

    #[test]
    fn duplicate_email_is_rejected_without_mutating_store() {
        let mut store = new_store();
        store
            .register_user("alice", "pw", "alice@example.com", None)
            .unwrap();
        let err = store
            .register_user("bob", "pw", "alice@example.com", None)
            .unwrap_err();
        assert!(matches!(err, StoreError::EmailExists));
        assert_eq!(store.users.len(), 1);
    }

    #[test]
    fn unknown_user_and_bad_password_share_one_message() {
        let mut store = new_store();
        store
            .register_user("alice", "pw", "alice@example.com", None)
            .unwrap();
        let unknown = store.authenticate("nobody", "pw").unwrap_err();
        let bad_pw = store.authenticate("alice", "wrong").unwrap_err();
        assert_eq!(unknown.to_string(), bad_pw.to_string());
    }

    #[test]
    fn expired_session_never_resurrects() {
        let mut store = new_store();
        store
            .register_user("alice", "pw", "alice@example.com", None)
            .unwrap();
        let token = store.authenticate("alice", "pw").unwrap();
        store.force_expire(&token);

        assert!(matches!(
            store.validate_session(&token),
            Err(StoreError::SessionExpired)
        ));
        assert!(matches!(
            store.validate_session(&token),
            Err(StoreError::SessionInactive)
        ));
    }

    #[test]
    fn logout_is_idempotent_not_doubly_successful() {
        let mut store = new_store();
        store
            .register_user("alice", "pw", "alice@example.com", None)
            .unwrap();
        let token = store.authenticate("alice", "pw").unwrap();

        assert!(store.invalidate_session(&token).is_ok());
        assert!(matches!(
            store.invalidate_session(&token),
            Err(StoreError::SessionNotFound)
        ));
    }

    #[test]
    fn inactive_account_cannot_authenticate() {
        let mut store = new_store();
        store
            .register_user("alice", "pw", "alice@example.com", None)
            .unwrap();
        store.users.get_mut("alice").unwrap().is_active = false;
        assert!(matches!(
            store.authenticate("alice", "pw"),
            Err(StoreError::AccountDeactivated)
        ));
    }
}
