//! Persisted data model: users and sessions.

use chrono::{DateTime, Utc};
use data_encoding::BASE64;
use rdesk_common::UserInfo;
use serde::{Deserialize, Serialize};

fn serialize_hash<S: serde::Serializer>(hash: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&BASE64.encode(hash))
}

fn deserialize_hash<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
    let s = String::deserialize(d)?;
    BASE64.decode(s.as_bytes()).map_err(serde::de::Error::custom)
}

/// A registered user. Usernames and emails are globally unique across the
/// store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub email: String,
    #[serde(serialize_with = "serialize_hash", deserialize_with = "deserialize_hash")]
    pub password_hash: Vec<u8>,
    pub fullname: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl User {
    pub fn to_public_info(&self) -> UserInfo {
        UserInfo {
            username: self.username.clone(),
            email: self.email.clone(),
            fullname: self.fullname.clone(),
            created_at: self.created_at.to_rfc3339(),
            last_login: self.last_login.map(|t| t.to_rfc3339()),
        }
    }
}

/// A session, keyed by its token in the enclosing store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
}

/// The whole-file snapshot persisted to disk.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub users: std::collections::HashMap<String, User>,
    pub sessions: std::collections::HashMap<String, Session>,
}
