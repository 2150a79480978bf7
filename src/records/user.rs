//! The user account record.
//!
//! Three natural keys, probed by `find_by_any` in priority order: email,
//! then username, then phone. Role and status are bucket attributes; both
//! tolerate legacy values by falling back to a safe default instead of
//! failing, so an old data directory keeps loading after an enum gains or
//! loses variants.

use crate::codec;
use crate::error::Result;
use crate::model::Record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const MIN_PHONE_DIGITS: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    #[default]
    Agent,
}

impl Role {
    pub fn name(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Agent => "agent",
        }
    }

    /// Unrecognized values fall back to the least-privileged role.
    pub fn from_raw(raw: &str) -> Role {
        match raw.trim().to_lowercase().as_str() {
            "admin" => Role::Admin,
            "manager" => Role::Manager,
            _ => Role::Agent,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    #[default]
    Active,
    Suspended,
}

impl UserStatus {
    pub fn name(self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Suspended => "suspended",
        }
    }

    pub fn from_raw(raw: &str) -> UserStatus {
        match raw.trim().to_lowercase().as_str() {
            "suspended" => UserStatus::Suspended,
            _ => UserStatus::Active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    /// Lowercase; the username natural key.
    pub username: String,
    /// Lowercase; the email natural key.
    pub email: String,
    /// Digits only, or empty; the optional phone natural key.
    #[serde(default)]
    pub phone: String,
    /// Caller-hashed credential; the store never hashes or inspects it.
    pub password_hash: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub status: UserStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for User {
    const KIND: &'static str = "users";
    const KEYS: &'static [&'static str] = &["email", "username", "phone"];
    const BUCKETS: &'static [&'static str] = &["role", "status"];

    fn id(&self) -> u64 {
        self.id
    }

    fn assign_id(&mut self, id: u64) {
        self.id = id;
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    fn stamp_created(&mut self, at: DateTime<Utc>) {
        self.created_at = Some(at);
    }

    fn stamp_updated(&mut self, at: DateTime<Utc>) {
        self.updated_at = Some(at);
    }

    fn natural_keys(&self) -> BTreeMap<&'static str, String> {
        let mut keys = BTreeMap::new();
        if !self.email.is_empty() {
            keys.insert("email", self.email.clone());
        }
        if !self.username.is_empty() {
            keys.insert("username", self.username.clone());
        }
        if !self.phone.is_empty() {
            keys.insert("phone", self.phone.clone());
        }
        keys
    }

    fn buckets(&self) -> BTreeMap<&'static str, String> {
        let mut buckets = BTreeMap::new();
        buckets.insert("role", self.role.name().to_string());
        buckets.insert("status", self.status.name().to_string());
        buckets
    }

    fn label(&self) -> String {
        self.name.clone()
    }

    fn search_text(&self) -> String {
        format!("{} {} {}", self.name, self.username, self.email)
    }

    fn normalize_key(key: &str, raw: &str) -> String {
        match key {
            "phone" => codec::digits(raw),
            _ => raw.trim().to_lowercase(),
        }
    }
}

/// Loosely-shaped account input. [`UserDraft::validate`] is the only way to
/// turn it into a [`User`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserDraft {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub password_hash: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl UserDraft {
    pub fn validate(self) -> Result<User> {
        let name = codec::required("name", &self.name)?;
        let username = codec::required("username", &self.username)?.to_lowercase();
        let email = codec::email("email", &self.email)?;
        let phone = codec::optional_phone("phone", &self.phone, MIN_PHONE_DIGITS)?;
        let password_hash = codec::required("password_hash", &self.password_hash)?;

        Ok(User {
            id: self.id.unwrap_or(0),
            name,
            username,
            email,
            phone,
            password_hash,
            role: self.role.as_deref().map(Role::from_raw).unwrap_or_default(),
            status: self
                .status
                .as_deref()
                .map(UserStatus::from_raw)
                .unwrap_or_default(),
            created_at: self.created_at,
            updated_at: None,
        })
    }
}
