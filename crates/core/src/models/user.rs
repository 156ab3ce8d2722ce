//! User directory and session models

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Editor,
}

/// A stored user account. Keyed by lowercase username in the directory,
/// so the username itself is not part of the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Hex SHA-256 digest, or a legacy base-36 digest when `salt` is None
    pub hash: String,
    #[serde(default)]
    pub salt: Option<Vec<u8>>,
    #[serde(rename = "name")]
    pub display_name: String,
    pub role: Role,
    /// Channel entitlements; empty for admins (they see everything)
    #[serde(default)]
    pub channels: Vec<String>,
    pub active: bool,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

impl UserRecord {
    /// True if the stored hash predates the salted scheme
    pub fn has_legacy_hash(&self) -> bool {
        self.salt.is_none()
    }
}

/// Non-secret projection of a directory entry, for admin listings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub username: String,
    #[serde(rename = "name")]
    pub display_name: String,
    pub role: Role,
    pub channels: Vec<String>,
    pub active: bool,
    pub is_default: bool,
    pub created: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
}

impl UserSummary {
    pub fn from_record(username: &str, record: &UserRecord) -> Self {
        Self {
            username: username.to_string(),
            display_name: record.display_name.clone(),
            role: record.role,
            channels: record.channels.clone(),
            active: record.active,
            is_default: record.is_default,
            created: record.created,
            last_modified: record.last_modified,
            last_login: record.last_login,
        }
    }
}

/// Active login session, stored under the session key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub username: String,
    #[serde(rename = "name")]
    pub display_name: String,
    pub role: Role,
    pub channels: Vec<String>,
    pub login_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(username: &str, record: &UserRecord, timeout: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            display_name: record.display_name.clone(),
            role: record.role,
            channels: record.channels.clone(),
            login_time: now,
            last_activity: now,
            expires_at: now + timeout,
        }
    }

    pub fn is_valid(&self) -> bool {
        Utc::now() < self.expires_at
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Slide the expiry window forward from now
    pub fn touch(&mut self, timeout: Duration) {
        let now = Utc::now();
        self.last_activity = now;
        self.expires_at = now + timeout;
    }
}
