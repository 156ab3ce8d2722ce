//! Cross-tab broadcast channel
//!
//! A single store key carries the latest broadcast message; other tabs of
//! the same origin notice the changed value and react. Consumers act only
//! on the enumerated kinds and never mutate project data in response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::SharedKv;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastKind {
    UserCreated,
    UserUpdated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broadcast {
    #[serde(rename = "type")]
    pub kind: BroadcastKind,
    pub username: String,
    pub at: DateTime<Utc>,
}

impl Broadcast {
    pub fn new(kind: BroadcastKind, username: &str) -> Self {
        Self {
            kind,
            username: username.to_string(),
            at: Utc::now(),
        }
    }
}

pub struct BroadcastChannel {
    kv: SharedKv,
    key: String,
}

impl BroadcastChannel {
    pub fn new(kv: SharedKv, key: &str) -> Self {
        Self {
            kv,
            key: key.to_string(),
        }
    }

    /// Best-effort publish; a failed write is logged and dropped
    pub fn publish(&self, broadcast: &Broadcast) {
        let raw = match serde_json::to_string(broadcast) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("failed to encode broadcast: {e}");
                return;
            }
        };
        if let Err(e) = self.kv.lock().unwrap().set(&self.key, &raw) {
            warn!("failed to publish broadcast: {e}");
        }
    }

    /// Current raw value and its decoded message, if any. Messages of
    /// unknown shape are ignored.
    pub fn fetch(&self) -> Option<(String, Broadcast)> {
        let raw = self.kv.lock().unwrap().get(&self.key).ok().flatten()?;
        let broadcast = serde_json::from_str(&raw).ok()?;
        Some((raw, broadcast))
    }
}
