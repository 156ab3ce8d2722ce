//! Application configuration
//!
//! TOML-loadable; every field defaults to the tracker's stock setup so an
//! absent or partial config file still yields a working instance.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One ordinal step in the production pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Session lifetime in seconds
    pub timeout_secs: u64,
    /// Slide the expiry window forward on every session read
    pub extend_on_activity: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 24 * 60 * 60,
            extend_on_activity: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub min_password_length: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            min_password_length: 6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub cloud_enabled: bool,
    /// Candidate endpoints for the user directory document, in priority order
    pub user_endpoints: Vec<String>,
    /// Candidate endpoints for the dataset document, in priority order
    pub dataset_endpoints: Vec<String>,
    pub request_timeout_secs: u64,
    pub auto_save_secs: u64,
    pub local_check_secs: u64,
    pub remote_poll_secs: u64,
    pub session_sweep_secs: u64,
    pub broadcast_throttle_secs: u64,
    /// Remote datasets older than this are ignored by the poll
    pub recency_window_secs: u64,
    /// Attempts per directory save before falling back to local-only
    pub directory_push_retries: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cloud_enabled: true,
            user_endpoints: Vec::new(),
            dataset_endpoints: Vec::new(),
            request_timeout_secs: 7,
            auto_save_secs: 15,
            local_check_secs: 5,
            remote_poll_secs: 30,
            session_sweep_secs: 60,
            broadcast_throttle_secs: 5,
            recency_window_secs: 300,
            directory_push_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageKeys {
    pub dataset: String,
    pub users: String,
    pub session: String,
    pub broadcast: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            dataset: "cutboard-data-v3".to_string(),
            users: "cutboard-users-v3".to_string(),
            session: "cutboard-session-v3".to_string(),
            broadcast: "cutboard-broadcast".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,
    pub security: SecurityConfig,
    pub sync: SyncConfig,
    pub storage: StorageKeys,
    pub stages: Vec<Stage>,
    pub default_editors: Vec<String>,
    pub default_platforms: Vec<String>,
    pub default_channels: Vec<String>,
    pub card_colors: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            security: SecurityConfig::default(),
            sync: SyncConfig::default(),
            storage: StorageKeys::default(),
            stages: default_stages(),
            default_editors: strings(&["Mia", "Leo", "Kai"]),
            default_platforms: strings(&[
                "Instagram",
                "TikTok",
                "YouTube",
                "Facebook",
                "LinkedIn",
            ]),
            default_channels: strings(&["Main Brand", "Clips Channel", "Client Channel"]),
            card_colors: strings(&["teal", "coral", "navy", "purple", "green"]),
        }
    }
}

impl Config {
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    /// First stage id; the normalization target for unknown stages
    pub fn initial_stage(&self) -> &str {
        self.stages
            .first()
            .map(|s| s.id.as_str())
            .unwrap_or("uploaded")
    }

    pub fn stage_ids(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.id.clone()).collect()
    }

    pub fn is_known_stage(&self, id: &str) -> bool {
        self.stages.iter().any(|s| s.id == id)
    }
}

fn default_stages() -> Vec<Stage> {
    [
        ("uploaded", "Uploaded", "#00ffa3"),
        ("assigned", "Assigned", "#00d4ff"),
        ("editing", "Editing", "#ff6b35"),
        ("revisions", "Revisions", "#ffb347"),
        ("final", "Final", "#7c3aed"),
        ("posted", "Posted", "#10b981"),
    ]
    .iter()
    .map(|(id, name, color)| Stage {
        id: id.to_string(),
        name: name.to_string(),
        color: color.to_string(),
    })
    .collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_pipeline() {
        let config = Config::default();
        assert_eq!(config.initial_stage(), "uploaded");
        assert!(config.is_known_stage("posted"));
        assert!(!config.is_known_stage("ideation"));
        assert_eq!(config.stages.len(), 6);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [session]
            timeout_secs = 60

            [sync]
            cloud_enabled = false
            user_endpoints = ["https://example.test/users"]
            "#,
        )
        .unwrap();
        assert_eq!(config.session.timeout_secs, 60);
        assert!(config.session.extend_on_activity);
        assert!(!config.sync.cloud_enabled);
        assert_eq!(config.sync.user_endpoints.len(), 1);
        assert_eq!(config.storage.dataset, "cutboard-data-v3");
    }

    #[test]
    fn test_bad_toml_is_a_config_error() {
        assert!(matches!(
            Config::from_toml("session = 3"),
            Err(Error::Config(_))
        ));
    }
}
