//! The serializable bundle exchanged between memory, the local store and
//! the remote store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Project;

pub const DATASET_VERSION: &str = "3.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub trash: Vec<Project>,
    #[serde(default)]
    pub editors: Vec<String>,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default = "Utc::now")]
    pub last_saved: DateTime<Utc>,
    #[serde(default)]
    pub last_user: Option<String>,
    /// Unique per-save marker, distinguishes saves within one timestamp
    #[serde(default)]
    pub save_id: String,
    #[serde(default)]
    pub version: String,
}

impl Dataset {
    /// Fresh dataset seeded with the configured lookup lists
    pub fn seeded(editors: &[String], platforms: &[String], channels: &[String]) -> Self {
        Self {
            projects: Vec::new(),
            trash: Vec::new(),
            editors: editors.to_vec(),
            platforms: platforms.to_vec(),
            channels: channels.to_vec(),
            last_saved: Utc::now(),
            last_user: None,
            save_id: String::new(),
            version: DATASET_VERSION.to_string(),
        }
    }
}

/// The downloadable backup document; import replaces all state with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub projects: Vec<Project>,
    #[serde(default)]
    pub trash: Vec<Project>,
    #[serde(default)]
    pub editors: Vec<String>,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub channels: Vec<String>,
    pub export_date: DateTime<Utc>,
    pub version: String,
}
