//! Project card model

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Card priority, serialized in the uppercase form the exchange format uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub done: bool,
}

/// A project card. Lives in either the live collection or the trash,
/// never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub editor: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub stage: String,
    #[serde(default)]
    pub color: String,
    #[serde(default, deserialize_with = "lenient_date")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub upload_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
    /// Entry time per stage id; overwritten when a card revisits a stage
    #[serde(default)]
    pub timeline: BTreeMap<String, DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub last_modified_by: Option<String>,
    #[serde(default = "Utc::now")]
    pub last_modified: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<String>,
}

impl Project {
    /// Blank card in the given stage with a fresh id
    pub fn new(title: &str, stage: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Self::generate_id(),
            title: title.to_string(),
            client: String::new(),
            editor: String::new(),
            platform: String::new(),
            channel: String::new(),
            priority: Priority::default(),
            stage: stage.to_string(),
            color: "teal".to_string(),
            due_date: None,
            upload_date: None,
            notes: String::new(),
            checklist: Vec::new(),
            timeline: BTreeMap::new(),
            created_at: now,
            created_by: None,
            last_modified_by: None,
            last_modified: now,
            deleted_at: None,
            deleted_by: None,
        }
    }

    pub fn generate_id() -> String {
        Uuid::new_v4().to_string()
    }
}

/// Caller-supplied card fields for create/update.
///
/// On update, `None` leaves the current value untouched.
#[derive(Debug, Clone, Default)]
pub struct ProjectInput {
    pub title: Option<String>,
    pub client: Option<String>,
    pub editor: Option<String>,
    pub platform: Option<String>,
    pub channel: Option<String>,
    pub priority: Option<Priority>,
    pub stage: Option<String>,
    pub color: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub upload_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub checklist: Option<Vec<ChecklistItem>>,
}

/// Legacy exports carry dates as strings, sometimes empty. Treat anything
/// unparseable as absent rather than failing the whole load.
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .filter(|s| !s.is_empty())
        .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()))
}
