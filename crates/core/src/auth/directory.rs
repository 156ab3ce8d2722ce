//! User directory
//!
//! The full set of accounts is the hardcoded bootstrap users re-seeded on
//! every load, overlaid with admin-created custom accounts. Only custom
//! accounts are persisted or synchronized; the defaults never travel.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Role, UserRecord, UserSummary};
use crate::sync::CustomUsers;

/// The bootstrap admin account; always present, never deletable
pub const BOOTSTRAP_ADMIN: &str = "admin";

/// Hardcoded first-run accounts, carrying legacy digests until their first
/// successful login migrates them
pub fn default_users() -> CustomUsers {
    let mut users = HashMap::new();
    users.insert(
        "admin".to_string(),
        default_record("2f24jul", "Administrator", Role::Admin, &[]),
    );
    users.insert(
        "mia".to_string(),
        default_record("hrpveb", "Mia", Role::Editor, &["Main Brand", "Clips Channel"]),
    );
    users.insert(
        "leo".to_string(),
        default_record("iapqck", "Leo", Role::Editor, &["Client Channel", "Main Brand"]),
    );
    users.insert(
        "kai".to_string(),
        default_record("iu2d1d", "Kai", Role::Editor, &["Clips Channel"]),
    );
    users
}

fn default_record(hash: &str, name: &str, role: Role, channels: &[&str]) -> UserRecord {
    UserRecord {
        hash: hash.to_string(),
        salt: None,
        display_name: name.to_string(),
        role,
        channels: channels.iter().map(|c| c.to_string()).collect(),
        active: true,
        is_default: true,
        created: None,
        last_modified: None,
        last_login: None,
    }
}

/// In-memory directory: defaults overlaid with custom accounts
#[derive(Debug, Clone, Default)]
pub struct Directory {
    users: HashMap<String, UserRecord>,
}

impl Directory {
    /// Re-seed defaults, then overlay custom records (a custom record with
    /// a default's name wins, as it may carry a migrated hash)
    pub fn from_custom(custom: CustomUsers) -> Self {
        let mut users = default_users();
        users.extend(custom);
        Self { users }
    }

    pub fn get(&self, username: &str) -> Option<&UserRecord> {
        self.users.get(username)
    }

    pub fn get_mut(&mut self, username: &str) -> Option<&mut UserRecord> {
        self.users.get_mut(username)
    }

    pub fn contains(&self, username: &str) -> bool {
        self.users.contains_key(username)
    }

    pub fn insert(&mut self, username: String, record: UserRecord) {
        self.users.insert(username, record);
    }

    pub fn remove(&mut self, username: &str) -> Option<UserRecord> {
        self.users.remove(username)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// The persistable slice: every record that differs from its hardcoded
    /// seed. Untouched defaults never travel; a default whose hash was
    /// migrated (or whose last login moved) persists as an overlay.
    pub fn custom_users(&self) -> CustomUsers {
        let seeds = default_users();
        self.users
            .iter()
            .filter(|(name, record)| seeds.get(*name) != Some(record))
            .map(|(name, record)| (name.clone(), record.clone()))
            .collect()
    }

    /// Non-secret summaries, sorted by username for stable listings
    pub fn summaries(&self) -> Vec<UserSummary> {
        let mut summaries: Vec<UserSummary> = self
            .users
            .iter()
            .map(|(name, record)| UserSummary::from_record(name, record))
            .collect();
        summaries.sort_by(|a, b| a.username.cmp(&b.username));
        summaries
    }

    /// Compact copy-paste form of the custom accounts, for manual transfer
    /// between machines when no remote endpoint is reachable
    pub fn export_encoded(&self) -> Result<String> {
        let json = serde_json::to_string(&self.custom_users())?;
        Ok(BASE64.encode(json))
    }

    pub fn decode_import(encoded: &str) -> Result<CustomUsers> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| Error::Validation(format!("invalid import payload: {e}")))?;
        let json = String::from_utf8(bytes)
            .map_err(|e| Error::Validation(format!("invalid import payload: {e}")))?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Key-by-key conflict resolution between the remote and local copies of
/// the custom accounts. One-sided keys are kept; both-sided conflicts go
/// to the greater `last_modified`, ties to the remote copy.
pub fn merge_custom(remote: CustomUsers, local: CustomUsers) -> CustomUsers {
    let mut merged = remote;
    for (username, local_record) in local {
        match merged.get(&username) {
            None => {
                debug!("user {username}: using local copy (remote missing)");
                merged.insert(username, local_record);
            }
            Some(remote_record) => {
                let local_time = local_record.last_modified;
                let remote_time = remote_record.last_modified;
                if local_time > remote_time {
                    debug!("user {username}: local copy is newer");
                    merged.insert(username, local_record);
                } else {
                    debug!("user {username}: keeping remote copy");
                }
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn custom(name: &str, modified_secs: i64) -> (String, UserRecord) {
        let mut record = default_record("abc", name, Role::Editor, &[]);
        record.is_default = false;
        record.last_modified = Some(Utc.timestamp_opt(modified_secs, 0).unwrap());
        (name.to_string(), record)
    }

    #[test]
    fn test_defaults_always_present() {
        let directory = Directory::from_custom(HashMap::new());
        assert_eq!(directory.len(), 4);
        assert!(directory.get(BOOTSTRAP_ADMIN).unwrap().is_default);
        assert_eq!(directory.get("mia").unwrap().channels.len(), 2);
    }

    #[test]
    fn test_custom_record_overlays_default() {
        let mut overlaid = default_users().remove("mia").unwrap();
        overlaid.hash = "rehashed".to_string();
        overlaid.salt = Some(vec![1; 16]);

        let mut custom_users = HashMap::new();
        custom_users.insert("mia".to_string(), overlaid);

        let directory = Directory::from_custom(custom_users);
        assert_eq!(directory.get("mia").unwrap().hash, "rehashed");
        assert_eq!(directory.len(), 4);
    }

    #[test]
    fn test_defaults_excluded_from_persistence() {
        let mut directory = Directory::from_custom(HashMap::new());
        let (name, record) = custom("jane", 100);
        directory.insert(name, record);

        let custom_users = directory.custom_users();
        assert_eq!(custom_users.len(), 1);
        assert!(custom_users.contains_key("jane"));
    }

    #[test]
    fn test_merge_keeps_one_sided_records() {
        let remote: CustomUsers = [custom("only_remote", 10)].into_iter().collect();
        let local: CustomUsers = [custom("only_local", 20)].into_iter().collect();

        let merged = merge_custom(remote, local);
        assert_eq!(merged.len(), 2);
        assert!(merged.contains_key("only_remote"));
        assert!(merged.contains_key("only_local"));
    }

    #[test]
    fn test_merge_picks_greater_last_modified_either_order() {
        let (_, older) = custom("jane", 100);
        let (_, newer) = custom("jane", 200);

        let a: CustomUsers = [("jane".to_string(), older.clone())].into_iter().collect();
        let b: CustomUsers = [("jane".to_string(), newer.clone())].into_iter().collect();

        let merged_ab = merge_custom(a.clone(), b.clone());
        let merged_ba = merge_custom(b, a);
        assert_eq!(merged_ab.get("jane"), Some(&newer));
        assert_eq!(merged_ab.get("jane"), merged_ba.get("jane"));
    }

    #[test]
    fn test_merge_tie_favors_remote() {
        let (_, mut remote_record) = custom("jane", 100);
        remote_record.display_name = "Remote Jane".to_string();
        let (_, local_record) = custom("jane", 100);

        let remote: CustomUsers = [("jane".to_string(), remote_record)].into_iter().collect();
        let local: CustomUsers = [("jane".to_string(), local_record)].into_iter().collect();

        let merged = merge_custom(remote, local);
        assert_eq!(merged.get("jane").unwrap().display_name, "Remote Jane");
    }

    #[test]
    fn test_encoded_export_round_trip() {
        let mut directory = Directory::from_custom(HashMap::new());
        let (name, record) = custom("jane", 100);
        directory.insert(name, record.clone());

        let encoded = directory.export_encoded().unwrap();
        let imported = Directory::decode_import(&encoded).unwrap();
        assert_eq!(imported.get("jane"), Some(&record));
    }

    #[test]
    fn test_bad_import_payload_rejected() {
        assert!(Directory::decode_import("%%%").is_err());
    }
}
