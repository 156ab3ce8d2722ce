//! Persistent store adapter for the dataset
//!
//! Serializes the dataset to the primary versioned key plus a timestamped
//! backup key, pruned to the most recent five. Save and load never throw:
//! a failed save reports `false`, a failed load reports `None`, and the
//! in-memory dataset is untouched either way.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::Result;
use crate::kv::KvStore;
use crate::models::{Dataset, Project};

/// Retained timestamped backups per dataset key
const BACKUP_KEEP: usize = 5;

pub type SharedKv = Arc<Mutex<dyn KvStore>>;

pub struct DatasetStore {
    kv: SharedKv,
    key: String,
    stage_ids: Vec<String>,
    initial_stage: String,
}

impl DatasetStore {
    pub fn new(kv: SharedKv, config: &Config) -> Self {
        Self {
            kv,
            key: config.storage.dataset.clone(),
            stage_ids: config.stage_ids(),
            initial_stage: config.initial_stage().to_string(),
        }
    }

    /// Write the dataset under the primary key and a timestamped backup.
    ///
    /// Returns false on any serialization or storage failure so the caller
    /// can surface a user-visible warning; the caller's in-memory state is
    /// never affected.
    pub fn save(&self, dataset: &Dataset) -> bool {
        let raw = match serde_json::to_string(dataset) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("failed to serialize dataset: {e}");
                return false;
            }
        };

        let backup_key = format!(
            "{}-backup-{:013}",
            self.key,
            Utc::now().timestamp_millis()
        );

        let mut kv = self.kv.lock().unwrap();
        if let Err(e) = kv.set(&self.key, &raw) {
            warn!("failed to save dataset: {e}");
            return false;
        }
        if let Err(e) = kv.set(&backup_key, &raw) {
            warn!("failed to write dataset backup: {e}");
            return false;
        }
        if let Err(e) = Self::prune_backups(&mut *kv, &self.key) {
            // Stale backups are harmless; the primary write already landed.
            warn!("failed to prune dataset backups: {e}");
        }
        debug!("dataset saved ({} projects)", dataset.projects.len());
        true
    }

    /// Read and parse the primary key. Absent or corrupt data yields None;
    /// loaded projects are normalized to valid pipeline stages.
    pub fn load(&self) -> Option<Dataset> {
        let raw = match self.kv.lock().unwrap().get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("failed to read dataset: {e}");
                return None;
            }
        };

        let mut dataset: Dataset = match serde_json::from_str(&raw) {
            Ok(dataset) => dataset,
            Err(e) => {
                warn!("stored dataset is corrupt, ignoring: {e}");
                return None;
            }
        };

        for project in dataset
            .projects
            .iter_mut()
            .chain(dataset.trash.iter_mut())
        {
            self.normalize(project);
        }
        Some(dataset)
    }

    /// Timestamped backup keys currently held, ascending
    pub fn backup_keys(&self) -> Vec<String> {
        let prefix = format!("{}-backup-", self.key);
        self.kv
            .lock()
            .unwrap()
            .keys_with_prefix(&prefix)
            .unwrap_or_default()
    }

    fn prune_backups(kv: &mut dyn KvStore, key: &str) -> Result<()> {
        let prefix = format!("{key}-backup-");
        let keys = kv.keys_with_prefix(&prefix)?;
        if keys.len() > BACKUP_KEEP {
            for stale in &keys[..keys.len() - BACKUP_KEEP] {
                kv.remove(stale)?;
            }
        }
        Ok(())
    }

    fn normalize(&self, project: &mut Project) {
        if project.id.is_empty() {
            project.id = Project::generate_id();
        }
        if !self.stage_ids.contains(&project.stage) {
            project.stage = migrate_stage(&project.stage)
                .filter(|s| self.stage_ids.contains(&s.to_string()))
                .unwrap_or(&self.initial_stage)
                .to_string();
        }
    }
}

/// Stage ids used by pre-3.0 exports
pub(crate) fn migrate_stage(stage: &str) -> Option<&'static str> {
    match stage {
        "ideation" => Some("uploaded"),
        "filming" => Some("assigned"),
        "posting" => Some("posted"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use crate::models::DATASET_VERSION;
    use crate::Error;

    /// Store that starts failing writes on demand, simulating quota errors
    struct QuotaStore {
        inner: MemoryStore,
        failing: Arc<std::sync::atomic::AtomicBool>,
    }

    impl KvStore for QuotaStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<()> {
            if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(Error::Io(std::io::Error::other("quota exceeded")));
            }
            self.inner.set(key, value)
        }

        fn remove(&mut self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }

        fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
            self.inner.keys_with_prefix(prefix)
        }
    }

    fn store_over(kv: SharedKv) -> DatasetStore {
        DatasetStore::new(kv, &Config::default())
    }

    fn sample_dataset() -> Dataset {
        let config = Config::default();
        let mut dataset = Dataset::seeded(
            &config.default_editors,
            &config.default_platforms,
            &config.default_channels,
        );
        dataset.version = DATASET_VERSION.to_string();
        let mut project = Project::new("Launch teaser", "editing");
        project.id = "p1".to_string();
        dataset.projects.push(project);
        dataset
    }

    #[test]
    fn test_save_load_round_trip() {
        let kv: SharedKv = Arc::new(Mutex::new(MemoryStore::new()));
        let store = store_over(kv);
        let dataset = sample_dataset();

        assert!(store.save(&dataset));
        assert_eq!(store.load().unwrap(), dataset);
    }

    #[test]
    fn test_backups_pruned_to_five() {
        let kv: SharedKv = Arc::new(Mutex::new(MemoryStore::new()));
        let store = store_over(kv.clone());
        let dataset = sample_dataset();

        // Distinct backup keys need distinct millis; force them.
        for i in 0..8 {
            let backup_key = format!("cutboard-data-v3-backup-{:013}", i);
            kv.lock()
                .unwrap()
                .set(&backup_key, "old")
                .unwrap();
        }
        assert!(store.save(&dataset));

        let backups = store.backup_keys();
        assert_eq!(backups.len(), BACKUP_KEEP);
        // Oldest synthetic keys are gone, the fresh backup survives.
        assert!(!backups.contains(&"cutboard-data-v3-backup-0000000000000".to_string()));
    }

    #[test]
    fn test_corrupt_payload_loads_as_none() {
        let kv: SharedKv = Arc::new(Mutex::new(MemoryStore::new()));
        kv.lock()
            .unwrap()
            .set("cutboard-data-v3", "{not json")
            .unwrap();
        assert!(store_over(kv).load().is_none());
    }

    #[test]
    fn test_absent_payload_loads_as_none() {
        let kv: SharedKv = Arc::new(Mutex::new(MemoryStore::new()));
        assert!(store_over(kv).load().is_none());
    }

    #[test]
    fn test_legacy_stages_normalized_on_load() {
        let kv: SharedKv = Arc::new(Mutex::new(MemoryStore::new()));
        let raw = r#"{
            "projects": [
                {"id": "a", "title": "Old", "stage": "ideation"},
                {"id": "b", "title": "Older", "stage": "filming"},
                {"id": "c", "title": "Unknown", "stage": "whatever"},
                {"title": "No id", "stage": "posting"}
            ],
            "version": "2.2"
        }"#;
        kv.lock().unwrap().set("cutboard-data-v3", raw).unwrap();

        let dataset = store_over(kv).load().unwrap();
        let stages: Vec<&str> = dataset.projects.iter().map(|p| p.stage.as_str()).collect();
        assert_eq!(stages, vec!["uploaded", "assigned", "uploaded", "posted"]);
        assert!(!dataset.projects[3].id.is_empty());
    }

    #[test]
    fn test_quota_failure_keeps_previous_dataset() {
        let failing = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let kv: SharedKv = Arc::new(Mutex::new(QuotaStore {
            inner: MemoryStore::new(),
            failing: failing.clone(),
        }));
        let store = store_over(kv);

        let first = sample_dataset();
        assert!(store.save(&first));

        // Storage starts rejecting writes; save must report failure without
        // clobbering the previously persisted dataset.
        failing.store(true, std::sync::atomic::Ordering::SeqCst);

        let mut second = first.clone();
        second.projects.clear();
        assert!(!store.save(&second));
        assert_eq!(store.load().unwrap(), first);
    }
}
