//! Project board state manager
//!
//! Sole owner of the in-memory dataset. Every mutation goes through here,
//! stamps the actor and save metadata, and persists via the dataset store;
//! a failed persist is logged and reported, never a panic.

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{
    Dataset, ExportDocument, Project, ProjectInput, Session, DATASET_VERSION,
};
use crate::store::{migrate_stage, DatasetStore};

/// Lookup-list selector for the add/remove operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Editors,
    Platforms,
    Channels,
}

pub struct ProjectBoard {
    dataset: Dataset,
    store: DatasetStore,
    stage_ids: Vec<String>,
    initial_stage: String,
}

impl ProjectBoard {
    /// Load the stored dataset, or seed a fresh one from the configured
    /// defaults when nothing is stored yet.
    pub fn new(store: DatasetStore, config: &Config) -> Self {
        let dataset = store.load().unwrap_or_else(|| {
            info!("no stored dataset, seeding defaults");
            Dataset::seeded(
                &config.default_editors,
                &config.default_platforms,
                &config.default_channels,
            )
        });
        Self {
            dataset,
            store,
            stage_ids: config.stage_ids(),
            initial_stage: config.initial_stage().to_string(),
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Replace the in-memory dataset with one adopted from another source
    /// (local re-read or remote poll). Does not persist; the source already
    /// holds this state.
    pub fn adopt(&mut self, dataset: Dataset) {
        self.dataset = dataset;
    }

    #[instrument(skip(self, actor, input), fields(user = %actor.username))]
    pub fn create_project(&mut self, actor: &Session, mut input: ProjectInput) -> Result<String> {
        let title = input
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Validation("project title is required".into()))?
            .to_string();
        let stage = match input.stage.take() {
            Some(stage) if self.stage_ids.contains(&stage) => stage,
            Some(stage) => return Err(Error::Validation(format!("unknown stage {stage}"))),
            None => self.initial_stage.clone(),
        };

        let now = Utc::now();
        let mut project = Project::new(&title, &stage);
        apply_input(&mut project, input);
        project.timeline.insert(stage, now);
        project.created_by = Some(actor.username.clone());
        project.last_modified_by = Some(actor.username.clone());

        let id = project.id.clone();
        self.register_lookups(&project);
        self.dataset.projects.push(project);
        self.persist(actor);
        Ok(id)
    }

    pub fn update_project(
        &mut self,
        actor: &Session,
        id: &str,
        input: ProjectInput,
    ) -> Result<()> {
        if let Some(stage) = &input.stage {
            if !self.stage_ids.contains(stage) {
                return Err(Error::Validation(format!("unknown stage {stage}")));
            }
        }
        let project = self.live_mut(id)?;
        let old_stage = project.stage.clone();
        apply_input(project, input);
        let now = Utc::now();
        if project.stage != old_stage {
            let stage = project.stage.clone();
            project.timeline.insert(stage, now);
        }
        project.last_modified = now;
        project.last_modified_by = Some(actor.username.clone());

        let snapshot = self.live_mut(id)?.clone();
        self.register_lookups(&snapshot);
        self.persist(actor);
        Ok(())
    }

    /// Move a card to another pipeline stage. Same-stage moves are a no-op;
    /// a revisit overwrites the stage's timeline entry.
    pub fn move_project(&mut self, actor: &Session, id: &str, stage: &str) -> Result<()> {
        if !self.stage_ids.contains(&stage.to_string()) {
            return Err(Error::Validation(format!("unknown stage {stage}")));
        }
        let project = self.live_mut(id)?;
        if project.stage == stage {
            return Ok(());
        }
        let now = Utc::now();
        project.stage = stage.to_string();
        project.timeline.insert(stage.to_string(), now);
        project.last_modified = now;
        project.last_modified_by = Some(actor.username.clone());
        self.persist(actor);
        Ok(())
    }

    /// Move a card to the trash, stamping who deleted it and when
    pub fn soft_delete_project(&mut self, actor: &Session, id: &str) -> Result<()> {
        let idx = self
            .dataset
            .projects
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| Error::NotFound(format!("project {id}")))?;
        let mut project = self.dataset.projects.remove(idx);
        project.deleted_at = Some(Utc::now());
        project.deleted_by = Some(actor.username.clone());
        self.dataset.trash.push(project);
        self.persist(actor);
        Ok(())
    }

    /// Return a trashed card to the live board, clearing the deletion stamps
    pub fn restore_project(&mut self, actor: &Session, id: &str) -> Result<()> {
        let idx = self
            .dataset
            .trash
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| Error::NotFound(format!("project {id}")))?;
        let mut project = self.dataset.trash.remove(idx);
        project.deleted_at = None;
        project.deleted_by = None;
        if !self.stage_ids.contains(&project.stage) {
            project.stage = self.initial_stage.clone();
        }
        self.dataset.projects.push(project);
        self.persist(actor);
        Ok(())
    }

    pub fn permanently_delete(&mut self, actor: &Session, id: &str) -> Result<()> {
        let idx = self
            .dataset
            .trash
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| Error::NotFound(format!("project {id}")))?;
        self.dataset.trash.remove(idx);
        self.persist(actor);
        Ok(())
    }

    pub fn empty_trash(&mut self, actor: &Session) {
        if self.dataset.trash.is_empty() {
            return;
        }
        info!("emptied trash ({} projects)", self.dataset.trash.len());
        self.dataset.trash.clear();
        self.persist(actor);
    }

    /// Copy a card under a fresh id. Checklist progress and the stage
    /// timeline do not carry over; the copy starts its history in its
    /// current stage.
    pub fn duplicate_project(&mut self, actor: &Session, id: &str) -> Result<String> {
        let source = self
            .dataset
            .projects
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::NotFound(format!("project {id}")))?;

        let now = Utc::now();
        let mut copy = source.clone();
        copy.id = Project::generate_id();
        copy.title = format!("{} (Copy)", source.title);
        for item in &mut copy.checklist {
            item.done = false;
        }
        copy.timeline.clear();
        copy.timeline.insert(copy.stage.clone(), now);
        copy.created_at = now;
        copy.created_by = Some(actor.username.clone());
        copy.last_modified = now;
        copy.last_modified_by = Some(actor.username.clone());

        let new_id = copy.id.clone();
        self.dataset.projects.push(copy);
        self.persist(actor);
        Ok(new_id)
    }

    /// Snapshot of the whole board as a downloadable document
    pub fn export(&self) -> ExportDocument {
        ExportDocument {
            projects: self.dataset.projects.clone(),
            trash: self.dataset.trash.clone(),
            editors: self.dataset.editors.clone(),
            platforms: self.dataset.platforms.clone(),
            channels: self.dataset.channels.clone(),
            export_date: Utc::now(),
            version: DATASET_VERSION.to_string(),
        }
    }

    /// Replace all board state with an imported document. Stages from older
    /// exports are migrated; unknown stages land in the initial stage.
    pub fn import(&mut self, actor: &Session, document: ExportDocument) -> Result<()> {
        let mut dataset = Dataset {
            projects: document.projects,
            trash: document.trash,
            editors: document.editors,
            platforms: document.platforms,
            channels: document.channels,
            last_saved: Utc::now(),
            last_user: Some(actor.username.clone()),
            save_id: String::new(),
            version: DATASET_VERSION.to_string(),
        };
        for project in dataset.projects.iter_mut().chain(dataset.trash.iter_mut()) {
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
        info!(
            "imported {} projects, {} trashed",
            dataset.projects.len(),
            dataset.trash.len()
        );
        self.dataset = dataset;
        self.persist(actor);
        Ok(())
    }

    pub fn add_lookup(&mut self, actor: &Session, lookup: Lookup, value: &str) -> Result<()> {
        let value = value.trim();
        if value.is_empty() {
            return Err(Error::Validation("lookup value is required".into()));
        }
        if insert_sorted(self.lookup_mut(lookup), value) {
            self.persist(actor);
        }
        Ok(())
    }

    /// Remove a lookup value. Projects already referencing it keep the text;
    /// it just stops being offered.
    pub fn remove_lookup(&mut self, actor: &Session, lookup: Lookup, value: &str) {
        let list = self.lookup_mut(lookup);
        let before = list.len();
        list.retain(|v| v != value);
        if list.len() != before {
            self.persist(actor);
        }
    }

    /// Stamp save metadata and write through the store. Failures are
    /// reported as a warning; the in-memory dataset stays authoritative.
    pub fn persist(&mut self, actor: &Session) -> bool {
        self.dataset.last_saved = Utc::now();
        self.dataset.last_user = Some(actor.username.clone());
        self.dataset.save_id = Uuid::new_v4().to_string();
        self.dataset.version = DATASET_VERSION.to_string();
        let saved = self.store.save(&self.dataset);
        if !saved {
            warn!("board changes are held in memory only");
        }
        saved
    }

    /// Re-read the stored dataset without touching in-memory state
    pub fn stored(&self) -> Option<Dataset> {
        self.store.load()
    }

    fn live_mut(&mut self, id: &str) -> Result<&mut Project> {
        self.dataset
            .projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::NotFound(format!("project {id}")))
    }

    fn lookup_mut(&mut self, lookup: Lookup) -> &mut Vec<String> {
        match lookup {
            Lookup::Editors => &mut self.dataset.editors,
            Lookup::Platforms => &mut self.dataset.platforms,
            Lookup::Channels => &mut self.dataset.channels,
        }
    }

    /// New editor/platform/channel values typed into a card are registered
    /// into the sorted lookup lists so they can be offered next time.
    fn register_lookups(&mut self, project: &Project) {
        for (lookup, value) in [
            (Lookup::Editors, project.editor.clone()),
            (Lookup::Platforms, project.platform.clone()),
            (Lookup::Channels, project.channel.clone()),
        ] {
            if !value.is_empty() {
                insert_sorted(self.lookup_mut(lookup), &value);
            }
        }
    }
}

fn apply_input(project: &mut Project, input: ProjectInput) {
    if let Some(title) = input.title {
        let title = title.trim();
        if !title.is_empty() {
            project.title = title.to_string();
        }
    }
    if let Some(client) = input.client {
        project.client = client;
    }
    if let Some(editor) = input.editor {
        project.editor = editor;
    }
    if let Some(platform) = input.platform {
        project.platform = platform;
    }
    if let Some(channel) = input.channel {
        project.channel = channel;
    }
    if let Some(priority) = input.priority {
        project.priority = priority;
    }
    if let Some(stage) = input.stage {
        project.stage = stage;
    }
    if let Some(color) = input.color {
        project.color = color;
    }
    if input.due_date.is_some() {
        project.due_date = input.due_date;
    }
    if input.upload_date.is_some() {
        project.upload_date = input.upload_date;
    }
    if let Some(notes) = input.notes {
        project.notes = notes;
    }
    if let Some(checklist) = input.checklist {
        project.checklist = checklist;
    }
}

/// Insert a new value and re-sort the whole list, so a stored list that
/// predates sorting heals on its first registration.
fn insert_sorted(list: &mut Vec<String>, value: &str) -> bool {
    if list.iter().any(|v| v == value) {
        return false;
    }
    list.push(value.to_string());
    list.sort();
    true
}

/// Which projects a session may see. Admins see everything; editors see
/// unassigned cards plus cards on one of their entitled channels.
pub fn visible_projects<'a>(projects: &'a [Project], session: &Session) -> Vec<&'a Project> {
    projects
        .iter()
        .filter(|p| {
            session.is_admin() || p.channel.is_empty() || session.channels.contains(&p.channel)
        })
        .collect()
}
