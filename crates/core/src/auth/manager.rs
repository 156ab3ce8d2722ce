//! Credential and session manager
//!
//! Owns the user directory and the stored session. The directory is
//! reconciled remote-then-local before every authentication and admin
//! listing so concurrent admin changes on other machines are picked up;
//! remote failures degrade to the local copy and never block a login.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, instrument, warn};

use crate::broadcast::{Broadcast, BroadcastChannel, BroadcastKind};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{Role, Session, UserRecord, UserSummary};
use crate::store::SharedKv;
use crate::sync::{CustomUsers, RemoteStore};

use super::directory::{merge_custom, Directory, BOOTSTRAP_ADMIN};
use super::password;

/// Fields for an admin-created account
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub display_name: String,
    pub role: Role,
    pub channels: Vec<String>,
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub display_name: Option<String>,
    pub role: Option<Role>,
    pub channels: Option<Vec<String>>,
    pub active: Option<bool>,
    pub password: Option<String>,
}

pub struct CredentialManager {
    kv: SharedKv,
    remote: Arc<dyn RemoteStore>,
    broadcast: BroadcastChannel,
    directory: Directory,
    session_timeout: Duration,
    extend_on_activity: bool,
    min_password_length: usize,
    push_retries: u32,
    users_key: String,
    session_key: String,
}

impl CredentialManager {
    pub fn new(kv: SharedKv, remote: Arc<dyn RemoteStore>, config: &Config) -> Self {
        Self {
            broadcast: BroadcastChannel::new(kv.clone(), &config.storage.broadcast),
            kv,
            remote,
            directory: Directory::from_custom(Default::default()),
            session_timeout: Duration::seconds(config.session.timeout_secs as i64),
            extend_on_activity: config.session.extend_on_activity,
            min_password_length: config.security.min_password_length,
            push_retries: config.sync.directory_push_retries,
            users_key: config.storage.users.clone(),
            session_key: config.storage.session.clone(),
        }
    }

    /// Rebuild the directory from remote-then-local sources.
    ///
    /// A reachable remote is merged with the local copy and the merge
    /// written back locally; an unreachable remote falls back to the local
    /// copy alone, which is opportunistically pushed upstream.
    pub async fn reload(&mut self) {
        let local = self.read_local_custom();
        let custom = match self.remote.pull_users().await {
            Some(remote) if !remote.is_empty() => {
                let merged = merge_custom(remote, local);
                self.write_local_custom(&merged);
                merged
            }
            _ => {
                if !local.is_empty() && self.remote.push_users(&local).await {
                    info!("uploaded local user directory to remote");
                }
                local
            }
        };
        self.directory = Directory::from_custom(custom);
    }

    /// Verify credentials and open a session.
    ///
    /// Reloads the directory first, lazily migrates legacy hashes on
    /// success, and persists the updated directory best-effort.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<Session> {
        let username = username.trim().to_lowercase();
        self.reload().await;

        let session = {
            let record = self
                .directory
                .get_mut(&username)
                .ok_or(Error::InvalidCredentials)?;
            if !record.active {
                return Err(Error::InvalidCredentials);
            }
            if !password::verify(password, record) {
                return Err(Error::InvalidCredentials);
            }

            let now = Utc::now();
            record.last_login = Some(now);
            if record.has_legacy_hash() {
                let salt = password::generate_salt();
                record.hash = password::salted_hash(password, &salt);
                record.salt = Some(salt);
                record.last_modified = Some(now);
                info!("migrated {username} to the salted hash scheme");
            }
            Session::new(&username, record, self.session_timeout)
        };

        // Directory persistence is advisory here; a full store must not
        // lock the user out.
        if let Err(e) = self.save_directory().await {
            warn!("could not persist directory after login: {e}");
        }
        self.write_session(&session)?;
        info!("session opened for {username}");
        Ok(session)
    }

    /// Admin-only: create a custom account. The in-memory insert is rolled
    /// back if local persistence fails.
    pub async fn create_user(&mut self, actor: &Session, new_user: NewUser) -> Result<()> {
        self.require_admin(actor)?;
        let username = new_user.username.trim().to_lowercase();
        if username.is_empty() || new_user.display_name.is_empty() {
            return Err(Error::Validation("username and display name are required".into()));
        }
        self.check_password(&new_user.password)?;
        if self.directory.contains(&username) {
            return Err(Error::DuplicateUser(username));
        }

        let now = Utc::now();
        let salt = password::generate_salt();
        let record = UserRecord {
            hash: password::salted_hash(&new_user.password, &salt),
            salt: Some(salt),
            display_name: new_user.display_name,
            role: new_user.role,
            channels: new_user.channels,
            active: true,
            is_default: false,
            created: Some(now),
            last_modified: Some(now),
            last_login: None,
        };

        self.directory.insert(username.clone(), record);
        if let Err(e) = self.save_directory().await {
            self.directory.remove(&username);
            return Err(e);
        }
        self.broadcast
            .publish(&Broadcast::new(BroadcastKind::UserCreated, &username));
        info!("user {username} created by {}", actor.username);
        Ok(())
    }

    /// Admin-only: apply a partial update; a supplied password is re-hashed
    /// under the salted scheme.
    pub async fn update_user(
        &mut self,
        actor: &Session,
        username: &str,
        update: UserUpdate,
    ) -> Result<()> {
        self.require_admin(actor)?;
        if let Some(new_password) = &update.password {
            self.check_password(new_password)?;
        }

        let username = username.trim().to_lowercase();
        let record = self
            .directory
            .get_mut(&username)
            .ok_or_else(|| Error::NotFound(format!("user {username}")))?;

        if let Some(display_name) = update.display_name {
            record.display_name = display_name;
        }
        if let Some(role) = update.role {
            record.role = role;
        }
        if let Some(channels) = update.channels {
            record.channels = channels;
        }
        if let Some(active) = update.active {
            record.active = active;
        }
        if let Some(new_password) = update.password {
            let salt = password::generate_salt();
            record.hash = password::salted_hash(&new_password, &salt);
            record.salt = Some(salt);
        }
        record.last_modified = Some(Utc::now());

        self.save_directory().await?;
        self.broadcast
            .publish(&Broadcast::new(BroadcastKind::UserUpdated, &username));
        Ok(())
    }

    /// Admin-only: delete a custom account. Bootstrap accounts are
    /// protected.
    pub async fn delete_user(&mut self, actor: &Session, username: &str) -> Result<()> {
        self.require_admin(actor)?;
        let username = username.trim().to_lowercase();
        if username == BOOTSTRAP_ADMIN {
            return Err(Error::ProtectedUser(username));
        }
        match self.directory.get(&username) {
            None => return Err(Error::NotFound(format!("user {username}"))),
            Some(record) if record.is_default => return Err(Error::ProtectedUser(username)),
            Some(_) => {}
        }

        self.directory.remove(&username);
        self.save_directory().await?;
        info!("user {username} deleted by {}", actor.username);
        Ok(())
    }

    /// Admin-only: non-secret directory listing
    pub fn list_users(&self, actor: &Session) -> Result<Vec<UserSummary>> {
        self.require_admin(actor)?;
        Ok(self.directory.summaries())
    }

    /// Admin-only: copy-paste form of the custom accounts, for manual
    /// transfer between machines when no remote endpoint is reachable
    pub fn export_directory(&self, actor: &Session) -> Result<String> {
        self.require_admin(actor)?;
        self.directory.export_encoded()
    }

    /// Admin-only: merge a manually transferred export into the directory.
    /// Conflicts resolve like a remote merge, favoring the imported copy.
    pub async fn import_directory(&mut self, actor: &Session, encoded: &str) -> Result<usize> {
        self.require_admin(actor)?;
        let imported = Directory::decode_import(encoded)?;
        let count = imported.len();
        let merged = merge_custom(imported, self.directory.custom_users());
        self.directory = Directory::from_custom(merged);
        self.save_directory().await?;
        info!("imported {count} directory entries");
        Ok(count)
    }

    /// The stored session, if still valid. Expired or unreadable sessions
    /// are cleared; a valid read slides the expiry window forward when
    /// activity extension is configured.
    pub fn current_session(&mut self) -> Option<Session> {
        let raw = match self.kv.lock().unwrap().get(&self.session_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("failed to read session: {e}");
                return None;
            }
        };
        let mut session: Session = match serde_json::from_str(&raw) {
            Ok(session) => session,
            Err(e) => {
                warn!("stored session is corrupt, clearing: {e}");
                self.logout();
                return None;
            }
        };

        if !session.is_valid() {
            info!("session for {} expired", session.username);
            self.logout();
            return None;
        }

        if self.extend_on_activity {
            session.touch(self.session_timeout);
            if let Err(e) = self.write_session(&session) {
                warn!("failed to extend session: {e}");
            }
        }
        Some(session)
    }

    /// Clear the stored session unconditionally
    pub fn logout(&mut self) {
        if let Err(e) = self.kv.lock().unwrap().remove(&self.session_key) {
            warn!("failed to clear session: {e}");
        }
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    fn require_admin(&self, actor: &Session) -> Result<()> {
        if actor.is_admin() {
            Ok(())
        } else {
            Err(Error::Unauthorized(format!(
                "{} is not an admin",
                actor.username
            )))
        }
    }

    fn check_password(&self, password: &str) -> Result<()> {
        if password.len() < self.min_password_length {
            return Err(Error::Validation(format!(
                "password must be at least {} characters",
                self.min_password_length
            )));
        }
        Ok(())
    }

    fn read_local_custom(&self) -> CustomUsers {
        match self.kv.lock().unwrap().get(&self.users_key) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("local user directory is corrupt, ignoring: {e}");
                CustomUsers::default()
            }),
            Ok(None) => CustomUsers::default(),
            Err(e) => {
                warn!("failed to read local user directory: {e}");
                CustomUsers::default()
            }
        }
    }

    fn write_local_custom(&self, custom: &CustomUsers) {
        match serde_json::to_string(custom) {
            Ok(raw) => {
                if let Err(e) = self.kv.lock().unwrap().set(&self.users_key, &raw) {
                    warn!("failed to write local user directory: {e}");
                }
            }
            Err(e) => warn!("failed to encode user directory: {e}"),
        }
    }

    /// Persist the custom slice locally (mandatory) and remotely with a
    /// fixed retry budget (advisory).
    async fn save_directory(&mut self) -> Result<()> {
        let custom = self.directory.custom_users();
        let raw = serde_json::to_string(&custom)?;
        self.kv.lock().unwrap().set(&self.users_key, &raw)?;

        let mut pushed = false;
        for attempt in 1..=self.push_retries {
            if self.remote.push_users(&custom).await {
                pushed = true;
                break;
            }
            warn!("remote directory push failed (attempt {attempt}/{})", self.push_retries);
        }
        if !pushed {
            info!("user directory saved locally only; remote unavailable");
        }
        Ok(())
    }

    fn write_session(&self, session: &Session) -> Result<()> {
        let raw = serde_json::to_string(session)?;
        self.kv.lock().unwrap().set(&self.session_key, &raw)?;
        Ok(())
    }
}
