//! Application context
//!
//! The `Tracker` is the single explicit owner of everything the app needs:
//! the local store, the credential manager, the project board, the remote
//! client and the injected view collaborators. It is built once at process
//! start from the configuration; there are no ambient globals.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use directories::ProjectDirs;
use tracing::info;

use cutboard_core::{
    Config, CredentialManager, Dataset, DatasetStore, Error, ExportDocument, LocalStore,
    NullRemote, ProjectBoard, RemoteStore, Result, Session, SharedKv,
};
use cutboard_net::HttpRemote;

use crate::notify::{Notifier, Renderer};

pub struct Tracker {
    config: Config,
    kv: SharedKv,
    credentials: tokio::sync::Mutex<CredentialManager>,
    board: Mutex<ProjectBoard>,
    remote: Arc<dyn RemoteStore>,
    renderer: Arc<dyn Renderer>,
    notifier: Arc<dyn Notifier>,
    signed_in: AtomicBool,
}

impl Tracker {
    /// Build the production context: on-disk store in the platform data
    /// directory, HTTP remote when cloud sync is enabled.
    pub fn new(
        config: Config,
        renderer: Arc<dyn Renderer>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let db_path = Self::data_path()?.join("cutboard.db");
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let kv: SharedKv = Arc::new(Mutex::new(LocalStore::open(&db_path)?));

        let remote: Arc<dyn RemoteStore> = if config.sync.cloud_enabled {
            Arc::new(HttpRemote::new(&config.sync).map_err(|e| Error::Config(e.to_string()))?)
        } else {
            info!("cloud sync disabled, running local-only");
            Arc::new(NullRemote)
        };

        Ok(Self::with_store(config, kv, remote, renderer, notifier))
    }

    /// Build a context over caller-supplied store and remote
    pub fn with_store(
        config: Config,
        kv: SharedKv,
        remote: Arc<dyn RemoteStore>,
        renderer: Arc<dyn Renderer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let credentials = CredentialManager::new(kv.clone(), remote.clone(), &config);
        let board = ProjectBoard::new(DatasetStore::new(kv.clone(), &config), &config);
        Self {
            credentials: tokio::sync::Mutex::new(credentials),
            board: Mutex::new(board),
            config,
            kv,
            remote,
            renderer,
            notifier,
            signed_in: AtomicBool::new(false),
        }
    }

    fn data_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "cutboard", "cutboard").ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine data directory",
            ))
        })?;
        Ok(dirs.data_dir().to_path_buf())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn kv(&self) -> SharedKv {
        self.kv.clone()
    }

    pub fn remote(&self) -> Arc<dyn RemoteStore> {
        self.remote.clone()
    }

    pub fn renderer(&self) -> &dyn Renderer {
        self.renderer.as_ref()
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    /// The project board, for synchronous mutation. Never hold the guard
    /// across an await.
    pub fn board(&self) -> MutexGuard<'_, ProjectBoard> {
        self.board.lock().unwrap()
    }

    pub async fn credentials(&self) -> tokio::sync::MutexGuard<'_, CredentialManager> {
        self.credentials.lock().await
    }

    pub fn signed_in(&self) -> bool {
        self.signed_in.load(Ordering::SeqCst)
    }

    /// Authenticate and move to the active state; renders the board on
    /// success.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        let session = self
            .credentials
            .lock()
            .await
            .authenticate(username, password)
            .await?;
        self.signed_in.store(true, Ordering::SeqCst);
        self.renderer
            .render_board(self.board().dataset(), &session);
        self.notifier
            .info(&format!("welcome back, {}", session.display_name));
        Ok(session)
    }

    /// Resume a prior session from storage, if one is still valid
    pub async fn resume(&self) -> Option<Session> {
        let session = self.credentials.lock().await.current_session()?;
        self.signed_in.store(true, Ordering::SeqCst);
        self.renderer
            .render_board(self.board().dataset(), &session);
        Some(session)
    }

    /// The active session, if any. Sliding expiry applies per config.
    pub async fn session(&self) -> Option<Session> {
        self.credentials.lock().await.current_session()
    }

    /// Tear down the session and return to the unauthenticated view
    pub async fn logout(&self) {
        self.credentials.lock().await.logout();
        self.signed_in.store(false, Ordering::SeqCst);
        self.renderer.render_login();
        info!("signed out");
    }

    /// Snapshot the board for download; requires an active session
    pub async fn export(&self) -> Result<ExportDocument> {
        self.require_session().await?;
        Ok(self.board().export())
    }

    /// Replace all board state from a backup document
    pub async fn import(&self, document: ExportDocument) -> Result<()> {
        let session = self.require_session().await?;
        self.board().import(&session, document)?;
        self.renderer
            .render_board(self.board().dataset(), &session);
        Ok(())
    }

    /// Current dataset snapshot
    pub fn dataset(&self) -> Dataset {
        self.board().dataset().clone()
    }

    async fn require_session(&self) -> Result<Session> {
        self.session()
            .await
            .ok_or_else(|| Error::Unauthorized("no active session".into()))
    }
}
