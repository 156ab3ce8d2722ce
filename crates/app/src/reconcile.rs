//! Reconciliation loop
//!
//! Periodic tasks that keep the in-memory board, the local store, the
//! remote store and the session in agreement. Each step is a single
//! method so it can be driven directly in tests; `run` just wires the
//! methods to tokio intervals.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use cutboard_core::{BroadcastChannel, BroadcastKind, Dataset};

use crate::context::Tracker;

pub struct ReconcileLoop {
    tracker: Arc<Tracker>,
    broadcast: BroadcastChannel,
    /// Raw broadcast value seen last; change detection is on the raw text
    last_broadcast: Option<String>,
    last_broadcast_check: Option<tokio::time::Instant>,
}

impl ReconcileLoop {
    pub fn new(tracker: Arc<Tracker>) -> Self {
        let broadcast =
            BroadcastChannel::new(tracker.kv(), &tracker.config().storage.broadcast);
        // Whatever is on the channel at startup is old news; only changes
        // from here on trigger a refresh.
        let last_broadcast = broadcast.fetch().map(|(raw, _)| raw);
        Self {
            tracker,
            broadcast,
            last_broadcast,
            last_broadcast_check: None,
        }
    }

    /// Persist the board locally and push it to the remote, best-effort.
    /// Does nothing without an active session.
    pub async fn autosave_once(&self) {
        let Some(session) = self.tracker.session().await else {
            return;
        };
        let dataset = {
            let mut board = self.tracker.board();
            board.persist(&session);
            board.dataset().clone()
        };
        if self.tracker.remote().push_dataset(&dataset).await {
            debug!("autosave pushed to remote");
        }
    }

    /// Adopt the stored dataset if another process saved a newer one.
    /// This is how two signed-in users on one machine see each other's
    /// edits.
    pub async fn check_local_updates_once(&self) {
        let adopted = {
            let mut board = self.tracker.board();
            match board.stored() {
                Some(stored) if is_newer(&stored, board.dataset()) => {
                    info!(
                        "adopting local dataset saved by {}",
                        stored.last_user.as_deref().unwrap_or("unknown")
                    );
                    board.adopt(stored);
                    true
                }
                _ => false,
            }
        };
        if adopted {
            self.rerender().await;
        }
    }

    /// Pull the remote dataset and adopt it when it is strictly newer than
    /// the local one and recent enough to trust. Stale documents (beyond
    /// the recency window) are ignored to keep a long-dead remote or a
    /// skewed clock from clobbering live work.
    pub async fn poll_remote_once(&self) {
        let Some(remote) = self.tracker.remote().pull_dataset().await else {
            return;
        };
        let window = self.tracker.config().sync.recency_window_secs as i64;
        let age = Utc::now()
            .signed_duration_since(remote.last_saved)
            .num_seconds();
        if age > window {
            debug!("ignoring remote dataset ({age}s old, window {window}s)");
            return;
        }

        let adopted = {
            let mut board = self.tracker.board();
            if is_newer(&remote, board.dataset()) {
                info!(
                    "adopting remote dataset saved by {}",
                    remote.last_user.as_deref().unwrap_or("unknown")
                );
                board.adopt(remote);
                true
            } else {
                false
            }
        };
        if adopted {
            self.rerender().await;
        }
    }

    /// Look for a changed directory broadcast. A user-created or
    /// user-updated note refreshes the admin view only; project data is
    /// never touched from here. Throttled so a burst of checks does not
    /// hammer the store.
    pub fn check_broadcast_once(&mut self) {
        let throttle =
            Duration::from_secs(self.tracker.config().sync.broadcast_throttle_secs);
        let now = tokio::time::Instant::now();
        if let Some(last) = self.last_broadcast_check {
            if now.duration_since(last) < throttle {
                return;
            }
        }
        self.last_broadcast_check = Some(now);

        let Some((raw, broadcast)) = self.broadcast.fetch() else {
            return;
        };
        if self.last_broadcast.as_deref() == Some(raw.as_str()) {
            return;
        }
        self.last_broadcast = Some(raw);

        match broadcast.kind {
            BroadcastKind::UserCreated | BroadcastKind::UserUpdated => {
                info!(
                    "directory change: {} {:?}",
                    broadcast.username, broadcast.kind
                );
                self.tracker.renderer().refresh_admin_view();
            }
        }
    }

    /// Force a logout when the stored session has expired out from under
    /// the signed-in state.
    pub async fn sweep_session_once(&self) {
        if self.tracker.signed_in() && self.tracker.session().await.is_none() {
            warn!("session expired, signing out");
            self.tracker
                .notifier()
                .warn("your session expired, please sign in again");
            self.tracker.logout().await;
        }
    }

    /// Drive all steps forever on their configured intervals
    pub async fn run(mut self) {
        let sync = self.tracker.config().sync.clone();
        let mut autosave = tokio::time::interval(Duration::from_secs(sync.auto_save_secs));
        let mut local = tokio::time::interval(Duration::from_secs(sync.local_check_secs));
        let mut remote = tokio::time::interval(Duration::from_secs(sync.remote_poll_secs));
        let mut broadcast =
            tokio::time::interval(Duration::from_secs(sync.broadcast_throttle_secs));
        let mut sweep = tokio::time::interval(Duration::from_secs(sync.session_sweep_secs));

        loop {
            tokio::select! {
                _ = autosave.tick() => self.autosave_once().await,
                _ = local.tick() => self.check_local_updates_once().await,
                _ = remote.tick() => self.poll_remote_once().await,
                _ = broadcast.tick() => self.check_broadcast_once(),
                _ = sweep.tick() => self.sweep_session_once().await,
            }
        }
    }

    async fn rerender(&self) {
        if let Some(session) = self.tracker.session().await {
            let dataset = self.tracker.dataset();
            self.tracker.renderer().render_board(&dataset, &session);
        }
    }
}

/// Strictly-newer comparison with the save id as a guard: an identical
/// save is never re-adopted.
fn is_newer(candidate: &Dataset, current: &Dataset) -> bool {
    candidate.save_id != current.save_id && candidate.last_saved > current.last_saved
}
