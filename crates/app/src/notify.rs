//! Renderer and notifier capability seams
//!
//! The tracker never talks to a concrete UI; it calls these traits.
//! The default implementations log through `tracing`, which is all the
//! headless binary needs, and a real front end injects its own.

use cutboard_core::{Dataset, Session};
use tracing::{info, warn};

/// View surface. Implementations redraw from the full state handed to
/// them; nothing is diffed here.
pub trait Renderer: Send + Sync {
    /// Show the unauthenticated view
    fn render_login(&self);

    /// Show the board for an active session
    fn render_board(&self, dataset: &Dataset, session: &Session);

    /// Re-pull the user list in the admin view. Called on directory
    /// broadcasts; project state is untouched.
    fn refresh_admin_view(&self);
}

/// User-facing message sink
pub trait Notifier: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
}

pub struct LogRenderer;

impl Renderer for LogRenderer {
    fn render_login(&self) {
        info!("view: login");
    }

    fn render_board(&self, dataset: &Dataset, session: &Session) {
        info!(
            "view: board for {} ({} projects, {} trashed)",
            session.username,
            dataset.projects.len(),
            dataset.trash.len()
        );
    }

    fn refresh_admin_view(&self) {
        info!("view: admin refresh");
    }
}

pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn info(&self, message: &str) {
        info!("notice: {message}");
    }

    fn warn(&self, message: &str) {
        warn!("notice: {message}");
    }
}
