//! Cutboard Core Library
//!
//! Data model, credential and session management, project board state, and
//! local/remote persistence for the Cutboard tracker.

pub mod auth;
pub mod board;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod kv;
pub mod models;
pub mod store;
pub mod sync;

pub use auth::{CredentialManager, Directory, NewUser, UserUpdate};
pub use board::{visible_projects, Lookup, ProjectBoard};
pub use broadcast::{Broadcast, BroadcastChannel, BroadcastKind};
pub use config::{Config, Stage};
pub use error::{Error, Result};
pub use kv::{KvStore, LocalStore, MemoryStore};
pub use models::*;
pub use store::{DatasetStore, SharedKv};
pub use sync::{CustomUsers, NullRemote, RemoteStore};
