//! Cutboard Network Library
//!
//! HTTP remote synchronization for the Cutboard tracker. Implements the
//! core `RemoteStore` trait against one or more configured JSON document
//! endpoints, with bounded timeouts and best-effort semantics: every
//! failure is logged and degraded, never propagated.

pub mod client;
pub mod error;

pub use client::HttpRemote;
pub use error::{Error, Result};
