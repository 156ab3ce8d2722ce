//! Remote synchronization seam
//!
//! The credential manager and the reconciliation loop talk to the remote
//! document store only through this trait, so the transport (serverless
//! proxy, public JSON blob, none at all) is selected by configuration.
//! Every operation is advisory: a pull that fails yields `None`, a push
//! that fails yields `false`, and neither ever blocks the corresponding
//! local operation.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::models::{Dataset, UserRecord};

/// Custom (non-default) directory entries, keyed by lowercase username
pub type CustomUsers = HashMap<String, UserRecord>;

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Best-effort fetch of the remote user directory
    async fn pull_users(&self) -> Option<CustomUsers>;

    /// Best-effort full replacement of the remote user directory;
    /// true if at least one endpoint accepted the write
    async fn push_users(&self, users: &CustomUsers) -> bool;

    /// Best-effort fetch of the remote dataset
    async fn pull_dataset(&self) -> Option<Dataset>;

    /// Best-effort full replacement of the remote dataset
    async fn push_dataset(&self, dataset: &Dataset) -> bool;
}

/// Remote store used when cloud sync is disabled
pub struct NullRemote;

#[async_trait]
impl RemoteStore for NullRemote {
    async fn pull_users(&self) -> Option<CustomUsers> {
        None
    }

    async fn push_users(&self, _users: &CustomUsers) -> bool {
        false
    }

    async fn pull_dataset(&self) -> Option<Dataset> {
        None
    }

    async fn push_dataset(&self, _dataset: &Dataset) -> bool {
        false
    }
}
