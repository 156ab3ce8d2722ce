//! Data model types

mod dataset;
mod project;
mod user;

pub use dataset::{Dataset, ExportDocument, DATASET_VERSION};
pub use project::{ChecklistItem, Priority, Project, ProjectInput};
pub use user::{Role, Session, UserRecord, UserSummary};
