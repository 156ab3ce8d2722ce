//! Authentication: user directory, password verification, session lifecycle

mod directory;
mod manager;
mod password;

pub use directory::{default_users, merge_custom, Directory, BOOTSTRAP_ADMIN};
pub use manager::{CredentialManager, NewUser, UserUpdate};
pub use password::{generate_salt, legacy_hash, salted_hash, verify, SALT_LEN};
