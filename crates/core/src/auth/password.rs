//! Password digests
//!
//! Two schemes coexist. New and updated passwords always get the salted
//! SHA-256 scheme; the legacy unsalted digest is accepted for verification
//! only, and a successful legacy login is immediately re-hashed by the
//! credential manager.

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::models::UserRecord;

/// Minimum salt length in bytes
pub const SALT_LEN: usize = 16;

pub fn generate_salt() -> Vec<u8> {
    let mut salt = vec![0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Hex SHA-256 over password bytes followed by the salt.
///
/// The salt is folded in as the concatenated decimal rendering of its
/// bytes, not the raw bytes; stored user documents already carry digests
/// in this form and must keep verifying.
pub fn salted_hash(password: &str, salt: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    for byte in salt {
        hasher.update(byte.to_string().as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// The first-generation digest, kept bit-compatible with stored hashes.
///
/// Per UTF-16 unit: the accumulator is coerced to 32 bits for the shift
/// while the subtraction and addition stay exact, then the absolute value
/// is rendered in base 36.
pub fn legacy_hash(password: &str) -> String {
    let mut acc: i64 = 0;
    for unit in password.encode_utf16() {
        let shifted = (acc as i32).wrapping_shl(5) as i64;
        acc = shifted - acc + i64::from(unit);
    }
    to_base36(acc.unsigned_abs())
}

/// True if the password matches the record under whichever scheme the
/// record carries
pub fn verify(password: &str, record: &UserRecord) -> bool {
    match &record.salt {
        Some(salt) => salted_hash(password, salt) == record.hash,
        None => legacy_hash(password) == record.hash,
    }
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ASCII")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn record(hash: &str, salt: Option<Vec<u8>>) -> UserRecord {
        UserRecord {
            hash: hash.to_string(),
            salt,
            display_name: "Test".to_string(),
            role: Role::Editor,
            channels: Vec::new(),
            active: true,
            is_default: false,
            created: None,
            last_modified: None,
            last_login: None,
        }
    }

    #[test]
    fn test_legacy_hash_known_vectors() {
        // Digests shipped with the bootstrap accounts
        assert_eq!(legacy_hash("admin123"), "2f24jul");
        assert_eq!(legacy_hash("mia123"), "hrpveb");
        assert_eq!(legacy_hash("leo123"), "iapqck");
        assert_eq!(legacy_hash("kai123"), "iu2d1d");
    }

    #[test]
    fn test_legacy_hash_empty_password() {
        assert_eq!(legacy_hash(""), "0");
    }

    #[test]
    fn test_salted_hash_verifies() {
        let salt = generate_salt();
        assert_eq!(salt.len(), SALT_LEN);

        let stored = record(&salted_hash("secret1", &salt), Some(salt));
        assert!(verify("secret1", &stored));
        assert!(!verify("secret2", &stored));
    }

    #[test]
    fn test_legacy_record_verifies_without_salt() {
        let stored = record("hrpveb", None);
        assert!(verify("mia123", &stored));
        assert!(!verify("mia124", &stored));
    }

    #[test]
    fn test_salts_are_unique() {
        assert_ne!(generate_salt(), generate_salt());
    }

    #[test]
    fn test_salt_digested_as_decimal_text() {
        // The decimal rendering concatenates without separators, so these
        // two salts feed the hasher identical text. Raw-byte hashing would
        // tell them apart; the stored digest form must not.
        assert_eq!(salted_hash("secret1", &[1, 2]), salted_hash("secret1", &[12]));
        assert_ne!(salted_hash("secret1", &[1, 2]), salted_hash("secret1", &[2, 1]));
    }
}
