//! Bounded-length label values from unbounded resource names

use sha2::{Digest, Sha256};

/// Maximum length of a Kubernetes label value
const MAX_LABEL_LENGTH: usize = 63;

/// Number of hash characters appended when a name is shortened
const HASH_SUFFIX_LENGTH: usize = 6;

/// Produce a label-safe rendering of `name`.
///
/// Names at or below the 63-character limit pass through unchanged. Longer
/// names keep their first 57 characters and gain a 6-character hex suffix
/// taken from the SHA-256 of the full name, so distinct long names stay
/// distinct and the mapping is deterministic.
pub fn get_valid_name(name: &str) -> String {
    if name.len() <= MAX_LABEL_LENGTH {
        return name.to_string();
    }

    let digest = Sha256::digest(name.as_bytes());
    let hex: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();
    format!(
        "{}{}",
        &name[..MAX_LABEL_LENGTH - HASH_SUFFIX_LENGTH],
        &hex[..HASH_SUFFIX_LENGTH]
    )
}
