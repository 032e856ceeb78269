//! Canonical form of job settings.
//!
//! The service does not preserve task order, so settings are put in a
//! canonical order before they are sent and after they are read. Two
//! configurations that differ only in task order normalize to the same
//! value and the same [`fingerprint`].

use jobctl_protocol::JobSettings;
use sha2::{Digest, Sha256};

use crate::error::{JobError, JobResult};

/// Sort tasks by `task_key` (stable, byte-wise lexicographic).
pub fn normalize_in_place(settings: &mut JobSettings) {
    settings.tasks.sort_by(|a, b| a.task_key.cmp(&b.task_key));
}

/// Owned variant of [`normalize_in_place`].
pub fn normalize(mut settings: JobSettings) -> JobSettings {
    normalize_in_place(&mut settings);
    settings
}

/// SHA-256 hex digest of the JCS (RFC 8785) form of the normalized settings.
pub fn fingerprint(settings: &JobSettings) -> JobResult<String> {
    let normalized = normalize(settings.clone());
    let jcs_bytes = serde_json_canonicalizer::to_vec(&normalized)
        .map_err(|e| JobError::InvalidSettings(format!("cannot canonicalize settings: {e}")))?;

    let mut hasher = Sha256::new();
    hasher.update(&jcs_bytes);
    Ok(hex::encode(hasher.finalize()))
}
