//! Artifact Record - content-addressed prediction files

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Artifact Record represents a file persisted by an experiment.
///
/// The `cas_hash` has the format `sha256:hex_digest` and identifies the exact
/// bytes written, so a later reader can tell whether a file was altered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactRecord {
    experiment_id: String,
    key: String,
    cas_hash: String,
    size_bytes: u64,
    created_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Create a new artifact record.
    ///
    /// # Arguments
    ///
    /// * `experiment_id` - ID of the parent experiment
    /// * `key` - Artifact name (e.g., "predictions_oof")
    /// * `cas_hash` - Content hash (e.g., "sha256:abc123")
    /// * `size_bytes` - Size of the artifact in bytes
    #[must_use]
    pub fn new(
        experiment_id: impl Into<String>,
        key: impl Into<String>,
        cas_hash: impl Into<String>,
        size_bytes: u64,
    ) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            key: key.into(),
            cas_hash: cas_hash.into(),
            size_bytes,
            created_at: Utc::now(),
        }
    }

    /// Create a record by hashing the artifact's bytes.
    #[must_use]
    pub fn from_bytes(experiment_id: impl Into<String>, key: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(experiment_id, key, cas_hash(bytes), bytes.len() as u64)
    }

    /// Get the experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the artifact key/name.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the content-addressable hash.
    #[must_use]
    pub fn cas_hash(&self) -> &str {
        &self.cas_hash
    }

    /// Get the artifact size in bytes.
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether `bytes` match the recorded hash.
    #[must_use]
    pub fn verify(&self, bytes: &[u8]) -> bool {
        self.cas_hash == cas_hash(bytes)
    }
}

/// `sha256:<hex>` of `bytes`.
#[must_use]
pub fn cas_hash(bytes: &[u8]) -> String {
    format!("sha256:{:x}", Sha256::digest(bytes))
}
