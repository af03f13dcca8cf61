//! Common metadata for all documents
//!
//! Tracks creation and update timestamps. Deletion is hard (no tombstone),
//! so there is no deleted flag here; counters stay correct because the
//! reconciler recounts live documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Common metadata for all documents
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Metadata {
    /// When the document was created (immutable)
    pub created_at: DateTime<Utc>,

    /// When the document was last updated
    pub updated_at: DateTime<Utc>,
}

impl Metadata {
    /// Create new metadata with the current timestamp
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump the update timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}
