//! Complaint document schema
//!
//! One document per filed issue, with the status state machine and the
//! priority/priority_value pairing defined next to the types they govern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::db::schemas::Metadata;

/// Collection name for complaints
pub const COMPLAINT_COLLECTION: &str = "complaints";

/// Complaint lifecycle status
///
/// ```text
/// pending ──> in-progress ──> resolved
/// pending ──> rejected
/// in-progress ──> rejected
/// resolved, rejected: terminal
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    #[default]
    Pending,
    InProgress,
    Resolved,
    Rejected,
}

impl Status {
    /// Whether no further transition is permitted from this status
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Resolved | Status::Rejected)
    }

    /// Whether the edge `self -> to` is a legal transition
    pub fn can_transition(self, to: Status) -> bool {
        matches!(
            (self, to),
            (Status::Pending, Status::InProgress)
                | (Status::Pending, Status::Rejected)
                | (Status::InProgress, Status::Resolved)
                | (Status::InProgress, Status::Rejected)
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Pending => write!(f, "pending"),
            Status::InProgress => write!(f, "in-progress"),
            Status::Resolved => write!(f, "resolved"),
            Status::Rejected => write!(f, "rejected"),
        }
    }
}

/// Complaint priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Numeric rank kept in lock-step with the variant. `priority_value`
    /// on the document is always recomputed through this function, never
    /// set independently.
    pub fn value(self) -> u8 {
        match self {
            Priority::Low => 0,
            Priority::Medium => 1,
            Priority::High => 2,
        }
    }
}

/// Resolution recorded on entry to `Resolved`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    /// Admin-supplied resolution text
    pub text: String,
    /// Principal id of the resolving admin
    pub by: String,
    /// When the complaint was resolved
    pub date: DateTime<Utc>,
}

/// Append-only comment entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub text: String,
    /// Principal id of the commenter
    pub user: String,
    /// Server-side timestamp
    pub created_at: DateTime<Utc>,
}

/// Append-only share-history entry (not count-bearing)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Share {
    /// Channel the complaint was shared on
    pub channel: String,
    pub shared_at: DateTime<Utc>,
}

/// Best-effort AI categorization result stored on the complaint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrichment {
    /// Suggested category label
    pub category: String,
    /// Free-text suggestion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Confidence in [0, 1]; 0 for the neutral fallback
    pub confidence: f64,
}

impl Enrichment {
    /// Neutral fallback used when enrichment times out or errors
    pub fn fallback() -> Self {
        Self {
            category: "uncategorized".to_string(),
            suggestion: None,
            confidence: 0.0,
        }
    }
}

/// Complaint document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplaintDoc {
    /// Document id (immutable)
    pub id: Uuid,

    /// Owning principal id (the filer, immutable)
    pub user: String,

    pub title: String,
    pub description: String,

    /// Taxonomy references; immutable after creation in the current
    /// surface except through the paired re-categorize patch
    pub category: Uuid,
    pub sub_category: Uuid,

    pub status: Status,

    pub priority: Priority,

    /// Derived rank, always `priority.value()`
    pub priority_value: u8,

    /// External attachment URLs (opaque)
    #[serde(default)]
    pub attachments: Vec<String>,

    /// Set only on transition into `Resolved`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,

    /// Append-only comment list
    #[serde(default)]
    pub comments: Vec<Comment>,

    /// Append-only share history
    #[serde(default)]
    pub shared_on: Vec<Share>,

    /// Best-effort categorization suggestion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<Enrichment>,

    /// Common metadata (created_at, updated_at)
    #[serde(default)]
    pub metadata: Metadata,
}

impl ComplaintDoc {
    /// Create a new pending complaint
    pub fn new(
        user: String,
        title: String,
        description: String,
        category: Uuid,
        sub_category: Uuid,
        priority: Priority,
        attachments: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user,
            title,
            description,
            category,
            sub_category,
            status: Status::Pending,
            priority,
            priority_value: priority.value(),
            attachments,
            resolution: None,
            comments: Vec::new(),
            shared_on: Vec::new(),
            suggestion: None,
            metadata: Metadata::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        assert!(Status::Pending.can_transition(Status::InProgress));
        assert!(Status::Pending.can_transition(Status::Rejected));
        assert!(Status::InProgress.can_transition(Status::Resolved));
        assert!(Status::InProgress.can_transition(Status::Rejected));
    }

    #[test]
    fn test_terminal_states_have_no_edges() {
        for from in [Status::Resolved, Status::Rejected] {
            assert!(from.is_terminal());
            for to in [
                Status::Pending,
                Status::InProgress,
                Status::Resolved,
                Status::Rejected,
            ] {
                assert!(!from.can_transition(to));
            }
        }
    }

    #[test]
    fn test_pending_cannot_skip_to_resolved() {
        assert!(!Status::Pending.can_transition(Status::Resolved));
    }

    #[test]
    fn test_priority_value_lock_step() {
        assert_eq!(Priority::Low.value(), 0);
        assert_eq!(Priority::Medium.value(), 1);
        assert_eq!(Priority::High.value(), 2);
    }

    #[test]
    fn test_status_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&Status::InProgress).unwrap(),
            "\"in-progress\""
        );
    }
}
