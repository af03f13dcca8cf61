//! Category document schema
//!
//! The category is the aggregate root: it exclusively owns its embedded
//! subcategory list and the per-user count entries, so every counter
//! update is one single-document write. Counter fields are maintained by
//! the reconciler; nothing else writes them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::schemas::Metadata;

/// Collection name for categories
pub const CATEGORY_COLLECTION: &str = "categories";

/// Subcategory embedded in exactly one category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubCategory {
    pub id: Uuid,

    /// Unique within the owning category
    pub name: String,

    /// Count of live complaints referencing this (category, subcategory)
    /// pair; maintained by recount, never by blind increment
    #[serde(default)]
    pub total_complaints: u64,
}

impl SubCategory {
    pub fn new(name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            total_complaints: 0,
        }
    }
}

/// Per-filer complaint count under one category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCount {
    /// Principal id of the filer
    pub user: String,
    /// Count of live complaints by this filer under this category
    pub count: u64,
}

/// Category document (aggregate root)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryDoc {
    pub id: Uuid,

    /// Unique across all categories (case-sensitive)
    pub name: String,

    /// Opaque display metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Manual dashboard flag, independent of counts
    #[serde(default)]
    pub is_frequently_used: bool,

    /// Always equals the sum of subcategory totals
    #[serde(default)]
    pub total_complaints: u64,

    /// Embedded subcategories (exclusive ownership)
    #[serde(default)]
    pub sub_categories: Vec<SubCategory>,

    /// One entry per distinct filer who has filed under this category
    #[serde(default)]
    pub user_counts: Vec<UserCount>,

    /// Common metadata (created_at, updated_at)
    #[serde(default)]
    pub metadata: Metadata,
}

impl CategoryDoc {
    pub fn new(name: String, icon: Option<String>, description: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            icon,
            description,
            is_frequently_used: false,
            total_complaints: 0,
            sub_categories: Vec::new(),
            user_counts: Vec::new(),
            metadata: Metadata::new(),
        }
    }

    pub fn sub_category(&self, id: Uuid) -> Option<&SubCategory> {
        self.sub_categories.iter().find(|s| s.id == id)
    }

    pub fn user_count(&self, user: &str) -> Option<u64> {
        self.user_counts
            .iter()
            .find(|u| u.user == user)
            .map(|u| u.count)
    }

    /// Recompute the category total from the subcategory totals held on
    /// this document. Called after any subcategory count changes, within
    /// the same write.
    pub fn recompute_total(&mut self) {
        self.total_complaints = self.sub_categories.iter().map(|s| s.total_complaints).sum();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recompute_total_sums_subcategories() {
        let mut cat = CategoryDoc::new("Billing".to_string(), None, None);
        cat.sub_categories.push(SubCategory {
            id: Uuid::new_v4(),
            name: "Refund".to_string(),
            total_complaints: 3,
        });
        cat.sub_categories.push(SubCategory {
            id: Uuid::new_v4(),
            name: "Overcharge".to_string(),
            total_complaints: 2,
        });

        cat.recompute_total();
        assert_eq!(cat.total_complaints, 5);
    }

    #[test]
    fn test_user_count_lookup() {
        let mut cat = CategoryDoc::new("Billing".to_string(), None, None);
        cat.user_counts.push(UserCount {
            user: "alice".to_string(),
            count: 3,
        });

        assert_eq!(cat.user_count("alice"), Some(3));
        assert_eq!(cat.user_count("bob"), None);
    }
}
