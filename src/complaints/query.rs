//! List-query types for complaints
//!
//! Filtering, sorting, and pagination for the complaint list surface.
//! Visibility scoping (admin sees all, user sees own) is applied by the
//! store before these filters run.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::schemas::{ComplaintDoc, Priority, Status};

/// Filter for complaint listing; all fields are conjunctive
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplaintFilter {
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub category: Option<Uuid>,
    /// Case-insensitive substring match on title and description
    pub search: Option<String>,
}

impl ComplaintFilter {
    pub fn matches(&self, doc: &ComplaintDoc) -> bool {
        if let Some(status) = self.status {
            if doc.status != status {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if doc.priority != priority {
                return false;
            }
        }
        if let Some(category) = self.category {
            if doc.category != category {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            if !doc.title.to_lowercase().contains(&needle)
                && !doc.description.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }
}

/// Sort order for complaint listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    PriorityHigh,
    PriorityLow,
    Status,
}

impl SortOrder {
    pub fn sort(self, docs: &mut [ComplaintDoc]) {
        match self {
            SortOrder::Newest => {
                docs.sort_by(|a, b| b.metadata.created_at.cmp(&a.metadata.created_at));
            }
            SortOrder::Oldest => {
                docs.sort_by(|a, b| a.metadata.created_at.cmp(&b.metadata.created_at));
            }
            SortOrder::PriorityHigh => {
                docs.sort_by(|a, b| {
                    b.priority_value
                        .cmp(&a.priority_value)
                        .then_with(|| b.metadata.created_at.cmp(&a.metadata.created_at))
                });
            }
            SortOrder::PriorityLow => {
                docs.sort_by(|a, b| {
                    a.priority_value
                        .cmp(&b.priority_value)
                        .then_with(|| b.metadata.created_at.cmp(&a.metadata.created_at))
                });
            }
            SortOrder::Status => {
                docs.sort_by(|a, b| {
                    status_rank(a.status)
                        .cmp(&status_rank(b.status))
                        .then_with(|| b.metadata.created_at.cmp(&a.metadata.created_at))
                });
            }
        }
    }
}

/// Lifecycle order: open work first, terminal states last
fn status_rank(status: Status) -> u8 {
    match status {
        Status::Pending => 0,
        Status::InProgress => 1,
        Status::Resolved => 2,
        Status::Rejected => 3,
    }
}

/// Pagination request (1-based page index)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub per_page: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

/// One page of results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: usize,
    pub per_page: usize,
}

impl<T> Page<T> {
    /// Slice a fully sorted result set down to the requested page
    pub fn paginate(mut items: Vec<T>, request: PageRequest) -> Self {
        let total = items.len() as u64;
        let page = request.page.max(1);
        let per_page = request.per_page.max(1);
        let start = (page - 1).saturating_mul(per_page);

        let items = if start >= items.len() {
            Vec::new()
        } else {
            items.drain(start..).take(per_page).collect()
        };

        Self {
            items,
            total,
            page,
            per_page,
        }
    }
}
