//! Aggregate reconciler
//!
//! Keeps the denormalized counters on the category taxonomy consistent
//! with the complaint store after any mutation that changes a complaint's
//! (category, subcategory, user) membership: creation, deletion, or a
//! paired re-categorization.
//!
//! Reconciliation is recount-based and therefore idempotent: the affected
//! triple only selects *which* counters to recompute, never by how much to
//! move them. Running the same reconciliation twice, or re-running one
//! that was abandoned mid-flight, lands on the same final counters. That
//! makes at-least-once delivery safe, which the lifecycle layer relies on
//! for its retry-and-defer handling.

use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::complaints::ComplaintStore;
use crate::db::schemas::CategoryDoc;
use crate::taxonomy::TaxonomyStore;
use crate::types::Result;

/// The (category, subcategory, user) membership a complaint counts against
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CountTriple {
    pub category: Uuid,
    pub sub_category: Uuid,
    pub user: String,
}

impl CountTriple {
    pub fn of(complaint: &crate::db::schemas::ComplaintDoc) -> Self {
        Self {
            category: complaint.category,
            sub_category: complaint.sub_category,
            user: complaint.user.clone(),
        }
    }
}

/// Recomputes taxonomy counters from complaint-store ground truth
pub struct AggregateReconciler {
    complaints: Arc<ComplaintStore>,
    taxonomy: Arc<TaxonomyStore>,
}

impl AggregateReconciler {
    pub fn new(complaints: Arc<ComplaintStore>, taxonomy: Arc<TaxonomyStore>) -> Self {
        Self {
            complaints,
            taxonomy,
        }
    }

    /// Recompute the three counters for one triple and write them as one
    /// category-document update.
    ///
    /// The taxonomy store recounts from the complaint store inside its
    /// optimistic-retry loop, so interleaved reconciliations for different
    /// complaints under the same category converge: whichever write
    /// commits last recounted against the version it replaced.
    pub async fn reconcile(&self, triple: &CountTriple) -> Result<CategoryDoc> {
        debug!(
            category = %triple.category,
            subcategory = %triple.sub_category,
            user = %triple.user,
            "reconciling counters"
        );
        self.taxonomy
            .apply_recount(
                triple.category,
                triple.sub_category,
                &triple.user,
                self.complaints.as_ref(),
            )
            .await
    }
}
