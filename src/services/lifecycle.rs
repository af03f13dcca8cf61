//! Complaint lifecycle orchestration
//!
//! Sequences store calls and collaborator calls around each operation:
//! validate -> complaint store write -> reconcile -> best-effort
//! enrichment -> best-effort notification.
//!
//! Error policy per operation class:
//! - validation/authorization errors surface synchronously, no retry
//! - reconciliation failures are retried with bounded backoff; on final
//!   failure the primary operation still succeeds and the triple is queued
//!   for deferred re-reconciliation (counters are a derived view, not the
//!   source of truth)
//! - enrichment and notification failures are logged and swallowed; only a
//!   failed upload of a required attachment is fatal to creation

use dashmap::DashMap;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::{is_allowed, requires_verified, Operation, Principal};
use crate::complaints::{
    ComplaintDoc, ComplaintFilter, ComplaintPatch, ComplaintSpec, ComplaintStore, Page,
    PageRequest, Priority, SortOrder, Status,
};
use crate::db::schemas::{CategoryDoc, Enrichment};
use crate::reconcile::{AggregateReconciler, CountTriple};
use crate::services::{Enricher, EventKind, Notifier, Uploader};
use crate::taxonomy::{CategoryPatch, CategorySpec, SubCategorySpec, TaxonomyStore};
use crate::types::{RedressError, Result};

// ============================================================================
// Configuration and inputs
// ============================================================================

/// Lifecycle orchestration configuration
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Reconciliation attempts before deferring (default: 3)
    pub reconcile_attempts: u32,
    /// Backoff between reconciliation attempts (default: 50ms)
    pub reconcile_backoff: Duration,
    /// Budget for the enrichment call (default: 2s)
    pub enrichment_timeout: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            reconcile_attempts: 3,
            reconcile_backoff: Duration::from_millis(50),
            enrichment_timeout: Duration::from_secs(2),
        }
    }
}

/// A raw attachment to upload during filing
#[derive(Debug, Clone)]
pub struct AttachmentUpload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Validated complaint intent from the caller
#[derive(Debug, Clone)]
pub struct NewComplaint {
    pub title: String,
    pub description: String,
    pub category: Uuid,
    pub sub_category: Uuid,
    pub priority: Option<Priority>,
    /// Required attachments; any upload failure aborts creation
    pub attachments: Vec<AttachmentUpload>,
}

// ============================================================================
// Lifecycle service
// ============================================================================

/// Request-level orchestration over stores, reconciler, and collaborators
pub struct ComplaintService {
    complaints: Arc<ComplaintStore>,
    taxonomy: Arc<TaxonomyStore>,
    reconciler: AggregateReconciler,
    uploader: Arc<dyn Uploader>,
    notifier: Arc<dyn Notifier>,
    enricher: Arc<dyn Enricher>,
    /// Triples whose reconciliation exhausted its retry budget, awaiting
    /// out-of-band repair. Keyed by triple so repeated failures dedup.
    deferred: DashMap<CountTriple, ()>,
    config: LifecycleConfig,
}

impl ComplaintService {
    pub fn new(
        complaints: Arc<ComplaintStore>,
        taxonomy: Arc<TaxonomyStore>,
        uploader: Arc<dyn Uploader>,
        notifier: Arc<dyn Notifier>,
        enricher: Arc<dyn Enricher>,
        config: LifecycleConfig,
    ) -> Self {
        let reconciler = AggregateReconciler::new(Arc::clone(&complaints), Arc::clone(&taxonomy));
        Self {
            complaints,
            taxonomy,
            reconciler,
            uploader,
            notifier,
            enricher,
            deferred: DashMap::new(),
            config,
        }
    }

    // ------------------------------------------------------------------
    // Complaint operations
    // ------------------------------------------------------------------

    /// File a complaint.
    ///
    /// Requires a verified principal. Validates the taxonomy references,
    /// uploads required attachments (fatal on failure), creates the
    /// complaint, reconciles counters, then runs best-effort enrichment
    /// and notification.
    pub async fn file_complaint(
        &self,
        principal: &Principal,
        intent: NewComplaint,
    ) -> Result<ComplaintDoc> {
        if requires_verified(Operation::CreateComplaint) && !principal.is_verified {
            return Err(RedressError::Forbidden(
                "a verified account is required to file a complaint".to_string(),
            ));
        }
        if !is_allowed(Operation::CreateComplaint, principal.role, false) {
            return Err(RedressError::Forbidden(
                "not permitted to file complaints".to_string(),
            ));
        }
        self.validate_taxonomy_ref(intent.category, intent.sub_category)
            .await?;

        let mut urls = Vec::with_capacity(intent.attachments.len());
        for attachment in &intent.attachments {
            let url = self
                .uploader
                .upload(&attachment.bytes, &attachment.content_type)
                .await
                .map_err(|e| RedressError::UploadFailed(e.to_string()))?;
            urls.push(url);
        }

        let mut complaint = self
            .complaints
            .create(
                &principal.id,
                ComplaintSpec {
                    title: intent.title,
                    description: intent.description,
                    category: intent.category,
                    sub_category: intent.sub_category,
                    priority: intent.priority,
                    attachments: urls,
                },
            )
            .await?;

        self.reconcile_or_defer(CountTriple::of(&complaint)).await;

        let suggestion = self.enrich_with_timeout(&complaint).await;
        if let Err(e) = self
            .complaints
            .attach_suggestion(complaint.id, suggestion.clone())
            .await
        {
            warn!(complaint = %complaint.id, error = %e, "failed to store enrichment suggestion");
        } else {
            complaint.suggestion = Some(suggestion);
        }

        self.notify_best_effort(
            EventKind::Created,
            json!({
                "complaint": complaint.id,
                "user": complaint.user,
                "category": complaint.category,
                "subCategory": complaint.sub_category,
            }),
        )
        .await;

        Ok(complaint)
    }

    /// Fetch one complaint, ownership-scoped.
    pub async fn get_complaint(&self, principal: &Principal, id: Uuid) -> Result<ComplaintDoc> {
        self.complaints.find_by_id(id, principal).await
    }

    /// Filtered, sorted, paginated listing.
    pub async fn list_complaints(
        &self,
        principal: &Principal,
        filter: &ComplaintFilter,
        sort: SortOrder,
        page: PageRequest,
    ) -> Page<ComplaintDoc> {
        self.complaints.list(principal, filter, sort, page).await
    }

    /// Apply a filer patch. A re-categorization reconciles both the old
    /// and the new triple as one logical pass (debit, then credit).
    pub async fn update_complaint(
        &self,
        principal: &Principal,
        id: Uuid,
        patch: ComplaintPatch,
    ) -> Result<ComplaintDoc> {
        let before = self.complaints.find_by_id(id, principal).await?;

        if let Some((category, sub_category)) = patch.recategorize {
            self.validate_taxonomy_ref(category, sub_category).await?;
        }

        let updated = self.complaints.update(id, principal, patch).await?;

        let old_triple = CountTriple::of(&before);
        let new_triple = CountTriple::of(&updated);
        if old_triple != new_triple {
            self.reconcile_or_defer(old_triple).await;
            self.reconcile_or_defer(new_triple).await;
        }
        Ok(updated)
    }

    /// Advance the status state machine (admin only) and notify.
    pub async fn transition_status(
        &self,
        principal: &Principal,
        id: Uuid,
        new_status: Status,
        resolution_text: Option<String>,
    ) -> Result<ComplaintDoc> {
        let updated = self
            .complaints
            .transition_status(id, principal, new_status, resolution_text)
            .await?;

        self.notify_best_effort(
            EventKind::StatusChanged,
            json!({
                "complaint": updated.id,
                "user": updated.user,
                "status": updated.status,
            }),
        )
        .await;
        Ok(updated)
    }

    /// Append an owner comment and notify.
    pub async fn add_comment(
        &self,
        principal: &Principal,
        id: Uuid,
        text: String,
    ) -> Result<ComplaintDoc> {
        let updated = self.complaints.append_comment(id, principal, text).await?;

        self.notify_best_effort(
            EventKind::NewComment,
            json!({
                "complaint": updated.id,
                "user": updated.user,
                "comments": updated.comments.len(),
            }),
        )
        .await;
        Ok(updated)
    }

    /// Record a share and notify.
    pub async fn share(
        &self,
        principal: &Principal,
        id: Uuid,
        channel: String,
    ) -> Result<ComplaintDoc> {
        let updated = self.complaints.record_share(id, principal, channel).await?;

        self.notify_best_effort(
            EventKind::Shared,
            json!({
                "complaint": updated.id,
                "user": updated.user,
            }),
        )
        .await;
        Ok(updated)
    }

    /// Hard-delete an owned complaint, then reconcile its triple so the
    /// counters reflect the removal.
    pub async fn delete_complaint(&self, principal: &Principal, id: Uuid) -> Result<()> {
        let removed = self.complaints.delete(id, principal).await?;
        self.reconcile_or_defer(CountTriple::of(&removed)).await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Taxonomy operations (admin-gated writes, open reads)
    // ------------------------------------------------------------------

    pub async fn create_category(
        &self,
        principal: &Principal,
        spec: CategorySpec,
    ) -> Result<CategoryDoc> {
        self.require_taxonomy_write(principal)?;
        self.taxonomy.create_category(spec).await
    }

    pub async fn update_category(
        &self,
        principal: &Principal,
        id: Uuid,
        patch: CategoryPatch,
    ) -> Result<CategoryDoc> {
        self.require_taxonomy_write(principal)?;
        self.taxonomy.update_category(id, patch).await
    }

    pub async fn add_sub_category(
        &self,
        principal: &Principal,
        category_id: Uuid,
        spec: SubCategorySpec,
    ) -> Result<CategoryDoc> {
        self.require_taxonomy_write(principal)?;
        self.taxonomy.add_sub_category(category_id, spec).await
    }

    pub async fn delete_category(&self, principal: &Principal, id: Uuid) -> Result<()> {
        self.require_taxonomy_write(principal)?;
        self.taxonomy.delete_category(id).await
    }

    pub async fn delete_sub_category(
        &self,
        principal: &Principal,
        category_id: Uuid,
        sub_id: Uuid,
    ) -> Result<()> {
        self.require_taxonomy_write(principal)?;
        self.taxonomy.delete_sub_category(category_id, sub_id).await
    }

    pub async fn toggle_frequently_used(&self, principal: &Principal, id: Uuid) -> Result<bool> {
        self.require_taxonomy_write(principal)?;
        self.taxonomy.toggle_frequently_used(id).await
    }

    pub async fn get_category(&self, id: Uuid) -> Result<CategoryDoc> {
        self.taxonomy.get(id).await
    }

    pub async fn list_categories(&self) -> Vec<CategoryDoc> {
        self.taxonomy.list().await
    }

    // ------------------------------------------------------------------
    // Deferred reconciliation
    // ------------------------------------------------------------------

    /// Re-run every deferred reconciliation. Safe to call any number of
    /// times (reconciliation is idempotent). Returns how many triples were
    /// repaired; transient failures stay queued, triples whose taxonomy
    /// target no longer exists are dropped.
    pub async fn run_deferred_reconciliations(&self) -> usize {
        let pending: Vec<CountTriple> = self
            .deferred
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        let mut repaired = 0;
        for triple in pending {
            match self.reconciler.reconcile(&triple).await {
                Ok(_) => {
                    self.deferred.remove(&triple);
                    repaired += 1;
                }
                // The category (or subcategory) was deleted after the
                // triple was queued; re-running can never succeed.
                Err(e @ RedressError::NotFound(_)) => {
                    error!(
                        category = %triple.category,
                        subcategory = %triple.sub_category,
                        error = %e,
                        "deferred reconciliation target missing, dropping"
                    );
                    self.deferred.remove(&triple);
                }
                Err(e) => {
                    warn!(
                        category = %triple.category,
                        error = %e,
                        "deferred reconciliation still failing"
                    );
                }
            }
        }
        if repaired > 0 {
            info!(repaired, "deferred reconciliations repaired");
        }
        repaired
    }

    /// Number of triples awaiting out-of-band repair.
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn require_taxonomy_write(&self, principal: &Principal) -> Result<()> {
        if !is_allowed(Operation::TaxonomyWrite, principal.role, false) {
            return Err(RedressError::Forbidden(
                "taxonomy writes require the admin role".to_string(),
            ));
        }
        Ok(())
    }

    /// The category/subcategory a complaint references must exist.
    async fn validate_taxonomy_ref(&self, category: Uuid, sub_category: Uuid) -> Result<()> {
        let cat = self
            .taxonomy
            .get(category)
            .await
            .map_err(|_| RedressError::Validation(format!("unknown category {category}")))?;
        if cat.sub_category(sub_category).is_none() {
            return Err(RedressError::Validation(format!(
                "unknown subcategory {sub_category} in category '{}'",
                cat.name
            )));
        }
        Ok(())
    }

    /// Bounded reconciliation retry; queues the triple for out-of-band
    /// repair on exhaustion. `NotFound` is not retried: the taxonomy row
    /// is gone and re-running cannot help.
    async fn reconcile_or_defer(&self, triple: CountTriple) {
        for attempt in 1..=self.config.reconcile_attempts {
            match self.reconciler.reconcile(&triple).await {
                Ok(_) => return,
                Err(e @ RedressError::NotFound(_)) => {
                    error!(
                        category = %triple.category,
                        subcategory = %triple.sub_category,
                        error = %e,
                        "reconciliation target missing, giving up"
                    );
                    return;
                }
                Err(e) => {
                    warn!(
                        category = %triple.category,
                        attempt,
                        error = %e,
                        "reconciliation attempt failed"
                    );
                    if attempt < self.config.reconcile_attempts {
                        tokio::time::sleep(self.config.reconcile_backoff * attempt).await;
                    }
                }
            }
        }

        warn!(
            category = %triple.category,
            subcategory = %triple.sub_category,
            user = %triple.user,
            "reconciliation deferred for out-of-band repair"
        );
        self.deferred.insert(triple, ());
    }

    async fn enrich_with_timeout(&self, complaint: &ComplaintDoc) -> Enrichment {
        match tokio::time::timeout(
            self.config.enrichment_timeout,
            self.enricher.enrich(&complaint.title, &complaint.description),
        )
        .await
        {
            Ok(Ok(enrichment)) => enrichment,
            Ok(Err(e)) => {
                warn!(complaint = %complaint.id, error = %e, "enrichment failed, using fallback");
                Enrichment::fallback()
            }
            Err(_) => {
                warn!(complaint = %complaint.id, "enrichment timed out, using fallback");
                Enrichment::fallback()
            }
        }
    }

    async fn notify_best_effort(&self, event: EventKind, payload: serde_json::Value) {
        if let Err(e) = self.notifier.notify(event, payload).await {
            warn!(event = %event, error = %e, "notification failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{InMemoryUploader, NoopEnricher, TracingNotifier};
    use crate::taxonomy::{CategorySpec, SubCategorySpec};

    fn service() -> ComplaintService {
        ComplaintService::new(
            Arc::new(ComplaintStore::new()),
            Arc::new(TaxonomyStore::new()),
            Arc::new(InMemoryUploader::new()),
            Arc::new(TracingNotifier),
            Arc::new(NoopEnricher),
            LifecycleConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_deferred_drain_drops_triples_for_deleted_taxonomy() {
        let svc = service();

        // A queued triple whose category never existed (or was deleted
        // after draining to zero) can never be repaired.
        svc.deferred.insert(
            CountTriple {
                category: Uuid::new_v4(),
                sub_category: Uuid::new_v4(),
                user: "alice".to_string(),
            },
            (),
        );

        let repaired = svc.run_deferred_reconciliations().await;
        assert_eq!(repaired, 0);
        assert_eq!(svc.deferred_len(), 0);

        // A second drain has nothing to retry
        assert_eq!(svc.run_deferred_reconciliations().await, 0);
    }

    #[tokio::test]
    async fn test_deferred_drain_repairs_live_triples() {
        let svc = service();
        let cat = svc
            .taxonomy
            .create_category(CategorySpec {
                name: "Billing".to_string(),
                icon: None,
                description: None,
            })
            .await
            .unwrap();
        let cat = svc
            .taxonomy
            .add_sub_category(
                cat.id,
                SubCategorySpec {
                    name: "Refund".to_string(),
                },
            )
            .await
            .unwrap();
        let sub_id = cat.sub_categories[0].id;

        svc.deferred.insert(
            CountTriple {
                category: cat.id,
                sub_category: sub_id,
                user: "alice".to_string(),
            },
            (),
        );

        assert_eq!(svc.run_deferred_reconciliations().await, 1);
        assert_eq!(svc.deferred_len(), 0);
        assert_eq!(
            svc.taxonomy.get(cat.id).await.unwrap().user_count("alice"),
            Some(0)
        );
    }
}
