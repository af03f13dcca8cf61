//! Complaint store
//!
//! Create/find/update/transition/delete over the complaint collection.
//! Each complaint is independently owned, so no cross-document locking is
//! needed here; the store enforces current-state checks and ownership on
//! every mutation. It also answers the reconciler's ground-truth recount
//! queries.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::{is_allowed, Operation, Principal};
use crate::complaints::query::{ComplaintFilter, Page, PageRequest, SortOrder};
use crate::db::memory::Collection;
use crate::db::schemas::{
    Comment, ComplaintDoc, Priority, Resolution, Share, Status, COMPLAINT_COLLECTION,
};
use crate::taxonomy::GroundTruth;
use crate::types::{RedressError, Result};

/// Minimum accepted title length (characters)
pub const MIN_TITLE_LEN: usize = 5;
/// Minimum accepted description length (characters)
pub const MIN_DESCRIPTION_LEN: usize = 10;

// ============================================================================
// Specs and patches
// ============================================================================

/// Input for filing a complaint
#[derive(Debug, Clone)]
pub struct ComplaintSpec {
    pub title: String,
    pub description: String,
    pub category: Uuid,
    pub sub_category: Uuid,
    /// Defaults to `Medium` when absent
    pub priority: Option<Priority>,
    /// Already-uploaded attachment URLs
    pub attachments: Vec<String>,
}

/// Allow-listed patch the filer may apply while the complaint is open.
///
/// Status, resolution, comments, and counters are not patchable here; they
/// have their own operations. A category change is only accepted as the
/// paired (category, subcategory) move so the reconciler can debit the old
/// triple and credit the new one.
#[derive(Debug, Clone, Default)]
pub struct ComplaintPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub recategorize: Option<(Uuid, Uuid)>,
    pub priority: Option<Priority>,
}

// ============================================================================
// Complaint store
// ============================================================================

/// Store for complaint documents
pub struct ComplaintStore {
    complaints: Collection<ComplaintDoc>,
}

impl ComplaintStore {
    pub fn new() -> Self {
        Self {
            complaints: Collection::new(COMPLAINT_COLLECTION),
        }
    }

    /// File a new complaint for `user`. Starts `Pending` with
    /// `priority_value` computed from the priority.
    pub async fn create(&self, user: &str, spec: ComplaintSpec) -> Result<ComplaintDoc> {
        if spec.title.chars().count() < MIN_TITLE_LEN {
            return Err(RedressError::Validation(format!(
                "title must be at least {MIN_TITLE_LEN} characters"
            )));
        }
        if spec.description.chars().count() < MIN_DESCRIPTION_LEN {
            return Err(RedressError::Validation(format!(
                "description must be at least {MIN_DESCRIPTION_LEN} characters"
            )));
        }

        let doc = ComplaintDoc::new(
            user.to_string(),
            spec.title,
            spec.description,
            spec.category,
            spec.sub_category,
            spec.priority.unwrap_or_default(),
            spec.attachments,
        );
        self.complaints.insert(doc.id, doc.clone()).await;

        info!(complaint = %doc.id, user, category = %doc.category, "filed complaint");
        Ok(doc)
    }

    /// Fetch one complaint. Non-admin principals only see their own;
    /// anything else reports `NotFound` rather than confirming existence.
    pub async fn find_by_id(&self, id: Uuid, principal: &Principal) -> Result<ComplaintDoc> {
        let doc = self
            .complaints
            .get(id)
            .await
            .ok_or_else(|| RedressError::not_found("complaint", id))?;

        let is_owner = doc.user == principal.id;
        if !is_allowed(Operation::ReadComplaint, principal.role, is_owner) {
            return Err(RedressError::not_found("complaint", id));
        }
        Ok(doc)
    }

    /// Apply a filer patch. Only the owner may patch, and only while the
    /// complaint is not in a terminal status. `priority_value` is
    /// recomputed whenever the priority changes.
    pub async fn update(
        &self,
        id: Uuid,
        principal: &Principal,
        patch: ComplaintPatch,
    ) -> Result<ComplaintDoc> {
        if let Some(title) = &patch.title {
            if title.chars().count() < MIN_TITLE_LEN {
                return Err(RedressError::Validation(format!(
                    "title must be at least {MIN_TITLE_LEN} characters"
                )));
            }
        }
        if let Some(description) = &patch.description {
            if description.chars().count() < MIN_DESCRIPTION_LEN {
                return Err(RedressError::Validation(format!(
                    "description must be at least {MIN_DESCRIPTION_LEN} characters"
                )));
            }
        }

        self.complaints
            .mutate_checked(
                id,
                |doc| {
                    let is_owner = doc.user == principal.id;
                    if !is_allowed(Operation::UpdateComplaint, principal.role, is_owner) {
                        return Err(RedressError::Forbidden(
                            "only the filer may update a complaint".to_string(),
                        ));
                    }
                    if doc.status.is_terminal() {
                        return Err(RedressError::Forbidden(format!(
                            "complaint is {} and can no longer be updated",
                            doc.status
                        )));
                    }
                    Ok(())
                },
                |doc| {
                    if let Some(title) = patch.title {
                        doc.title = title;
                    }
                    if let Some(description) = patch.description {
                        doc.description = description;
                    }
                    if let Some((category, sub_category)) = patch.recategorize {
                        doc.category = category;
                        doc.sub_category = sub_category;
                    }
                    if let Some(priority) = patch.priority {
                        doc.priority = priority;
                        doc.priority_value = priority.value();
                    }
                    doc.metadata.touch();
                    doc.clone()
                },
            )
            .await
            .ok_or_else(|| RedressError::not_found("complaint", id))?
    }

    /// Advance the status state machine. Admin only. Entering `Resolved`
    /// requires resolution text, which is stored with the admin's id and
    /// the server timestamp; no other transition touches an existing
    /// resolution.
    pub async fn transition_status(
        &self,
        id: Uuid,
        principal: &Principal,
        new_status: Status,
        resolution_text: Option<String>,
    ) -> Result<ComplaintDoc> {
        if !is_allowed(Operation::TransitionStatus, principal.role, false) {
            return Err(RedressError::Forbidden(
                "status transitions require the admin role".to_string(),
            ));
        }

        let resolution = if new_status == Status::Resolved {
            let text = resolution_text.ok_or_else(|| {
                RedressError::Validation("resolution text is required to resolve".to_string())
            })?;
            Some(Resolution {
                text,
                by: principal.id.clone(),
                date: Utc::now(),
            })
        } else {
            None
        };

        let updated = self
            .complaints
            .mutate_checked(
                id,
                |doc| {
                    if !doc.status.can_transition(new_status) {
                        return Err(RedressError::InvalidTransition {
                            from: doc.status,
                            to: new_status,
                        });
                    }
                    Ok(())
                },
                |doc| {
                    doc.status = new_status;
                    if let Some(resolution) = resolution {
                        doc.resolution = Some(resolution);
                    }
                    doc.metadata.touch();
                    doc.clone()
                },
            )
            .await
            .ok_or_else(|| RedressError::not_found("complaint", id))??;

        info!(complaint = %id, status = %new_status, by = %principal.id, "status transition");
        Ok(updated)
    }

    /// Append a comment with the server timestamp. Owner only.
    pub async fn append_comment(
        &self,
        id: Uuid,
        principal: &Principal,
        text: String,
    ) -> Result<ComplaintDoc> {
        self.complaints
            .mutate_checked(
                id,
                |doc| {
                    let is_owner = doc.user == principal.id;
                    if !is_allowed(Operation::AddComment, principal.role, is_owner) {
                        return Err(RedressError::Forbidden(
                            "only the filer may comment".to_string(),
                        ));
                    }
                    Ok(())
                },
                |doc| {
                    doc.comments.push(Comment {
                        text,
                        user: principal.id.clone(),
                        created_at: Utc::now(),
                    });
                    doc.metadata.touch();
                    doc.clone()
                },
            )
            .await
            .ok_or_else(|| RedressError::not_found("complaint", id))?
    }

    /// Append to the share history. Owner only, not count-bearing.
    pub async fn record_share(
        &self,
        id: Uuid,
        principal: &Principal,
        channel: String,
    ) -> Result<ComplaintDoc> {
        self.complaints
            .mutate_checked(
                id,
                |doc| {
                    let is_owner = doc.user == principal.id;
                    if !is_allowed(Operation::ShareComplaint, principal.role, is_owner) {
                        return Err(RedressError::Forbidden(
                            "only the filer may share".to_string(),
                        ));
                    }
                    Ok(())
                },
                |doc| {
                    doc.shared_on.push(Share {
                        channel,
                        shared_at: Utc::now(),
                    });
                    doc.metadata.touch();
                    doc.clone()
                },
            )
            .await
            .ok_or_else(|| RedressError::not_found("complaint", id))?
    }

    /// Store a best-effort enrichment result on the complaint. Internal to
    /// the lifecycle service; never fails the complaint itself.
    pub async fn attach_suggestion(
        &self,
        id: Uuid,
        suggestion: crate::db::schemas::Enrichment,
    ) -> Result<()> {
        self.complaints
            .mutate(id, |doc| {
                doc.suggestion = Some(suggestion);
                doc.metadata.touch();
            })
            .await
            .ok_or_else(|| RedressError::not_found("complaint", id))
    }

    /// Hard-delete a complaint. Owner only. Returns the removed document
    /// so the caller can reconcile its (category, subcategory, user)
    /// triple.
    pub async fn delete(&self, id: Uuid, principal: &Principal) -> Result<ComplaintDoc> {
        let removed = self
            .complaints
            .remove_checked(id, |doc| {
                let is_owner = doc.user == principal.id;
                if !is_allowed(Operation::DeleteComplaint, principal.role, is_owner) {
                    return Err(RedressError::Forbidden(
                        "only the filer may delete a complaint".to_string(),
                    ));
                }
                Ok(())
            })
            .await
            .ok_or_else(|| RedressError::not_found("complaint", id))??;

        info!(complaint = %id, user = %removed.user, "deleted complaint");
        Ok(removed)
    }

    /// Filtered, sorted, paginated listing. Admins see every complaint;
    /// other principals see only their own.
    pub async fn list(
        &self,
        principal: &Principal,
        filter: &ComplaintFilter,
        sort: SortOrder,
        page: PageRequest,
    ) -> Page<ComplaintDoc> {
        let mut docs = self
            .complaints
            .find(|doc| {
                (principal.is_admin() || doc.user == principal.id) && filter.matches(doc)
            })
            .await;

        sort.sort(&mut docs);
        debug!(
            user = %principal.id,
            matched = docs.len(),
            "listed complaints"
        );
        Page::paginate(docs, page)
    }

    /// Total number of stored complaints.
    pub async fn len(&self) -> usize {
        self.complaints.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.complaints.is_empty().await
    }
}

impl Default for ComplaintStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GroundTruth for ComplaintStore {
    async fn pair_count(&self, category: Uuid, sub_category: Uuid) -> u64 {
        self.complaints
            .count(|doc| doc.category == category && doc.sub_category == sub_category)
            .await
    }

    async fn user_pair_count(&self, category: Uuid, user: &str) -> u64 {
        self.complaints
            .count(|doc| doc.category == category && doc.user == user)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(category: Uuid, sub_category: Uuid) -> ComplaintSpec {
        ComplaintSpec {
            title: "Refund not received".to_string(),
            description: "Returned the order two weeks ago".to_string(),
            category,
            sub_category,
            priority: None,
            attachments: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_create_defaults() {
        let store = ComplaintStore::new();
        let doc = store
            .create("alice", spec(Uuid::new_v4(), Uuid::new_v4()))
            .await
            .unwrap();

        assert_eq!(doc.status, Status::Pending);
        assert_eq!(doc.priority, Priority::Medium);
        assert_eq!(doc.priority_value, 1);
        assert!(doc.resolution.is_none());
    }

    #[tokio::test]
    async fn test_create_validates_lengths() {
        let store = ComplaintStore::new();
        let mut short_title = spec(Uuid::new_v4(), Uuid::new_v4());
        short_title.title = "hey".to_string();
        assert!(matches!(
            store.create("alice", short_title).await.unwrap_err(),
            RedressError::Validation(_)
        ));

        let mut short_description = spec(Uuid::new_v4(), Uuid::new_v4());
        short_description.description = "short".to_string();
        assert!(matches!(
            store.create("alice", short_description).await.unwrap_err(),
            RedressError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_non_owner_read_is_not_found() {
        let store = ComplaintStore::new();
        let doc = store
            .create("alice", spec(Uuid::new_v4(), Uuid::new_v4()))
            .await
            .unwrap();

        let bob = Principal::user("bob");
        assert!(matches!(
            store.find_by_id(doc.id, &bob).await.unwrap_err(),
            RedressError::NotFound(_)
        ));

        // Admin sees everything
        let admin = Principal::admin("root");
        assert!(store.find_by_id(doc.id, &admin).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_recomputes_priority_value() {
        let store = ComplaintStore::new();
        let alice = Principal::user("alice");
        let doc = store
            .create("alice", spec(Uuid::new_v4(), Uuid::new_v4()))
            .await
            .unwrap();

        let updated = store
            .update(
                doc.id,
                &alice,
                ComplaintPatch {
                    priority: Some(Priority::High),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.priority, Priority::High);
        assert_eq!(updated.priority_value, 2);
    }

    #[tokio::test]
    async fn test_update_rejected_after_terminal() {
        let store = ComplaintStore::new();
        let alice = Principal::user("alice");
        let admin = Principal::admin("root");
        let doc = store
            .create("alice", spec(Uuid::new_v4(), Uuid::new_v4()))
            .await
            .unwrap();
        store
            .transition_status(doc.id, &admin, Status::Rejected, None)
            .await
            .unwrap();

        let err = store
            .update(
                doc.id,
                &alice,
                ComplaintPatch {
                    title: Some("updated title".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RedressError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_transition_requires_admin() {
        let store = ComplaintStore::new();
        let alice = Principal::user("alice");
        let doc = store
            .create("alice", spec(Uuid::new_v4(), Uuid::new_v4()))
            .await
            .unwrap();

        let err = store
            .transition_status(doc.id, &alice, Status::InProgress, None)
            .await
            .unwrap_err();
        assert!(matches!(err, RedressError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_resolve_requires_and_stores_resolution() {
        let store = ComplaintStore::new();
        let admin = Principal::admin("root");
        let doc = store
            .create("alice", spec(Uuid::new_v4(), Uuid::new_v4()))
            .await
            .unwrap();
        store
            .transition_status(doc.id, &admin, Status::InProgress, None)
            .await
            .unwrap();

        // Missing resolution text
        assert!(matches!(
            store
                .transition_status(doc.id, &admin, Status::Resolved, None)
                .await
                .unwrap_err(),
            RedressError::Validation(_)
        ));

        let resolved = store
            .transition_status(
                doc.id,
                &admin,
                Status::Resolved,
                Some("replacement shipped".to_string()),
            )
            .await
            .unwrap();
        let resolution = resolved.resolution.unwrap();
        assert_eq!(resolution.text, "replacement shipped");
        assert_eq!(resolution.by, "root");
    }

    #[tokio::test]
    async fn test_terminal_state_rejects_transitions() {
        let store = ComplaintStore::new();
        let admin = Principal::admin("root");
        let doc = store
            .create("alice", spec(Uuid::new_v4(), Uuid::new_v4()))
            .await
            .unwrap();
        store
            .transition_status(doc.id, &admin, Status::Rejected, None)
            .await
            .unwrap();

        let err = store
            .transition_status(doc.id, &admin, Status::InProgress, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RedressError::InvalidTransition {
                from: Status::Rejected,
                to: Status::InProgress
            }
        ));
    }

    #[tokio::test]
    async fn test_comment_owner_only() {
        let store = ComplaintStore::new();
        let alice = Principal::user("alice");
        let bob = Principal::user("bob");
        let doc = store
            .create("alice", spec(Uuid::new_v4(), Uuid::new_v4()))
            .await
            .unwrap();

        let updated = store
            .append_comment(doc.id, &alice, "any update on this?".to_string())
            .await
            .unwrap();
        assert_eq!(updated.comments.len(), 1);

        assert!(matches!(
            store
                .append_comment(doc.id, &bob, "me too".to_string())
                .await
                .unwrap_err(),
            RedressError::Forbidden(_)
        ));
    }

    #[tokio::test]
    async fn test_delete_owner_only() {
        let store = ComplaintStore::new();
        let alice = Principal::user("alice");
        let bob = Principal::user("bob");
        let doc = store
            .create("alice", spec(Uuid::new_v4(), Uuid::new_v4()))
            .await
            .unwrap();

        assert!(matches!(
            store.delete(doc.id, &bob).await.unwrap_err(),
            RedressError::Forbidden(_)
        ));
        store.delete(doc.id, &alice).await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_ground_truth_counts() {
        let store = ComplaintStore::new();
        let category = Uuid::new_v4();
        let sub = Uuid::new_v4();
        let other_sub = Uuid::new_v4();

        for _ in 0..3 {
            store.create("alice", spec(category, sub)).await.unwrap();
        }
        store.create("alice", spec(category, other_sub)).await.unwrap();
        store.create("bob", spec(category, sub)).await.unwrap();

        assert_eq!(store.pair_count(category, sub).await, 4);
        assert_eq!(store.pair_count(category, other_sub).await, 1);
        assert_eq!(store.user_pair_count(category, "alice").await, 4);
        assert_eq!(store.user_pair_count(category, "bob").await, 1);
    }

    #[tokio::test]
    async fn test_list_scoped_to_owner() {
        let store = ComplaintStore::new();
        let category = Uuid::new_v4();
        let sub = Uuid::new_v4();
        for _ in 0..2 {
            store.create("alice", spec(category, sub)).await.unwrap();
        }
        store.create("bob", spec(category, sub)).await.unwrap();

        let alice_page = store
            .list(
                &Principal::user("alice"),
                &ComplaintFilter::default(),
                SortOrder::Newest,
                PageRequest::default(),
            )
            .await;
        assert_eq!(alice_page.total, 2);

        let admin_page = store
            .list(
                &Principal::admin("root"),
                &ComplaintFilter::default(),
                SortOrder::Newest,
                PageRequest::default(),
            )
            .await;
        assert_eq!(admin_page.total, 3);
    }
}
