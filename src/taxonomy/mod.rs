//! Taxonomy store
//!
//! Owns the category aggregate roots (with embedded subcategories and
//! per-user counts) and exposes the single mutation path the reconciler
//! uses: [`TaxonomyStore::apply_recount`], an optimistic-retry
//! read-recount-conditional-write loop over one category document.
//!
//! Counter updates never apply a relative delta. The ground-truth counts
//! are recomputed inside the retry loop, so a write that loses its version
//! race recounts against the state it is about to replace and a retried
//! reconciliation cannot double-apply.

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::memory::{CasOutcome, Collection};
use crate::db::schemas::{CategoryDoc, SubCategory, UserCount, CATEGORY_COLLECTION};
use crate::types::{RedressError, Result};

// ============================================================================
// Specs and patches
// ============================================================================

/// Input for creating a category
#[derive(Debug, Clone)]
pub struct CategorySpec {
    pub name: String,
    pub icon: Option<String>,
    pub description: Option<String>,
}

/// Input for adding a subcategory
#[derive(Debug, Clone)]
pub struct SubCategorySpec {
    pub name: String,
}

/// Allow-listed patch for category metadata. Counter fields and the
/// subcategory list are not patchable; they have their own paths.
#[derive(Debug, Clone, Default)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
}

// ============================================================================
// Ground truth source
// ============================================================================

/// Ground-truth recount queries, answered by the complaint store.
///
/// The taxonomy store never trusts an in-memory delta; it asks this seam
/// for the authoritative counts inside its retry loop.
#[async_trait]
pub trait GroundTruth: Send + Sync {
    /// Count of live complaints with the exact (category, subcategory) pair
    async fn pair_count(&self, category: Uuid, sub_category: Uuid) -> u64;

    /// Count of live complaints with the exact (category, user) pair
    async fn user_pair_count(&self, category: Uuid, user: &str) -> u64;
}

// ============================================================================
// Retry configuration
// ============================================================================

/// Configuration for the optimistic-concurrency retry loop
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum CAS attempts before surfacing `Conflict` (default: 5)
    pub max_attempts: u32,
    /// Base backoff doubled on each retry (default: 10ms)
    pub base_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(10),
        }
    }
}

impl RetryConfig {
    /// Exponential backoff with jitter for the given attempt (1-based)
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.base_backoff * 2u32.saturating_pow(attempt.saturating_sub(1));
        let jitter_ms = rand::thread_rng().gen_range(0..=self.base_backoff.as_millis() as u64);
        base + Duration::from_millis(jitter_ms)
    }
}

// ============================================================================
// Taxonomy store
// ============================================================================

/// Store for category aggregate roots
pub struct TaxonomyStore {
    categories: Collection<CategoryDoc>,
    retry: RetryConfig,
}

impl TaxonomyStore {
    pub fn new() -> Self {
        Self::with_retry(RetryConfig::default())
    }

    pub fn with_retry(retry: RetryConfig) -> Self {
        Self {
            categories: Collection::new(CATEGORY_COLLECTION),
            retry,
        }
    }

    /// Create a category. Fails with `Conflict` if the name (case-sensitive)
    /// already exists.
    pub async fn create_category(&self, spec: CategorySpec) -> Result<CategoryDoc> {
        let doc = CategoryDoc::new(spec.name.clone(), spec.icon, spec.description);
        let id = doc.id;

        let inserted = self
            .categories
            .insert_unique(id, doc, |existing| existing.name == spec.name)
            .await;
        if !inserted {
            return Err(RedressError::Conflict(format!(
                "category name '{}' already exists",
                spec.name
            )));
        }

        info!(category = %id, name = %spec.name, "created category");
        self.get(id).await
    }

    /// Patch category metadata. Fails with `Conflict` on a name collision.
    pub async fn update_category(&self, id: Uuid, patch: CategoryPatch) -> Result<CategoryDoc> {
        if let Some(new_name) = &patch.name {
            let clash = self
                .categories
                .count(|c| c.id != id && c.name == *new_name)
                .await;
            if clash > 0 {
                return Err(RedressError::Conflict(format!(
                    "category name '{new_name}' already exists"
                )));
            }
        }

        self.categories
            .mutate(id, |cat| {
                if let Some(name) = patch.name {
                    cat.name = name;
                }
                if let Some(icon) = patch.icon {
                    cat.icon = Some(icon);
                }
                if let Some(description) = patch.description {
                    cat.description = Some(description);
                }
                cat.metadata.touch();
                cat.clone()
            })
            .await
            .ok_or_else(|| RedressError::not_found("category", id))
    }

    /// Add a subcategory to an existing category.
    pub async fn add_sub_category(
        &self,
        category_id: Uuid,
        spec: SubCategorySpec,
    ) -> Result<CategoryDoc> {
        let name = spec.name;
        self.categories
            .mutate_checked(
                category_id,
                |cat| {
                    if cat.sub_categories.iter().any(|s| s.name == name) {
                        return Err(RedressError::Conflict(format!(
                            "subcategory name '{name}' already exists in category '{}'",
                            cat.name
                        )));
                    }
                    Ok(())
                },
                |cat| {
                    cat.sub_categories.push(SubCategory::new(name.clone()));
                    cat.metadata.touch();
                    cat.clone()
                },
            )
            .await
            .ok_or_else(|| RedressError::not_found("category", category_id))?
    }

    /// Delete a category. Refused while any complaint still counts against it.
    pub async fn delete_category(&self, id: Uuid) -> Result<()> {
        self.categories
            .remove_checked(id, |cat| {
                if cat.total_complaints > 0 {
                    return Err(RedressError::PreconditionFailed(format!(
                        "category '{}' still has {} complaints",
                        cat.name, cat.total_complaints
                    )));
                }
                Ok(())
            })
            .await
            .ok_or_else(|| RedressError::not_found("category", id))??;

        info!(category = %id, "deleted category");
        Ok(())
    }

    /// Delete a subcategory. Refused while its count is nonzero.
    pub async fn delete_sub_category(&self, category_id: Uuid, sub_id: Uuid) -> Result<()> {
        self.categories
            .mutate_checked(
                category_id,
                |cat| {
                    let sub = cat.sub_category(sub_id).ok_or_else(|| {
                        RedressError::not_found("subcategory", sub_id)
                    })?;
                    if sub.total_complaints > 0 {
                        return Err(RedressError::PreconditionFailed(format!(
                            "subcategory '{}' still has {} complaints",
                            sub.name, sub.total_complaints
                        )));
                    }
                    Ok(())
                },
                |cat| {
                    cat.sub_categories.retain(|s| s.id != sub_id);
                    cat.recompute_total();
                    cat.metadata.touch();
                },
            )
            .await
            .ok_or_else(|| RedressError::not_found("category", category_id))??;

        info!(category = %category_id, subcategory = %sub_id, "deleted subcategory");
        Ok(())
    }

    /// Unconditionally flip the manual dashboard flag. Returns the new value.
    pub async fn toggle_frequently_used(&self, id: Uuid) -> Result<bool> {
        self.categories
            .mutate(id, |cat| {
                cat.is_frequently_used = !cat.is_frequently_used;
                cat.metadata.touch();
                cat.is_frequently_used
            })
            .await
            .ok_or_else(|| RedressError::not_found("category", id))
    }

    /// Whole-document read.
    pub async fn get(&self, id: Uuid) -> Result<CategoryDoc> {
        self.categories
            .get(id)
            .await
            .ok_or_else(|| RedressError::not_found("category", id))
    }

    /// All categories, sorted by name.
    pub async fn list(&self) -> Vec<CategoryDoc> {
        let mut cats = self.categories.find(|_| true).await;
        cats.sort_by(|a, b| a.name.cmp(&b.name));
        cats
    }

    /// Recompute and write the three counters for one (category,
    /// subcategory, user) triple.
    ///
    /// The sole mutation path for counter fields. Reads the category with
    /// its version, recounts the pair and the user from `source`, writes
    /// the subcategory count, the derived category total, and the user
    /// entry in one conditional replace. On a version mismatch it backs
    /// off with jitter and re-runs the whole read-recount-write cycle;
    /// after `max_attempts` it surfaces `Conflict`.
    pub async fn apply_recount(
        &self,
        category_id: Uuid,
        sub_category_id: Uuid,
        user_id: &str,
        source: &dyn GroundTruth,
    ) -> Result<CategoryDoc> {
        for attempt in 1..=self.retry.max_attempts {
            let (version, mut cat) = self
                .categories
                .get_versioned(category_id)
                .await
                .ok_or_else(|| RedressError::not_found("category", category_id))?;

            let pair_total = source.pair_count(category_id, sub_category_id).await;
            let user_total = source.user_pair_count(category_id, user_id).await;

            let sub = cat
                .sub_categories
                .iter_mut()
                .find(|s| s.id == sub_category_id)
                .ok_or_else(|| RedressError::not_found("subcategory", sub_category_id))?;
            sub.total_complaints = pair_total;
            cat.recompute_total();

            match cat.user_counts.iter_mut().find(|u| u.user == user_id) {
                Some(entry) => entry.count = user_total,
                // First reconciliation for this filer: seed the entry with
                // the freshly computed count, never with 1.
                None => cat.user_counts.push(UserCount {
                    user: user_id.to_string(),
                    count: user_total,
                }),
            }
            cat.metadata.touch();

            match self.categories.replace(category_id, version, cat.clone()).await {
                CasOutcome::Applied => {
                    debug!(
                        category = %category_id,
                        subcategory = %sub_category_id,
                        user = user_id,
                        pair_total,
                        user_total,
                        category_total = cat.total_complaints,
                        attempt,
                        "applied recount"
                    );
                    return Ok(cat);
                }
                CasOutcome::Missing => {
                    return Err(RedressError::not_found("category", category_id));
                }
                CasOutcome::VersionMismatch => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        category = %category_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "recount write lost version race, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Err(RedressError::Conflict(format!(
            "recount for category {category_id} exhausted {} attempts",
            self.retry.max_attempts
        )))
    }
}

impl Default for TaxonomyStore {
    fn default() -> Self {
        Self::new()
    }
}
