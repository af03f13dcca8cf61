//! AI categorization seam
//!
//! Optional enrichment producing a category suggestion for a freshly filed
//! complaint. Never required for correctness: the lifecycle wraps the call
//! in a timeout and substitutes [`Enrichment::fallback`] on any failure.

use async_trait::async_trait;

use super::CollaboratorError;
use crate::db::schemas::Enrichment;

/// Categorization suggestion seam
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, title: &str, description: &str)
        -> Result<Enrichment, CollaboratorError>;
}

/// Enricher that always answers with the neutral fallback
#[derive(Default)]
pub struct NoopEnricher;

#[async_trait]
impl Enricher for NoopEnricher {
    async fn enrich(
        &self,
        _title: &str,
        _description: &str,
    ) -> Result<Enrichment, CollaboratorError> {
        Ok(Enrichment::fallback())
    }
}
