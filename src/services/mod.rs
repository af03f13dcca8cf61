//! Services layer
//!
//! Business orchestration plus the external-collaborator seams the
//! lifecycle depends on. Collaborators are consumed through object-safe
//! traits so production transports and test doubles are interchangeable.
//!
//! ## Services
//!
//! - **Lifecycle**: request-level orchestration of stores, reconciler, and
//!   collaborators around each complaint operation
//! - **Upload**: attachment persistence seam (`upload(bytes) -> url`)
//! - **Notify**: fire-and-forget outbound notification seam
//! - **Enrichment**: optional AI categorization seam with neutral fallback

pub mod enrichment;
pub mod lifecycle;
pub mod notify;
pub mod upload;

use thiserror::Error;

pub use enrichment::{Enricher, NoopEnricher};
pub use lifecycle::{AttachmentUpload, ComplaintService, LifecycleConfig, NewComplaint};
pub use notify::{EventKind, Notifier, TracingNotifier};
pub use upload::{InMemoryUploader, Uploader};

/// Failure reported by an external collaborator. The lifecycle layer
/// decides whether it is fatal (required upload) or logged and swallowed
/// (enrichment, notification).
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct CollaboratorError(pub String);
