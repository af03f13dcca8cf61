//! Redress - complaint lifecycle and aggregate-consistency engine
//!
//! End users file complaints against a two-level taxonomy (category ->
//! subcategory); each complaint moves through a status/priority lifecycle
//! while denormalized usage counters on the taxonomy (per subcategory, per
//! category, per filer) stay consistent without multi-document
//! transactions.
//!
//! ## Components
//!
//! - **Taxonomy store**: category aggregate roots with embedded
//!   subcategories and per-user counts; atomic per-document counter writes
//! - **Complaint store**: complaint documents with a fixed status state
//!   machine and ownership-scoped access
//! - **Aggregate reconciler**: idempotent recount-based counter
//!   reconciliation, safe under interleaving and at-least-once delivery
//! - **Lifecycle service**: request-level orchestration around the stores
//!   plus the upload / notification / enrichment collaborator seams

pub mod auth;
pub mod complaints;
pub mod db;
pub mod logging;
pub mod reconcile;
pub mod services;
pub mod taxonomy;
pub mod types;

pub use auth::{Principal, Role};
pub use complaints::{ComplaintDoc, ComplaintStore, Priority, Status};
pub use reconcile::{AggregateReconciler, CountTriple};
pub use services::{ComplaintService, LifecycleConfig};
pub use taxonomy::TaxonomyStore;
pub use types::{RedressError, Result};
