//! Document storage for the redress engine
//!
//! Single-document atomicity only: the backend offers whole-document reads,
//! versioned compare-and-swap replacement, and in-place mutation of one
//! document at a time. There are no multi-document transactions; aggregate
//! consistency is the reconciler's job.

pub mod memory;
pub mod schemas;

pub use memory::{CasOutcome, Collection};
