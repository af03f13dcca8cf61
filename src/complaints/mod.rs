//! Complaint store and lifecycle state machine
//!
//! The complaint document, its status state machine, and the
//! priority/priority_value pairing live in [`crate::db::schemas`]; this
//! module holds the store operating on them plus the list-query types.

pub mod query;
pub mod store;

pub use crate::db::schemas::{Comment, ComplaintDoc, Priority, Resolution, Share, Status};
pub use query::{ComplaintFilter, Page, PageRequest, SortOrder};
pub use store::{ComplaintPatch, ComplaintSpec, ComplaintStore};
