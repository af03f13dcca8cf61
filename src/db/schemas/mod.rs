//! Document schemas
//!
//! Defines the complaint and category document structures plus the common
//! timestamp metadata shared by both.

mod category;
mod complaint;
mod metadata;

pub use category::{CategoryDoc, SubCategory, UserCount, CATEGORY_COLLECTION};
pub use complaint::{
    Comment, ComplaintDoc, Enrichment, Priority, Resolution, Share, Status, COMPLAINT_COLLECTION,
};
pub use metadata::Metadata;
