//! Attachment upload seam
//!
//! Binary attachment storage is an external collaborator; this crate only
//! sees `upload(bytes, content_type) -> url`. A failed upload of a
//! required attachment is fatal to complaint creation.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::CollaboratorError;

/// Object-store upload seam
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Persist the bytes and return their external URL
    async fn upload(&self, bytes: &[u8], content_type: &str)
        -> Result<String, CollaboratorError>;
}

/// In-memory uploader for tests and local runs
#[derive(Default)]
pub struct InMemoryUploader {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn stored_count(&self) -> usize {
        self.blobs.read().await.len()
    }
}

#[async_trait]
impl Uploader for InMemoryUploader {
    async fn upload(
        &self,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, CollaboratorError> {
        let url = format!("mem://{}/{}", content_type, Uuid::new_v4());
        self.blobs.write().await.insert(url.clone(), bytes.to_vec());
        Ok(url)
    }
}
