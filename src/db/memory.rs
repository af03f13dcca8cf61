//! In-memory versioned document collection
//!
//! A typed collection keyed by document id. Every document carries a
//! monotonically increasing version; [`Collection::replace`] is a
//! compare-and-swap on that version, which is the primitive the taxonomy
//! store's optimistic-retry loop is built on. All other mutations happen
//! under the collection write lock, so a single document never sees
//! interleaved read-modify-write cycles.

use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Outcome of a versioned replace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// Write applied, version bumped
    Applied,
    /// Document changed since the caller read it
    VersionMismatch,
    /// Document no longer exists
    Missing,
}

struct Slot<T> {
    version: u64,
    doc: T,
}

/// Typed in-memory collection with per-document versions
pub struct Collection<T> {
    name: &'static str,
    docs: RwLock<HashMap<Uuid, Slot<T>>>,
}

impl<T: Clone> Collection<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            docs: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a new document at version 1.
    ///
    /// Ids must be fresh: re-inserting an existing id would reset its
    /// version and let a stale [`Collection::replace`] at the old version
    /// succeed.
    pub async fn insert(&self, id: Uuid, doc: T) {
        let mut docs = self.docs.write().await;
        let prior = docs.insert(id, Slot { version: 1, doc });
        debug_assert!(prior.is_none(), "insert reused id {id}");
        debug!(collection = self.name, %id, "inserted document");
    }

    /// Insert only if no existing document matches `conflicts_with`.
    ///
    /// The uniqueness check and the insert run under one write-lock
    /// acquisition, so two concurrent inserts cannot both pass the check.
    pub async fn insert_unique<F>(&self, id: Uuid, doc: T, conflicts_with: F) -> bool
    where
        F: Fn(&T) -> bool,
    {
        let mut docs = self.docs.write().await;
        if docs.values().any(|slot| conflicts_with(&slot.doc)) {
            return false;
        }
        docs.insert(id, Slot { version: 1, doc });
        debug!(collection = self.name, %id, "inserted document");
        true
    }

    pub async fn get(&self, id: Uuid) -> Option<T> {
        self.docs.read().await.get(&id).map(|slot| slot.doc.clone())
    }

    /// Read a document together with its current version
    pub async fn get_versioned(&self, id: Uuid) -> Option<(u64, T)> {
        self.docs
            .read()
            .await
            .get(&id)
            .map(|slot| (slot.version, slot.doc.clone()))
    }

    /// Replace the document if its version still equals `expected`.
    pub async fn replace(&self, id: Uuid, expected: u64, doc: T) -> CasOutcome {
        let mut docs = self.docs.write().await;
        match docs.get_mut(&id) {
            None => CasOutcome::Missing,
            Some(slot) if slot.version != expected => {
                debug!(
                    collection = self.name,
                    %id,
                    expected,
                    actual = slot.version,
                    "versioned replace lost race"
                );
                CasOutcome::VersionMismatch
            }
            Some(slot) => {
                slot.version += 1;
                slot.doc = doc;
                CasOutcome::Applied
            }
        }
    }

    /// Mutate a document in place under the write lock, bumping its version.
    ///
    /// Returns `None` when the document does not exist.
    pub async fn mutate<F, R>(&self, id: Uuid, f: F) -> Option<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        let mut docs = self.docs.write().await;
        docs.get_mut(&id).map(|slot| {
            slot.version += 1;
            f(&mut slot.doc)
        })
    }

    /// Mutate only if `check` passes; the check and the mutation share one
    /// write-lock acquisition.
    pub async fn mutate_checked<C, F, R, E>(&self, id: Uuid, check: C, f: F) -> Option<Result<R, E>>
    where
        C: FnOnce(&T) -> Result<(), E>,
        F: FnOnce(&mut T) -> R,
    {
        let mut docs = self.docs.write().await;
        docs.get_mut(&id).map(|slot| {
            check(&slot.doc)?;
            slot.version += 1;
            Ok(f(&mut slot.doc))
        })
    }

    /// Remove only if `check` passes; the check and the removal share one
    /// write-lock acquisition.
    pub async fn remove_checked<C, E>(&self, id: Uuid, check: C) -> Option<Result<T, E>>
    where
        C: FnOnce(&T) -> Result<(), E>,
    {
        let mut docs = self.docs.write().await;
        let slot = docs.get(&id)?;
        if let Err(e) = check(&slot.doc) {
            return Some(Err(e));
        }
        let removed = docs.remove(&id).map(|slot| slot.doc);
        debug!(collection = self.name, %id, "removed document");
        removed.map(Ok)
    }

    /// Hard-delete a document.
    pub async fn remove(&self, id: Uuid) -> Option<T> {
        let removed = self.docs.write().await.remove(&id).map(|slot| slot.doc);
        if removed.is_some() {
            debug!(collection = self.name, %id, "removed document");
        }
        removed
    }

    /// All documents matching a predicate.
    pub async fn find<F>(&self, pred: F) -> Vec<T>
    where
        F: Fn(&T) -> bool,
    {
        self.docs
            .read()
            .await
            .values()
            .filter(|slot| pred(&slot.doc))
            .map(|slot| slot.doc.clone())
            .collect()
    }

    /// Count of documents matching a predicate.
    pub async fn count<F>(&self, pred: F) -> u64
    where
        F: Fn(&T) -> bool,
    {
        self.docs
            .read()
            .await
            .values()
            .filter(|slot| pred(&slot.doc))
            .count() as u64
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_get() {
        let coll: Collection<String> = Collection::new("test");
        let id = Uuid::new_v4();
        coll.insert(id, "hello".to_string()).await;

        assert_eq!(coll.get(id).await.as_deref(), Some("hello"));
        assert_eq!(coll.get_versioned(id).await, Some((1, "hello".to_string())));
    }

    #[tokio::test]
    async fn test_replace_detects_stale_version() {
        let coll: Collection<String> = Collection::new("test");
        let id = Uuid::new_v4();
        coll.insert(id, "v1".to_string()).await;

        assert_eq!(coll.replace(id, 1, "v2".to_string()).await, CasOutcome::Applied);
        assert_eq!(
            coll.replace(id, 1, "stale".to_string()).await,
            CasOutcome::VersionMismatch
        );
        assert_eq!(coll.get(id).await.as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_replace_missing() {
        let coll: Collection<String> = Collection::new("test");
        assert_eq!(
            coll.replace(Uuid::new_v4(), 1, "x".to_string()).await,
            CasOutcome::Missing
        );
    }

    #[tokio::test]
    async fn test_insert_unique_rejects_duplicate() {
        let coll: Collection<String> = Collection::new("test");
        assert!(
            coll.insert_unique(Uuid::new_v4(), "a".to_string(), |d| d == "a")
                .await
        );
        assert!(
            !coll
                .insert_unique(Uuid::new_v4(), "a".to_string(), |d| d == "a")
                .await
        );
        assert_eq!(coll.len().await, 1);
    }

    #[tokio::test]
    async fn test_mutate_bumps_version() {
        let coll: Collection<u32> = Collection::new("test");
        let id = Uuid::new_v4();
        coll.insert(id, 1).await;
        coll.mutate(id, |n| *n += 1).await;

        assert_eq!(coll.get_versioned(id).await, Some((2, 2)));
    }

    #[tokio::test]
    #[should_panic(expected = "insert reused id")]
    async fn test_insert_rejects_reused_id() {
        let coll: Collection<String> = Collection::new("test");
        let id = Uuid::new_v4();
        coll.insert(id, "v1".to_string()).await;
        coll.insert(id, "again".to_string()).await;
    }

    #[tokio::test]
    async fn test_remove_is_hard_delete() {
        let coll: Collection<String> = Collection::new("test");
        let id = Uuid::new_v4();
        coll.insert(id, "gone".to_string()).await;

        assert_eq!(coll.remove(id).await.as_deref(), Some("gone"));
        assert!(coll.get(id).await.is_none());
        assert!(coll.remove(id).await.is_none());
    }

    #[tokio::test]
    async fn test_count_and_find() {
        let coll: Collection<u32> = Collection::new("test");
        for n in 0..10 {
            coll.insert(Uuid::new_v4(), n).await;
        }

        assert_eq!(coll.count(|n| *n % 2 == 0).await, 5);
        assert_eq!(coll.find(|n| *n > 7).await.len(), 2);
    }
}
