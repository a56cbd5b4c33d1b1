//! Test-only, in-memory `PrimitiveStore` implementations used by unit and
//! behaviour tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::store::{BatchOp, PrimitiveStore, StoreError};
use crate::{Document, Primitive, PrimitiveId, VersionToken, generate_id};

#[derive(Debug, Default)]
struct MemoryState {
    documents: BTreeMap<VersionToken, Document>,
    heads: BTreeMap<PrimitiveId, Vec<VersionToken>>,
    next_version: u64,
}

impl MemoryState {
    fn allocate_version(&mut self) -> VersionToken {
        self.next_version += 1;
        VersionToken::new(self.next_version.to_string())
    }

    fn insert(&mut self, document: Document, replace_heads: bool) -> VersionToken {
        let version = document.version.clone();
        let heads = self.heads.entry(document.id.clone()).or_default();
        if replace_heads {
            heads.clear();
        }
        heads.push(version.clone());
        self.documents.insert(version.clone(), document);
        version
    }

    fn is_head(&self, document: &Document) -> bool {
        self.heads
            .get(&document.id)
            .is_some_and(|heads| heads.contains(&document.version))
    }
}

/// In-memory `PrimitiveStore` implementation used in tests.
///
/// Versions are numbered from one in write order. Writes through
/// [`PrimitiveStore::write_batch`] replace every current fork of the id;
/// [`MemoryStore::insert_fork`] adds a concurrent fork instead.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Unavailable {
            message: "memory store lock poisoned".to_owned(),
        })
    }

    /// Create a store holding one fork per `(id, primitive)` pair.
    pub fn with_primitives<I, S>(primitives: I) -> Self
    where
        I: IntoIterator<Item = (S, Primitive)>,
        S: Into<PrimitiveId>,
    {
        let store = Self::default();
        for (id, primitive) in primitives {
            store.insert_fork(id, primitive, None);
        }
        store
    }

    /// Add a concurrent fork of `id` without superseding existing ones.
    ///
    /// Returns the version assigned to the new fork.
    pub fn insert_fork(
        &self,
        id: impl Into<PrimitiveId>,
        primitive: Primitive,
        timestamp: Option<u64>,
    ) -> VersionToken {
        self.insert_document(id.into(), primitive, timestamp, false)
    }

    /// Add a deleted fork of `id`.
    pub fn insert_deleted_fork(
        &self,
        id: impl Into<PrimitiveId>,
        primitive: Primitive,
        timestamp: Option<u64>,
    ) -> VersionToken {
        self.insert_document(id.into(), primitive, timestamp, true)
    }

    fn insert_document(
        &self,
        id: PrimitiveId,
        primitive: Primitive,
        timestamp: Option<u64>,
        deleted: bool,
    ) -> VersionToken {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let version = state.allocate_version();
        state.insert(
            Document {
                id,
                version,
                timestamp,
                deleted,
                primitive,
            },
            false,
        )
    }

    /// Return every stored document, current or superseded, in version order.
    pub fn documents(&self) -> Vec<Document> {
        self.state
            .lock()
            .map(|state| state.documents.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PrimitiveStore for MemoryStore {
    async fn get_versions(&self, id: &str) -> Result<Vec<Document>, StoreError> {
        let state = self.state()?;
        Ok(state
            .heads
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|version| state.documents.get(version).cloned())
            .collect())
    }

    async fn get_by_version(
        &self,
        version: &VersionToken,
    ) -> Result<Option<Document>, StoreError> {
        Ok(self.state()?.documents.get(version).cloned())
    }

    async fn get_referrers(&self, id: &str) -> Result<Vec<VersionToken>, StoreError> {
        let state = self.state()?;
        Ok(state
            .documents
            .values()
            .filter(|doc| state.is_head(doc))
            .filter(|doc| doc.primitive.element.references().any(|r| r == id))
            .map(|doc| doc.version.clone())
            .collect())
    }

    async fn write_batch(&self, ops: Vec<BatchOp>) -> Result<Vec<VersionToken>, StoreError> {
        let mut state = self.state()?;
        Ok(ops
            .into_iter()
            .map(|op| {
                let BatchOp::Put { id, value } = op;
                let version = state.allocate_version();
                state.insert(
                    Document {
                        id: id.unwrap_or_else(generate_id),
                        version,
                        timestamp: None,
                        deleted: false,
                        primitive: value,
                    },
                    true,
                )
            })
            .collect())
    }

    async fn list_ids(&self) -> Result<Vec<PrimitiveId>, StoreError> {
        let state = self.state()?;
        Ok(state
            .heads
            .iter()
            .filter(|(_, heads)| !heads.is_empty())
            .map(|(id, _)| id.clone())
            .collect())
    }
}

/// Store whose every call fails with [`StoreError::Unavailable`].
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingStore;

impl FailingStore {
    fn error() -> StoreError {
        StoreError::Unavailable {
            message: "failing store".to_owned(),
        }
    }
}

#[async_trait]
impl PrimitiveStore for FailingStore {
    async fn get_versions(&self, _id: &str) -> Result<Vec<Document>, StoreError> {
        Err(Self::error())
    }

    async fn get_by_version(
        &self,
        _version: &VersionToken,
    ) -> Result<Option<Document>, StoreError> {
        Err(Self::error())
    }

    async fn get_referrers(&self, _id: &str) -> Result<Vec<VersionToken>, StoreError> {
        Err(Self::error())
    }

    async fn write_batch(&self, _ops: Vec<BatchOp>) -> Result<Vec<VersionToken>, StoreError> {
        Err(Self::error())
    }

    async fn list_ids(&self) -> Result<Vec<PrimitiveId>, StoreError> {
        Err(Self::error())
    }
}
