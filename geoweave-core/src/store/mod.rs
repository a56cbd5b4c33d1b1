//! Versioned primitive storage.
//!
//! The `PrimitiveStore` trait is the only way the exporter and importer touch
//! persisted data. A store keeps every concurrent version (fork) of a
//! primitive and an index of which documents reference a given id.

use async_trait::async_trait;
use thiserror::Error;

use crate::{Document, Primitive, PrimitiveId, VersionToken};

#[cfg(feature = "store-sqlite")]
mod sqlite;

#[cfg(feature = "store-sqlite")]
pub use sqlite::SqlitePrimitiveStore;

/// A single write in a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    /// Write `value` as the new head of `id`, or of a fresh id when `None`.
    Put {
        /// Target identifier; the store assigns one when absent.
        id: Option<PrimitiveId>,
        /// Payload to store.
        value: Primitive,
    },
}

impl BatchOp {
    /// Put with a store-assigned id.
    #[must_use]
    pub fn put(value: Primitive) -> Self {
        Self::Put { id: None, value }
    }

    /// Put under a caller-chosen id.
    pub fn put_with_id(id: impl Into<PrimitiveId>, value: Primitive) -> Self {
        Self::Put {
            id: Some(id.into()),
            value,
        }
    }
}

/// Errors surfaced by [`PrimitiveStore`] implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing engine reported a failure.
    #[error("store operation `{operation}` failed: {source}")]
    Backend {
        /// Name of the failing operation.
        operation: &'static str,
        /// Engine error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// A stored body could not be decoded.
    #[error("failed to decode document version {version}: {source}")]
    Decode {
        /// Version whose body was malformed.
        version: VersionToken,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },
    /// The store cannot serve requests.
    #[error("store unavailable: {message}")]
    Unavailable {
        /// Human-readable cause.
        message: String,
    },
}

impl StoreError {
    /// Wrap an engine error raised by `operation`.
    pub fn backend<E>(operation: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            operation,
            source: Box::new(source),
        }
    }
}

/// Access to versioned primitives.
///
/// Calls may be issued concurrently; implementations must be shareable
/// across tasks.
///
/// # Examples
///
/// ```
/// use geoweave_core::store::{BatchOp, PrimitiveStore, SqlitePrimitiveStore};
/// use geoweave_core::Primitive;
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let store = SqlitePrimitiveStore::open_in_memory()?;
/// store
///     .write_batch(vec![BatchOp::put_with_id("n1", Primitive::node(1.0, 2.0))])
///     .await?;
/// let forks = store.get_versions("n1").await?;
/// assert_eq!(forks.len(), 1);
/// # Ok::<(), geoweave_core::store::StoreError>(())
/// # }).unwrap();
/// ```
#[async_trait]
pub trait PrimitiveStore: Send + Sync {
    /// Return every current fork of `id`, deleted forks included.
    async fn get_versions(&self, id: &str) -> Result<Vec<Document>, StoreError>;

    /// Return the document stored under `version`, if any.
    async fn get_by_version(&self, version: &VersionToken)
    -> Result<Option<Document>, StoreError>;

    /// Return the versions of current documents whose references name `id`.
    async fn get_referrers(&self, id: &str) -> Result<Vec<VersionToken>, StoreError>;

    /// Apply `ops` in order and return the version written by each.
    async fn write_batch(&self, ops: Vec<BatchOp>) -> Result<Vec<VersionToken>, StoreError>;

    /// Return every identifier that has at least one current fork.
    async fn list_ids(&self) -> Result<Vec<PrimitiveId>, StoreError>;
}
