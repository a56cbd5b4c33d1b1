//! Decide which primitives are exported as standalone features.
//!
//! A primitive is emitted when its own tags are interesting and no live
//! primitive that references it is interesting. An untagged way that only
//! gives shape to a tagged relation is drawn as part of that relation, not
//! again on its own.

use futures_util::{StreamExt, TryStreamExt, stream};
use geoweave_core::{Document, PrimitiveStore, StoreError, TagFilter, Tags};

/// Number of referrer lookups kept in flight per primitive by default.
pub const DEFAULT_REFERRER_CONCURRENCY: usize = 4;

/// Applies the standalone-feature rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmissionFilter {
    tags: TagFilter,
    concurrency: usize,
}

impl Default for EmissionFilter {
    fn default() -> Self {
        Self::new(TagFilter::default())
    }
}

impl EmissionFilter {
    /// Create a filter judging tags with `tags`.
    #[must_use]
    pub const fn new(tags: TagFilter) -> Self {
        Self {
            tags,
            concurrency: DEFAULT_REFERRER_CONCURRENCY,
        }
    }

    /// Bound the number of referrer lookups in flight. Zero is treated as one.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Return `true` when `tags` hold at least one interesting tag.
    #[must_use]
    pub fn is_interesting(&self, tags: &Tags) -> bool {
        self.tags.is_interesting(tags)
    }

    /// Decide whether `document` should be exported on its own.
    ///
    /// Referrers are fetched by version with at most the configured number
    /// of lookups in flight. Deleted referrers and versions the store no
    /// longer knows are ignored. The first interesting referrer settles the
    /// answer.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn should_emit<S>(&self, store: &S, document: &Document) -> Result<bool, StoreError>
    where
        S: PrimitiveStore + ?Sized,
    {
        if !self.is_interesting(document.tags()) {
            return Ok(false);
        }
        let referrers = store.get_referrers(&document.id).await?;
        let mut parents = stream::iter(referrers)
            .map(|version| async move { store.get_by_version(&version).await })
            .buffer_unordered(self.concurrency);
        while let Some(fetched) = parents.try_next().await? {
            let Some(parent) = fetched.filter(|candidate| !candidate.deleted) else {
                continue;
            };
            if self.is_interesting(parent.tags()) {
                log::debug!(
                    "{} is drawn as part of {}, not on its own",
                    document.id,
                    parent.id
                );
                return Ok(false);
            }
        }
        Ok(true)
    }
}
