//! Assemble stored primitives into geometry.
//!
//! Nodes become points. Ways become line strings, or polygons when the
//! configured [`AreaClassifier`] accepts their closed ring. Relations
//! assemble every member recursively and fold the results together with
//! [`geoweave_geometry::combine`].
//!
//! Every reference is resolved to its winning fork first. References that
//! resolve to nothing are dropped, so a way over partly missing nodes keeps
//! the coordinates that do exist. Results keep reference order however the
//! store's answers interleave.

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, try_join_all};
use geo::{Coord, Geometry, LineString, Point, Polygon};
use geoweave_core::{
    AreaClassifier, Document, Element, Member, Primitive, PrimitiveId, PrimitiveStore, StoreError,
    Tags,
};
use geoweave_geometry::{MergeError, combine};
use thiserror::Error;

use crate::resolve::resolve;

/// Failure raised while assembling a primitive.
#[derive(Debug, Error)]
pub enum AssembleError {
    /// Reading a referenced primitive failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Member geometries of a relation could not be merged.
    #[error("cannot combine members of relation {id}: {source}")]
    Combine {
        /// Relation whose members were being combined.
        id: PrimitiveId,
        /// Underlying merge failure.
        #[source]
        source: MergeError,
    },
}

/// Identifiers currently being assembled along one path from the root.
struct Ancestry<'a> {
    id: &'a str,
    parent: Option<&'a Ancestry<'a>>,
}

impl<'a> Ancestry<'a> {
    const fn root(id: &'a str) -> Self {
        Self { id, parent: None }
    }

    const fn child(&'a self, id: &'a str) -> Self {
        Self {
            id,
            parent: Some(self),
        }
    }

    fn contains(&self, id: &str) -> bool {
        let mut cursor = Some(self);
        while let Some(entry) = cursor {
            if entry.id == id {
                return true;
            }
            cursor = entry.parent;
        }
        false
    }
}

/// Builds geometry for stored primitives.
///
/// # Examples
///
/// ```
/// use geo::Geometry;
/// use geoweave_core::{Document, OsmPolygonRules, Primitive, SqlitePrimitiveStore, VersionToken};
/// use geoweave_data::Assembler;
///
/// let store = SqlitePrimitiveStore::open_in_memory()?;
/// let node = Document {
///     id: "n1".into(),
///     version: VersionToken::from("1"),
///     timestamp: None,
///     deleted: false,
///     primitive: Primitive::node(51.5, -0.1),
/// };
/// let runtime = tokio::runtime::Builder::new_current_thread().build()?;
/// let geometry = runtime.block_on(Assembler::new(&store, &OsmPolygonRules).assemble(&node))?;
/// assert!(matches!(geometry, Some(Geometry::Point(_))));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Assembler<'a> {
    store: &'a dyn PrimitiveStore,
    classifier: &'a dyn AreaClassifier,
}

impl<'a> Assembler<'a> {
    /// Create an assembler reading from `store`.
    #[must_use]
    pub const fn new(store: &'a dyn PrimitiveStore, classifier: &'a dyn AreaClassifier) -> Self {
        Self { store, classifier }
    }

    /// Assemble the geometry `document` stands for.
    ///
    /// Returns `Ok(None)` when nothing can be drawn, for instance when a
    /// relation consists only of cyclic references.
    ///
    /// # Errors
    ///
    /// Returns [`AssembleError::Store`] when a referenced primitive cannot
    /// be read and [`AssembleError::Combine`] when the members of `document`
    /// itself meet at an ambiguous junction. A nested relation that fails to
    /// combine is dropped from its parent like a missing reference.
    pub async fn assemble(
        &self,
        document: &Document,
    ) -> Result<Option<Geometry<f64>>, AssembleError> {
        let ancestry = Ancestry::root(&document.id);
        self.assemble_primitive(&document.id, &document.primitive, &ancestry)
            .await
    }

    fn assemble_primitive<'s>(
        &'s self,
        id: &'s str,
        primitive: &'s Primitive,
        ancestry: &'s Ancestry<'s>,
    ) -> BoxFuture<'s, Result<Option<Geometry<f64>>, AssembleError>> {
        async move {
            match &primitive.element {
                Element::Node { lat, lon } => Ok(Some(Geometry::Point(Point::new(*lon, *lat)))),
                Element::Way { refs } => self.assemble_way(refs, &primitive.tags).await.map(Some),
                Element::Relation { members } => {
                    self.assemble_relation(id, members, ancestry).await
                }
            }
        }
        .boxed()
    }

    async fn assemble_way(
        &self,
        refs: &[PrimitiveId],
        tags: &Tags,
    ) -> Result<Geometry<f64>, AssembleError> {
        let nodes = try_join_all(refs.iter().map(|id| resolve(self.store, id))).await?;
        let coords: Vec<Coord<f64>> = nodes
            .into_iter()
            .flatten()
            .filter_map(|document| match document.primitive.element {
                Element::Node { lat, lon } => Some(Coord { x: lon, y: lat }),
                Element::Way { .. } | Element::Relation { .. } => {
                    log::debug!("way references non-node {}", document.id);
                    None
                }
            })
            .collect();
        if self.classifier.is_area(&coords, tags) {
            return Ok(Geometry::Polygon(Polygon::new(
                LineString::new(coords),
                Vec::new(),
            )));
        }
        Ok(Geometry::LineString(LineString::new(coords)))
    }

    async fn assemble_relation(
        &self,
        id: &str,
        members: &[Member],
        ancestry: &Ancestry<'_>,
    ) -> Result<Option<Geometry<f64>>, AssembleError> {
        let parts = try_join_all(
            members
                .iter()
                .map(|member| self.assemble_member(member, ancestry)),
        )
        .await?;
        let geometries: Vec<Geometry<f64>> = parts.into_iter().flatten().collect();
        combine(geometries)
            .map(Some)
            .map_err(|source| AssembleError::Combine {
                id: id.to_owned(),
                source,
            })
    }

    async fn assemble_member(
        &self,
        member: &Member,
        ancestry: &Ancestry<'_>,
    ) -> Result<Option<Geometry<f64>>, AssembleError> {
        if ancestry.contains(&member.reference) {
            log::warn!(
                "skipping cyclic reference to {} from {}",
                member.reference,
                ancestry.id
            );
            return Ok(None);
        }
        let Some(document) = resolve(self.store, &member.reference).await? else {
            return Ok(None);
        };
        let nested = ancestry.child(&member.reference);
        match self
            .assemble_primitive(&document.id, &document.primitive, &nested)
            .await
        {
            Err(AssembleError::Combine { id, source }) => {
                log::warn!("dropping member {id} of {}: {source}", ancestry.id);
                Ok(None)
            }
            assembled => assembled,
        }
    }
}

impl std::fmt::Debug for Assembler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assembler").finish_non_exhaustive()
    }
}
