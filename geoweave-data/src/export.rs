//! Export stored primitives as a GeoJSON feature collection.
//!
//! For each id the winning fork is resolved, checked against the
//! [`EmissionFilter`], assembled, validated, and turned into a feature whose
//! properties are the primitive's tags plus the requested metadata.
//! Features that cannot be drawn are logged and skipped; store failures
//! abort the export.

use std::fmt;
use std::str::FromStr;

use futures_util::{StreamExt, TryStreamExt, stream};
use geo::orient::{Direction, Orient};
use geo::{Geometry, GeometryCollection, Validation};
use geoweave_core::{
    AreaClassifier, Document, Feature, FeatureCollection, OsmPolygonRules, PrimitiveId,
    PrimitiveStore, StoreError, TagFilter,
};
use geoweave_geometry::{is_empty_geometry, type_name};
use thiserror::Error;

use crate::assemble::{AssembleError, Assembler};
use crate::emit::{DEFAULT_REFERRER_CONCURRENCY, EmissionFilter};
use crate::resolve::resolve;

/// Number of primitives processed concurrently by default.
pub const DEFAULT_EXPORT_CONCURRENCY: usize = 16;

static DEFAULT_CLASSIFIER: OsmPolygonRules = OsmPolygonRules;

/// Document metadata that may be copied into feature properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetadataField {
    /// The primitive id, as property `id`.
    Id,
    /// The winning version token, as property `version`.
    Version,
    /// The fork timestamp in milliseconds, as property `timestamp`.
    Timestamp,
}

impl MetadataField {
    /// Every field, in property order.
    pub const ALL: [Self; 3] = [Self::Id, Self::Version, Self::Timestamp];

    /// Property key the field is written under.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Version => "version",
            Self::Timestamp => "timestamp",
        }
    }

    fn value(self, document: &Document) -> Option<String> {
        match self {
            Self::Id => Some(document.id.clone()),
            Self::Version => Some(document.version.to_string()),
            Self::Timestamp => document.timestamp.map(|ts| ts.to_string()),
        }
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Error returned when parsing an unknown metadata field name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown metadata field `{0}`; expected id, version or timestamp")]
pub struct UnknownMetadataField(pub String);

impl FromStr for MetadataField {
    type Err = UnknownMetadataField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "id" => Ok(Self::Id),
            "version" => Ok(Self::Version),
            "timestamp" => Ok(Self::Timestamp),
            other => Err(UnknownMetadataField(other.to_owned())),
        }
    }
}

/// Settings controlling an export run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Metadata copied into properties, overriding tags of the same name.
    pub metadata: Vec<MetadataField>,
    /// Orient polygon rings counter-clockwise outside, clockwise inside.
    pub rewind: bool,
    /// Tag interest rules for the emission filter.
    pub tag_filter: TagFilter,
    /// Referrer lookups in flight per primitive.
    pub referrer_concurrency: usize,
    /// Primitives processed concurrently.
    pub export_concurrency: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            metadata: MetadataField::ALL.to_vec(),
            rewind: true,
            tag_filter: TagFilter::default(),
            referrer_concurrency: DEFAULT_REFERRER_CONCURRENCY,
            export_concurrency: DEFAULT_EXPORT_CONCURRENCY,
        }
    }
}

impl ExportOptions {
    /// Replace the metadata fields copied into properties.
    #[must_use]
    pub fn with_metadata(mut self, metadata: impl IntoIterator<Item = MetadataField>) -> Self {
        self.metadata = metadata.into_iter().collect();
        self
    }

    /// Enable or disable polygon rewinding.
    #[must_use]
    pub const fn with_rewind(mut self, rewind: bool) -> Self {
        self.rewind = rewind;
        self
    }

    /// Replace the tag interest rules.
    #[must_use]
    pub fn with_tag_filter(mut self, tag_filter: TagFilter) -> Self {
        self.tag_filter = tag_filter;
        self
    }

    /// Bound the number of primitives processed concurrently.
    #[must_use]
    pub const fn with_export_concurrency(mut self, concurrency: usize) -> Self {
        self.export_concurrency = concurrency;
        self
    }
}

/// Failure that aborts an export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Reading from the store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Exports stored primitives as features.
pub struct Exporter<'a> {
    store: &'a dyn PrimitiveStore,
    classifier: &'a dyn AreaClassifier,
    filter: EmissionFilter,
    options: ExportOptions,
}

impl fmt::Debug for Exporter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exporter")
            .field("filter", &self.filter)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<'a> Exporter<'a> {
    /// Create an exporter over `store` using [`OsmPolygonRules`].
    #[must_use]
    pub fn new(store: &'a dyn PrimitiveStore, options: ExportOptions) -> Self {
        let filter = EmissionFilter::new(options.tag_filter.clone())
            .with_concurrency(options.referrer_concurrency);
        Self {
            store,
            classifier: &DEFAULT_CLASSIFIER,
            filter,
            options,
        }
    }

    /// Replace the classifier deciding whether closed ways are areas.
    #[must_use]
    pub const fn with_classifier(mut self, classifier: &'a dyn AreaClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Export every primitive the store lists.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Store`] when listing or reading fails.
    pub async fn export_all(&self) -> Result<FeatureCollection, ExportError> {
        let ids = self.store.list_ids().await?;
        log::debug!("exporting {} primitive id(s)", ids.len());
        self.export_ids(&ids).await
    }

    /// Export the given ids, keeping their order in the output.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Store`] when any read fails.
    pub async fn export_ids(&self, ids: &[PrimitiveId]) -> Result<FeatureCollection, ExportError> {
        let features: Vec<Option<Feature>> = stream::iter(ids)
            .map(|id| self.export_id(id))
            .buffered(self.options.export_concurrency.max(1))
            .try_collect()
            .await?;
        Ok(FeatureCollection::new(features.into_iter().flatten().collect()))
    }

    async fn export_id(&self, id: &str) -> Result<Option<Feature>, ExportError> {
        let Some(document) = resolve(self.store, id).await? else {
            return Ok(None);
        };
        self.export_document(&document).await
    }

    /// Turn one document into a feature, or `None` when it is not exported
    /// on its own or cannot be drawn.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Store`] when a read fails.
    pub async fn export_document(&self, document: &Document) -> Result<Option<Feature>, ExportError> {
        if !self.filter.should_emit(self.store, document).await? {
            return Ok(None);
        }
        let assembled = match Assembler::new(self.store, self.classifier)
            .assemble(document)
            .await
        {
            Ok(Some(geometry)) => geometry,
            Ok(None) => {
                log::debug!("skipping {}: nothing to draw", document.id);
                return Ok(None);
            }
            Err(AssembleError::Store(error)) => return Err(error.into()),
            Err(error @ AssembleError::Combine { .. }) => {
                log::warn!("skipping {}: {error}", document.id);
                return Ok(None);
            }
        };
        if is_empty_geometry(&assembled) {
            log::debug!("skipping {}: empty geometry", document.id);
            return Ok(None);
        }
        if !assembled.is_valid() {
            log::warn!(
                "skipping {}: invalid {} geometry",
                document.id,
                type_name(&assembled)
            );
            return Ok(None);
        }
        let geometry = if self.options.rewind {
            rewind(assembled)
        } else {
            assembled
        };
        let mut properties = document.tags().clone();
        for field in &self.options.metadata {
            if let Some(value) = field.value(document) {
                properties.insert(field.key().to_owned(), value);
            }
        }
        Ok(Some(Feature::new(geometry, properties).with_id(document.id.clone())))
    }
}

/// Orient polygon rings counter-clockwise outside and clockwise inside.
fn rewind(geometry: Geometry<f64>) -> Geometry<f64> {
    match geometry {
        Geometry::Polygon(polygon) => Geometry::Polygon(polygon.orient(Direction::Default)),
        Geometry::MultiPolygon(polygons) => {
            Geometry::MultiPolygon(polygons.orient(Direction::Default))
        }
        Geometry::GeometryCollection(collection) => Geometry::GeometryCollection(
            GeometryCollection(collection.0.into_iter().map(rewind).collect()),
        ),
        other => other,
    }
}
