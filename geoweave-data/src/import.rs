//! Turn a GeoJSON feature collection into fresh primitives.
//!
//! Every feature becomes one top-level primitive plus whatever nodes, ways
//! and nested relations its geometry needs. The whole collection is
//! written to the store as a single batch. The top-level primitive of each
//! feature is written without an id so the store assigns one; children get
//! generated ids so their parents can reference them.
//!
//! | Geometry | Written as |
//! |---|---|
//! | Point | tagged node |
//! | LineString | tagged way over one node per coordinate |
//! | Polygon, one ring | way tagged `area=yes`, closed by repeating the first node id |
//! | Polygon, several rings | tagged relation of ways: an `area=yes` way with role `outer`, untagged ways with role `inner` |
//! | MultiPoint | tagged relation of nodes |
//! | MultiLineString | tagged relation of ways |
//! | MultiPolygon | tagged relation of polygons written as above |
//! | GeometryCollection | tagged relation of parts written as above |
//!
//! Assembly unions area members without looking at roles, so a polygon
//! with holes does not export back as the same polygon. Its inner rings
//! carry no area tag and come back as closed line strings next to the
//! filled outer polygon, which keeps the holes visible.
//!
//! An [`Importer`] runs one import at a time. Observers learn about every
//! accepted import through [`Importer::subscribe`].

use std::sync::atomic::{AtomicBool, Ordering};

use geo::{Coord, Geometry, HasDimensions, LineString, Polygon};
use geoweave_core::geojson::parse_feature_collection;
use geoweave_core::{
    BatchOp, ElementKind, FeatureCollection, GeoJsonError, Member, Primitive, PrimitiveId,
    PrimitiveStore, StoreError, Tags, VersionToken, generate_id,
};
use thiserror::Error;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 16;

/// Input rejected before anything is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidImportInput {
    /// The document is not a feature collection with a `features` array.
    #[error("import expects a FeatureCollection with a features array")]
    MissingFeatures,
    /// A feature carries no geometry.
    #[error("feature {index} has no geometry")]
    MissingGeometry {
        /// Position of the feature in the collection.
        index: usize,
    },
    /// A feature's geometry holds no coordinates.
    #[error("feature {index} has an empty geometry")]
    EmptyGeometry {
        /// Position of the feature in the collection.
        index: usize,
    },
}

/// Failure returned by an import.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Another import is still running on the same importer.
    #[error("an import is already in progress")]
    Busy,
    /// The input was rejected before any write.
    #[error(transparent)]
    InvalidInput(#[from] InvalidImportInput),
    /// The input text could not be parsed.
    #[error(transparent)]
    GeoJson(#[from] GeoJsonError),
    /// Writing the batch failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Notification sent to subscribers once per accepted import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportEvent {
    /// The batch was written.
    Completed {
        /// Number of primitives written.
        written: usize,
    },
    /// The import failed after it was accepted.
    Failed {
        /// Rendered error.
        message: String,
    },
}

/// Outcome of a successful import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// Versions assigned by the store, in batch order.
    pub written: Vec<VersionToken>,
    /// Number of primitives submitted in the batch.
    pub primitives: usize,
}

/// Returns the importer to idle when dropped.
struct ImportGuard<'a> {
    importing: &'a AtomicBool,
}

impl Drop for ImportGuard<'_> {
    fn drop(&mut self) {
        self.importing.store(false, Ordering::Release);
    }
}

/// Writes feature collections into a store, one import at a time.
///
/// # Examples
///
/// ```
/// use geoweave_core::SqlitePrimitiveStore;
/// use geoweave_data::{ImportEvent, Importer};
///
/// let store = SqlitePrimitiveStore::open_in_memory()?;
/// let importer = Importer::new(&store);
/// let mut events = importer.subscribe();
/// let runtime = tokio::runtime::Builder::new_current_thread().build()?;
/// let report = runtime.block_on(importer.import_geojson(
///     r#"{"type":"FeatureCollection","features":[
///         {"type":"Feature","geometry":{"type":"Point","coordinates":[-0.1,51.5]},
///          "properties":{"amenity":"cafe"}}]}"#,
/// ))?;
/// assert_eq!(report.written.len(), 1);
/// assert_eq!(events.try_recv()?, ImportEvent::Completed { written: 1 });
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Importer<'a> {
    store: &'a dyn PrimitiveStore,
    importing: AtomicBool,
    events: broadcast::Sender<ImportEvent>,
}

impl std::fmt::Debug for Importer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Importer")
            .field("importing", &self.importing)
            .finish_non_exhaustive()
    }
}

impl<'a> Importer<'a> {
    /// Create an idle importer writing to `store`.
    #[must_use]
    pub fn new(store: &'a dyn PrimitiveStore) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            importing: AtomicBool::new(false),
            events,
        }
    }

    /// Receive an [`ImportEvent`] for every import accepted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ImportEvent> {
        self.events.subscribe()
    }

    /// Return `true` while an import is running.
    #[must_use]
    pub fn is_importing(&self) -> bool {
        self.importing.load(Ordering::Acquire)
    }

    /// Import an already parsed collection.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Busy`] when another import is running,
    /// [`ImportError::InvalidInput`] when a feature lacks a usable
    /// geometry, and [`ImportError::Store`] when the write fails.
    pub async fn import_feature_collection(
        &self,
        collection: &FeatureCollection,
    ) -> Result<ImportReport, ImportError> {
        let _guard = self.begin()?;
        let outcome = self.write(collection).await;
        self.notify(&outcome);
        outcome
    }

    /// Parse `text` as GeoJSON and import it.
    ///
    /// # Errors
    ///
    /// As [`Importer::import_feature_collection`], plus
    /// [`ImportError::GeoJson`] for malformed input and
    /// [`InvalidImportInput::MissingFeatures`] when the `features` array is
    /// absent.
    pub async fn import_geojson(&self, text: &str) -> Result<ImportReport, ImportError> {
        let _guard = self.begin()?;
        let outcome = match parse_feature_collection(text) {
            Ok(collection) => self.write(&collection).await,
            Err(GeoJsonError::MissingFeatures) => Err(InvalidImportInput::MissingFeatures.into()),
            Err(error) => Err(error.into()),
        };
        self.notify(&outcome);
        outcome
    }

    fn begin(&self) -> Result<ImportGuard<'_>, ImportError> {
        self.importing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ImportError::Busy)?;
        Ok(ImportGuard {
            importing: &self.importing,
        })
    }

    async fn write(&self, collection: &FeatureCollection) -> Result<ImportReport, ImportError> {
        validate(collection)?;
        let ops = build_batch(collection);
        let primitives = ops.len();
        let written = self.store.write_batch(ops).await?;
        log::debug!(
            "imported {} feature(s) as {primitives} primitive(s)",
            collection.features.len()
        );
        Ok(ImportReport {
            written,
            primitives,
        })
    }

    fn notify(&self, outcome: &Result<ImportReport, ImportError>) {
        let event = match outcome {
            Ok(report) => ImportEvent::Completed {
                written: report.written.len(),
            },
            Err(error) => {
                log::warn!("import failed: {error}");
                ImportEvent::Failed {
                    message: error.to_string(),
                }
            }
        };
        if self.events.send(event).is_err() {
            log::debug!("import finished with no subscribers");
        }
    }
}

fn validate(collection: &FeatureCollection) -> Result<(), InvalidImportInput> {
    for (index, feature) in collection.features.iter().enumerate() {
        let Some(geometry) = &feature.geometry else {
            return Err(InvalidImportInput::MissingGeometry { index });
        };
        if geometry.is_empty() {
            return Err(InvalidImportInput::EmptyGeometry { index });
        }
    }
    Ok(())
}

fn build_batch(collection: &FeatureCollection) -> Vec<BatchOp> {
    let mut builder = BatchBuilder {
        ops: Vec::new(),
        changeset: collection.changeset.clone(),
    };
    for feature in &collection.features {
        if let Some(geometry) = &feature.geometry {
            builder.add(None, geometry, feature.properties.clone());
        }
    }
    builder.ops
}

fn with_area(mut tags: Tags) -> Tags {
    tags.entry("area".to_owned())
        .or_insert_with(|| "yes".to_owned());
    tags
}

/// Ring coordinates without the closing repeat of the first one.
fn open_ring(ring: &LineString<f64>) -> &[Coord<f64>] {
    let coords = ring.0.as_slice();
    match coords.split_last() {
        Some((last, body)) if coords.len() > 1 && coords.first() == Some(last) => body,
        _ => coords,
    }
}

struct BatchBuilder {
    ops: Vec<BatchOp>,
    changeset: Option<String>,
}

impl BatchBuilder {
    fn put(&mut self, id: Option<PrimitiveId>, primitive: Primitive) {
        let value = primitive.with_changeset(self.changeset.clone());
        self.ops.push(BatchOp::Put { id, value });
    }

    /// Write a child under a generated id and return its membership entry.
    fn nested<F>(&mut self, build: F) -> Member
    where
        F: FnOnce(&mut Self, Option<PrimitiveId>) -> ElementKind,
    {
        let id = generate_id();
        let kind = build(self, Some(id.clone()));
        Member::new(kind, id)
    }

    fn node(&mut self, coord: Coord<f64>) -> PrimitiveId {
        let id = generate_id();
        self.put(Some(id.clone()), Primitive::node(coord.y, coord.x));
        id
    }

    fn line_refs(&mut self, line: &LineString<f64>) -> Vec<PrimitiveId> {
        line.coords().map(|coord| self.node(*coord)).collect()
    }

    fn ring_refs(&mut self, ring: &LineString<f64>) -> Vec<PrimitiveId> {
        let mut refs: Vec<PrimitiveId> = open_ring(ring)
            .iter()
            .map(|coord| self.node(*coord))
            .collect();
        if let Some(first) = refs.first().cloned() {
            refs.push(first);
        }
        refs
    }

    fn way(&mut self, id: Option<PrimitiveId>, refs: Vec<PrimitiveId>, tags: Tags) -> ElementKind {
        self.put(id, Primitive::way(refs).with_tags(tags));
        ElementKind::Way
    }

    fn relation(&mut self, id: Option<PrimitiveId>, members: Vec<Member>, tags: Tags) -> ElementKind {
        self.put(id, Primitive::relation(members).with_tags(tags));
        ElementKind::Relation
    }

    fn add(&mut self, id: Option<PrimitiveId>, geometry: &Geometry<f64>, tags: Tags) -> ElementKind {
        match geometry {
            Geometry::Point(point) => {
                self.put(id, Primitive::node(point.y(), point.x()).with_tags(tags));
                ElementKind::Node
            }
            Geometry::Line(line) => {
                let refs = self.line_refs(&LineString::from(*line));
                self.way(id, refs, tags)
            }
            Geometry::LineString(line) => {
                let refs = self.line_refs(line);
                self.way(id, refs, tags)
            }
            Geometry::Polygon(polygon) => self.polygon(id, polygon, tags),
            Geometry::Rect(rect) => self.polygon(id, &rect.to_polygon(), tags),
            Geometry::Triangle(triangle) => self.polygon(id, &triangle.to_polygon(), tags),
            Geometry::MultiPoint(points) => {
                let members = points
                    .iter()
                    .map(|point| Member::new(ElementKind::Node, self.node(point.0)))
                    .collect();
                self.relation(id, members, tags)
            }
            Geometry::MultiLineString(lines) => {
                let members = lines
                    .iter()
                    .map(|line| {
                        self.nested(|batch, child| {
                            let refs = batch.line_refs(line);
                            batch.way(child, refs, Tags::new())
                        })
                    })
                    .collect();
                self.relation(id, members, tags)
            }
            Geometry::MultiPolygon(polygons) => {
                let members = polygons
                    .iter()
                    .map(|polygon| {
                        self.nested(|batch, child| batch.polygon(child, polygon, Tags::new()))
                    })
                    .collect();
                self.relation(id, members, tags)
            }
            Geometry::GeometryCollection(parts) => {
                let members = parts
                    .iter()
                    .map(|part| self.nested(|batch, child| batch.add(child, part, Tags::new())))
                    .collect();
                self.relation(id, members, tags)
            }
        }
    }

    fn polygon(&mut self, id: Option<PrimitiveId>, polygon: &Polygon<f64>, tags: Tags) -> ElementKind {
        if polygon.interiors().is_empty() {
            let refs = self.ring_refs(polygon.exterior());
            return self.way(id, refs, with_area(tags));
        }
        let rings = std::iter::once((polygon.exterior(), "outer", with_area(Tags::new())))
            .chain(polygon.interiors().iter().map(|ring| (ring, "inner", Tags::new())));
        let members = rings
            .map(|(ring, role, ring_tags)| {
                self.nested(|batch, child| {
                    let refs = batch.ring_refs(ring);
                    batch.way(child, refs, ring_tags)
                })
                .with_role(role)
            })
            .collect();
        self.relation(id, members, tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use geo::{line_string, point, polygon};
    use geoweave_core::test_support::{FailingStore, MemoryStore};
    use geoweave_core::{Document, Element, Feature};
    use rstest::rstest;

    use crate::{ExportOptions, Exporter};

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("build runtime")
            .block_on(future)
    }

    fn collection(geometry: Geometry<f64>) -> FeatureCollection {
        let mut properties = Tags::new();
        properties.insert("name".into(), "Feature".into());
        FeatureCollection {
            features: vec![Feature::new(geometry, properties)],
            changeset: Some("cs-7".into()),
        }
    }

    fn import(store: &MemoryStore, geometry: Geometry<f64>) -> ImportReport {
        block_on(Importer::new(store).import_feature_collection(&collection(geometry)))
            .expect("import")
    }

    fn of_kind(store: &MemoryStore, kind: ElementKind) -> Vec<Document> {
        store
            .documents()
            .into_iter()
            .filter(|doc| doc.kind() == kind)
            .collect()
    }

    #[rstest]
    fn points_become_tagged_nodes() {
        let store = MemoryStore::default();
        let report = import(&store, Geometry::Point(point!(x: -0.1, y: 51.5)));
        assert_eq!(report.primitives, 1);
        let [node] = store.documents().try_into().expect("one document");
        assert_eq!(node.primitive.element, Element::Node { lat: 51.5, lon: -0.1 });
        assert_eq!(node.tags().get("name").map(String::as_str), Some("Feature"));
        assert_eq!(node.primitive.changeset.as_deref(), Some("cs-7"));
    }

    #[rstest]
    fn line_strings_become_ways_over_new_nodes() {
        let store = MemoryStore::default();
        let report = import(
            &store,
            Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)]),
        );
        assert_eq!(report.primitives, 4);
        let nodes = of_kind(&store, ElementKind::Node);
        let [way] = of_kind(&store, ElementKind::Way).try_into().expect("one way");
        let Element::Way { refs } = &way.primitive.element else {
            panic!("expected a way");
        };
        let node_ids: Vec<_> = nodes.iter().map(|doc| doc.id.clone()).collect();
        assert_eq!(refs, &node_ids);
        assert!(store.documents().iter().all(|doc| doc.primitive.changeset.as_deref() == Some("cs-7")));
    }

    #[rstest]
    fn single_ring_polygons_close_their_reference_list() {
        let store = MemoryStore::default();
        let report = import(
            &store,
            Geometry::Polygon(polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)]),
        );
        assert_eq!(report.primitives, 5);
        let [way] = of_kind(&store, ElementKind::Way).try_into().expect("one way");
        let Element::Way { refs } = &way.primitive.element else {
            panic!("expected a way");
        };
        assert_eq!(refs.len(), 5);
        assert_eq!(refs.first(), refs.last());
        assert_eq!(way.tags().get("area").map(String::as_str), Some("yes"));
    }

    #[rstest]
    fn feature_properties_override_the_area_tag() {
        let store = MemoryStore::default();
        let mut input = collection(Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0)
        ]));
        if let Some(feature) = input.features.first_mut() {
            feature.properties.insert("area".into(), "no".into());
        }
        block_on(Importer::new(&store).import_feature_collection(&input)).expect("import");
        let [way] = of_kind(&store, ElementKind::Way).try_into().expect("one way");
        assert_eq!(way.tags().get("area").map(String::as_str), Some("no"));
    }

    #[rstest]
    fn holed_polygons_become_relations_with_roles() {
        let store = MemoryStore::default();
        import(
            &store,
            Geometry::Polygon(polygon!(
                exterior: [(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0)],
                interiors: [[(x: 1.0, y: 1.0), (x: 1.0, y: 2.0), (x: 2.0, y: 2.0), (x: 2.0, y: 1.0)]],
            )),
        );
        let [relation] = of_kind(&store, ElementKind::Relation)
            .try_into()
            .expect("one relation");
        let Element::Relation { members } = &relation.primitive.element else {
            panic!("expected a relation");
        };
        let roles: Vec<_> = members.iter().map(|m| m.role.as_deref()).collect();
        assert_eq!(roles, [Some("outer"), Some("inner")]);
        assert!(members.iter().all(|m| m.kind == ElementKind::Way));
        assert_eq!(relation.tags().get("name").map(String::as_str), Some("Feature"));
        let area_tags: Vec<_> = members
            .iter()
            .map(|member| {
                of_kind(&store, ElementKind::Way)
                    .into_iter()
                    .find(|way| way.id == member.reference)
                    .and_then(|way| way.tags().get("area").cloned())
            })
            .collect();
        assert_eq!(area_tags, [Some("yes".to_owned()), None]);
    }

    #[rstest]
    fn holes_export_as_ring_lines_beside_the_outer_polygon() {
        let store = MemoryStore::default();
        import(
            &store,
            Geometry::Polygon(polygon!(
                exterior: [(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0)],
                interiors: [[(x: 1.0, y: 1.0), (x: 1.0, y: 2.0), (x: 2.0, y: 2.0), (x: 2.0, y: 1.0)]],
            )),
        );
        let exported = block_on(Exporter::new(&store, ExportOptions::default()).export_all())
            .expect("export");
        let [feature] = exported.features.try_into().expect("one feature");
        let Some(Geometry::GeometryCollection(parts)) = &feature.geometry else {
            panic!("expected a collection, got {:?}", feature.geometry);
        };
        assert!(matches!(
            parts.0.as_slice(),
            [Geometry::Polygon(outer), Geometry::LineString(hole)]
                if outer.interiors().is_empty() && hole.is_closed()
        ));
    }

    #[rstest]
    fn collections_nest_relations() {
        let store = MemoryStore::default();
        import(
            &store,
            Geometry::GeometryCollection(geo::GeometryCollection(vec![
                Geometry::Point(point!(x: 0.0, y: 0.0)),
                Geometry::MultiPoint(geo::MultiPoint(vec![point!(x: 1.0, y: 1.0), point!(x: 2.0, y: 2.0)])),
            ])),
        );
        let relations = of_kind(&store, ElementKind::Relation);
        assert_eq!(relations.len(), 2);
        let top = relations
            .iter()
            .find(|doc| doc.tags().contains_key("name"))
            .expect("tagged top-level relation");
        let Element::Relation { members } = &top.primitive.element else {
            panic!("expected a relation");
        };
        let kinds: Vec<_> = members.iter().map(|m| m.kind).collect();
        assert_eq!(kinds, [ElementKind::Node, ElementKind::Relation]);
    }

    #[rstest]
    fn missing_geometry_is_rejected_before_writing() {
        let store = MemoryStore::default();
        let mut input = collection(Geometry::Point(point!(x: 0.0, y: 0.0)));
        input.features.push(Feature {
            id: None,
            geometry: None,
            properties: Tags::new(),
        });
        let result = block_on(Importer::new(&store).import_feature_collection(&input));
        assert!(matches!(
            result,
            Err(ImportError::InvalidInput(InvalidImportInput::MissingGeometry { index: 1 }))
        ));
        assert!(store.documents().is_empty());
    }

    #[rstest]
    fn empty_geometry_is_rejected() {
        let store = MemoryStore::default();
        let input = collection(Geometry::LineString(LineString::new(Vec::new())));
        let result = block_on(Importer::new(&store).import_feature_collection(&input));
        assert!(matches!(
            result,
            Err(ImportError::InvalidInput(InvalidImportInput::EmptyGeometry { index: 0 }))
        ));
    }

    #[rstest]
    #[case::missing_features(r#"{"type":"FeatureCollection"}"#)]
    #[case::wrong_type(r#"{"type":"Feature","geometry":null,"properties":{}}"#)]
    #[case::not_json("nope")]
    fn malformed_text_fails_and_notifies(#[case] text: &str) {
        let store = MemoryStore::default();
        let importer = Importer::new(&store);
        let mut events = importer.subscribe();
        assert!(block_on(importer.import_geojson(text)).is_err());
        assert!(matches!(events.try_recv(), Ok(ImportEvent::Failed { .. })));
        assert!(!importer.is_importing());
    }

    #[rstest]
    fn store_failures_are_reported_once() {
        let importer = Importer::new(&FailingStore);
        let mut events = importer.subscribe();
        let result = block_on(
            importer.import_feature_collection(&collection(Geometry::Point(point!(x: 0.0, y: 0.0)))),
        );
        assert!(matches!(result, Err(ImportError::Store(_))));
        assert!(matches!(events.try_recv(), Ok(ImportEvent::Failed { .. })));
        assert!(events.try_recv().is_err());
    }

    /// Store whose writes yield once before completing.
    struct YieldingStore(MemoryStore);

    #[async_trait]
    impl PrimitiveStore for YieldingStore {
        async fn get_versions(&self, id: &str) -> Result<Vec<Document>, StoreError> {
            self.0.get_versions(id).await
        }

        async fn get_by_version(
            &self,
            version: &VersionToken,
        ) -> Result<Option<Document>, StoreError> {
            self.0.get_by_version(version).await
        }

        async fn get_referrers(&self, id: &str) -> Result<Vec<VersionToken>, StoreError> {
            self.0.get_referrers(id).await
        }

        async fn write_batch(&self, ops: Vec<BatchOp>) -> Result<Vec<VersionToken>, StoreError> {
            tokio::task::yield_now().await;
            self.0.write_batch(ops).await
        }

        async fn list_ids(&self) -> Result<Vec<PrimitiveId>, StoreError> {
            self.0.list_ids().await
        }
    }

    #[rstest]
    fn overlapping_imports_are_rejected() {
        let store = YieldingStore(MemoryStore::default());
        let importer = Importer::new(&store);
        let mut events = importer.subscribe();
        let input = collection(Geometry::Point(point!(x: 0.0, y: 0.0)));
        let (first, second) = block_on(async {
            tokio::join!(
                importer.import_feature_collection(&input),
                importer.import_feature_collection(&input)
            )
        });
        assert_eq!(first.expect("first import").written.len(), 1);
        assert!(matches!(second, Err(ImportError::Busy)));
        assert_eq!(store.0.documents().len(), 1);
        assert_eq!(events.try_recv().ok(), Some(ImportEvent::Completed { written: 1 }));
        assert!(events.try_recv().is_err());
        assert!(!importer.is_importing());
    }
}
