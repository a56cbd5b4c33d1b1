//! Behavioural tests for importing feature collections.

use std::cell::RefCell;

use async_trait::async_trait;
use geo::{Geometry, Polygon, point, polygon};
use geoweave_core::test_support::MemoryStore;
use geoweave_core::{
    BatchOp, Document, Feature, FeatureCollection, PrimitiveId, PrimitiveStore, StoreError, Tags,
    VersionToken,
};
use geoweave_data::{
    ExportOptions, Exporter, ImportError, ImportEvent, ImportReport, Importer,
};
use geoweave_geometry::polygons_equivalent;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

/// Memory store whose writes yield to the runtime once before completing,
/// so overlapping imports genuinely overlap.
#[derive(Default)]
struct YieldingStore(MemoryStore);

#[async_trait]
impl PrimitiveStore for YieldingStore {
    async fn get_versions(&self, id: &str) -> Result<Vec<Document>, StoreError> {
        self.0.get_versions(id).await
    }

    async fn get_by_version(&self, version: &VersionToken) -> Result<Option<Document>, StoreError> {
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

type ImportOutcome = Result<ImportReport, ImportError>;

/// Shared state for import scenarios.
struct ImportWorld {
    store: YieldingStore,
    outcomes: RefCell<Vec<ImportOutcome>>,
    events: RefCell<Vec<ImportEvent>>,
    exported: RefCell<Option<FeatureCollection>>,
    runtime: tokio::runtime::Runtime,
}

impl ImportWorld {
    fn new() -> Self {
        Self {
            store: YieldingStore::default(),
            outcomes: RefCell::new(Vec::new()),
            events: RefCell::new(Vec::new()),
            exported: RefCell::new(None),
            runtime: tokio::runtime::Builder::new_current_thread()
                .build()
                .expect("build runtime"),
        }
    }
}

fn park() -> Polygon<f64> {
    polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 1.0), (x: 0.0, y: 1.0)]
}

fn single_feature(geometry: Geometry<f64>, name: &str) -> FeatureCollection {
    let mut properties = Tags::new();
    properties.insert("name".to_owned(), name.to_owned());
    FeatureCollection {
        features: vec![Feature::new(geometry, properties)],
        changeset: Some("import-1".to_owned()),
    }
}

#[fixture]
fn world() -> ImportWorld {
    ImportWorld::new()
}

#[given("an empty primitive store")]
fn empty_store(world: &ImportWorld) {
    assert!(world.store.0.documents().is_empty());
}

#[when("I import a square park polygon")]
fn import_park(world: &ImportWorld) {
    let importer = Importer::new(&world.store);
    let input = single_feature(Geometry::Polygon(park()), "Park");
    let outcome = world
        .runtime
        .block_on(importer.import_feature_collection(&input));
    world.outcomes.borrow_mut().push(outcome);
}

#[when("I export every primitive")]
fn export_all(world: &ImportWorld) {
    let exporter = Exporter::new(&world.store, ExportOptions::default());
    let collection = world
        .runtime
        .block_on(exporter.export_all())
        .expect("export");
    world.exported.replace(Some(collection));
}

#[when("I start two imports of a cafe at once")]
fn overlapping_imports(world: &ImportWorld) {
    let importer = Importer::new(&world.store);
    let mut events = importer.subscribe();
    let input = single_feature(Geometry::Point(point!(x: -0.1, y: 51.5)), "Cafe");
    let (first, second) = world.runtime.block_on(async {
        tokio::join!(
            importer.import_feature_collection(&input),
            importer.import_feature_collection(&input)
        )
    });
    world.outcomes.borrow_mut().extend([first, second]);
    while let Ok(event) = events.try_recv() {
        world.events.borrow_mut().push(event);
    }
}

#[then("the exported park has the imported ring")]
fn park_round_trips(world: &ImportWorld) {
    let exported = world.exported.borrow();
    let collection = exported.as_ref().expect("export should have run");
    let [feature] = collection.features.as_slice() else {
        panic!("expected exactly the park, got {collection:?}");
    };
    assert_eq!(
        feature.properties.get("name").map(String::as_str),
        Some("Park")
    );
    let Some(Geometry::Polygon(ring)) = &feature.geometry else {
        panic!("park should export as a polygon");
    };
    assert!(polygons_equivalent(ring, &park()));
}

#[then("the first import writes 1 primitive")]
fn first_import_succeeds(world: &ImportWorld) {
    let outcomes = world.outcomes.borrow();
    let Some(Ok(report)) = outcomes.first() else {
        panic!("first import should succeed, got {outcomes:?}");
    };
    assert_eq!(report.written.len(), 1);
    assert_eq!(world.store.0.documents().len(), 1);
}

#[then("the second import is rejected as busy")]
fn second_import_is_busy(world: &ImportWorld) {
    let outcomes = world.outcomes.borrow();
    assert!(matches!(outcomes.get(1), Some(Err(ImportError::Busy))));
}

#[then("observers hear about the first import only")]
fn one_event(world: &ImportWorld) {
    assert_eq!(
        world.events.borrow().as_slice(),
        [ImportEvent::Completed { written: 1 }]
    );
}

#[scenario(path = "tests/features/import.feature", index = 0)]
fn polygon_round_trip(world: ImportWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/import.feature", index = 1)]
fn imports_are_single_flight(world: ImportWorld) {
    let _ = world;
}
