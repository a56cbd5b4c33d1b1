//! Test helpers for staging GeoJSON inputs and store paths.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tempfile::TempDir;

pub(super) const PARK_AND_CAFE: &str = r#"{
  "type": "FeatureCollection",
  "changeset": "survey-1",
  "features": [
    {
      "type": "Feature",
      "geometry": {
        "type": "Polygon",
        "coordinates": [[[0, 0], [2, 0], [2, 1], [0, 1], [0, 0]]]
      },
      "properties": { "name": "Park", "leisure": "park" }
    },
    {
      "type": "Feature",
      "geometry": { "type": "Point", "coordinates": [5, 5] },
      "properties": { "name": "Cafe", "amenity": "cafe" }
    }
  ]
}"#;

/// Temporary directory holding inputs, stores and outputs for one test.
#[derive(Debug)]
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        Self { _dir: dir, root }
    }

    pub(super) fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub(super) fn write(&self, name: &str, contents: &str) -> Utf8PathBuf {
        let path = self.root.join(name);
        fs::write(&path, contents).expect("write input file");
        path
    }

    pub(super) fn geojson(&self) -> Utf8PathBuf {
        self.write("features.geojson", PARK_AND_CAFE)
    }

    pub(super) fn db(&self) -> Utf8PathBuf {
        self.root.join("store/primitives.db")
    }
}

/// Feature names found in an exported collection, sorted.
pub(super) fn exported_names(json: &str) -> Vec<String> {
    let value: serde_json::Value = serde_json::from_str(json).expect("export is JSON");
    let mut names: Vec<String> = value["features"]
        .as_array()
        .expect("features array")
        .iter()
        .filter_map(|feature| feature["properties"]["name"].as_str().map(str::to_owned))
        .collect();
    names.sort();
    names
}
