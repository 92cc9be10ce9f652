//! End-to-end tests for the spatial pipeline.
//!
//! These run the full composition - source → validate → reproject → clip →
//! tile → fetch → store - against in-memory collaborators, checking the
//! stage ordering and the accounting that unit tests cover only piecewise.

use std::cell::RefCell;
use std::collections::HashMap;

use geo::{polygon, Geometry};

use crate::pipeline::{
    CollaboratorError, DatasetSource, ImageryFetch, ImageryResponse, Pipeline, PipelineConfig,
    RasterStore,
};
use crate::tile::Tile;
use crate::{tile_filename, Crs, Error, Feature, VectorDataset};

// ============================================================================
// In-memory collaborators
// ============================================================================

struct MemorySource {
    datasets: HashMap<String, VectorDataset>,
}

impl MemorySource {
    fn new(datasets: Vec<VectorDataset>) -> Self {
        Self {
            datasets: datasets
                .into_iter()
                .map(|d| (d.name.clone(), d))
                .collect(),
        }
    }
}

impl DatasetSource for MemorySource {
    fn load(&self, name: &str) -> Result<VectorDataset, CollaboratorError> {
        self.datasets
            .get(name)
            .cloned()
            .ok_or_else(|| format!("no dataset named `{}`", name).into())
    }
}

/// Returns a fixed payload and counts how often it was asked.
struct CountingFetch {
    calls: RefCell<usize>,
}

impl CountingFetch {
    fn new() -> Self {
        Self {
            calls: RefCell::new(0),
        }
    }

    fn call_count(&self) -> usize {
        *self.calls.borrow()
    }
}

impl ImageryFetch for CountingFetch {
    fn fetch(
        &self,
        tile: &Tile,
        width_px: u32,
        height_px: u32,
    ) -> Result<ImageryResponse, CollaboratorError> {
        *self.calls.borrow_mut() += 1;
        Ok(ImageryResponse {
            area_name: tile.name.clone(),
            tile_code: tile.code.to_string(),
            data: vec![0u8; 64],
            width_px,
            height_px,
            crs: "EPSG:3857".to_string(),
            bbox: tile.bbox,
        })
    }
}

struct MemoryStore {
    stored: RefCell<Vec<String>>,
}

impl MemoryStore {
    fn new() -> Self {
        Self {
            stored: RefCell::new(Vec::new()),
        }
    }
}

impl RasterStore for MemoryStore {
    fn store(&self, response: &ImageryResponse) -> Result<String, CollaboratorError> {
        let filename = tile_filename(&response.area_name, &response.tile_code, "tif");
        self.stored.borrow_mut().push(filename.clone());
        Ok(filename)
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn rect(minx: f64, miny: f64, maxx: f64, maxy: f64) -> Geometry<f64> {
    Geometry::Polygon(polygon![
        (x: minx, y: miny),
        (x: maxx, y: miny),
        (x: maxx, y: maxy),
        (x: minx, y: maxy),
        (x: minx, y: miny),
    ])
}

fn albers() -> Option<Crs> {
    Some(Crs::from_user_input("EPSG:5070").unwrap())
}

/// Boundary: one feature covering (0,0)..(10_000,10_000), meters.
fn state_boundary() -> VectorDataset {
    VectorDataset::new(
        "state",
        albers(),
        vec![Feature::new(0, rect(0.0, 0.0, 10_000.0, 10_000.0)).with_attribute("name", "Testland")],
    )
}

/// Pipeline configured to stay in the synthetic Albers frame end to end.
fn albers_pipeline() -> Pipeline {
    Pipeline::new(
        PipelineConfig::default()
            .with_analysis_crs("EPSG:5070")
            .with_tiling_crs("EPSG:5070"),
    )
}

// ============================================================================
// Vector-half scenarios
// ============================================================================

/// One park outside the boundary, one inside: the outside park disappears,
/// the inside park is untouched, and the dataset retains 100%.
#[test]
fn test_outside_feature_dropped_inside_retained() {
    let parks = VectorDataset::new(
        "parks",
        albers(),
        vec![
            Feature::new(1, rect(2_000.0, 2_000.0, 4_000.0, 4_000.0))
                .with_attribute("name", "Inner"),
            Feature::new(2, rect(20_000.0, 20_000.0, 22_000.0, 22_000.0))
                .with_attribute("name", "Outer"),
        ],
    );

    let analysis = albers_pipeline()
        .analyze(&parks, &state_boundary())
        .unwrap();

    assert_eq!(analysis.clipped.len(), 1);
    assert_eq!(analysis.clipped.features[0].fid, 1);
    assert_eq!(analysis.report.dropped_count, 1);
    assert_eq!(analysis.report.features.len(), 1);
    assert_eq!(analysis.report.features[0].percent_retained, 100);
    assert_eq!(analysis.report.percent_retained, 100.0);
}

/// A park straddling the boundary with 60% of its area inside is reported at
/// 60% and flagged as boundary-crossing.
#[test]
fn test_straddling_feature_reported_at_sixty_percent() {
    let parks = VectorDataset::new(
        "parks",
        albers(),
        vec![Feature::new(3, rect(7_000.0, 1_000.0, 12_000.0, 2_000.0))
            .with_attribute("name", "Straddler")],
    );

    let analysis = albers_pipeline()
        .analyze(&parks, &state_boundary())
        .unwrap();

    let record = &analysis.report.features[0];
    assert_eq!(record.percent_retained, 60);
    assert!(record.crosses_boundary());
    assert_eq!(analysis.report.percent_retained, 60.0);
}

/// A null geometry aborts the run during validation, before any
/// reprojection, clipping, or imagery traffic happens.
#[test]
fn test_null_geometry_aborts_before_imagery() {
    let parks = VectorDataset::new(
        "parks",
        albers(),
        vec![
            Feature::new(1, rect(2_000.0, 2_000.0, 4_000.0, 4_000.0)),
            Feature::null_geometry(2),
        ],
    );
    let source = MemorySource::new(vec![parks, state_boundary()]);
    let fetch = CountingFetch::new();
    let store = MemoryStore::new();

    let result = albers_pipeline().run(&source, "parks", "state", &fetch, &store);

    assert!(matches!(result, Err(Error::NullGeometry { fid: 2 })));
    assert_eq!(fetch.call_count(), 0);
    assert!(store.stored.borrow().is_empty());
}

// ============================================================================
// Full-run scenarios
// ============================================================================

/// Full run: two parks inside the boundary produce a predictable tile count
/// and one stored file per tile.
#[test]
fn test_full_run_fetches_and_stores_every_tile() {
    let parks = VectorDataset::new(
        "parks",
        albers(),
        vec![
            // 2 km x 2 km spanning the 2.5 km grid line: 2x2 = 4 tiles.
            Feature::new(1, rect(1_000.0, 1_000.0, 3_000.0, 3_000.0))
                .with_attribute("name", "Quad Park"),
            // 1 km x 1 km within a single cell: 1 tile.
            Feature::new(2, rect(6_000.0, 6_000.0, 7_000.0, 7_000.0))
                .with_attribute("name", "Mono Park"),
        ],
    );
    let source = MemorySource::new(vec![parks, state_boundary()]);
    let fetch = CountingFetch::new();
    let store = MemoryStore::new();

    let summary = albers_pipeline()
        .run(&source, "parks", "state", &fetch, &store)
        .unwrap();

    assert_eq!(summary.tile_count, 5);
    assert_eq!(fetch.call_count(), 5);
    assert_eq!(summary.stored.len(), 5);

    let stored = store.stored.borrow();
    assert!(stored.contains(&"quad_park_0_0.tif".to_string()));
    assert!(stored.contains(&"quad_park_1_1.tif".to_string()));
    assert!(stored.contains(&"mono_park_2_2.tif".to_string()));
    // Filenames are unique across all tiles of the run.
    let mut deduped = stored.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), stored.len());
}

/// A missing dataset is a collaborator failure surfaced unmodified.
#[test]
fn test_missing_dataset_propagates_source_error() {
    let source = MemorySource::new(vec![state_boundary()]);
    let fetch = CountingFetch::new();
    let store = MemoryStore::new();

    let result = albers_pipeline().run(&source, "parks", "state", &fetch, &store);

    match result {
        Err(Error::Collaborator(e)) => assert!(e.to_string().contains("parks")),
        other => panic!("expected collaborator error, got {:?}", other.map(|_| ())),
    }
}

/// The clip report serializes with the documented field names.
#[test]
fn test_report_serialization_shape() {
    let parks = VectorDataset::new(
        "parks",
        albers(),
        vec![Feature::new(1, rect(2_000.0, 2_000.0, 4_000.0, 4_000.0))],
    );

    let analysis = albers_pipeline()
        .analyze(&parks, &state_boundary())
        .unwrap();

    let json = serde_json::to_value(&analysis.report).unwrap();
    assert!(json.get("total_original_km2").is_some());
    assert!(json.get("total_clipped_km2").is_some());
    assert!(json.get("percent_retained").is_some());
    let features = json.get("features").unwrap().as_array().unwrap();
    assert_eq!(features[0].get("fid").unwrap(), 1);
}
