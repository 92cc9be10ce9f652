//! Pipeline composition - wires together validation, reprojection, clipping,
//! and tile generation, handing results to external collaborators.
//!
//! The core never touches the filesystem or the network. Datasets come in
//! through [`DatasetSource`], imagery goes out through [`ImageryFetch`] and
//! [`RasterStore`]; their failures pass through the pipeline untouched.
//!
//! Every stage consumes its input and produces a new value, so tiles for
//! independent areas can safely be fetched in parallel by callers - there is
//! no shared mutable state anywhere in the core.

use serde::Serialize;

use crate::clip::{clip_and_analyze, ClipResult};
use crate::crs::Crs;
use crate::dataset::VectorDataset;
use crate::reproject::reproject;
use crate::tile::{areas_of_interest, BBox, Tile, TileGrid};
use crate::validate::validate;
use crate::Result;

/// Default analysis CRS: CONUS Albers, equal-area, meters.
pub const DEFAULT_ANALYSIS_CRS: &str = "EPSG:5070";
/// Default tiling CRS: Web Mercator, the raster services' native frame.
pub const DEFAULT_TILING_CRS: &str = "EPSG:3857";
/// Default raster tile size in pixels.
pub const DEFAULT_TILE_SIZE_PX: u32 = 2500;
/// Default ground resolution in map units per pixel.
pub const DEFAULT_RESOLUTION: f64 = 1.0;

/// Errors signalled by external collaborators; the core propagates them
/// unmodified.
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// Supplies a [`VectorDataset`] for a logical name.
///
/// The returned dataset may carry an undefined CRS and null, empty, or
/// invalid geometries; the pipeline's validator is responsible for
/// rejecting or repairing those.
pub trait DatasetSource {
    fn load(&self, name: &str) -> std::result::Result<VectorDataset, CollaboratorError>;
}

/// Raw raster bytes for one tile, with the request echoed back.
#[derive(Debug, Clone)]
pub struct ImageryResponse {
    pub area_name: String,
    pub tile_code: String,
    pub data: Vec<u8>,
    pub width_px: u32,
    pub height_px: u32,
    pub crs: String,
    pub bbox: BBox,
}

/// Fetches raster imagery for a tile at a fixed pixel size.
pub trait ImageryFetch {
    fn fetch(
        &self,
        tile: &Tile,
        width_px: u32,
        height_px: u32,
    ) -> std::result::Result<ImageryResponse, CollaboratorError>;
}

/// Persists fetched raster bytes; returns the stored identifier.
pub trait RasterStore {
    fn store(&self, response: &ImageryResponse) -> std::result::Result<String, CollaboratorError>;
}

/// Configuration for a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Equal-area CRS used for clipping and area statistics.
    pub analysis_crs: String,
    /// Projected, meter-based CRS used as the tiling frame.
    pub tiling_crs: String,
    pub tile_width_px: u32,
    pub tile_height_px: u32,
    /// Ground resolution in map units per pixel.
    pub resolution: f64,
    /// Feature attribute that names each area-of-interest.
    pub name_attribute: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            analysis_crs: DEFAULT_ANALYSIS_CRS.to_string(),
            tiling_crs: DEFAULT_TILING_CRS.to_string(),
            tile_width_px: DEFAULT_TILE_SIZE_PX,
            tile_height_px: DEFAULT_TILE_SIZE_PX,
            resolution: DEFAULT_RESOLUTION,
            name_attribute: "name".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Set the analysis CRS.
    pub fn with_analysis_crs(mut self, crs: impl Into<String>) -> Self {
        self.analysis_crs = crs.into();
        self
    }

    /// Set the tiling CRS.
    pub fn with_tiling_crs(mut self, crs: impl Into<String>) -> Self {
        self.tiling_crs = crs.into();
        self
    }

    /// Set the raster tile size in pixels.
    pub fn with_tile_size(mut self, width_px: u32, height_px: u32) -> Self {
        self.tile_width_px = width_px;
        self.tile_height_px = height_px;
        self
    }

    /// Set the ground resolution in map units per pixel.
    pub fn with_resolution(mut self, resolution: f64) -> Self {
        self.resolution = resolution;
        self
    }

    /// Set the attribute that names areas-of-interest.
    pub fn with_name_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.name_attribute = attribute.into();
        self
    }
}

/// Result of the vector half of the pipeline.
#[derive(Debug, Clone)]
pub struct VectorAnalysis {
    /// Subject features clipped to the boundary, in the analysis CRS.
    pub clipped: VectorDataset,
    pub report: ClipResult,
}

/// Accounting for a full pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub report: ClipResult,
    pub tile_count: usize,
    /// Identifiers returned by the raster store, one per tile.
    pub stored: Vec<String>,
}

/// The spatial processing pipeline.
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the vector half: validate both datasets, bring them into the
    /// analysis CRS, and clip the subject to the boundary.
    pub fn analyze(
        &self,
        subject: &VectorDataset,
        boundary: &VectorDataset,
    ) -> Result<VectorAnalysis> {
        let analysis_crs = Crs::from_user_input(&self.config.analysis_crs)?;

        let subject = validate(subject)?;
        let boundary = validate(boundary)?;

        let subject = reproject(subject, &analysis_crs)?;
        let boundary = reproject(boundary, &analysis_crs)?;

        let (clipped, report) = clip_and_analyze(&subject, &boundary)?;

        Ok(VectorAnalysis { clipped, report })
    }

    /// Turn a clipped dataset into imagery request tiles: reproject to the
    /// tiling CRS, take per-feature bounds, and cover them with grid cells.
    pub fn tiles(&self, clipped: VectorDataset) -> Result<Vec<Tile>> {
        let tiling_crs = Crs::from_user_input(&self.config.tiling_crs)?;
        let projected = reproject(clipped, &tiling_crs)?;

        let areas = areas_of_interest(&projected, &self.config.name_attribute);
        let grid = TileGrid::new(
            self.config.resolution,
            self.config.tile_width_px,
            self.config.tile_height_px,
        );
        let tiles = grid.generate(&areas);

        log::info!(
            "generated {} tiles across {} areas ({}x{} px at {} m/px)",
            tiles.len(),
            areas.len(),
            self.config.tile_width_px,
            self.config.tile_height_px,
            self.config.resolution
        );

        Ok(tiles)
    }

    /// Run the full pipeline.
    ///
    /// Steps:
    /// 1. Load the subject and boundary datasets from the source
    /// 2. Validate, reproject, clip, and measure (the vector half)
    /// 3. Reproject the clipped features to the tiling CRS and cover each
    ///    area's bounds with grid tiles
    /// 4. Fetch and store imagery for every tile
    pub fn run(
        &self,
        source: &dyn DatasetSource,
        subject_name: &str,
        boundary_name: &str,
        imagery: &dyn ImageryFetch,
        store: &dyn RasterStore,
    ) -> Result<RunSummary> {
        let subject = source.load(subject_name)?;
        let boundary = source.load(boundary_name)?;

        let analysis = self.analyze(&subject, &boundary)?;
        log::info!(
            "analysis: {:.2} of {:.2} km2 retained ({}%), {} features dropped",
            analysis.report.total_clipped_km2,
            analysis.report.total_original_km2,
            analysis.report.percent_retained,
            analysis.report.dropped_count
        );

        let tiles = self.tiles(analysis.clipped)?;

        let mut stored = Vec::with_capacity(tiles.len());
        for tile in &tiles {
            let response =
                imagery.fetch(tile, self.config.tile_width_px, self.config.tile_height_px)?;
            stored.push(store.store(&response)?);
        }

        Ok(RunSummary {
            report: analysis.report,
            tile_count: tiles.len(),
            stored,
        })
    }
}

/// Deterministic, collision-free filename for a stored tile.
///
/// The area name is slugged (lowercased, non-alphanumeric runs collapsed to
/// `_`) and combined with the tile code, which is unique per area.
pub fn tile_filename(area_name: &str, tile_code: &str, extension: &str) -> String {
    format!("{}_{}.{}", slug(area_name), tile_code, extension)
}

fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_sep = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}
