//! Tile grid math over projected bounding boxes.
//!
//! The grid is a fixed-step partition of the working (meter-based) CRS,
//! anchored at the global origin `(0, 0)`. Tile steps derive from the
//! requested raster size: `step = pixels × resolution`. Because the anchor,
//! step, and enumeration order are all fixed, re-tiling the same area with
//! the same parameters always yields the same tiles with the same codes.
//!
//! Tiles for different areas-of-interest are generated independently; areas
//! with touching or overlapping bounds will emit duplicate tiles. That
//! redundancy is accepted - deduplication across areas is out of scope.

use serde::Serialize;

use crate::dataset::VectorDataset;

/// Global grid anchor.
pub const GRID_ORIGIN_X: f64 = 0.0;
pub const GRID_ORIGIN_Y: f64 = 0.0;

/// A bounding box `(minx, miny, maxx, maxy)` in a projected CRS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BBox {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

impl BBox {
    pub fn new(minx: f64, miny: f64, maxx: f64, maxy: f64) -> Self {
        Self {
            minx,
            miny,
            maxx,
            maxy,
        }
    }

    /// An empty/invalid bounding box that expands from nothing.
    pub fn empty() -> Self {
        Self {
            minx: f64::INFINITY,
            miny: f64::INFINITY,
            maxx: f64::NEG_INFINITY,
            maxy: f64::NEG_INFINITY,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.minx <= self.maxx && self.miny <= self.maxy
    }

    /// Expand this bounding box to include another.
    pub fn expand(&mut self, other: &Self) {
        self.minx = self.minx.min(other.minx);
        self.miny = self.miny.min(other.miny);
        self.maxx = self.maxx.max(other.maxx);
        self.maxy = self.maxy.max(other.maxy);
    }

    pub fn width(&self) -> f64 {
        self.maxx - self.minx
    }

    pub fn height(&self) -> f64 {
        self.maxy - self.miny
    }

    /// Whether `other` lies entirely within this box.
    pub fn contains(&self, other: &Self) -> bool {
        self.minx <= other.minx
            && self.miny <= other.miny
            && self.maxx >= other.maxx
            && self.maxy >= other.maxy
    }
}

/// Position of a tile on the global grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TileCode {
    pub ix: i64,
    pub iy: i64,
}

impl std::fmt::Display for TileCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.ix, self.iy)
    }
}

/// An area-of-interest to be covered with tiles.
#[derive(Debug, Clone, Serialize)]
pub struct AreaOfInterest {
    pub fid: u64,
    pub name: String,
    pub bbox: BBox,
}

/// A single imagery request descriptor.
///
/// Tiles are transient: generated fresh per run from an area's bounds,
/// never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Tile {
    pub fid: u64,
    pub name: String,
    pub code: TileCode,
    pub bbox: BBox,
}

/// Fixed-step tile grid anchored at the global origin.
#[derive(Debug, Clone, Copy)]
pub struct TileGrid {
    step_x: f64,
    step_y: f64,
}

impl TileGrid {
    /// Build a grid from a ground resolution (map units per pixel) and the
    /// raster tile size in pixels.
    pub fn new(resolution: f64, tile_width_px: u32, tile_height_px: u32) -> Self {
        Self {
            step_x: f64::from(tile_width_px) * resolution,
            step_y: f64::from(tile_height_px) * resolution,
        }
    }

    pub fn step_x(&self) -> f64 {
        self.step_x
    }

    pub fn step_y(&self) -> f64 {
        self.step_y
    }

    /// Enumerate the grid cells covering `bbox`, in increasing x then
    /// increasing y order.
    ///
    /// The covering range floors the lower bound and ceils the upper bound
    /// onto grid lines, so the union of emitted cells always contains the
    /// input box (over-coverage, never under-coverage). A zero-extent axis
    /// still produces one step.
    pub fn tiles_for_bbox(&self, bbox: &BBox) -> impl Iterator<Item = (TileCode, BBox)> {
        let (ix_start, ix_end) =
            Self::index_range(bbox.minx - GRID_ORIGIN_X, bbox.maxx - GRID_ORIGIN_X, self.step_x);
        let (iy_start, iy_end) =
            Self::index_range(bbox.miny - GRID_ORIGIN_Y, bbox.maxy - GRID_ORIGIN_Y, self.step_y);

        let (step_x, step_y) = (self.step_x, self.step_y);
        (ix_start..ix_end).flat_map(move |ix| {
            (iy_start..iy_end).map(move |iy| {
                let code = TileCode { ix, iy };
                let bbox = BBox::new(
                    GRID_ORIGIN_X + ix as f64 * step_x,
                    GRID_ORIGIN_Y + iy as f64 * step_y,
                    GRID_ORIGIN_X + (ix + 1) as f64 * step_x,
                    GRID_ORIGIN_Y + (iy + 1) as f64 * step_y,
                );
                (code, bbox)
            })
        })
    }

    /// Grid index range covering `[min, max]` at the given step.
    fn index_range(min: f64, max: f64, step: f64) -> (i64, i64) {
        let start = (min / step).floor() as i64;
        let mut end = (max / step).ceil() as i64;
        // A degenerate extent sitting exactly on a grid line still gets a cell.
        if end == start {
            end = start + 1;
        }
        (start, end)
    }

    /// Generate tiles for each area independently, preserving area order.
    pub fn generate(&self, areas: &[AreaOfInterest]) -> Vec<Tile> {
        let mut tiles = Vec::new();
        for area in areas {
            let before = tiles.len();
            tiles.extend(self.tiles_for_bbox(&area.bbox).map(|(code, bbox)| Tile {
                fid: area.fid,
                name: area.name.clone(),
                code,
                bbox,
            }));
            log::debug!(
                "area `{}`: {} tiles at {}x{} m steps",
                area.name,
                tiles.len() - before,
                self.step_x,
                self.step_y
            );
        }
        tiles
    }
}

/// Extract per-feature areas-of-interest from a dataset.
///
/// The area name comes from `name_attribute`; features missing the
/// attribute fall back to `feature-{fid}`. Features without an envelope
/// (should not survive validation) are skipped.
pub fn areas_of_interest(dataset: &VectorDataset, name_attribute: &str) -> Vec<AreaOfInterest> {
    dataset
        .features
        .iter()
        .filter_map(|feature| {
            let bbox = feature.bbox()?;
            let name = feature
                .attribute(name_attribute)
                .map(str::to_string)
                .unwrap_or_else(|| format!("feature-{}", feature.fid));
            Some(AreaOfInterest {
                fid: feature.fid,
                name,
                bbox,
            })
        })
        .collect()
}
