//! Core library for clipping park boundaries to a reference region and
//! tiling the results for raster imagery requests.
//!
//! The pipeline validates and repairs vector datasets, brings them into an
//! equal-area CRS, clips them against a single boundary polygon with area
//! accounting, and covers each surviving feature's bounds with a
//! deterministic grid of fixed-size tiles.
//!
//! # Examples
//!
//! ```no_run
//! use park_tiles_core::{Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::default()
//!     .with_name_attribute("PARKNAME")
//!     .with_resolution(1.0);
//!
//! let pipeline = Pipeline::new(config);
//! // let summary = pipeline.run(&source, "parks", "state", &imagery, &store)?;
//! ```

use thiserror::Error;

pub mod clip;
pub mod crs;
pub mod dataset;
pub mod pipeline;
pub mod reproject;
pub mod tile;
pub mod validate;

#[cfg(test)]
mod integration_tests;

pub use clip::{clip_and_analyze, ClipResult, FeatureClipRecord};
pub use crs::Crs;
pub use dataset::{Feature, VectorDataset};
pub use pipeline::{
    tile_filename, CollaboratorError, DatasetSource, ImageryFetch, ImageryResponse, Pipeline,
    PipelineConfig, RasterStore, RunSummary, VectorAnalysis,
};
pub use reproject::reproject;
pub use tile::{areas_of_interest, AreaOfInterest, BBox, Tile, TileCode, TileGrid};
pub use validate::validate;

/// Errors that can occur in the spatial pipeline.
///
/// All variants are fatal to the run; nothing is retried internally. The one
/// recoverable condition - an invalid but repairable geometry - is handled
/// inside [`validate`] and never surfaces here.
#[derive(Error, Debug)]
pub enum Error {
    #[error("dataset `{0}` has no features")]
    EmptyDataset(String),

    #[error("feature {fid} has a null geometry")]
    NullGeometry { fid: u64 },

    #[error("feature {fid} has an empty geometry")]
    EmptyGeometry { fid: u64 },

    #[error("dataset `{0}` has no CRS defined")]
    UndefinedCrs(String),

    #[error("`{0}` is not a known coordinate reference system")]
    UnknownCrs(String),

    #[error("CRS mismatch: subject is {subject}, boundary is {boundary}")]
    CrsMismatch { subject: String, boundary: String },

    #[error("boundary dataset must contain exactly one feature, found {0}")]
    MultiBoundary(usize),

    #[error("total original area is zero, cannot compute retained percentage")]
    DivisionByZero,

    #[error("coordinate transform failed: {0}")]
    Transform(String),

    #[error("collaborator failure: {0}")]
    Collaborator(CollaboratorError),
}

impl From<CollaboratorError> for Error {
    fn from(err: CollaboratorError) -> Self {
        Error::Collaborator(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
