//! Disk-backed raster store.
//!
//! Writes fetched imagery under an output directory, one file per tile,
//! using the core's deterministic slug + tile-code filenames.

use std::fs;
use std::path::PathBuf;

use park_tiles_core::{tile_filename, CollaboratorError, ImageryResponse, RasterStore};

pub struct DiskStore {
    out_dir: PathBuf,
}

impl DiskStore {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }
}

impl RasterStore for DiskStore {
    fn store(&self, response: &ImageryResponse) -> Result<String, CollaboratorError> {
        fs::create_dir_all(&self.out_dir)
            .map_err(|e| format!("failed to create `{}`: {}", self.out_dir.display(), e))?;

        let filename = tile_filename(&response.area_name, &response.tile_code, "tif");
        let path = self.out_dir.join(&filename);

        fs::write(&path, &response.data)
            .map_err(|e| format!("failed to write `{}`: {}", path.display(), e))?;

        log::info!("stored {} ({} bytes)", path.display(), response.data.len());

        Ok(path.display().to_string())
    }
}
