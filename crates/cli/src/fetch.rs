//! NAIP imagery client.
//!
//! Requests tiles from the USGS NAIP ImageServer `exportImage` endpoint as
//! GeoTIFF bytes. One request per tile; the pipeline decides the tile
//! geometry, this client only speaks the service's query protocol.

use std::time::Duration;

use park_tiles_core::{CollaboratorError, ImageryFetch, ImageryResponse, Tile};

const NAIP_ENDPOINT: &str =
    "https://imagery.nationalmap.gov/arcgis/rest/services/USGSNAIPImagery/ImageServer/exportImage";

/// The service is slow for large areas; give it a minute per tile.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct NaipClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    /// Spatial reference for both the request bbox and the returned image.
    srid: u32,
}

impl NaipClient {
    pub fn new(srid: u32) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            endpoint: NAIP_ENDPOINT.to_string(),
            srid,
        })
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl ImageryFetch for NaipClient {
    fn fetch(
        &self,
        tile: &Tile,
        width_px: u32,
        height_px: u32,
    ) -> Result<ImageryResponse, CollaboratorError> {
        log::info!("downloading NAIP tile {} for `{}`", tile.code, tile.name);

        let bbox = format!(
            "{},{},{},{}",
            tile.bbox.minx, tile.bbox.miny, tile.bbox.maxx, tile.bbox.maxy
        );
        let srid = self.srid.to_string();
        let size = format!("{},{}", width_px, height_px);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("bbox", bbox.as_str()),
                ("bboxSR", srid.as_str()),
                ("imageSR", srid.as_str()),
                ("size", size.as_str()),
                ("adjustAspectRatio", "true"),
                ("format", "tiff"),
                ("f", "image"),
                ("dpi", "96"),
            ])
            .send()
            .map_err(|e| format!("NAIP request for tile {} failed: {}", tile.code, e))?
            .error_for_status()
            .map_err(|e| format!("NAIP request for tile {} failed: {}", tile.code, e))?;

        let data = response
            .bytes()
            .map_err(|e| format!("NAIP download for tile {} failed: {}", tile.code, e))?
            .to_vec();

        if data.is_empty() {
            return Err(format!(
                "NAIP response for tile {} was empty, check the area of interest",
                tile.code
            )
            .into());
        }

        Ok(ImageryResponse {
            area_name: tile.name.clone(),
            tile_code: tile.code.to_string(),
            data,
            width_px,
            height_px,
            crs: format!("EPSG:{}", self.srid),
            bbox: tile.bbox,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use park_tiles_core::{BBox, TileCode};

    #[test]
    fn test_unreachable_endpoint_is_an_error() {
        let client = NaipClient::new(3857)
            .unwrap()
            .with_endpoint("http://127.0.0.1:9/exportImage");
        let tile = Tile {
            fid: 1,
            name: "park".to_string(),
            code: TileCode { ix: 0, iy: 0 },
            bbox: BBox::new(0.0, 0.0, 2500.0, 2500.0),
        };

        let err = client.fetch(&tile, 2500, 2500).unwrap_err();
        assert!(err.to_string().contains("tile 0_0"));
    }
}
