//! GeoJSON-backed dataset source.
//!
//! Loads a GeoJSON feature collection from disk into a [`VectorDataset`].
//! Null geometries are preserved as null (the core validator decides their
//! fate), property values are carried as strings, and the fid comes from the
//! feature `id` when it is numeric, falling back to the feature's position.

use std::convert::TryFrom;
use std::fs;

use geojson::{feature::Id, FeatureCollection, GeoJson};
use park_tiles_core::{CollaboratorError, Crs, DatasetSource, Feature, VectorDataset};

/// Reads datasets from GeoJSON files; the dataset name is the file path.
pub struct GeoJsonSource {
    source_crs: String,
}

impl GeoJsonSource {
    /// `source_crs` is assigned to every loaded dataset. GeoJSON itself is
    /// WGS84 by specification, but datasets exported from other containers
    /// sometimes carry projected coordinates.
    pub fn new(source_crs: impl Into<String>) -> Self {
        Self {
            source_crs: source_crs.into(),
        }
    }

    fn read_collection(&self, path: &str) -> Result<FeatureCollection, CollaboratorError> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("failed to read `{}`: {}", path, e))?;
        let geojson: GeoJson = content
            .parse()
            .map_err(|e| format!("failed to parse `{}`: {}", path, e))?;
        FeatureCollection::try_from(geojson)
            .map_err(|e| format!("`{}` is not a feature collection: {}", path, e).into())
    }
}

impl DatasetSource for GeoJsonSource {
    fn load(&self, name: &str) -> Result<VectorDataset, CollaboratorError> {
        let collection = self.read_collection(name)?;
        let crs = Crs::from_user_input(&self.source_crs)
            .map_err(|e| format!("source CRS rejected: {}", e))?;

        let mut features = Vec::with_capacity(collection.features.len());
        for (index, feature) in collection.features.into_iter().enumerate() {
            let fid = feature_id(feature.id.as_ref(), index);

            let geometry = match feature.geometry {
                Some(g) => Some(
                    geo::Geometry::<f64>::try_from(g)
                        .map_err(|e| format!("feature {}: unsupported geometry: {}", fid, e))?,
                ),
                None => None,
            };

            let attributes = feature
                .properties
                .unwrap_or_default()
                .into_iter()
                .map(|(key, value)| {
                    let value = match value {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (key, value)
                })
                .collect();

            features.push(Feature {
                fid,
                geometry,
                attributes,
            });
        }

        log::info!("loaded {} features from `{}`", features.len(), name);

        Ok(VectorDataset::new(name, Some(crs), features))
    }
}

fn feature_id(id: Option<&Id>, index: usize) -> u64 {
    match id {
        Some(Id::Number(n)) => n.as_u64().unwrap_or(index as u64),
        _ => index as u64,
    }
}
