//! Vector datasets and features.
//!
//! A [`VectorDataset`] is an ordered, owning collection of [`Feature`]s that
//! share one CRS. Pipeline stages never mutate a dataset in place: each stage
//! consumes (or borrows) its input and produces a new dataset, so the
//! original and derived views can never alias.

use std::collections::BTreeMap;

use geo::{Geometry, MultiPolygon, Polygon};

use crate::crs::Crs;
use crate::tile::BBox;

/// A single polygonal feature.
///
/// `geometry` is `None` when the source supplied a null geometry; the
/// validator rejects such features before any processing happens.
#[derive(Debug, Clone)]
pub struct Feature {
    /// Stable identifier used to correlate records across transformations.
    pub fid: u64,
    pub geometry: Option<Geometry<f64>>,
    /// Named attributes carried through the pipeline unchanged.
    pub attributes: BTreeMap<String, String>,
}

impl Feature {
    /// Create a feature with a geometry and no attributes.
    pub fn new(fid: u64, geometry: Geometry<f64>) -> Self {
        Self {
            fid,
            geometry: Some(geometry),
            attributes: BTreeMap::new(),
        }
    }

    /// Create a feature whose source geometry was null.
    pub fn null_geometry(fid: u64) -> Self {
        Self {
            fid,
            geometry: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Attach an attribute, builder style.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Look up an attribute value.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Envelope of the feature geometry, if it has one.
    pub fn bbox(&self) -> Option<BBox> {
        use geo::BoundingRect;

        let rect = self.geometry.as_ref()?.bounding_rect()?;
        Some(BBox::new(
            rect.min().x,
            rect.min().y,
            rect.max().x,
            rect.max().y,
        ))
    }
}

/// An ordered collection of features sharing one CRS.
#[derive(Debug, Clone)]
pub struct VectorDataset {
    /// Logical dataset name, used in logs and error messages.
    pub name: String,
    /// `None` until the source declares a CRS; validation rejects `None`.
    pub crs: Option<Crs>,
    pub features: Vec<Feature>,
}

impl VectorDataset {
    pub fn new(name: impl Into<String>, crs: Option<Crs>, features: Vec<Feature>) -> Self {
        Self {
            name: name.into(),
            crs,
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Envelope of the whole dataset.
    pub fn bbox(&self) -> Option<BBox> {
        let mut bounds = BBox::empty();
        for feature in &self.features {
            if let Some(b) = feature.bbox() {
                bounds.expand(&b);
            }
        }
        bounds.is_valid().then_some(bounds)
    }
}

/// View a geometry as a multipolygon. Non-polygonal geometries yield `None`.
pub(crate) fn as_multipolygon(geometry: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p.clone()])),
        Geometry::MultiPolygon(mp) => Some(mp.clone()),
        _ => None,
    }
}

/// Collapse a multipolygon to the narrowest geometry that represents it.
pub(crate) fn collapse_multipolygon(mp: MultiPolygon<f64>) -> Geometry<f64> {
    let polygons: Vec<Polygon<f64>> = mp.0;
    if polygons.len() == 1 {
        // Single polygon: unwrap from MultiPolygon
        Geometry::Polygon(polygons.into_iter().next().unwrap())
    } else {
        Geometry::MultiPolygon(MultiPolygon::new(polygons))
    }
}
