//! Dataset validation and geometry repair.
//!
//! [`validate`] gatekeeps every dataset before it enters the pipeline:
//! - an empty dataset, a null geometry, a structurally empty geometry, or a
//!   missing CRS is fatal;
//! - a topologically invalid geometry (ring self-intersections, spikes) is
//!   repaired in place of the original, never surfaced as an error.
//!
//! The input dataset is never mutated; a new dataset is returned.

use geo::line_intersection::{line_intersection, LineIntersection};
use geo::{Area, BooleanOps, CoordsIter, Geometry, Line, LineString, MultiPolygon, Polygon};

use crate::dataset::{as_multipolygon, collapse_multipolygon, Feature, VectorDataset};
use crate::{Error, Result};

/// Validate a dataset, repairing invalid geometries.
///
/// # Errors
///
/// * [`Error::EmptyDataset`] - the dataset has zero features
/// * [`Error::NullGeometry`] - a feature's geometry is null
/// * [`Error::EmptyGeometry`] - a feature's geometry has no coordinates or
///   zero area (distinct from null)
/// * [`Error::UndefinedCrs`] - the dataset has no CRS attached
pub fn validate(dataset: &VectorDataset) -> Result<VectorDataset> {
    if dataset.is_empty() {
        return Err(Error::EmptyDataset(dataset.name.clone()));
    }

    let mut checked = Vec::with_capacity(dataset.len());
    for feature in &dataset.features {
        let geometry = feature
            .geometry
            .as_ref()
            .ok_or(Error::NullGeometry { fid: feature.fid })?;

        if is_structurally_empty(geometry) {
            return Err(Error::EmptyGeometry { fid: feature.fid });
        }

        checked.push((feature, geometry));
    }

    let crs = dataset
        .crs
        .clone()
        .ok_or_else(|| Error::UndefinedCrs(dataset.name.clone()))?;

    let mut repaired_count = 0;
    let features = checked
        .into_iter()
        .map(|(feature, geometry)| {
            let geometry = if geometry_defects(geometry).is_empty() {
                geometry.clone()
            } else {
                repaired_count += 1;
                log::debug!("repairing invalid geometry for fid {}", feature.fid);
                repair_geometry(geometry)
            };
            Feature {
                fid: feature.fid,
                geometry: Some(geometry),
                attributes: feature.attributes.clone(),
            }
        })
        .collect();

    if repaired_count > 0 {
        log::info!(
            "dataset `{}`: crs {}, repaired {} of {} geometries",
            dataset.name,
            crs,
            repaired_count,
            dataset.len()
        );
    } else {
        log::info!(
            "dataset `{}`: crs {}, all {} geometries valid",
            dataset.name,
            crs,
            dataset.len()
        );
    }

    Ok(VectorDataset::new(dataset.name.clone(), Some(crs), features))
}

/// A geometry with no coordinates, or a polygonal geometry with zero area.
fn is_structurally_empty(geometry: &Geometry<f64>) -> bool {
    if geometry.coords_count() == 0 {
        return true;
    }
    match geometry {
        Geometry::Polygon(_) | Geometry::MultiPolygon(_) => geometry.unsigned_area() == 0.0,
        _ => false,
    }
}

/// Describe the topological defects of a geometry, or an empty vec if clean.
///
/// Checks polygon rings for self-intersections, spikes (a vertex visited
/// twice, non-consecutively), and non-finite coordinates.
pub fn geometry_defects(geometry: &Geometry<f64>) -> Vec<String> {
    match geometry {
        Geometry::Polygon(poly) => polygon_defects(poly),
        Geometry::MultiPolygon(mp) => {
            let mut defects = Vec::new();
            for (i, poly) in mp.0.iter().enumerate() {
                for defect in polygon_defects(poly) {
                    defects.push(format!("polygon at index {}: {}", i, defect));
                }
            }
            defects
        }
        _ => Vec::new(),
    }
}

fn polygon_defects(poly: &Polygon<f64>) -> Vec<String> {
    let mut defects = Vec::new();

    if let Some(defect) = ring_defect(poly.exterior(), "exterior ring") {
        defects.push(defect);
    }

    for (i, interior) in poly.interiors().iter().enumerate() {
        if let Some(defect) = ring_defect(interior, &format!("interior ring at index {}", i)) {
            defects.push(defect);
        }
    }

    defects
}

/// Check one ring for too few points, non-finite coordinates, spikes, and
/// crossing edges.
fn ring_defect(ring: &LineString<f64>, ring_name: &str) -> Option<String> {
    let coords = &ring.0;

    // A closed ring needs 3 distinct points plus the closing point.
    if coords.len() < 4 {
        return Some(format!("{} has fewer than 3 distinct points", ring_name));
    }

    for (idx, coord) in coords.iter().enumerate() {
        if !coord.x.is_finite() || !coord.y.is_finite() {
            return Some(format!(
                "{} has a non-finite coordinate at index {}",
                ring_name, idx
            ));
        }
    }

    if has_spike(ring) || has_self_intersection(ring) {
        return Some(format!("{} has a self-intersection", ring_name));
    }

    None
}

/// A vertex that appears twice at non-adjacent positions means the ring
/// touches itself, e.g. `(2,4) → (2,6) → (2,4)`.
fn has_spike(ring: &LineString<f64>) -> bool {
    let coords = &ring.0;
    let n = coords.len();

    if n < 4 {
        return false;
    }

    let check_len = if coords.first() == coords.last() {
        n - 1 // exclude the closing point
    } else {
        n
    };

    for i in 0..check_len {
        for j in (i + 2)..check_len {
            // First and last vertex are adjacent in a closed ring.
            if i == 0 && j == check_len - 1 {
                continue;
            }
            if coords[i] == coords[j] {
                return true;
            }
        }
    }

    false
}

/// Test every pair of non-adjacent ring edges for a proper crossing.
fn has_self_intersection(ring: &LineString<f64>) -> bool {
    let coords = &ring.0;
    let n = coords.len();

    if n < 4 {
        return false;
    }

    let num_edges = if coords.first() == coords.last() {
        n - 1
    } else {
        n
    };

    for i in 0..num_edges {
        let edge_i = Line::new(coords[i], coords[(i + 1) % n]);

        for j in (i + 2)..num_edges {
            // The last edge and the first edge share a vertex.
            if i == 0 && j == num_edges - 1 {
                continue;
            }

            let edge_j = Line::new(coords[j], coords[(j + 1) % n]);

            if let Some(intersection) = line_intersection(edge_i, edge_j) {
                match intersection {
                    LineIntersection::SinglePoint { intersection, .. } => {
                        let is_endpoint_i =
                            intersection == edge_i.start || intersection == edge_i.end;
                        let is_endpoint_j =
                            intersection == edge_j.start || intersection == edge_j.end;

                        // Touching at shared vertices is fine; a crossing is not.
                        if !(is_endpoint_i && is_endpoint_j) {
                            return true;
                        }
                    }
                    LineIntersection::Collinear { .. } => {
                        return true;
                    }
                }
            }
        }
    }

    false
}

/// Repair an invalid polygonal geometry.
///
/// Pure `Geometry -> Geometry`: the input is normalized through a boolean
/// overlay (union with the empty multipolygon), which splits
/// self-intersecting rings into simple polygons and rebuilds winding order
/// while preserving covered area. Non-polygonal geometries are returned
/// unchanged.
pub fn repair_geometry(geometry: &Geometry<f64>) -> Geometry<f64> {
    match as_multipolygon(geometry) {
        Some(mp) => {
            let repaired = mp.union(&MultiPolygon::new(vec![]));
            collapse_multipolygon(repaired)
        }
        None => geometry.clone(),
    }
}
