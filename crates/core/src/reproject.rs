//! CRS-aware dataset reprojection.
//!
//! Reprojection is a whole-dataset transform: every feature geometry is
//! mapped through the forward projection from the source CRS to the target,
//! attributes carried over unchanged. When source and target are
//! semantically equal the dataset is returned as-is - a true no-op, not a
//! copy-and-transform.
//!
//! Area computations downstream assume an equal-area target CRS; that is a
//! caller contract, not enforced here.

use geo::{Coord, Geometry, MapCoords};
use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use crate::crs::Crs;
use crate::dataset::{Feature, VectorDataset};
use crate::{Error, Result};

/// Reproject a dataset to `target`.
///
/// # Errors
///
/// * [`Error::UndefinedCrs`] - the dataset carries no CRS
/// * [`Error::UnknownCrs`] - a CRS definition cannot be resolved
/// * [`Error::Transform`] - a coordinate fails to project
pub fn reproject(dataset: VectorDataset, target: &Crs) -> Result<VectorDataset> {
    let source = dataset
        .crs
        .clone()
        .ok_or_else(|| Error::UndefinedCrs(dataset.name.clone()))?;

    if source == *target {
        log::debug!(
            "dataset `{}` already in {}, skipping reprojection",
            dataset.name,
            target
        );
        return Ok(dataset);
    }

    log::info!(
        "reprojecting dataset `{}` from {} to {}",
        dataset.name,
        source,
        target
    );

    let from = source.to_proj()?;
    let to = target.to_proj()?;
    let source_geographic = source.is_geographic();
    let target_geographic = target.is_geographic();

    let features = dataset
        .features
        .into_iter()
        .map(|feature| {
            let geometry = feature
                .geometry
                .map(|g| project_geometry(&g, &from, &to, source_geographic, target_geographic))
                .transpose()?;
            Ok(Feature {
                fid: feature.fid,
                geometry,
                attributes: feature.attributes,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(VectorDataset::new(
        dataset.name,
        Some(target.clone()),
        features,
    ))
}

/// Map every coordinate of a geometry through the projection pair.
///
/// proj4rs works in radians at geographic endpoints, so degrees are
/// converted going in and coming out.
fn project_geometry(
    geometry: &Geometry<f64>,
    from: &Proj,
    to: &Proj,
    source_geographic: bool,
    target_geographic: bool,
) -> Result<Geometry<f64>> {
    geometry.try_map_coords(|Coord { x, y }| {
        let mut point = if source_geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };

        transform(from, to, &mut point).map_err(|e| Error::Transform(e.to_string()))?;

        let (x, y) = if target_geographic {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };

        Ok(Coord { x, y })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, CoordsIter};

    fn degree_square() -> Geometry<f64> {
        // A small square in the Sierra Nevada foothills.
        Geometry::Polygon(polygon![
            (x: -120.0, y: 38.0),
            (x: -119.9, y: 38.0),
            (x: -119.9, y: 38.1),
            (x: -120.0, y: 38.1),
            (x: -120.0, y: 38.0),
        ])
    }

    fn wgs84_dataset() -> VectorDataset {
        VectorDataset::new(
            "parks",
            Some(Crs::from_user_input("EPSG:4326").unwrap()),
            vec![Feature::new(1, degree_square()).with_attribute("name", "Foothills")],
        )
    }

    fn coords_of(dataset: &VectorDataset) -> Vec<(f64, f64)> {
        dataset.features[0]
            .geometry
            .as_ref()
            .unwrap()
            .coords_iter()
            .map(|c| (c.x, c.y))
            .collect()
    }

    #[test]
    fn test_noop_when_target_matches() {
        let dataset = wgs84_dataset();
        let before = coords_of(&dataset);

        let target = Crs::from_user_input("EPSG:4326").unwrap();
        let result = reproject(dataset, &target).unwrap();

        assert_eq!(coords_of(&result), before);
    }

    #[test]
    fn test_noop_across_crs_aliases() {
        let mercator = Crs::from_user_input("EPSG:3857").unwrap();
        let dataset = VectorDataset::new(
            "parks",
            Some(mercator),
            vec![Feature::new(1, degree_square())],
        );
        let before = coords_of(&dataset);

        // 102100 is the same coordinate system under an ESRI code.
        let alias = Crs::from_user_input("EPSG:102100").unwrap();
        let result = reproject(dataset, &alias).unwrap();

        assert_eq!(coords_of(&result), before);
    }

    #[test]
    fn test_reprojects_to_albers_meters() {
        let target = Crs::from_user_input("EPSG:5070").unwrap();
        let result = reproject(wgs84_dataset(), &target).unwrap();

        assert_eq!(result.crs.as_ref().unwrap().code(), "EPSG:5070");
        // CONUS Albers coordinates for California are large negative x,
        // y in the low millions of meters.
        for (x, y) in coords_of(&result) {
            assert!(x < -1_500_000.0 && x > -2_500_000.0, "x out of range: {}", x);
            assert!(y > 1_500_000.0 && y < 2_500_000.0, "y out of range: {}", y);
        }
    }

    #[test]
    fn test_attributes_survive_reprojection() {
        let target = Crs::from_user_input("EPSG:5070").unwrap();
        let result = reproject(wgs84_dataset(), &target).unwrap();
        assert_eq!(result.features[0].attribute("name"), Some("Foothills"));
        assert_eq!(result.features[0].fid, 1);
    }

    #[test]
    fn test_round_trip_within_a_millimeter() {
        let wgs84 = Crs::from_user_input("EPSG:4326").unwrap();
        let albers = Crs::from_user_input("EPSG:5070").unwrap();

        let original = wgs84_dataset();
        let before = coords_of(&original);

        let there = reproject(original, &albers).unwrap();
        let back = reproject(there, &wgs84).unwrap();
        let after = coords_of(&back);

        // 1e-8 degrees is roughly a millimeter on the ground.
        for ((x0, y0), (x1, y1)) in before.iter().zip(after.iter()) {
            assert!((x0 - x1).abs() < 1e-8, "x drift: {} vs {}", x0, x1);
            assert!((y0 - y1).abs() < 1e-8, "y drift: {} vs {}", y0, y1);
        }
    }

    #[test]
    fn test_missing_crs_is_rejected() {
        let dataset = VectorDataset::new("parks", None, vec![Feature::new(1, degree_square())]);
        let target = Crs::from_user_input("EPSG:5070").unwrap();
        assert!(matches!(
            reproject(dataset, &target),
            Err(Error::UndefinedCrs(_))
        ));
    }
}
