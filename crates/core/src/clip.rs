//! Boundary clipping with area accounting.
//!
//! [`clip_and_analyze`] intersects every subject feature with a single
//! reference boundary polygon and reports how much area survived:
//! - a feature entirely outside the boundary is dropped from the output;
//! - a feature entirely inside passes through unchanged;
//! - a feature straddling the boundary is replaced by its intersection.
//!
//! Per-feature records are joined by `fid`, never by position, so feature
//! order cannot silently misalign the comparison. Features clipped entirely
//! away appear in neither the per-feature records nor the dataset totals;
//! `dropped_count` makes the exclusion visible.

use std::collections::HashMap;

use geo::{Area, BooleanOps, BoundingRect, Contains, MultiPolygon, Rect};
use serde::Serialize;

use crate::dataset::{as_multipolygon, collapse_multipolygon, Feature, VectorDataset};
use crate::{Error, Result};

/// Square meters per square kilometer.
const M2_PER_KM2: f64 = 1e6;

/// Per-feature area accounting, areas in square meters.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureClipRecord {
    pub fid: u64,
    pub original_area: f64,
    pub clipped_area: f64,
    /// Share of the original area that survived, rounded to whole percent.
    pub percent_retained: u32,
}

impl FeatureClipRecord {
    /// A feature crosses the boundary iff part of its area was cut away.
    pub fn crosses_boundary(&self) -> bool {
        self.percent_retained != 100
    }
}

/// Dataset-level clip statistics.
///
/// Totals are computed over the surviving (clipped-output) features only:
/// the dataset percentage measures how much of the surviving features'
/// original area was retained.
#[derive(Debug, Clone, Serialize)]
pub struct ClipResult {
    pub total_original_km2: f64,
    pub total_clipped_km2: f64,
    /// Retained share of the dataset, rounded to two decimals.
    pub percent_retained: f64,
    /// Features whose intersection with the boundary was empty.
    pub dropped_count: usize,
    pub features: Vec<FeatureClipRecord>,
}

impl ClipResult {
    /// Records for features that lost area to the boundary.
    pub fn boundary_crossing(&self) -> impl Iterator<Item = &FeatureClipRecord> {
        self.features.iter().filter(|r| r.crosses_boundary())
    }
}

/// Clip `subject` against a single-feature `boundary` dataset.
///
/// Returns the clipped dataset (same name and CRS, new features) together
/// with the area statistics.
///
/// # Errors
///
/// * [`Error::CrsMismatch`] - subject and boundary CRSs differ
/// * [`Error::MultiBoundary`] - the boundary has more than one feature
/// * [`Error::DivisionByZero`] - the surviving original area sums to zero
pub fn clip_and_analyze(
    subject: &VectorDataset,
    boundary: &VectorDataset,
) -> Result<(VectorDataset, ClipResult)> {
    let subject_crs = subject
        .crs
        .clone()
        .ok_or_else(|| Error::UndefinedCrs(subject.name.clone()))?;
    let boundary_crs = boundary
        .crs
        .clone()
        .ok_or_else(|| Error::UndefinedCrs(boundary.name.clone()))?;

    if subject_crs != boundary_crs {
        return Err(Error::CrsMismatch {
            subject: subject_crs.code().to_string(),
            boundary: boundary_crs.code().to_string(),
        });
    }

    if boundary.len() != 1 {
        return Err(Error::MultiBoundary(boundary.len()));
    }

    let boundary_feature = &boundary.features[0];
    let boundary_geometry = boundary_feature
        .geometry
        .as_ref()
        .ok_or(Error::NullGeometry {
            fid: boundary_feature.fid,
        })?;
    let boundary_mp = as_multipolygon(boundary_geometry).ok_or(Error::EmptyGeometry {
        fid: boundary_feature.fid,
    })?;
    let boundary_rect = boundary_mp.bounding_rect();

    // Pre-clip areas keyed by fid; the per-feature join below is always
    // through this map, never positional.
    let original_areas: HashMap<u64, f64> = subject
        .features
        .iter()
        .filter_map(|f| {
            f.geometry
                .as_ref()
                .map(|g| (f.fid, g.unsigned_area()))
        })
        .collect();

    let mut clipped_features = Vec::new();
    let mut records = Vec::new();
    let mut dropped_count = 0;

    for feature in &subject.features {
        let Some(geometry) = feature.geometry.as_ref() else {
            dropped_count += 1;
            continue;
        };
        let Some(subject_mp) = as_multipolygon(geometry) else {
            log::debug!("skipping non-polygonal feature {}", feature.fid);
            dropped_count += 1;
            continue;
        };

        // Quick rejection: disjoint envelopes cannot intersect.
        let disjoint = match (subject_mp.bounding_rect(), boundary_rect) {
            (Some(a), Some(b)) => !rects_overlap(&a, &b),
            _ => true,
        };
        if disjoint {
            dropped_count += 1;
            continue;
        }

        // Fast path: a feature entirely inside the boundary passes through
        // unchanged, no overlay needed.
        if boundary_mp.contains(&subject_mp) {
            let original_area = original_areas[&feature.fid];
            records.push(FeatureClipRecord {
                fid: feature.fid,
                original_area,
                clipped_area: original_area,
                percent_retained: 100,
            });
            clipped_features.push(feature.clone());
            continue;
        }

        let intersection: MultiPolygon<f64> = subject_mp.intersection(&boundary_mp);
        let clipped_area = intersection.unsigned_area();

        if intersection.0.is_empty() || clipped_area == 0.0 {
            dropped_count += 1;
            continue;
        }

        let original_area = original_areas[&feature.fid];
        // The overlay can overshoot the original by an ulp; the retained
        // share is capped at 100.
        let percent_retained = ((clipped_area / original_area) * 100.0).round().min(100.0) as u32;

        records.push(FeatureClipRecord {
            fid: feature.fid,
            original_area,
            clipped_area,
            percent_retained,
        });

        clipped_features.push(Feature {
            fid: feature.fid,
            geometry: Some(collapse_multipolygon(intersection)),
            attributes: feature.attributes.clone(),
        });
    }

    let total_original: f64 = records.iter().map(|r| r.original_area).sum();
    let total_clipped: f64 = records.iter().map(|r| r.clipped_area).sum();

    if total_original == 0.0 {
        return Err(Error::DivisionByZero);
    }

    let percent_retained = round2(total_clipped / total_original * 100.0);

    log::info!(
        "clipped `{}` against `{}`: {} of {} features retained, {:.2} of {:.2} km2 ({}%)",
        subject.name,
        boundary.name,
        clipped_features.len(),
        subject.len(),
        total_clipped / M2_PER_KM2,
        total_original / M2_PER_KM2,
        percent_retained
    );

    let clipped = VectorDataset::new(
        subject.name.clone(),
        Some(subject_crs),
        clipped_features,
    );
    let result = ClipResult {
        total_original_km2: total_original / M2_PER_KM2,
        total_clipped_km2: total_clipped / M2_PER_KM2,
        percent_retained,
        dropped_count,
        features: records,
    };

    Ok((clipped, result))
}

fn rects_overlap(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    a.max().x >= b.min().x
        && a.min().x <= b.max().x
        && a.max().y >= b.min().y
        && a.min().y <= b.max().y
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
