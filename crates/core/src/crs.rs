//! Coordinate reference system value objects.
//!
//! A [`Crs`] pairs a normalized authority code with the PROJ definition it
//! resolves to. Equality is semantic, not textual: two values compare equal
//! when their definitions describe the same coordinate system, so
//! `EPSG:3857`, `EPSG:900913`, and `EPSG:102100` are all the same CRS. This
//! is what makes the reprojector's no-op check reliable.
//!
//! Only the coordinate systems the pipeline actually works in are registered;
//! anything else fails fast with [`Error::UnknownCrs`].

use std::collections::BTreeSet;
use std::fmt;

use proj4rs::proj::Proj;

use crate::{Error, Result};

/// Registered coordinate systems: canonical code, accepted aliases, and the
/// PROJ definition string.
const REGISTRY: &[(&str, &[&str], &str)] = &[
    (
        "EPSG:4326",
        &["CRS:84"],
        "+proj=longlat +datum=WGS84 +no_defs",
    ),
    ("EPSG:4269", &[], "+proj=longlat +datum=NAD83 +no_defs"),
    (
        "EPSG:3857",
        &["EPSG:900913", "EPSG:102100", "ESRI:102100"],
        "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +nadgrids=@null +no_defs",
    ),
    (
        "EPSG:5070",
        &[],
        "+proj=aea +lat_0=23 +lon_0=-96 +lat_1=29.5 +lat_2=45.5 +x_0=0 +y_0=0 +datum=NAD83 +units=m +no_defs",
    ),
    (
        "EPSG:6933",
        &[],
        "+proj=cea +lat_ts=30 +lon_0=0 +x_0=0 +y_0=0 +datum=WGS84 +units=m +no_defs",
    ),
];

/// An opaque, comparable coordinate reference system.
#[derive(Debug, Clone)]
pub struct Crs {
    code: String,
    definition: String,
}

impl Crs {
    /// Resolve a user-supplied CRS identifier.
    ///
    /// Accepts `AUTHORITY:CODE` strings (case-insensitive), bare EPSG codes
    /// like `"5070"`, and raw PROJ definition strings starting with `+proj=`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCrs`] when the identifier does not resolve to
    /// a registered coordinate system.
    pub fn from_user_input(input: &str) -> Result<Self> {
        let trimmed = input.trim();

        if trimmed.starts_with("+proj=") {
            return Self::from_definition(trimmed);
        }

        let normalized = if trimmed.contains(':') {
            trimmed.to_uppercase()
        } else {
            // Bare numeric codes are assumed to be EPSG.
            format!("EPSG:{}", trimmed)
        };

        for (code, aliases, definition) in REGISTRY {
            if normalized == *code || aliases.contains(&normalized.as_str()) {
                return Ok(Self {
                    code: (*code).to_string(),
                    definition: (*definition).to_string(),
                });
            }
        }

        Err(Error::UnknownCrs(trimmed.to_string()))
    }

    /// Resolve a raw PROJ definition, recovering the canonical code when the
    /// definition matches a registered system.
    fn from_definition(definition: &str) -> Result<Self> {
        let tokens = definition_tokens(definition);

        for (code, _, registered) in REGISTRY {
            if tokens == definition_tokens(registered) {
                return Ok(Self {
                    code: (*code).to_string(),
                    definition: (*registered).to_string(),
                });
            }
        }

        // Unregistered but parseable definitions are still usable; reject
        // only what proj4rs cannot interpret.
        Proj::from_proj_string(definition)
            .map_err(|_| Error::UnknownCrs(definition.to_string()))?;

        Ok(Self {
            code: definition.to_string(),
            definition: definition.to_string(),
        })
    }

    /// Canonical identifier, e.g. `"EPSG:5070"`.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The PROJ definition string this CRS resolves to.
    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// Numeric EPSG code, if the canonical identifier carries one.
    pub fn epsg(&self) -> Option<u32> {
        self.code.strip_prefix("EPSG:")?.parse().ok()
    }

    /// Whether coordinates are geographic (degrees) rather than projected.
    pub fn is_geographic(&self) -> bool {
        self.definition.contains("+proj=longlat")
    }

    /// Build a proj4rs projection handle for coordinate transforms.
    pub fn to_proj(&self) -> Result<Proj> {
        Proj::from_proj_string(&self.definition)
            .map_err(|_| Error::UnknownCrs(self.code.clone()))
    }
}

impl PartialEq for Crs {
    fn eq(&self, other: &Self) -> bool {
        definition_tokens(&self.definition) == definition_tokens(&other.definition)
    }
}

impl Eq for Crs {}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

/// Token-set view of a PROJ definition, ignoring parameter order.
fn definition_tokens(definition: &str) -> BTreeSet<&str> {
    definition
        .split_whitespace()
        .filter(|t| *t != "+no_defs" && *t != "+wktext" && *t != "+type=crs")
        .collect()
}
