use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Opaque region geometry payload (GeoJSON text in practice).
///
/// The registry never interprets the contents beyond hashing them for
/// idempotent upserts; the render surface consumes the payload verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Geometry(String);

impl Geometry {
    pub fn new(raw: impl Into<String>) -> Self {
        Geometry(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Content digest of a region's geometry + kind.
///
/// Two upserts with the same hash are the same region as far as the registry
/// is concerned, regardless of which id the caller submitted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Digest `kind` tag + geometry bytes.
    ///
    /// The kind participates so that e.g. a drawn and an uploaded region with
    /// byte-identical geometry stay distinct entities.
    pub fn of(kind_tag: &str, geometry: &Geometry) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(kind_tag.as_bytes());
        hasher.update(b"\0");
        hasher.update(geometry.as_str().as_bytes());
        ContentHash(hasher.finalize().to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for content-derived ids and log lines.
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference to a rendered overlay artifact (URL or handle).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(raw: impl Into<String>) -> Self {
        ImageRef(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Overlay bounding rectangle in map units, passed through unmodified.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl OverlayBounds {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }
}

/// Summary statistics the clip service reports alongside an overlay.
///
/// Opaque passthrough for the UI (legend/histogram display); the registry
/// never reads the values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverlayStats(pub BTreeMap<String, f64>);
