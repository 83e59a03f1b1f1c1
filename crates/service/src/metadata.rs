//! Published metadata of a cached map service.
//!
//! The JSON layout mirrors what the service advertises (camelCase keys,
//! `minLOD`/`maxLOD`). The built-in preset is the GF2 Web Mercator imagery
//! service the workspace was built against.

use std::path::{Path, PathBuf};

use foundation::bounds::{ExtentError, GeoExtent, ProjectedExtent, ProjectedPoint};
use foundation::math::{DomainError, geo_extent_to_projected, to_projected};
use serde::{Deserialize, Serialize};
use tiling::{ConfigError, TileAddress, TileGrid, TileSource, TileUrlTemplate};
use tracing::{debug, warn};

/// Largest disagreement (meters, any bound) tolerated between the published
/// projected extent and the one derived from the geographic extent.
pub const DEFAULT_EXTENT_TOLERANCE_M: f64 = 0.01;

/// Zoom used when a session opens, before any fit.
pub const INITIAL_ZOOM: f64 = 12.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileGridSpec {
    pub origin: ProjectedPoint,
    /// `[width, height]` in pixels.
    pub tile_size: [u32; 2],
    pub resolutions: Vec<f64>,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoomLevels {
    #[serde(rename = "minLOD")]
    pub min_lod: u8,
    #[serde(rename = "maxLOD")]
    pub max_lod: u8,
    /// Advisory; never used to clamp zoom.
    #[serde(rename = "minScale")]
    pub min_scale: f64,
    #[serde(rename = "maxScale")]
    pub max_scale: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMetadata {
    pub name: String,
    pub service_url: String,
    pub geo_extent: GeoExtent,
    pub web_mercator_extent: ProjectedExtent,
    pub initial_extent: ProjectedExtent,
    pub tile_grid: TileGridSpec,
    pub zoom_levels: ZoomLevels,
}

#[derive(Debug)]
pub enum MetadataError {
    Io { path: PathBuf, source: std::io::Error },
    Json(serde_json::Error),
    Extent { field: &'static str, source: ExtentError },
    Projection(DomainError),
    Grid(ConfigError),
    /// The published projected extent and the one derived from `geoExtent`
    /// disagree by more than the tolerance.
    ExtentMismatch { delta_m: f64, tolerance_m: f64 },
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::Io { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
            MetadataError::Json(e) => write!(f, "invalid service metadata: {e}"),
            MetadataError::Extent { field, source } => write!(f, "{field}: {source}"),
            MetadataError::Projection(e) => write!(f, "geoExtent cannot be projected: {e}"),
            MetadataError::Grid(e) => write!(f, "invalid tile grid: {e}"),
            MetadataError::ExtentMismatch {
                delta_m,
                tolerance_m,
            } => write!(
                f,
                "webMercatorExtent differs from projected geoExtent by {delta_m} m (tolerance {tolerance_m} m)"
            ),
        }
    }
}

impl std::error::Error for MetadataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MetadataError::Io { source, .. } => Some(source),
            MetadataError::Json(e) => Some(e),
            MetadataError::Extent { source, .. } => Some(source),
            MetadataError::Projection(e) => Some(e),
            MetadataError::Grid(e) => Some(e),
            MetadataError::ExtentMismatch { .. } => None,
        }
    }
}

impl From<ConfigError> for MetadataError {
    fn from(e: ConfigError) -> Self {
        MetadataError::Grid(e)
    }
}

impl From<DomainError> for MetadataError {
    fn from(e: DomainError) -> Self {
        MetadataError::Projection(e)
    }
}

/// Result of comparing the two published extents.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ExtentCheck {
    pub derived: ProjectedExtent,
    /// Largest per-bound difference, meters.
    pub delta_m: f64,
}

impl Default for ServiceMetadata {
    fn default() -> Self {
        Self::gf2_web_mercator()
    }
}

impl ServiceMetadata {
    /// The GF2 imagery service (EPSG:3857, 24 levels, LOD 0..18).
    pub fn gf2_web_mercator() -> Self {
        Self {
            name: "GF2_data_3857".to_string(),
            service_url: "https://geoscence51.geoscene.cn:6443/geoscene/rest/services/Hosted/GF2_data_3857/MapServer".to_string(),
            geo_extent: GeoExtent {
                xmin: 108.556089991995194,
                ymin: 32.478813272518501,
                xmax: 108.771856340087851,
                ymax: 32.647048539145018,
            },
            web_mercator_extent: ProjectedExtent {
                xmin: 12084408.6604176853,
                ymin: 3826327.72376103653,
                xmax: 12108427.6604176853,
                ymax: 3848548.72376103653,
            },
            initial_extent: ProjectedExtent {
                xmin: 12084783.34152266,
                ymin: 3827413.09650263982,
                xmax: 12108073.6832607277,
                ymax: 3847463.89650263963,
            },
            tile_grid: TileGridSpec {
                origin: ProjectedPoint::new(-20037508.342787001, 20037508.342787001),
                tile_size: [256, 256],
                resolutions: vec![
                    156543.03392799999,
                    78271.516963999893,
                    39135.758482000099,
                    19567.879240999901,
                    9783.9396204999593,
                    4891.9698102499797,
                    2445.9849051249898,
                    1222.9924525624899,
                    611.49622628138002,
                    305.74811314055802,
                    152.874056570411,
                    76.437028285073197,
                    38.218514142536598,
                    19.109257071268299,
                    9.5546285356341496,
                    4.7773142679493699,
                    2.38865713397468,
                    1.1943285668550501,
                    0.59716428355981699,
                    0.29858214164761698,
                    0.14929107082380833,
                    0.074645535411904163,
                    0.037322767705952081,
                    0.018661383852976041,
                ],
            },
            zoom_levels: ZoomLevels {
                min_lod: 0,
                max_lod: 18,
                min_scale: 591657527.591555,
                max_scale: 2256.994353,
            },
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, MetadataError> {
        let metadata: Self = serde_json::from_str(json).map_err(MetadataError::Json)?;
        metadata.validate()?;
        Ok(metadata)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, MetadataError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| MetadataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loading service metadata");
        Self::from_json_str(&json)
    }

    pub fn to_json_pretty(&self) -> Result<String, MetadataError> {
        serde_json::to_string_pretty(self).map_err(MetadataError::Json)
    }

    /// Checks every extent and the tile grid. Extent agreement is a separate
    /// check, see [`ServiceMetadata::check_extent_consistency`].
    pub fn validate(&self) -> Result<(), MetadataError> {
        let extents = [
            ("geoExtent", self.geo_extent.validate()),
            ("webMercatorExtent", self.web_mercator_extent.validate()),
            ("initialExtent", self.initial_extent.validate()),
        ];
        for (field, result) in extents {
            result.map_err(|source| MetadataError::Extent { field, source })?;
        }
        self.tile_grid()?;
        Ok(())
    }

    pub fn with_service_url(mut self, url: impl Into<String>) -> Self {
        self.service_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// The pyramid, restricted to the published LOD range.
    pub fn tile_grid(&self) -> Result<TileGrid, ConfigError> {
        TileGrid::with_tile_dims(
            self.tile_grid.origin,
            self.tile_grid.tile_size,
            self.tile_grid.resolutions.clone(),
        )?
        .with_lod_range(self.zoom_levels.min_lod, self.zoom_levels.max_lod)
    }

    /// `{serviceUrl}/tile/{z}/{y}/{x}`.
    pub fn tile_template(&self) -> TileUrlTemplate {
        TileUrlTemplate::map_server(&self.service_url)
    }

    pub fn tile_source(&self) -> Result<TileSource, ConfigError> {
        Ok(TileSource::templated(
            self.name.as_str(),
            self.tile_template(),
            self.tile_grid()?,
        ))
    }

    /// Dynamic `export` rendering of the same service on the same grid.
    pub fn export_source(&self) -> Result<TileSource, ConfigError> {
        Ok(TileSource::arcgis_export(
            format!("{} (export)", self.name),
            &self.service_url,
            self.tile_grid()?,
        ))
    }

    /// Base URL, JS API capabilities and JSON metadata, in that order.
    pub fn probe_targets(&self) -> Vec<String> {
        vec![
            self.service_url.clone(),
            format!("{}?f=jsapi", self.service_url),
            format!("{}?f=json", self.service_url),
        ]
    }

    /// The tile the loader checks first: `12/1654/3285` in `z/y/x` order.
    pub fn spot_check_tile(&self) -> TileAddress {
        TileAddress::new(12, 3285, 1654)
    }

    /// Projected midpoint of `geoExtent`.
    pub fn initial_center(&self) -> Result<ProjectedPoint, DomainError> {
        let c = self.geo_extent.center();
        to_projected(c.lon, c.lat)
    }

    /// `webMercatorExtent` as published, after checking it against `geoExtent`.
    ///
    /// A mismatch is returned as an error and logged; neither extent is
    /// silently preferred.
    pub fn check_extent_consistency(&self, tolerance_m: f64) -> Result<ExtentCheck, MetadataError> {
        let derived = geo_extent_to_projected(&self.geo_extent)?;
        let delta_m = self.web_mercator_extent.max_bound_delta(&derived);
        if !(delta_m <= tolerance_m) {
            warn!(
                delta_m,
                tolerance_m,
                published = ?self.web_mercator_extent.as_array(),
                derived = ?derived.as_array(),
                "projected extents disagree"
            );
            return Err(MetadataError::ExtentMismatch {
                delta_m,
                tolerance_m,
            });
        }
        debug!(delta_m, "projected extents agree");
        Ok(ExtentCheck { derived, delta_m })
    }
}
