use foundation::bounds::{ProjectedExtent, ProjectedPoint};
use foundation::math::HALF_WORLD_M;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::address::{TileAddress, TileRange};

/// Slack (in tile units) applied when snapping extent edges to tile edges, so
/// that an extent lying exactly on tile boundaries does not pick up neighbours
/// through floating-point noise.
const EDGE_EPSILON: f64 = 1e-7;

/// Relative slack when comparing a requested resolution against pyramid levels.
const RESOLUTION_EPSILON: f64 = 1e-9;

/// Levels in the standard Web Mercator pyramid.
pub const WEB_MERCATOR_LEVELS: u8 = 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptyResolutions,
    TooManyLevels(usize),
    NonPositiveResolution { level: usize },
    /// `resolutions[level] >= resolutions[level - 1]`.
    NotStrictlyDecreasing { level: usize },
    NonPositiveTileSize,
    NonSquareTiles { width: u32, height: u32 },
    NonFiniteOrigin,
    InvalidLodRange { min: u8, max: u8, levels: usize },
    MissingPlaceholder(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::EmptyResolutions => write!(f, "resolution pyramid is empty"),
            ConfigError::TooManyLevels(n) => {
                write!(f, "resolution pyramid has {n} levels (max 256)")
            }
            ConfigError::NonPositiveResolution { level } => {
                write!(f, "resolution at level {level} is not a positive number")
            }
            ConfigError::NotStrictlyDecreasing { level } => {
                write!(f, "resolution at level {level} does not decrease")
            }
            ConfigError::NonPositiveTileSize => write!(f, "tile size must be positive"),
            ConfigError::NonSquareTiles { width, height } => {
                write!(f, "tiles must be square, got {width}x{height}")
            }
            ConfigError::NonFiniteOrigin => write!(f, "grid origin is not finite"),
            ConfigError::InvalidLodRange { min, max, levels } => {
                write!(f, "LOD range {min}..={max} does not fit a {levels}-level pyramid")
            }
            ConfigError::MissingPlaceholder(p) => {
                write!(f, "tile URL template is missing {p}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Inclusive range of selectable pyramid levels.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LodRange {
    pub min: u8,
    pub max: u8,
}

impl LodRange {
    pub fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, level: u8) -> u8 {
        level.clamp(self.min, self.max)
    }
}

/// Resolution pyramid anchored at a top-left origin.
///
/// A constructed grid is always valid: resolutions are non-empty, positive
/// and strictly decreasing, the tile size is positive, and the LOD range
/// lies inside the pyramid.
#[derive(Debug, Clone, PartialEq)]
pub struct TileGrid {
    origin: ProjectedPoint,
    tile_size: u32,
    resolutions: Vec<f64>,
    lod: LodRange,
}

impl TileGrid {
    pub fn new(
        origin: ProjectedPoint,
        tile_size: u32,
        resolutions: Vec<f64>,
    ) -> Result<Self, ConfigError> {
        if resolutions.is_empty() {
            return Err(ConfigError::EmptyResolutions);
        }
        if resolutions.len() > 256 {
            return Err(ConfigError::TooManyLevels(resolutions.len()));
        }
        if tile_size == 0 {
            return Err(ConfigError::NonPositiveTileSize);
        }
        if !origin.x.is_finite() || !origin.y.is_finite() {
            return Err(ConfigError::NonFiniteOrigin);
        }
        for (level, &r) in resolutions.iter().enumerate() {
            if !(r.is_finite() && r > 0.0) {
                return Err(ConfigError::NonPositiveResolution { level });
            }
            if level > 0 && r >= resolutions[level - 1] {
                return Err(ConfigError::NotStrictlyDecreasing { level });
            }
        }

        let lod = LodRange::new(0, (resolutions.len() - 1) as u8);
        debug!(
            levels = resolutions.len(),
            origin_x = origin.x,
            origin_y = origin.y,
            tile_size,
            "tile grid constructed"
        );
        Ok(Self {
            origin,
            tile_size,
            resolutions,
            lod,
        })
    }

    /// Like [`TileGrid::new`] but takes a `[width, height]` tile size as
    /// published by map services. Only square tiles are supported.
    pub fn with_tile_dims(
        origin: ProjectedPoint,
        tile_dims: [u32; 2],
        resolutions: Vec<f64>,
    ) -> Result<Self, ConfigError> {
        let [width, height] = tile_dims;
        if width == 0 || height == 0 {
            return Err(ConfigError::NonPositiveTileSize);
        }
        if width != height {
            return Err(ConfigError::NonSquareTiles { width, height });
        }
        Self::new(origin, width, resolutions)
    }

    /// The standard 24-level, 256px Web Mercator pyramid used by XYZ basemaps.
    pub fn web_mercator() -> Self {
        let resolutions: Vec<f64> = (0..WEB_MERCATOR_LEVELS)
            .map(|z| 2.0 * HALF_WORLD_M / 256.0 / f64::from(1u32 << z))
            .collect();
        Self {
            origin: ProjectedPoint::new(-HALF_WORLD_M, HALF_WORLD_M),
            tile_size: 256,
            lod: LodRange::new(0, WEB_MERCATOR_LEVELS - 1),
            resolutions,
        }
    }

    /// Restricts which levels are selectable.
    pub fn with_lod_range(mut self, min: u8, max: u8) -> Result<Self, ConfigError> {
        let levels = self.resolutions.len();
        if min > max || usize::from(max) >= levels {
            return Err(ConfigError::InvalidLodRange { min, max, levels });
        }
        self.lod = LodRange::new(min, max);
        Ok(self)
    }

    pub fn origin(&self) -> ProjectedPoint {
        self.origin
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn resolutions(&self) -> &[f64] {
        &self.resolutions
    }

    pub fn level_count(&self) -> usize {
        self.resolutions.len()
    }

    pub fn lod_range(&self) -> LodRange {
        self.lod
    }

    pub fn finest_level(&self) -> u8 {
        (self.resolutions.len() - 1) as u8
    }

    pub fn resolution(&self, z: u8) -> Option<f64> {
        self.resolutions.get(usize::from(z)).copied()
    }

    /// Edge length of one tile at level `z`, in projected meters.
    pub fn tile_span(&self, z: u8) -> Option<f64> {
        Some(self.resolution(z)? * f64::from(self.tile_size))
    }

    /// Coarsest level whose resolution is at least as fine as `target`,
    /// clamped into the grid's LOD range.
    pub fn level_for_resolution(&self, target: f64) -> u8 {
        let threshold = target * (1.0 + RESOLUTION_EPSILON);
        let level = self
            .resolutions
            .iter()
            .position(|&r| r <= threshold)
            .map(|i| i as u8)
            .unwrap_or_else(|| self.finest_level());
        self.lod.clamp(level)
    }

    /// Resolution at a continuous zoom, interpolated geometrically between
    /// neighbouring levels. Zooms outside the pyramid clamp to its ends.
    pub fn resolution_for_zoom(&self, zoom: f64) -> f64 {
        let last = self.resolutions.len() - 1;
        let zoom = if zoom.is_nan() { 0.0 } else { zoom.clamp(0.0, last as f64) };
        let base = zoom.floor() as usize;
        if base >= last {
            return self.resolutions[last];
        }
        let frac = zoom - base as f64;
        let (r0, r1) = (self.resolutions[base], self.resolutions[base + 1]);
        r0 * (r1 / r0).powf(frac)
    }

    /// Inverse of [`TileGrid::resolution_for_zoom`].
    pub fn zoom_for_resolution(&self, resolution: f64) -> f64 {
        let last = self.resolutions.len() - 1;
        if !(resolution < self.resolutions[0]) {
            return 0.0;
        }
        if resolution <= self.resolutions[last] {
            return last as f64;
        }
        let base = self
            .resolutions
            .windows(2)
            .position(|w| resolution <= w[0] && resolution > w[1])
            .unwrap_or(last);
        if base >= last {
            return last as f64;
        }
        let (r0, r1) = (self.resolutions[base], self.resolutions[base + 1]);
        base as f64 + (r0 / resolution).ln() / (r0 / r1).ln()
    }

    /// Projected extent of one tile.
    ///
    /// Rows grow downward from the origin while projected y grows upward,
    /// so the tile's top edge is `origin.y - y * span`.
    pub fn tile_extent(&self, addr: TileAddress) -> Option<ProjectedExtent> {
        let span = self.tile_span(addr.z)?;
        let xmin = self.origin.x + f64::from(addr.x) * span;
        let ymin = self.origin.y - (f64::from(addr.y) + 1.0) * span;
        Some(ProjectedExtent {
            xmin,
            ymin,
            xmax: xmin + span,
            ymax: ymin + span,
        })
    }

    /// Tile containing `point` at level `z`, if it lies right of and below the origin.
    pub fn tile_at(&self, point: ProjectedPoint, z: u8) -> Option<TileAddress> {
        let span = self.tile_span(z)?;
        let fx = ((point.x - self.origin.x) / span).floor();
        let fy = ((self.origin.y - point.y) / span).floor();
        if fx < 0.0 || fy < 0.0 || fx > f64::from(u32::MAX) || fy > f64::from(u32::MAX) {
            return None;
        }
        Some(TileAddress::new(z, fx as u32, fy as u32))
    }

    /// Every tile at level `z` whose extent overlaps `extent`.
    ///
    /// Tiles left of or above the origin have no address and are skipped.
    /// Returns `None` if `z` is not a level of this grid.
    pub fn tiles_covering(&self, extent: &ProjectedExtent, z: u8) -> Option<TileRange> {
        let span = self.tile_span(z)?;
        let fx0 = (extent.xmin - self.origin.x) / span;
        let fx1 = (extent.xmax - self.origin.x) / span;
        let fy0 = (self.origin.y - extent.ymax) / span;
        let fy1 = (self.origin.y - extent.ymin) / span;

        let min_x = (fx0 + EDGE_EPSILON).floor();
        let min_y = (fy0 + EDGE_EPSILON).floor();
        let max_x = ((fx1 - EDGE_EPSILON).ceil() - 1.0).max(min_x);
        let max_y = ((fy1 - EDGE_EPSILON).ceil() - 1.0).max(min_y);

        if max_x < 0.0 || max_y < 0.0 {
            return Some(TileRange::empty(z));
        }
        let clamp = |v: f64| v.clamp(0.0, f64::from(u32::MAX)) as u32;
        Some(TileRange::new(
            z,
            clamp(min_x),
            clamp(min_y),
            clamp(max_x),
            clamp(max_y),
        ))
    }
}
