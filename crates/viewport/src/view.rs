use foundation::bounds::{ProjectedExtent, ProjectedPoint};
use serde::{Deserialize, Serialize};
use tiling::TileGrid;

/// Viewport size in device pixels.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl ViewportSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Pixel padding kept clear around a fitted extent.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Padding {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Padding {
    pub fn uniform(px: f64) -> Self {
        Self {
            top: px,
            right: px,
            bottom: px,
            left: px,
        }
    }
}

impl From<[f64; 4]> for Padding {
    /// `[top, right, bottom, left]`, CSS order.
    fn from([top, right, bottom, left]: [f64; 4]) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }
}

/// Center and continuous zoom. The visible extent is derived, never stored.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub center: ProjectedPoint,
    pub zoom: f64,
}

impl ViewState {
    pub fn new(center: ProjectedPoint, zoom: f64) -> Self {
        Self { center, zoom }
    }

    pub fn resolution(&self, grid: &TileGrid) -> f64 {
        grid.resolution_for_zoom(self.zoom)
    }

    pub fn extent(&self, grid: &TileGrid, size: ViewportSize) -> ProjectedExtent {
        let resolution = self.resolution(grid);
        ProjectedExtent::from_center(
            self.center,
            resolution * f64::from(size.width),
            resolution * f64::from(size.height),
        )
    }

    /// Integral pyramid level used to pick tiles for this view.
    pub fn tile_level(&self, grid: &TileGrid) -> u8 {
        grid.level_for_resolution(self.resolution(grid))
    }

    pub fn lerp(self, other: ViewState, t: f64) -> ViewState {
        ViewState {
            center: self.center.lerp(other.center, t),
            zoom: self.zoom + (other.zoom - self.zoom) * t,
        }
    }
}
