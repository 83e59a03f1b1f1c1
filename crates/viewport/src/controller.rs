//! Viewport state plus the animated "fit to extent" operation.
//!
//! The controller is driven from a single-threaded event loop: every mutating
//! call takes the current session time, and an in-flight animation only
//! advances when [`ViewportController::update`] is called. Starting a new
//! `fit` (or any direct pan/zoom) first settles the view at its interpolated
//! position for `now`, then discards the old animation. Nothing is queued.

use foundation::bounds::{ProjectedExtent, ProjectedPoint};
use foundation::time::Time;
use tiling::TileGrid;
use tracing::{debug, info};

use crate::animation::{Animation, Easing};
use crate::view::{Padding, ViewState, ViewportSize};

#[derive(Debug, Clone, PartialEq)]
pub enum ViewportError {
    EmptyViewport,
    /// Padding leaves no pixels to fit into.
    PaddingExceedsViewport { available_width: f64, available_height: f64 },
}

impl std::fmt::Display for ViewportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewportError::EmptyViewport => write!(f, "viewport has zero width or height"),
            ViewportError::PaddingExceedsViewport {
                available_width,
                available_height,
            } => write!(
                f,
                "padding leaves {available_width}x{available_height} px to fit into"
            ),
        }
    }
}

impl std::error::Error for ViewportError {}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FitOptions {
    pub padding: Padding,
    /// `0` applies the new view immediately.
    pub duration_ms: u64,
    /// Upper zoom bound for the fit, on top of the grid's own LOD range.
    pub max_zoom: Option<f64>,
    pub easing: Easing,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            padding: Padding::default(),
            duration_ms: 0,
            max_zoom: None,
            easing: Easing::default(),
        }
    }
}

impl FitOptions {
    pub fn immediate() -> Self {
        Self::default()
    }

    pub fn with_padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_max_zoom(mut self, max_zoom: f64) -> Self {
        self.max_zoom = Some(max_zoom);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ViewportController {
    grid: TileGrid,
    size: ViewportSize,
    view: ViewState,
    constraint: Option<ProjectedExtent>,
    animation: Option<Animation>,
}

impl ViewportController {
    pub fn new(
        grid: TileGrid,
        size: ViewportSize,
        initial: ViewState,
    ) -> Result<Self, ViewportError> {
        if size.is_empty() {
            return Err(ViewportError::EmptyViewport);
        }
        let mut controller = Self {
            grid,
            size,
            view: initial,
            constraint: None,
            animation: None,
        };
        controller.view = controller.constrain(initial);
        Ok(controller)
    }

    /// Keeps every future view inside `extent`.
    pub fn with_extent_constraint(mut self, extent: ProjectedExtent) -> Self {
        self.constraint = Some(extent);
        self.view = self.constrain(self.view);
        self
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn size(&self) -> ViewportSize {
        self.size
    }

    pub fn constraint(&self) -> Option<ProjectedExtent> {
        self.constraint
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    pub fn animation(&self) -> Option<&Animation> {
        self.animation.as_ref()
    }

    pub fn set_viewport_size(&mut self, size: ViewportSize) -> Result<(), ViewportError> {
        if size.is_empty() {
            return Err(ViewportError::EmptyViewport);
        }
        self.size = size;
        self.view = self.constrain(self.view);
        Ok(())
    }

    /// Zoom bounds from the grid's LOD range.
    pub fn zoom_bounds(&self) -> (f64, f64) {
        let lod = self.grid.lod_range();
        (f64::from(lod.min), f64::from(lod.max))
    }

    pub fn current_extent(&self, size: ViewportSize) -> ProjectedExtent {
        self.view.extent(&self.grid, size)
    }

    pub fn visible_extent(&self) -> ProjectedExtent {
        self.current_extent(self.size)
    }

    pub fn resolution(&self) -> f64 {
        self.view.resolution(&self.grid)
    }

    pub fn tile_level(&self) -> u8 {
        self.view.tile_level(&self.grid)
    }

    /// Advances the in-flight animation to `now`.
    ///
    /// Returns `true` while an animation is still running.
    pub fn update(&mut self, now: Time) -> bool {
        let Some(anim) = self.animation else {
            return false;
        };
        self.view = self.constrain(anim.sample(now));
        if anim.is_finished(now) {
            self.animation = None;
            debug!(zoom = self.view.zoom, "view animation finished");
            return false;
        }
        true
    }

    /// The view that fits `target` inside the viewport, without applying it.
    pub fn fit_view(
        &self,
        target: &ProjectedExtent,
        options: &FitOptions,
    ) -> Result<ViewState, ViewportError> {
        let pad = options.padding;
        let available_width = f64::from(self.size.width) - pad.left - pad.right;
        let available_height = f64::from(self.size.height) - pad.top - pad.bottom;
        if available_width <= 0.0 || available_height <= 0.0 {
            return Err(ViewportError::PaddingExceedsViewport {
                available_width,
                available_height,
            });
        }

        let resolution =
            (target.width() / available_width).max(target.height() / available_height);
        let (min_zoom, lod_max) = self.zoom_bounds();
        let max_zoom = options.max_zoom.map_or(lod_max, |z| z.min(lod_max)).max(min_zoom);
        let zoom = self
            .grid
            .zoom_for_resolution(resolution)
            .clamp(min_zoom, max_zoom);

        Ok(self.constrain(ViewState::new(target.center(), zoom)))
    }

    /// Moves the view so `target` (plus padding) is fully visible.
    ///
    /// Returns the view the controller is heading to.
    pub fn fit(
        &mut self,
        target: &ProjectedExtent,
        options: &FitOptions,
        now: Time,
    ) -> Result<ViewState, ViewportError> {
        let to = self.fit_view(target, options)?;
        info!(
            target = ?target.as_array(),
            zoom = to.zoom,
            duration_ms = options.duration_ms,
            "fit view to extent"
        );
        self.start_transition(to, options.duration_ms, options.easing, now);
        Ok(to)
    }

    /// Non-finite input is ignored; a running animation is still settled.
    pub fn pan_to(&mut self, center: ProjectedPoint, now: Time) {
        self.set_view(ViewState::new(center, self.view.zoom), now);
    }

    pub fn zoom_to(&mut self, zoom: f64, now: Time) {
        self.set_view(ViewState::new(self.view.center, zoom), now);
    }

    pub fn set_view(&mut self, view: ViewState, now: Time) {
        self.settle(now);
        if !view.zoom.is_finite() || !view.center.is_finite() {
            debug!(zoom = view.zoom, "ignoring non-finite view");
            return;
        }
        let (min_zoom, max_zoom) = self.zoom_bounds();
        self.view = self.constrain(ViewState::new(view.center, view.zoom.clamp(min_zoom, max_zoom)));
    }

    /// Cancels any animation, leaving the view where it was at `now`.
    pub fn settle(&mut self, now: Time) {
        if self.animation.is_some() {
            self.update(now);
            if self.animation.take().is_some() {
                debug!(zoom = self.view.zoom, "view animation cancelled");
            }
        }
    }

    fn start_transition(&mut self, to: ViewState, duration_ms: u64, easing: Easing, now: Time) {
        self.settle(now);
        if duration_ms == 0 {
            self.view = to;
            return;
        }
        self.animation = Some(Animation::new(self.view, to, now, duration_ms, easing));
    }

    /// Pulls a view back inside the extent constraint, if one is set.
    fn constrain(&self, view: ViewState) -> ViewState {
        let Some(bounds) = self.constraint else {
            return view;
        };
        let (width_px, height_px) = (f64::from(self.size.width), f64::from(self.size.height));
        let (_, max_zoom) = self.zoom_bounds();

        let coarsest = (bounds.width() / width_px).min(bounds.height() / height_px);
        let zoom = view
            .zoom
            .max(self.grid.zoom_for_resolution(coarsest))
            .min(max_zoom);

        let resolution = self.grid.resolution_for_zoom(zoom);
        let half_w = resolution * width_px / 2.0;
        let half_h = resolution * height_px / 2.0;
        let clamp_axis = |v: f64, lo: f64, hi: f64| {
            if lo <= hi { v.clamp(lo, hi) } else { (lo + hi) / 2.0 }
        };
        let center = ProjectedPoint::new(
            clamp_axis(view.center.x, bounds.xmin + half_w, bounds.xmax - half_w),
            clamp_axis(view.center.y, bounds.ymin + half_h, bounds.ymax - half_h),
        );
        ViewState::new(center, zoom)
    }
}
