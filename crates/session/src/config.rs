use service::{BasemapCatalog, DEFAULT_BASEMAP, DEFAULT_EXTENT_TOLERANCE_M, ServiceMetadata};
use viewport::{FitOptions, Padding, ViewportSize};

/// Zoom cap for every fit to the service extent.
pub const FIT_MAX_ZOOM: f64 = 15.0;

/// Map background drawn beneath all layers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Backdrop {
    #[default]
    White,
    /// Used while the overlay is shown on its own.
    Black,
}

impl Backdrop {
    pub fn css_color(self) -> &'static str {
        match self {
            Backdrop::White => "#ffffff",
            Backdrop::Black => "#000000",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub metadata: ServiceMetadata,
    pub catalog: BasemapCatalog,
    /// Key into `catalog` for the initial base map.
    pub basemap: String,
    pub viewport: ViewportSize,
    /// Fit applied after loading an overlay.
    pub load_fit: FitOptions,
    /// Fit applied by `reset_view`.
    pub reset_fit: FitOptions,
    /// Loading an overlay first removes every layer, base map included.
    pub exclusive_overlay: bool,
    /// Keep the view inside the service's `webMercatorExtent`.
    pub constrain_view: bool,
    /// `None` skips the published-vs-derived extent check on open.
    pub extent_tolerance_m: Option<f64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let fit = FitOptions::immediate()
            .with_padding(Padding::uniform(50.0))
            .with_max_zoom(FIT_MAX_ZOOM);
        Self {
            metadata: ServiceMetadata::default(),
            catalog: BasemapCatalog::builtin(),
            basemap: DEFAULT_BASEMAP.to_string(),
            viewport: ViewportSize::new(1024, 768),
            load_fit: fit.with_duration_ms(1000),
            reset_fit: fit.with_duration_ms(800),
            exclusive_overlay: true,
            constrain_view: true,
            extent_tolerance_m: Some(DEFAULT_EXTENT_TOLERANCE_M),
        }
    }
}

impl SessionConfig {
    pub fn with_metadata(mut self, metadata: ServiceMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_basemap(mut self, key: impl Into<String>) -> Self {
        self.basemap = key.into();
        self
    }

    pub fn with_viewport(mut self, size: ViewportSize) -> Self {
        self.viewport = size;
        self
    }

    /// Zero-duration fits, for headless runs.
    pub fn without_animation(mut self) -> Self {
        self.load_fit.duration_ms = 0;
        self.reset_fit.duration_ms = 0;
        self
    }
}
