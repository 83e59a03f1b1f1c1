#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LayerStyle {
    pub visible: bool,
    opacity: f32,
}

impl LayerStyle {
    pub fn new(visible: bool, opacity: f32) -> Self {
        Self {
            visible,
            opacity: clamp_opacity(opacity),
        }
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Stored clamped to `[0, 1]`; NaN becomes fully transparent.
    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = clamp_opacity(opacity);
    }

    /// Visible and not fully transparent.
    pub fn is_painted(&self) -> bool {
        self.visible && self.opacity > 0.0
    }
}

impl Default for LayerStyle {
    fn default() -> Self {
        Self {
            visible: true,
            opacity: 1.0,
        }
    }
}

fn clamp_opacity(opacity: f32) -> f32 {
    if opacity.is_nan() {
        0.0
    } else {
        opacity.clamp(0.0, 1.0)
    }
}
