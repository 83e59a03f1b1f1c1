use tiling::TileSource;

use crate::symbology::LayerStyle;

/// Stable reference to a layer in a [`LayerStack`](crate::LayerStack).
///
/// Handles are never reused within a stack, so a handle held across an await
/// either still names the same layer or names nothing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerHandle(pub u64);

impl std::fmt::Display for LayerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "layer#{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LayerRole {
    Base,
    Overlay,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    handle: LayerHandle,
    role: LayerRole,
    pub source: TileSource,
    pub style: LayerStyle,
    z_order: i64,
}

impl Layer {
    pub(crate) fn new(handle: LayerHandle, role: LayerRole, source: TileSource, z_order: i64) -> Self {
        Self {
            handle,
            role,
            source,
            style: LayerStyle::default(),
            z_order,
        }
    }

    pub fn handle(&self) -> LayerHandle {
        self.handle
    }

    pub fn role(&self) -> LayerRole {
        self.role
    }

    pub fn is_base(&self) -> bool {
        self.role == LayerRole::Base
    }

    pub fn z_order(&self) -> i64 {
        self.z_order
    }

    pub fn name(&self) -> &str {
        &self.source.name
    }
}
