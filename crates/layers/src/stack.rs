use tiling::TileSource;
use tracing::{debug, info};

use crate::layer::{Layer, LayerHandle, LayerRole};

/// The base layer always sits in this slot; overlays stack above it.
pub const BASE_Z_ORDER: i64 = 0;

/// Ordered layers: at most one base at the bottom, overlays above it in
/// insertion order.
///
/// Every mutation completes before it returns, so a renderer reading
/// [`LayerStack::layers`] never sees a half-applied change.
#[derive(Debug, Clone)]
pub struct LayerStack {
    /// Paint order, ascending `z_order`.
    layers: Vec<Layer>,
    next_handle: u64,
    next_overlay_z: i64,
}

impl Default for LayerStack {
    fn default() -> Self {
        Self {
            layers: Vec::new(),
            next_handle: 1,
            next_overlay_z: BASE_Z_ORDER + 1,
        }
    }
}

impl LayerStack {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_handle(&mut self) -> LayerHandle {
        let handle = LayerHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    /// Installs `source` as the base layer.
    ///
    /// An existing base is swapped in place, in a single step; otherwise the
    /// new base goes beneath every overlay. Overlays are never touched.
    pub fn set_base(&mut self, source: TileSource) -> LayerHandle {
        let handle = self.allocate_handle();
        let layer = Layer::new(handle, LayerRole::Base, source, BASE_Z_ORDER);
        info!(%handle, name = layer.name(), "set base layer");
        match self.layers.first_mut() {
            Some(slot) if slot.is_base() => *slot = layer,
            _ => self.layers.insert(0, layer),
        }
        handle
    }

    /// Appends `source` above all existing overlays.
    pub fn add_overlay(&mut self, source: TileSource) -> LayerHandle {
        let handle = self.allocate_handle();
        let z_order = self.next_overlay_z;
        self.next_overlay_z += 1;
        let layer = Layer::new(handle, LayerRole::Overlay, source, z_order);
        info!(%handle, name = layer.name(), z_order, "added overlay layer");
        self.layers.push(layer);
        handle
    }

    /// Removes the overlay named by `handle`. Returns whether anything was removed.
    pub fn remove_overlay(&mut self, handle: LayerHandle) -> bool {
        let Some(index) = self
            .layers
            .iter()
            .position(|l| l.handle() == handle && l.role() == LayerRole::Overlay)
        else {
            debug!(%handle, "overlay already absent");
            return false;
        };
        let removed = self.layers.remove(index);
        info!(%handle, name = removed.name(), "removed overlay layer");
        true
    }

    pub fn remove_base(&mut self) -> bool {
        if self.base().is_none() {
            return false;
        }
        let removed = self.layers.remove(0);
        info!(handle = %removed.handle(), name = removed.name(), "removed base layer");
        true
    }

    /// Drops every layer, base included. Returns how many were removed.
    pub fn clear_all(&mut self) -> usize {
        let count = self.layers.len();
        self.layers.clear();
        if count > 0 {
            info!(count, "cleared all layers");
        }
        count
    }

    /// All layers in paint order: base first, then overlays by ascending `z_order`.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn contains(&self, handle: LayerHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn get(&self, handle: LayerHandle) -> Option<&Layer> {
        self.layers.iter().find(|l| l.handle() == handle)
    }

    pub fn get_mut(&mut self, handle: LayerHandle) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.handle() == handle)
    }

    pub fn base(&self) -> Option<&Layer> {
        self.layers.first().filter(|l| l.is_base())
    }

    pub fn overlays(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter().filter(|l| !l.is_base())
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays().count()
    }
}

#[cfg(test)]
mod tests {
    use super::{BASE_Z_ORDER, LayerStack};
    use crate::layer::{LayerHandle, LayerRole};
    use pretty_assertions::assert_eq;
    use tiling::{TileSource, TileUrlTemplate};

    fn source(name: &str) -> TileSource {
        let template = format!("https://{name}.tiles.test/{{z}}/{{x}}/{{y}}.png");
        TileSource::xyz(name, TileUrlTemplate::new(template).unwrap())
    }

    fn names(stack: &LayerStack) -> Vec<&str> {
        stack.layers().iter().map(|l| l.name()).collect()
    }

    fn assert_invariants(stack: &LayerStack) {
        let bases = stack.layers().iter().filter(|l| l.is_base()).count();
        assert!(bases <= 1);
        if bases == 1 {
            assert!(stack.layers()[0].is_base());
            assert_eq!(stack.layers()[0].z_order(), BASE_Z_ORDER);
        }
        let z: Vec<i64> = stack.layers().iter().map(|l| l.z_order()).collect();
        assert!(z.windows(2).all(|w| w[0] < w[1]), "z orders {z:?}");
    }

    #[test]
    fn replacing_base_keeps_overlay_order() {
        let mut stack = LayerStack::new();
        let a = stack.set_base(source("a"));
        stack.add_overlay(source("o1"));
        stack.add_overlay(source("o2"));
        let b = stack.set_base(source("b"));

        assert_ne!(a, b);
        assert_eq!(names(&stack), vec!["b", "o1", "o2"]);
        assert_eq!(stack.base().map(|l| l.handle()), Some(b));
        assert!(!stack.contains(a));
        assert_invariants(&stack);
    }

    #[test]
    fn base_inserted_after_overlays_goes_to_the_bottom() {
        let mut stack = LayerStack::new();
        stack.add_overlay(source("o1"));
        stack.set_base(source("base"));
        assert_eq!(names(&stack), vec!["base", "o1"]);
        assert_eq!(stack.layers()[0].role(), LayerRole::Base);
        assert_invariants(&stack);
    }

    #[test]
    fn overlays_stack_in_insertion_order() {
        let mut stack = LayerStack::new();
        stack.set_base(source("base"));
        let o1 = stack.add_overlay(source("o1"));
        let o2 = stack.add_overlay(source("o2"));
        stack.remove_overlay(o1);
        let o3 = stack.add_overlay(source("o3"));

        assert_eq!(names(&stack), vec!["base", "o2", "o3"]);
        assert!(stack.get(o3).unwrap().z_order() > stack.get(o2).unwrap().z_order());
        assert_eq!(stack.overlay_count(), 2);
        assert_invariants(&stack);
    }

    #[test]
    fn removing_twice_is_a_no_op() {
        let mut stack = LayerStack::new();
        stack.set_base(source("base"));
        let o1 = stack.add_overlay(source("o1"));
        stack.add_overlay(source("o2"));

        assert!(stack.remove_overlay(o1));
        let before = names(&stack).join(",");
        assert!(!stack.remove_overlay(o1));
        assert_eq!(names(&stack).join(","), before);
        assert!(!stack.remove_overlay(LayerHandle(999)));
    }

    #[test]
    fn remove_overlay_ignores_the_base_handle() {
        let mut stack = LayerStack::new();
        let base = stack.set_base(source("base"));
        assert!(!stack.remove_overlay(base));
        assert!(stack.base().is_some());

        assert!(stack.remove_base());
        assert!(!stack.remove_base());
        assert!(stack.base().is_none());
    }

    #[test]
    fn clear_all_drops_everything_and_handles_stay_unique() {
        let mut stack = LayerStack::new();
        let base = stack.set_base(source("base"));
        let o1 = stack.add_overlay(source("o1"));
        assert_eq!(stack.clear_all(), 2);
        assert!(stack.is_empty());
        assert_eq!(stack.clear_all(), 0);

        let again = stack.add_overlay(source("o1"));
        assert_ne!(again, base);
        assert_ne!(again, o1);
    }

    #[test]
    fn style_changes_through_get_mut() {
        let mut stack = LayerStack::new();
        let o1 = stack.add_overlay(source("o1"));
        let layer = stack.get_mut(o1).unwrap();
        layer.style.visible = false;
        layer.style.set_opacity(0.5);
        assert_eq!(stack.get(o1).unwrap().style.opacity(), 0.5);
        assert!(!stack.get(o1).unwrap().style.visible);
    }
}
