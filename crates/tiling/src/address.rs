use serde::{Deserialize, Serialize};

/// Tile address in the grid's own `z/x/y` scheme.
///
/// `x` counts columns rightward from the grid origin, `y` counts rows
/// downward from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileAddress {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileAddress {
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }
}

impl std::fmt::Display for TileAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Inclusive rectangle of tile addresses at one level.
///
/// Ranges are lazy: iterate instead of collecting when only a few tiles are needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub z: u8,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

impl TileRange {
    pub fn new(z: u8, min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        Self {
            z,
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn empty(z: u8) -> Self {
        Self::new(z, 1, 1, 0, 0)
    }

    pub fn min(&self) -> (u32, u32) {
        (self.min_x, self.min_y)
    }

    pub fn max(&self) -> (u32, u32) {
        (self.max_x, self.max_y)
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    pub fn width(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        u64::from(self.max_x - self.min_x) + 1
    }

    pub fn height(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        u64::from(self.max_y - self.min_y) + 1
    }

    pub fn len(&self) -> u64 {
        self.width() * self.height()
    }

    pub fn contains(&self, addr: TileAddress) -> bool {
        addr.z == self.z
            && addr.x >= self.min_x
            && addr.x <= self.max_x
            && addr.y >= self.min_y
            && addr.y <= self.max_y
    }

    /// Row-major iteration, top row first.
    pub fn iter(self) -> impl Iterator<Item = TileAddress> {
        let z = self.z;
        let (min_x, max_x) = (self.min_x, self.max_x);
        (self.min_y..=self.max_y)
            .flat_map(move |y| (min_x..=max_x).map(move |x| TileAddress::new(z, x, y)))
    }
}
