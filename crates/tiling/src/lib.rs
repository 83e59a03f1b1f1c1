//! Tile pyramid addressing: which tile to request, and where it goes.
//!
//! - [`TileGrid`]: origin + tile size + per-level resolutions.
//! - [`TileAddress`] / [`TileRange`]: `{z, x, y}` addresses relative to the grid origin.
//! - [`TileUrlTemplate`] / [`TileSource`]: turning an address into a request URL.

pub mod address;
pub mod grid;
pub mod source;
pub mod template;

pub use address::*;
pub use grid::*;
pub use source::*;
pub use template::*;
