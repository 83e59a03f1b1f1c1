//! The remote map service as seen from the client: its published metadata,
//! the HTTP seam used to reach it, reachability probing, and the basemap
//! presets shown underneath it.
//!
//! Everything network-facing goes through [`HttpClient`] so the probe and tile
//! flows run unchanged against [`ReqwestClient`] or an in-memory
//! [`ScriptedClient`].

pub mod catalog;
pub mod http;
pub mod metadata;
pub mod notify;
pub mod probe;

pub use catalog::*;
pub use http::*;
pub use metadata::*;
pub use notify::*;
pub use probe::*;
