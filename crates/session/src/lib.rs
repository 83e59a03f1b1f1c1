//! An explicitly owned map session: open it, drive it from one event loop,
//! close it.
//!
//! [`MapSession`] owns the only view state and the only layer stack. Every
//! operator action is a method on it, so no state is shared ambiently.

pub mod config;
pub mod session;
pub mod tiles;

pub use config::*;
pub use session::*;
pub use tiles::*;
