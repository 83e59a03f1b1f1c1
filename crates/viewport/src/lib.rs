pub mod animation;
pub mod controller;
pub mod view;

pub use animation::*;
pub use controller::*;
pub use view::*;
