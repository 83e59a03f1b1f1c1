pub mod layer;
pub mod stack;
pub mod symbology;

pub use layer::*;
pub use stack::*;
pub use symbology::*;
