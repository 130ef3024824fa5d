//! Generation - the starting world: cities, names

mod names;
mod world;

pub use names::*;
pub use world::*;
