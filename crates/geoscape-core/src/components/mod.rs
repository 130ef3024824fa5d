//! Component definitions for the Geoscape world.
//!
//! Components are plain data attached to hecs entities. Behaviour lives in
//! missions, the Overmind and the Geoscape driver.

mod common;
mod craft;
mod site;

pub use common::*;
pub use craft::*;
pub use site::*;
