//! Geoscape Core - Strategic Layer Simulation Engine
//!
//! A deterministic, discrete-time simulation of the world map of an alien
//! invasion campaign: X-Corp interceptors, alien UFOs flying multi-leg
//! missions, and the alien Overmind deciding what to do next.
//!
//! # Architecture
//!
//! Craft and sites are entities in a `hecs` world:
//! - **Time**: a millisecond game clock with a sorted appointment agenda and
//!   fixed-cadence repeating activities
//! - **Missions**: a per-craft state machine (wait, move, intercept, patrol,
//!   return to base) driven by signals
//! - **Invasion**: the Overmind owns invasion tasks, and each task owns the
//!   UFOs it launched
//!
//! # Example
//!
//! ```rust,no_run
//! use geoscape_core::prelude::*;
//! use std::time::Duration;
//!
//! let mut geo = Geoscape::new_game(GeoConfig::default(), 42).unwrap();
//!
//! loop {
//!     geo.update(Duration::from_millis(16)); // 60 FPS
//!     for event in geo.drain_events() {
//!         println!("{}: {:?}", event.at, event.kind);
//!     }
//! }
//! ```

pub mod components;
pub mod config;
pub mod error;
pub mod events;
pub mod generation;
pub mod geoscape;
pub mod invasion;
pub mod mission;
pub mod persistence;
pub mod time;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::config::GeoConfig;
    pub use crate::error::{GeoError, GeoResult};
    pub use crate::events::{GeoEvent, GeoEventKind};
    pub use crate::geoscape::Geoscape;
    pub use crate::invasion::{InvasionTaskKind, TaskId};
    pub use crate::mission::{Mission, MissionKind};
    pub use crate::time::{GameTime, MS_PER_DAY, MS_PER_HOUR, MS_PER_MINUTE};
}
