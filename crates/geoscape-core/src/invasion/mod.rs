//! Invasion - the alien side of the campaign
//!
//! The [`Overmind`] decides what the aliens want (research, terror,
//! retaliation, supply, infiltration) and opens an [`InvasionTask`] for each
//! goal. Tasks launch UFOs through scheduled appointments and step their
//! missions every tick.

mod overmind;
mod task;

pub use overmind::{Overmind, UfoRoster};
pub use task::{InvasionTask, InvasionTaskKind, TaskId};
