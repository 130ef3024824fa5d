//! Time - the game clock, discrete-event scheduling and frame stepping
//!
//! Everything that happens "later" on the Geoscape goes through here:
//! - [`Scheduler`] keeps pending [`Appointment`]s ordered by time
//! - [`GeoTime`] owns the authoritative clock, the scheduler and the
//!   repeating-activity ticker
//! - [`FrameStepper`] turns real frame time into bounded simulation steps

mod appointment;
mod geotime;
mod scheduler;
mod stepper;

pub use appointment::*;
pub use geotime::*;
pub use scheduler::*;
pub use stepper::*;
