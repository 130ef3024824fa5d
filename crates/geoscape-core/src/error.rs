//! Errors returned to the host.
//!
//! Ordinary game outcomes (fuel low, prey lost, craft destroyed) are not
//! errors; they travel as mission signals and events.

use hecs::Entity;
use thiserror::Error;

use crate::persistence::SaveError;
use crate::time::AppointmentId;

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("appointment {0:?} is already scheduled")]
    AlreadyScheduled(AppointmentId),

    #[error("no such entity: {0:?}")]
    NoSuchEntity(Entity),

    #[error("{0:?} is not an X-Corp craft")]
    NotXCorpCraft(Entity),

    #[error("{0:?} is not an X-Corp base")]
    NotABase(Entity),

    #[error("invalid target {target:?}: {reason}")]
    InvalidTarget { target: Entity, reason: &'static str },

    #[error(transparent)]
    Save(#[from] SaveError),
}

pub type GeoResult<T> = Result<T, GeoError>;
