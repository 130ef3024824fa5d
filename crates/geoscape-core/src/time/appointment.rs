//! Appointments - "do X at time T"

use std::fmt;

use hecs::Entity;
use serde::{Deserialize, Serialize};

use crate::invasion::TaskId;

pub const MS_PER_SECOND: u64 = 1_000;
pub const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;
pub const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;
pub const MS_PER_DAY: u64 = 24 * MS_PER_HOUR;

/// Game time in milliseconds since the campaign started
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GameTime(u64);

impl GameTime {
    pub const ZERO: Self = Self(0);

    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    pub fn as_millis(self) -> u64 {
        self.0
    }

    /// The time `ms` milliseconds after this one
    pub fn plus(self, ms: u64) -> Self {
        Self(self.0.saturating_add(ms))
    }

    /// Milliseconds elapsed since `earlier` (zero if `earlier` is later)
    pub fn millis_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Whole days since the campaign started
    pub fn day(self) -> u64 {
        self.0 / MS_PER_DAY
    }

    /// Hour of day (0-23)
    pub fn hour_of_day(self) -> u32 {
        ((self.0 % MS_PER_DAY) / MS_PER_HOUR) as u32
    }

    pub fn minute_of_hour(self) -> u32 {
        ((self.0 % MS_PER_HOUR) / MS_PER_MINUTE) as u32
    }
}

impl fmt::Display for GameTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "day {} {:02}:{:02}",
            self.day(),
            self.hour_of_day(),
            self.minute_of_hour()
        )
    }
}

/// Handle to a scheduled appointment, kept by whoever may need to cancel it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AppointmentId(u64);

impl AppointmentId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// What the Geoscape should do when an appointment comes due.
///
/// The scheduler never runs code itself; its owner matches on these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppointmentKind {
    /// An invasion task launches its next UFO
    LaunchUfo { task: TaskId },
    /// A terror ship that landed at a city starts its attack
    TerrorStrike { ufo: Entity, city: Entity },
    /// A shipment reaches an X-Corp base (looked up by appointment id)
    ShipmentArrival,
}

/// A one-shot event bound to a future game time.
///
/// Not `Clone`: once added, the scheduler is the only owner, so the same
/// appointment cannot be queued twice.
#[derive(Debug, Serialize, Deserialize)]
pub struct Appointment<K> {
    id: AppointmentId,
    occurs_at: GameTime,
    /// Insertion order, breaks ties between equal times
    seq: u64,
    kind: K,
}

impl<K> Appointment<K> {
    pub(crate) fn new(id: AppointmentId, occurs_at: GameTime, kind: K) -> Self {
        Self {
            id,
            occurs_at,
            seq: 0,
            kind,
        }
    }

    pub fn id(&self) -> AppointmentId {
        self.id
    }

    pub fn occurs_at(&self) -> GameTime {
        self.occurs_at
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }

    pub fn into_kind(self) -> K {
        self.kind
    }

    pub(super) fn seq(&self) -> u64 {
        self.seq
    }

    pub(super) fn set_seq(&mut self, seq: u64) {
        self.seq = seq;
    }
}

/// Appointment carrying a Geoscape payload
pub type GeoAppointment = Appointment<AppointmentKind>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_time_calendar() {
        let t = GameTime::from_millis(2 * MS_PER_DAY + 13 * MS_PER_HOUR + 7 * MS_PER_MINUTE);
        assert_eq!(t.day(), 2);
        assert_eq!(t.hour_of_day(), 13);
        assert_eq!(t.minute_of_hour(), 7);
        assert_eq!(t.to_string(), "day 2 13:07");
    }

    #[test]
    fn test_game_time_arithmetic_saturates() {
        let t = GameTime::from_millis(u64::MAX - 1);
        assert_eq!(t.plus(10).as_millis(), u64::MAX);
        assert_eq!(GameTime::ZERO.millis_since(t), 0);
        assert_eq!(GameTime::from_millis(500).millis_since(GameTime::from_millis(200)), 300);
    }
}
