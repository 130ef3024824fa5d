//! Craft components - anything that flies: interceptors and UFOs.

use hecs::Entity;
use serde::{Deserialize, Serialize};

use super::GeoPosition;
use crate::invasion::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    XCorp,
    Alien,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CraftStatus {
    /// In the hangar; refuelled by hangar service
    Docked,
    Airborne,
}

/// What a fight did to one participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatFate {
    Intact,
    /// Forced down but still on the map (UFOs only)
    Crashed,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuelTank {
    /// 0.0 = empty, 1.0 = full
    pub level: f64,
    /// Flight time on a full tank
    pub endurance_ms: u64,
}

impl FuelTank {
    pub fn full(endurance_ms: u64) -> Self {
        Self {
            level: 1.0,
            endurance_ms,
        }
    }

    pub fn remaining_ms(&self) -> u64 {
        (self.level * self.endurance_ms as f64) as u64
    }

    pub fn is_full(&self) -> bool {
        self.level >= 1.0
    }

    pub fn refuel(&mut self, fraction: f64) {
        self.level = (self.level + fraction).min(1.0);
    }
}

/// Any flying craft
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Craft {
    pub name: String,
    pub side: Side,
    pub position: GeoPosition,
    pub max_speed_kmh: f64,
    /// `None` for craft that never run dry (UFOs)
    pub fuel: Option<FuelTank>,
    pub radar_range_km: f64,
    pub home_base: Option<Entity>,
    /// Craft this one is currently hunting
    pub prey: Option<Entity>,
    /// Craft currently hunting this one
    pub hunters: Vec<Entity>,
    pub status: CraftStatus,
}

impl Craft {
    pub fn interceptor(name: impl Into<String>, base: Entity, position: GeoPosition) -> Self {
        Self {
            name: name.into(),
            side: Side::XCorp,
            position,
            max_speed_kmh: 2_200.0,
            fuel: Some(FuelTank::full(6 * 3_600_000)),
            radar_range_km: 400.0,
            home_base: Some(base),
            prey: None,
            hunters: Vec::new(),
            status: CraftStatus::Docked,
        }
    }

    pub fn ufo(name: impl Into<String>, class: UfoClass, position: GeoPosition) -> Self {
        Self {
            name: name.into(),
            side: Side::Alien,
            position,
            max_speed_kmh: class.max_speed_kmh(),
            fuel: None,
            radar_range_km: 0.0,
            home_base: None,
            prey: None,
            hunters: Vec::new(),
            status: CraftStatus::Airborne,
        }
    }

    pub fn with_speed(mut self, max_speed_kmh: f64) -> Self {
        self.max_speed_kmh = max_speed_kmh;
        self
    }

    pub fn with_fuel(mut self, endurance_ms: u64) -> Self {
        self.fuel = Some(FuelTank::full(endurance_ms));
        self
    }

    pub fn with_radar(mut self, range_km: f64) -> Self {
        self.radar_range_km = range_km;
        self
    }

    pub fn is_airborne(&self) -> bool {
        self.status == CraftStatus::Airborne
    }

    /// Burn `ms` worth of fuel. Returns false once the tank is dry.
    pub fn consume_fuel(&mut self, ms: u64) -> bool {
        match &mut self.fuel {
            None => true,
            Some(tank) => {
                if tank.endurance_ms == 0 {
                    return false;
                }
                tank.level = (tank.level - ms as f64 / tank.endurance_ms as f64).max(0.0);
                tank.level > 0.0
            }
        }
    }

    pub fn remaining_endurance_ms(&self) -> Option<u64> {
        self.fuel.map(|tank| tank.remaining_ms())
    }

    /// Flight time at full speed to cover `km`
    pub fn flight_time_ms(&self, km: f64) -> u64 {
        if self.max_speed_kmh <= 0.0 {
            return u64::MAX;
        }
        (km / self.max_speed_kmh * 3_600_000.0) as u64
    }

    pub fn add_hunter(&mut self, hunter: Entity) {
        if !self.hunters.contains(&hunter) {
            self.hunters.push(hunter);
        }
    }

    pub fn remove_hunter(&mut self, hunter: Entity) {
        self.hunters.retain(|h| *h != hunter);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UfoClass {
    Probe,
    Scout,
    Harvester,
    Transport,
    Battleship,
}

impl UfoClass {
    pub fn max_speed_kmh(&self) -> f64 {
        match self {
            UfoClass::Probe => 2_600.0,
            UfoClass::Scout => 1_800.0,
            UfoClass::Harvester => 1_200.0,
            UfoClass::Transport => 1_000.0,
            UfoClass::Battleship => 1_600.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            UfoClass::Probe => "Probe",
            UfoClass::Scout => "Scout",
            UfoClass::Harvester => "Harvester",
            UfoClass::Transport => "Transport",
            UfoClass::Battleship => "Battleship",
        }
    }
}

/// Alien-only data, next to the `Craft`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Ufo {
    pub class: UfoClass,
    /// Invasion task that launched this UFO
    pub task: TaskId,
    /// On the ground (landed or crashed)
    pub grounded: bool,
    /// Currently seen by X-Corp radar
    pub detected: bool,
    /// Interceptor holding the UFO's one dogfight slot
    pub engaged_by: Option<Entity>,
}

impl Ufo {
    pub fn new(class: UfoClass, task: TaskId) -> Self {
        Self {
            class,
            task,
            grounded: false,
            detected: false,
            engaged_by: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consume_fuel_runs_dry() {
        let mut world = hecs::World::new();
        let base = world.spawn(());
        let mut craft = Craft::interceptor("Eagle-1", base, GeoPosition::default()).with_fuel(1_000);

        assert!(craft.consume_fuel(400));
        assert_eq!(craft.remaining_endurance_ms(), Some(600));
        assert!(craft.consume_fuel(500));
        assert!(!craft.consume_fuel(500));
        assert_eq!(craft.remaining_endurance_ms(), Some(0));
    }

    #[test]
    fn test_ufo_never_runs_dry() {
        let mut craft = Craft::ufo("UFO-1", UfoClass::Scout, GeoPosition::default());
        assert!(craft.consume_fuel(u64::MAX));
        assert_eq!(craft.remaining_endurance_ms(), None);
    }

    #[test]
    fn test_hunters_are_unique() {
        let mut world = hecs::World::new();
        let hunter = world.spawn(());
        let mut prey = Craft::ufo("UFO-2", UfoClass::Probe, GeoPosition::default());

        prey.add_hunter(hunter);
        prey.add_hunter(hunter);
        assert_eq!(prey.hunters, vec![hunter]);

        prey.remove_hunter(hunter);
        prey.remove_hunter(hunter);
        assert!(prey.hunters.is_empty());
    }

    #[test]
    fn test_flight_time() {
        let craft = Craft::ufo("UFO-3", UfoClass::Transport, GeoPosition::default());
        assert_eq!(craft.flight_time_ms(500.0), 1_800_000);
    }

    #[test]
    fn test_refuel_caps_at_full() {
        let mut tank = FuelTank {
            level: 0.9,
            endurance_ms: 100,
        };
        tank.refuel(0.25);
        assert!(tank.is_full());
        assert_eq!(tank.remaining_ms(), 100);
    }
}
