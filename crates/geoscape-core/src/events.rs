//! Geoscape events - what the host needs to hear about
//!
//! The core never builds battles or opens screens. It pushes a [`GeoEvent`]
//! and the host drains the queue once per frame.

use std::collections::VecDeque;

use hecs::Entity;
use serde::{Deserialize, Serialize};

use crate::components::CombatFate;
use crate::time::GameTime;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GeoEventKind {
    /// A UFO entered radar coverage
    UfoDetected { ufo: Entity },
    /// An interceptor lost its prey from radar
    TrackingLost { craft: Entity, prey: Entity },
    /// Craft turned home because its tank is low
    FuelLow { craft: Entity },
    /// Host must resolve the fight and call `Geoscape::resolve_dogfight`
    DogfightStarted { hunter: Entity, prey: Entity },
    DogfightResolved { hunter: Entity, prey: Entity, hunter_fate: CombatFate, prey_fate: CombatFate },
    UfoCrashed { ufo: Entity },
    /// Start a tactical terror mission at the city
    TerrorAttack { ufo: Entity, city: Entity },
    /// Aliens assault an X-Corp base
    BaseAssault { ufo: Entity, base: Entity },
    OutpostSupplied { outpost: Entity },
    CityInfiltrated { city: Entity },
    OutpostEstablished { outpost: Entity, city: Entity },
    /// An interceptor reached a landed UFO; host may start a ground assault
    LandedUfoReached { craft: Entity, ufo: Entity },
    CraftReturned { craft: Entity, base: Entity },
    CraftDestroyed { craft: Entity },
    UfoDeparted { ufo: Entity },
    ShipmentArrived { base: Entity, item: String, quantity: u32 },
    InvasionTaskStarted { task: u32, description: String },
    SiteDestroyed { site: Entity },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoEvent {
    pub at: GameTime,
    pub kind: GeoEventKind,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeoEventQueue {
    events: VecDeque<GeoEvent>,
}

impl GeoEventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, at: GameTime, kind: GeoEventKind) {
        self.events.push_back(GeoEvent { at, kind });
    }

    /// Remove and return everything queued so far, oldest first
    pub fn drain(&mut self) -> Vec<GeoEvent> {
        self.events.drain(..).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeoEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
