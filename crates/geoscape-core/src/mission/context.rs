//! Explicit context handed to missions, tasks and the Overmind.
//!
//! There is no global "current game". Whatever a mission may touch during a
//! step is borrowed into a [`GeoContext`] by the driver.

use std::collections::VecDeque;

use hecs::{Entity, World};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use super::{Mission, MissionSignal};
use crate::components::{Craft, GeoPosition, Radar, Side, Site, SiteKind};
use crate::config::GeoConfig;
use crate::events::{GeoEventKind, GeoEventQueue};
use crate::time::{Agenda, GameTime};

/// Signals raised for other craft during a step, delivered after it
#[derive(Debug, Default)]
pub struct SignalQueue {
    queue: VecDeque<(Entity, MissionSignal)>,
}

impl SignalQueue {
    pub fn push(&mut self, target: Entity, signal: MissionSignal) {
        self.queue.push_back((target, signal));
    }

    pub fn pop(&mut self) -> Option<(Entity, MissionSignal)> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

pub struct GeoContext<'a> {
    pub world: &'a mut World,
    pub agenda: &'a mut Agenda,
    pub events: &'a mut GeoEventQueue,
    pub rng: &'a mut ChaCha8Rng,
    pub config: &'a GeoConfig,
    pub signals: &'a mut SignalQueue,
}

impl GeoContext<'_> {
    pub fn now(&self) -> GameTime {
        self.agenda.now()
    }

    pub fn emit(&mut self, kind: GeoEventKind) {
        self.events.push(self.agenda.now(), kind);
    }

    /// Queue a signal for another craft's mission
    pub fn signal(&mut self, target: Entity, signal: MissionSignal) {
        self.signals.push(target, signal);
    }

    pub fn craft_position(&self, craft: Entity) -> Option<GeoPosition> {
        self.world.get::<&Craft>(craft).ok().map(|c| c.position)
    }

    pub fn site_position(&self, site: Entity) -> Option<GeoPosition> {
        self.world.get::<&Site>(site).ok().map(|s| s.position)
    }

    pub fn site_kind(&self, site: Entity) -> Option<SiteKind> {
        self.world.get::<&Site>(site).ok().map(|s| s.kind)
    }

    /// Inside a base radar or the radar of an airborne X-Corp craft
    pub fn is_visible(&self, target: Entity) -> bool {
        let Some(position) = self.craft_position(target) else {
            return false;
        };

        let by_base = self
            .world
            .query::<(&Site, &Radar)>()
            .iter()
            .any(|(_, (site, radar))| {
                site.is_base() && site.position.distance_km(&position) <= radar.range_km
            });
        if by_base {
            return true;
        }

        self.world
            .query::<&Craft>()
            .iter()
            .any(|(entity, craft)| {
                entity != target
                    && craft.side == Side::XCorp
                    && craft.is_airborne()
                    && craft.radar_range_km > 0.0
                    && craft.position.distance_km(&position) <= craft.radar_range_km
            })
    }

    /// Sites of `kind`, in a stable order
    pub fn sites_of_kind(&self, kind: SiteKind) -> Vec<Entity> {
        let mut sites: Vec<Entity> = self
            .world
            .query::<&Site>()
            .iter()
            .filter(|(_, site)| site.kind == kind)
            .map(|(entity, _)| entity)
            .collect();
        sites.sort_by_key(|e| e.to_bits());
        sites
    }

    pub fn random_site(&mut self, kind: SiteKind) -> Option<Entity> {
        let sites = self.sites_of_kind(kind);
        if sites.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..sites.len());
        Some(sites[index])
    }

    pub fn nearest_site(
        &self,
        position: &GeoPosition,
        kind: SiteKind,
        exclude: Option<Entity>,
    ) -> Option<Entity> {
        self.sites_of_kind(kind)
            .into_iter()
            .filter(|site| Some(*site) != exclude)
            .filter_map(|site| Some((site, self.site_position(site)?.distance_km(position))))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(site, _)| site)
    }

    /// Remove a craft from the map: its mission concludes, its hunters are
    /// told the prey is gone, then the entity is despawned.
    pub fn retire_craft(&mut self, craft: Entity) {
        if let Ok(mut mission) = self.world.remove_one::<Mission>(craft) {
            mission.handle(self, craft, MissionSignal::CraftDestroyed);
        }

        let hunters = self
            .world
            .get::<&Craft>(craft)
            .map(|c| c.hunters.clone())
            .unwrap_or_default();
        for hunter in hunters {
            self.signal(hunter, MissionSignal::PreyGone);
        }

        if self.world.despawn(craft).is_ok() {
            debug!(?craft, "craft retired");
        }
    }
}
