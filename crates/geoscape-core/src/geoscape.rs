//! Geoscape - main entry point for running a campaign
//!
//! Owns the clock, the world, the Overmind and everything else a campaign
//! needs. Each simulation step:
//! 1. `GeoTime::add_milliseconds` advances the clock and fires due
//!    appointments and repeating activities
//! 2. the Overmind steps its tasks, which step their UFOs' missions
//! 3. X-Corp craft step their missions
//! 4. radar coverage is refreshed
//!
//! Signals raised for other craft along the way are delivered after each
//! phase.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::time::Duration;

use hecs::{Entity, World};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::components::{
    CombatFate, Craft, CraftStatus, GeoPosition, Radar, Side, Site, Stores, Ufo,
};
use crate::config::{GeoConfig, TIME_RATIO_PRESETS};
use crate::error::{GeoError, GeoResult};
use crate::events::{GeoEvent, GeoEventKind, GeoEventQueue};
use crate::generation::{base_name, interceptor_name, spawn_cities};
use crate::invasion::{InvasionTaskKind, Overmind, TaskId};
use crate::mission::{
    self, deliver_signal, update_craft, DogfightResult, GeoContext, InterceptMission, Mission,
    MissionKind, MissionOutcome, MissionSignal, MissionState, PatrolMission, SignalQueue,
};
use crate::persistence::{self, LoadedGeoscape};
use crate::time::{
    Agenda, AppointmentId, AppointmentKind, ClockListener, FrameReport, FrameStepper,
    GameTime, GeoAppointment, GeoTime, RepeatingActivity, TickReport,
};

/// Goods on their way to a base
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub base: Entity,
    pub item: String,
    pub quantity: u32,
}

pub struct Geoscape {
    time: GeoTime,
    stepper: FrameStepper,
    world: World,
    overmind: Overmind,
    events: GeoEventQueue,
    config: GeoConfig,
    rng: ChaCha8Rng,
    signals: SignalQueue,
    /// Keyed by the `ShipmentArrival` appointment that delivers them
    shipments: BTreeMap<AppointmentId, Shipment>,
}

impl Geoscape {
    /// An empty globe: no cities, no bases, no alien activity
    pub fn new(config: GeoConfig, seed: u64) -> GeoResult<Self> {
        config.validate()?;
        let mut time = GeoTime::new(config.time_ratio);
        time.every(RepeatingActivity::HangarService, config.hangar_service_period_ms);
        time.every(RepeatingActivity::AlienStrategy, config.strategy_period_ms);

        Ok(Self {
            time,
            stepper: FrameStepper::new(config.step_bounds()),
            world: World::new(),
            overmind: Overmind::new(),
            events: GeoEventQueue::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            signals: SignalQueue::default(),
            shipments: BTreeMap::new(),
            config,
        })
    }

    /// Cities, one X-Corp base with its interceptors, and the Overmind's
    /// opening research task
    pub fn new_game(config: GeoConfig, seed: u64) -> GeoResult<Self> {
        let mut geo = Self::new(config, seed)?;

        let cities = spawn_cities(&mut geo.world);
        let home_city = cities[geo.rng.gen_range(0..cities.len())];
        let city_position = geo
            .world
            .get::<&Site>(home_city)
            .map(|s| s.position)
            .map_err(|_| GeoError::NoSuchEntity(home_city))?;
        let base_position = city_position.random_near(&mut geo.rng, 300.0);
        let name = base_name(&mut geo.rng);
        let base = geo.add_xcorp_base(name, base_position);

        for _ in 0..geo.config.starting_interceptors {
            geo.add_interceptor(base)?;
        }

        let (mut ctx, overmind) = geo.split();
        overmind.start_new_game(&mut ctx);

        info!(seed, cities = cities.len(), "new campaign started");
        Ok(geo)
    }

    /// Convert a real frame into game time and step it in bounded chunks
    pub fn update(&mut self, real: Duration) -> FrameReport {
        let game_ms = self.time.real_time_to_game_time(real);
        let total = self.stepper.accumulate(game_ms);
        if total == 0 {
            return FrameReport::default();
        }
        let bounds = self.stepper.bounds;
        bounds.run(total, |ms| {
            self.advance(ms);
        })
    }

    /// One simulation step of exactly `ms` game milliseconds
    pub fn advance(&mut self, ms: u64) -> TickReport {
        let report = {
            let mut dispatcher = Dispatcher {
                world: &mut self.world,
                overmind: &mut self.overmind,
                events: &mut self.events,
                rng: &mut self.rng,
                config: &self.config,
                signals: &mut self.signals,
                shipments: &mut self.shipments,
            };
            self.time.add_milliseconds(ms, &mut dispatcher)
        };
        self.flush_signals();

        {
            let (mut ctx, overmind) = self.split();
            overmind.update(&mut ctx, ms);
        }
        self.flush_signals();

        self.update_xcorp_craft(ms);
        self.flush_signals();

        self.sweep_radar();
        report
    }

    pub fn set_time_ratio(&mut self, ratio: f64) {
        self.time.set_time_ratio(ratio);
        if self.time.is_paused() {
            self.stepper.reset();
        }
    }

    /// Pick one of [`TIME_RATIO_PRESETS`]. Returns false for an unknown index.
    pub fn set_time_preset(&mut self, index: usize) -> bool {
        match TIME_RATIO_PRESETS.get(index) {
            Some(ratio) => {
                self.set_time_ratio(*ratio);
                true
            }
            None => false,
        }
    }

    pub fn add_xcorp_base(&mut self, name: impl Into<String>, position: GeoPosition) -> Entity {
        let name = name.into();
        info!(%name, "X-Corp base established");
        self.world.spawn((
            Site::xcorp_base(name, position),
            Radar {
                range_km: self.config.base_radar_range_km,
            },
            Stores::new(),
        ))
    }

    pub fn add_city(&mut self, name: impl Into<String>, position: GeoPosition) -> Entity {
        self.world.spawn((Site::city(name, position),))
    }

    /// Have the Overmind open a task right away, outside its daily review
    pub fn start_invasion_task(
        &mut self,
        kind: InvasionTaskKind,
        target: Option<Entity>,
    ) -> GeoResult<TaskId> {
        if let Some(site) = target {
            if self.world.get::<&Site>(site).is_err() {
                return Err(GeoError::InvalidTarget {
                    target: site,
                    reason: "not a site",
                });
            }
        }
        let (mut ctx, overmind) = self.split();
        Ok(overmind.start_task(&mut ctx, kind, target))
    }

    /// A new interceptor docked at `base`
    pub fn add_interceptor(&mut self, base: Entity) -> GeoResult<Entity> {
        let position = self.base_position(base)?;
        let index = self
            .world
            .query::<&Craft>()
            .iter()
            .filter(|(_, c)| c.side == Side::XCorp)
            .count();
        let craft = Craft::interceptor(interceptor_name(index), base, position)
            .with_speed(self.config.interceptor_speed_kmh)
            .with_fuel(self.config.interceptor_endurance_ms)
            .with_radar(self.config.craft_radar_range_km);
        Ok(self.world.spawn((craft,)))
    }

    /// Send an interceptor after a UFO, dropping whatever it was doing
    pub fn launch_intercept(&mut self, craft: Entity, target: Entity) -> GeoResult<()> {
        self.check_xcorp_craft(craft)?;
        if self.world.get::<&Ufo>(target).is_err() {
            return Err(GeoError::InvalidTarget {
                target,
                reason: "not a UFO",
            });
        }

        let (mut ctx, _) = self.split();
        mission::assign(&mut ctx, craft, MissionKind::Intercept(InterceptMission::new(target)));
        self.flush_signals();
        Ok(())
    }

    pub fn launch_patrol(
        &mut self,
        craft: Entity,
        centre: GeoPosition,
        duration_ms: u64,
    ) -> GeoResult<()> {
        self.check_xcorp_craft(craft)?;
        let (mut ctx, _) = self.split();
        mission::assign(
            &mut ctx,
            craft,
            MissionKind::Patrol(PatrolMission::new(centre, duration_ms)),
        );
        self.flush_signals();
        Ok(())
    }

    /// Order an airborne craft home. Docked craft are left alone.
    pub fn recall(&mut self, craft: Entity) -> GeoResult<()> {
        self.check_xcorp_craft(craft)?;
        let (mut ctx, _) = self.split();
        if let Ok(mut current) = ctx.world.remove_one::<Mission>(craft) {
            if !current.state().is_return_to_base() {
                current.set_state(&mut ctx, craft, MissionState::return_to_base());
            }
            let _ = ctx.world.insert_one(craft, current);
        }
        self.flush_signals();
        Ok(())
    }

    /// Apply the outcome of a dogfight the host has resolved
    pub fn resolve_dogfight(
        &mut self,
        hunter: Entity,
        prey: Entity,
        hunter_fate: CombatFate,
        prey_fate: CombatFate,
    ) -> GeoResult<()> {
        for entity in [hunter, prey] {
            if self.world.get::<&Craft>(entity).is_err() {
                return Err(GeoError::NoSuchEntity(entity));
            }
        }
        let hunter_base = self
            .world
            .get::<&Craft>(hunter)
            .ok()
            .and_then(|c| c.home_base);

        let (mut ctx, overmind) = self.split();
        info!(?hunter, ?prey, ?hunter_fate, ?prey_fate, "dogfight resolved");
        ctx.emit(GeoEventKind::DogfightResolved {
            hunter,
            prey,
            hunter_fate,
            prey_fate,
        });

        for (craft, own, opponent, opponent_fate) in [
            (hunter, hunter_fate, prey, prey_fate),
            (prey, prey_fate, hunter, hunter_fate),
        ] {
            let result = DogfightResult {
                opponent,
                own,
                opponent_fate,
            };
            let outcome = deliver_signal(&mut ctx, craft, MissionSignal::DogfightFinished(result));

            if own == CombatFate::Destroyed {
                overmind.remove_ufo(craft);
                ctx.emit(GeoEventKind::CraftDestroyed { craft });
                ctx.retire_craft(craft);
            } else if outcome == Some(MissionOutcome::Finished) {
                finish_craft(&mut ctx, overmind, craft);
            }
        }

        if prey_fate != CombatFate::Intact {
            overmind.on_ufo_shot_down(&mut ctx, hunter_base);
        }
        self.flush_signals();
        Ok(())
    }

    /// Schedule a delivery to an X-Corp base
    pub fn order_shipment(
        &mut self,
        base: Entity,
        item: impl Into<String>,
        quantity: u32,
        delay_ms: u64,
    ) -> GeoResult<AppointmentId> {
        self.base_position(base)?;
        let id = self
            .time
            .make_appointment(delay_ms, AppointmentKind::ShipmentArrival);
        self.shipments.insert(
            id,
            Shipment {
                base,
                item: item.into(),
                quantity,
            },
        );
        Ok(id)
    }

    /// Wipe a site off the map. Pending deliveries to it are cancelled,
    /// craft docked there are lost, and every mission is told.
    pub fn destroy_site(&mut self, site: Entity) -> GeoResult<()> {
        let name = self
            .world
            .get::<&Site>(site)
            .map(|s| s.name.clone())
            .map_err(|_| GeoError::NoSuchEntity(site))?;

        let cancelled: Vec<AppointmentId> = self
            .shipments
            .iter()
            .filter(|(_, s)| s.base == site)
            .map(|(id, _)| *id)
            .collect();
        for id in cancelled {
            self.time.cancel(id);
            self.shipments.remove(&id);
        }

        let docked: Vec<Entity> = self
            .world
            .query::<&Craft>()
            .iter()
            .filter(|(_, c)| c.home_base == Some(site) && c.status == CraftStatus::Docked)
            .map(|(e, _)| e)
            .collect();
        let mut with_missions: Vec<Entity> = self
            .world
            .query::<&Mission>()
            .iter()
            .map(|(e, _)| e)
            .collect();
        with_missions.sort_by_key(|e| e.to_bits());

        let _ = self.world.despawn(site);
        info!(site = %name, "site destroyed");

        let (mut ctx, _) = self.split();
        ctx.emit(GeoEventKind::SiteDestroyed { site });
        for craft in docked {
            ctx.emit(GeoEventKind::CraftDestroyed { craft });
            ctx.retire_craft(craft);
        }
        for craft in with_missions {
            ctx.signal(craft, MissionSignal::SiteGone { site });
        }
        self.flush_signals();
        Ok(())
    }

    pub fn drain_events(&mut self) -> Vec<GeoEvent> {
        self.events.drain()
    }

    pub fn now(&self) -> GameTime {
        self.time.now()
    }

    pub fn time(&self) -> &GeoTime {
        &self.time
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn overmind(&self) -> &Overmind {
        &self.overmind
    }

    pub fn config(&self) -> &GeoConfig {
        &self.config
    }

    pub fn shipments(&self) -> &BTreeMap<AppointmentId, Shipment> {
        &self.shipments
    }

    pub fn craft(&self, entity: Entity) -> Option<Craft> {
        self.world.get::<&Craft>(entity).ok().map(|c| (*c).clone())
    }

    pub fn mission(&self, entity: Entity) -> Option<Mission> {
        self.world.get::<&Mission>(entity).ok().map(|m| (*m).clone())
    }

    pub fn site(&self, entity: Entity) -> Option<Site> {
        self.world.get::<&Site>(entity).ok().map(|s| (*s).clone())
    }

    /// X-Corp craft, in a stable order
    pub fn interceptors(&self) -> Vec<Entity> {
        self.craft_of_side(Side::XCorp)
    }

    pub fn ufos(&self) -> Vec<Entity> {
        self.craft_of_side(Side::Alien)
    }

    /// Roster and world agree
    pub fn is_consistent(&self) -> bool {
        self.overmind.is_consistent(&self.world)
            && self
                .world
                .query::<(&Craft, &Ufo)>()
                .iter()
                .all(|(e, _)| self.overmind.ufos().contains(e))
    }

    /// Write the whole campaign to `writer`
    pub fn save<W: Write>(&self, writer: W) -> GeoResult<()> {
        debug_assert!(self.signals.is_empty(), "saving with undelivered signals");
        persistence::save_geoscape(
            writer,
            &self.world,
            &self.time,
            &self.overmind,
            &self.rng,
            &self.config,
            &self.shipments,
        )?;
        Ok(())
    }

    /// Restore a campaign written by [`Geoscape::save`]
    pub fn load<R: Read>(reader: R) -> GeoResult<Self> {
        let LoadedGeoscape {
            world,
            time,
            overmind,
            rng,
            config,
            shipments,
        } = persistence::load_geoscape(reader)?;
        config.validate()?;

        info!(now = %time.now(), entities = world.len(), "campaign loaded");
        Ok(Self {
            time,
            stepper: FrameStepper::new(config.step_bounds()),
            world,
            overmind,
            events: GeoEventQueue::new(),
            rng,
            signals: SignalQueue::default(),
            shipments,
            config,
        })
    }

    fn split(&mut self) -> (GeoContext<'_>, &mut Overmind) {
        (
            GeoContext {
                world: &mut self.world,
                agenda: self.time.agenda_mut(),
                events: &mut self.events,
                rng: &mut self.rng,
                config: &self.config,
                signals: &mut self.signals,
            },
            &mut self.overmind,
        )
    }

    fn craft_of_side(&self, side: Side) -> Vec<Entity> {
        let mut craft: Vec<Entity> = self
            .world
            .query::<&Craft>()
            .iter()
            .filter(|(_, c)| c.side == side)
            .map(|(e, _)| e)
            .collect();
        craft.sort_by_key(|e| e.to_bits());
        craft
    }

    fn check_xcorp_craft(&self, craft: Entity) -> GeoResult<()> {
        match self.world.get::<&Craft>(craft) {
            Ok(c) if c.side == Side::XCorp => Ok(()),
            Ok(_) => Err(GeoError::NotXCorpCraft(craft)),
            Err(_) => Err(GeoError::NoSuchEntity(craft)),
        }
    }

    fn base_position(&self, base: Entity) -> GeoResult<GeoPosition> {
        match self.world.get::<&Site>(base) {
            Ok(site) if site.is_base() => Ok(site.position),
            Ok(_) => Err(GeoError::NotABase(base)),
            Err(_) => Err(GeoError::NoSuchEntity(base)),
        }
    }

    fn update_xcorp_craft(&mut self, ms: u64) {
        let mut active: Vec<Entity> = self
            .world
            .query::<(&Craft, &Mission)>()
            .iter()
            .filter(|(_, (c, _))| c.side == Side::XCorp)
            .map(|(e, _)| e)
            .collect();
        active.sort_by_key(|e| e.to_bits());

        let (mut ctx, overmind) = self.split();
        for craft in active {
            if update_craft(&mut ctx, craft, ms) == MissionOutcome::Finished {
                finish_craft(&mut ctx, overmind, craft);
            }
        }
    }

    /// Deliver queued signals until none are left
    fn flush_signals(&mut self) {
        let (mut ctx, overmind) = self.split();
        while let Some((craft, signal)) = ctx.signals.pop() {
            if deliver_signal(&mut ctx, craft, signal) == Some(MissionOutcome::Finished) {
                finish_craft(&mut ctx, overmind, craft);
            }
        }
    }

    fn sweep_radar(&mut self) {
        let ufos: Vec<(Entity, bool)> = self
            .world
            .query::<&Ufo>()
            .iter()
            .map(|(e, u)| (e, u.detected))
            .collect();

        let (mut ctx, _) = self.split();
        for (ufo, was_detected) in ufos {
            let visible = ctx.is_visible(ufo);
            if visible == was_detected {
                continue;
            }
            if let Ok(mut state) = ctx.world.get::<&mut Ufo>(ufo) {
                state.detected = visible;
            }
            if visible {
                info!(?ufo, "UFO detected");
                ctx.emit(GeoEventKind::UfoDetected { ufo });
            }
        }
    }
}

/// A mission ended outside the Overmind's own walk
fn finish_craft(ctx: &mut GeoContext<'_>, overmind: &mut Overmind, craft: Entity) {
    if ctx.world.get::<&Ufo>(craft).is_ok() {
        overmind.remove_ufo(craft);
        if ctx.world.contains(craft) {
            ctx.emit(GeoEventKind::UfoDeparted { ufo: craft });
            ctx.retire_craft(craft);
        }
        return;
    }

    let base = ctx.world.get::<&Craft>(craft).ok().and_then(|c| c.home_base);
    match base.and_then(|b| ctx.site_position(b)) {
        Some(position) => {
            if let Ok(mut body) = ctx.world.get::<&mut Craft>(craft) {
                body.status = CraftStatus::Docked;
                body.position = position;
                body.prey = None;
            }
            debug!(?craft, "craft docked");
        }
        None => {
            // Nowhere left to land
            ctx.emit(GeoEventKind::CraftDestroyed { craft });
            ctx.retire_craft(craft);
        }
    }
}

/// Routes fired appointments and repeating activities into the campaign
struct Dispatcher<'a> {
    world: &'a mut World,
    overmind: &'a mut Overmind,
    events: &'a mut GeoEventQueue,
    rng: &'a mut ChaCha8Rng,
    config: &'a GeoConfig,
    signals: &'a mut SignalQueue,
    shipments: &'a mut BTreeMap<AppointmentId, Shipment>,
}

impl<'a> Dispatcher<'a> {
    fn split<'b>(
        &'b mut self,
        agenda: &'b mut Agenda,
    ) -> (
        GeoContext<'b>,
        &'b mut Overmind,
        &'b mut BTreeMap<AppointmentId, Shipment>,
    ) {
        (
            GeoContext {
                world: &mut *self.world,
                agenda,
                events: &mut *self.events,
                rng: &mut *self.rng,
                config: self.config,
                signals: &mut *self.signals,
            },
            &mut *self.overmind,
            &mut *self.shipments,
        )
    }
}

impl ClockListener for Dispatcher<'_> {
    fn on_appointment(&mut self, agenda: &mut Agenda, appointment: GeoAppointment) {
        let id = appointment.id();
        let (mut ctx, overmind, shipments) = self.split(agenda);

        match appointment.into_kind() {
            AppointmentKind::LaunchUfo { task } => {
                overmind.launch_ufo(&mut ctx, task);
            }
            AppointmentKind::TerrorStrike { ufo, city } => {
                if !ctx.world.contains(ufo) {
                    warn!(?ufo, "terror strike for a UFO that is gone");
                    return;
                }
                let Ok(mut site) = ctx.world.get::<&mut Site>(city) else {
                    warn!(?city, "terror strike on a city that is gone");
                    return;
                };
                site.terror_attacks += 1;
                info!(city = %site.name, at = %ctx.now(), "terror attack");
                drop(site);
                ctx.emit(GeoEventKind::TerrorAttack { ufo, city });
            }
            AppointmentKind::ShipmentArrival => {
                let Some(shipment) = shipments.remove(&id) else {
                    warn!(?id, "arrival for an unknown shipment");
                    return;
                };
                let Ok(mut stores) = ctx.world.get::<&mut Stores>(shipment.base) else {
                    warn!(base = ?shipment.base, "shipment for a base that is gone");
                    return;
                };
                stores.add(shipment.item.clone(), shipment.quantity);
                drop(stores);
                ctx.emit(GeoEventKind::ShipmentArrived {
                    base: shipment.base,
                    item: shipment.item,
                    quantity: shipment.quantity,
                });
            }
        }
    }

    fn on_repeating(&mut self, agenda: &mut Agenda, activity: RepeatingActivity, due: GameTime) {
        let (mut ctx, overmind, _) = self.split(agenda);
        match activity {
            RepeatingActivity::HangarService => {
                let refuel = ctx.config.refuel_per_service;
                for (_, craft) in ctx.world.query_mut::<&mut Craft>() {
                    if craft.status != CraftStatus::Docked {
                        continue;
                    }
                    if let Some(tank) = craft.fuel.as_mut() {
                        tank.refuel(refuel);
                    }
                }
            }
            RepeatingActivity::AlienStrategy => {
                debug!(at = %due, "alien strategy review");
                overmind.daily_review(&mut ctx);
            }
        }
    }
}
