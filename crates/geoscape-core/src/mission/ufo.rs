//! UFO missions
//!
//! A UFO flies a fixed number of legs. Every leg but the last goes to a
//! random point near where it is, lands and waits. The last leg goes to the
//! objective's final site and runs the objective's arrival effect. With no
//! landings left the UFO leaves the map.
//!
//! A crash ends the sequence early: the UFO stays grounded for the crash
//! grounding time and then leaves, whatever leg it was on.

use hecs::Entity;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::context::GeoContext;
use super::{Directive, MissionSignal, MissionState, StateKind};
use crate::components::{CombatFate, GeoPosition, Site, SiteKind};
use crate::events::GeoEventKind;
use crate::time::{AppointmentId, AppointmentKind};

/// Infiltration gained per infiltration landing
pub const INFILTRATION_PER_LANDING: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum UfoObjective {
    /// Wander and land at random places
    Research,
    Terror { attack_city: bool, city: Option<Entity> },
    Retaliation { base: Option<Entity> },
    Supply { outpost: Option<Entity> },
    Infiltration { city: Option<Entity> },
}

impl UfoObjective {
    pub fn name(&self) -> &'static str {
        match self {
            UfoObjective::Research => "Research",
            UfoObjective::Terror { .. } => "Terror",
            UfoObjective::Retaliation { .. } => "Retaliation",
            UfoObjective::Supply { .. } => "Supply",
            UfoObjective::Infiltration { .. } => "Infiltration",
        }
    }

    fn target(&self) -> Option<Entity> {
        match *self {
            UfoObjective::Research => None,
            UfoObjective::Terror { city, .. } => city,
            UfoObjective::Retaliation { base } => base,
            UfoObjective::Supply { outpost } => outpost,
            UfoObjective::Infiltration { city } => city,
        }
    }

    fn set_target(&mut self, site: Option<Entity>) {
        match self {
            UfoObjective::Research => {}
            UfoObjective::Terror { city, .. } => *city = site,
            UfoObjective::Retaliation { base } => *base = site,
            UfoObjective::Supply { outpost } => *outpost = site,
            UfoObjective::Infiltration { city } => *city = site,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UfoMission {
    pub objective: UfoObjective,
    /// Landings still to make, the final one included
    pub landings: u32,
    heading_to_final: bool,
    final_site: Option<Entity>,
    /// Pending terror strike, cancelled if the mission ends first
    strike: Option<AppointmentId>,
    pub shot_down: bool,
}

impl UfoMission {
    pub fn new(objective: UfoObjective, landings: u32) -> Self {
        debug_assert!(landings > 0, "a UFO mission needs at least one landing");
        Self {
            objective,
            landings,
            heading_to_final: false,
            final_site: None,
            strike: None,
            shot_down: false,
        }
    }

    pub fn research(landings: u32) -> Self {
        Self::new(UfoObjective::Research, landings)
    }

    pub fn terror(landings: u32, attack_city: bool, city: Option<Entity>) -> Self {
        Self::new(UfoObjective::Terror { attack_city, city }, landings)
    }

    pub fn retaliation(landings: u32, base: Option<Entity>) -> Self {
        Self::new(UfoObjective::Retaliation { base }, landings)
    }

    pub fn supply(landings: u32, outpost: Option<Entity>) -> Self {
        Self::new(UfoObjective::Supply { outpost }, landings)
    }

    pub fn infiltration(landings: u32, city: Option<Entity>) -> Self {
        Self::new(UfoObjective::Infiltration { city }, landings)
    }

    pub fn is_heading_to_final(&self) -> bool {
        self.heading_to_final
    }

    pub fn final_site(&self) -> Option<Entity> {
        self.final_site
    }

    pub fn pending_strike(&self) -> Option<AppointmentId> {
        self.strike
    }

    pub(super) fn first_state(&mut self, ctx: &mut GeoContext<'_>, craft: Entity) -> MissionState {
        match self.next_leg(ctx, craft) {
            Directive::SetState(state) => state,
            // Nothing to do: an expired wait makes the mission end on its first step
            _ => MissionState::wait(0),
        }
    }

    pub(super) fn handle(
        &mut self,
        ctx: &mut GeoContext<'_>,
        craft: Entity,
        state: &MissionState,
        signal: MissionSignal,
    ) -> Directive {
        match signal {
            MissionSignal::DestinationReached => {
                if self.heading_to_final {
                    self.arrive_at_final_site(ctx, craft)
                } else {
                    Directive::SetState(MissionState::wait(ctx.config.landing_wait_ms))
                }
            }
            MissionSignal::TimerFinished => {
                self.landings = self.landings.saturating_sub(1);
                self.next_leg(ctx, craft)
            }
            MissionSignal::DogfightFinished(result) if result.own == CombatFate::Crashed => {
                self.crash(ctx, craft)
            }
            MissionSignal::SiteGone { site } if self.final_site == Some(site) => {
                self.final_site_lost(ctx, craft, state)
            }
            _ => Directive::Stay,
        }
    }

    pub(super) fn on_conclude(&mut self, ctx: &mut GeoContext<'_>) {
        if let Some(strike) = self.strike.take() {
            ctx.agenda.cancel(strike);
        }
    }

    fn next_leg(&mut self, ctx: &mut GeoContext<'_>, craft: Entity) -> Directive {
        match self.landings {
            0 => Directive::Finish,
            1 => match self.final_landing_site(ctx, craft) {
                Some((position, site)) => {
                    self.heading_to_final = true;
                    self.final_site = site;
                    Directive::SetState(MissionState::move_to(position))
                }
                None => {
                    debug!(?craft, objective = self.objective.name(), "no final site, leaving");
                    Directive::Finish
                }
            },
            _ => {
                let Some(here) = ctx.craft_position(craft) else {
                    return Directive::Finish;
                };
                let radius = ctx.config.nearby_site_radius_km;
                self.heading_to_final = false;
                Directive::SetState(MissionState::move_to(here.random_near(ctx.rng, radius)))
            }
        }
    }

    /// Where the last landing happens, and the site there if there is one
    fn final_landing_site(
        &mut self,
        ctx: &mut GeoContext<'_>,
        craft: Entity,
    ) -> Option<(GeoPosition, Option<Entity>)> {
        let here = ctx.craft_position(craft)?;

        let kind = match self.objective {
            UfoObjective::Research => {
                let radius = ctx.config.nearby_site_radius_km;
                return Some((here.random_near(ctx.rng, radius), None));
            }
            UfoObjective::Terror { .. } | UfoObjective::Infiltration { .. } => SiteKind::City,
            UfoObjective::Retaliation { .. } => SiteKind::XCorpBase,
            UfoObjective::Supply { .. } => SiteKind::AlienOutpost,
        };

        let chosen = self.objective.target().filter(|site| ctx.site_kind(*site) == Some(kind));
        let site = match chosen {
            Some(site) => site,
            None if kind == SiteKind::XCorpBase => ctx.nearest_site(&here, kind, None)?,
            None => ctx.random_site(kind)?,
        };
        self.objective.set_target(Some(site));
        Some((ctx.site_position(site)?, Some(site)))
    }

    fn arrive_at_final_site(&mut self, ctx: &mut GeoContext<'_>, craft: Entity) -> Directive {
        let landing_wait = ctx.config.landing_wait_ms;
        info!(?craft, objective = self.objective.name(), at = %ctx.now(), "UFO reached final site");

        match self.objective {
            UfoObjective::Research => {}
            UfoObjective::Terror { attack_city, city } => {
                if let (true, Some(city)) = (attack_city, city) {
                    let delay = ctx.config.terror_delay_ms;
                    let id = ctx
                        .agenda
                        .make_appointment(delay, AppointmentKind::TerrorStrike { ufo: craft, city });
                    self.strike = Some(id);
                    return Directive::SetState(MissionState::wait(delay));
                }
            }
            UfoObjective::Retaliation { base } => {
                if let Some(base) = base {
                    ctx.emit(GeoEventKind::BaseAssault { ufo: craft, base });
                }
            }
            UfoObjective::Supply { outpost } => {
                if let Some(outpost) = outpost {
                    if let Ok(mut site) = ctx.world.get::<&mut Site>(outpost) {
                        site.supplies += 1;
                    }
                    ctx.emit(GeoEventKind::OutpostSupplied { outpost });
                }
            }
            UfoObjective::Infiltration { city } => {
                if let Some(city) = city {
                    infiltrate(ctx, city);
                }
            }
        }

        Directive::SetState(MissionState::wait(landing_wait))
    }

    fn crash(&mut self, ctx: &mut GeoContext<'_>, craft: Entity) -> Directive {
        info!(?craft, landings_left = self.landings, "UFO crashed");
        self.landings = 0;
        self.heading_to_final = false;
        self.shot_down = true;
        if let Some(strike) = self.strike.take() {
            ctx.agenda.cancel(strike);
        }
        ctx.emit(GeoEventKind::UfoCrashed { ufo: craft });
        Directive::SetState(MissionState::wait(ctx.config.crash_grounding_ms))
    }

    fn final_site_lost(
        &mut self,
        ctx: &mut GeoContext<'_>,
        craft: Entity,
        state: &MissionState,
    ) -> Directive {
        self.final_site = None;
        self.objective.set_target(None);
        if let Some(strike) = self.strike.take() {
            ctx.agenda.cancel(strike);
        }

        // Still on the way: pick another site of the same kind
        if self.heading_to_final && matches!(state.kind, StateKind::MoveToPosition(_)) {
            return self.next_leg(ctx, craft);
        }
        Directive::Stay
    }
}

fn infiltrate(ctx: &mut GeoContext<'_>, city: Entity) {
    let (position, name, completed) = {
        let Ok(mut site) = ctx.world.get::<&mut Site>(city) else {
            return;
        };
        let was_complete = site.infiltration >= 100;
        let complete = site.infiltrate(INFILTRATION_PER_LANDING);
        (site.position, site.name.clone(), complete && !was_complete)
    };
    ctx.emit(GeoEventKind::CityInfiltrated { city });

    if completed {
        let radius = ctx.config.nearby_site_radius_km / 4.0;
        let outpost_position = position.random_near(ctx.rng, radius);
        let outpost = ctx
            .world
            .spawn((Site::outpost(format!("{name} Outpost"), outpost_position),));
        info!(city = %name, "alien outpost established");
        ctx.emit(GeoEventKind::OutpostEstablished { outpost, city });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Craft, Radar, Ufo, UfoClass};
    use crate::config::GeoConfig;
    use crate::events::GeoEventQueue;
    use crate::invasion::TaskId;
    use crate::mission::{DogfightResult, Mission, MissionKind, MissionOutcome, SignalQueue};
    use crate::time::{Agenda, MS_PER_MINUTE};
    use hecs::World;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct Harness {
        world: World,
        agenda: Agenda,
        events: GeoEventQueue,
        rng: ChaCha8Rng,
        config: GeoConfig,
        signals: SignalQueue,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                world: World::new(),
                agenda: Agenda::default(),
                events: GeoEventQueue::new(),
                rng: ChaCha8Rng::seed_from_u64(3),
                config: GeoConfig::default(),
                signals: SignalQueue::default(),
            }
        }

        fn ctx(&mut self) -> GeoContext<'_> {
            GeoContext {
                world: &mut self.world,
                agenda: &mut self.agenda,
                events: &mut self.events,
                rng: &mut self.rng,
                config: &self.config,
                signals: &mut self.signals,
            }
        }

        fn spawn_ufo(&mut self, position: GeoPosition) -> Entity {
            self.world.spawn((
                Craft::ufo("UFO", UfoClass::Transport, position),
                Ufo::new(UfoClass::Transport, TaskId::new(0)),
            ))
        }

        fn start(&mut self, ufo: Entity, mission: UfoMission) -> Mission {
            Mission::start(&mut self.ctx(), ufo, MissionKind::Ufo(mission))
        }

        fn has_event(&self, kind: &GeoEventKind) -> bool {
            self.events.iter().any(|e| e.kind == *kind)
        }
    }

    fn ufo_part(mission: &Mission) -> &UfoMission {
        match &mission.kind {
            MissionKind::Ufo(m) => m,
            _ => panic!("not a UFO mission"),
        }
    }

    #[test]
    fn test_infiltration_establishes_outpost() {
        let mut h = Harness::new();
        let here = GeoPosition::from_degrees(20.0, 10.0);
        let city = h.world.spawn((Site::city("Kano", here),));

        for expected in [50, 100] {
            let ufo = h.spawn_ufo(here);
            let mut mission = h.start(ufo, UfoMission::infiltration(1, Some(city)));
            mission.update(&mut h.ctx(), ufo, MS_PER_MINUTE);
            assert_eq!(h.world.get::<&Site>(city).unwrap().infiltration, expected);
            assert!(mission.state().is_wait());
        }

        assert!(h.has_event(&GeoEventKind::CityInfiltrated { city }));
        let outposts: Vec<_> = h
            .world
            .query::<&Site>()
            .iter()
            .filter(|(_, s)| s.is_outpost())
            .map(|(e, _)| e)
            .collect();
        assert_eq!(outposts.len(), 1);
        assert!(h.has_event(&GeoEventKind::OutpostEstablished {
            outpost: outposts[0],
            city,
        }));
    }

    #[test]
    fn test_supply_reaches_outpost() {
        let mut h = Harness::new();
        let here = GeoPosition::from_degrees(-60.0, -5.0);
        let outpost = h.world.spawn((Site::outpost("Nest", here),));
        let ufo = h.spawn_ufo(here);

        let mut mission = h.start(ufo, UfoMission::supply(1, Some(outpost)));
        mission.update(&mut h.ctx(), ufo, MS_PER_MINUTE);

        assert_eq!(h.world.get::<&Site>(outpost).unwrap().supplies, 1);
        assert!(h.has_event(&GeoEventKind::OutpostSupplied { outpost }));
    }

    #[test]
    fn test_retaliation_without_target_picks_nearest_base() {
        let mut h = Harness::new();
        let near = h.world.spawn((
            Site::xcorp_base("Near", GeoPosition::from_degrees(10.0, 0.0)),
            Radar { range_km: 1_000.0 },
        ));
        h.world.spawn((
            Site::xcorp_base("Far", GeoPosition::from_degrees(40.0, 0.0)),
            Radar { range_km: 1_000.0 },
        ));
        let ufo = h.spawn_ufo(GeoPosition::default());

        let mission = h.start(ufo, UfoMission::retaliation(1, None));
        let m = ufo_part(&mission);
        assert!(m.is_heading_to_final());
        assert_eq!(m.final_site(), Some(near));
        assert_eq!(m.objective, UfoObjective::Retaliation { base: Some(near) });
    }

    #[test]
    fn test_lost_final_site_is_replaced() {
        let mut h = Harness::new();
        let first = h.world.spawn((Site::city("First", GeoPosition::from_degrees(30.0, 0.0)),));
        let second_position = GeoPosition::from_degrees(60.0, 0.0);
        let second = h.world.spawn((Site::city("Second", second_position),));
        let ufo = h.spawn_ufo(GeoPosition::default());

        let mut mission = h.start(ufo, UfoMission::terror(1, true, Some(first)));
        assert_eq!(ufo_part(&mission).final_site(), Some(first));

        h.world.despawn(first).unwrap();
        let outcome = mission.handle(&mut h.ctx(), ufo, MissionSignal::SiteGone { site: first });
        assert_eq!(outcome, MissionOutcome::Continue);
        assert_eq!(ufo_part(&mission).final_site(), Some(second));
        match mission.state().kind {
            StateKind::MoveToPosition(state) => assert_eq!(state.destination, second_position),
            _ => panic!("expected to be flying to the new site"),
        }
    }

    #[test]
    fn test_no_final_site_leaves_at_once() {
        let mut h = Harness::new();
        let ufo = h.spawn_ufo(GeoPosition::default());

        // Terror with no cities on the map
        let mut mission = h.start(ufo, UfoMission::terror(1, true, None));
        assert!(mission.state().is_wait());
        assert_eq!(
            mission.update(&mut h.ctx(), ufo, MS_PER_MINUTE),
            MissionOutcome::Finished
        );
    }

    #[test]
    fn test_crash_mid_flight() {
        let mut h = Harness::new();
        let ufo = h.spawn_ufo(GeoPosition::default());
        let mut mission = h.start(ufo, UfoMission::research(3));
        assert!(!mission.state().is_wait());

        let result = DogfightResult {
            opponent: ufo,
            own: CombatFate::Crashed,
            opponent_fate: CombatFate::Intact,
        };
        mission.handle(&mut h.ctx(), ufo, MissionSignal::DogfightFinished(result));

        let m = ufo_part(&mission);
        assert_eq!(m.landings, 0);
        assert!(m.shot_down);
        match mission.state().kind {
            StateKind::Wait(wait) => assert_eq!(wait.remaining_ms, h.config.crash_grounding_ms),
            _ => panic!("crashed UFO must wait"),
        }
        assert!(h.world.get::<&Ufo>(ufo).unwrap().grounded);
        assert!(h.has_event(&GeoEventKind::UfoCrashed { ufo }));
    }
}
