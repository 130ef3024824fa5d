//! X-Corp interceptor missions.

use hecs::Entity;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::context::GeoContext;
use super::{Directive, MissionSignal, MissionState, StateKind};
use crate::components::{Craft, GeoPosition, SiteKind, Ufo};
use crate::events::GeoEventKind;

/// Chase a UFO. A landed UFO is reported to the host; a flying one
/// starts a dogfight. Either way the craft then heads home.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InterceptMission {
    pub target: Entity,
}

impl InterceptMission {
    pub fn new(target: Entity) -> Self {
        Self { target }
    }

    pub(super) fn first_state(&self) -> MissionState {
        MissionState::intercept(self.target)
    }

    pub(super) fn handle(
        &mut self,
        ctx: &mut GeoContext<'_>,
        craft: Entity,
        state: &MissionState,
        signal: MissionSignal,
    ) -> Directive {
        match signal {
            MissionSignal::InAttackRange { target } if state.is_intercept() => {
                engage(ctx, craft, target)
            }
            MissionSignal::DogfightFinished(_) if !state.is_return_to_base() => {
                Directive::SetState(MissionState::return_to_base())
            }
            MissionSignal::PreyGone if state.is_intercept() => {
                Directive::SetState(MissionState::return_to_base())
            }
            MissionSignal::PreyTrackingLost if state.is_intercept() => {
                ctx.emit(GeoEventKind::TrackingLost {
                    craft,
                    prey: self.target,
                });
                Directive::SetState(MissionState::return_to_base())
            }
            _ => handle_common(ctx, craft, state, signal),
        }
    }
}

/// Fly to a point and loiter there, then head home
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PatrolMission {
    pub centre: GeoPosition,
    pub duration_ms: u64,
}

impl PatrolMission {
    pub fn new(centre: GeoPosition, duration_ms: u64) -> Self {
        Self {
            centre,
            duration_ms,
        }
    }

    pub(super) fn first_state(&self) -> MissionState {
        MissionState::patrol(self.centre, self.duration_ms)
    }

    pub(super) fn handle(
        &mut self,
        ctx: &mut GeoContext<'_>,
        craft: Entity,
        state: &MissionState,
        signal: MissionSignal,
    ) -> Directive {
        match signal {
            MissionSignal::TimerFinished if matches!(state.kind, StateKind::Patrol(_)) => {
                Directive::SetState(MissionState::return_to_base())
            }
            _ => handle_common(ctx, craft, state, signal),
        }
    }
}

fn engage(ctx: &mut GeoContext<'_>, craft: Entity, target: Entity) -> Directive {
    let grounded = ctx
        .world
        .get::<&Ufo>(target)
        .map(|ufo| ufo.grounded)
        .unwrap_or(false);
    if grounded {
        info!(?craft, ufo = ?target, "interceptor reached landed UFO");
        ctx.emit(GeoEventKind::LandedUfoReached { craft, ufo: target });
        return Directive::SetState(MissionState::return_to_base());
    }

    // One opponent per dogfight; DogfightStart is only delivered after the
    // traversal, so the slot is claimed here
    let claimed = match ctx.world.get::<&mut Ufo>(target) {
        Ok(mut ufo) => match ufo.engaged_by {
            Some(other) if other != craft => false,
            _ => {
                ufo.engaged_by = Some(craft);
                true
            }
        },
        Err(_) => false,
    };
    if !claimed {
        return Directive::Stay;
    }

    info!(?craft, ufo = ?target, "dogfight started");
    ctx.emit(GeoEventKind::DogfightStarted {
        hunter: craft,
        prey: target,
    });
    ctx.signal(craft, MissionSignal::DogfightStart { opponent: target });
    ctx.signal(target, MissionSignal::DogfightStart { opponent: craft });
    Directive::Stay
}

/// Fuel, homecoming and loss of the home base, shared by every X-Corp mission
fn handle_common(
    ctx: &mut GeoContext<'_>,
    craft: Entity,
    state: &MissionState,
    signal: MissionSignal,
) -> Directive {
    match signal {
        MissionSignal::FuelLow if !state.is_return_to_base() => {
            ctx.emit(GeoEventKind::FuelLow { craft });
            Directive::SetState(MissionState::return_to_base())
        }
        MissionSignal::DestinationReached if state.is_return_to_base() => {
            if let Some(base) = home_base(ctx, craft) {
                ctx.emit(GeoEventKind::CraftReturned { craft, base });
            }
            Directive::Finish
        }
        MissionSignal::SiteGone { site } if home_base(ctx, craft) == Some(site) => {
            let replacement = ctx
                .craft_position(craft)
                .and_then(|here| ctx.nearest_site(&here, SiteKind::XCorpBase, Some(site)));
            if let Ok(mut body) = ctx.world.get::<&mut Craft>(craft) {
                body.home_base = replacement;
            }
            match replacement {
                Some(_) => Directive::Stay,
                // Nowhere to land
                None => Directive::Finish,
            }
        }
        _ => Directive::Stay,
    }
}

fn home_base(ctx: &GeoContext<'_>, craft: Entity) -> Option<Entity> {
    ctx.world.get::<&Craft>(craft).ok()?.home_base
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{CombatFate, Radar, Site, UfoClass};
    use crate::config::GeoConfig;
    use crate::events::GeoEventQueue;
    use crate::invasion::TaskId;
    use crate::mission::{DogfightResult, Mission, MissionKind, MissionOutcome, Phase, SignalQueue};
    use crate::time::{Agenda, MS_PER_HOUR, MS_PER_MINUTE};
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
                rng: ChaCha8Rng::seed_from_u64(5),
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

        fn base(&mut self, position: GeoPosition, radar_km: f64) -> Entity {
            self.world
                .spawn((Site::xcorp_base("Base", position), Radar { range_km: radar_km }))
        }

        fn interceptor(&mut self, base: Entity, position: GeoPosition) -> Entity {
            self.world.spawn((Craft::interceptor("Eagle-1", base, position)
                .with_speed(2_000.0)
                .with_fuel(6 * MS_PER_HOUR)
                .with_radar(100.0),))
        }

        fn ufo(&mut self, position: GeoPosition) -> Entity {
            self.world.spawn((
                Craft::ufo("UFO", UfoClass::Scout, position),
                Ufo::new(UfoClass::Scout, TaskId::new(0)),
            ))
        }
    }

    #[test]
    fn test_landed_ufo_is_reported_not_fought() {
        let mut h = Harness::new();
        let here = GeoPosition::default();
        let base = h.base(here, 1_000.0);
        let craft = h.interceptor(base, here);
        let ufo = h.ufo(GeoPosition::from_degrees(0.1, 0.0));
        h.world.get::<&mut Ufo>(ufo).unwrap().grounded = true;

        let kind = MissionKind::Intercept(InterceptMission::new(ufo));
        let mut mission = Mission::start(&mut h.ctx(), craft, kind);
        mission.update(&mut h.ctx(), craft, MS_PER_MINUTE);

        assert!(mission.state().is_return_to_base());
        assert!(h.signals.is_empty());
        assert!(h
            .events
            .iter()
            .any(|e| e.kind == GeoEventKind::LandedUfoReached { craft, ufo }));
    }

    #[test]
    fn test_flying_ufo_starts_dogfight() {
        let mut h = Harness::new();
        let here = GeoPosition::default();
        let base = h.base(here, 1_000.0);
        let craft = h.interceptor(base, here);
        let ufo = h.ufo(GeoPosition::from_degrees(0.1, 0.0));

        let kind = MissionKind::Intercept(InterceptMission::new(ufo));
        let mut mission = Mission::start(&mut h.ctx(), craft, kind);
        mission.update(&mut h.ctx(), craft, MS_PER_MINUTE);

        assert!(mission.state().is_intercept());
        assert_eq!(
            h.signals.pop(),
            Some((craft, MissionSignal::DogfightStart { opponent: ufo }))
        );
        assert_eq!(
            h.signals.pop(),
            Some((ufo, MissionSignal::DogfightStart { opponent: craft }))
        );
    }

    #[test]
    fn test_second_hunter_waits_for_the_first_dogfight() {
        let mut h = Harness::new();
        let here = GeoPosition::default();
        let base = h.base(here, 1_000.0);
        let first = h.interceptor(base, here);
        let second = h.interceptor(base, here);
        let ufo = h.ufo(GeoPosition::from_degrees(0.1, 0.0));

        let kind = MissionKind::Intercept(InterceptMission::new(ufo));
        let mut a = Mission::start(&mut h.ctx(), first, kind.clone());
        let mut b = Mission::start(&mut h.ctx(), second, kind);

        // Both reach attack range in the same step; only one fight opens
        a.update(&mut h.ctx(), first, MS_PER_MINUTE);
        b.update(&mut h.ctx(), second, MS_PER_MINUTE);
        let started = h
            .events
            .iter()
            .filter(|e| matches!(e.kind, GeoEventKind::DogfightStarted { .. }))
            .count();
        assert_eq!(started, 1);
        assert_eq!(h.signals.len(), 2);
        assert_eq!(h.world.get::<&Ufo>(ufo).unwrap().engaged_by, Some(first));
        assert!(b.state().is_intercept());

        while let Some((target, signal)) = h.signals.pop() {
            if target == first {
                a.handle(&mut h.ctx(), first, signal);
            }
        }
        assert_eq!(a.dogfight, Some(ufo));
        assert_eq!(b.dogfight, None);

        // Once the first fight is over the UFO is free for the second hunter
        let result = DogfightResult {
            opponent: ufo,
            own: CombatFate::Intact,
            opponent_fate: CombatFate::Intact,
        };
        a.handle(&mut h.ctx(), first, MissionSignal::DogfightFinished(result));
        assert_eq!(h.world.get::<&Ufo>(ufo).unwrap().engaged_by, None);

        b.update(&mut h.ctx(), second, MS_PER_MINUTE);
        assert_eq!(h.world.get::<&Ufo>(ufo).unwrap().engaged_by, Some(second));
        assert_eq!(
            h.signals.pop(),
            Some((second, MissionSignal::DogfightStart { opponent: ufo }))
        );
    }

    #[test]
    fn test_set_state_exits_before_entering() {
        let mut h = Harness::new();
        let here = GeoPosition::default();
        let base = h.base(here, 1_000.0);
        let craft = h.interceptor(base, here);
        let ufo = h.ufo(GeoPosition::from_degrees(5.0, 0.0));

        let kind = MissionKind::Intercept(InterceptMission::new(ufo));
        let mut mission = Mission::start(&mut h.ctx(), craft, kind);

        // Re-targeting the same prey: the old state deregisters first, so the
        // new registration survives
        mission.set_state(&mut h.ctx(), craft, MissionState::intercept(ufo));
        assert_eq!(h.world.get::<&Craft>(ufo).unwrap().hunters, vec![craft]);
        assert_eq!(h.world.get::<&Craft>(craft).unwrap().prey, Some(ufo));
        assert_eq!(mission.state().phase(), Phase::Active);
        assert_eq!(mission.state_changes, 2);
    }

    #[test]
    fn test_aborted_hunter_releases_its_claim() {
        let mut h = Harness::new();
        let here = GeoPosition::default();
        let base = h.base(here, 1_000.0);
        let craft = h.interceptor(base, here);
        let ufo = h.ufo(GeoPosition::from_degrees(0.1, 0.0));

        let kind = MissionKind::Intercept(InterceptMission::new(ufo));
        let mut mission = Mission::start(&mut h.ctx(), craft, kind);
        mission.update(&mut h.ctx(), craft, MS_PER_MINUTE);
        assert_eq!(h.world.get::<&Ufo>(ufo).unwrap().engaged_by, Some(craft));

        // Concluded before the queued DogfightStart was ever delivered
        mission.conclude(&mut h.ctx(), craft);
        assert_eq!(h.world.get::<&Ufo>(ufo).unwrap().engaged_by, None);
    }

    #[test]
    fn test_tracking_lost_sends_craft_home() {
        let mut h = Harness::new();
        let here = GeoPosition::default();
        // Radar too small to see the UFO
        let base = h.base(here, 10.0);
        let craft = h.interceptor(base, here);
        let ufo = h.ufo(GeoPosition::from_degrees(20.0, 0.0));

        let kind = MissionKind::Intercept(InterceptMission::new(ufo));
        let mut mission = Mission::start(&mut h.ctx(), craft, kind);
        assert_eq!(
            mission.update(&mut h.ctx(), craft, MS_PER_MINUTE),
            MissionOutcome::Continue
        );

        assert!(mission.state().is_return_to_base());
        assert!(h.world.get::<&Craft>(ufo).unwrap().hunters.is_empty());
        assert!(h
            .events
            .iter()
            .any(|e| e.kind == GeoEventKind::TrackingLost { craft, prey: ufo }));
    }

    #[test]
    fn test_patrol_returns_and_finishes() {
        let mut h = Harness::new();
        let here = GeoPosition::default();
        let base = h.base(here, 1_000.0);
        let craft = h.interceptor(base, here);

        let kind = MissionKind::Patrol(PatrolMission::new(
            GeoPosition::from_degrees(1.0, 0.0),
            30 * MS_PER_MINUTE,
        ));
        let mut mission = Mission::start(&mut h.ctx(), craft, kind);

        let mut outcome = MissionOutcome::Continue;
        for _ in 0..120 {
            outcome = mission.update(&mut h.ctx(), craft, MS_PER_MINUTE);
            if outcome == MissionOutcome::Finished {
                break;
            }
        }
        assert_eq!(outcome, MissionOutcome::Finished);
        assert!(h
            .events
            .iter()
            .any(|e| e.kind == GeoEventKind::CraftReturned { craft, base }));
    }

    #[test]
    fn test_lost_home_base_rehomes_to_nearest() {
        let mut h = Harness::new();
        let home = h.base(GeoPosition::default(), 1_000.0);
        let near = h.base(GeoPosition::from_degrees(5.0, 0.0), 1_000.0);
        h.base(GeoPosition::from_degrees(50.0, 0.0), 1_000.0);
        let craft = h.interceptor(home, GeoPosition::default());

        let kind = MissionKind::Patrol(PatrolMission::new(GeoPosition::default(), MS_PER_HOUR));
        let mut mission = Mission::start(&mut h.ctx(), craft, kind);
        h.world.despawn(home).unwrap();

        let outcome = mission.handle(&mut h.ctx(), craft, MissionSignal::SiteGone { site: home });
        assert_eq!(outcome, MissionOutcome::Continue);
        assert_eq!(h.world.get::<&Craft>(craft).unwrap().home_base, Some(near));
    }
}
