//! Mission states - what a craft is doing right now
//!
//! Exactly one [`MissionState`] is active per mission. A state is entered
//! once, updated every step, and exited once before being replaced; it is
//! never reused afterwards.
//!
//! `update` is a template: [`MissionState::do_checks`] runs first and may
//! veto the step with a signal, then the state-specific update runs.

use std::ops::ControlFlow;

use hecs::Entity;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::context::GeoContext;
use super::MissionSignal;
use crate::components::{Craft, CraftStatus, GeoPosition, Ufo};
use crate::time::MS_PER_HOUR;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Built but not installed
    Fresh,
    Active,
    /// Replaced; must not be used again
    Exited,
}

/// Count down, then report `TimerFinished` once
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaitState {
    pub remaining_ms: u64,
    expired: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveToPositionState {
    pub destination: GeoPosition,
}

/// Fly home; the destination follows the craft's current home base
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnToBaseState;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterceptCraftState {
    pub prey: Entity,
}

/// Fly to `centre` and loiter there for `remaining_ms`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatrolState {
    pub centre: GeoPosition,
    pub remaining_ms: u64,
    on_station: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StateKind {
    Wait(WaitState),
    MoveToPosition(MoveToPositionState),
    ReturnToBase(ReturnToBaseState),
    InterceptCraft(InterceptCraftState),
    Patrol(PatrolState),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionState {
    pub kind: StateKind,
    /// km/h while this state is active
    pub current_speed: f64,
    phase: Phase,
}

impl MissionState {
    fn with_kind(kind: StateKind) -> Self {
        Self {
            kind,
            current_speed: 0.0,
            phase: Phase::Fresh,
        }
    }

    pub fn wait(duration_ms: u64) -> Self {
        Self::with_kind(StateKind::Wait(WaitState {
            remaining_ms: duration_ms,
            expired: false,
        }))
    }

    pub fn move_to(destination: GeoPosition) -> Self {
        Self::with_kind(StateKind::MoveToPosition(MoveToPositionState { destination }))
    }

    pub fn return_to_base() -> Self {
        Self::with_kind(StateKind::ReturnToBase(ReturnToBaseState))
    }

    pub fn intercept(prey: Entity) -> Self {
        Self::with_kind(StateKind::InterceptCraft(InterceptCraftState { prey }))
    }

    pub fn patrol(centre: GeoPosition, duration_ms: u64) -> Self {
        Self::with_kind(StateKind::Patrol(PatrolState {
            centre,
            remaining_ms: duration_ms,
            on_station: false,
        }))
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            StateKind::Wait(_) => "Wait",
            StateKind::MoveToPosition(_) => "MoveToPosition",
            StateKind::ReturnToBase(_) => "ReturnToBase",
            StateKind::InterceptCraft(_) => "InterceptCraft",
            StateKind::Patrol(_) => "Patrol",
        }
    }

    pub fn is_wait(&self) -> bool {
        matches!(self.kind, StateKind::Wait(_))
    }

    pub fn is_intercept(&self) -> bool {
        matches!(self.kind, StateKind::InterceptCraft(_))
    }

    pub fn is_return_to_base(&self) -> bool {
        matches!(self.kind, StateKind::ReturnToBase(_))
    }

    pub fn on_enter(&mut self, ctx: &mut GeoContext<'_>, craft: Entity) {
        debug_assert_eq!(self.phase, Phase::Fresh, "state entered twice");
        self.phase = Phase::Active;

        let Ok(mut body) = ctx.world.get::<&mut Craft>(craft) else {
            debug_assert!(false, "mission state entered without a craft");
            return;
        };

        match self.kind {
            StateKind::Wait(_) => {
                self.current_speed = 0.0;
            }
            StateKind::InterceptCraft(InterceptCraftState { prey }) => {
                self.current_speed = body.max_speed_kmh;
                body.status = CraftStatus::Airborne;
                body.prey = Some(prey);
                drop(body);
                if let Ok(mut target) = ctx.world.get::<&mut Craft>(prey) {
                    target.add_hunter(craft);
                }
            }
            _ => {
                self.current_speed = body.max_speed_kmh;
                body.status = CraftStatus::Airborne;
            }
        }

        // UFOs sit on the ground while waiting
        if let Ok(mut ufo) = ctx.world.get::<&mut Ufo>(craft) {
            ufo.grounded = self.is_wait();
        }

        debug!(?craft, state = self.name(), "state entered");
    }

    /// Undo whatever `on_enter` registered. Safe when the craft or prey is
    /// already gone.
    pub fn on_exit(&mut self, ctx: &mut GeoContext<'_>, craft: Entity) {
        debug_assert_eq!(self.phase, Phase::Active, "exiting a state that is not active");
        self.phase = Phase::Exited;

        if let StateKind::InterceptCraft(InterceptCraftState { prey }) = self.kind {
            if let Ok(mut target) = ctx.world.get::<&mut Craft>(prey) {
                target.remove_hunter(craft);
            }
            if let Ok(mut body) = ctx.world.get::<&mut Craft>(craft) {
                if body.prey == Some(prey) {
                    body.prey = None;
                }
            }
        }
        self.current_speed = 0.0;
    }

    /// One simulation step. Returns the signal the step produced, if any.
    pub fn update(
        &mut self,
        ctx: &mut GeoContext<'_>,
        craft: Entity,
        ms: u64,
    ) -> Option<MissionSignal> {
        debug_assert_eq!(self.phase, Phase::Active, "updating an inactive state");

        if let ControlFlow::Break(signal) = self.do_checks(ctx, craft) {
            return signal;
        }

        let speed = self.current_speed;
        match &mut self.kind {
            StateKind::Wait(wait) => {
                wait.remaining_ms = wait.remaining_ms.saturating_sub(ms);
                if wait.remaining_ms == 0 && !wait.expired {
                    wait.expired = true;
                    return Some(MissionSignal::TimerFinished);
                }
                None
            }
            StateKind::MoveToPosition(state) => {
                let destination = state.destination;
                fly_toward(ctx, craft, destination, speed, ms)
                    .then_some(MissionSignal::DestinationReached)
            }
            StateKind::ReturnToBase(_) => {
                let Some(base) = home_base(ctx, craft) else {
                    return None;
                };
                let Some(destination) = ctx.site_position(base) else {
                    return Some(MissionSignal::SiteGone { site: base });
                };
                fly_toward(ctx, craft, destination, speed, ms)
                    .then_some(MissionSignal::DestinationReached)
            }
            StateKind::InterceptCraft(InterceptCraftState { prey }) => {
                let prey = *prey;
                let destination = ctx.craft_position(prey)?;
                fly_toward(ctx, craft, destination, speed, ms);

                let position = ctx.craft_position(craft)?;
                (position.distance_km(&destination) <= ctx.config.attack_range_km)
                    .then_some(MissionSignal::InAttackRange { target: prey })
            }
            StateKind::Patrol(patrol) => {
                if !patrol.on_station {
                    let centre = patrol.centre;
                    patrol.on_station = fly_toward(ctx, craft, centre, speed, ms);
                    return None;
                }
                burn_fuel(ctx, craft, ms);
                patrol.remaining_ms = patrol.remaining_ms.saturating_sub(ms);
                (patrol.remaining_ms == 0).then_some(MissionSignal::TimerFinished)
            }
        }
    }

    /// Pre-step checks. `Break` stops the step, optionally with a signal.
    pub fn do_checks(
        &self,
        ctx: &GeoContext<'_>,
        craft: Entity,
    ) -> ControlFlow<Option<MissionSignal>> {
        match self.kind {
            StateKind::InterceptCraft(InterceptCraftState { prey }) => {
                if ctx.craft_position(prey).is_none() {
                    return ControlFlow::Break(Some(MissionSignal::PreyGone));
                }
                if !ctx.is_visible(prey) {
                    return ControlFlow::Break(Some(MissionSignal::PreyTrackingLost));
                }
                check_fuel(ctx, craft)
            }
            StateKind::MoveToPosition(_) | StateKind::Patrol(_) => check_fuel(ctx, craft),
            StateKind::Wait(_) | StateKind::ReturnToBase(_) => ControlFlow::Continue(()),
        }
    }
}

fn home_base(ctx: &GeoContext<'_>, craft: Entity) -> Option<Entity> {
    ctx.world.get::<&Craft>(craft).ok()?.home_base
}

/// FuelLow when what is left would not get the craft home with a margin
fn check_fuel(ctx: &GeoContext<'_>, craft: Entity) -> ControlFlow<Option<MissionSignal>> {
    let Ok(body) = ctx.world.get::<&Craft>(craft) else {
        return ControlFlow::Continue(());
    };
    let (Some(remaining), Some(base)) = (body.remaining_endurance_ms(), body.home_base) else {
        return ControlFlow::Continue(());
    };
    let Some(base_position) = ctx.site_position(base) else {
        return ControlFlow::Continue(());
    };

    let time_home = body.flight_time_ms(body.position.distance_km(&base_position)) as f64;
    if (remaining as f64) < time_home * ctx.config.fuel_reserve_factor {
        ControlFlow::Break(Some(MissionSignal::FuelLow))
    } else {
        ControlFlow::Continue(())
    }
}

fn burn_fuel(ctx: &mut GeoContext<'_>, craft: Entity, ms: u64) {
    if let Ok(mut body) = ctx.world.get::<&mut Craft>(craft) {
        body.consume_fuel(ms);
    }
}

/// Move along the great circle. Returns true once within arrival tolerance.
fn fly_toward(
    ctx: &mut GeoContext<'_>,
    craft: Entity,
    destination: GeoPosition,
    speed_kmh: f64,
    ms: u64,
) -> bool {
    let tolerance = ctx.config.arrival_tolerance_km;
    let Ok(mut body) = ctx.world.get::<&mut Craft>(craft) else {
        return false;
    };

    let km = speed_kmh * ms as f64 / MS_PER_HOUR as f64;
    let (next, reached) = body.position.step_toward(&destination, km);
    body.position = next;
    body.consume_fuel(ms);

    trace!(?craft, lon = next.longitude, lat = next.latitude, "craft moved");
    reached || next.distance_km(&destination) <= tolerance
}
