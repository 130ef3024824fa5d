//! Missions - multi-step orders carried out by a single craft
//!
//! A [`Mission`] is an ECS component on its craft. It owns exactly one
//! [`MissionState`] and decides what comes next whenever the state reports a
//! [`MissionSignal`]. The concrete behaviour lives in a closed set of kinds:
//! [`UfoMission`] for alien craft, [`InterceptMission`] and [`PatrolMission`]
//! for X-Corp interceptors.
//!
//! While a mission runs it is taken out of the world, so signals for other
//! craft go through the context's [`SignalQueue`] and are delivered after the
//! step.

mod context;
mod state;
mod ufo;
mod xcorp;

pub use context::{GeoContext, SignalQueue};
pub use state::*;
pub use ufo::{UfoMission, UfoObjective};
pub use xcorp::{InterceptMission, PatrolMission};

use hecs::Entity;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::components::{CombatFate, Ufo};

/// Something that happened to a mission's craft
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MissionSignal {
    DestinationReached,
    TimerFinished,
    CraftDestroyed,
    FuelLow,
    InAttackRange { target: Entity },
    DogfightStart { opponent: Entity },
    DogfightFinished(DogfightResult),
    PreyGone,
    PreyTrackingLost,
    SiteGone { site: Entity },
}

/// A resolved dogfight, from the receiving craft's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DogfightResult {
    pub opponent: Entity,
    pub own: CombatFate,
    pub opponent_fate: CombatFate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionOutcome {
    Continue,
    /// The mission is over and has cleaned up after itself
    Finished,
}

/// What a mission kind wants after handling a signal
#[derive(Debug)]
pub(crate) enum Directive {
    Stay,
    SetState(MissionState),
    Finish,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MissionKind {
    Ufo(UfoMission),
    Intercept(InterceptMission),
    Patrol(PatrolMission),
}

impl MissionKind {
    fn first_state(&mut self, ctx: &mut GeoContext<'_>, craft: Entity) -> MissionState {
        match self {
            MissionKind::Ufo(m) => m.first_state(ctx, craft),
            MissionKind::Intercept(m) => m.first_state(),
            MissionKind::Patrol(m) => m.first_state(),
        }
    }

    fn handle(
        &mut self,
        ctx: &mut GeoContext<'_>,
        craft: Entity,
        state: &MissionState,
        signal: MissionSignal,
    ) -> Directive {
        match self {
            MissionKind::Ufo(m) => m.handle(ctx, craft, state, signal),
            MissionKind::Intercept(m) => m.handle(ctx, craft, state, signal),
            MissionKind::Patrol(m) => m.handle(ctx, craft, state, signal),
        }
    }

    fn on_conclude(&mut self, ctx: &mut GeoContext<'_>) {
        if let MissionKind::Ufo(m) = self {
            m.on_conclude(ctx);
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MissionKind::Ufo(m) => m.objective.name(),
            MissionKind::Intercept(_) => "Intercept",
            MissionKind::Patrol(_) => "Patrol",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    pub kind: MissionKind,
    state: MissionState,
    /// Opponent while frozen in a dogfight
    pub dogfight: Option<Entity>,
    /// Number of states installed so far
    pub state_changes: u32,
}

impl Mission {
    /// Build the mission and install its first state
    pub fn start(ctx: &mut GeoContext<'_>, craft: Entity, mut kind: MissionKind) -> Self {
        let mut state = kind.first_state(ctx, craft);
        state.on_enter(ctx, craft);
        debug!(?craft, mission = kind.name(), state = state.name(), "mission started");
        Self {
            kind,
            state,
            dogfight: None,
            state_changes: 1,
        }
    }

    pub fn state(&self) -> &MissionState {
        &self.state
    }

    pub fn is_in_dogfight(&self) -> bool {
        self.dogfight.is_some()
    }

    /// Exit the current state, then enter `next`
    pub fn set_state(&mut self, ctx: &mut GeoContext<'_>, craft: Entity, next: MissionState) {
        debug!(?craft, from = self.state.name(), to = next.name(), "state change");
        self.state.on_exit(ctx, craft);
        self.state = next;
        self.state.on_enter(ctx, craft);
        self.state_changes += 1;
    }

    /// One step. Frozen while in a dogfight.
    pub fn update(&mut self, ctx: &mut GeoContext<'_>, craft: Entity, ms: u64) -> MissionOutcome {
        if self.is_in_dogfight() {
            return MissionOutcome::Continue;
        }
        match self.state.update(ctx, craft, ms) {
            Some(signal) => self.handle(ctx, craft, signal),
            None => MissionOutcome::Continue,
        }
    }

    pub fn handle(
        &mut self,
        ctx: &mut GeoContext<'_>,
        craft: Entity,
        signal: MissionSignal,
    ) -> MissionOutcome {
        let directive = match signal {
            MissionSignal::CraftDestroyed => Directive::Finish,
            MissionSignal::DogfightStart { opponent } => {
                self.dogfight = Some(opponent);
                Directive::Stay
            }
            MissionSignal::DogfightFinished(result) => {
                self.dogfight = None;
                self.release_engagement(ctx, craft);
                if result.own == CombatFate::Destroyed {
                    Directive::Finish
                } else {
                    self.kind.handle(ctx, craft, &self.state, signal)
                }
            }
            _ => self.kind.handle(ctx, craft, &self.state, signal),
        };

        match directive {
            Directive::Stay => MissionOutcome::Continue,
            Directive::SetState(next) => {
                self.set_state(ctx, craft, next);
                MissionOutcome::Continue
            }
            Directive::Finish => {
                self.conclude(ctx, craft);
                MissionOutcome::Finished
            }
        }
    }

    /// Tear down: exit the state, release any dogfight opponent and cancel
    /// pending appointments. Used for finishing and for aborting.
    pub fn conclude(&mut self, ctx: &mut GeoContext<'_>, craft: Entity) {
        if self.state.phase() == Phase::Active {
            self.state.on_exit(ctx, craft);
        }
        self.release_engagement(ctx, craft);
        if let Some(opponent) = self.dogfight.take() {
            ctx.signal(
                opponent,
                MissionSignal::DogfightFinished(DogfightResult {
                    opponent: craft,
                    own: CombatFate::Intact,
                    opponent_fate: CombatFate::Intact,
                }),
            );
        }
        self.kind.on_conclude(ctx);
        debug!(?craft, mission = self.kind.name(), "mission concluded");
    }

    /// Free the dogfight slot this craft holds, as the UFO itself or as the
    /// interceptor that claimed it
    fn release_engagement(&self, ctx: &mut GeoContext<'_>, craft: Entity) {
        if let Ok(mut ufo) = ctx.world.get::<&mut Ufo>(craft) {
            ufo.engaged_by = None;
        }
        if let MissionKind::Intercept(m) = &self.kind {
            if let Ok(mut ufo) = ctx.world.get::<&mut Ufo>(m.target) {
                if ufo.engaged_by == Some(craft) {
                    ufo.engaged_by = None;
                }
            }
        }
    }
}

/// Run one step of the mission on `craft`. Finished missions are left out
/// of the world; a craft without a mission counts as finished.
pub fn update_craft(ctx: &mut GeoContext<'_>, craft: Entity, ms: u64) -> MissionOutcome {
    let Ok(mut mission) = ctx.world.remove_one::<Mission>(craft) else {
        return MissionOutcome::Finished;
    };
    let outcome = mission.update(ctx, craft, ms);
    reinsert(ctx, craft, mission, outcome);
    outcome
}

/// Deliver a queued signal. `None` if the craft has no mission.
pub fn deliver_signal(
    ctx: &mut GeoContext<'_>,
    craft: Entity,
    signal: MissionSignal,
) -> Option<MissionOutcome> {
    let mut mission = ctx.world.remove_one::<Mission>(craft).ok()?;
    let outcome = mission.handle(ctx, craft, signal);
    reinsert(ctx, craft, mission, outcome);
    Some(outcome)
}

/// Start `kind` on `craft`, aborting whatever it was doing before
pub fn assign(ctx: &mut GeoContext<'_>, craft: Entity, kind: MissionKind) {
    abort(ctx, craft);
    let mission = Mission::start(ctx, craft, kind);
    let _ = ctx.world.insert_one(craft, mission);
}

/// Drop the craft's mission without finishing it. Returns false if it had none.
pub fn abort(ctx: &mut GeoContext<'_>, craft: Entity) -> bool {
    match ctx.world.remove_one::<Mission>(craft) {
        Ok(mut mission) => {
            mission.conclude(ctx, craft);
            true
        }
        Err(_) => false,
    }
}

fn reinsert(ctx: &mut GeoContext<'_>, craft: Entity, mission: Mission, outcome: MissionOutcome) {
    if outcome == MissionOutcome::Continue && ctx.world.contains(craft) {
        let _ = ctx.world.insert_one(craft, mission);
    }
}
