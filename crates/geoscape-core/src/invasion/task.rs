//! Invasion tasks - one strategic goal, carried out by one or more UFOs.

use std::fmt;

use hecs::Entity;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::overmind::UfoRoster;
use crate::components::UfoClass;
use crate::config::GeoConfig;
use crate::events::GeoEventKind;
use crate::mission::{update_craft, GeoContext, MissionOutcome, UfoMission};
use crate::time::AppointmentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(u32);

impl TaskId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task #{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvasionTaskKind {
    Research,
    Terror,
    Retaliation,
    Supply,
    Infiltration,
}

impl InvasionTaskKind {
    pub fn name(&self) -> &'static str {
        match self {
            InvasionTaskKind::Research => "Research",
            InvasionTaskKind::Terror => "Terror",
            InvasionTaskKind::Retaliation => "Retaliation",
            InvasionTaskKind::Supply => "Supply",
            InvasionTaskKind::Infiltration => "Infiltration",
        }
    }

    pub fn launches(&self, config: &GeoConfig) -> u32 {
        match self {
            InvasionTaskKind::Research => config.research_launches,
            InvasionTaskKind::Terror => config.terror_launches,
            InvasionTaskKind::Retaliation => config.retaliation_launches,
            InvasionTaskKind::Supply => config.supply_launches,
            InvasionTaskKind::Infiltration => config.infiltration_launches,
        }
    }

    /// Class of the `index`-th UFO launched by this kind of task
    pub fn ufo_class(&self, index: u32) -> UfoClass {
        match self {
            InvasionTaskKind::Research if index == 0 => UfoClass::Probe,
            InvasionTaskKind::Research => UfoClass::Scout,
            InvasionTaskKind::Terror => UfoClass::Harvester,
            InvasionTaskKind::Retaliation => UfoClass::Battleship,
            InvasionTaskKind::Supply => UfoClass::Transport,
            InvasionTaskKind::Infiltration if index == 0 => UfoClass::Scout,
            InvasionTaskKind::Infiltration => UfoClass::Transport,
        }
    }

    /// Mission for a freshly launched UFO
    pub fn ufo_mission(&self, config: &GeoConfig, target: Option<Entity>) -> UfoMission {
        match self {
            InvasionTaskKind::Research => UfoMission::research(config.research_landings),
            InvasionTaskKind::Terror => {
                UfoMission::terror(config.terror_landings, config.terror_attacks_city, target)
            }
            InvasionTaskKind::Retaliation => {
                UfoMission::retaliation(config.retaliation_landings, target)
            }
            InvasionTaskKind::Supply => UfoMission::supply(config.supply_landings, target),
            InvasionTaskKind::Infiltration => {
                UfoMission::infiltration(config.infiltration_landings, target)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvasionTask {
    pub id: TaskId,
    pub kind: InvasionTaskKind,
    /// City, base or outpost the task is aimed at
    pub target: Option<Entity>,
    /// UFOs in flight for this task; the Overmind's roster owns them
    ufos: Vec<Entity>,
    pub launches_remaining: u32,
    pub launched: u32,
    pub pending_launch: Option<AppointmentId>,
}

impl InvasionTask {
    pub fn new(id: TaskId, kind: InvasionTaskKind, target: Option<Entity>, launches: u32) -> Self {
        Self {
            id,
            kind,
            target,
            ufos: Vec::new(),
            launches_remaining: launches,
            launched: 0,
            pending_launch: None,
        }
    }

    pub fn ufos(&self) -> &[Entity] {
        &self.ufos
    }

    pub fn has_ufo(&self, ufo: Entity) -> bool {
        self.ufos.contains(&ufo)
    }

    /// Nothing in flight and nothing left to launch
    pub fn is_finished(&self) -> bool {
        self.ufos.is_empty() && self.launches_remaining == 0 && self.pending_launch.is_none()
    }

    pub fn add_ufo(&mut self, ufo: Entity, roster: &mut UfoRoster) {
        debug_assert!(!self.has_ufo(ufo), "UFO added to a task twice");
        self.ufos.push(ufo);
        roster.add(ufo);
    }

    pub fn remove_ufo(&mut self, ufo: Entity, roster: &mut UfoRoster) -> bool {
        let Some(index) = self.ufos.iter().position(|u| *u == ufo) else {
            return false;
        };
        self.ufos.remove(index);
        roster.remove(ufo);
        true
    }

    /// Step every UFO of the task. Walks the list backwards so a UFO that
    /// finishes can be removed on the spot.
    pub fn update(&mut self, ctx: &mut GeoContext<'_>, roster: &mut UfoRoster, ms: u64) {
        for index in (0..self.ufos.len()).rev() {
            let ufo = self.ufos[index];
            if update_craft(ctx, ufo, ms) == MissionOutcome::Continue {
                continue;
            }

            self.ufos.remove(index);
            roster.remove(ufo);
            if ctx.world.contains(ufo) {
                debug!(?ufo, task = %self.id, "UFO leaving");
                ctx.emit(GeoEventKind::UfoDeparted { ufo });
                ctx.retire_craft(ufo);
            }
        }
    }
}
