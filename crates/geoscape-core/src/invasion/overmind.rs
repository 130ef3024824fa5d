//! The Overmind - alien strategy
//!
//! Keeps the list of running invasion tasks and the master roster of UFOs on
//! the map. Every UFO in the roster belongs to exactly one task and every
//! task's UFO is in the roster.

use hecs::{Entity, World};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::task::{InvasionTask, InvasionTaskKind, TaskId};
use crate::components::{Craft, GeoPosition, Site, SiteKind, Ufo};
use crate::events::GeoEventKind;
use crate::mission::{GeoContext, Mission, MissionKind};
use crate::time::AppointmentKind;

/// Master list of UFOs on the map
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UfoRoster {
    ufos: Vec<Entity>,
}

impl UfoRoster {
    pub fn add(&mut self, ufo: Entity) {
        debug_assert!(!self.contains(ufo), "UFO already on the roster");
        self.ufos.push(ufo);
    }

    pub fn remove(&mut self, ufo: Entity) -> bool {
        let before = self.ufos.len();
        self.ufos.retain(|u| *u != ufo);
        self.ufos.len() != before
    }

    pub fn contains(&self, ufo: Entity) -> bool {
        self.ufos.contains(&ufo)
    }

    pub fn len(&self) -> usize {
        self.ufos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ufos.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.ufos.iter().copied()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Overmind {
    tasks: Vec<InvasionTask>,
    ufos: UfoRoster,
    next_task_id: u32,
    ufos_launched: u32,
}

impl Overmind {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything and open with a single research task
    pub fn start_new_game(&mut self, ctx: &mut GeoContext<'_>) {
        for task in self.tasks.drain(..) {
            if let Some(launch) = task.pending_launch {
                ctx.agenda.cancel(launch);
            }
        }
        self.ufos = UfoRoster::default();
        self.next_task_id = 0;
        self.ufos_launched = 0;

        self.start_task(ctx, InvasionTaskKind::Research, None);
    }

    pub fn tasks(&self) -> &[InvasionTask] {
        &self.tasks
    }

    pub fn task(&self, id: TaskId) -> Option<&InvasionTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn ufos(&self) -> &UfoRoster {
        &self.ufos
    }

    /// Open a task and schedule its first launch
    pub fn start_task(
        &mut self,
        ctx: &mut GeoContext<'_>,
        kind: InvasionTaskKind,
        target: Option<Entity>,
    ) -> TaskId {
        let id = TaskId::new(self.next_task_id);
        self.next_task_id += 1;

        let mut task = InvasionTask::new(id, kind, target, kind.launches(ctx.config));
        if task.launches_remaining > 0 {
            let delay = ctx.config.first_launch_delay_ms;
            task.pending_launch = Some(
                ctx.agenda
                    .make_appointment(delay, AppointmentKind::LaunchUfo { task: id }),
            );
        }

        let target_name = target
            .and_then(|t| ctx.world.get::<&Site>(t).ok().map(|s| s.name.clone()));
        let description = match &target_name {
            Some(name) => format!("{} against {}", kind.name(), name),
            None => kind.name().to_string(),
        };
        info!(task = %id, %description, "invasion task started");
        ctx.emit(GeoEventKind::InvasionTaskStarted {
            task: id.raw(),
            description,
        });

        self.tasks.push(task);
        id
    }

    /// Step every task. Walks backwards so a finished task can be removed at
    /// its own index without disturbing the ones still to visit.
    pub fn update(&mut self, ctx: &mut GeoContext<'_>, ms: u64) {
        for index in (0..self.tasks.len()).rev() {
            self.tasks[index].update(ctx, &mut self.ufos, ms);
            if self.tasks[index].is_finished() {
                let task = self.tasks.remove(index);
                info!(task = %task.id, kind = task.kind.name(), "invasion task complete");
            }
        }
    }

    /// Handle a `LaunchUfo` appointment
    pub fn launch_ufo(&mut self, ctx: &mut GeoContext<'_>, id: TaskId) -> Option<Entity> {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            warn!(task = %id, "launch for a task that no longer exists");
            return None;
        };
        task.pending_launch = None;
        if task.launches_remaining == 0 {
            warn!(task = %id, "launch with nothing left to launch");
            return None;
        }

        task.launches_remaining -= 1;
        let class = task.kind.ufo_class(task.launched);
        task.launched += 1;
        self.ufos_launched += 1;

        let position = GeoPosition::random_on_globe(ctx.rng);
        let name = format!("UFO-{}", self.ufos_launched);
        let ufo = ctx
            .world
            .spawn((Craft::ufo(name, class, position), Ufo::new(class, id)));

        let kind = MissionKind::Ufo(task.kind.ufo_mission(ctx.config, task.target));
        let mission = Mission::start(ctx, ufo, kind);
        let _ = ctx.world.insert_one(ufo, mission);
        task.add_ufo(ufo, &mut self.ufos);

        if task.launches_remaining > 0 {
            let delay = ctx.config.launch_interval_ms;
            task.pending_launch = Some(
                ctx.agenda
                    .make_appointment(delay, AppointmentKind::LaunchUfo { task: id }),
            );
        }

        debug!(?ufo, task = %id, class = class.name(), "UFO launched");
        Some(ufo)
    }

    /// Take a UFO off both rosters. Returns the task it belonged to.
    pub fn remove_ufo(&mut self, ufo: Entity) -> Option<TaskId> {
        let task = self.tasks.iter_mut().find(|t| t.has_ufo(ufo))?;
        task.remove_ufo(ufo, &mut self.ufos);
        Some(task.id)
    }

    /// Daily strategy: maybe open a new task, respecting the cap
    pub fn daily_review(&mut self, ctx: &mut GeoContext<'_>) -> Option<TaskId> {
        if self.tasks.len() >= ctx.config.max_concurrent_tasks {
            return None;
        }
        if !ctx.rng.gen_bool(ctx.config.new_task_chance) {
            return None;
        }

        let (kind, target) = match ctx.rng.gen_range(0..4) {
            1 => (InvasionTaskKind::Terror, ctx.random_site(SiteKind::City)),
            2 => match ctx.random_site(SiteKind::AlienOutpost) {
                Some(outpost) => (InvasionTaskKind::Supply, Some(outpost)),
                None => (InvasionTaskKind::Infiltration, ctx.random_site(SiteKind::City)),
            },
            3 => (InvasionTaskKind::Infiltration, ctx.random_site(SiteKind::City)),
            _ => (InvasionTaskKind::Research, None),
        };

        // No target to aim at: scout instead
        let (kind, target) = match (kind, target) {
            (InvasionTaskKind::Research, _) => (kind, None),
            (_, None) => (InvasionTaskKind::Research, None),
            other => other,
        };
        Some(self.start_task(ctx, kind, target))
    }

    /// A UFO was brought down by a craft from `base`; maybe strike back
    pub fn on_ufo_shot_down(
        &mut self,
        ctx: &mut GeoContext<'_>,
        base: Option<Entity>,
    ) -> Option<TaskId> {
        let base = base?;
        let already = self
            .tasks
            .iter()
            .any(|t| t.kind == InvasionTaskKind::Retaliation && t.target == Some(base));
        if already || self.tasks.len() >= ctx.config.max_concurrent_tasks {
            return None;
        }
        if !ctx.rng.gen_bool(ctx.config.retaliation_chance) {
            return None;
        }
        Some(self.start_task(ctx, InvasionTaskKind::Retaliation, Some(base)))
    }

    /// Both rosters agree and every UFO is alive
    pub fn is_consistent(&self, world: &World) -> bool {
        let in_tasks: usize = self.tasks.iter().map(|t| t.ufos().len()).sum();
        in_tasks == self.ufos.len()
            && self.ufos.iter().all(|ufo| {
                world.contains(ufo) && self.tasks.iter().filter(|t| t.has_ufo(ufo)).count() == 1
            })
    }
}
