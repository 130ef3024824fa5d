//! GeoTime - the authoritative Geoscape clock
//!
//! `GeoTime` is the only thing allowed to move `now` forward. Each call to
//! [`GeoTime::add_milliseconds`]:
//! 1. advances `now`
//! 2. fires every due appointment through the [`ClockListener`]
//! 3. runs the repeating-activity ticker, once per period boundary crossed
//!
//! There is no internal cap on the step size. Keeping steps small enough is
//! the caller's job (see [`super::StepBounds`]).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::appointment::{AppointmentId, AppointmentKind, GameTime, GeoAppointment};
use super::scheduler::Scheduler;

/// Fixed-period background work layered on the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepeatingActivity {
    /// Docked craft are refuelled
    HangarService,
    /// The Overmind reviews its strategy
    AlienStrategy,
}

/// One "every N milliseconds, do Y" entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Cadence {
    pub activity: RepeatingActivity,
    pub period_ms: u64,
    /// Watermark: the next boundary that has not fired yet
    pub next_due: GameTime,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepeatingTicker {
    cadences: Vec<Cadence>,
}

impl RepeatingTicker {
    /// Register (or re-register) an activity, first due one period from `now`
    pub fn every(&mut self, activity: RepeatingActivity, period_ms: u64, now: GameTime) {
        debug_assert!(period_ms > 0, "repeating activity needs a non-zero period");
        let cadence = Cadence {
            activity,
            period_ms: period_ms.max(1),
            next_due: now.plus(period_ms.max(1)),
        };
        match self.cadences.iter_mut().find(|c| c.activity == activity) {
            Some(existing) => *existing = cadence,
            None => self.cadences.push(cadence),
        }
    }

    pub fn cadence(&self, activity: RepeatingActivity) -> Option<&Cadence> {
        self.cadences.iter().find(|c| c.activity == activity)
    }

    /// Earliest boundary at or before `now`; advances that cadence's watermark
    fn pop_due(&mut self, now: GameTime) -> Option<(RepeatingActivity, GameTime)> {
        let index = self
            .cadences
            .iter()
            .enumerate()
            .filter(|(_, c)| c.next_due <= now)
            .min_by_key(|(i, c)| (c.next_due, *i))
            .map(|(i, _)| i)?;

        let cadence = &mut self.cadences[index];
        let due = cadence.next_due;
        cadence.next_due = due.plus(cadence.period_ms);
        Some((cadence.activity, due))
    }
}

/// Current time plus the appointments waiting on it
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Agenda {
    now: GameTime,
    scheduler: Scheduler<AppointmentKind>,
}

impl Agenda {
    pub fn starting_at(now: GameTime) -> Self {
        Self {
            now,
            scheduler: Scheduler::new(),
        }
    }

    pub fn now(&self) -> GameTime {
        self.now
    }

    /// Schedule `kind` to happen `delay_ms` from now
    pub fn make_appointment(&mut self, delay_ms: u64, kind: AppointmentKind) -> AppointmentId {
        self.scheduler.schedule(self.now.plus(delay_ms), kind)
    }

    /// Cancel a pending appointment. Returns false if it already fired or was
    /// never scheduled; calling this twice is harmless.
    pub fn cancel(&mut self, id: AppointmentId) -> bool {
        self.scheduler.remove(id).is_some()
    }

    pub fn is_pending(&self, id: AppointmentId) -> bool {
        self.scheduler.contains(id)
    }

    pub fn scheduler(&self) -> &Scheduler<AppointmentKind> {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler<AppointmentKind> {
        &mut self.scheduler
    }

    fn fire_due<L: ClockListener + ?Sized>(&mut self, listener: &mut L) -> usize {
        let mut fired = 0;
        while let Some(appointment) = self.scheduler.pop_due(self.now) {
            listener.on_appointment(self, appointment);
            fired += 1;
        }
        fired
    }
}

/// Receives whatever the clock fires. The listener gets the agenda back so it
/// can schedule follow-ups; anything due immediately fires in the same call.
pub trait ClockListener {
    fn on_appointment(&mut self, agenda: &mut Agenda, appointment: GeoAppointment);

    fn on_repeating(&mut self, _agenda: &mut Agenda, _activity: RepeatingActivity, _due: GameTime) {
    }
}

/// What a single `add_milliseconds` call fired
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub appointments_fired: usize,
    pub activities_fired: usize,
}

impl std::ops::AddAssign for TickReport {
    fn add_assign(&mut self, other: Self) {
        self.appointments_fired += other.appointments_fired;
        self.activities_fired += other.activities_fired;
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GeoTime {
    agenda: Agenda,
    /// Game seconds per real second; zero means paused
    time_ratio: f64,
    ticker: RepeatingTicker,
}

impl GeoTime {
    pub fn new(time_ratio: f64) -> Self {
        Self::starting_at(GameTime::ZERO, time_ratio)
    }

    pub fn starting_at(now: GameTime, time_ratio: f64) -> Self {
        let mut time = Self {
            agenda: Agenda::starting_at(now),
            time_ratio: 0.0,
            ticker: RepeatingTicker::default(),
        };
        time.set_time_ratio(time_ratio);
        time
    }

    pub fn now(&self) -> GameTime {
        self.agenda.now
    }

    pub fn time_ratio(&self) -> f64 {
        self.time_ratio
    }

    /// Change speed. Takes effect from the next converted frame; negative or
    /// non-finite ratios pause.
    pub fn set_time_ratio(&mut self, ratio: f64) {
        self.time_ratio = if ratio.is_finite() { ratio.max(0.0) } else { 0.0 };
    }

    pub fn is_paused(&self) -> bool {
        self.time_ratio == 0.0
    }

    /// Convert a real frame delta into game milliseconds (`real * ratio`)
    pub fn real_time_to_game_time(&self, real: Duration) -> f64 {
        real.as_secs_f64() * self.time_ratio * 1000.0
    }

    /// Register a repeating activity, first due one period from now
    pub fn every(&mut self, activity: RepeatingActivity, period_ms: u64) {
        self.ticker.every(activity, period_ms, self.agenda.now);
    }

    pub fn ticker(&self) -> &RepeatingTicker {
        &self.ticker
    }

    pub fn agenda(&self) -> &Agenda {
        &self.agenda
    }

    pub fn agenda_mut(&mut self) -> &mut Agenda {
        &mut self.agenda
    }

    pub fn make_appointment(&mut self, delay_ms: u64, kind: AppointmentKind) -> AppointmentId {
        self.agenda.make_appointment(delay_ms, kind)
    }

    pub fn cancel(&mut self, id: AppointmentId) -> bool {
        self.agenda.cancel(id)
    }

    /// Advance the clock by `ms`, fire due appointments, then run the ticker.
    pub fn add_milliseconds<L: ClockListener + ?Sized>(
        &mut self,
        ms: u64,
        listener: &mut L,
    ) -> TickReport {
        self.agenda.now = self.agenda.now.plus(ms);

        let mut report = TickReport {
            appointments_fired: self.agenda.fire_due(listener),
            activities_fired: 0,
        };

        while let Some((activity, due)) = self.ticker.pop_due(self.agenda.now) {
            listener.on_repeating(&mut self.agenda, activity, due);
            report.activities_fired += 1;
            // Repeating work may schedule at zero delay
            report.appointments_fired += self.agenda.fire_due(listener);
        }

        report
    }
}
