//! Scheduler - ordered collection of pending appointments
//!
//! Appointments fire in non-decreasing time order; equal times fire in the
//! order they were added. Firing may schedule more appointments, and any that
//! are already due fire within the same [`Scheduler::update`] call.
//!
//! Callers must not build a chain that keeps re-scheduling at the current
//! time forever: the scheduler does not guard against it.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::appointment::{Appointment, AppointmentId, GameTime};
use crate::error::{GeoError, GeoResult};

#[derive(Debug, Serialize, Deserialize)]
pub struct Scheduler<K> {
    /// Sorted by (occurs_at, seq)
    pending: VecDeque<Appointment<K>>,
    next_id: u64,
    next_seq: u64,
}

impl<K> Default for Scheduler<K> {
    fn default() -> Self {
        Self {
            pending: VecDeque::new(),
            next_id: 0,
            next_seq: 0,
        }
    }
}

impl<K> Scheduler<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an appointment with a fresh id, ready for [`Scheduler::add`]
    pub fn appointment(&mut self, occurs_at: GameTime, kind: K) -> Appointment<K> {
        let id = AppointmentId::new(self.next_id);
        self.next_id += 1;
        Appointment::new(id, occurs_at, kind)
    }

    /// Build and add in one go
    pub fn schedule(&mut self, occurs_at: GameTime, kind: K) -> AppointmentId {
        let appointment = self.appointment(occurs_at, kind);
        self.insert(appointment)
    }

    /// Insert in time order. Fails only if an appointment with the same id
    /// is already pending.
    pub fn add(&mut self, appointment: Appointment<K>) -> GeoResult<AppointmentId> {
        if self.contains(appointment.id()) {
            return Err(GeoError::AlreadyScheduled(appointment.id()));
        }
        Ok(self.insert(appointment))
    }

    fn insert(&mut self, mut appointment: Appointment<K>) -> AppointmentId {
        appointment.set_seq(self.next_seq);
        self.next_seq += 1;

        let id = appointment.id();
        let at = appointment.occurs_at();
        // After everything due at the same time or earlier
        let index = self.pending.partition_point(|p| p.occurs_at() <= at);
        self.pending.insert(index, appointment);
        id
    }

    /// Remove a pending appointment. Unknown or already-fired ids are ignored.
    pub fn remove(&mut self, id: AppointmentId) -> Option<Appointment<K>> {
        let index = self.pending.iter().position(|a| a.id() == id)?;
        self.pending.remove(index)
    }

    pub fn contains(&self, id: AppointmentId) -> bool {
        self.pending.iter().any(|a| a.id() == id)
    }

    /// Take the earliest appointment if it is due at `now`
    pub fn pop_due(&mut self, now: GameTime) -> Option<Appointment<K>> {
        if self.pending.front()?.occurs_at() <= now {
            self.pending.pop_front()
        } else {
            None
        }
    }

    /// Fire every appointment due at `now`, including ones scheduled by
    /// earlier firings in this same call. Returns how many fired.
    pub fn update<F>(&mut self, now: GameTime, mut fire: F) -> usize
    where
        F: FnMut(&mut Self, Appointment<K>),
    {
        let mut fired = 0;
        while let Some(appointment) = self.pop_due(now) {
            fire(self, appointment);
            fired += 1;
        }
        fired
    }

    /// When the next appointment comes due
    pub fn next_due(&self) -> Option<GameTime> {
        self.pending.front().map(|a| a.occurs_at())
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pending appointments in firing order
    pub fn iter(&self) -> impl Iterator<Item = &Appointment<K>> {
        self.pending.iter()
    }

    #[cfg(test)]
    fn is_sorted(&self) -> bool {
        self.pending
            .iter()
            .zip(self.pending.iter().skip(1))
            .all(|(a, b)| (a.occurs_at(), a.seq()) < (b.occurs_at(), b.seq()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: u64) -> GameTime {
        GameTime::from_millis(ms)
    }

    #[test]
    fn test_fires_in_time_order() {
        let mut scheduler = Scheduler::new();
        for (ms, tag) in [(300, 3), (100, 1), (500, 5), (200, 2), (400, 4)] {
            scheduler.schedule(at(ms), tag);
        }
        assert!(scheduler.is_sorted());

        let mut fired = Vec::new();
        let count = scheduler.update(at(500), |_, a| fired.push(a.into_kind()));

        assert_eq!(count, 5);
        assert_eq!(fired, vec![1, 2, 3, 4, 5]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_ties_fire_in_insertion_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(at(100), "late");
        scheduler.schedule(at(50), "first-at-50");
        scheduler.schedule(at(50), "second-at-50");
        scheduler.schedule(at(50), "third-at-50");

        let mut fired = Vec::new();
        scheduler.update(at(100), |_, a| fired.push(*a.kind()));

        assert_eq!(
            fired,
            vec!["first-at-50", "second-at-50", "third-at-50", "late"]
        );
    }

    #[test]
    fn test_only_due_appointments_fire() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(at(100), 1);
        scheduler.schedule(at(101), 2);

        let mut fired = Vec::new();
        scheduler.update(at(100), |_, a| fired.push(a.into_kind()));
        assert_eq!(fired, vec![1]);
        assert_eq!(scheduler.next_due(), Some(at(101)));
    }

    #[test]
    fn test_never_fires_twice() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(at(10), 1);
        scheduler.schedule(at(20), 2);

        let mut fired = Vec::new();
        for now in [5, 10, 10, 15, 20, 20, 1000] {
            scheduler.update(at(now), |_, a| fired.push(a.into_kind()));
        }
        assert_eq!(fired, vec![1, 2]);
    }

    #[test]
    fn test_removed_appointment_never_fires() {
        let mut scheduler = Scheduler::new();
        let keep = scheduler.schedule(at(10), 1);
        let cancel = scheduler.schedule(at(20), 2);

        assert!(scheduler.remove(cancel).is_some());
        // Second removal is a no-op
        assert!(scheduler.remove(cancel).is_none());

        let mut fired = Vec::new();
        scheduler.update(at(100), |_, a| fired.push(a.into_kind()));
        assert_eq!(fired, vec![1]);

        // Removing something that already fired is also a no-op
        assert!(scheduler.remove(keep).is_none());
    }

    #[test]
    fn test_zero_delay_chain_fires_in_same_update() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(at(100), 0u32);

        let mut fired = Vec::new();
        scheduler.update(at(100), |s, a| {
            let depth = a.into_kind();
            fired.push(depth);
            if depth < 3 {
                s.schedule(at(100), depth + 1);
            }
        });

        assert_eq!(fired, vec![0, 1, 2, 3]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_chained_future_appointment_waits() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(at(100), 0u32);

        let mut fired = Vec::new();
        scheduler.update(at(100), |s, a| {
            fired.push(a.into_kind());
            s.schedule(at(150), 1);
        });
        assert_eq!(fired, vec![0]);
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn test_add_rejects_pending_duplicate() {
        let mut scheduler = Scheduler::new();
        let appointment = scheduler.appointment(at(10), 1);
        let id = scheduler.add(appointment).unwrap();

        let duplicate = Appointment::new(id, at(30), 2);
        assert!(matches!(
            scheduler.add(duplicate),
            Err(GeoError::AlreadyScheduled(dup)) if dup == id
        ));

        // Once removed, the same appointment may be scheduled again
        let removed = scheduler.remove(id).unwrap();
        assert_eq!(scheduler.add(removed).unwrap(), id);
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn test_readded_appointment_goes_behind_equal_times() {
        let mut scheduler = Scheduler::new();
        let a = scheduler.schedule(at(10), "a");
        scheduler.schedule(at(10), "b");

        let removed = scheduler.remove(a).unwrap();
        scheduler.add(removed).unwrap();

        let mut fired = Vec::new();
        scheduler.update(at(10), |_, x| fired.push(*x.kind()));
        assert_eq!(fired, vec!["b", "a"]);
    }

    #[test]
    fn test_serialization_preserves_order_and_ids() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(at(30), 3u32);
        scheduler.schedule(at(10), 1u32);
        scheduler.schedule(at(10), 2u32);

        let bytes = bincode::serialize(&scheduler).unwrap();
        let mut restored: Scheduler<u32> = bincode::deserialize(&bytes).unwrap();

        // New ids continue after the saved ones
        let next = restored.schedule(at(40), 4);
        assert_eq!(next.raw(), 3);

        let mut fired = Vec::new();
        restored.update(at(100), |_, a| fired.push(a.into_kind()));
        assert_eq!(fired, vec![1, 2, 3, 4]);
    }
}
