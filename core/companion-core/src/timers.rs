//! Deferred actions for the tracker.
//!
//! Each action lives in a slot with its own generation counter. Scheduling
//! or cancelling a slot bumps the counter; an entry whose captured
//! generation no longer matches is dropped when it comes due, so a stale
//! timer can never apply against newer state.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerSlot {
    SessionLoad,
    ActivityRevert,
    Poll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredAction {
    LoadWorkingSet { session_id: String },
    RevertActivity,
    Poll,
}

impl DeferredAction {
    pub fn slot(&self) -> TimerSlot {
        match self {
            DeferredAction::LoadWorkingSet { .. } => TimerSlot::SessionLoad,
            DeferredAction::RevertActivity => TimerSlot::ActivityRevert,
            DeferredAction::Poll => TimerSlot::Poll,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    due: DateTime<Utc>,
    generation: u64,
    action: DeferredAction,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    generations: HashMap<TimerSlot, u64>,
    entries: Vec<Entry>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `action` at `now + delay`, superseding anything pending in
    /// the same slot. A deadline past the representable range saturates.
    pub fn schedule(&mut self, now: DateTime<Utc>, delay: Duration, action: DeferredAction) {
        let generation = self.bump(action.slot());
        self.entries.retain(|entry| entry.action.slot() != action.slot());
        self.entries.push(Entry {
            due: now.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC),
            generation,
            action,
        });
    }

    pub fn cancel(&mut self, slot: TimerSlot) {
        self.bump(slot);
        self.entries.retain(|entry| entry.action.slot() != slot);
    }

    pub fn cancel_all(&mut self) {
        for slot in [TimerSlot::SessionLoad, TimerSlot::ActivityRevert, TimerSlot::Poll] {
            self.cancel(slot);
        }
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.entries.iter().map(|entry| entry.due).min()
    }

    /// Removes and returns the earliest current entry due at or before
    /// `now`. Callers that fire actions one by one see cancellations made by
    /// earlier actions.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<DeferredAction> {
        loop {
            let index = self
                .entries
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.due <= now)
                .min_by_key(|(_, entry)| entry.due)
                .map(|(index, _)| index)?;
            let entry = self.entries.remove(index);
            if self.generation(entry.action.slot()) == entry.generation {
                return Some(entry.action);
            }
        }
    }

    fn generation(&self, slot: TimerSlot) -> u64 {
        self.generations.get(&slot).copied().unwrap_or(0)
    }

    fn bump(&mut self, slot: TimerSlot) -> u64 {
        let generation = self.generations.entry(slot).or_insert(0);
        *generation += 1;
        *generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fire_all(queue: &mut TimerQueue, now: DateTime<Utc>) -> Vec<DeferredAction> {
        std::iter::from_fn(|| queue.pop_due(now)).collect()
    }

    fn load(session_id: &str) -> DeferredAction {
        DeferredAction::LoadWorkingSet {
            session_id: session_id.to_string(),
        }
    }

    #[test]
    fn rescheduling_a_slot_supersedes_the_pending_entry() {
        let now = Utc::now();
        let mut queue = TimerQueue::new();
        queue.schedule(now, Duration::milliseconds(500), load("a"));
        queue.schedule(now, Duration::milliseconds(500), load("b"));

        let fired = fire_all(&mut queue, now + Duration::seconds(1));
        assert_eq!(fired, vec![load("b")]);
    }

    #[test]
    fn cancel_prevents_firing() {
        let now = Utc::now();
        let mut queue = TimerQueue::new();
        queue.schedule(now, Duration::milliseconds(100), DeferredAction::RevertActivity);
        queue.cancel(TimerSlot::ActivityRevert);

        assert!(fire_all(&mut queue, now + Duration::seconds(1)).is_empty());
        assert!(queue.next_deadline().is_none());
    }

    #[test]
    fn entries_not_yet_due_stay_queued() {
        let now = Utc::now();
        let mut queue = TimerQueue::new();
        queue.schedule(now, Duration::milliseconds(100), DeferredAction::RevertActivity);
        queue.schedule(now, Duration::seconds(2), DeferredAction::Poll);

        let fired = fire_all(&mut queue, now + Duration::milliseconds(100));
        assert_eq!(fired, vec![DeferredAction::RevertActivity]);
        assert_eq!(queue.next_deadline(), Some(now + Duration::seconds(2)));
    }

    #[test]
    fn due_entries_fire_in_deadline_order() {
        let now = Utc::now();
        let mut queue = TimerQueue::new();
        queue.schedule(now, Duration::milliseconds(300), DeferredAction::Poll);
        queue.schedule(now, Duration::milliseconds(100), load("a"));

        let fired = fire_all(&mut queue, now + Duration::seconds(1));
        assert_eq!(fired, vec![load("a"), DeferredAction::Poll]);
    }

    #[test]
    fn pop_due_sees_cancellations_between_pops() {
        let now = Utc::now();
        let mut queue = TimerQueue::new();
        queue.schedule(now, Duration::milliseconds(100), DeferredAction::Poll);
        queue.schedule(now, Duration::milliseconds(200), DeferredAction::RevertActivity);

        let later = now + Duration::seconds(1);
        assert_eq!(queue.pop_due(later), Some(DeferredAction::Poll));
        queue.cancel(TimerSlot::ActivityRevert);
        assert_eq!(queue.pop_due(later), None);
    }

    #[test]
    fn deadline_past_the_end_of_time_saturates() {
        let now = DateTime::<Utc>::MAX_UTC - Duration::seconds(1);
        let mut queue = TimerQueue::new();
        queue.schedule(now, Duration::days(2), DeferredAction::Poll);

        assert_eq!(queue.next_deadline(), Some(DateTime::<Utc>::MAX_UTC));
        assert_eq!(queue.pop_due(DateTime::<Utc>::MAX_UTC), Some(DeferredAction::Poll));
    }

    #[test]
    fn cancel_all_clears_every_slot() {
        let now = Utc::now();
        let mut queue = TimerQueue::new();
        queue.schedule(now, Duration::milliseconds(1), load("a"));
        queue.schedule(now, Duration::milliseconds(1), DeferredAction::Poll);
        queue.cancel_all();

        assert!(fire_all(&mut queue, now + Duration::seconds(1)).is_empty());
    }
}
