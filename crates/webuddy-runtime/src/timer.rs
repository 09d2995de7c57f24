#![forbid(unsafe_code)]

//! Deterministic timer queue.
//!
//! Every deferred or periodic callback the engine needs is an entry in one
//! [`TimerQueue`]. The host advances time; the engine pops due entries one at
//! a time so that a handler can cancel or schedule timers before the next one
//! is considered.
//!
//! # Invariants
//!
//! 1. Entries fire in `(deadline, id)` order; ids grow monotonically, so ties
//!    resolve in scheduling order.
//! 2. A cancelled entry never fires.
//! 3. After [`TimerQueue::clear`] nothing fires until something is scheduled
//!    again.
//! 4. A periodic entry keeps its id across repeats and is rescheduled from
//!    its previous deadline, not from the time it was popped.
//! 5. [`TimerQueue::postpone_all`] moves every deadline by the same amount,
//!    so firing order and the spacing between entries are unchanged.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Smallest period accepted for repeating timers.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Handle to a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// A timer that came due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired<K> {
    pub id: TimerId,
    pub kind: K,
    /// The deadline the timer was scheduled for.
    pub at: Duration,
}

#[derive(Debug, Clone)]
struct Entry<K> {
    kind: K,
    period: Option<Duration>,
}

/// Ordered set of pending timers keyed by deadline.
#[derive(Debug, Clone)]
pub struct TimerQueue<K> {
    next_id: u64,
    pending: BTreeMap<(Duration, TimerId), Entry<K>>,
    deadlines: HashMap<TimerId, Duration>,
}

impl<K> Default for TimerQueue<K> {
    fn default() -> Self {
        Self {
            next_id: 0,
            pending: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }
}

impl<K: Copy> TimerQueue<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire `kind` once, `delay` after `now`.
    pub fn once(&mut self, now: Duration, delay: Duration, kind: K) -> TimerId {
        self.insert(now.saturating_add(delay), kind, None)
    }

    /// Fire `kind` every `period`, first at `now + period`.
    pub fn every(&mut self, now: Duration, period: Duration, kind: K) -> TimerId {
        let period = period.max(MIN_PERIOD);
        self.insert(now.saturating_add(period), kind, Some(period))
    }

    /// Cancel a timer. Returns whether it was still pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.deadlines.remove(&id) {
            Some(deadline) => self.pending.remove(&(deadline, id)).is_some(),
            None => false,
        }
    }

    /// Cancel the timer in `slot`, if any, and empty the slot.
    pub fn cancel_slot(&mut self, slot: &mut Option<TimerId>) {
        if let Some(id) = slot.take() {
            self.cancel(id);
        }
    }

    /// Cancel everything.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.deadlines.clear();
    }

    #[must_use]
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.deadlines.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Deadline of the earliest pending timer.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.pending.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Kinds of all pending timers in firing order.
    pub fn kinds(&self) -> impl Iterator<Item = K> + '_ {
        self.pending.values().map(|entry| entry.kind)
    }

    /// Push every pending deadline `by` later.
    pub fn postpone_all(&mut self, by: Duration) {
        if by.is_zero() {
            return;
        }
        let pending = std::mem::take(&mut self.pending);
        self.pending = pending
            .into_iter()
            .map(|((deadline, id), entry)| ((deadline.saturating_add(by), id), entry))
            .collect();
        for deadline in self.deadlines.values_mut() {
            *deadline = deadline.saturating_add(by);
        }
    }

    /// Pop the earliest timer due at or before `now`.
    ///
    /// Periodic timers are re-inserted at their next deadline before being
    /// returned.
    pub fn pop_due(&mut self, now: Duration) -> Option<Fired<K>> {
        let (&(deadline, id), _) = self.pending.iter().next()?;
        if deadline > now {
            return None;
        }
        let entry = self.pending.remove(&(deadline, id))?;
        self.deadlines.remove(&id);

        if let Some(period) = entry.period {
            let next = deadline.saturating_add(period);
            self.pending.insert((next, id), entry.clone());
            self.deadlines.insert(id, next);
        }

        Some(Fired {
            id,
            kind: entry.kind,
            at: deadline,
        })
    }

    fn insert(&mut self, deadline: Duration, kind: K, period: Option<Duration>) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.insert((deadline, id), Entry { kind, period });
        self.deadlines.insert(id, deadline);
        id
    }
}
