//! Transport time and periodic task scheduling.
//!
//! Tasks are callbacks that receive a context and the scheduled fire time,
//! and return the interval until their next firing. Returning a different
//! value each time is how cadences follow the scene.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Shortest interval a task can ask for. Guards against a zero cadence
/// spinning the transport.
pub const MIN_INTERVAL: f64 = 1e-3;

/// Source of transport time, in seconds.
pub trait Clock {
    fn now(&self) -> f64;
}

/// Manually advanced clock for offline rendering and tests.
#[derive(Debug, Default, Clone)]
pub struct PlaybackClock {
    pub time_seconds: f64,
}

impl PlaybackClock {
    pub fn reset(&mut self) {
        self.time_seconds = 0.0;
    }

    pub fn advance(&mut self, delta: f64) {
        self.time_seconds = (self.time_seconds + delta).max(0.0);
    }
}

impl Clock for PlaybackClock {
    fn now(&self) -> f64 {
        self.time_seconds
    }
}

/// Wall clock measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::start()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(u64);

/// Callback run by a [`Scheduler`]. Returns seconds until the next run.
pub type PeriodicTask<C> = Box<dyn FnMut(&mut C, f64) -> f64>;

pub trait Scheduler<C> {
    /// Current transport time.
    fn now(&self) -> f64;

    /// Runs `task` first at `first_at`, then again after whatever interval
    /// each run returns.
    fn schedule_at(&mut self, first_at: f64, task: PeriodicTask<C>) -> TaskId;

    /// Runs `task` every `interval` seconds starting one interval from now.
    /// The task's return value still overrides later intervals.
    fn schedule_periodic(&mut self, interval: f64, task: PeriodicTask<C>) -> TaskId {
        let first = self.now() + interval.max(MIN_INTERVAL);
        self.schedule_at(first, task)
    }

    /// Returns whether the task existed.
    fn cancel(&mut self, id: TaskId) -> bool;
}

struct Entry<C> {
    id: TaskId,
    due: f64,
    task: PeriodicTask<C>,
}

/// Virtual-time scheduler. Nothing fires until the host calls
/// [`Transport::advance_to`]; due tasks then run in time order, ties in
/// scheduling order, each seeing its exact due time.
pub struct Transport<C> {
    now: f64,
    next_id: u64,
    entries: Vec<Entry<C>>,
}

impl<C> Default for Transport<C> {
    fn default() -> Self {
        Self {
            now: 0.0,
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

impl<C> Transport<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    /// Earliest due time among scheduled tasks.
    pub fn next_due(&self) -> Option<f64> {
        self.entries.iter().map(|e| e.due).reduce(f64::min)
    }

    /// Runs every task due at or before `until` and moves the transport
    /// there. Time never moves backwards. Returns the number of runs.
    pub fn advance_to(&mut self, ctx: &mut C, until: f64) -> usize {
        let mut fired = 0;
        while let Some(idx) = self.earliest_due_by(until) {
            let entry = &mut self.entries[idx];
            let due = entry.due;
            self.now = self.now.max(due);
            let interval = (entry.task)(ctx, due);
            entry.due = due + interval.max(MIN_INTERVAL);
            fired += 1;
        }
        self.now = self.now.max(until);
        fired
    }

    fn earliest_due_by(&self, until: f64) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.due <= until)
            .min_by(|(_, a), (_, b)| a.due.total_cmp(&b.due).then(a.id.cmp(&b.id)))
            .map(|(i, _)| i)
    }
}

impl<C> Scheduler<C> for Transport<C> {
    fn now(&self) -> f64 {
        self.now
    }

    fn schedule_at(&mut self, first_at: f64, task: PeriodicTask<C>) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            due: first_at.max(self.now),
            task,
        });
        id
    }

    fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }
}

impl<C> std::fmt::Debug for Transport<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("now", &self.now)
            .field("pending", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playback_clock_advances_and_resets() {
        let mut clock = PlaybackClock::default();
        clock.advance(1.5);
        clock.advance(-4.0);
        assert_eq!(clock.now(), 0.0);
        clock.advance(2.0);
        assert_eq!(clock.now(), 2.0);
        clock.reset();
        assert_eq!(clock.now(), 0.0);
    }

    #[test]
    fn fires_in_time_order_with_dynamic_intervals() {
        let mut transport: Transport<Vec<(char, f64)>> = Transport::new();
        transport.schedule_at(
            0.0,
            Box::new(|log, t| {
                log.push(('a', t));
                1.0
            }),
        );
        transport.schedule_at(
            0.5,
            Box::new(|log, t| {
                log.push(('b', t));
                if t < 1.0 {
                    2.0
                } else {
                    0.25
                }
            }),
        );

        let mut log = Vec::new();
        let fired = transport.advance_to(&mut log, 3.0);
        assert_eq!(fired, log.len());
        assert_eq!(
            log,
            vec![
                ('a', 0.0),
                ('b', 0.5),
                ('a', 1.0),
                ('a', 2.0),
                ('b', 2.5),
                ('b', 2.75),
                ('a', 3.0),
                ('b', 3.0),
            ]
        );
        assert_eq!(transport.now(), 3.0);
    }

    #[test]
    fn cancelled_tasks_never_fire() {
        let mut transport: Transport<u32> = Transport::new();
        let id = transport.schedule_periodic(
            0.1,
            Box::new(|count, _| {
                *count += 1;
                0.1
            }),
        );
        let mut count = 0;
        transport.advance_to(&mut count, 0.35);
        assert_eq!(count, 3);

        assert!(transport.cancel(id));
        assert!(!transport.cancel(id));
        transport.advance_to(&mut count, 10.0);
        assert_eq!(count, 3);
        assert_eq!(transport.pending(), 0);
    }

    #[test]
    fn time_does_not_run_backwards() {
        let mut transport: Transport<()> = Transport::new();
        transport.advance_to(&mut (), 5.0);
        transport.advance_to(&mut (), 2.0);
        assert_eq!(transport.now(), 5.0);

        transport.schedule_at(1.0, Box::new(|_, _| 1.0));
        assert_eq!(transport.next_due(), Some(5.0));
    }

    #[test]
    fn zero_interval_is_floored() {
        let mut transport: Transport<u32> = Transport::new();
        transport.schedule_at(
            0.0,
            Box::new(|count, _| {
                *count += 1;
                0.0
            }),
        );
        let mut count = 0;
        transport.advance_to(&mut count, 0.01);
        assert!(count <= 11);
    }
}
