//! Deferred work on the control thread.
//!
//! The session never spawns tasks of its own. Instead it registers sources here
//! and the controller asks for the next deadline, sleeps until then, and runs
//! whatever is due. Removing a source guarantees its task is never handed out
//! again, which is what teardown relies on.

use std::time::{Duration, Instant};

use slotmap::{SlotMap, new_key_type};
use tracing::trace;

new_key_type! {
    pub struct SourceId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Schedule {
    /// Runs on the next dispatch, then goes away.
    Idle,
    Once(Instant),
    Every { next: Instant, period: Duration },
}

impl Schedule {
    fn deadline(&self, now: Instant) -> Instant {
        match *self {
            Schedule::Idle => now,
            Schedule::Once(at) => at,
            Schedule::Every { next, .. } => next,
        }
    }
}

#[derive(Debug)]
struct Source<T> {
    schedule: Schedule,
    task: T,
}

#[derive(Debug)]
pub struct MainLoop<T> {
    sources: SlotMap<SourceId, Source<T>>,
}

impl<T> Default for MainLoop<T> {
    fn default() -> Self { Self { sources: SlotMap::with_key() } }
}

impl<T: Clone + std::fmt::Debug> MainLoop<T> {
    pub fn new() -> Self { Self::default() }

    pub fn add_idle(&mut self, task: T) -> SourceId {
        trace!(?task, "adding idle source");
        self.sources.insert(Source { schedule: Schedule::Idle, task })
    }

    pub fn add_timeout(&mut self, now: Instant, delay: Duration, task: T) -> SourceId {
        trace!(?task, ?delay, "adding timeout source");
        self.sources.insert(Source {
            schedule: Schedule::Once(now + delay),
            task,
        })
    }

    pub fn add_interval(&mut self, now: Instant, period: Duration, task: T) -> SourceId {
        trace!(?task, ?period, "adding interval source");
        self.sources.insert(Source {
            schedule: Schedule::Every { next: now + period, period },
            task,
        })
    }

    /// Returns whether the source was still registered.
    pub fn remove(&mut self, id: SourceId) -> bool { self.sources.remove(id).is_some() }

    pub fn is_pending(&self, id: SourceId) -> bool { self.sources.contains_key(id) }

    pub fn len(&self) -> usize { self.sources.len() }

    pub fn is_empty(&self) -> bool { self.sources.is_empty() }

    /// The earliest instant at which some source becomes due. Idle sources are
    /// due immediately.
    pub fn next_deadline(&self, now: Instant) -> Option<Instant> {
        self.sources.values().map(|s| s.schedule.deadline(now)).min()
    }

    /// Collects every task due at `now`, in deadline order.
    ///
    /// One-shot and idle sources are removed before their task is returned;
    /// interval sources are re-armed one period after `now`. A task that wants
    /// to stop its own interval removes it by id while handling the tick.
    pub fn due(&mut self, now: Instant) -> Vec<(SourceId, T)> {
        let mut ready: Vec<(Instant, SourceId)> = self
            .sources
            .iter()
            .map(|(id, s)| (s.schedule.deadline(now), id))
            .filter(|(deadline, _)| *deadline <= now)
            .collect();
        ready.sort();

        let mut tasks = Vec::with_capacity(ready.len());
        for (_, id) in ready {
            let Some(source) = self.sources.get_mut(id) else { continue };
            match source.schedule {
                Schedule::Idle | Schedule::Once(_) => {
                    if let Some(source) = self.sources.remove(id) {
                        tasks.push((id, source.task));
                    }
                }
                Schedule::Every { period, .. } => {
                    source.schedule = Schedule::Every { next: now + period, period };
                    tasks.push((id, source.task.clone()));
                }
            }
        }
        tasks
    }

    /// Cancels everything.
    pub fn clear(&mut self) { self.sources.clear(); }
}
