/*
 * Sleep/Wake Timer Queue
 *
 * Threads that sleep until a deadline are parked here, ordered by ascending
 * wake-up tick (FIFO among equal deadlines). Every timer tick wakes the due
 * prefix of the queue and stops at the first deadline still in the future.
 *
 * Why this is important:
 * - Sleeping threads consume no CPU and never sit in the ready collection
 * - The early exit keeps the per-tick cost proportional to the threads
 *   actually woken; it relies on the tick counter never moving backward
 */

use alloc::collections::VecDeque;

use super::{
    ThreadId,
    scheduler::{Scheduler, SwitchToken},
    types::Tick,
};

/// Deadline-ordered queue of sleeping threads
#[derive(Debug, Default)]
pub struct SleepQueue {
    entries: VecDeque<(Tick, ThreadId)>,
}

impl SleepQueue {
    pub fn new() -> Self {
        Self { entries: VecDeque::new() }
    }

    /// Insert after every entry with an earlier or equal deadline
    pub fn insert(&mut self, tid: ThreadId, deadline: Tick) {
        let pos = self
            .entries
            .iter()
            .position(|&(wake, _)| wake > deadline)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, (deadline, tid));
    }

    /// Pop the earliest sleeper if its deadline has passed
    pub fn pop_due(&mut self, now: Tick) -> Option<ThreadId> {
        match self.entries.front() {
            Some(&(wake, _)) if wake <= now => self.entries.pop_front().map(|(_, tid)| tid),
            _ => None,
        }
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Tick> {
        self.entries.front().map(|&(wake, _)| wake)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Scheduler {
    /// Park the running thread until `deadline`, then dispatch
    pub fn sleep_current(&mut self, deadline: Tick) -> Option<SwitchToken> {
        let cur = self.current().id;
        assert!(!self.registry.is_idle(cur), "sleep: idle thread cannot sleep");

        self.registry.thread_mut(cur).wake_time = deadline;
        self.sleepers.insert(cur, deadline);
        self.block_current()
    }

    /// Unblock every sleeper whose deadline is `<= now`
    ///
    /// Returns the number of threads woken.
    pub fn wake_sleepers(&mut self, now: Tick) -> usize {
        let mut woken = 0;
        while let Some(tid) = self.sleepers.pop_due(now) {
            self.unblock(tid);
            woken += 1;
        }
        woken
    }

    pub fn sleeping_count(&self) -> usize {
        self.sleepers.len()
    }

    pub fn next_wakeup(&self) -> Option<Tick> {
        self.sleepers.next_deadline()
    }
}
