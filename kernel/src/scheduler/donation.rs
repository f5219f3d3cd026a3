/*
 * Priority Donation
 *
 * This module keeps the donation-relevant state of every lock and implements
 * the protocol that lifts a lock holder to the priority of its most important
 * waiter. Lock acquire/release mechanics live in the synchronization layer;
 * it calls the hooks below at the matching points.
 *
 * Protocol:
 * - lock_contended: the running thread is about to block on a held lock.
 *   The lock's max waiter priority is raised and the holder recomputed
 *   (and repositioned in the ready collection if it is READY).
 * - lock_acquired: the running thread now owns the lock. The lock's max
 *   waiter priority is rebuilt from whoever still waits on it.
 * - lock_released: ownership is dropped and the releaser falls back to
 *   max(base, donations from the locks it still holds).
 *
 * Donation is single-level: a holder sees only direct waiters on locks it
 * owns. If B holds L2 and waits on L1 held by A, a donation to B through L2
 * does not reach A.
 *
 * Under MLFQS priorities are derived, so donation and set_priority do nothing.
 */

use alloc::collections::BTreeMap;

use super::{
    ThreadId, ThreadState,
    scheduler::Scheduler,
    types::{LockId, Priority},
};

/// Donation-relevant state of one lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRecord {
    /// Current owner, if any
    pub holder: Option<ThreadId>,

    /// Highest effective priority among threads waiting for the lock
    /// (`Priority::MIN` when none)
    pub max_waiter_priority: Priority,
}

impl LockRecord {
    const fn new() -> Self {
        Self {
            holder: None,
            max_waiter_priority: Priority::MIN,
        }
    }
}

/// Lock donation table keyed by lock id
#[derive(Debug, Default)]
pub struct LockTable {
    locks: BTreeMap<LockId, LockRecord>,
    next_id: usize,
}

impl LockTable {
    pub fn new() -> Self {
        Self {
            locks: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Allocate an id for a new lock
    pub fn register(&mut self) -> LockId {
        let id = LockId(self.next_id);
        self.next_id += 1;
        self.locks.insert(id, LockRecord::new());
        id
    }

    pub fn unregister(&mut self, id: LockId) -> Option<LockRecord> {
        self.locks.remove(&id)
    }

    pub fn get(&self, id: LockId) -> Option<&LockRecord> {
        self.locks.get(&id)
    }

    fn record_mut(&mut self, id: LockId) -> &mut LockRecord {
        match self.locks.get_mut(&id) {
            Some(r) => r,
            None => panic!("donation: unknown {}", id),
        }
    }
}

impl Scheduler {
    // ========================================================================
    // PRIORITY CHANGES
    // ========================================================================

    /// Set the running thread's base priority
    ///
    /// Ignored under MLFQS. A lowered priority never forces a switch; the
    /// next scheduling point picks up the change.
    pub fn set_priority(&mut self, new_base: Priority) {
        if self.policy.priority_is_derived() {
            return;
        }
        assert!(new_base.is_valid(), "set_priority: invalid priority {}", new_base);

        let cur = self.current().id;
        let thread = self.registry.thread_mut(cur);
        thread.base_priority = new_base;
        if thread.owned_locks.is_empty() || new_base > thread.priority {
            thread.priority = new_base;
        }
    }

    /// Effective priority from base and the locks a thread holds
    pub fn recompute(&mut self, tid: ThreadId) {
        if self.policy.priority_is_derived() {
            return;
        }
        let thread = self.registry.thread(tid);
        let donated = thread
            .owned_locks
            .iter()
            .filter_map(|l| self.locks.get(*l))
            .map(|r| r.max_waiter_priority)
            .max()
            .unwrap_or(Priority::MIN);
        let effective = thread.base_priority.max(donated);
        self.registry.thread_mut(tid).priority = effective;
    }

    /// Recompute `tid` and make the new priority visible to dispatch at once
    pub fn donate_to(&mut self, tid: ThreadId) {
        if self.policy.priority_is_derived() {
            return;
        }
        let before = self.registry.thread(tid).priority;
        self.recompute(tid);
        let after = self.registry.thread(tid).priority;
        log::trace!("donation: {} priority {} -> {}", tid, before, after);

        if self.registry.thread(tid).state == ThreadState::Ready {
            self.registry.reposition(tid);
        }
    }

    // ========================================================================
    // LOCK HOOKS
    // ========================================================================

    pub fn register_lock(&mut self) -> LockId {
        self.locks.register()
    }

    pub fn unregister_lock(&mut self, lock: LockId) {
        if let Some(record) = self.locks.unregister(lock) {
            assert!(record.holder.is_none(), "unregister: {} is still held", lock);
        }
    }

    pub fn lock_record(&self, lock: LockId) -> Option<&LockRecord> {
        self.locks.get(lock)
    }

    /// The running thread is about to wait for `lock`
    pub fn lock_contended(&mut self, lock: LockId) {
        let cur = self.current().id;
        let prio = self.registry.thread(cur).priority;
        self.registry.thread_mut(cur).waiting_lock = Some(lock);

        let record = self.locks.record_mut(lock);
        if prio > record.max_waiter_priority {
            record.max_waiter_priority = prio;
        }
        if let Some(holder) = record.holder {
            self.donate_to(holder);
        }
    }

    /// The running thread now holds `lock`
    pub fn lock_acquired(&mut self, lock: LockId) {
        let cur = self.current().id;
        {
            let thread = self.registry.thread_mut(cur);
            thread.waiting_lock = None;
            if !thread.owned_locks.contains(&lock) {
                thread.owned_locks.push(lock);
            }
        }

        let mut max_waiter = Priority::MIN;
        self.registry.for_each(|t| {
            if t.waiting_lock == Some(lock) && t.priority > max_waiter {
                max_waiter = t.priority;
            }
        });

        let record = self.locks.record_mut(lock);
        record.holder = Some(cur);
        record.max_waiter_priority = max_waiter;

        self.recompute(cur);
    }

    /// The running thread gave `lock` up
    pub fn lock_released(&mut self, lock: LockId) {
        let cur = self.current().id;
        self.registry.thread_mut(cur).owned_locks.retain(|&l| l != lock);

        let record = self.locks.record_mut(lock);
        assert_eq!(record.holder, Some(cur), "release: {} not held by {}", lock, cur);
        record.holder = None;

        self.recompute(cur);
    }
}
