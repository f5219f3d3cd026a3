/*
 * Thread Registry
 *
 * This module owns every thread control block together with the two
 * collections built on top of them:
 *
 * - all-threads list: every live thread, for enumeration (MLFQS, stats)
 * - ready collection: READY threads ordered by effective priority
 *
 * Why this is important:
 * - The front of the ready collection is always the best thread to run
 * - Equal priorities keep insertion order, so scheduling is FIFO within a level
 * - Lookup of the running thread verifies the control block sentinel on
 *   every access, catching stack overflows into the block
 *
 * All mutation happens with preemption disabled; the registry itself does no
 * locking.
 */

use alloc::{collections::{BTreeMap, VecDeque}, vec::Vec};

use super::{
    Thread, ThreadId, ThreadState,
    types::Priority,
};

// ============================================================================
// READY COLLECTION
// ============================================================================

/// Ready threads ordered by descending effective priority
///
/// Priorities are not cached here: the queue looks them up through the
/// closure passed by the caller, so a thread's priority has a single home.
#[derive(Debug, Default)]
pub struct ReadyQueue {
    entries: VecDeque<ThreadId>,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self { entries: VecDeque::new() }
    }

    /// Insert after every entry of equal or higher priority
    pub fn insert<F>(&mut self, tid: ThreadId, priority_of: F)
    where
        F: Fn(ThreadId) -> Priority,
    {
        let prio = priority_of(tid);
        let pos = self
            .entries
            .iter()
            .position(|&other| priority_of(other) < prio)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, tid);
    }

    pub fn pop_front(&mut self) -> Option<ThreadId> {
        self.entries.pop_front()
    }

    pub fn front(&self) -> Option<ThreadId> {
        self.entries.front().copied()
    }

    /// Remove a thread; returns whether it was queued
    pub fn remove(&mut self, tid: ThreadId) -> bool {
        match self.entries.iter().position(|&t| t == tid) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Restore order after priorities changed in bulk (stable)
    pub fn resort<F>(&mut self, priority_of: F)
    where
        F: Fn(ThreadId) -> Priority,
    {
        self.entries
            .make_contiguous()
            .sort_by(|&a, &b| priority_of(b).cmp(&priority_of(a)));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.entries.iter().copied()
    }
}

// ============================================================================
// THREAD REGISTRY
// ============================================================================

/// Thread table plus the all-threads and ready collections
pub struct Registry {
    threads: BTreeMap<ThreadId, Thread>,

    /// Registered threads, kept in priority order at insertion
    all: Vec<ThreadId>,

    pub(crate) ready: ReadyQueue,

    current: ThreadId,
    idle: Option<ThreadId>,
}

impl Registry {
    /// Create the registry around the thread that is already running
    pub fn new(mut initial: Thread) -> Self {
        initial.state = ThreadState::Running;
        let tid = initial.id;

        let mut threads = BTreeMap::new();
        threads.insert(tid, initial);

        let mut all = Vec::new();
        all.push(tid);

        Self {
            threads,
            all,
            ready: ReadyQueue::new(),
            current: tid,
            idle: None,
        }
    }

    /// Add a thread to the table and the all-threads list
    pub fn insert(&mut self, thread: Thread) {
        let tid = thread.id;
        let prio = thread.priority;
        assert!(
            !self.threads.contains_key(&tid),
            "registry: duplicate {}",
            tid
        );
        self.threads.insert(tid, thread);

        let threads = &self.threads;
        let pos = self
            .all
            .iter()
            .position(|other| threads[other].priority < prio)
            .unwrap_or(self.all.len());
        self.all.insert(pos, tid);
    }

    /// Drop a thread's control block
    pub fn remove(&mut self, tid: ThreadId) -> Option<Thread> {
        self.all.retain(|&t| t != tid);
        self.ready.remove(tid);
        self.threads.remove(&tid)
    }

    /// Take a thread out of the all-threads list, keeping its control block
    pub fn unlink(&mut self, tid: ThreadId) {
        self.all.retain(|&t| t != tid);
    }

    pub fn get(&self, tid: ThreadId) -> Option<&Thread> {
        self.threads.get(&tid)
    }

    pub fn get_mut(&mut self, tid: ThreadId) -> Option<&mut Thread> {
        self.threads.get_mut(&tid)
    }

    /// Look up a thread that must exist
    pub fn thread(&self, tid: ThreadId) -> &Thread {
        match self.threads.get(&tid) {
            Some(t) => t,
            None => panic!("registry: unknown {}", tid),
        }
    }

    /// Mutable lookup of a thread that must exist
    pub fn thread_mut(&mut self, tid: ThreadId) -> &mut Thread {
        match self.threads.get_mut(&tid) {
            Some(t) => t,
            None => panic!("registry: unknown {}", tid),
        }
    }

    pub fn current_id(&self) -> ThreadId {
        self.current
    }

    pub(crate) fn set_current(&mut self, tid: ThreadId) {
        self.current = tid;
    }

    /// The running thread, with its sentinel and state checked
    pub fn current_thread(&self) -> &Thread {
        let t = self.thread(self.current);
        assert!(t.is_valid(), "{}: control block corrupted (stack overflow?)", t.id);
        assert_eq!(t.state, ThreadState::Running, "{} is not running", t.id);
        t
    }

    pub fn idle_id(&self) -> Option<ThreadId> {
        self.idle
    }

    pub(crate) fn set_idle(&mut self, tid: ThreadId) {
        assert!(self.idle.is_none(), "registry: idle thread already registered");
        self.idle = Some(tid);
    }

    pub fn is_idle(&self, tid: ThreadId) -> bool {
        self.idle == Some(tid)
    }

    /// Registered thread ids in list order
    pub fn all_ids(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.all.iter().copied()
    }

    pub fn thread_count(&self) -> usize {
        self.all.len()
    }

    /// Visit every registered thread
    pub fn for_each<F: FnMut(&Thread)>(&self, mut f: F) {
        for tid in &self.all {
            f(&self.threads[tid]);
        }
    }

    /// Visit every registered thread mutably
    pub fn for_each_mut<F: FnMut(&mut Thread)>(&mut self, mut f: F) {
        for tid in &self.all {
            if let Some(t) = self.threads.get_mut(tid) {
                f(t);
            }
        }
    }

    // ========================================================================
    // READY COLLECTION
    // ========================================================================

    /// Mark READY and insert in priority order
    pub fn push_ready(&mut self, tid: ThreadId) {
        self.thread_mut(tid).state = ThreadState::Ready;
        let threads = &self.threads;
        self.ready.insert(tid, |t| threads[&t].priority);
    }

    /// Best ready thread, or the idle thread when nothing is ready
    pub fn next_to_run(&mut self) -> Option<ThreadId> {
        self.ready.pop_front().or(self.idle)
    }

    /// Restore a single thread's position after its priority changed
    pub fn reposition(&mut self, tid: ThreadId) {
        if self.ready.remove(tid) {
            let threads = &self.threads;
            self.ready.insert(tid, |t| threads[&t].priority);
        }
    }

    /// Restore ready order after bulk priority changes
    pub fn resort_ready(&mut self) {
        let threads = &self.threads;
        self.ready.resort(|t| threads[&t].priority);
    }

    /// Whether the front of the ready collection strictly outranks the running thread
    pub fn is_outranked(&self) -> bool {
        match self.ready.front() {
            Some(front) => self.thread(front).priority > self.thread(self.current).priority,
            None => false,
        }
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    pub fn ready_ids(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.ready.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        Registry::new(Thread::new(ThreadId(1), "main", Priority::DEFAULT, None))
    }

    fn add(reg: &mut Registry, id: usize, prio: i32) -> ThreadId {
        let tid = ThreadId(id);
        reg.insert(Thread::new(tid, "t", Priority(prio), None));
        tid
    }

    #[test]
    fn test_ready_front_has_max_priority() {
        let mut reg = registry();
        let prios = [5, 40, 12, 63, 0, 33];
        for (i, p) in prios.iter().enumerate() {
            let tid = add(&mut reg, 10 + i, *p);
            reg.push_ready(tid);

            let front = reg.ready.front().unwrap();
            let max = reg.ready_ids().map(|t| reg.thread(t).priority).max().unwrap();
            assert_eq!(reg.thread(front).priority, max);
        }
    }

    #[test]
    fn test_equal_priority_is_fifo() {
        let mut reg = registry();
        let a = add(&mut reg, 2, 20);
        let b = add(&mut reg, 3, 20);
        let c = add(&mut reg, 4, 30);
        reg.push_ready(a);
        reg.push_ready(b);
        reg.push_ready(c);
        let order: Vec<_> = reg.ready_ids().collect();
        assert_eq!(order, [c, a, b]);
    }

    #[test]
    fn test_reposition_after_priority_change() {
        let mut reg = registry();
        let a = add(&mut reg, 2, 10);
        let b = add(&mut reg, 3, 20);
        reg.push_ready(a);
        reg.push_ready(b);
        assert_eq!(reg.ready.front(), Some(b));

        reg.thread_mut(a).priority = Priority(50);
        reg.reposition(a);
        assert_eq!(reg.ready.front(), Some(a));

        // Not queued: nothing happens
        reg.reposition(ThreadId(1));
        assert_eq!(reg.ready_len(), 2);
    }

    #[test]
    fn test_resort_is_stable() {
        let mut reg = registry();
        let a = add(&mut reg, 2, 10);
        let b = add(&mut reg, 3, 20);
        let c = add(&mut reg, 4, 30);
        for t in [a, b, c] {
            reg.push_ready(t);
        }
        for t in [a, b, c] {
            reg.thread_mut(t).priority = Priority(15);
        }
        reg.resort_ready();
        let order: Vec<_> = reg.ready_ids().collect();
        assert_eq!(order, [c, b, a]);
    }

    #[test]
    fn test_next_falls_back_to_idle() {
        let mut reg = registry();
        assert_eq!(reg.next_to_run(), None);
        let idle = add(&mut reg, 2, 0);
        reg.set_idle(idle);
        assert_eq!(reg.next_to_run(), Some(idle));
    }

    #[test]
    fn test_outranked() {
        let mut reg = registry();
        let low = add(&mut reg, 2, 10);
        reg.push_ready(low);
        assert!(!reg.is_outranked());
        let high = add(&mut reg, 3, 40);
        reg.push_ready(high);
        assert!(reg.is_outranked());
    }

    #[test]
    #[should_panic(expected = "control block corrupted")]
    fn test_corrupted_sentinel_is_fatal() {
        let mut reg = registry();
        reg.thread_mut(ThreadId(1)).magic = 0;
        reg.current_thread();
    }
}
