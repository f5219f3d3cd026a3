/*
 * Scheduler State Machine
 *
 * This module contains the Scheduler struct: the single owner of every piece
 * of scheduler state (thread registry, ready and sleeping collections, lock
 * donation table, policy, statistics). It is a pure state machine; it never
 * touches the CPU. Operations that give up the CPU return a SwitchToken
 * describing the switch, and the manager performs it.
 *
 * THREAD LIFECYCLE:
 * ================
 *
 *   create -> Blocked --unblock--> Ready --schedule--> Running
 *                ^                   ^                    |
 *                |                   +------yield---------+
 *                +----------block/sleep-------------------+
 *                                                         |
 *                                   Dying <----exit-------+
 *                                     |
 *                                     +--> reclaimed by the next thread
 *
 * TWO-PHASE SWITCH:
 * =================
 *
 * 1. block/yield/exit mark the running thread and pick the next one. If the
 *    next thread is the current one, the switch is finished on the spot and
 *    no token is returned.
 * 2. Otherwise the manager switches stacks. Whichever thread resumes calls
 *    finish_switch() with a PrevThread handle for the thread it came from,
 *    which marks itself RUNNING, restarts its time slice and reclaims the
 *    previous thread if it was DYING. A dying thread can never reach its own
 *    reclamation: the handle is only produced after the switch.
 *
 * The caller must hold preemption disabled across every method here.
 */

use alloc::boxed::Box;

use super::{
    Thread, ThreadFlags, ThreadId, ThreadState,
    config::SchedConfig,
    donation::LockTable,
    policies,
    registry::Registry,
    sleep::SleepQueue,
    traits::SchedPolicy,
    types::{NICE_MAX, NICE_MIN, PageFrame, Priority, SchedMode, Tick, TickStats, TimeSliceTicks},
};
use crate::utils::fixed_point::FixedPoint;

/// Thread id of the primordial thread
pub const PRIMORDIAL_TID: ThreadId = ThreadId(1);

/// A pending context switch
///
/// Produced when the running thread gives up the CPU to a different thread.
#[must_use = "the context switch must be performed"]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchToken {
    pub from: ThreadId,
    pub to: ThreadId,
}

/// Handle to the thread that was switched away from
///
/// Only the switch path creates these, after the new thread has taken over
/// the CPU.
#[derive(Debug, PartialEq, Eq)]
pub struct PrevThread(ThreadId);

impl PrevThread {
    pub(crate) fn new(tid: ThreadId) -> Self {
        Self(tid)
    }

    pub fn id(&self) -> ThreadId {
        self.0
    }
}

/// Storage released by a dead thread, to be handed back to the platform
#[derive(Debug, PartialEq, Eq)]
pub struct Reclaimed {
    pub tid: ThreadId,
    pub page: Option<PageFrame>,
}

/// Internal scheduler state
pub struct Scheduler {
    pub(crate) registry: Registry,
    pub(crate) sleepers: SleepQueue,
    pub(crate) locks: LockTable,
    pub(crate) policy: Box<dyn SchedPolicy>,

    stats: TickStats,

    /// Ticks since the running thread was dispatched
    slice_ticks: u32,
    time_slice: TimeSliceTicks,

    next_tid: usize,
}

impl Scheduler {
    /// Create the scheduler around the code that is already running
    ///
    /// That code becomes the primordial thread "main".
    pub fn new(config: &SchedConfig) -> Self {
        let mut policy = policies::from_config(config);

        let mut main = Thread::new(PRIMORDIAL_TID, "main", Priority::DEFAULT, None);
        main.flags |= ThreadFlags::PRIMORDIAL;
        policy.on_thread_created(None, &mut main);

        Self {
            registry: Registry::new(main),
            sleepers: SleepQueue::new(),
            locks: LockTable::new(),
            policy,
            stats: TickStats::default(),
            slice_ticks: 0,
            time_slice: config.time_slice,
            next_tid: PRIMORDIAL_TID.0 + 1,
        }
    }

    fn allocate_tid(&mut self) -> ThreadId {
        let tid = ThreadId(self.next_tid);
        self.next_tid += 1;
        tid
    }

    /// Register a new BLOCKED thread created by the running thread
    ///
    /// Under MLFQS the requested priority is replaced by the derived one.
    pub fn register_thread(&mut self, name: &str, priority: Priority, page: PageFrame) -> ThreadId {
        assert!(priority.is_valid(), "create: invalid priority {}", priority);

        let tid = self.allocate_tid();
        let mut thread = Thread::new(tid, name, priority, Some(page));
        let parent = self.registry.get(self.registry.current_id());
        self.policy.on_thread_created(parent, &mut thread);
        self.registry.insert(thread);
        tid
    }

    /// Register the idle thread (never enters the ready collection)
    pub fn register_idle(&mut self, page: PageFrame) -> ThreadId {
        let tid = self.allocate_tid();
        let mut thread = Thread::new(tid, "idle", Priority::MIN, Some(page));
        thread.flags |= ThreadFlags::IDLE;
        let parent = self.registry.get(self.registry.current_id());
        self.policy.on_thread_created(parent, &mut thread);
        self.registry.insert(thread);
        self.registry.set_idle(tid);
        tid
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn mode(&self) -> SchedMode {
        self.policy.mode()
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn time_slice(&self) -> TimeSliceTicks {
        self.time_slice
    }

    pub fn current_id(&self) -> ThreadId {
        self.registry.current_id()
    }

    /// The running thread; fatal if its control block is corrupted
    pub fn current(&self) -> &Thread {
        self.registry.current_thread()
    }

    pub fn thread(&self, tid: ThreadId) -> Option<&Thread> {
        self.registry.get(tid)
    }

    pub fn idle_id(&self) -> Option<ThreadId> {
        self.registry.idle_id()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Visit every registered thread
    pub fn for_each<F: FnMut(&Thread)>(&self, f: F) {
        self.registry.for_each(f)
    }

    pub fn thread_count(&self) -> usize {
        self.registry.thread_count()
    }

    pub fn stats(&self) -> TickStats {
        self.stats
    }

    /// Flag a thread as running a user program
    pub fn mark_user(&mut self, tid: ThreadId) {
        self.registry.thread_mut(tid).flags |= ThreadFlags::USER;
    }

    // ========================================================================
    // STATE TRANSITIONS
    // ========================================================================

    /// BLOCKED -> READY, without preempting the running thread
    pub fn unblock(&mut self, tid: ThreadId) {
        let thread = self.registry.thread(tid);
        assert!(thread.is_valid(), "unblock: {} control block corrupted", tid);
        assert_eq!(thread.state, ThreadState::Blocked, "unblock: {} is not blocked", tid);
        assert!(!thread.is_idle(), "unblock: idle thread is never queued");
        self.registry.push_ready(tid);
    }

    /// RUNNING -> BLOCKED, then dispatch
    pub fn block_current(&mut self) -> Option<SwitchToken> {
        let cur = self.current().id;
        self.registry.thread_mut(cur).state = ThreadState::Blocked;
        self.schedule()
    }

    /// RUNNING -> READY at its priority position, then dispatch
    ///
    /// The idle thread is never queued; it runs again only when nothing else
    /// is ready.
    pub fn yield_current(&mut self) -> Option<SwitchToken> {
        let cur = self.current().id;
        if self.registry.is_idle(cur) {
            self.registry.thread_mut(cur).state = ThreadState::Ready;
        } else {
            self.registry.push_ready(cur);
        }
        self.schedule()
    }

    /// RUNNING -> DYING, then dispatch; the thread never runs again
    pub fn exit_current(&mut self) -> SwitchToken {
        let cur = self.current().id;
        assert!(!self.registry.is_idle(cur), "exit: idle thread cannot exit");

        self.registry.unlink(cur);
        self.registry.thread_mut(cur).state = ThreadState::Dying;
        match self.schedule() {
            Some(token) => token,
            None => panic!("exit: {} was chosen to run after exiting", cur),
        }
    }

    /// Pick the next thread and prepare the switch to it
    fn schedule(&mut self) -> Option<SwitchToken> {
        let cur = self.registry.current_id();
        assert_ne!(
            self.registry.thread(cur).state,
            ThreadState::Running,
            "schedule: current thread is still running"
        );

        let next = match self.registry.next_to_run() {
            Some(tid) => tid,
            None => panic!("schedule: no ready thread and no idle thread"),
        };

        if next == cur {
            let _ = self.finish_switch(None);
            return None;
        }

        self.registry.set_current(next);
        Some(SwitchToken { from: cur, to: next })
    }

    /// Finish a switch on the newly running thread
    ///
    /// Marks it RUNNING, restarts its time slice and, when `prev` is DYING,
    /// removes its control block and returns its storage. The primordial
    /// thread's storage was never allocated and is never reclaimed.
    pub fn finish_switch(&mut self, prev: Option<PrevThread>) -> Option<Reclaimed> {
        let cur = self.registry.current_id();
        self.registry.thread_mut(cur).state = ThreadState::Running;
        self.slice_ticks = 0;

        let prev = prev?.0;
        if prev == cur {
            return None;
        }
        let dead = self.registry.get(prev)?;
        if dead.state != ThreadState::Dying || dead.is_primordial() {
            return None;
        }

        let thread = self.registry.remove(prev)?;
        Some(Reclaimed {
            tid: prev,
            page: thread.page,
        })
    }

    // ========================================================================
    // TIMER TICK
    // ========================================================================

    /// Account one timer tick; runs in interrupt context
    ///
    /// Returns true when the running thread should yield on return from the
    /// interrupt.
    pub fn on_tick(&mut self, now: Tick) -> bool {
        let (idle, user) = {
            let cur = self.current();
            (cur.is_idle(), cur.is_user())
        };
        if idle {
            self.stats.idle += 1;
        } else if user {
            self.stats.user += 1;
        } else {
            self.stats.kernel += 1;
        }

        let recomputed = self.policy.on_tick(&mut self.registry, now);
        let woken = self.wake_sleepers(now);

        self.slice_ticks += 1;
        recomputed || (woken > 0 && self.is_outranked()) || self.slice_ticks >= self.time_slice.get()
    }

    // ========================================================================
    // NICE / MLFQS ACCESSORS
    // ========================================================================

    /// Set the running thread's nice value, clamped to [NICE_MIN, NICE_MAX]
    pub fn set_nice(&mut self, nice: i32) {
        let cur = self.current().id;
        let thread = self.registry.thread_mut(cur);
        thread.nice = nice.clamp(NICE_MIN, NICE_MAX);
        self.policy.on_nice_changed(thread);
    }

    pub fn nice(&self) -> i32 {
        self.current().nice
    }

    /// Effective priority of the running thread
    pub fn priority(&self) -> Priority {
        self.current().priority
    }

    pub fn load_avg(&self) -> FixedPoint {
        self.policy.load_avg()
    }

    /// 100 times the load average, rounded to nearest
    pub fn load_avg_x100(&self) -> i32 {
        self.load_avg().mul_int_round(100)
    }

    /// 100 times the running thread's recent CPU, rounded to nearest
    pub fn recent_cpu_x100(&self) -> i32 {
        self.current().recent_cpu.mul_int_round(100)
    }

    /// Whether the best ready thread strictly outranks the running thread
    pub fn is_outranked(&self) -> bool {
        self.registry.is_outranked()
    }
}
