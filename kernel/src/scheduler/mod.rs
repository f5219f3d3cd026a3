/*
 * Priority Scheduler with Donation and MLFQS
 *
 * This module implements the thread scheduler for a single-CPU preemptible
 * kernel. It decides which ready thread runs next, manages the thread
 * lifecycle, bounds priority inversion through priority donation and offers
 * an alternate multi-level feedback queue (MLFQS) mode selected at boot.
 *
 * SCHEDULING ALGORITHM:
 * ====================
 *
 * Strict priority with round-robin inside a level:
 * 1. The ready collection is kept sorted by effective priority (FIFO among
 *    equal priorities)
 * 2. Dispatch always takes the front; the idle thread runs when it is empty
 * 3. The timer interrupt requests a yield every time slice (4 ticks), so
 *    equal-priority threads take turns
 * 4. Creating a thread that outranks its creator switches to it at once
 *
 * PRIORITY DONATION:
 * ==================
 *
 * A thread holding a lock runs at the highest priority among the threads
 * waiting for it. Donation is single-level (see donation.rs).
 *
 * MLFQS:
 * ======
 *
 * Priorities are derived from nice and recent CPU usage with 17.14 fixed
 * point recurrences (see policies/mlfqs.rs); explicit priority changes and
 * donation are ignored.
 *
 * CONCURRENCY:
 * ============
 *
 * One CPU, so disabling interrupts serializes every access to scheduler
 * state. SchedulerManager::lock() returns a guard that does exactly that.
 *
 * Layout:
 * - types, thread: ids, priorities, the thread control block
 * - registry, context: thread table, all-threads list, ready collection
 * - scheduler: the state machine (pure, no hardware access)
 * - donation, sleep: lock donation table and the sleep/wake queue
 * - policies: priority and MLFQS policies behind the SchedPolicy trait
 * - traits: policy and platform seams
 * - guard, manager: preemption guards and the public API
 */

pub mod config;
pub mod context;
pub mod donation;
pub mod guard;
pub mod manager;
pub mod policies;
pub mod registry;
pub mod scheduler;
pub mod sleep;
pub mod thread;
pub mod traits;
pub mod types;

pub use config::SchedConfig;
pub use donation::{LockRecord, LockTable};
pub use guard::{DisableInterrupts, SchedGuard};
pub use manager::SchedulerManager;
pub use policies::{MlfqsPolicy, PriorityPolicy};
pub use registry::{ReadyQueue, Registry};
pub use scheduler::{PRIMORDIAL_TID, PrevThread, Reclaimed, Scheduler, SwitchToken};
pub use sleep::SleepQueue;
pub use thread::{THREAD_MAGIC, Thread, ThreadFlags, ThreadId, ThreadName, ThreadState};
pub use traits::{
    ContextSwitch, InterruptControl, KernelSchedCtx, PageAllocator, Platform, SchedPolicy,
    ThreadStart,
};
pub use types::{
    LockId, NICE_DEFAULT, NICE_MAX, NICE_MIN, PageFrame, Priority, SchedError, SchedMode, Tick,
    TickStats, TimeSliceTicks,
};
