/*
 * Kernel Thread Scheduler
 *
 * The thread scheduler core of a single-CPU preemptible kernel: thread
 * lifecycle, strict-priority dispatch with round-robin time slicing, single
 * level priority donation, the MLFQS alternate mode and the timer sleep
 * queue.
 *
 * The crate is no_std + alloc. The embedding kernel supplies a Platform
 * (interrupt control, page allocation, stack switching), drives
 * SchedulerManager::timer_interrupt() from its timer interrupt and installs
 * the log::Log implementation.
 *
 * Modules:
 * - scheduler: the scheduler proper (state machine, policies, public API)
 * - utils: fixed-point arithmetic and the tick counter
 * - arch: x86_64 interrupt control
 */

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod arch;
pub mod scheduler;
pub mod utils;

pub use scheduler::{
    Priority, SchedConfig, SchedError, SchedMode, Scheduler, SchedulerManager, ThreadId,
    ThreadState,
};
