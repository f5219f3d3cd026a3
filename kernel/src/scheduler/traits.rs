/*
 * Scheduler Trait Definitions
 *
 * This module defines the traits that separate scheduling policy from mechanism,
 * and the mechanism from the hardware it runs on:
 *
 * - SchedPolicy: how priorities are derived and what happens on each tick
 * - KernelSchedCtx: the view of kernel state a policy is allowed to touch
 * - InterruptControl / PageAllocator / ContextSwitch: the platform collaborators
 *
 * This separation allows:
 * 1. Selecting the scheduling mode at boot without changing the state machine
 * 2. Testing the state machine and policies on the host
 * 3. Clear ownership boundaries (the platform owns register files and stacks)
 */

use alloc::boxed::Box;

use super::{
    Thread, ThreadId,
    types::{PageFrame, SchedMode, Tick},
};
use crate::utils::fixed_point::FixedPoint;

// ============================================================================
// POLICY SIDE
// ============================================================================

/// Scheduling policy trait
///
/// The state machine holds a `Box<dyn SchedPolicy>` chosen at boot and
/// forwards thread creation, ticks and nice changes to it.
pub trait SchedPolicy: Send {
    /// Policy name for logging
    fn name(&self) -> &'static str;

    /// Mode this policy implements
    fn mode(&self) -> SchedMode;

    /// True when priorities are computed by the policy and explicit
    /// priority changes and donation must be ignored
    fn priority_is_derived(&self) -> bool {
        self.mode() == SchedMode::Mlfqs
    }

    /// Initialize policy state of a freshly created thread
    ///
    /// `parent` is the creating thread, or `None` for the primordial thread.
    fn on_thread_created(&mut self, parent: Option<&Thread>, child: &mut Thread);

    /// Per-tick work, called from interrupt context after the tick counter
    /// advanced to `now`
    ///
    /// Returns true when the running thread should give up the CPU at the
    /// next safe point.
    fn on_tick(&mut self, ctx: &mut dyn KernelSchedCtx, now: Tick) -> bool;

    /// A thread's nice value changed
    fn on_nice_changed(&mut self, thread: &mut Thread);

    /// System load average (zero for policies that don't track it)
    fn load_avg(&self) -> FixedPoint {
        FixedPoint::ZERO
    }
}

/// Kernel context interface for scheduling policies
///
/// This trait is the ONLY way policies can query or modify kernel state.
/// The thread registry implements it.
pub trait KernelSchedCtx {
    // ========== QUERY OPERATIONS ==========

    /// The running thread
    fn current_thread(&self) -> ThreadId;

    /// Whether `tid` is the idle thread
    fn is_idle(&self, tid: ThreadId) -> bool;

    /// Number of threads in the ready collection
    fn ready_count(&self) -> usize;

    /// Whether a ready thread strictly outranks the running thread
    fn is_outranked(&self) -> bool;

    // ========== STATE MODIFICATION ==========

    /// Mutable access to one thread
    fn thread_mut(&mut self, tid: ThreadId) -> Option<&mut Thread>;

    /// Visit every registered thread
    fn for_each_thread(&mut self, f: &mut dyn FnMut(&mut Thread));

    /// Restore ready order after priorities changed
    fn resort_ready(&mut self);
}

// ============================================================================
// PLATFORM SIDE
// ============================================================================

/// Entry point run on a new thread's first dispatch
///
/// Receives the id of the thread that switched to it.
pub type ThreadStart = Box<dyn FnOnce(ThreadId) + Send + 'static>;

/// CPU interrupt flag control
pub trait InterruptControl {
    fn are_enabled(&self) -> bool;
    fn enable(&self);
    fn disable(&self);

    /// Enable interrupts and wait for the next one, atomically
    fn enable_and_hlt(&self);
}

/// Page allocator for thread control blocks and kernel stacks
pub trait PageAllocator {
    /// Allocate one zeroed page, `None` when memory is exhausted
    fn alloc_zeroed_page(&self) -> Option<PageFrame>;

    /// Return a page to the allocator
    fn free_page(&self, page: PageFrame);
}

/// Low-level context switch
pub trait ContextSwitch {
    /// Build the first-dispatch frame of thread `tid` on its page so that
    /// switching to it runs `start`
    fn prepare(&self, tid: ThreadId, page: &PageFrame, start: ThreadStart);

    /// Save the running context as `from` and resume `to`
    ///
    /// Returns on `from`'s stack once some thread switches back to it,
    /// yielding the id of that thread.
    ///
    /// # Safety
    /// Interrupts must be disabled, `from` must be the running context and
    /// `to` must have been prepared or previously switched away from.
    unsafe fn switch_threads(&self, from: ThreadId, to: ThreadId) -> ThreadId;

    /// Drop the saved context of a reclaimed thread
    fn discard(&self, tid: ThreadId);
}

/// Everything the scheduler needs from the machine it runs on
pub trait Platform: InterruptControl + PageAllocator + ContextSwitch + Send + Sync {}

impl<T> Platform for T where T: InterruptControl + PageAllocator + ContextSwitch + Send + Sync {}
