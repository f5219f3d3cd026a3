/*
 * Priority Scheduling Policy
 *
 * This module implements the default policy: every thread runs at the
 * priority it was created with (or later set explicitly), raised only by
 * priority donation. Ordering of the ready collection does all the work, so
 * the policy itself has no per-tick duties.
 *
 * Features:
 * - Static owner-set priorities
 * - Donation enabled
 * - Preempts on time-slice expiry or when a woken sleeper outranks the
 *   running thread
 */

use super::super::{
    Thread,
    traits::{KernelSchedCtx, SchedPolicy},
    types::{SchedMode, Tick},
};

/// Static priority policy
#[derive(Debug, Default)]
pub struct PriorityPolicy;

impl PriorityPolicy {
    pub fn new() -> Self {
        Self
    }
}

impl SchedPolicy for PriorityPolicy {
    fn name(&self) -> &'static str {
        "Priority"
    }

    fn mode(&self) -> SchedMode {
        SchedMode::Priority
    }

    fn on_thread_created(&mut self, _parent: Option<&Thread>, _child: &mut Thread) {
        // Child keeps the priority it was created with
    }

    fn on_tick(&mut self, _ctx: &mut dyn KernelSchedCtx, _now: Tick) -> bool {
        false
    }

    fn on_nice_changed(&mut self, _thread: &mut Thread) {
        // Nice has no effect outside MLFQS
    }
}
