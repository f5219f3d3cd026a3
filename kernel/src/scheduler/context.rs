/*
 * Scheduler Context - KernelSchedCtx Implementation
 *
 * This module implements the KernelSchedCtx trait for the thread registry,
 * the bridge between scheduling policies and the actual kernel state.
 *
 * This separation provides:
 * - Safety: Policies can't reach the sleep queue or the lock table
 * - Testability: Policies can be driven against a bare registry
 */

use super::{
    Thread, ThreadId,
    registry::Registry,
    traits::KernelSchedCtx,
};

impl KernelSchedCtx for Registry {
    // ========================================================================
    // QUERY OPERATIONS
    // ========================================================================

    fn current_thread(&self) -> ThreadId {
        self.current_id()
    }

    fn is_idle(&self, tid: ThreadId) -> bool {
        Registry::is_idle(self, tid)
    }

    fn ready_count(&self) -> usize {
        self.ready_len()
    }

    fn is_outranked(&self) -> bool {
        Registry::is_outranked(self)
    }

    // ========================================================================
    // STATE MODIFICATION
    // ========================================================================

    fn thread_mut(&mut self, tid: ThreadId) -> Option<&mut Thread> {
        self.get_mut(tid)
    }

    fn for_each_thread(&mut self, f: &mut dyn FnMut(&mut Thread)) {
        self.for_each_mut(|t| f(t));
    }

    fn resort_ready(&mut self) {
        Registry::resort_ready(self)
    }
}
