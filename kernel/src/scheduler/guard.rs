/*
 * Preemption Guards
 *
 * On a single CPU, disabling interrupts is what makes a sequence of scheduler
 * operations atomic: nothing can preempt the running thread until they are
 * enabled again. This module provides the RAII guards that express that.
 *
 * - DisableInterrupts: disables interrupts and restores the previous level
 *   when dropped
 * - SchedGuard: DisableInterrupts plus the scheduler lock; the only way to
 *   reach the Scheduler through the manager
 *
 * The spin lock inside SchedGuard is never contended on one CPU; it exists so
 * the scheduler state can live in a shared static and so that misuse (taking
 * the lock twice) deadlocks loudly instead of corrupting state.
 */

use core::ops::{Deref, DerefMut};

use spin::MutexGuard;

use super::{scheduler::Scheduler, traits::InterruptControl};

/// RAII guard that disables interrupts for its lifetime
///
/// Interrupts are disabled when this guard is created and restored to their
/// previous state when it's dropped.
///
/// # Example
/// ```ignore
/// let _guard = DisableInterrupts::new(&platform);
/// // Critical section - interrupts are disabled
/// // Previous level restored when _guard is dropped
/// ```
pub struct DisableInterrupts<'a, I: InterruptControl + ?Sized> {
    ctl: &'a I,
    were_enabled: bool,
}

impl<'a, I: InterruptControl + ?Sized> DisableInterrupts<'a, I> {
    /// Create a new interrupt guard, disabling interrupts
    pub fn new(ctl: &'a I) -> Self {
        let were_enabled = ctl.are_enabled();
        if were_enabled {
            ctl.disable();
        }
        Self { ctl, were_enabled }
    }

    /// Whether interrupts were enabled when the guard was taken
    pub fn were_enabled(&self) -> bool {
        self.were_enabled
    }

    /// Drop the guard without restoring: interrupts stay disabled
    pub fn forget(self) {
        core::mem::forget(self);
    }
}

impl<I: InterruptControl + ?Sized> Drop for DisableInterrupts<'_, I> {
    fn drop(&mut self) {
        // Only re-enable if they were enabled before
        if self.were_enabled {
            self.ctl.enable();
        }
    }
}

/// Exclusive access to the scheduler with preemption disabled
///
/// Field order matters: the lock is released before interrupts are restored.
pub struct SchedGuard<'a, I: InterruptControl + ?Sized> {
    pub(crate) sched: MutexGuard<'a, Scheduler>,
    pub(crate) intr: DisableInterrupts<'a, I>,
}

impl<'a, I: InterruptControl + ?Sized> SchedGuard<'a, I> {
    /// Release the scheduler lock but keep interrupts disabled
    pub fn unlock(self) -> DisableInterrupts<'a, I> {
        let SchedGuard { sched, intr } = self;
        drop(sched);
        intr
    }
}

impl<I: InterruptControl + ?Sized> Deref for SchedGuard<'_, I> {
    type Target = Scheduler;

    fn deref(&self) -> &Scheduler {
        &self.sched
    }
}

impl<I: InterruptControl + ?Sized> DerefMut for SchedGuard<'_, I> {
    fn deref_mut(&mut self) -> &mut Scheduler {
        &mut self.sched
    }
}
