/*
 * System Tick Counter
 *
 * This module provides the monotonic tick counter consumed by the scheduler.
 * It's advanced exactly once per timer interrupt (IRQ0) and read by the
 * sleep queue and the MLFQS engine.
 *
 * ## Description
 *
 * ### Core Functionality:
 * - **Monotonic Ticks**: The counter only ever moves forward, which is what
 *   lets the sleep queue stop scanning at the first future deadline
 *
 * ### Timer Resolution:
 * - **Default Frequency**: 100Hz (10ms per tick)
 * - **Scheduler Quantum**: `TimeSliceTicks` ticks per thread
 *
 * ### Integration Points:
 * - Advanced by `SchedulerManager::timer_interrupt`
 * - Read by `SchedulerManager::ticks` and `SchedulerManager::sleep`
 */

use core::sync::atomic::{AtomicU64, Ordering};

use crate::scheduler::Tick;

/// Default timer interrupt frequency in Hz
pub const TIMER_FREQ: u32 = 100;

/// Monotonic timer tick counter
///
/// Lock-free so it can be read from any context, including the
/// interrupt handler that advances it.
#[derive(Debug, Default)]
pub struct TickCounter {
    ticks: AtomicU64,
}

impl TickCounter {
    /// Create a counter starting at tick 0
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
        }
    }

    /// Advance by one tick and return the new value
    ///
    /// Must be called exactly once per timer interrupt.
    pub fn advance(&self) -> Tick {
        self.ticks.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Current tick count
    pub fn now(&self) -> Tick {
        self.ticks.load(Ordering::SeqCst)
    }
}
