/*
 * Scheduler Type Definitions
 *
 * This module defines the core types used throughout the scheduler subsystem.
 * These types are designed to be lightweight, Copy-able, and suitable for
 * use in both policy and mechanism layers.
 */

use core::fmt;

/// Timer tick count (monotonic, never moves backward)
pub type Tick = u64;

/// Lowest nice value (most favourable under MLFQS)
pub const NICE_MIN: i32 = -20;

/// Highest nice value (least favourable under MLFQS)
pub const NICE_MAX: i32 = 20;

/// Default nice value
pub const NICE_DEFAULT: i32 = 0;

/// Thread priority
///
/// Higher values indicate higher priority. Valid priorities lie in
/// `[Priority::MIN, Priority::MAX]`; anything outside that range handed to
/// the scheduler is a protocol violation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub i32);

impl Priority {
    /// Minimum priority (idle thread)
    pub const MIN: Priority = Priority(0);

    /// Default priority for new threads and the primordial thread
    pub const DEFAULT: Priority = Priority(31);

    /// Maximum priority
    pub const MAX: Priority = Priority(63);

    /// Check that the priority is inside the valid range
    pub fn is_valid(self) -> bool {
        self >= Self::MIN && self <= Self::MAX
    }

    /// Clamp into the valid range
    pub fn clamp(self) -> Priority {
        Priority(self.0.clamp(Self::MIN.0, Self::MAX.0))
    }

    /// Get the raw value
    pub fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Time slice duration in timer ticks
///
/// How long a thread may run before preemption is requested.
/// With a 100Hz timer (10ms per tick), TimeSliceTicks(4) = 40ms.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TimeSliceTicks(pub u32);

impl TimeSliceTicks {
    /// Default time slice (4 ticks = 40ms @ 100Hz)
    pub const DEFAULT: TimeSliceTicks = TimeSliceTicks(4);

    /// Get the value as u32
    pub fn get(self) -> u32 {
        self.0
    }
}

/// Lock identifier
///
/// Locks are owned by the synchronization layer; the scheduler only keeps
/// their donation-relevant state keyed by this id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LockId(pub usize);

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lock({})", self.0)
    }
}

/// Scheduling mode, fixed at boot
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SchedMode {
    /// Strict priority scheduling with priority donation
    #[default]
    Priority,

    /// Multi-level feedback queue: priorities derived from nice and recent CPU
    Mlfqs,
}

/// Errors reported to callers of the scheduler
///
/// Protocol violations are not represented here; they are fatal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SchedError {
    /// No page was available for the thread control block and stack
    AllocationFailure,
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::AllocationFailure => write!(f, "Out of memory for thread control block"),
        }
    }
}

/// A physical page backing a thread's control block and kernel stack
///
/// Handed out by the platform page allocator and returned to it when the
/// thread is reclaimed. Not `Clone`: exactly one owner at a time.
#[derive(Debug, PartialEq, Eq)]
pub struct PageFrame {
    addr: usize,
}

impl PageFrame {
    /// Wrap a page address obtained from the allocator
    pub const fn new(addr: usize) -> Self {
        Self { addr }
    }

    /// Start address of the page
    pub fn addr(&self) -> usize {
        self.addr
    }
}

/// Tick accounting split by what the CPU was running
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Ticks spent in the idle thread
    pub idle: u64,

    /// Ticks spent in kernel threads
    pub kernel: u64,

    /// Ticks spent in threads running a user program
    pub user: u64,
}

impl fmt::Display for TickStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Thread: {} idle ticks, {} kernel ticks, {} user ticks",
            self.idle, self.kernel, self.user
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_range() {
        assert!(Priority::MIN.is_valid());
        assert!(Priority::MAX.is_valid());
        assert!(!Priority(64).is_valid());
        assert!(!Priority(-1).is_valid());
        assert_eq!(Priority(99).clamp(), Priority::MAX);
        assert_eq!(Priority(-5).clamp(), Priority::MIN);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            alloc::format!("{}", SchedError::AllocationFailure),
            "Out of memory for thread control block"
        );
    }
}
