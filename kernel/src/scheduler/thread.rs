/*
 * Thread Control Block
 *
 * This module defines the Thread structure and related types for the
 * scheduler. A Thread carries everything the scheduler needs to order and
 * account for a thread; the saved register file and stack pointer belong to
 * the platform's context-switch layer and are never touched here.
 */

use alloc::vec::Vec;
use core::fmt;

use bitflags::bitflags;

use super::types::{LockId, NICE_DEFAULT, PageFrame, Priority, Tick};
use crate::utils::fixed_point::FixedPoint;

/// Sentinel stored in every live control block
///
/// A mismatch means the block was overwritten, usually by a kernel stack
/// overflowing into it.
pub const THREAD_MAGIC: u32 = 0xcd6a_bf4b;

/// Maximum thread name length in bytes
pub const THREAD_NAME_LEN: usize = 16;

/// Bounded thread name
pub type ThreadName = heapless::String<THREAD_NAME_LEN>;

/// Thread identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub usize);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thread({})", self.0)
    }
}

/// Thread state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Currently executing on the CPU
    Running,

    /// Eligible to run, waiting in the ready collection
    Ready,

    /// Waiting for an event; only `unblock` moves it on
    Blocked,

    /// Exited, waiting for the next thread to reclaim it
    Dying,
}

bitflags! {
    /// Per-thread attributes the scheduler cares about
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ThreadFlags: u8 {
        /// The idle thread
        const IDLE = 1 << 0;
        /// The thread that was running when the scheduler was initialized
        const PRIMORDIAL = 1 << 1;
        /// Running a user program (drives the user tick statistic)
        const USER = 1 << 2;
    }
}

/// Build a bounded thread name, truncating on a character boundary
pub fn make_name(name: &str) -> ThreadName {
    let mut out = ThreadName::new();
    for c in name.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// Thread control block
pub struct Thread {
    pub id: ThreadId,
    pub name: ThreadName,
    pub state: ThreadState,

    /// Priority set by the owner (or derived under MLFQS)
    pub base_priority: Priority,

    /// Priority used for scheduling order, possibly raised by donation
    pub priority: Priority,

    /// Locks currently held (non-owning)
    pub owned_locks: Vec<LockId>,

    /// Lock this thread is blocked on, if any
    pub waiting_lock: Option<LockId>,

    // MLFQS inputs
    pub nice: i32,
    pub recent_cpu: FixedPoint,

    /// Absolute wake-up tick, meaningful only while sleeping
    pub wake_time: Tick,

    pub flags: ThreadFlags,

    /// Backing page; `None` only for the primordial thread
    pub(crate) page: Option<PageFrame>,

    pub(crate) magic: u32,
}

impl Thread {
    /// Create a BLOCKED thread at the given priority
    pub fn new(id: ThreadId, name: &str, priority: Priority, page: Option<PageFrame>) -> Self {
        Self {
            id,
            name: make_name(name),
            state: ThreadState::Blocked,
            base_priority: priority,
            priority,
            owned_locks: Vec::new(),
            waiting_lock: None,
            nice: NICE_DEFAULT,
            recent_cpu: FixedPoint::ZERO,
            wake_time: 0,
            flags: ThreadFlags::empty(),
            page,
            magic: THREAD_MAGIC,
        }
    }

    /// Check the sentinel
    pub fn is_valid(&self) -> bool {
        self.magic == THREAD_MAGIC
    }

    pub fn is_idle(&self) -> bool {
        self.flags.contains(ThreadFlags::IDLE)
    }

    pub fn is_primordial(&self) -> bool {
        self.flags.contains(ThreadFlags::PRIMORDIAL)
    }

    pub fn is_user(&self) -> bool {
        self.flags.contains(ThreadFlags::USER)
    }

    /// Name as a string slice
    pub fn name(&self) -> &str {
        self.name.as_str()
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("name", &self.name.as_str())
            .field("state", &self.state)
            .field("base_priority", &self.base_priority)
            .field("priority", &self.priority)
            .field("nice", &self.nice)
            .field("recent_cpu", &self.recent_cpu)
            .field("flags", &self.flags)
            .finish()
    }
}
