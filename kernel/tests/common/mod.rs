/*
 * Hosted Test Platform
 *
 * A Platform implementation that lets the scheduler run on the host. Every
 * kernel thread is backed by an OS thread, but only the one holding the
 * "CPU" baton executes; switch_threads() passes the baton and parks the
 * caller until it is handed back. The test's own thread is the primordial
 * thread "main".
 *
 * - Interrupt level: a flag; there is no asynchronous timer. Ticks are
 *   delivered by calling timer_interrupt() directly, and every
 *   enable_and_hlt() from the idle thread delivers one tick.
 * - Pages: a bounded pool so allocation failure can be provoked.
 */

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, OnceLock};
use std::thread;

use kthread_sched::scheduler::{
    ContextSwitch, InterruptControl, LockId, PRIMORDIAL_TID, PageAllocator, PageFrame, Platform,
    Priority, SchedConfig, SchedulerManager, ThreadId, ThreadStart,
};

const PAGE_SIZE: usize = 4096;

struct Cpu {
    running: ThreadId,
    /// Thread each resumed thread was switched away from
    prev: HashMap<ThreadId, ThreadId>,
    /// Threads prepared but never dispatched
    pending: HashMap<ThreadId, ThreadStart>,
    discarded: HashSet<ThreadId>,
}

pub struct HostPlatform {
    cpu: Mutex<Cpu>,
    baton: Condvar,
    enabled: AtomicBool,

    capacity: usize,
    in_use: AtomicUsize,
    next_page: AtomicUsize,
    freed: AtomicUsize,

    tick_hook: OnceLock<Box<dyn Fn() + Send + Sync>>,
}

impl HostPlatform {
    pub fn new(capacity: usize) -> Self {
        Self {
            cpu: Mutex::new(Cpu {
                running: PRIMORDIAL_TID,
                prev: HashMap::new(),
                pending: HashMap::new(),
                discarded: HashSet::new(),
            }),
            baton: Condvar::new(),
            enabled: AtomicBool::new(false),
            capacity,
            in_use: AtomicUsize::new(0),
            next_page: AtomicUsize::new(1),
            freed: AtomicUsize::new(0),
            tick_hook: OnceLock::new(),
        }
    }

    /// Install the handler run by every idle halt
    pub fn set_tick_hook(&self, hook: impl Fn() + Send + Sync + 'static) {
        if self.tick_hook.set(Box::new(hook)).is_err() {
            panic!("tick hook already installed");
        }
    }

    pub fn pages_in_use(&self) -> usize {
        self.in_use.load(Ordering::SeqCst)
    }

    pub fn pages_freed(&self) -> usize {
        self.freed.load(Ordering::SeqCst)
    }

    pub fn is_discarded(&self, tid: ThreadId) -> bool {
        self.cpu.lock().unwrap().discarded.contains(&tid)
    }
}

impl InterruptControl for HostPlatform {
    fn are_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    fn enable_and_hlt(&self) {
        self.enable();
        if let Some(hook) = self.tick_hook.get() {
            hook();
        }
    }
}

impl PageAllocator for HostPlatform {
    fn alloc_zeroed_page(&self) -> Option<PageFrame> {
        let taken = self
            .in_use
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < self.capacity).then_some(n + 1));
        taken.ok()?;
        let index = self.next_page.fetch_add(1, Ordering::SeqCst);
        Some(PageFrame::new(index * PAGE_SIZE))
    }

    fn free_page(&self, _page: PageFrame) {
        self.in_use.fetch_sub(1, Ordering::SeqCst);
        self.freed.fetch_add(1, Ordering::SeqCst);
    }
}

impl ContextSwitch for HostPlatform {
    fn prepare(&self, tid: ThreadId, _page: &PageFrame, start: ThreadStart) {
        self.cpu.lock().unwrap().pending.insert(tid, start);
    }

    unsafe fn switch_threads(&self, from: ThreadId, to: ThreadId) -> ThreadId {
        let mut cpu = self.cpu.lock().unwrap();
        assert_eq!(cpu.running, from, "switch from a thread that does not own the CPU");
        cpu.running = to;
        cpu.prev.insert(to, from);
        if let Some(start) = cpu.pending.remove(&to) {
            thread::Builder::new()
                .name(format!("kthread-{}", to.0))
                .spawn(move || start(from))
                .unwrap();
        }
        self.baton.notify_all();

        let mut cpu = self
            .baton
            .wait_while(cpu, |c| c.running != from && !c.discarded.contains(&from))
            .unwrap();
        if cpu.discarded.contains(&from) {
            drop(cpu);
            loop {
                thread::park();
            }
        }
        cpu.prev.remove(&from).unwrap()
    }

    fn discard(&self, tid: ThreadId) {
        let mut cpu = self.cpu.lock().unwrap();
        cpu.discarded.insert(tid);
        self.baton.notify_all();
    }
}

pub type Manager = SchedulerManager<HostPlatform>;

/// Boot a scheduler on the calling OS thread with `pages` pages available
pub fn boot(config: SchedConfig, pages: usize) -> &'static Manager {
    let mgr: &'static Manager = Box::leak(Box::new(SchedulerManager::new(HostPlatform::new(pages), config)));
    mgr.platform().set_tick_hook(move || mgr.timer_interrupt());
    mgr.start().unwrap();
    mgr
}

/// Ordered record of events observed by the test threads
#[derive(Default)]
pub struct Trace {
    events: Mutex<Vec<String>>,
}

impl Trace {
    pub fn leak() -> &'static Trace {
        Box::leak(Box::default())
    }

    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

/// A sleep lock built on the scheduler's donation hooks
///
/// Release hands ownership straight to the highest-priority waiter.
pub struct KernelLock {
    id: LockId,
    state: Mutex<LockState>,
}

struct LockState {
    holder: Option<ThreadId>,
    waiters: VecDeque<ThreadId>,
}

impl KernelLock {
    pub fn new(mgr: &Manager) -> Self {
        Self {
            id: mgr.register_lock(),
            state: Mutex::new(LockState {
                holder: None,
                waiters: VecDeque::new(),
            }),
        }
    }

    pub fn id(&self) -> LockId {
        self.id
    }

    pub fn acquire(&self, mgr: &Manager) {
        let mut guard = mgr.lock();
        let me = guard.current_id();
        {
            let mut st = self.state.lock().unwrap();
            if st.holder.is_none() {
                st.holder = Some(me);
                drop(st);
                guard.lock_acquired(self.id);
                return;
            }
            st.waiters.push_back(me);
        }
        guard.lock_contended(self.id);
        mgr.block(guard);

        // Woken by release with ownership already handed over
        let mut guard = mgr.lock();
        assert_eq!(self.state.lock().unwrap().holder, Some(me));
        guard.lock_acquired(self.id);
    }

    pub fn release(&self, mgr: &Manager) {
        let mut guard = mgr.lock();
        guard.lock_released(self.id);

        let next = {
            let mut st = self.state.lock().unwrap();
            let mut best: Option<(usize, Priority)> = None;
            for (i, &tid) in st.waiters.iter().enumerate() {
                let prio = guard.thread(tid).unwrap().priority;
                if best.is_none_or(|(_, p)| prio > p) {
                    best = Some((i, prio));
                }
            }
            let next = best.and_then(|(i, _)| st.waiters.remove(i));
            st.holder = next;
            next
        };
        if let Some(tid) = next {
            guard.unblock(tid);
        }
        drop(guard);
        mgr.try_yield_if_outranked();
    }

    pub fn holder(&self) -> Option<ThreadId> {
        self.state.lock().unwrap().holder
    }
}
