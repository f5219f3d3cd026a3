/*
 * Scheduler Manager
 *
 * This module provides SchedulerManager, the public API of the scheduler.
 * It couples the Scheduler state machine with a Platform (interrupt control,
 * page allocation, context switching) and the system tick counter, and
 * performs the context switches the state machine asks for.
 *
 * CALLING CONTEXTS:
 * =================
 *
 * - Thread context: create, yield_now, block, sleep, exit, set_priority,
 *   set_nice and the accessors.
 * - Interrupt context: timer_interrupt, unblock and try_yield_if_outranked
 *   only. Anything that could give up the CPU from an interrupt handler is a
 *   fatal error; handlers request a yield on return instead.
 *
 * Interrupt context is whatever runs between enter_interrupt() and
 * leave_interrupt(). The embedding kernel wraps every ISR body in that pair;
 * timer_interrupt() does it itself. The requested yield happens in the
 * outermost leave_interrupt(), after the flag is cleared.
 *
 * SWITCHING:
 * ==========
 *
 * 1. Take a SchedGuard (interrupts off + scheduler lock)
 * 2. Ask the state machine for a transition; it may return a SwitchToken
 * 3. Release the lock, keep interrupts off, call switch_threads()
 * 4. On the resumed stack, finish the switch: mark RUNNING, restart the
 *    time slice, free the previous thread if it died
 * 5. Restore the interrupt level saved in step 1
 *
 * New threads begin in a trampoline that performs step 4, enables
 * interrupts, runs the entry closure and exits when it returns.
 */

use alloc::boxed::Box;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use spin::Mutex;

use super::{
    Thread, ThreadId, ThreadName,
    config::SchedConfig,
    guard::{DisableInterrupts, SchedGuard},
    scheduler::{PrevThread, Reclaimed, Scheduler, SwitchToken},
    traits::{Platform, ThreadStart},
    types::{LockId, Priority, SchedError, Tick, TickStats},
};
use crate::utils::timer::TickCounter;

/// Scheduler front end bound to a platform
///
/// Lives for the whole life of the kernel; thread entry trampolines hold
/// `&'static` references to it.
///
/// # Examples
///
/// ```ignore
/// static SCHED: Once<SchedulerManager<Board>> = Once::new();
///
/// let mgr = SCHED.call_once(|| SchedulerManager::new(Board::new(), SchedConfig::from_cmdline(cmdline)));
/// mgr.start()?;
/// mgr.create("worker", Priority::DEFAULT, || work())?;
/// ```
pub struct SchedulerManager<P: Platform> {
    sched: Mutex<Scheduler>,
    platform: P,
    ticks: TickCounter,

    /// Interrupt handlers currently entered
    irq_depth: AtomicUsize,

    /// Yield requested by an interrupt handler, honoured on return
    yield_on_return: AtomicBool,
}

impl<P: Platform + 'static> SchedulerManager<P> {
    /// Initialize the scheduler, turning the running code into thread "main"
    ///
    /// Interrupts must be disabled.
    pub fn new(platform: P, config: SchedConfig) -> Self {
        assert!(!platform.are_enabled(), "scheduler init: interrupts must be disabled");

        let sched = Scheduler::new(&config);
        log::info!(
            "Scheduler initialized: {} policy, {} tick time slice, {} Hz timer",
            sched.policy_name(),
            config.time_slice.get(),
            config.timer_freq
        );

        Self {
            sched: Mutex::new(sched),
            platform,
            ticks: TickCounter::new(),
            irq_depth: AtomicUsize::new(0),
            yield_on_return: AtomicBool::new(false),
        }
    }

    /// Create the idle thread and enable interrupts
    pub fn start(&'static self) -> Result<ThreadId, SchedError> {
        let page = self
            .platform
            .alloc_zeroed_page()
            .ok_or(SchedError::AllocationFailure)?;

        let tid = {
            let mut guard = self.lock();
            let tid = guard.register_idle(page);
            self.prepare(&guard, tid, Box::new(move |prev| self.idle_main(prev)));
            tid
        };
        log::info!("Idle thread created ({})", tid);

        self.platform.enable();
        log::info!("Scheduler started - preemptive multitasking active");
        Ok(tid)
    }

    // ========================================================================
    // ACCESS
    // ========================================================================

    /// Disable interrupts and lock the scheduler
    pub fn lock(&self) -> SchedGuard<'_, P> {
        let intr = DisableInterrupts::new(&self.platform);
        let sched = self.sched.lock();
        SchedGuard { sched, intr }
    }

    /// Run a closure on the scheduler with preemption disabled
    pub fn with_scheduler<R>(&self, f: impl FnOnce(&mut Scheduler) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Timer ticks since boot
    pub fn ticks(&self) -> Tick {
        self.ticks.now()
    }

    /// Whether an interrupt handler is running
    pub fn in_interrupt(&self) -> bool {
        self.irq_depth.load(Ordering::SeqCst) > 0
    }

    /// Mark the start of an interrupt handler body
    ///
    /// Called by the ISR with interrupts disabled.
    pub fn enter_interrupt(&self) {
        self.irq_depth.fetch_add(1, Ordering::SeqCst);
    }

    /// Mark the end of an interrupt handler body
    ///
    /// Leaving the outermost handler performs the yield requested while it
    /// ran, so this may switch threads before returning.
    pub fn leave_interrupt(&self) {
        let depth = self.irq_depth.load(Ordering::SeqCst);
        assert!(depth > 0, "leave_interrupt: not in interrupt context");
        self.irq_depth.store(depth - 1, Ordering::SeqCst);

        if depth == 1 && self.yield_on_return.swap(false, Ordering::SeqCst) {
            self.yield_now();
        }
    }

    // ========================================================================
    // THREAD LIFECYCLE
    // ========================================================================

    /// Create a kernel thread running `entry`
    ///
    /// The thread is READY when this returns. If it outranks the creator it
    /// has already run by then.
    pub fn create<F>(&'static self, name: &str, priority: Priority, entry: F) -> Result<ThreadId, SchedError>
    where
        F: FnOnce() + Send + 'static,
    {
        assert!(!self.in_interrupt(), "create: called from interrupt context");

        let page = match self.platform.alloc_zeroed_page() {
            Some(page) => page,
            None => {
                log::warn!("create: no memory for thread '{}'", name);
                return Err(SchedError::AllocationFailure);
            }
        };

        let mut guard = self.lock();
        let tid = guard.register_thread(name, priority, page);
        let entry: Box<dyn FnOnce() + Send> = Box::new(entry);
        self.prepare(&guard, tid, Box::new(move |prev| self.thread_main(prev, entry)));
        guard.unblock(tid);

        let prio = guard.registry().thread(tid).priority;
        log::info!("Created {} '{}' at priority {}", tid, name, prio);

        if prio > guard.current().priority {
            let token = guard.yield_current();
            drop(self.switch_out(guard, token));
        }
        Ok(tid)
    }

    /// Block the running thread until another thread unblocks it
    ///
    /// Takes the guard the caller used to register itself wherever it waits,
    /// so the two steps are atomic.
    pub fn block(&self, mut guard: SchedGuard<'_, P>) {
        assert!(!self.in_interrupt(), "block: called from interrupt context");
        assert!(!self.platform.are_enabled(), "block: interrupts enabled");

        let token = guard.block_current();
        drop(self.switch_out(guard, token));
    }

    /// BLOCKED -> READY without preempting the caller
    pub fn unblock(&self, tid: ThreadId) {
        self.lock().unblock(tid);
    }

    /// Give up the CPU; the caller stays READY at its priority position
    pub fn yield_now(&self) {
        assert!(!self.in_interrupt(), "yield: called from interrupt context");

        let mut guard = self.lock();
        let token = guard.yield_current();
        drop(self.switch_out(guard, token));
    }

    /// Terminate the running thread
    pub fn exit(&self) -> ! {
        assert!(!self.in_interrupt(), "exit: called from interrupt context");

        let mut guard = self.lock();
        log::debug!("{} '{}' exiting", guard.current_id(), guard.current().name());
        let token = guard.exit_current();
        self.switch_out(guard, Some(token)).forget();
        unreachable!("exit: dead thread was resumed");
    }

    /// Yield if a ready thread strictly outranks the running one
    ///
    /// From interrupt context the yield is deferred to the return from the
    /// interrupt. Returns whether a yield was performed or requested.
    pub fn try_yield_if_outranked(&self) -> bool {
        let outranked = self.lock().is_outranked();
        if !outranked {
            return false;
        }
        if self.in_interrupt() {
            self.yield_on_return.store(true, Ordering::SeqCst);
        } else {
            self.yield_now();
        }
        true
    }

    /// Flag a thread as running a user program
    pub fn mark_user(&self, tid: ThreadId) {
        self.lock().mark_user(tid);
    }

    // ========================================================================
    // SLEEP
    // ========================================================================

    /// Sleep until the tick counter reaches `deadline`
    pub fn sleep_until(&self, deadline: Tick) {
        assert!(!self.in_interrupt(), "sleep: called from interrupt context");

        let mut guard = self.lock();
        let token = guard.sleep_current(deadline);
        drop(self.switch_out(guard, token));
    }

    /// Sleep for `ticks` timer ticks; non-positive durations return at once
    pub fn sleep(&self, ticks: i64) {
        if ticks <= 0 {
            return;
        }
        assert!(!self.in_interrupt(), "sleep: called from interrupt context");

        let mut guard = self.lock();
        let deadline = self.ticks.now() + ticks as Tick;
        let token = guard.sleep_current(deadline);
        drop(self.switch_out(guard, token));
    }

    // ========================================================================
    // TIMER
    // ========================================================================

    /// Timer interrupt handler body
    ///
    /// Advances the tick counter, runs the per-tick scheduler work and, once
    /// out of interrupt context, yields if preemption was requested.
    ///
    /// The ISR must acknowledge the interrupt (EOI) before calling this: the
    /// trailing yield switches stacks, and the interrupted thread may not
    /// return through the handler for a long time.
    pub fn timer_interrupt(&self) {
        self.enter_interrupt();
        let preempt = {
            let mut guard = self.lock();
            let now = self.ticks.advance();
            guard.on_tick(now)
        };
        if preempt {
            self.yield_on_return.store(true, Ordering::SeqCst);
        }
        self.leave_interrupt();
    }

    // ========================================================================
    // PRIORITY / MLFQS
    // ========================================================================

    /// Set the running thread's base priority (ignored under MLFQS)
    pub fn set_priority(&self, priority: Priority) {
        self.lock().set_priority(priority);
    }

    /// Effective priority of the running thread
    pub fn get_priority(&self) -> Priority {
        self.lock().priority()
    }

    /// Set the running thread's nice value and yield if it no longer ranks first
    pub fn set_nice(&self, nice: i32) {
        self.lock().set_nice(nice);
        self.try_yield_if_outranked();
    }

    pub fn get_nice(&self) -> i32 {
        self.lock().nice()
    }

    /// 100 times the system load average, rounded
    pub fn get_load_avg(&self) -> i32 {
        self.lock().load_avg_x100()
    }

    /// 100 times the running thread's recent CPU, rounded
    pub fn get_recent_cpu(&self) -> i32 {
        self.lock().recent_cpu_x100()
    }

    // ========================================================================
    // LOCK HOOKS
    // ========================================================================

    pub fn register_lock(&self) -> LockId {
        self.lock().register_lock()
    }

    pub fn unregister_lock(&self, lock: LockId) {
        self.lock().unregister_lock(lock);
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Id of the running thread
    pub fn current(&self) -> ThreadId {
        self.lock().current().id
    }

    /// Name of the running thread
    pub fn name(&self) -> ThreadName {
        self.lock().current().name.clone()
    }

    /// Visit every registered thread with preemption disabled
    pub fn for_each<F: FnMut(&Thread)>(&self, f: F) {
        self.lock().for_each(f);
    }

    pub fn stats(&self) -> TickStats {
        self.lock().stats()
    }

    /// Log idle/kernel/user tick counts
    pub fn print_stats(&self) {
        let stats = self.stats();
        log::info!("{}", stats);
    }

    // ========================================================================
    // SWITCHING
    // ========================================================================

    /// Hand a new thread's entry frame to the platform
    fn prepare(&self, sched: &Scheduler, tid: ThreadId, start: ThreadStart) {
        let page = match sched.thread(tid).and_then(|t| t.page.as_ref()) {
            Some(page) => page,
            None => panic!("prepare: {} has no page", tid),
        };
        self.platform.prepare(tid, page, start);
    }

    /// Perform the switch described by `token`, if any
    ///
    /// Returns once this thread runs again, with interrupts still disabled;
    /// dropping the returned guard restores the caller's level.
    fn switch_out<'a>(&'a self, guard: SchedGuard<'a, P>, token: Option<SwitchToken>) -> DisableInterrupts<'a, P> {
        let intr = guard.unlock();
        if let Some(token) = token {
            // SAFETY: interrupts are off, `from` is the running context and
            // the state machine only picks prepared or switched-out threads.
            let prev = unsafe { self.platform.switch_threads(token.from, token.to) };
            self.finish_switch(prev);
        }
        intr
    }

    /// Second half of a switch, run by whichever thread now owns the CPU
    fn finish_switch(&self, prev: ThreadId) {
        let reclaimed = self.sched.lock().finish_switch(Some(PrevThread::new(prev)));
        if let Some(Reclaimed { tid, page }) = reclaimed {
            self.platform.discard(tid);
            if let Some(page) = page {
                self.platform.free_page(page);
            }
            log::debug!("Reclaimed {}", tid);
        }
    }

    /// First code run by every created thread; never returns
    fn thread_main(&'static self, prev: ThreadId, entry: Box<dyn FnOnce() + Send>) {
        self.finish_switch(prev);
        self.platform.enable();
        entry();
        self.exit()
    }

    /// Idle thread body: runs only when nothing else is ready; never returns
    fn idle_main(&'static self, prev: ThreadId) {
        self.finish_switch(prev);
        loop {
            let mut guard = self.lock();
            let token = guard.block_current();
            // Stay disabled until the halt so no wakeup slips in between
            self.switch_out(guard, token).forget();
            self.platform.enable_and_hlt();
        }
    }
}
