/*
 * MLFQS Scheduling Policy
 *
 * This module implements the multi-level feedback queue scheduler. Priorities
 * are never set by threads; they are derived from each thread's nice value
 * and an exponentially decaying estimate of the CPU time it recently used.
 *
 * Recurrences (17.14 fixed point, see utils::fixed_point):
 *
 *   every tick:       recent_cpu(running) += 1            (not for idle)
 *   every 4 ticks:    priority = PRI_MAX - round(recent_cpu / 4) - 2 * nice
 *   every second:     load_avg   = (59/60) * load_avg + (1/60) * ready_threads
 *                     recent_cpu = (2*load_avg)/(2*load_avg + 1) * recent_cpu + nice
 *
 * where ready_threads counts the ready collection plus the running thread
 * unless that is the idle thread. Priorities are clamped to
 * [PRI_MIN, PRI_MAX]. The 59/60 and 1/60 factors are computed in fixed
 * point by division, so the results are reproducible to the bit.
 *
 * Why this is important:
 * - CPU-bound threads drift down, I/O-bound threads float up
 * - Nice gives owners coarse control without fixing priorities
 * - The ready collection is re-sorted after every recomputation so the
 *   dispatch rule (front = best) keeps holding
 */

use super::super::{
    Thread,
    traits::{KernelSchedCtx, SchedPolicy},
    types::{Priority, SchedMode, Tick},
};
use crate::utils::fixed_point::FixedPoint;

/// Ticks between priority recomputations
pub const PRIORITY_INTERVAL: Tick = 4;

/// MLFQS policy state
#[derive(Debug)]
pub struct MlfqsPolicy {
    /// System load average
    load_avg: FixedPoint,

    /// Timer ticks per second; load and recent CPU are recomputed this often
    timer_freq: u32,
}

impl MlfqsPolicy {
    pub fn new(timer_freq: u32) -> Self {
        assert!(timer_freq > 0, "mlfqs: timer frequency must be non-zero");
        Self {
            load_avg: FixedPoint::ZERO,
            timer_freq,
        }
    }

    /// Priority for the given recent CPU and nice value
    pub fn priority_for(recent_cpu: FixedPoint, nice: i32) -> Priority {
        let raw = Priority::MAX.0 - recent_cpu.div_int(4).to_int_round() - nice * 2;
        Priority(raw).clamp()
    }

    /// Recompute a thread's derived priority
    ///
    /// Donation is off in this mode, so base and effective move together.
    pub fn update_priority(thread: &mut Thread) {
        if thread.is_idle() {
            return;
        }
        let prio = Self::priority_for(thread.recent_cpu, thread.nice);
        thread.base_priority = prio;
        thread.priority = prio;
    }

    /// Once-per-second recomputation of load average and recent CPU
    pub fn recompute_cpu_and_load(&mut self, ctx: &mut dyn KernelSchedCtx) {
        let current = ctx.current_thread();
        let running = if ctx.is_idle(current) { 0 } else { 1 };
        let ready_threads = (ctx.ready_count() + running) as i32;

        let decay = FixedPoint::from_int(59) / FixedPoint::from_int(60);
        let weight = FixedPoint::from_int(1) / FixedPoint::from_int(60);
        self.load_avg = decay * self.load_avg + weight * FixedPoint::from_int(ready_threads);

        let twice_load = self.load_avg.mul_int(2);
        let coeff = twice_load / twice_load.add_int(1);

        ctx.for_each_thread(&mut |t| {
            if t.is_idle() {
                return;
            }
            t.recent_cpu = (t.recent_cpu * coeff).add_int(t.nice);
            Self::update_priority(t);
        });
        ctx.resort_ready();
    }

    /// Recompute every thread's priority and restore ready order
    pub fn recompute_priorities(&mut self, ctx: &mut dyn KernelSchedCtx) {
        ctx.for_each_thread(&mut |t| Self::update_priority(t));
        ctx.resort_ready();
    }
}

impl SchedPolicy for MlfqsPolicy {
    fn name(&self) -> &'static str {
        "MLFQS"
    }

    fn mode(&self) -> SchedMode {
        SchedMode::Mlfqs
    }

    fn on_thread_created(&mut self, parent: Option<&Thread>, child: &mut Thread) {
        if child.is_idle() {
            return;
        }
        match parent {
            Some(p) => {
                child.nice = p.nice;
                child.recent_cpu = p.recent_cpu;
            }
            None => {
                child.nice = 0;
                child.recent_cpu = FixedPoint::ZERO;
            }
        }
        Self::update_priority(child);
    }

    fn on_tick(&mut self, ctx: &mut dyn KernelSchedCtx, now: Tick) -> bool {
        let current = ctx.current_thread();
        if !ctx.is_idle(current) {
            if let Some(t) = ctx.thread_mut(current) {
                t.recent_cpu = t.recent_cpu.add_int(1);
            }
        }

        let mut recomputed = false;
        if now % self.timer_freq as Tick == 0 {
            self.recompute_cpu_and_load(ctx);
            recomputed = true;
        }
        if now % PRIORITY_INTERVAL == 0 {
            self.recompute_priorities(ctx);
            recomputed = true;
        }

        recomputed && ctx.is_outranked()
    }

    fn on_nice_changed(&mut self, thread: &mut Thread) {
        Self::update_priority(thread);
    }

    fn load_avg(&self) -> FixedPoint {
        self.load_avg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{
        ThreadId,
        registry::Registry,
        thread::ThreadFlags,
    };

    fn boot(policy: &mut MlfqsPolicy) -> Registry {
        let mut main = Thread::new(ThreadId(1), "main", Priority::DEFAULT, None);
        policy.on_thread_created(None, &mut main);
        Registry::new(main)
    }

    fn hundredths(x: FixedPoint) -> i32 {
        x.mul_int_round(100)
    }

    #[test]
    fn test_priority_formula() {
        assert_eq!(MlfqsPolicy::priority_for(FixedPoint::ZERO, 0), Priority::MAX);
        assert_eq!(MlfqsPolicy::priority_for(FixedPoint::from_int(40), 0), Priority(53));
        assert_eq!(MlfqsPolicy::priority_for(FixedPoint::ZERO, 20), Priority(23));
        assert_eq!(MlfqsPolicy::priority_for(FixedPoint::ZERO, -20), Priority::MAX);
        assert_eq!(MlfqsPolicy::priority_for(FixedPoint::from_int(400), 20), Priority::MIN);
    }

    #[test]
    fn test_primordial_starts_at_max() {
        let mut policy = MlfqsPolicy::new(100);
        let reg = boot(&mut policy);
        let main = reg.thread(ThreadId(1));
        assert_eq!(main.priority, Priority::MAX);
        assert_eq!(main.nice, 0);
        assert_eq!(main.recent_cpu, FixedPoint::ZERO);
    }

    #[test]
    fn test_one_second_single_thread() {
        let mut policy = MlfqsPolicy::new(100);
        let mut reg = boot(&mut policy);
        let main = ThreadId(1);

        for now in 1..=100 {
            policy.on_tick(&mut reg, now);
            match now {
                3 => assert_eq!(reg.thread(main).priority, Priority::MAX),
                4 => assert_eq!(reg.thread(main).priority, Priority(62)),
                40 => assert_eq!(reg.thread(main).priority, Priority(53)),
                _ => {}
            }
        }

        // 1/60 of one ready thread
        assert_eq!(policy.load_avg().raw(), 273);
        assert_eq!(hundredths(policy.load_avg()), 2);
        assert_eq!(hundredths(reg.thread(main).recent_cpu), 322);
        assert_eq!(reg.thread(main).priority, Priority(62));
    }

    #[test]
    fn test_three_runnable_threads_with_nice() {
        let mut policy = MlfqsPolicy::new(100);
        let mut reg = boot(&mut policy);

        // main runs every tick; two more threads wait in the ready collection
        let main = ThreadId(1);
        let (a, b) = (ThreadId(2), ThreadId(3));
        reg.thread_mut(main).nice = 3;
        for (tid, nice) in [(a, 2), (b, 3)] {
            let mut t = Thread::new(tid, "t", Priority::DEFAULT, None);
            policy.on_thread_created(None, &mut t);
            t.nice = nice;
            reg.insert(t);
            reg.push_ready(tid);
        }

        // Independent 17.14 arithmetic on raw values
        const F: i64 = 1 << 14;
        let mul = |x: i64, y: i64| x * y / F;
        let div = |x: i64, y: i64| x * F / y;
        let decay = div(59 * F, 60 * F);
        let weight = div(F, 60 * F);
        let nice = [3, 2, 3];
        let mut load = 0i64;
        let mut recent = [0i64; 3];

        for now in 1..=500 {
            policy.on_tick(&mut reg, now);

            recent[0] += F;
            if now % 100 == 0 {
                load = mul(decay, load) + mul(weight, 3 * F);
                let twice = load * 2;
                let coeff = div(twice, twice + F);
                for (r, n) in recent.iter_mut().zip(nice) {
                    *r = mul(*r, coeff) + n * F;
                }
            }

            if now == 100 {
                // 3/60 of a thread; main's 100 ticks decayed by 1638/18022
                assert_eq!(policy.load_avg().raw(), 819);
                assert_eq!(reg.thread(main).recent_cpu.raw(), 100 * 1489 + 3 * F as i32);
                assert_eq!(reg.thread(a).recent_cpu, FixedPoint::from_int(2));
                assert_eq!(reg.thread(b).recent_cpu, FixedPoint::from_int(3));
            }
            if now % 100 == 0 {
                assert_eq!(policy.load_avg().raw() as i64, load, "load_avg at tick {}", now);
                for (tid, expected) in [main, a, b].into_iter().zip(recent) {
                    assert_eq!(
                        reg.thread(tid).recent_cpu.raw() as i64,
                        expected,
                        "recent_cpu of {} at tick {}",
                        tid,
                        now
                    );
                }
            }
        }

        assert_eq!(hundredths(policy.load_avg()), 24);
        let waiting = reg.thread(a);
        assert_eq!(waiting.priority, MlfqsPolicy::priority_for(waiting.recent_cpu, 2));
    }

    #[test]
    fn test_load_avg_converges_monotonically() {
        let mut policy = MlfqsPolicy::new(100);
        let mut reg = boot(&mut policy);

        let mut last = FixedPoint::ZERO;
        for second in 1..=30u64 {
            for now in (second - 1) * 100 + 1..=second * 100 {
                policy.on_tick(&mut reg, now);
            }
            let la = policy.load_avg();
            assert!(la > last, "load_avg stalled at second {}", second);
            assert!(la < FixedPoint::ONE);
            last = la;
        }
    }

    #[test]
    fn test_idle_is_not_charged() {
        let mut policy = MlfqsPolicy::new(2);
        let mut reg = boot(&mut policy);

        let idle = ThreadId(2);
        let mut t = Thread::new(idle, "idle", Priority::MIN, None);
        t.flags |= ThreadFlags::IDLE;
        policy.on_thread_created(reg.get(ThreadId(1)), &mut t);
        reg.insert(t);
        reg.set_idle(idle);

        // Park main and let idle run
        reg.thread_mut(ThreadId(1)).state = crate::scheduler::ThreadState::Blocked;
        reg.set_current(idle);
        reg.thread_mut(idle).state = crate::scheduler::ThreadState::Running;

        for now in 1..=4 {
            policy.on_tick(&mut reg, now);
        }
        assert_eq!(reg.thread(idle).recent_cpu, FixedPoint::ZERO);
        assert_eq!(reg.thread(idle).priority, Priority::MIN);
        assert_eq!(policy.load_avg(), FixedPoint::ZERO);
    }

    #[test]
    fn test_child_inherits_nice_and_recent_cpu() {
        let mut policy = MlfqsPolicy::new(100);
        let mut parent = Thread::new(ThreadId(1), "main", Priority::DEFAULT, None);
        parent.nice = 4;
        parent.recent_cpu = FixedPoint::from_int(8);

        let mut child = Thread::new(ThreadId(2), "child", Priority(10), None);
        policy.on_thread_created(Some(&parent), &mut child);
        assert_eq!(child.nice, 4);
        assert_eq!(child.recent_cpu, FixedPoint::from_int(8));
        assert_eq!(child.priority, Priority(53));
        assert_eq!(child.base_priority, Priority(53));
    }

    #[test]
    fn test_nice_change_recomputes() {
        let mut policy = MlfqsPolicy::new(100);
        let mut t = Thread::new(ThreadId(2), "t", Priority::DEFAULT, None);
        t.nice = 5;
        policy.on_nice_changed(&mut t);
        assert_eq!(t.priority, Priority(53));
    }

    #[test]
    fn test_requests_yield_when_outranked() {
        let mut policy = MlfqsPolicy::new(100);
        let mut reg = boot(&mut policy);

        let mut other = Thread::new(ThreadId(2), "other", Priority::DEFAULT, None);
        policy.on_thread_created(None, &mut other);
        reg.insert(other);
        reg.push_ready(ThreadId(2));

        // Equal priorities: no one is outranked yet
        assert!(!policy.on_tick(&mut reg, 1));
        assert!(!policy.on_tick(&mut reg, 2));
        assert!(!policy.on_tick(&mut reg, 3));

        // Main has used 4 ticks and drops to 62
        assert!(policy.on_tick(&mut reg, 4));
        assert_eq!(reg.thread(ThreadId(1)).priority, Priority(62));
    }
}
