/*
 * Scheduling Policies Module
 *
 * This module contains the scheduling policy implementations. Each policy
 * implements the SchedPolicy trait and is selected once at boot from the
 * scheduler configuration.
 *
 * Available policies:
 * - Priority: strict priority scheduling with donation (default)
 * - Mlfqs: multi-level feedback queue with derived priorities
 */

use alloc::boxed::Box;

use super::{config::SchedConfig, traits::SchedPolicy, types::SchedMode};

pub mod mlfqs;
pub mod priority;

pub use mlfqs::MlfqsPolicy;
pub use priority::PriorityPolicy;

/// Build the policy selected by the configuration
pub fn from_config(config: &SchedConfig) -> Box<dyn SchedPolicy> {
    match config.mode {
        SchedMode::Priority => Box::new(PriorityPolicy::new()),
        SchedMode::Mlfqs => Box::new(MlfqsPolicy::new(config.timer_freq)),
    }
}
