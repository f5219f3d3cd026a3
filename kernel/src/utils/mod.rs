/*
 * Kernel Utilities
 *
 * Small, dependency-free building blocks shared by the scheduler:
 * - fixed_point: 17.14 signed fixed-point reals for the MLFQS recurrences
 * - timer: the monotonic tick counter driven by the timer interrupt
 */

pub mod fixed_point;
pub mod timer;

pub use fixed_point::FixedPoint;
pub use timer::{TickCounter, TIMER_FREQ};
