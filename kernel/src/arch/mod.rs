/*
 * Architecture Abstraction Layer
 *
 * Hardware-facing implementations of the scheduler's platform traits. The
 * scheduler core is architecture independent; everything that executes
 * privileged instructions lives under this module.
 *
 * Currently only x86_64 is supported, and only interrupt control is provided
 * here: stack switching and page allocation are supplied by the embedding
 * kernel through the ContextSwitch and PageAllocator traits.
 */

#[cfg(target_arch = "x86_64")]
pub mod x86_64;
