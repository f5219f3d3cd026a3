/*
 * Interrupt Management Module
 *
 * This module implements InterruptControl on top of the x86_64 interrupt
 * flag. The scheduler uses it to build its critical sections and the idle
 * thread uses enable_and_hlt() to wait for the next interrupt.
 *
 * Why this is important:
 * - On a single CPU, clearing IF is the only synchronization the scheduler
 *   needs
 * - sti; hlt must be issued back to back: an interrupt arriving between a
 *   separate enable and halt would be lost until the next one
 */

use x86_64::instructions::interrupts;

use crate::scheduler::traits::InterruptControl;

/// Interrupt control for the running x86_64 CPU
#[derive(Debug, Default, Clone, Copy)]
pub struct X86Interrupts;

impl InterruptControl for X86Interrupts {
    fn are_enabled(&self) -> bool {
        interrupts::are_enabled()
    }

    fn enable(&self) {
        interrupts::enable();
    }

    fn disable(&self) {
        interrupts::disable();
    }

    /// Atomically enable interrupts and halt until the next one
    fn enable_and_hlt(&self) {
        interrupts::enable_and_hlt();
    }
}
