/*
 * x86_64 Architecture Support Module
 *
 * Submodules:
 * - interrupts: interrupt flag control (cli/sti/hlt) for the scheduler
 */

pub mod interrupts;

pub use interrupts::X86Interrupts;
