//! Halcyon kernel: HAL interrupt subsystem
//!
//! An NT-style interrupt request level (IRQL) dispatch engine for a
//! uniprocessor machine with two cascaded 8259 interrupt controllers.
//!
//! The subsystem decides, for every hardware and software interrupt source,
//! whether it may run now, must be deferred, or was spurious, while
//! preserving strict priority ordering between the 32 IRQLs:
//!
//! - `hal::irql`: the per-IRQL unmask tables and vector mapping
//! - `hal::pic`: the dual-8259 controller driver and its port seam
//! - `hal::interrupt`: admission logic, dispatch loop, entry trampoline
//! - `hal::softint`: APC/DPC software interrupt requesters
//! - `hal::clock`: clock interrupt service and time accounting
//! - `ke`: the boundary types consumed from the kernel executive
//!
//! The whole engine runs with interrupts disabled except for the short
//! explicit re-enable windows inside the admission logic; raising IRQL is
//! the only synchronization primitive used.

#![cfg_attr(not(test), no_std)]

pub mod hal;
pub mod ke;
