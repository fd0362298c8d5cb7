//! Kernel Processor Control Block (KPRCB)
//!
//! Per-processor state shared between the dispatch engine and the kernel
//! executive. The scheduler and the DPC/APC queues live outside this
//! subsystem; the PRCB only carries the signals crossing that boundary:
//! the quantum-end and next-thread flags the DISPATCH-level handler
//! consumes, and the time buckets the clock service charges.

use crate::hal::irql::{irql, Kirql};

/// Default thread quantum, in clock-decrement units
pub const DEFAULT_THREAD_QUANTUM: i32 = 60;

/// Kernel Processor Control Block
pub struct KPrcb {
    /// Number of interrupts that have occurred
    pub interrupt_count: u32,
    /// IRQL that was current when the last arrival was accepted
    pub interrupted_irql: Kirql,
    /// A DPC routine is executing right now
    pub dpc_routine_active: bool,
    /// The DPC queue is non-empty (set by the executive when it queues)
    pub dpc_pending: bool,
    /// The current thread's quantum expired (set by the clock service,
    /// cleared by the DISPATCH-level handler)
    pub quantum_end: bool,
    /// The scheduler already selected a next thread
    pub next_thread_selected: bool,
    /// The idle thread is running; its quantum never expires
    pub idle_thread_active: bool,
    /// Remaining quantum of the current thread
    pub thread_quantum: i32,
    /// Time spent below DISPATCH_LEVEL, in ms
    pub kernel_time: u64,
    /// Time spent above DISPATCH_LEVEL, in ms
    pub interrupt_time: u64,
    /// Time spent executing DPC routines, in ms
    pub dpc_time: u64,
}

impl KPrcb {
    pub const fn new() -> Self {
        Self {
            interrupt_count: 0,
            interrupted_irql: irql::PASSIVE_LEVEL,
            dpc_routine_active: false,
            dpc_pending: false,
            quantum_end: false,
            next_thread_selected: false,
            idle_thread_active: false,
            thread_quantum: DEFAULT_THREAD_QUANTUM,
            kernel_time: 0,
            interrupt_time: 0,
            dpc_time: 0,
        }
    }
}

impl Default for KPrcb {
    fn default() -> Self {
        Self::new()
    }
}
