//! Kernel executive callbacks
//!
//! The dispatch engine never walks the APC/DPC queues or picks threads
//! itself; it calls out through this table wherever control crosses into
//! the executive. Unset entries are simply skipped, which keeps the engine
//! testable in isolation.

/// Drains the APC or DPC queue of the current processor
pub type QueueDrainRoutine = fn();

/// Handles a quantum expiry; returns whether a new thread was selected
pub type QuantumEndRoutine = fn() -> bool;

/// Switches to the thread the scheduler selected
pub type SwapContextRoutine = fn();

/// Callbacks consumed by the software-interrupt handlers
pub struct KernelRoutines {
    /// Called at APC_LEVEL by the APC handler
    pub execute_apc_queue: Option<QueueDrainRoutine>,
    /// Called at DISPATCH_LEVEL by the DPC handler while the queue is marked
    /// non-empty
    pub execute_dpc_queue: Option<QueueDrainRoutine>,
    /// Called when the DPC handler observes the quantum-end flag
    pub quantum_end: Option<QuantumEndRoutine>,
    /// Called to switch context after a quantum end or next-thread selection
    pub swap_context: Option<SwapContextRoutine>,
}

impl KernelRoutines {
    pub const fn new() -> Self {
        Self {
            execute_apc_queue: None,
            execute_dpc_queue: None,
            quantum_end: None,
            swap_context: None,
        }
    }
}

impl Default for KernelRoutines {
    fn default() -> Self {
        Self::new()
    }
}
