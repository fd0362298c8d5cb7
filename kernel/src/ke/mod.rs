//! Kernel Executive boundary (ke)
//!
//! The scheduler, the APC/DPC queue contents and the object manager live
//! outside this subsystem. This module carries only the types crossing the
//! boundary with the interrupt dispatch engine:
//!
//! - `KPRCB`: the per-processor flags and time buckets the engine reads and
//!   writes
//! - `KSystemTime`: the clocks the clock interrupt advances
//! - `KernelRoutines`: the callbacks the software-interrupt handlers invoke

pub mod prcb;
pub mod routines;
pub mod time;

pub use prcb::KPrcb;
pub use routines::{KernelRoutines, QuantumEndRoutine, QueueDrainRoutine, SwapContextRoutine};
pub use time::KSystemTime;
