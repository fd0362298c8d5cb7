//! Hardware Abstraction Layer (hal)
//!
//! The HAL owns the interrupt architecture of the machine:
//!
//! - **IRQL tables**: per-level unmask masks for the 32 priority levels
//! - **PIC driver**: the two cascaded 8259 chips and their port seam
//! - **Dispatch engine**: admission, pending/in-service bitmaps, drain loop
//! - **Software interrupts**: the APC and DISPATCH level requesters
//! - **Clock service**: timekeeping and quantum accounting
//!
//! # IRQL Management
//!
//! Raising the IRQL is the only synchronization primitive in this layer:
//! - `InterruptController::raise_irql` / `lower_irql`
//! - `InterruptController::current_irql`
//!
//! Lowering drains every pending source the drop unmasked before returning,
//! which is what preserves strict priority ordering end to end.

pub mod clock;
pub mod interrupt;
pub mod irql;
pub mod pic;
pub mod softint;

#[cfg(target_arch = "x86_64")]
pub mod global;

pub use clock::{clock_service_routine, CLOCK_INCREMENT_MS, CLOCK_LINE, CLOCK_QUANTUM_DECREMENT};
pub use interrupt::{
    ConnectError, InterruptController, InterruptDisposition, InterruptMode, KInterrupt,
    KServiceRoutine, ACTIVE_IRQ_MASK,
};
pub use irql::{
    controller_mask, hal_get_interrupt_vector, unmask_mask, Kirql, IDT_INT_VECTOR_BASE,
    IRQL_OFFSET_FOR_IRQ, MAX_BUS_INTERRUPT_LEVEL, PIC_IRQ_COUNT,
};
pub use pic::{PicChip, PicIo};
