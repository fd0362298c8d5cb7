//! Clock interrupt service
//!
//! The clock line (line 0) drives system timekeeping and thread quantum
//! accounting. The service routine runs at CLOCK_LEVEL through the common
//! trampoline like any other line; the elapsed wall time is charged to the
//! kernel, DPC or interrupt bucket depending on what the tick interrupted,
//! and an expired quantum requests the DISPATCH software interrupt so the
//! scheduler can act once the IRQL drops.

use crate::hal::interrupt::InterruptController;
use crate::hal::irql::irql;
use crate::hal::pic::PicIo;

/// Bus line of the clock interrupt
pub const CLOCK_LINE: u32 = 0;

/// Clock increment between ticks, in milliseconds
pub const CLOCK_INCREMENT_MS: u32 = 1;

/// Quantum units a thread burns per elapsed millisecond
pub const CLOCK_QUANTUM_DECREMENT: i32 = 3;

impl<P: PicIo> InterruptController<P> {
    /// Advance the system clocks and charge the elapsed time.
    ///
    /// Called from the clock service routine at CLOCK_LEVEL. The bucket is
    /// selected by the IRQL the tick interrupted: below DISPATCH the time is
    /// thread kernel time, at DISPATCH it is DPC time while a DPC routine is
    /// active, above DISPATCH it is interrupt time.
    pub fn ke_update_system_time(&mut self, elapsed_ms: u32) {
        self.time.advance(elapsed_ms);

        let interrupted = self.prcb.interrupted_irql;
        if interrupted < irql::DISPATCH_LEVEL {
            self.prcb.kernel_time += elapsed_ms as u64;
        } else if interrupted > irql::DISPATCH_LEVEL {
            self.prcb.interrupt_time += elapsed_ms as u64;
        } else if self.prcb.dpc_routine_active {
            self.prcb.dpc_time += elapsed_ms as u64;
        } else {
            self.prcb.kernel_time += elapsed_ms as u64;
        }

        // The idle thread never has its quantum expire
        if self.prcb.idle_thread_active {
            return;
        }

        self.prcb.thread_quantum -= CLOCK_QUANTUM_DECREMENT * elapsed_ms as i32;
        if self.prcb.thread_quantum <= 0 {
            self.prcb.quantum_end = true;
            self.request_software_interrupt(irql::DISPATCH_LEVEL);
        }
    }
}

/// Ready-made service routine for the clock line
pub fn clock_service_routine<P: PicIo>(ctrl: &mut InterruptController<P>, _context: usize) -> bool {
    ctrl.ke_update_system_time(CLOCK_INCREMENT_MS);
    true
}
