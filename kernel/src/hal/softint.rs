//! Software interrupt requesters
//!
//! Two synthetic sources, APC_LEVEL and DISPATCH_LEVEL, reuse the same
//! pending/mask/dispatch machinery as the hardware lines. The rest of the
//! kernel requests them to schedule deferred work; the built-in handlers
//! raise IRQL to their own level, call out through the registered kernel
//! routines, and drain on the way down, the same discipline every hardware
//! handler follows.

use crate::hal::interrupt::InterruptController;
use crate::hal::irql::{irql, unmask_mask, Kirql};
use crate::hal::pic::PicIo;

impl<P: PicIo> InterruptController<P> {
    /// Request a software interrupt at APC_LEVEL or DISPATCH_LEVEL.
    ///
    /// If the current IRQL already permits the level, its handler runs
    /// immediately (re-entering the dispatch machinery); otherwise the
    /// request stays pending until a later IRQL drop drains it.
    pub fn request_software_interrupt(&mut self, request: Kirql) {
        debug_assert!(
            request == irql::APC_LEVEL || request == irql::DISPATCH_LEVEL,
            "no software source at IRQL {}",
            request
        );

        let was_enabled = self.pic.disable_interrupts();

        self.pending |= 1 << request;
        if unmask_mask(self.irql) & (1 << request) != 0 {
            match request {
                irql::APC_LEVEL => self.sw_int_apc(),
                _ => self.sw_int_dpc(),
            }
        }

        self.pic.restore_interrupts(was_enabled);
    }

    /// APC-level handler: deliver the asynchronous procedure call queue.
    ///
    /// On entry, interrupts must be disabled.
    pub(crate) fn sw_int_apc(&mut self) {
        let saved_irql = self.irql;
        self.irql = irql::APC_LEVEL;
        self.pending &= !(1u32 << irql::APC_LEVEL);

        self.pic.enable_interrupts();
        if let Some(execute_apc_queue) = self.routines.execute_apc_queue {
            execute_apc_queue();
        }
        self.pic.disable_interrupts();

        self.irql = saved_irql;
        self.check_unmasked_int();
    }

    /// DISPATCH-level handler: retire the DPC queue, then honor a quantum
    /// end or an already-selected next thread.
    ///
    /// On entry, interrupts must be disabled.
    pub(crate) fn sw_int_dpc(&mut self) {
        let saved_irql = self.irql;
        self.irql = irql::DISPATCH_LEVEL;
        self.pending &= !(1u32 << irql::DISPATCH_LEVEL);

        if self.prcb.dpc_pending {
            self.prcb.dpc_pending = false;
            self.prcb.dpc_routine_active = true;
            if let Some(execute_dpc_queue) = self.routines.execute_dpc_queue {
                execute_dpc_queue();
            }
            self.prcb.dpc_routine_active = false;
        }

        self.pic.enable_interrupts();
        if self.prcb.quantum_end {
            self.prcb.quantum_end = false;
            let switch = self
                .routines
                .quantum_end
                .map(|quantum_end| quantum_end())
                .unwrap_or(false);
            if switch {
                if let Some(swap_context) = self.routines.swap_context {
                    swap_context();
                }
            }
        } else if self.prcb.next_thread_selected {
            self.prcb.next_thread_selected = false;
            if let Some(swap_context) = self.routines.swap_context {
                swap_context();
            }
        }
        self.pic.disable_interrupts();

        self.irql = saved_irql;
        self.check_unmasked_int();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::pic::testing::RecordingPic;
    use std::sync::atomic::{AtomicU32, Ordering};

    type Controller = InterruptController<RecordingPic>;

    fn controller() -> Controller {
        InterruptController::new(RecordingPic::new())
    }

    #[test]
    fn test_request_at_passive_runs_immediately() {
        static APC_RUNS: AtomicU32 = AtomicU32::new(0);

        fn drain_apcs() {
            APC_RUNS.fetch_add(1, Ordering::Relaxed);
        }

        let mut ctrl = controller();
        ctrl.routines.execute_apc_queue = Some(drain_apcs);

        ctrl.request_software_interrupt(irql::APC_LEVEL);

        assert_eq!(APC_RUNS.load(Ordering::Relaxed), 1);
        assert_eq!(ctrl.pending_sources() & (1 << irql::APC_LEVEL), 0);
        assert_eq!(ctrl.current_irql(), irql::PASSIVE_LEVEL);
    }

    #[test]
    fn test_request_above_level_stays_pending() {
        static DPC_RUNS: AtomicU32 = AtomicU32::new(0);

        fn drain_dpcs() {
            DPC_RUNS.fetch_add(1, Ordering::Relaxed);
        }

        let mut ctrl = controller();
        ctrl.routines.execute_dpc_queue = Some(drain_dpcs);
        ctrl.prcb.dpc_pending = true;

        let old = ctrl.raise_irql(irql::IDE_LEVEL);
        ctrl.request_software_interrupt(irql::DISPATCH_LEVEL);

        assert_eq!(DPC_RUNS.load(Ordering::Relaxed), 0);
        assert_ne!(ctrl.pending_sources() & (1 << irql::DISPATCH_LEVEL), 0);

        ctrl.lower_irql(old);

        assert_eq!(DPC_RUNS.load(Ordering::Relaxed), 1);
        assert_eq!(ctrl.pending_sources(), 0);
    }

    #[test]
    fn test_apc_masked_while_dpc_unmasked() {
        static APC_RUNS: AtomicU32 = AtomicU32::new(0);

        fn drain_apcs() {
            APC_RUNS.fetch_add(1, Ordering::Relaxed);
        }

        let mut ctrl = controller();
        ctrl.routines.execute_apc_queue = Some(drain_apcs);

        let old = ctrl.raise_irql(irql::APC_LEVEL);
        ctrl.request_software_interrupt(irql::APC_LEVEL);
        // APC_LEVEL is masked at its own level
        assert_eq!(APC_RUNS.load(Ordering::Relaxed), 0);

        ctrl.lower_irql(old);
        assert_eq!(APC_RUNS.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_dpc_handler_consumes_quantum_end() {
        static QUANTUM_ENDS: AtomicU32 = AtomicU32::new(0);
        static SWAPS: AtomicU32 = AtomicU32::new(0);

        fn quantum_end() -> bool {
            QUANTUM_ENDS.fetch_add(1, Ordering::Relaxed);
            true
        }

        fn swap_context() {
            SWAPS.fetch_add(1, Ordering::Relaxed);
        }

        let mut ctrl = controller();
        ctrl.routines.quantum_end = Some(quantum_end);
        ctrl.routines.swap_context = Some(swap_context);
        ctrl.prcb.quantum_end = true;

        ctrl.request_software_interrupt(irql::DISPATCH_LEVEL);

        assert_eq!(QUANTUM_ENDS.load(Ordering::Relaxed), 1);
        assert_eq!(SWAPS.load(Ordering::Relaxed), 1);
        assert!(!ctrl.prcb.quantum_end);
    }

    #[test]
    fn test_dpc_handler_switches_to_selected_thread() {
        static SWAPS: AtomicU32 = AtomicU32::new(0);

        fn swap_context() {
            SWAPS.fetch_add(1, Ordering::Relaxed);
        }

        let mut ctrl = controller();
        ctrl.routines.swap_context = Some(swap_context);
        ctrl.prcb.next_thread_selected = true;

        ctrl.request_software_interrupt(irql::DISPATCH_LEVEL);

        assert_eq!(SWAPS.load(Ordering::Relaxed), 1);
        assert!(!ctrl.prcb.next_thread_selected);
    }

    #[test]
    fn test_drain_runs_dpc_before_apc() {
        static ORDER: AtomicU32 = AtomicU32::new(0);
        static DPC_SLOT: AtomicU32 = AtomicU32::new(99);
        static APC_SLOT: AtomicU32 = AtomicU32::new(99);

        fn drain_dpcs() {
            DPC_SLOT.store(ORDER.fetch_add(1, Ordering::Relaxed), Ordering::Relaxed);
        }

        fn drain_apcs() {
            APC_SLOT.store(ORDER.fetch_add(1, Ordering::Relaxed), Ordering::Relaxed);
        }

        let mut ctrl = controller();
        ctrl.routines.execute_dpc_queue = Some(drain_dpcs);
        ctrl.routines.execute_apc_queue = Some(drain_apcs);
        ctrl.prcb.dpc_pending = true;

        let old = ctrl.raise_irql(irql::IDE_LEVEL);
        ctrl.request_software_interrupt(irql::APC_LEVEL);
        ctrl.request_software_interrupt(irql::DISPATCH_LEVEL);
        ctrl.lower_irql(old);

        // DISPATCH outranks APC in the bit-scan
        assert_eq!(DPC_SLOT.load(Ordering::Relaxed), 0);
        assert_eq!(APC_SLOT.load(Ordering::Relaxed), 1);
    }
}
