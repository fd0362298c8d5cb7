//! IRQL dispatch engine
//!
//! The correctness-critical core of the HAL: per-line admission, the pending
//! and in-service bitmaps, and the dispatch loop that drains deferred work in
//! strict priority order.
//!
//! # Architecture
//!
//! ```text
//! hardware line
//!       │
//!       ▼
//! ┌──────────────────┐  spurious / deferred / accepted
//! │  admission logic │──────────────────────────────────┐
//! └────────┬─────────┘                                  │
//!          ▼ accepted                                   │
//! ┌──────────────────┐      ┌──────────────────┐        │
//! │ service routine  │────► │  dispatch loop   │◄───────┘ (on IRQL drop)
//! └──────────────────┘      └──────────────────┘
//! ```
//!
//! Every source occupies one bit in the 32-bit bitmaps: bits 0-3 are the
//! software levels, bits 4-19 the controller lines (bit = line +
//! [`IRQL_OFFSET_FOR_IRQ`]).
//!
//! The engine runs with interrupts disabled. Admission re-enables them in
//! short explicit windows so that a higher-priority line can preempt the
//! classification of a lower one; the dispatch loop re-checks the in-service
//! mask to close exactly that window.

use crate::hal::irql::{
    controller_mask, irql, unmask_mask, Kirql, IRQL_OFFSET_FOR_IRQ, PIC_IRQ_COUNT,
};
use crate::hal::pic::{self, PicChip, PicIo};
use crate::ke::prcb::KPrcb;
use crate::ke::routines::KernelRoutines;
use crate::ke::time::KSystemTime;

/// Masks the software-level bits out of the in-service bitmap
pub const ACTIVE_IRQ_MASK: u32 = 0xFFFF_FFF0;

/// Trigger mode of a hardware line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InterruptMode {
    /// Level-triggered: the device holds the line asserted until serviced
    LevelSensitive = 0,
    /// Edge-triggered: a retriggered edge is lost unless EOI is withheld
    /// until the kernel commits to servicing it
    Edge = 1,
}

/// Outcome of admitting one hardware arrival
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptDisposition {
    /// Priority allows it now; IRQL was raised to the line's level
    Accepted,
    /// Masked at the current IRQL; recorded pending and re-masked at the chip
    Deferred,
    /// Controller artifact on a cascade slot; dismissed without side effects
    Spurious,
}

/// Registration failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectError {
    /// Bus line beyond the 16 physical inputs
    LineOutOfRange,
    /// Exactly one registration per line is valid
    AlreadyConnected,
}

/// Cascade-slot classification of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineClass {
    /// Ordinary input
    Plain,
    /// Highest input of a chip, carrying the chip's spurious artifacts
    Cascaded(PicChip),
}

/// Interrupt service routine: receives the engine (re-entrant requests are
/// legal) and the opaque registration context, returns whether the device
/// asserted the line.
pub type KServiceRoutine<P> = fn(&mut InterruptController<P>, usize) -> bool;

/// Per-line registration, created once when a driver connects to a line
pub struct KInterrupt<P: PicIo> {
    pub service_routine: KServiceRoutine<P>,
    pub service_context: usize,
    pub bus_interrupt_level: u32,
    pub irql: Kirql,
    pub mode: InterruptMode,
}

impl<P: PicIo> KInterrupt<P> {
    pub fn new(
        service_routine: KServiceRoutine<P>,
        service_context: usize,
        bus_interrupt_level: u32,
        irql: Kirql,
        mode: InterruptMode,
    ) -> Self {
        Self {
            service_routine,
            service_context,
            bus_interrupt_level,
            irql,
            mode,
        }
    }
}

impl<P: PicIo> Clone for KInterrupt<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P: PicIo> Copy for KInterrupt<P> {}

/// The uniprocessor interrupt dispatch engine.
///
/// Owns the current IRQL, the three source bitmaps, the controller-disabled
/// mask and the line registrations. Exactly one instance drives the real
/// hardware; tests instantiate as many as they need.
pub struct InterruptController<P: PicIo> {
    /// Current interrupt request level
    pub(crate) irql: Kirql,
    /// Sources that arrived but were not dispatched yet
    pub(crate) pending: u32,
    /// Sources whose handler is executing via the dispatch loop
    pub(crate) in_service: u32,
    /// Lines masked at the chips by explicit request (1 = masked).
    /// The cascade input, bit 2, is never disabled.
    pub(crate) pic_disabled: u16,
    /// One registration per physical line
    lines: [Option<KInterrupt<P>>; PIC_IRQ_COUNT as usize],
    /// Processor control block (boundary with the kernel executive)
    pub prcb: KPrcb,
    /// Interrupt/system time and tick count
    pub time: KSystemTime,
    /// Callbacks into the kernel executive
    pub routines: KernelRoutines,
    pub(crate) pic: P,
}

impl<P: PicIo> InterruptController<P> {
    pub fn new(pic: P) -> Self {
        Self {
            irql: irql::PASSIVE_LEVEL,
            pending: 0,
            in_service: 0,
            pic_disabled: 0xFFFB,
            lines: [None; PIC_IRQ_COUNT as usize],
            prcb: KPrcb::new(),
            time: KSystemTime::new(),
            routines: KernelRoutines::new(),
            pic,
        }
    }

    #[inline]
    pub fn current_irql(&self) -> Kirql {
        self.irql
    }

    #[inline]
    pub fn pending_sources(&self) -> u32 {
        self.pending
    }

    #[inline]
    pub fn in_service_sources(&self) -> u32 {
        self.in_service
    }

    #[inline]
    pub fn pic_disabled_mask(&self) -> u16 {
        self.pic_disabled
    }

    #[inline]
    pub fn pic(&self) -> &P {
        &self.pic
    }

    #[inline]
    pub fn pic_mut(&mut self) -> &mut P {
        &mut self.pic
    }

    // ========================================================================
    // IRQL management
    // ========================================================================

    /// Raise the current IRQL, returning the previous value.
    ///
    /// The caller must pair this with [`lower_irql`](Self::lower_irql) before
    /// returning to code that ran at the old level.
    pub fn raise_irql(&mut self, new_irql: Kirql) -> Kirql {
        let old_irql = self.irql;
        debug_assert!(
            new_irql >= old_irql,
            "raise_irql: new IRQL {} < current IRQL {}",
            new_irql,
            old_irql
        );
        self.irql = new_irql;
        old_irql
    }

    /// Lower the current IRQL back to the value returned by `raise_irql` and
    /// drain every source the drop unmasked.
    ///
    /// Must be called with interrupts disabled.
    pub fn lower_irql(&mut self, new_irql: Kirql) {
        debug_assert!(
            new_irql <= self.irql,
            "lower_irql: new IRQL {} > current IRQL {}",
            new_irql,
            self.irql
        );
        self.irql = new_irql;
        self.check_unmasked_int();
    }

    // ========================================================================
    // Line registration and controller programming
    // ========================================================================

    /// Connect a service routine to a physical line.
    ///
    /// Exactly one registration per line is valid; a second registration on
    /// an already-connected line is a caller error.
    pub fn connect_interrupt(&mut self, interrupt: KInterrupt<P>) -> Result<(), ConnectError> {
        let line = interrupt.bus_interrupt_level;
        if line >= PIC_IRQ_COUNT {
            return Err(ConnectError::LineOutOfRange);
        }
        if self.lines[line as usize].is_some() {
            return Err(ConnectError::AlreadyConnected);
        }

        log::debug!("line {} connected at IRQL {}", line, interrupt.irql);
        self.lines[line as usize] = Some(interrupt);
        Ok(())
    }

    /// Remove a line's registration, returning it if one existed
    pub fn disconnect_interrupt(&mut self, line: u32) -> Option<KInterrupt<P>> {
        if line >= PIC_IRQ_COUNT {
            return None;
        }
        self.lines[line as usize].take()
    }

    /// Unmask a line at the controller and program its trigger mode.
    ///
    /// Idempotent: repeating the call with identical arguments leaves the
    /// chips in the same state as a single call.
    pub fn enable_system_interrupt(&mut self, line: u32, mode: InterruptMode) {
        if line >= PIC_IRQ_COUNT {
            return;
        }
        self.pic.disable_interrupts();

        self.pic_disabled &= !(1 << line);

        let chip = PicChip::owning(line);
        let elcr_mask = 1u8 << (line & 7);
        let mut elcr = self.pic.read_elcr(chip);
        match mode {
            InterruptMode::Edge => elcr &= !elcr_mask,
            InterruptMode::LevelSensitive => elcr |= elcr_mask,
        }
        self.pic.write_elcr(chip, elcr);

        let imr = match chip {
            PicChip::Master => self.pic_disabled as u8,
            PicChip::Slave => (self.pic_disabled >> 8) as u8,
        };
        self.pic.write_data(chip, imr);

        log::debug!("line {} enabled ({:?})", line, mode);
        self.pic.enable_interrupts();
    }

    /// Mask a line at the controller regardless of IRQL.
    ///
    /// The cascade input cannot be disabled; doing so would cut off the
    /// entire slave chip.
    pub fn disable_system_interrupt(&mut self, line: u32) {
        if line >= PIC_IRQ_COUNT || line == pic::CASCADE_LINE {
            return;
        }
        self.pic.disable_interrupts();

        self.pic_disabled |= 1 << line;

        let chip = PicChip::owning(line);
        let imr = match chip {
            PicChip::Master => self.pic_disabled as u8,
            PicChip::Slave => (self.pic_disabled >> 8) as u8,
        };
        self.pic.write_data(chip, imr);

        log::debug!("line {} disabled", line);
        self.pic.enable_interrupts();
    }

    // ========================================================================
    // Line admission
    // ========================================================================

    fn line_class(line: u32) -> LineClass {
        // The two highest inputs carry each chip's spurious artifacts
        match line {
            7 => LineClass::Cascaded(PicChip::Master),
            15 => LineClass::Cascaded(PicChip::Slave),
            _ => LineClass::Plain,
        }
    }

    /// Decide whether a hardware arrival runs now, is deferred, or was
    /// spurious.
    ///
    /// Must be entered with interrupts disabled; every exit path re-enables
    /// them. On `Accepted` the IRQL has been raised to `target_irql` and the
    /// caller must invoke the service routine.
    pub fn admit(
        &mut self,
        mode: InterruptMode,
        line: u32,
        target_irql: Kirql,
    ) -> InterruptDisposition {
        match (mode, Self::line_class(line)) {
            (InterruptMode::LevelSensitive, LineClass::Cascaded(chip)) => {
                if self.cascade_spurious(chip) {
                    InterruptDisposition::Spurious
                } else {
                    self.admit_level(line, target_irql)
                }
            }
            (InterruptMode::Edge, LineClass::Cascaded(chip)) => {
                if self.cascade_spurious(chip) {
                    InterruptDisposition::Spurious
                } else {
                    self.admit_edge(line, target_irql)
                }
            }
            (InterruptMode::LevelSensitive, LineClass::Plain) => {
                self.admit_level(line, target_irql)
            }
            (InterruptMode::Edge, LineClass::Plain) => self.admit_edge(line, target_irql),
        }
    }

    /// Spurious check for a cascade slot: if the owning chip's top-priority
    /// in-service bit is clear, no real device asserted the line. Dismiss
    /// silently: no EOI, no pending bit.
    fn cascade_spurious(&mut self, chip: PicChip) -> bool {
        if pic::read_in_service(&mut self.pic, chip) & 0x80 != 0 {
            return false;
        }
        log::trace!("spurious interrupt on {:?} cascade slot", chip);
        self.pic.enable_interrupts();
        true
    }

    /// A level-triggered line stays asserted by hardware until serviced, so
    /// EOI can be sent before the priority check without losing the signal.
    fn admit_level(&mut self, line: u32, target_irql: Kirql) -> InterruptDisposition {
        pic::send_eoi(&mut self.pic, line);
        if target_irql <= self.irql {
            return self.defer(line);
        }
        self.irql = target_irql;
        self.pic.enable_interrupts();
        InterruptDisposition::Accepted
    }

    /// An edge-triggered line must not be EOI'd until the kernel has
    /// committed to servicing it, or a retriggered edge could be lost.
    fn admit_edge(&mut self, line: u32, target_irql: Kirql) -> InterruptDisposition {
        if target_irql <= self.irql {
            return self.defer(line);
        }
        self.irql = target_irql;
        pic::send_eoi(&mut self.pic, line);
        self.pic.enable_interrupts();
        InterruptDisposition::Accepted
    }

    /// Record a masked arrival in the pending bitmap and re-mask at the
    /// chips every line whose IRQL is at or below the current one, so it is
    /// not redelivered until the IRQL drops.
    fn defer(&mut self, line: u32) -> InterruptDisposition {
        self.pending |= 1 << (IRQL_OFFSET_FOR_IRQ + line);
        let masked = controller_mask(self.irql) | self.pic_disabled;
        pic::program_interrupt_mask(&mut self.pic, masked);
        self.pic.enable_interrupts();
        InterruptDisposition::Deferred
    }

    // ========================================================================
    // Dispatch loop
    // ========================================================================

    /// Drain pending sources in strict priority order.
    ///
    /// Repeatedly picks the highest set bit of `pending & unmask(current)`
    /// and dispatches it, until nothing runnable remains or a hardware
    /// source is already in service (an in-progress service must finish via
    /// its own path first).
    ///
    /// Must be called with interrupts disabled.
    pub fn check_unmasked_int(&mut self) {
        loop {
            let ready = self.pending & unmask_mask(self.irql);
            if ready == 0 {
                return;
            }
            // Complete the active hardware service first
            if self.in_service & ACTIVE_IRQ_MASK != 0 {
                return;
            }

            let source = 31 - ready.leading_zeros();
            if source <= irql::DISPATCH_LEVEL as u32 {
                self.run_software_handler(source as Kirql);
                continue;
            }

            // Hardware source: lift the IRQL re-masking before redelivery,
            // keeping only the explicitly disabled lines masked
            pic::program_interrupt_mask(&mut self.pic, self.pic_disabled);

            let bit = 1u32 << source;
            // Re-check: the handler windows re-enable interrupts, so a line
            // may have arrived and started service since `ready` was computed
            if self.in_service & bit != 0 {
                return;
            }
            self.in_service |= bit;
            self.pending &= !bit;

            let line = source - IRQL_OFFSET_FOR_IRQ;
            self.interrupt_common(line);
            self.in_service &= !bit;
        }
    }

    fn run_software_handler(&mut self, level: Kirql) {
        match level {
            irql::APC_LEVEL => self.sw_int_apc(),
            irql::DISPATCH_LEVEL => self.sw_int_dpc(),
            _ => {
                // Bits 0 and 3 have no requester; never expected here
                debug_assert!(false, "software source {} has no handler", level);
                self.pending &= !(1u32 << level);
            }
        }
    }

    // ========================================================================
    // Common entry trampoline
    // ========================================================================

    /// Common entry point every hardware line funnels through.
    ///
    /// Admits the arrival; on acceptance invokes the registered service
    /// routine at the raised IRQL, then lowers back to the entry level and
    /// drains whatever the drop unmasked before returning to the
    /// interrupted context.
    ///
    /// Must be entered with interrupts disabled; returns with them disabled.
    pub fn interrupt_common(&mut self, line: u32) -> InterruptDisposition {
        let Some(interrupt) = self.lines.get(line as usize).copied().flatten() else {
            log::warn!("interrupt on unconnected line {}", line);
            return InterruptDisposition::Spurious;
        };

        self.prcb.interrupt_count += 1;
        let saved_irql = self.irql;

        let disposition = self.admit(interrupt.mode, interrupt.bus_interrupt_level, interrupt.irql);
        match disposition {
            InterruptDisposition::Deferred | InterruptDisposition::Spurious => {
                self.pic.disable_interrupts();
            }
            InterruptDisposition::Accepted => {
                self.prcb.interrupted_irql = saved_irql;
                (interrupt.service_routine)(self, interrupt.service_context);
                self.pic.disable_interrupts();
                self.lower_irql(saved_irql);
            }
        }
        disposition
    }
}
