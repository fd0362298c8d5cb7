//! 8259 Programmable Interrupt Controller (PIC) Driver
//!
//! Two cascaded 8-line chips: the slave's output is wired into line 2 of the
//! master. Each chip exposes a byte-wide command and data port plus an edge/
//! level control register (ELCR).
//!
//! All chip access goes through the [`PicIo`] trait so the dispatch engine
//! can be driven against real port I/O on hardware and against a recording
//! backend in tests. The trait also carries the processor interrupt-flag
//! window, because admission opens and closes it in lockstep with the chip
//! programming.

use bitflags::bitflags;

/// PIC ports
pub mod ports {
    pub const MASTER_COMMAND: u16 = 0x20;
    pub const MASTER_DATA: u16 = 0x21;
    pub const SLAVE_COMMAND: u16 = 0xA0;
    pub const SLAVE_DATA: u16 = 0xA1;
    pub const MASTER_ELCR: u16 = 0x4D0;
    pub const SLAVE_ELCR: u16 = 0x4D1;
}

/// PIC commands
pub mod commands {
    /// Specific end-of-interrupt, OR'd with the 0-7 line-in-chip index
    pub const OCW2_EOI_IRQ: u8 = 0x60;
    /// Select the in-service register for the next command-port read
    pub const OCW3_READ_ISR: u8 = 0x0B;
}

bitflags! {
    /// Initialization command word 1
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Icw1: u8 {
        const ICW4_NEEDED = 0x01;
        const SINGLE = 0x02;
        const INTERVAL4 = 0x04;
        const LEVEL_TRIGGERED = 0x08;
        const INIT = 0x10;
    }
}

bitflags! {
    /// Initialization command word 4
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Icw4: u8 {
        const MODE_8086 = 0x01;
        const AUTO_EOI = 0x02;
        const BUFFERED = 0x08;
        const FULLY_NESTED = 0x10;
    }
}

/// Master line the slave chip's output is wired into
pub const CASCADE_LINE: u32 = 2;

/// One of the two cascaded chips
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PicChip {
    Master,
    Slave,
}

impl PicChip {
    /// Chip owning a 0-15 bus line
    #[inline]
    pub fn owning(line: u32) -> PicChip {
        if line < 8 {
            PicChip::Master
        } else {
            PicChip::Slave
        }
    }
}

/// Byte-port interface to the cascaded controllers and the processor
/// interrupt flag.
///
/// Implementations model the uniprocessor's view of the interrupt hardware:
/// exactly one of these is ever live on real hardware, tests may instantiate
/// as many as they like.
pub trait PicIo {
    fn write_command(&mut self, chip: PicChip, value: u8);
    fn read_command(&mut self, chip: PicChip) -> u8;
    fn write_data(&mut self, chip: PicChip, value: u8);
    fn read_data(&mut self, chip: PicChip) -> u8;
    fn write_elcr(&mut self, chip: PicChip, value: u8);
    fn read_elcr(&mut self, chip: PicChip) -> u8;

    /// Open the interrupt window
    fn enable_interrupts(&mut self);

    /// Close the interrupt window; returns whether it was open
    fn disable_interrupts(&mut self) -> bool;

    /// Restore the window to the state returned by `disable_interrupts`
    fn restore_interrupts(&mut self, was_enabled: bool) {
        if was_enabled {
            self.enable_interrupts();
        }
    }
}

/// Send a specific end-of-interrupt for a bus line.
///
/// Lines on the slave chip are acknowledged slave first, then the master's
/// cascade input.
pub fn send_eoi<P: PicIo>(pic: &mut P, line: u32) {
    if line >= 8 {
        pic.write_command(PicChip::Slave, commands::OCW2_EOI_IRQ | (line as u8 - 8));
        pic.write_command(PicChip::Master, commands::OCW2_EOI_IRQ | CASCADE_LINE as u8);
    } else {
        pic.write_command(PicChip::Master, commands::OCW2_EOI_IRQ | line as u8);
    }
}

/// Program the 16-bit disabled-line mask: low byte to the master data port,
/// high byte to the slave data port (1 = masked).
pub fn program_interrupt_mask<P: PicIo>(pic: &mut P, mask: u16) {
    pic.write_data(PicChip::Master, mask as u8);
    pic.write_data(PicChip::Slave, (mask >> 8) as u8);
}

/// Read a chip's in-service register
pub fn read_in_service<P: PicIo>(pic: &mut P, chip: PicChip) -> u8 {
    pic.write_command(chip, commands::OCW3_READ_ISR);
    pic.read_command(chip)
}

/// Run the ICW1..ICW4 initialization sequence on both chips.
///
/// Remaps the master to `vector_base` and the slave to `vector_base + 8`,
/// wires the cascade, selects 8086 mode and leaves every line masked except
/// the cascade input.
pub fn initialize_controllers<P: PicIo>(pic: &mut P, vector_base: u8) {
    let icw1 = (Icw1::INIT | Icw1::ICW4_NEEDED).bits();
    pic.write_command(PicChip::Master, icw1);
    pic.write_command(PicChip::Slave, icw1);

    // ICW2: vector offsets
    pic.write_data(PicChip::Master, vector_base);
    pic.write_data(PicChip::Slave, vector_base + 8);

    // ICW3: cascade wiring (bit mask on the master, slave identity on the slave)
    pic.write_data(PicChip::Master, 1 << CASCADE_LINE);
    pic.write_data(PicChip::Slave, CASCADE_LINE as u8);

    // ICW4
    pic.write_data(PicChip::Master, Icw4::MODE_8086.bits());
    pic.write_data(PicChip::Slave, Icw4::MODE_8086.bits());

    // Mask everything but the cascade input until lines are enabled
    program_interrupt_mask(pic, 0xFFFB);

    log::debug!(
        "dual 8259 remapped to vectors {:#x}..{:#x}",
        vector_base,
        vector_base + 15
    );
}

// ============================================================================
// Real port I/O backend
// ============================================================================

/// Port-programmed backend for real hardware
#[cfg(target_arch = "x86_64")]
pub struct Pio;

#[cfg(target_arch = "x86_64")]
impl Pio {
    fn command_port(chip: PicChip) -> u16 {
        match chip {
            PicChip::Master => ports::MASTER_COMMAND,
            PicChip::Slave => ports::SLAVE_COMMAND,
        }
    }

    fn data_port(chip: PicChip) -> u16 {
        match chip {
            PicChip::Master => ports::MASTER_DATA,
            PicChip::Slave => ports::SLAVE_DATA,
        }
    }

    fn elcr_port(chip: PicChip) -> u16 {
        match chip {
            PicChip::Master => ports::MASTER_ELCR,
            PicChip::Slave => ports::SLAVE_ELCR,
        }
    }
}

#[cfg(target_arch = "x86_64")]
impl PicIo for Pio {
    fn write_command(&mut self, chip: PicChip, value: u8) {
        unsafe { x86_64::instructions::port::Port::new(Self::command_port(chip)).write(value) }
    }

    fn read_command(&mut self, chip: PicChip) -> u8 {
        unsafe { x86_64::instructions::port::Port::new(Self::command_port(chip)).read() }
    }

    fn write_data(&mut self, chip: PicChip, value: u8) {
        unsafe { x86_64::instructions::port::Port::new(Self::data_port(chip)).write(value) }
    }

    fn read_data(&mut self, chip: PicChip) -> u8 {
        unsafe { x86_64::instructions::port::Port::new(Self::data_port(chip)).read() }
    }

    fn write_elcr(&mut self, chip: PicChip, value: u8) {
        unsafe { x86_64::instructions::port::Port::new(Self::elcr_port(chip)).write(value) }
    }

    fn read_elcr(&mut self, chip: PicChip) -> u8 {
        unsafe { x86_64::instructions::port::Port::new(Self::elcr_port(chip)).read() }
    }

    fn enable_interrupts(&mut self) {
        x86_64::instructions::interrupts::enable();
    }

    fn disable_interrupts(&mut self) -> bool {
        let was_enabled = x86_64::instructions::interrupts::are_enabled();
        x86_64::instructions::interrupts::disable();
        was_enabled
    }
}

// ============================================================================
// Recording backend for tests
// ============================================================================

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    fn chip_index(chip: PicChip) -> usize {
        match chip {
            PicChip::Master => 0,
            PicChip::Slave => 1,
        }
    }

    /// In-memory chip pair that records everything the engine programs
    pub struct RecordingPic {
        /// Interrupt mask registers, one per chip
        pub imr: [u8; 2],
        /// Edge/level control registers
        pub elcr: [u8; 2],
        /// In-service registers, set directly by tests
        pub isr: [u8; 2],
        /// Specific EOIs seen, as (chip, line-in-chip)
        pub eoi_log: Vec<(PicChip, u8)>,
        /// Every complete 16-bit mask programmed via the data ports
        pub mask_log: Vec<u16>,
        /// Interrupt-flag state
        pub interrupts_enabled: bool,
        isr_selected: [bool; 2],
        pending_master_byte: Option<u8>,
    }

    impl RecordingPic {
        pub fn new() -> Self {
            Self {
                imr: [0xFB, 0xFF],
                elcr: [0, 0],
                isr: [0, 0],
                eoi_log: Vec::new(),
                mask_log: Vec::new(),
                interrupts_enabled: false,
                isr_selected: [false; 2],
                pending_master_byte: None,
            }
        }

        pub fn imr16(&self) -> u16 {
            (self.imr[1] as u16) << 8 | self.imr[0] as u16
        }
    }

    impl PicIo for RecordingPic {
        fn write_command(&mut self, chip: PicChip, value: u8) {
            let idx = chip_index(chip);
            if value == commands::OCW3_READ_ISR {
                self.isr_selected[idx] = true;
            } else if (commands::OCW2_EOI_IRQ..commands::OCW2_EOI_IRQ + 8).contains(&value) {
                self.eoi_log.push((chip, value & 7));
            }
        }

        fn read_command(&mut self, chip: PicChip) -> u8 {
            let idx = chip_index(chip);
            self.isr_selected[idx] = false;
            self.isr[idx]
        }

        fn write_data(&mut self, chip: PicChip, value: u8) {
            self.imr[chip_index(chip)] = value;
            // Log complete 16-bit masks once both bytes arrive
            match chip {
                PicChip::Master => self.pending_master_byte = Some(value),
                PicChip::Slave => {
                    if let Some(lo) = self.pending_master_byte.take() {
                        self.mask_log.push((value as u16) << 8 | lo as u16);
                    }
                }
            }
        }

        fn read_data(&mut self, chip: PicChip) -> u8 {
            self.imr[chip_index(chip)]
        }

        fn write_elcr(&mut self, chip: PicChip, value: u8) {
            self.elcr[chip_index(chip)] = value;
        }

        fn read_elcr(&mut self, chip: PicChip) -> u8 {
            self.elcr[chip_index(chip)]
        }

        fn enable_interrupts(&mut self) {
            self.interrupts_enabled = true;
        }

        fn disable_interrupts(&mut self) -> bool {
            core::mem::replace(&mut self.interrupts_enabled, false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingPic;
    use super::*;

    #[test]
    fn test_eoi_routing() {
        let mut pic = RecordingPic::new();

        send_eoi(&mut pic, 4);
        assert_eq!(pic.eoi_log, vec![(PicChip::Master, 4)]);

        pic.eoi_log.clear();
        send_eoi(&mut pic, 14);
        // Slave first, then the master's cascade input
        assert_eq!(pic.eoi_log, vec![(PicChip::Slave, 6), (PicChip::Master, 2)]);
    }

    #[test]
    fn test_mask_split_across_chips() {
        let mut pic = RecordingPic::new();
        program_interrupt_mask(&mut pic, 0xC001);
        assert_eq!(pic.imr, [0x01, 0xC0]);
        assert_eq!(pic.mask_log, vec![0xC001]);
    }

    #[test]
    fn test_read_in_service_selects_register() {
        let mut pic = RecordingPic::new();
        pic.isr[1] = 0x80;
        assert_eq!(read_in_service(&mut pic, PicChip::Slave), 0x80);
        assert_eq!(read_in_service(&mut pic, PicChip::Master), 0);
    }

    #[test]
    fn test_initialize_masks_all_but_cascade() {
        let mut pic = RecordingPic::new();
        initialize_controllers(&mut pic, 0x30);
        assert_eq!(pic.imr16(), 0xFFFB);
    }
}
