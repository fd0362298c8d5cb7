//! IRQL priority tables
//!
//! The 32 interrupt request levels gate which interrupt sources may execute.
//! Sources 0-3 are the synthetic software levels (PASSIVE is never a real
//! source, APC and DISPATCH are), sources 4-19 map to the 16 physical lines
//! of the cascaded 8259 controllers.
//!
//! Two tables describe the whole priority scheme:
//! - [`IRQL_UNMASKED_SOURCES`]: per IRQL, the 32-bit mask of sources that may
//!   still run at that level
//! - [`PIC_MASKS_FOR_IRQL`]: per IRQL, the 16-bit mask of controller lines
//!   whose own IRQL is less or equal, i.e. the lines to mask at the chips
//!
//! Both tables are immutable after build; raising IRQL never unmasks more
//! sources.

/// Interrupt Request Level type
pub type Kirql = u8;

/// IRQL levels
pub mod irql {
    use super::Kirql;

    /// Passive level - normal thread execution, everything unmasked
    pub const PASSIVE_LEVEL: Kirql = 0;
    /// APC level - asynchronous procedure calls masked
    pub const APC_LEVEL: Kirql = 1;
    /// Dispatch level - DPC execution, thread preemption disabled
    pub const DISPATCH_LEVEL: Kirql = 2;
    /// IDE controller (line 14)
    pub const IDE_LEVEL: Kirql = 12;
    /// System management bus (line 11)
    pub const SMBUS_LEVEL: Kirql = 15;
    /// Second USB controller (line 9)
    pub const USB1_LEVEL: Kirql = 17;
    /// Audio codec interface (line 6)
    pub const ACI_LEVEL: Kirql = 20;
    /// Audio processing unit (line 5)
    pub const APU_LEVEL: Kirql = 21;
    /// Network interface (line 4)
    pub const NIC_LEVEL: Kirql = 22;
    /// Graphics unit (line 3)
    pub const GPU_LEVEL: Kirql = 23;
    /// First USB controller (line 1)
    pub const USB0_LEVEL: Kirql = 25;
    /// Profiling interrupt (line 8)
    pub const PROFILE_LEVEL: Kirql = 26;
    /// System control interrupt (line 12)
    pub const SCI_LEVEL: Kirql = 27;
    /// Clock interrupt (line 0)
    pub const CLOCK_LEVEL: Kirql = 28;
    /// Inter-processor interrupt level
    pub const IPI_LEVEL: Kirql = 29;
    /// Power fail level
    pub const POWER_LEVEL: Kirql = 30;
    /// Highest level - all sources masked
    pub const HIGH_LEVEL: Kirql = 31;
}

/// Bit offset of the first hardware line in the 32-bit source bitmaps
pub const IRQL_OFFSET_FOR_IRQ: u32 = 4;

/// Number of physical lines on the cascaded controllers
pub const PIC_IRQ_COUNT: u32 = 16;

/// Highest bus interrupt level accepted by the vector lookup
pub const MAX_BUS_INTERRUPT_LEVEL: u32 = 26;

/// First IDT vector assigned to the controller lines
pub const IDT_INT_VECTOR_BASE: u32 = 0x30;

/// Mask of all software and hardware sources unmasked at each IRQL.
/// This table is the opposite of [`PIC_MASKS_FOR_IRQL`].
static IRQL_UNMASKED_SOURCES: [u32; 32] = [
    0b11111111111111111111111111111110, // IRQL 0  (PASSIVE)
    0b11111111111111111111111111111100, // IRQL 1  (APC)
    0b11111111111111111111111111111000, // IRQL 2  (DPC)
    0b11111111111111111111111111110000, // IRQL 3
    0b00000011111111111111111111110000, // IRQL 4
    0b00000001111111111111111111110000, // IRQL 5
    0b00000000111111111111111111110000, // IRQL 6
    0b00000000011111111111111111110000, // IRQL 7
    0b00000000001111111111111111110000, // IRQL 8
    0b00000000000111111111111111110000, // IRQL 9
    0b00000000000011111111111111110000, // IRQL 10
    0b00000000000001111111111111110000, // IRQL 11
    0b00000000000000111111111111110000, // IRQL 12 (IDE)
    0b00000000000000011111111111110000, // IRQL 13
    0b00000000000000011111111111110000, // IRQL 14
    0b00000000000000010111111111110000, // IRQL 15 (SMBUS)
    0b00000000000000010011111111110000, // IRQL 16
    0b00000000000000010001111111110000, // IRQL 17 (USB1)
    0b00000000000000010001111111110000, // IRQL 18
    0b00000000000000010001011111110000, // IRQL 19
    0b00000000000000010001001111110000, // IRQL 20 (ACI)
    0b00000000000000010001000111110000, // IRQL 21 (APU)
    0b00000000000000010001000011110000, // IRQL 22 (NIC)
    0b00000000000000010001000001110000, // IRQL 23 (GPU)
    0b00000000000000010001000000110000, // IRQL 24
    0b00000000000000010001000000010000, // IRQL 25 (USB0)
    0b00000000000000010000000000010000, // IRQL 26 (PROFILE)
    0b00000000000000000000000000010000, // IRQL 27 (SCI)
    0b00000000000000000000000000000000, // IRQL 28 (CLOCK)
    0b00000000000000000000000000000000, // IRQL 29 (IPI)
    0b00000000000000000000000000000000, // IRQL 30 (POWER)
    0b00000000000000000000000000000000, // IRQL 31 (HIGH)
];

/// Mask of lines disabled at the controller chips for each IRQL. Every row
/// holds the lines whose own IRQL is less or equal to that level. Example:
/// at IRQL 12 (IDE) only line 14 is masked, every other device sits at a
/// greater IRQL.
///
/// `IRQL = 26 - line`, except for CLOCK (line 0), PROFILE (line 8) and SCI
/// (line 12), which use arbitrarily chosen levels.
static PIC_MASKS_FOR_IRQL: [u16; 32] = [
    0b0000000000000000, // IRQL 0  (PASSIVE)
    0b0000000000000000, // IRQL 1  (APC)
    0b0000000000000000, // IRQL 2  (DPC)
    0b0000000000000000, // IRQL 3
    0b0000000000000000, // IRQL 4
    0b0000000000000000, // IRQL 5
    0b0000000000000000, // IRQL 6
    0b0000000000000000, // IRQL 7
    0b0000000000000000, // IRQL 8
    0b0000000000000000, // IRQL 9
    0b0000000000000000, // IRQL 10
    0b1000000000000000, // IRQL 11
    0b1100000000000000, // IRQL 12 (IDE)
    0b1110000000000000, // IRQL 13
    0b1110000000000000, // IRQL 14
    0b1110100000000000, // IRQL 15 (SMBUS)
    0b1110110000000000, // IRQL 16
    0b1110111000000000, // IRQL 17 (USB1)
    0b1110111000000000, // IRQL 18
    0b1110111010000000, // IRQL 19
    0b1110111011000000, // IRQL 20 (ACI)
    0b1110111011100000, // IRQL 21 (APU)
    0b1110111011110000, // IRQL 22 (NIC)
    0b1110111011111000, // IRQL 23 (GPU)
    0b1110111011111000, // IRQL 24
    0b1110111011111010, // IRQL 25 (USB0)
    0b1110111111111010, // IRQL 26 (PROFILE)
    0b1111111111111010, // IRQL 27 (SCI)
    0b1111111111111011, // IRQL 28 (CLOCK)
    0b1111111111111011, // IRQL 29 (IPI)
    0b1111111111111011, // IRQL 30 (POWER)
    0b1111111111111011, // IRQL 31 (HIGH)
];

/// Sources that may still run at `level`, one bit per source index
#[inline]
pub fn unmask_mask(level: Kirql) -> u32 {
    IRQL_UNMASKED_SOURCES[level as usize]
}

/// Lines to mask at the controller chips while `level` is current
#[inline]
pub fn controller_mask(level: Kirql) -> u16 {
    PIC_MASKS_FOR_IRQL[level as usize]
}

/// IDT vector and IRQL assigned to a bus interrupt level
///
/// Pure mapping; returns `None` when `bus_interrupt_level` exceeds
/// [`MAX_BUS_INTERRUPT_LEVEL`].
#[inline]
pub fn hal_get_interrupt_vector(bus_interrupt_level: u32) -> Option<(u32, Kirql)> {
    if bus_interrupt_level > MAX_BUS_INTERRUPT_LEVEL {
        return None;
    }

    let vector = IDT_INT_VECTOR_BASE + bus_interrupt_level;
    let level = (MAX_BUS_INTERRUPT_LEVEL - bus_interrupt_level) as Kirql;
    Some((vector, level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmask_popcount_monotonic() {
        // Raising IRQL never unmasks more sources
        for level in 0..31 {
            assert!(
                unmask_mask(level).count_ones() >= unmask_mask(level + 1).count_ones(),
                "unmask table not monotonic between IRQL {} and {}",
                level,
                level + 1
            );
        }
    }

    #[test]
    fn test_controller_mask_monotonic() {
        // The chip-level mask only grows as IRQL rises
        for level in 0..31 {
            let lo = controller_mask(level);
            let hi = controller_mask(level + 1);
            assert_eq!(lo & hi, lo, "controller mask shrank at IRQL {}", level + 1);
        }
    }

    #[test]
    fn test_tables_are_opposites() {
        // A line masked at the chip must also be masked in the source table
        for level in 0..32 {
            let unmasked = unmask_mask(level);
            let chip_masked = controller_mask(level);
            for line in 0..PIC_IRQ_COUNT {
                if chip_masked & (1 << line) != 0 {
                    assert_eq!(
                        unmasked & (1 << (IRQL_OFFSET_FOR_IRQ + line)),
                        0,
                        "line {} chip-masked but source-unmasked at IRQL {}",
                        line,
                        level
                    );
                }
            }
        }
    }

    #[test]
    fn test_software_levels_at_passive() {
        let mask = unmask_mask(irql::PASSIVE_LEVEL);
        assert_ne!(mask & (1 << irql::APC_LEVEL), 0);
        assert_ne!(mask & (1 << irql::DISPATCH_LEVEL), 0);
        // PASSIVE itself is never a source
        assert_eq!(mask & 1, 0);
    }

    #[test]
    fn test_everything_masked_at_high() {
        assert_eq!(unmask_mask(irql::HIGH_LEVEL), 0);
    }

    #[test]
    fn test_vector_mapping() {
        assert_eq!(hal_get_interrupt_vector(0), Some((0x30, 26)));
        assert_eq!(hal_get_interrupt_vector(14), Some((0x3E, irql::IDE_LEVEL)));
        assert_eq!(hal_get_interrupt_vector(26), Some((0x4A, 0)));
        assert_eq!(hal_get_interrupt_vector(27), None);
    }
}
