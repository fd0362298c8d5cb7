//! System time counters
//!
//! Interrupt time and system time advance in 100 ns units on every clock
//! tick; the tick count advances in milliseconds.

/// 100 ns units per millisecond
const TIME_UNITS_PER_MS: u64 = 10_000;

/// Monotonic system clocks maintained by the clock interrupt
pub struct KSystemTime {
    /// Time since boot, 100 ns units
    pub interrupt_time: u64,
    /// Wall-clock time, 100 ns units
    pub system_time: u64,
    /// Milliseconds since boot
    pub tick_count: u64,
}

impl KSystemTime {
    pub const fn new() -> Self {
        Self {
            interrupt_time: 0,
            system_time: 0,
            tick_count: 0,
        }
    }

    /// Advance all counters by `elapsed_ms`
    pub fn advance(&mut self, elapsed_ms: u32) {
        let units = elapsed_ms as u64 * TIME_UNITS_PER_MS;
        self.interrupt_time += units;
        self.system_time += units;
        self.tick_count += elapsed_ms as u64;
    }
}

impl Default for KSystemTime {
    fn default() -> Self {
        Self::new()
    }
}
