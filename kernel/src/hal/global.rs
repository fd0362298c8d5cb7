//! Global controller instance for real hardware
//!
//! The machine has exactly one pair of cascaded chips, so exactly one
//! [`InterruptController`] drives them. Interrupt stubs lock the instance at
//! every entry; the spinlock is uncontended on a uniprocessor and only
//! guards against initialization races.

use spin::Mutex;

use crate::hal::interrupt::InterruptController;
use crate::hal::irql::IDT_INT_VECTOR_BASE;
use crate::hal::pic::{initialize_controllers, Pio};

/// The one controller instance driving the physical chips
pub static INTERRUPT_CONTROLLER: Mutex<Option<InterruptController<Pio>>> = Mutex::new(None);

/// Remap the chips and install the controller instance.
///
/// Must be called once during bring-up, with interrupts disabled.
pub fn hal_init_system() {
    let mut pic = Pio;
    initialize_controllers(&mut pic, IDT_INT_VECTOR_BASE as u8);
    *INTERRUPT_CONTROLLER.lock() = Some(InterruptController::new(pic));
    log::debug!("interrupt subsystem initialized");
}
