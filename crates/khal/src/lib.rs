//! Hardware Abstraction Layer.
//!
//! Everything that touches privileged CPU state or an I/O port goes
//! through the [`Hal`] trait so the components above it (PIC driver,
//! interrupt dispatch, panic sink) can run against a software mock on
//! the build host. The real implementation, [`x86::X86Hal`], is a thin
//! wrapper over inline assembly and only exists on the i686 target.
#![cfg_attr(not(test), no_std)]

#[cfg(any(test, feature = "mock"))]
extern crate alloc;

#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod pic;
pub mod serial;
#[cfg(target_arch = "x86")]
pub mod x86;

pub use pic::Pic;
pub use serial::Serial;

/// The minimal hardware surface the kernel core consumes.
///
/// Byte-granularity port I/O, the privileged descriptor-table load, and
/// global interrupt / halt control. Implementations have no logic of
/// their own; anything smarter belongs to the callers.
pub trait Hal {
    /// Write a byte to an I/O port.
    fn outb(&self, port: u16, value: u8);

    /// Read a byte from an I/O port.
    fn inb(&self, port: u16) -> u8;

    /// Small delay between port writes for slow devices.
    ///
    /// Writing to the unused POST port 0x80 costs roughly one ISA bus
    /// cycle, which is what the 8259 needs between command words.
    fn io_wait(&self) {
        self.outb(0x80, 0);
    }

    /// Load the interrupt descriptor table at `base` with the given
    /// byte `limit` (table size in bytes, minus one).
    fn load_idt(&self, base: u32, limit: u16);

    /// Enable maskable interrupts (STI).
    fn enable_interrupts(&self);

    /// Disable maskable interrupts (CLI).
    fn disable_interrupts(&self);

    /// Whether maskable interrupts are currently enabled (EFLAGS.IF).
    fn interrupts_enabled(&self) -> bool;

    /// Wait for the next interrupt (a single HLT).
    fn halt(&self);

    /// Stop the processor permanently: interrupts off, HLT in a loop.
    fn halt_forever(&self) -> !;
}

impl<H: Hal + ?Sized> Hal for &H {
    fn outb(&self, port: u16, value: u8) {
        (**self).outb(port, value)
    }
    fn inb(&self, port: u16) -> u8 {
        (**self).inb(port)
    }
    fn io_wait(&self) {
        (**self).io_wait()
    }
    fn load_idt(&self, base: u32, limit: u16) {
        (**self).load_idt(base, limit)
    }
    fn enable_interrupts(&self) {
        (**self).enable_interrupts()
    }
    fn disable_interrupts(&self) {
        (**self).disable_interrupts()
    }
    fn interrupts_enabled(&self) -> bool {
        (**self).interrupts_enabled()
    }
    fn halt(&self) {
        (**self).halt()
    }
    fn halt_forever(&self) -> ! {
        (**self).halt_forever()
    }
}

/// Run `f` with interrupts disabled, restoring the previous state after.
///
/// This is the guard callers must wrap around heap operations (or any
/// other non-interrupt-safe structure) that an interrupt handler might
/// touch concurrently. Nested use is fine: the flag is restored to
/// exactly what it was on entry.
pub fn without_interrupts<H: Hal, R>(hal: &H, f: impl FnOnce() -> R) -> R {
    let was_enabled = hal.interrupts_enabled();
    hal.disable_interrupts();
    let result = f();
    if was_enabled {
        hal.enable_interrupts();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockHal;

    #[test]
    fn without_interrupts_restores_previous_state() {
        let hal = MockHal::new();

        hal.enable_interrupts();
        without_interrupts(&hal, || {
            assert!(!hal.interrupts_enabled());
        });
        assert!(hal.interrupts_enabled());

        hal.disable_interrupts();
        without_interrupts(&hal, || {});
        assert!(!hal.interrupts_enabled());
    }
}
