//! 32-bit Interrupt Descriptor Table.
//!
//! 256 eight-byte gate descriptors. The CPU indexes this table by
//! vector number whenever an exception or hardware interrupt fires, so
//! the encoding here must match the manual bit for bit.

use bitflags::bitflags;
use khal::Hal;

/// Number of gate entries the CPU architecture defines.
pub const IDT_ENTRIES: usize = 256;

/// GDT selector for the flat ring-0 code segment every gate targets.
pub const KERNEL_CODE_SELECTOR: u16 = 0x08;

bitflags! {
    /// Attribute byte of a gate descriptor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GateFlags: u8 {
        /// Gate is valid; the CPU faults on vectors without it.
        const PRESENT = 0x80;
        /// Descriptor privilege level 3 (callable from user mode).
        const RING3 = 0x60;
        /// 32-bit gate size bit.
        const GATE_32BIT = 0x08;
        /// Interrupt gate: the CPU clears IF on entry.
        const INTERRUPT = 0x0E;
        /// Trap gate: IF is left as-is.
        const TRAP = 0x0F;
    }
}

/// One gate descriptor. The handler address is split across the low
/// and high halves with the selector and attributes in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct IdtEntry {
    base_low: u16,
    selector: u16,
    zero: u8,
    flags: u8,
    base_high: u16,
}

impl IdtEntry {
    /// A non-present gate. Raising its vector double-faults, which is
    /// the wanted behavior for vectors nothing has claimed.
    pub const fn missing() -> Self {
        Self {
            base_low: 0,
            selector: 0,
            zero: 0,
            flags: 0,
            base_high: 0,
        }
    }

    /// Gate pointing at `base`. PRESENT is always set; a caller that
    /// wants a dead gate uses [`IdtEntry::missing`] instead.
    pub fn new(base: u32, selector: u16, flags: GateFlags) -> Self {
        Self {
            base_low: base as u16,
            selector,
            zero: 0,
            flags: (flags | GateFlags::PRESENT).bits(),
            base_high: (base >> 16) as u16,
        }
    }

    pub fn base(&self) -> u32 {
        (self.base_high as u32) << 16 | self.base_low as u32
    }

    pub fn selector(&self) -> u16 {
        self.selector
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn is_present(&self) -> bool {
        self.flags & GateFlags::PRESENT.bits() != 0
    }
}

/// The table itself. Lives inside the kernel context; its address must
/// stay stable from `load` onward because the CPU keeps dereferencing
/// it on every interrupt.
#[repr(C, align(8))]
pub struct Idt {
    entries: [IdtEntry; IDT_ENTRIES],
}

impl Idt {
    pub const fn new() -> Self {
        Self {
            entries: [IdtEntry::missing(); IDT_ENTRIES],
        }
    }

    pub fn set_gate(&mut self, vector: u8, base: u32, selector: u16, flags: GateFlags) {
        self.entries[vector as usize] = IdtEntry::new(base, selector, flags);
    }

    pub fn entry(&self, vector: u8) -> &IdtEntry {
        &self.entries[vector as usize]
    }

    /// Hand the table to the CPU (LIDT).
    pub fn load<H: Hal>(&self, hal: &H) {
        let base = self as *const Self as usize as u32;
        let limit = (core::mem::size_of::<Self>() - 1) as u16;
        hal.load_idt(base, limit);
    }
}

impl Default for Idt {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use khal::mock::MockHal;

    #[test]
    fn gate_encoding_splits_the_base_and_sets_present() {
        let entry = IdtEntry::new(
            0xDEAD_BEEF,
            KERNEL_CODE_SELECTOR,
            GateFlags::GATE_32BIT | GateFlags::INTERRUPT,
        );

        assert_eq!(entry.base(), 0xDEAD_BEEF);
        assert_eq!(entry.selector(), 0x08);
        // present | ring 0 | 32-bit interrupt gate
        assert_eq!(entry.flags(), 0x8E);
        assert!(entry.is_present());
    }

    #[test]
    fn entries_are_eight_bytes_and_the_table_is_2048() {
        assert_eq!(core::mem::size_of::<IdtEntry>(), 8);
        assert_eq!(core::mem::size_of::<Idt>(), 2048);
    }

    #[test]
    fn missing_gates_are_not_present() {
        let idt = Idt::new();
        assert!(!idt.entry(0).is_present());
        assert!(!idt.entry(255).is_present());
    }

    #[test]
    fn load_reports_the_table_address_and_byte_limit() {
        let hal = MockHal::new();
        let idt = Idt::new();

        idt.load(&hal);

        let expected_base = &idt as *const Idt as usize as u32;
        assert_eq!(hal.loaded_idt(), Some((expected_base, 2047)));
    }
}
