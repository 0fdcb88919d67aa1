//! Legacy 8259 PIC (Programmable Interrupt Controller) driver.
//!
//! Two chained 8-bit controllers multiplex the 16 legacy IRQ lines: the
//! master owns lines 0-7, the slave (cascaded on master line 2) owns
//! lines 8-15. At power-on their vectors overlap the CPU exception
//! range, so [`Pic::remap`] moves them to vectors 32-47 before the IDT
//! is loaded. The ICW byte sequence here is the one bit-exact protocol
//! this kernel must reproduce for real and emulated hardware.

use crate::Hal;

/// I/O port addresses for the master PIC.
pub const PIC1_COMMAND: u16 = 0x20;
pub const PIC1_DATA: u16 = 0x21;

/// I/O port addresses for the slave PIC.
pub const PIC2_COMMAND: u16 = 0xA0;
pub const PIC2_DATA: u16 = 0xA1;

/// End-of-interrupt command byte.
const PIC_EOI: u8 = 0x20;

/// ICW1: begin the initialization sequence.
const ICW1_INIT: u8 = 0x10;
/// ICW1: an ICW4 word will follow.
const ICW1_ICW4: u8 = 0x01;
/// ICW4: 8086/88 operating mode (as opposed to MCS-80/85).
const ICW4_8086: u8 = 0x01;

/// Remapped vector offset for the master (IRQ 0-7 → vectors 32-39).
pub const PIC1_OFFSET: u8 = 32;
/// Remapped vector offset for the slave (IRQ 8-15 → vectors 40-47).
pub const PIC2_OFFSET: u8 = 40;

/// Driver for the chained pair of 8259 controllers.
///
/// Holds no state of its own beyond the HAL handle: vector offsets are
/// fixed at 32/40, and the per-line mask registers live in the hardware
/// and are read back on every mask operation.
pub struct Pic<H: Hal> {
    hal: H,
}

impl<H: Hal> Pic<H> {
    pub const fn new(hal: H) -> Self {
        Self { hal }
    }

    /// Reprogram both controllers: cascade mode, vector offsets 32/40,
    /// 8086 mode, preserving the IRQ masks across the sequence.
    ///
    /// Must run before the IDT is loaded, or vectors 32-47 will not
    /// mean what the dispatch core assumes.
    pub fn remap(&self) {
        // Save the current line masks; initialization resets them.
        let mask1 = self.hal.inb(PIC1_DATA);
        let mask2 = self.hal.inb(PIC2_DATA);

        // ICW1: start initialization in cascade mode, ICW4 to follow.
        self.hal.outb(PIC1_COMMAND, ICW1_INIT | ICW1_ICW4);
        self.hal.io_wait();
        self.hal.outb(PIC2_COMMAND, ICW1_INIT | ICW1_ICW4);
        self.hal.io_wait();

        // ICW2: vector offsets, chosen to land just past the 32 CPU
        // exception vectors.
        self.hal.outb(PIC1_DATA, PIC1_OFFSET);
        self.hal.io_wait();
        self.hal.outb(PIC2_DATA, PIC2_OFFSET);
        self.hal.io_wait();

        // ICW3: master has a slave on line 2 (bit mask); slave learns
        // its cascade identity (plain number).
        self.hal.outb(PIC1_DATA, 4);
        self.hal.io_wait();
        self.hal.outb(PIC2_DATA, 2);
        self.hal.io_wait();

        // ICW4: 8086/88 mode on both.
        self.hal.outb(PIC1_DATA, ICW4_8086);
        self.hal.io_wait();
        self.hal.outb(PIC2_DATA, ICW4_8086);
        self.hal.io_wait();

        // Restore the saved masks.
        self.hal.outb(PIC1_DATA, mask1);
        self.hal.outb(PIC2_DATA, mask2);
    }

    /// Acknowledge a serviced interrupt so the controller can deliver
    /// the next one.
    ///
    /// Lines 8-15 are wired through the slave, which needs its own EOI
    /// before the master's; the master EOI is sent unconditionally.
    pub fn send_eoi(&self, irq: u8) {
        if irq >= 8 {
            self.hal.outb(PIC2_COMMAND, PIC_EOI);
        }
        self.hal.outb(PIC1_COMMAND, PIC_EOI);
    }

    /// Mask (disable) a single IRQ line.
    pub fn set_mask(&self, irq_line: u8) {
        let (port, line) = Self::line_register(irq_line);
        let value = self.hal.inb(port) | (1 << line);
        self.hal.outb(port, value);
    }

    /// Unmask (enable) a single IRQ line.
    pub fn clear_mask(&self, irq_line: u8) {
        let (port, line) = Self::line_register(irq_line);
        let value = self.hal.inb(port) & !(1 << line);
        self.hal.outb(port, value);
    }

    /// Mask every line on both controllers.
    pub fn disable(&self) {
        self.hal.outb(PIC1_DATA, 0xFF);
        self.hal.outb(PIC2_DATA, 0xFF);
    }

    /// Owning controller's data port and the line index within it.
    fn line_register(irq_line: u8) -> (u16, u8) {
        if irq_line < 8 {
            (PIC1_DATA, irq_line)
        } else {
            (PIC2_DATA, irq_line - 8)
        }
    }
}
