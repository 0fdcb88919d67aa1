//! Serial port (16550 UART) driver.
//!
//! A plain byte sink with no backpressure or failure signalling: the
//! panic path and the boot log both assume writes always "succeed".

use core::fmt;

use spin::Mutex;

use crate::Hal;

/// COM1 base port address.
pub const COM1: u16 = 0x3F8;

/// Divisor clock for the 16550 baud-rate generator.
const UART_CLOCK: u32 = 115_200;

/// UART register offsets from the base port.
const DATA: u16 = 0;
const INT_ENABLE: u16 = 1;
const FIFO_CTRL: u16 = 2;
const LINE_CTRL: u16 = 3;
const MODEM_CTRL: u16 = 4;
const LINE_STATUS: u16 = 5;

/// Driver for one 16550-compatible UART.
pub struct Serial<H: Hal> {
    hal: H,
    base: u16,
}

impl<H: Hal> Serial<H> {
    pub const fn new(hal: H, base: u16) -> Self {
        Self { hal, base }
    }

    /// Program the UART: set the baud divisor, 8 data bits, no parity,
    /// one stop bit, FIFOs enabled with a 14-byte threshold.
    pub fn init(&self, baud_rate: u32) {
        let divisor = (UART_CLOCK / baud_rate) as u16;

        // Disable UART interrupts; this driver polls.
        self.hal.outb(self.base + INT_ENABLE, 0x00);

        // DLAB on, so the next two data-register writes set the divisor.
        self.hal.outb(self.base + LINE_CTRL, 0x80);
        self.hal.outb(self.base + DATA, (divisor & 0xFF) as u8);
        self.hal.outb(self.base + INT_ENABLE, (divisor >> 8) as u8);

        // 8N1, DLAB back off.
        self.hal.outb(self.base + LINE_CTRL, 0x03);

        // Enable and clear FIFOs, 14-byte interrupt threshold.
        self.hal.outb(self.base + FIFO_CTRL, 0xC7);

        // DTR + RTS + OUT2.
        self.hal.outb(self.base + MODEM_CTRL, 0x0B);
    }

    /// Whether the transmit holding register is empty (LSR bit 5).
    fn transmit_empty(&self) -> bool {
        self.hal.inb(self.base + LINE_STATUS) & 0x20 != 0
    }

    /// Write one byte, polling until the transmitter can take it.
    pub fn write_byte(&self, byte: u8) {
        while !self.transmit_empty() {
            core::hint::spin_loop();
        }
        self.hal.outb(self.base + DATA, byte);
    }

    /// Write a string, translating `\n` to `\r\n` for terminals.
    pub fn write_str(&self, s: &str) {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(byte);
        }
    }
}

impl<H: Hal> fmt::Write for Serial<H> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        Serial::write_str(self, s);
        Ok(())
    }
}

/// A [`Serial`] behind a spin lock, shareable between mainline code
/// and interrupt handlers.
///
/// Invariant: the lock is only ever acquired with interrupts masked,
/// and they stay masked until it is released. An interrupt handler
/// that writes here can therefore never preempt a holder and spin on
/// a lock that will not be released.
pub struct SharedSerial<H: Hal> {
    hal: H,
    port: Mutex<Serial<H>>,
}

impl<H: Hal + Copy> SharedSerial<H> {
    pub const fn new(hal: H, base: u16) -> Self {
        Self {
            hal,
            port: Mutex::new(Serial::new(hal, base)),
        }
    }

    fn with_port<R>(&self, f: impl FnOnce(&mut Serial<H>) -> R) -> R {
        crate::without_interrupts(&self.hal, || f(&mut self.port.lock()))
    }

    pub fn init(&self, baud_rate: u32) {
        self.with_port(|port| port.init(baud_rate));
    }

    pub fn write_str(&self, s: &str) {
        self.with_port(|port| Serial::write_str(port, s));
    }

    pub fn write_fmt(&self, args: fmt::Arguments) {
        use core::fmt::Write;
        self.with_port(|port| {
            let _ = port.write_fmt(args);
        });
    }
}

/// Global COM1 instance for the hardware build.
///
/// Boot code initializes this once and the log sink writes through it
/// for the rest of the kernel's lifetime.
#[cfg(target_arch = "x86")]
mod com1 {
    use super::{SharedSerial, COM1};
    use crate::x86::X86Hal;

    static SERIAL: SharedSerial<X86Hal> =
        SharedSerial::new(unsafe { X86Hal::new() }, COM1);

    /// Initialize COM1 at 115200 baud.
    pub fn init() {
        SERIAL.init(115_200);
    }

    /// Write a string to COM1.
    pub fn write_str(s: &str) {
        SERIAL.write_str(s);
    }

    /// Write formatted arguments to COM1.
    pub fn write_fmt(args: core::fmt::Arguments) {
        SERIAL.write_fmt(args);
    }
}

#[cfg(target_arch = "x86")]
pub use com1::{init, write_fmt, write_str};
