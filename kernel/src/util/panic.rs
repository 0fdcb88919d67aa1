//! Panic sink: last words on every channel, then a permanent halt.
//!
//! Deliberately avoids the normal output paths. The VGA console and
//! serial port are rebuilt from scratch by the caller so a panic can
//! report even when the logging stack or a lock is part of what broke.

use core::fmt::{self, Write};

use kdisplay::{Color, TextConsole};
use khal::Hal;

/// Write the banner and message to both output channels.
///
/// Split out from [`panic`] so the formatting is host-testable;
/// nothing in here halts or touches interrupt state.
pub fn report(console: &mut TextConsole, serial: &mut dyn Write, message: fmt::Arguments) {
    console.set_color(Color::White, Color::Red);
    console.clear();
    let _ = write!(console, "\n*** KERNEL PANIC ***\n\n{message}\n");
    let _ = write!(serial, "\n*** KERNEL PANIC ***\n\n{message}\n");
}

/// The terminal failure path. Interrupts off first, so nothing can
/// preempt the report; then the processor stops for good.
pub fn panic<H: Hal>(
    hal: &H,
    console: &mut TextConsole,
    serial: &mut dyn Write,
    message: fmt::Arguments,
) -> ! {
    hal.disable_interrupts();
    report(console, serial, message);
    hal.halt_forever()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kdisplay::{BUFFER_HEIGHT, BUFFER_WIDTH};
    use khal::mock::MockHal;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    const CELLS: usize = BUFFER_WIDTH * BUFFER_HEIGHT;

    #[test]
    fn report_writes_banner_to_both_channels() {
        let mut buf = [0u16; CELLS];
        let mut console = unsafe { TextConsole::new(buf.as_mut_ptr()) };
        let mut serial = String::new();

        report(
            &mut console,
            &mut serial,
            format_args!("unhandled exception 13 (general protection fault)"),
        );

        assert!(serial.contains("*** KERNEL PANIC ***"));
        assert!(serial.contains("general protection fault"));

        // Every cell carries the white-on-red attribute.
        let attr = (Color::Red as u8) << 4 | Color::White as u8;
        for cell in buf {
            assert_eq!((cell >> 8) as u8, attr);
        }
        // The banner itself landed on screen (row 1, after the leading
        // newline).
        let row1: Vec<u8> = (0..BUFFER_WIDTH)
            .map(|col| buf[BUFFER_WIDTH + col] as u8)
            .collect();
        assert!(row1.starts_with(b"*** KERNEL PANIC ***"));
    }

    #[test]
    fn panic_disables_interrupts_then_halts() {
        let hal = MockHal::new();
        hal.enable_interrupts();

        let mut buf = [0u16; CELLS];
        let mut console = unsafe { TextConsole::new(buf.as_mut_ptr()) };
        let mut serial = String::new();

        let result = catch_unwind(AssertUnwindSafe(|| {
            panic(&hal, &mut console, &mut serial, format_args!("boom"));
        }));

        // The mock models halt_forever as an unwind.
        assert!(result.is_err());
        assert!(!hal.interrupts_enabled());
        assert!(serial.contains("boom"));
    }
}
