//! VGA text-mode console.
//!
//! An 80x25 grid of 16-bit cells (low byte: ASCII, high byte: color
//! attribute) that the display adapter scans directly. A byte sink
//! only: no backpressure, no failure signalling.
#![cfg_attr(not(test), no_std)]

use core::fmt;

/// Text buffer dimensions.
pub const BUFFER_WIDTH: usize = 80;
pub const BUFFER_HEIGHT: usize = 25;

/// The 16 standard VGA colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
    Black = 0,
    Blue = 1,
    Green = 2,
    Cyan = 3,
    Red = 4,
    Magenta = 5,
    Brown = 6,
    LightGrey = 7,
    DarkGrey = 8,
    LightBlue = 9,
    LightGreen = 10,
    LightCyan = 11,
    LightRed = 12,
    Pink = 13,
    Yellow = 14,
    White = 15,
}

/// A packed foreground/background attribute byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct ColorCode(u8);

impl ColorCode {
    pub const fn new(foreground: Color, background: Color) -> Self {
        Self((background as u8) << 4 | (foreground as u8))
    }
}

/// Writer over a VGA-layout text buffer.
///
/// On hardware the buffer is the adapter's memory at 0xB8000; tests
/// hand in an ordinary array. Writes go through `write_volatile` so the
/// compiler never elides stores the adapter is scanning.
pub struct TextConsole {
    buffer: *mut u16,
    row: usize,
    column: usize,
    color: ColorCode,
}

// The raw buffer pointer is only ever used from one context at a time;
// the caller serializes access (boot code, or the panic path with
// interrupts already off).
unsafe impl Send for TextConsole {}

impl TextConsole {
    /// # Safety
    ///
    /// `buffer` must point to `BUFFER_WIDTH * BUFFER_HEIGHT` writable
    /// 16-bit cells that outlive the console, with no other writer.
    pub const unsafe fn new(buffer: *mut u16) -> Self {
        Self {
            buffer,
            row: 0,
            column: 0,
            color: ColorCode::new(Color::LightGrey, Color::Black),
        }
    }

    /// Console over the hardware VGA buffer.
    ///
    /// # Safety
    ///
    /// Requires VGA text mode and at most one console writing to it.
    #[cfg(target_arch = "x86")]
    pub const unsafe fn vga() -> Self {
        unsafe { Self::new(0xB8000 as *mut u16) }
    }

    pub fn set_color(&mut self, foreground: Color, background: Color) {
        self.color = ColorCode::new(foreground, background);
    }

    /// Blank the whole screen with the current color and home the cursor.
    pub fn clear(&mut self) {
        for row in 0..BUFFER_HEIGHT {
            self.clear_row(row);
        }
        self.row = 0;
        self.column = 0;
    }

    pub fn write_byte(&mut self, byte: u8) {
        match byte {
            b'\n' => self.new_line(),
            byte => {
                if self.column >= BUFFER_WIDTH {
                    self.new_line();
                }
                self.put_cell(self.row, self.column, byte);
                self.column += 1;
            }
        }
    }

    pub fn write_str(&mut self, s: &str) {
        for byte in s.bytes() {
            match byte {
                // Printable ASCII or newline; anything else becomes ■.
                0x20..=0x7E | b'\n' => self.write_byte(byte),
                _ => self.write_byte(0xFE),
            }
        }
    }

    fn new_line(&mut self) {
        self.column = 0;
        if self.row + 1 < BUFFER_HEIGHT {
            self.row += 1;
            return;
        }
        // Scroll: move every row up one, blank the last.
        for row in 1..BUFFER_HEIGHT {
            for col in 0..BUFFER_WIDTH {
                let cell = self.read_cell(row, col);
                self.write_cell(row - 1, col, cell);
            }
        }
        self.clear_row(BUFFER_HEIGHT - 1);
    }

    fn clear_row(&mut self, row: usize) {
        for col in 0..BUFFER_WIDTH {
            self.put_cell(row, col, b' ');
        }
    }

    fn put_cell(&mut self, row: usize, col: usize, byte: u8) {
        let cell = (self.color.0 as u16) << 8 | byte as u16;
        self.write_cell(row, col, cell);
    }

    fn write_cell(&mut self, row: usize, col: usize, cell: u16) {
        unsafe {
            self.buffer
                .add(row * BUFFER_WIDTH + col)
                .write_volatile(cell);
        }
    }

    fn read_cell(&self, row: usize, col: usize) -> u16 {
        unsafe { self.buffer.add(row * BUFFER_WIDTH + col).read_volatile() }
    }
}

impl fmt::Write for TextConsole {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        TextConsole::write_str(self, s);
        Ok(())
    }
}
