//! Kernel logging subsystem.
//!
//! Levelled macros over one installed [`Sink`]. On hardware the sink is
//! the COM1 serial port; host tests install a capture buffer instead.
//! Before [`init`] runs (or if it never does), logging is a no-op.
#![cfg_attr(not(test), no_std)]

use core::fmt;

use spin::Once;

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => " INFO",
            Level::Warn => " WARN",
            Level::Error => "ERROR",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Level::Trace => "\x1b[90m", // Gray
            Level::Debug => "\x1b[36m", // Cyan
            Level::Info => "\x1b[32m",  // Green
            Level::Warn => "\x1b[33m",  // Yellow
            Level::Error => "\x1b[31m", // Red
        }
    }
}

/// Where log output goes. Writes carry no failure signal.
///
/// A sink receives each message as one complete call, so concurrent
/// writers (mainline code and interrupt handlers) can interleave whole
/// lines but never tear one apart.
pub trait Sink: Sync {
    fn write_fmt(&self, args: fmt::Arguments);
}

static SINK: Once<&'static dyn Sink> = Once::new();

/// Install the output sink. The first call wins; later calls are
/// ignored so boot code and tests cannot fight over it.
pub fn init(sink: &'static dyn Sink) {
    SINK.call_once(|| sink);
}

/// Log a message with a specific level
pub fn log(level: Level, args: fmt::Arguments) {
    let Some(sink) = SINK.get() else { return };
    sink.write_fmt(format_args!(
        "{}[{}]\x1b[0m {}\n",
        level.color(),
        level.as_str(),
        args
    ));
}

/// Print to the sink without level decoration
pub fn print(args: fmt::Arguments) {
    let Some(sink) = SINK.get() else { return };
    sink.write_fmt(args);
}

/// Log at TRACE level
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::log($crate::Level::Trace, format_args!($($arg)*))
    };
}

/// Log at DEBUG level
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::log($crate::Level::Debug, format_args!($($arg)*))
    };
}

/// Log at INFO level
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::log($crate::Level::Info, format_args!($($arg)*))
    };
}

/// Log at WARN level
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::log($crate::Level::Warn, format_args!($($arg)*))
    };
}

/// Log at ERROR level
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::log($crate::Level::Error, format_args!($($arg)*))
    };
}

/// Print without newline
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::print(format_args!($($arg)*))
    };
}

/// Print with newline
#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => {
        $crate::print(format_args!("{}\n", format_args!($($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::String;
    use std::sync::Mutex;
    use std::vec::Vec;

    /// Records each sink call as its own entry.
    struct Capture(Mutex<Vec<String>>);

    impl Sink for Capture {
        fn write_fmt(&self, args: fmt::Arguments) {
            self.0.lock().unwrap().push(std::fmt::format(args));
        }
    }

    static CAPTURE: Capture = Capture(Mutex::new(Vec::new()));

    /// The capture is crate-global state; tests that use it run one at
    /// a time.
    static SERIALIZE: Mutex<()> = Mutex::new(());

    fn exclusive() -> std::sync::MutexGuard<'static, ()> {
        SERIALIZE
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn drain() -> Vec<String> {
        std::mem::take(&mut *CAPTURE.0.lock().unwrap())
    }

    #[test]
    fn log_and_print_reach_the_installed_sink() {
        let _serialized = exclusive();
        init(&CAPTURE);
        drain();

        crate::info!("heap at {:#x}", 0x10_0000);
        crate::print!("raw {}", 7);

        let out = drain().concat();
        assert!(out.contains("[ INFO]"));
        assert!(out.contains("heap at 0x100000"));
        assert!(out.contains("raw 7"));
    }

    #[test]
    fn each_message_is_a_single_sink_call() {
        let _serialized = exclusive();
        init(&CAPTURE);
        drain();

        crate::warn!("unhandled IRQ {}", 9);

        let calls = drain();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].contains("[ WARN]"));
        assert!(calls[0].contains("unhandled IRQ 9"));
        assert!(calls[0].ends_with('\n'));
    }

    #[test]
    fn println_emits_one_call_with_the_newline_attached() {
        let _serialized = exclusive();
        init(&CAPTURE);
        drain();

        crate::println!("boot stage {}", 2);

        assert_eq!(drain(), ["boot stage 2\n"]);
    }

    #[test]
    fn level_labels_are_fixed_width() {
        for level in [Level::Trace, Level::Debug, Level::Info, Level::Warn, Level::Error] {
            assert_eq!(level.as_str().len(), 5);
        }
    }
}
