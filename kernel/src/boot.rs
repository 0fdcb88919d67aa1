//! Hardware boot path.
//!
//! The boot stub drops us here with interrupts disabled and a flat
//! GDT loaded. This module builds the one [`Kernel`] context,
//! publishes it for the interrupt entry glue, brings interrupts up,
//! and parks the CPU in a halt loop.

use core::panic::PanicInfo;

use kdisplay::TextConsole;
use khal::x86::X86Hal;
use khal::{Hal, Serial};
use spin::{Mutex, Once};

use crate::traps::{entry, Registers, IRQ_BASE_VECTOR, IRQ_LINES};
use crate::Kernel;

/// Kernel heap arena: 1 MiB of BSS.
const HEAP_SIZE: usize = 0x10_0000;

#[repr(C, align(8))]
struct HeapArena([u8; HEAP_SIZE]);

static mut HEAP_ARENA: HeapArena = HeapArena([0; HEAP_SIZE]);

/// The one kernel context. Published before interrupts are enabled,
/// so the entry glue always finds a fully built table; static storage
/// keeps the IDT address stable for the CPU.
static KERNEL: Once<Mutex<Kernel<X86Hal>>> = Once::new();

/// Routes the boot log to COM1. Each message is one locked write; the
/// COM1 writer masks interrupts around its lock, so logging is safe
/// from mainline code with interrupts enabled and from handlers alike.
struct SerialSink;

impl klog::Sink for SerialSink {
    fn write_fmt(&self, args: core::fmt::Arguments) {
        khal::serial::write_fmt(args);
    }
}

static SERIAL_SINK: SerialSink = SerialSink;

/// Kernel entry point, jumped to by the boot stub.
#[no_mangle]
pub extern "C" fn kmain() -> ! {
    let hal = unsafe { X86Hal::new() };

    let mut console = unsafe { TextConsole::vga() };
    console.clear();
    console.write_str("cinder: booting\n");

    khal::serial::init();
    klog::init(&SERIAL_SINK);
    klog::info!("serial log on COM1");

    let kernel = KERNEL.call_once(|| {
        let base = unsafe { core::ptr::addr_of_mut!(HEAP_ARENA) } as *mut u8;
        Mutex::new(unsafe { Kernel::new(hal, base, HEAP_SIZE) })
    });

    {
        let mut kernel = kernel.lock();
        kernel.table.pic().remap();
        kernel.table.initialize(&entry::stub_table());
        // Device drivers register their handlers here, while interrupts
        // are still off.
    }
    klog::info!("interrupt table live, heap {} KiB", HEAP_SIZE / 1024);

    hal.enable_interrupts();
    klog::info!("interrupts enabled");

    loop {
        hal.halt();
    }
}

/// Called by the assembly entry glue for every interrupt, with the
/// saved register frame. Runs with interrupts disabled (all gates are
/// interrupt gates), so taking the context lock cannot self-deadlock.
pub(crate) fn handle_interrupt(regs: &Registers) {
    // A vector before the context exists would mean the boot stub
    // enabled interrupts behind our back; drop it.
    let Some(kernel) = KERNEL.get() else { return };
    let kernel = kernel.lock();

    match kernel.table.dispatch(regs) {
        Ok(()) => {
            let vector = regs.vector as u8;
            if let Some(irq) = vector.checked_sub(IRQ_BASE_VECTOR) {
                if (irq as usize) < IRQ_LINES {
                    kernel.table.acknowledge(irq);
                }
            }
        }
        Err(fault) => fatal(format_args!("{fault}")),
    }
}

/// Unrecoverable condition: report on fresh, lock-free channels and
/// stop the machine.
fn fatal(message: core::fmt::Arguments) -> ! {
    let hal = unsafe { X86Hal::new() };
    let mut console = unsafe { TextConsole::vga() };
    let mut serial = Serial::new(hal, khal::serial::COM1);
    crate::util::panic::panic(&hal, &mut console, &mut serial, message)
}

#[panic_handler]
fn rust_panic(info: &PanicInfo) -> ! {
    fatal(format_args!("{info}"))
}
