//! cinder: the bootstrap core of an i686 kernel.
//!
//! Everything needed to get from "the boot stub jumped here" to a
//! machine that services interrupts and hands out memory: the 8259 PIC
//! driver and IDT live in [`traps`], the free-list heap in [`memory`],
//! and the panic sink in [`util::panic`]. All hardware access goes
//! through the `khal` traits, so the whole core also compiles and runs
//! under `cargo test` on the build host with a mock in place of the
//! machine.

#![cfg_attr(not(test), no_std)]

pub mod memory;
pub mod traps;
pub mod util;

#[cfg(target_arch = "x86")]
mod boot;

use khal::Hal;
use memory::Heap;
use traps::InterruptTable;

/// The kernel's owned state, built once at boot and threaded
/// explicitly to the code that needs it. No component reaches for a
/// global to find its dispatch table or its heap.
pub struct Kernel<H: Hal + Copy> {
    pub table: InterruptTable<H>,
    pub heap: Heap,
}

impl<H: Hal + Copy> Kernel<H> {
    /// # Safety
    ///
    /// The heap arena must satisfy the requirements of [`Heap::new`]:
    /// exclusively owned, 8-byte aligned, valid for the kernel's whole
    /// lifetime.
    pub unsafe fn new(hal: H, heap_base: *mut u8, heap_size: usize) -> Self {
        Self {
            table: InterruptTable::new(hal),
            heap: unsafe { Heap::new(heap_base, heap_size) },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traps::Registers;
    use khal::mock::MockHal;

    #[repr(align(8))]
    struct Arena([u8; 4096]);

    #[test]
    fn a_whole_kernel_runs_against_the_mock() {
        static TICKS: std::sync::atomic::AtomicUsize =
            std::sync::atomic::AtomicUsize::new(0);

        fn on_timer(_: &Registers) {
            TICKS.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }

        let hal = MockHal::new();
        let mut arena = Box::new(Arena([0; 4096]));
        let mut kernel =
            unsafe { Kernel::new(&hal, arena.0.as_mut_ptr(), 4096) };

        kernel.table.pic().remap();
        kernel.table.register_handler(32, on_timer);

        let buffer = kernel.heap.allocate(128);
        assert!(buffer.is_some());

        let mut regs = Registers {
            ds: 0x10,
            edi: 0,
            esi: 0,
            ebp: 0,
            esp: 0,
            ebx: 0,
            edx: 0,
            ecx: 0,
            eax: 0,
            vector: 32,
            err_code: 0,
            eip: 0,
            cs: 0x08,
            eflags: 0x202,
            useresp: 0,
            ss: 0,
        };
        assert_eq!(kernel.table.dispatch(&regs), Ok(()));
        assert_eq!(TICKS.load(std::sync::atomic::Ordering::SeqCst), 1);

        // An unhandled double fault surfaces as an error, not a print.
        regs.vector = 8;
        regs.err_code = 0;
        assert!(kernel.table.dispatch(&regs).is_err());
    }
}
