//! x86 (i686) implementation of the HAL.
//!
//! Thin wrappers around privileged instructions. These are the "bottom"
//! of the abstraction stack: no logic, just the instruction.

use crate::Hal;

/// The real hardware HAL.
///
/// A zero-sized handle; constructing one is the caller's assertion that
/// the code runs in ring 0 on an i686 machine, which is why `new` is
/// `unsafe`. Every method is then safe to call.
#[derive(Clone, Copy)]
pub struct X86Hal(());

impl X86Hal {
    /// # Safety
    ///
    /// Must only be constructed in kernel mode. Port I/O and the
    /// privileged instructions behind [`Hal`] fault in ring 3.
    pub const unsafe fn new() -> Self {
        Self(())
    }
}

impl Hal for X86Hal {
    #[inline]
    fn outb(&self, port: u16, value: u8) {
        unsafe {
            core::arch::asm!(
                "out dx, al",
                in("dx") port,
                in("al") value,
                options(nomem, nostack, preserves_flags)
            );
        }
    }

    #[inline]
    fn inb(&self, port: u16) -> u8 {
        let value: u8;
        unsafe {
            core::arch::asm!(
                "in al, dx",
                in("dx") port,
                out("al") value,
                options(nomem, nostack, preserves_flags)
            );
        }
        value
    }

    fn load_idt(&self, base: u32, limit: u16) {
        // 48-bit descriptor operand: 16-bit limit, 32-bit base.
        #[repr(C, packed)]
        struct DescriptorPointer {
            limit: u16,
            base: u32,
        }

        let pointer = DescriptorPointer { limit, base };
        unsafe {
            core::arch::asm!(
                "lidt [{}]",
                in(reg) &pointer,
                options(readonly, nostack, preserves_flags)
            );
        }
    }

    #[inline]
    fn enable_interrupts(&self) {
        unsafe {
            core::arch::asm!("sti", options(nomem, nostack));
        }
    }

    #[inline]
    fn disable_interrupts(&self) {
        unsafe {
            core::arch::asm!("cli", options(nomem, nostack));
        }
    }

    #[inline]
    fn interrupts_enabled(&self) -> bool {
        let eflags: u32;
        unsafe {
            core::arch::asm!(
                "pushfd",
                "pop {}",
                out(reg) eflags,
                options(nomem, preserves_flags)
            );
        }
        // Bit 9 is IF, the interrupt-enable flag.
        eflags & (1 << 9) != 0
    }

    #[inline]
    fn halt(&self) {
        unsafe {
            core::arch::asm!("hlt", options(nomem, nostack));
        }
    }

    fn halt_forever(&self) -> ! {
        loop {
            unsafe {
                core::arch::asm!("cli", "hlt", options(nomem, nostack));
            }
        }
    }
}
