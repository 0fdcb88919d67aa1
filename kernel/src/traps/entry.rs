//! Low-level interrupt entry stubs.
//!
//! One tiny stub per vector normalizes the stack into the
//! [`Registers`] layout and funnels into a common path that saves the
//! register file, switches to the kernel data segment, and calls the
//! Rust-side entry. Vectors whose exceptions push no hardware error
//! code push a dummy zero so the frame shape is identical everywhere.

use core::arch::global_asm;

use super::dispatch::{Registers, STUB_COUNT};

global_asm!(
    r#"
.macro isr_noerr vector
.global isr_stub_\vector
isr_stub_\vector:
    push 0
    push \vector
    jmp isr_common
.endm

.macro isr_err vector
.global isr_stub_\vector
isr_stub_\vector:
    push \vector
    jmp isr_common
.endm

// CPU exceptions. 8, 10-14, 17 and 21 push their own error code.
isr_noerr 0
isr_noerr 1
isr_noerr 2
isr_noerr 3
isr_noerr 4
isr_noerr 5
isr_noerr 6
isr_noerr 7
isr_err   8
isr_noerr 9
isr_err   10
isr_err   11
isr_err   12
isr_err   13
isr_err   14
isr_noerr 15
isr_noerr 16
isr_err   17
isr_noerr 18
isr_noerr 19
isr_noerr 20
isr_err   21
isr_noerr 22
isr_noerr 23
isr_noerr 24
isr_noerr 25
isr_noerr 26
isr_noerr 27
isr_noerr 28
isr_noerr 29
isr_noerr 30
isr_noerr 31

// Remapped PIC lines, vectors 32-47. The PIC never pushes an error
// code.
isr_noerr 32
isr_noerr 33
isr_noerr 34
isr_noerr 35
isr_noerr 36
isr_noerr 37
isr_noerr 38
isr_noerr 39
isr_noerr 40
isr_noerr 41
isr_noerr 42
isr_noerr 43
isr_noerr 44
isr_noerr 45
isr_noerr 46
isr_noerr 47

isr_common:
    pusha

    // Save the interrupted data segment, load the kernel's (GDT
    // selector 0x10).
    mov ax, ds
    push eax
    mov ax, 0x10
    mov ds, ax
    mov es, ax
    mov fs, ax
    mov gs, ax
    cld

    // ESP now points at the Registers frame; pass it by pointer.
    push esp
    call interrupt_entry
    add esp, 4

    pop eax
    mov ds, ax
    mov es, ax
    mov fs, ax
    mov gs, ax

    popa
    // Drop the vector and error code the stub pushed.
    add esp, 8
    iretd
"#
);

extern "C" {
    fn isr_stub_0();
    fn isr_stub_1();
    fn isr_stub_2();
    fn isr_stub_3();
    fn isr_stub_4();
    fn isr_stub_5();
    fn isr_stub_6();
    fn isr_stub_7();
    fn isr_stub_8();
    fn isr_stub_9();
    fn isr_stub_10();
    fn isr_stub_11();
    fn isr_stub_12();
    fn isr_stub_13();
    fn isr_stub_14();
    fn isr_stub_15();
    fn isr_stub_16();
    fn isr_stub_17();
    fn isr_stub_18();
    fn isr_stub_19();
    fn isr_stub_20();
    fn isr_stub_21();
    fn isr_stub_22();
    fn isr_stub_23();
    fn isr_stub_24();
    fn isr_stub_25();
    fn isr_stub_26();
    fn isr_stub_27();
    fn isr_stub_28();
    fn isr_stub_29();
    fn isr_stub_30();
    fn isr_stub_31();
    fn isr_stub_32();
    fn isr_stub_33();
    fn isr_stub_34();
    fn isr_stub_35();
    fn isr_stub_36();
    fn isr_stub_37();
    fn isr_stub_38();
    fn isr_stub_39();
    fn isr_stub_40();
    fn isr_stub_41();
    fn isr_stub_42();
    fn isr_stub_43();
    fn isr_stub_44();
    fn isr_stub_45();
    fn isr_stub_46();
    fn isr_stub_47();
}

/// Stub addresses in vector order, ready for
/// [`InterruptTable::initialize`](super::InterruptTable::initialize).
pub(crate) fn stub_table() -> [u32; STUB_COUNT] {
    [
        isr_stub_0 as usize as u32,
        isr_stub_1 as usize as u32,
        isr_stub_2 as usize as u32,
        isr_stub_3 as usize as u32,
        isr_stub_4 as usize as u32,
        isr_stub_5 as usize as u32,
        isr_stub_6 as usize as u32,
        isr_stub_7 as usize as u32,
        isr_stub_8 as usize as u32,
        isr_stub_9 as usize as u32,
        isr_stub_10 as usize as u32,
        isr_stub_11 as usize as u32,
        isr_stub_12 as usize as u32,
        isr_stub_13 as usize as u32,
        isr_stub_14 as usize as u32,
        isr_stub_15 as usize as u32,
        isr_stub_16 as usize as u32,
        isr_stub_17 as usize as u32,
        isr_stub_18 as usize as u32,
        isr_stub_19 as usize as u32,
        isr_stub_20 as usize as u32,
        isr_stub_21 as usize as u32,
        isr_stub_22 as usize as u32,
        isr_stub_23 as usize as u32,
        isr_stub_24 as usize as u32,
        isr_stub_25 as usize as u32,
        isr_stub_26 as usize as u32,
        isr_stub_27 as usize as u32,
        isr_stub_28 as usize as u32,
        isr_stub_29 as usize as u32,
        isr_stub_30 as usize as u32,
        isr_stub_31 as usize as u32,
        isr_stub_32 as usize as u32,
        isr_stub_33 as usize as u32,
        isr_stub_34 as usize as u32,
        isr_stub_35 as usize as u32,
        isr_stub_36 as usize as u32,
        isr_stub_37 as usize as u32,
        isr_stub_38 as usize as u32,
        isr_stub_39 as usize as u32,
        isr_stub_40 as usize as u32,
        isr_stub_41 as usize as u32,
        isr_stub_42 as usize as u32,
        isr_stub_43 as usize as u32,
        isr_stub_44 as usize as u32,
        isr_stub_45 as usize as u32,
        isr_stub_46 as usize as u32,
        isr_stub_47 as usize as u32,
    ]
}

/// Common Rust-side entry, called by `isr_common` with a pointer to
/// the saved frame.
#[no_mangle]
extern "C" fn interrupt_entry(regs: *const Registers) {
    // The stub built a complete, aligned Registers frame on the stack.
    let regs = unsafe { &*regs };
    crate::boot::handle_interrupt(regs);
}
