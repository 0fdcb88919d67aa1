//! Interrupt dispatch core.
//!
//! One table routes all 256 vectors. The low-level entry stubs funnel
//! every exception and IRQ into [`InterruptTable::dispatch`] with a
//! saved register snapshot; from there a registered handler runs, an
//! unhandled IRQ is logged and dropped, and an unhandled CPU exception
//! comes back as a [`Fault`] for the caller to escalate.

use core::fmt;

use khal::{Hal, Pic};

use super::idt::{GateFlags, Idt, IdtEntry, IDT_ENTRIES, KERNEL_CODE_SELECTOR};

/// CPU exception vectors 0-31.
pub const EXCEPTION_COUNT: usize = 32;
/// Legacy IRQ lines 0-15, remapped to vectors 32-47.
pub const IRQ_LINES: usize = 16;
/// First vector the PIC delivers after remapping.
pub const IRQ_BASE_VECTOR: u8 = 32;
/// Entry stubs the boot path installs: all exceptions plus all IRQs.
pub const STUB_COUNT: usize = EXCEPTION_COUNT + IRQ_LINES;

/// Register snapshot the entry stubs push before calling into Rust.
///
/// Field order is the stack layout: data segment first (pushed last),
/// then the PUSHA block, the stub-pushed vector and error code, and
/// finally the frame the CPU itself pushed. Changing this struct means
/// changing the assembly stubs in lockstep.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct Registers {
    pub ds: u32,
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    pub esp: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub vector: u32,
    pub err_code: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
    pub useresp: u32,
    pub ss: u32,
}

/// A handler for one vector. Runs with interrupts disabled and must
/// not block.
pub type Handler = fn(&Registers);

/// An unhandled CPU exception, reported up the call chain instead of
/// being printed at the point of detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    pub vector: u8,
    /// Hardware-pushed error code, present only for the exception
    /// vectors the architecture defines one for.
    pub err_code: Option<u32>,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unhandled exception {} ({})",
            self.vector,
            exception_name(self.vector)
        )?;
        if let Some(code) = self.err_code {
            write!(f, ", error code {code:#x}")?;
        }
        Ok(())
    }
}

/// Whether the CPU pushes an error code for this exception vector.
fn has_error_code(vector: u8) -> bool {
    matches!(vector, 8 | 10..=14 | 17 | 21)
}

/// Architecture name for an exception vector.
pub fn exception_name(vector: u8) -> &'static str {
    match vector {
        0 => "division error",
        1 => "debug",
        2 => "non-maskable interrupt",
        3 => "breakpoint",
        4 => "overflow",
        5 => "bound range exceeded",
        6 => "invalid opcode",
        7 => "device not available",
        8 => "double fault",
        9 => "coprocessor segment overrun",
        10 => "invalid TSS",
        11 => "segment not present",
        12 => "stack-segment fault",
        13 => "general protection fault",
        14 => "page fault",
        16 => "x87 floating-point exception",
        17 => "alignment check",
        18 => "machine check",
        19 => "SIMD floating-point exception",
        20 => "virtualization exception",
        21 => "control protection exception",
        _ => "reserved",
    }
}

/// The dispatch table plus the hardware it drives: the IDT the CPU
/// reads, the per-vector handler registry, and the PIC.
///
/// Owned by the boot path and threaded to whoever needs it; there is
/// no global registration API.
pub struct InterruptTable<H: Hal + Copy> {
    hal: H,
    pic: Pic<H>,
    idt: Idt,
    handlers: [Option<Handler>; IDT_ENTRIES],
}

impl<H: Hal + Copy> InterruptTable<H> {
    pub fn new(hal: H) -> Self {
        Self {
            hal,
            pic: Pic::new(hal),
            idt: Idt::new(),
            handlers: [None; IDT_ENTRIES],
        }
    }

    /// Point vectors 0-47 at the given entry stubs and hand the table
    /// to the CPU. Vectors 48-255 stay non-present.
    ///
    /// Interrupts remain disabled; enabling them is the caller's
    /// explicit step once its handlers are registered. The table must
    /// not move after this call, because the CPU holds its address.
    pub fn initialize(&mut self, stubs: &[u32; STUB_COUNT]) {
        let flags = GateFlags::GATE_32BIT | GateFlags::INTERRUPT;
        for (vector, &stub) in stubs.iter().enumerate() {
            self.idt
                .set_gate(vector as u8, stub, KERNEL_CODE_SELECTOR, flags);
        }
        self.idt.load(&self.hal);
    }

    /// Claim a vector. The latest registration wins; passing a new
    /// handler for a claimed vector replaces the old one.
    pub fn register_handler(&mut self, vector: u8, handler: Handler) {
        self.handlers[vector as usize] = Some(handler);
    }

    /// Route one interrupt by its saved snapshot.
    ///
    /// A registered handler consumes the interrupt outright. Without
    /// one, an exception vector is a fault the caller must escalate,
    /// an IRQ vector is logged and dropped, and anything else is
    /// silently ignored.
    pub fn dispatch(&self, regs: &Registers) -> Result<(), Fault> {
        let vector = regs.vector as u8;

        if let Some(handler) = self.handlers[vector as usize] {
            handler(regs);
            return Ok(());
        }

        if (vector as usize) < EXCEPTION_COUNT {
            return Err(Fault {
                vector,
                err_code: has_error_code(vector).then_some(regs.err_code),
            });
        }

        if let Some(irq) = vector.checked_sub(IRQ_BASE_VECTOR) {
            if (irq as usize) < IRQ_LINES {
                klog::warn!("unhandled IRQ {irq}");
            }
        }
        Ok(())
    }

    /// Send the PIC end-of-interrupt for a serviced IRQ line.
    ///
    /// Called by the entry glue exactly once per IRQ, after dispatch
    /// returns. Handlers never acknowledge themselves.
    pub fn acknowledge(&self, irq_line: u8) {
        self.pic.send_eoi(irq_line);
    }

    pub fn pic(&self) -> &Pic<H> {
        &self.pic
    }

    pub fn gate(&self, vector: u8) -> &IdtEntry {
        self.idt.entry(vector)
    }
}
