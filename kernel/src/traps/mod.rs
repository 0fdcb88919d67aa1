//! Interrupt handling: the descriptor table, the dispatch core, and
//! the assembly entry glue.

mod dispatch;
mod idt;

#[cfg(target_arch = "x86")]
pub(crate) mod entry;

pub use dispatch::{
    exception_name, Fault, Handler, InterruptTable, Registers, EXCEPTION_COUNT,
    IRQ_BASE_VECTOR, IRQ_LINES, STUB_COUNT,
};
pub use idt::{GateFlags, Idt, IdtEntry, IDT_ENTRIES, KERNEL_CODE_SELECTOR};
