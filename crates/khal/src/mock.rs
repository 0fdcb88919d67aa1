//! Recording HAL for host-side tests.

use core::cell::RefCell;

use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec::Vec;

use crate::Hal;

#[derive(Default)]
struct MockState {
    /// Every port write, in issue order, with the interrupt-flag state
    /// at the moment of the write.
    writes: Vec<(u16, u8, bool)>,
    /// Last value written per port; also the backing store for reads,
    /// so read-modify-write sequences behave like a latched register.
    ports: BTreeMap<u16, u8>,
    /// Scripted reads, consumed before falling back to `ports`.
    queued: BTreeMap<u16, VecDeque<u8>>,
    interrupts_enabled: bool,
    loaded_idt: Option<(u32, u16)>,
}

/// A software stand-in for the hardware HAL.
///
/// Records every port write in order, serves reads from scripted queues
/// or from the last written value, and tracks the interrupt flag and
/// the loaded IDT. `halt_forever` panics so a test observes the halt
/// instead of hanging.
pub struct MockHal {
    state: RefCell<MockState>,
}

impl MockHal {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(MockState::default()),
        }
    }

    /// Preload a port's latched value (what `inb` returns until it is
    /// overwritten or shadowed by a queued read).
    pub fn set_port(&self, port: u16, value: u8) {
        self.state.borrow_mut().ports.insert(port, value);
    }

    /// Script a one-shot read for `port`; queued values win over the
    /// latched value and are consumed in FIFO order.
    pub fn queue_read(&self, port: u16, value: u8) {
        self.state
            .borrow_mut()
            .queued
            .entry(port)
            .or_default()
            .push_back(value);
    }

    /// All port writes so far, in order.
    pub fn writes(&self) -> Vec<(u16, u8)> {
        self.state
            .borrow()
            .writes
            .iter()
            .map(|&(port, value, _)| (port, value))
            .collect()
    }

    /// All port writes with the interrupt-flag state captured at each
    /// write, for asserting what ran with interrupts masked.
    pub fn writes_with_interrupt_state(&self) -> Vec<(u16, u8, bool)> {
        self.state.borrow().writes.clone()
    }

    /// Writes to a single port, in order.
    pub fn writes_to(&self, port: u16) -> Vec<u8> {
        self.state
            .borrow()
            .writes
            .iter()
            .filter(|(p, _, _)| *p == port)
            .map(|(_, v, _)| *v)
            .collect()
    }

    /// Current latched value of a port (0 if never touched).
    pub fn port(&self, port: u16) -> u8 {
        self.state.borrow().ports.get(&port).copied().unwrap_or(0)
    }

    /// Base and limit passed to the last `load_idt`, if any.
    pub fn loaded_idt(&self) -> Option<(u32, u16)> {
        self.state.borrow().loaded_idt
    }
}

impl Default for MockHal {
    fn default() -> Self {
        Self::new()
    }
}

impl Hal for MockHal {
    fn outb(&self, port: u16, value: u8) {
        let mut state = self.state.borrow_mut();
        let if_state = state.interrupts_enabled;
        state.writes.push((port, value, if_state));
        state.ports.insert(port, value);
    }

    fn inb(&self, port: u16) -> u8 {
        let mut state = self.state.borrow_mut();
        if let Some(queue) = state.queued.get_mut(&port) {
            if let Some(value) = queue.pop_front() {
                return value;
            }
        }
        state.ports.get(&port).copied().unwrap_or(0)
    }

    fn load_idt(&self, base: u32, limit: u16) {
        self.state.borrow_mut().loaded_idt = Some((base, limit));
    }

    fn enable_interrupts(&self) {
        self.state.borrow_mut().interrupts_enabled = true;
    }

    fn disable_interrupts(&self) {
        self.state.borrow_mut().interrupts_enabled = false;
    }

    fn interrupts_enabled(&self) -> bool {
        self.state.borrow().interrupts_enabled
    }

    fn halt(&self) {}

    fn halt_forever(&self) -> ! {
        panic!("halt_forever: processor stopped");
    }
}
