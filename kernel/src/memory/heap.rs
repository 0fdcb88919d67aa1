//! Kernel heap: first-fit free-list allocator over one fixed arena.
//!
//! The arena is carved at boot into a single free block and tiled from
//! then on as alternating headers and payloads with no gaps: the sum
//! of header and payload sizes always equals the arena size exactly.
//! Headers are doubly linked in ascending address order, which makes
//! coalescing O(1) in both directions when a block is freed.
//!
//! The allocator is NOT interrupt-safe. An interrupt handler that
//! allocates while mainline code is mid-call can observe the list in a
//! torn state; callers that need the guarantee wrap the call in
//! `khal::without_interrupts`.

use core::mem::size_of;
use core::ptr::{self, NonNull};

/// Payload sizes are rounded up to this.
pub const ALIGNMENT: usize = 8;

/// Per-block bookkeeping overhead in bytes.
pub const HEADER_SIZE: usize = size_of::<BlockHeader>();

/// A block is only split when the excess beyond the request could hold
/// a header plus a payload of at least this many bytes.
const MIN_SPLIT_PAYLOAD: usize = 8;

/// Header preceding every payload in the arena.
///
/// `size` is the payload size in bytes, excluding the header itself.
#[repr(C)]
struct BlockHeader {
    size: usize,
    free: bool,
    next: *mut BlockHeader,
    prev: *mut BlockHeader,
}

/// The allocator state: one arena, one list head.
///
/// The head block always sits at the arena base; it may be split or
/// grown by coalescing, but its header never moves.
pub struct Heap {
    base: *mut u8,
    size: usize,
}

// One owner mutates the heap at a time; the raw pointers only ever
// reference the arena handed to `new`.
unsafe impl Send for Heap {}

impl Heap {
    /// Take ownership of `size` bytes at `base` and carve them into a
    /// single free block.
    ///
    /// # Safety
    ///
    /// `base` must be valid for reads and writes of `size` bytes for
    /// the heap's whole lifetime, exclusively owned by this heap, and
    /// aligned to [`ALIGNMENT`]. `size` must exceed [`HEADER_SIZE`].
    pub unsafe fn new(base: *mut u8, size: usize) -> Self {
        debug_assert_eq!(base as usize % ALIGNMENT, 0);
        debug_assert!(size > HEADER_SIZE);

        unsafe {
            (base as *mut BlockHeader).write(BlockHeader {
                size: size - HEADER_SIZE,
                free: true,
                next: ptr::null_mut(),
                prev: ptr::null_mut(),
            });
        }
        Self { base, size }
    }

    fn head(&self) -> *mut BlockHeader {
        self.base as *mut BlockHeader
    }

    /// Allocate `size` bytes, rounded up to a multiple of 8.
    ///
    /// First fit: the scan starts at the arena's first block and takes
    /// the first free block large enough, splitting off the tail when
    /// enough remains for another block. Returns `None` when no block
    /// qualifies; out of memory is a caller decision, never a panic.
    pub fn allocate(&mut self, size: usize) -> Option<NonNull<u8>> {
        let size = size.checked_add(ALIGNMENT - 1)? & !(ALIGNMENT - 1);

        let mut curr = self.head();
        while !curr.is_null() {
            unsafe {
                if (*curr).free && (*curr).size >= size {
                    if (*curr).size - size > HEADER_SIZE + MIN_SPLIT_PAYLOAD {
                        self.split(curr, size);
                    }
                    (*curr).free = false;
                    return NonNull::new(payload(curr));
                }
                curr = (*curr).next;
            }
        }
        None
    }

    /// Return a block to the heap and merge it with free neighbours.
    ///
    /// After this returns, no two address-adjacent blocks are both
    /// free.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by [`Heap::allocate`] on this heap
    /// and not freed since. Anything else is undefined: there is no
    /// magic number or canary to catch it.
    pub unsafe fn free(&mut self, ptr: NonNull<u8>) {
        unsafe {
            let block = header(ptr.as_ptr());
            (*block).free = true;

            // Absorb a free successor into this block.
            let next = (*block).next;
            if !next.is_null() && (*next).free {
                (*block).size += HEADER_SIZE + (*next).size;
                (*block).next = (*next).next;
                if !(*block).next.is_null() {
                    (*(*block).next).prev = block;
                }
            }

            // Let a free predecessor absorb this block.
            let prev = (*block).prev;
            if !prev.is_null() && (*prev).free {
                (*prev).size += HEADER_SIZE + (*block).size;
                (*prev).next = (*block).next;
                if !(*block).next.is_null() {
                    (*(*block).next).prev = prev;
                }
            }
        }
    }

    /// Carve `size` bytes out of `block`, linking the remainder in as a
    /// new free block immediately after it.
    unsafe fn split(&mut self, block: *mut BlockHeader, size: usize) {
        unsafe {
            let remainder =
                (block as *mut u8).add(HEADER_SIZE + size) as *mut BlockHeader;
            remainder.write(BlockHeader {
                size: (*block).size - size - HEADER_SIZE,
                free: true,
                next: (*block).next,
                prev: block,
            });
            if !(*remainder).next.is_null() {
                (*(*remainder).next).prev = remainder;
            }
            (*block).next = remainder;
            (*block).size = size;
        }
    }
}

fn payload(block: *mut BlockHeader) -> *mut u8 {
    (block as *mut u8).wrapping_add(HEADER_SIZE)
}

/// Header at the fixed offset immediately preceding a payload pointer.
unsafe fn header(ptr: *mut u8) -> *mut BlockHeader {
    ptr.wrapping_sub(HEADER_SIZE) as *mut BlockHeader
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARENA_SIZE: usize = 4096;

    #[repr(align(8))]
    struct Arena([u8; ARENA_SIZE]);

    fn arena() -> (Box<Arena>, Heap) {
        let mut backing = Box::new(Arena([0; ARENA_SIZE]));
        let heap = unsafe { Heap::new(backing.0.as_mut_ptr(), ARENA_SIZE) };
        (backing, heap)
    }

    /// (payload size, free) for every block, in address order.
    fn blocks(heap: &Heap) -> Vec<(usize, bool)> {
        let mut out = Vec::new();
        let mut curr = heap.head();
        while !curr.is_null() {
            unsafe {
                out.push(((*curr).size, (*curr).free));
                curr = (*curr).next;
            }
        }
        out
    }

    /// Every byte of the arena is accounted for by a header or payload.
    fn assert_conserved(heap: &Heap) {
        let total: usize = blocks(heap)
            .iter()
            .map(|(size, _)| HEADER_SIZE + size)
            .sum();
        assert_eq!(total, heap.size);
    }

    /// No two address-adjacent blocks are both free.
    fn assert_coalesced(heap: &Heap) {
        let states: Vec<bool> = blocks(heap).iter().map(|&(_, free)| free).collect();
        for pair in states.windows(2) {
            assert!(!(pair[0] && pair[1]), "adjacent free blocks: {states:?}");
        }
    }

    #[test]
    fn starts_as_a_single_free_block_spanning_the_arena() {
        let (_backing, heap) = arena();
        assert_eq!(blocks(&heap), vec![(ARENA_SIZE - HEADER_SIZE, true)]);
        assert_conserved(&heap);
    }

    #[test]
    fn requests_round_up_to_eight_bytes() {
        let (_backing, mut heap) = arena();
        let a = heap.allocate(1).unwrap();
        let b = heap.allocate(1).unwrap();

        let gap = b.as_ptr() as usize - a.as_ptr() as usize;
        assert_eq!(gap, 8 + HEADER_SIZE);
    }

    #[test]
    fn two_allocations_are_disjoint_and_marked_in_use() {
        let (_backing, mut heap) = arena();
        let a = heap.allocate(100).unwrap();
        let b = heap.allocate(200).unwrap();

        let a_range = a.as_ptr() as usize..a.as_ptr() as usize + 104;
        let b_start = b.as_ptr() as usize;
        assert!(!a_range.contains(&b_start));

        let states = blocks(&heap);
        assert_eq!(states[0], (104, false));
        assert_eq!(states[1], (200, false));
        assert_conserved(&heap);
    }

    #[test]
    fn splitting_leaves_the_remainder_free() {
        let (_backing, mut heap) = arena();
        heap.allocate(64).unwrap();

        let states = blocks(&heap);
        assert_eq!(states.len(), 2);
        assert_eq!(states[0], (64, false));
        assert_eq!(states[1], (ARENA_SIZE - 2 * HEADER_SIZE - 64, true));
        assert_conserved(&heap);
    }

    #[test]
    fn small_excess_is_not_split_off() {
        let (_backing, mut heap) = arena();
        // Leave exactly HEADER_SIZE + 8 spare: not enough to be worth a
        // new block, so the caller gets the whole thing.
        let request = ARENA_SIZE - 2 * HEADER_SIZE - 8;
        heap.allocate(request).unwrap();

        assert_eq!(blocks(&heap), vec![(ARENA_SIZE - HEADER_SIZE, false)]);
    }

    #[test]
    fn oversized_request_fails_and_leaves_the_arena_unchanged() {
        let (_backing, mut heap) = arena();
        let before = blocks(&heap);

        assert!(heap.allocate(ARENA_SIZE).is_none());
        assert!(heap.allocate(usize::MAX - 2).is_none());

        assert_eq!(blocks(&heap), before);
    }

    #[test]
    fn failed_allocation_after_exhaustion_changes_nothing() {
        let (_backing, mut heap) = arena();
        // Take the whole arena in one block.
        heap.allocate(ARENA_SIZE - HEADER_SIZE).unwrap();
        let before = blocks(&heap);

        assert!(heap.allocate(1).is_none());
        assert_eq!(blocks(&heap), before);
        assert_conserved(&heap);
    }

    #[test]
    fn freed_block_is_recycled_at_the_same_address() {
        let (_backing, mut heap) = arena();
        let first = heap.allocate(100).unwrap();
        unsafe { heap.free(first) };

        let second = heap.allocate(100).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn free_merges_with_the_next_block() {
        let (_backing, mut heap) = arena();
        let a = heap.allocate(100).unwrap();
        let b = heap.allocate(200).unwrap();
        let _c = heap.allocate(50).unwrap();

        unsafe {
            heap.free(b);
            heap.free(a);
        }

        // a absorbed b: one free block of both payloads plus b's header.
        let states = blocks(&heap);
        assert_eq!(states[0], (104 + HEADER_SIZE + 200, true));
        assert_coalesced(&heap);
        assert_conserved(&heap);
    }

    #[test]
    fn free_merges_with_the_previous_block() {
        let (_backing, mut heap) = arena();
        let a = heap.allocate(100).unwrap();
        let b = heap.allocate(200).unwrap();
        let _c = heap.allocate(50).unwrap();

        unsafe {
            heap.free(a);
            heap.free(b);
        }

        let states = blocks(&heap);
        assert_eq!(states[0], (104 + HEADER_SIZE + 200, true));
        assert_coalesced(&heap);
        assert_conserved(&heap);
    }

    #[test]
    fn freeing_everything_restores_a_single_block() {
        let (_backing, mut heap) = arena();
        let a = heap.allocate(100).unwrap();
        let b = heap.allocate(200).unwrap();
        let c = heap.allocate(50).unwrap();

        unsafe {
            heap.free(b);
            heap.free(c);
            heap.free(a);
        }

        assert_eq!(blocks(&heap), vec![(ARENA_SIZE - HEADER_SIZE, true)]);
    }

    #[test]
    fn invariants_hold_across_a_mixed_workload() {
        let (_backing, mut heap) = arena();
        let mut live = Vec::new();

        for size in [16, 200, 8, 96, 48, 512, 24] {
            if let Some(ptr) = heap.allocate(size) {
                live.push(ptr);
            }
            assert_conserved(&heap);
        }
        // Free every other allocation, then the rest.
        for ptr in live.iter().copied().step_by(2) {
            unsafe { heap.free(ptr) };
            assert_conserved(&heap);
            assert_coalesced(&heap);
        }
        for ptr in live.iter().copied().skip(1).step_by(2) {
            unsafe { heap.free(ptr) };
            assert_conserved(&heap);
            assert_coalesced(&heap);
        }

        assert_eq!(blocks(&heap), vec![(ARENA_SIZE - HEADER_SIZE, true)]);
    }
}
