/*!

First-fit allocation over the free-list, with split / exact-fit / fill
policies (spec.md 4.2).

Generalizes the teacher's `Allocator::allocate_dag_node`, which only ever
hands back fixed-size `DagNode` slots, to variable-sized blocks. The
counter bookkeeping (`used_blocks`, `peak_used_bytes`, ...) follows the
same "track everything, report it in `dump_memory_variables`" shape as the
teacher, surfaced here through [`crate::stats::Stats`] instead of raw
`eprintln!`.

*/

use std::ptr::NonNull;

use crate::arena::{align_up, Arena, WORD};
use crate::free_list::FreeList;
use crate::header::{Header, Mark};
use crate::stats::Stats;

/// Smallest possible free block: a header plus at least one payload word,
/// the threshold spec.md 4.2's splittable clause requires for the tail.
pub const MIN_FREE_BLOCK: usize = WORD + WORD;

pub struct Allocator {
    pub arena: Arena,
    pub free_list: FreeList,
}

impl Allocator {
    /// Builds an allocator over a freshly-allocated arena of `capacity`
    /// bytes, seeded as one large free block spanning the whole arena.
    pub fn new(capacity: usize) -> Allocator {
        let mut arena = Arena::new(capacity);
        let mut free_list = FreeList::new();
        let payload = arena.index_to_addr(WORD);
        free_list.push_new_free_block(&mut arena, payload, capacity);
        Allocator { arena, free_list }
    }

    /// First-fit allocation. `bytes` must be positive. Returns the payload
    /// address, or `None` if no free block is large enough -- which is a
    /// normal outcome, not a failure (spec.md 4.7).
    pub fn allocate(&mut self, bytes: usize, stats: &mut Stats) -> Option<NonNull<u8>> {
        debug_assert!(bytes > 0, "cannot allocate zero bytes");
        let need = align_up(WORD + bytes, WORD);

        let block = self.free_list.take_first_fit(&mut self.arena, need)?;
        let header = self.arena.get_header_at(block.as_ptr());
        debug_assert_eq!(header.mark, Mark::Free);
        let block_size = header.block_size();

        let taken_size = if block_size == need {
            self.take_exact_fit(block, need);
            need
        } else if block_size - need >= MIN_FREE_BLOCK {
            self.take_splittable(block, block_size, need);
            need
        } else {
            self.take_overlarge(block, block_size, need);
            block_size
        };

        stats.record_allocation(block_size, taken_size);
        #[cfg(feature = "gc_debug")]
        log::trace!("allocator: allocated {} bytes ({} requested) at {:p}", taken_size, bytes, block.as_ptr());
        Some(block)
    }

    fn take_exact_fit(&mut self, block: NonNull<u8>, need: usize) {
        self.arena.set_header_at(block.as_ptr(), Header::new(need, Mark::NotMarked));
    }

    fn take_splittable(&mut self, block: NonNull<u8>, block_size: usize, need: usize) {
        self.arena.set_header_at(block.as_ptr(), Header::new(need, Mark::NotMarked));
        let tail_payload = unsafe { block.as_ptr().add(need) };
        let tail_size = block_size - need;
        self.free_list.push_new_free_block(&mut self.arena, tail_payload, tail_size);
    }

    fn take_overlarge(&mut self, block: NonNull<u8>, block_size: usize, need: usize) {
        self.arena.set_header_at(block.as_ptr(), Header::new(block_size, Mark::NotMarked));
        // Zero the slack so stale pointer-shaped bytes can't survive into
        // the next structural scan (spec.md 4.2).
        let payload_bytes = block_size - WORD;
        let used_bytes = need - WORD;
        if payload_bytes > used_bytes {
            unsafe {
                std::ptr::write_bytes(block.as_ptr().add(used_bytes), 0, payload_bytes - used_bytes);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhaustion_scenario_from_spec() {
        // spec.md 8: max_memory=48, allocate(1) and allocate(8) succeed
        // (16 bytes each), allocate(9) fails; used_blocks=2, free_blocks=1,
        // used_bytes=32, free_bytes=16.
        let mut allocator = Allocator::new(48);
        let mut stats = Stats::new(48);

        assert!(allocator.allocate(1, &mut stats).is_some());
        assert!(allocator.allocate(8, &mut stats).is_some());
        assert!(allocator.allocate(9, &mut stats).is_none());

        assert_eq!(stats.used_blocks, 2);
        assert_eq!(stats.used_bytes, 32);
        assert_eq!(stats.free_bytes, 16);
    }

    #[test]
    fn splitting_never_leaves_a_tail_smaller_than_two_words() {
        // A tail that would be smaller than MIN_FREE_BLOCK must fall into
        // the unsplittable clause instead.
        let mut allocator = Allocator::new(WORD * 8);
        let mut stats = Stats::new(WORD * 8);
        // Request all but one word less than the arena; the remaining
        // slack is too small to split off.
        let bytes = WORD * 8 - WORD - WORD + 1;
        let addr = allocator.allocate(bytes, &mut stats).unwrap();
        let header = allocator.arena.get_header_at(addr.as_ptr());
        assert_eq!(header.block_size(), WORD * 8);
    }

    #[test]
    fn boundary_allocation_sizes() {
        // spec.md 8: requesting exactly max_memory - WORD succeeds;
        // max_memory - WORD + 1 fails.
        let capacity = 64;
        let mut allocator = Allocator::new(capacity);
        let mut stats = Stats::new(capacity);
        assert!(allocator.allocate(capacity - WORD, &mut stats).is_some());

        let mut allocator = Allocator::new(capacity);
        let mut stats = Stats::new(capacity);
        assert!(allocator.allocate(capacity - WORD + 1, &mut stats).is_none());
    }
}
