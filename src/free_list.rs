/*!

The free-list: a singly-linked list of free blocks threaded through the
arena itself. The first word of each free block's payload stores the
address of the next free block (or null).

Grounded in the teacher's `bucket_list` / `unused_list` intrusive linked
lists over raw memory (`dag_node::allocator::Allocator`), generalized from
a list of fixed-size `Bucket` headers to a list of arbitrarily-sized free
blocks, and cross-checked against the address-ordered free lists in
`examples/other_examples/0262ccfc_sunsided-os...free_list.rs`.

Per spec.md 4.4, the resulting order of the free-list is not contractual --
only membership (every `Mark::Free` block, no duplicates, no non-free
entries) is.

*/

use std::ptr::NonNull;

use crate::arena::Arena;
use crate::header::{Header, Mark};

#[derive(Default)]
pub struct FreeList {
    head: Option<NonNull<u8>>,
}

impl FreeList {
    pub fn new() -> FreeList {
        FreeList { head: None }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn head(&self) -> Option<NonNull<u8>> {
        self.head
    }

    /// Pushes `payload` onto the head of the list. The block's header must
    /// already have `mark == Free`.
    pub fn push_front(&mut self, arena: &mut Arena, payload: NonNull<u8>) {
        debug_assert_eq!(arena.get_header_at(payload.as_ptr()).mark, Mark::Free);
        arena.set_free_next(payload.as_ptr(), self.head);
        self.head = Some(payload);
    }

    /// Scans from the head for the first block whose `block_size >= need`,
    /// unlinks it, and returns it. This is the allocator's first-fit scan
    /// (spec.md 4.2): the caller decides which of the three allocation
    /// clauses applies and is responsible for re-pushing any leftover tail.
    pub fn take_first_fit(&mut self, arena: &mut Arena, need: usize) -> Option<NonNull<u8>> {
        let mut prev: Option<NonNull<u8>> = None;
        let mut cursor = self.head;

        while let Some(node) = cursor {
            let header = arena.get_header_at(node.as_ptr());
            debug_assert_eq!(header.mark, Mark::Free, "free-list entry is not marked Free");

            let next = arena.get_free_next(node.as_ptr());
            if header.block_size() >= need {
                match prev {
                    None => self.head = next,
                    Some(p) => arena.set_free_next(p.as_ptr(), next),
                }
                return Some(node);
            }

            prev = cursor;
            cursor = next;
        }

        None
    }

    /// Removes every entry and rebuilds the list by walking the arena's
    /// headers linearly, used by [`crate::mark_sweep::merge`]'s "rebuild
    /// from scratch" pass.
    pub fn clear(&mut self) {
        self.head = None;
    }

    /// Returns the number of blocks currently on the list and the sum of
    /// their `block_size`s. Used by invariant checks and diagnostics; O(n).
    pub fn count_and_bytes(&self, arena: &Arena) -> (usize, usize) {
        let mut count = 0;
        let mut bytes = 0;
        let mut cursor = self.head;
        while let Some(node) = cursor {
            let header = arena.get_header_at(node.as_ptr());
            count += 1;
            bytes += header.block_size();
            cursor = arena.get_free_next(node.as_ptr());
        }
        (count, bytes)
    }

    /// Builds a fresh [`Header`] for a newly-split-off free tail and pushes
    /// it. Convenience used by the allocator's splittable clause.
    pub fn push_new_free_block(&mut self, arena: &mut Arena, payload: *mut u8, block_size: usize) {
        arena.set_header_at(payload, Header::new(block_size, Mark::Free));
        let payload = NonNull::new(payload).expect("free block payload must not be null");
        self.push_front(arena, payload);
    }
}
