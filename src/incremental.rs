/*!

The incremental engine: a two-phase (`Mark`, `Sweep`) state machine driven
in small work quanta by each allocation, plus the Dijkstra-style
write-barrier enqueue rule and the allocate-black policy (spec.md 4.6).

There is no teacher precedent for incrementality -- `dag_node::allocator`
is entirely stop-the-world (its "lazy sweep" amortizes sweep cost across
allocations but never interleaves marking) -- so this module is grounded
instead in `examples/other_examples/9c866512_ZenVoich-motoko__...incremental.rs.rs`
and `.../9b9757d1_robey-mwgc__src-heap.rs.rs`'s `Phase` /
`mark_start`/`mark_round` split, adapted from their block-coloring schemes
to this collector's single `mark: Mark` header field plus an explicit gray
queue.

*/

use std::collections::VecDeque;
use std::ptr::NonNull;

use crate::arena::{Arena, WORD};
use crate::free_list::FreeList;
use crate::header::Mark;
use crate::roots::RootSet;
use crate::stats::Stats;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Phase {
    Mark,
    Sweep,
}

pub struct IncrementalState {
    pub phase: Phase,
    pub gray: VecDeque<*mut u8>,
    pub resume_sweep_from: *mut u8,
}

impl IncrementalState {
    pub fn new(arena: &Arena) -> IncrementalState {
        IncrementalState {
            phase: Phase::Mark,
            gray: VecDeque::new(),
            resume_sweep_from: arena.index_to_addr(WORD),
        }
    }

    /// Enqueues every root whose current value is an in-arena address.
    /// Called at the start of each mark cycle (spec.md 4.6).
    pub fn seed_from_roots(&mut self, arena: &Arena, roots: &RootSet) {
        for handle in roots.iter() {
            let target = unsafe { std::ptr::read(*handle) };
            if arena.contains(target) {
                self.gray.push_back(target);
            }
        }
    }

    /// Enqueues `target` unconditionally, used by the write-barrier and by
    /// root-push during an active `Mark` phase (spec.md 4.3, 4.5).
    pub fn enqueue(&mut self, target: *mut u8) {
        self.gray.push_back(target);
    }

    fn enqueue_fields(&mut self, arena: &Arena, payload: *mut u8, skip_first_field: bool) {
        let header = arena.get_header_at(payload);
        let field_count = header.block_size() / WORD - 1;
        for idx in 0..field_count {
            if skip_first_field && idx == 0 {
                continue;
            }
            let field = arena.get_field(payload, idx);
            if arena.contains(field) {
                self.gray.push_back(field);
            }
        }
    }

    /// Processes gray objects until either the queue drains or `budget_bytes`
    /// worth of block sizes have been marked. Transitions to `Sweep` when
    /// the queue drains (spec.md 4.6).
    pub fn incr_mark(&mut self, arena: &mut Arena, stats: &mut Stats, budget_bytes: usize, skip_first_field: bool) {
        debug_assert_eq!(self.phase, Phase::Mark);
        let mut processed = 0usize;

        while processed < budget_bytes {
            let Some(addr) = self.gray.pop_front() else {
                break;
            };

            let mut header = arena.get_header_at(addr);
            if header.mark == Mark::Marked {
                // Duplicate-suppression happens here, at dequeue time.
                continue;
            }

            header.mark = Mark::Marked;
            arena.set_header_at(addr, header);
            self.enqueue_fields(arena, addr, skip_first_field);
            processed += header.block_size();
        }

        if self.gray.is_empty() {
            self.phase = Phase::Sweep;
            self.resume_sweep_from = arena.index_to_addr(WORD);
            stats.begin_sweep();
            #[cfg(feature = "gc_debug")]
            log::debug!("incremental: mark phase drained, entering sweep");
        }
    }

    /// Sweeps from `resume_sweep_from` until either the arena end is
    /// reached or `budget_bytes` worth of blocks have been inspected.
    /// Reseeds the mark queue and bumps the incremental-cycle counter when
    /// a sweep pass completes (spec.md 4.6).
    pub fn incr_sweep(
        &mut self,
        arena: &mut Arena,
        free_list: &mut FreeList,
        stats: &mut Stats,
        roots: &RootSet,
        budget_bytes: usize,
    ) {
        debug_assert_eq!(self.phase, Phase::Sweep);
        let capacity = arena.capacity();
        let end = arena.index_to_addr(capacity + WORD);
        let mut processed = 0usize;

        while processed < budget_bytes && self.resume_sweep_from != end {
            let index = arena.addr_to_index(self.resume_sweep_from);
            let header = arena.get_header(index);
            let block_size = header.block_size();

            match header.mark {
                Mark::Marked => {
                    let mut cleared = header;
                    cleared.mark = Mark::NotMarked;
                    arena.set_header(index, cleared);
                }
                Mark::NotMarked => {
                    let payload = self.resume_sweep_from;
                    let mut freed = header;
                    freed.mark = Mark::Free;
                    arena.set_header(index, freed);
                    free_list.push_front(arena, NonNull::new(payload).unwrap());
                    stats.record_swept(payload, block_size);
                }
                Mark::Free => {}
            }

            self.resume_sweep_from = arena.index_to_addr(index + block_size);
            processed += block_size;
        }

        if self.resume_sweep_from == end {
            self.phase = Phase::Mark;
            self.seed_from_roots(arena, roots);
            stats.incremental_cycles += 1;
            #[cfg(feature = "gc_debug")]
            log::debug!("incremental: sweep phase complete, cycle {}", stats.incremental_cycles);
        }
    }

    /// Decides whether a block born at `addr` during the current phase must
    /// be born `Marked` so the in-progress sweep cannot reclaim it this
    /// cycle (the allocate-black rule, spec.md 4.2 and 9).
    ///
    /// Uses `addr >= resume_sweep_from`: the sweeper inspects
    /// `resume_sweep_from` next, so a block allocated exactly at that
    /// address has not yet been inspected and must be protected, which
    /// rules out a strict `>` comparison (see DESIGN.md).
    pub fn should_allocate_black(&self, addr: *mut u8) -> bool {
        self.phase == Phase::Sweep && (addr as usize) >= (self.resume_sweep_from as usize)
    }

    /// The Dijkstra incremental-update write-barrier rule: if we are
    /// marking, `obj` is already black, and `contents` is still white,
    /// `contents` must be grayed immediately or it can be lost (spec.md
    /// 4.5).
    pub fn write_barrier_enqueue(&mut self, arena: &Arena, obj: *mut u8, contents: *mut u8) {
        if self.phase != Phase::Mark {
            return;
        }
        if !arena.contains(obj) || !arena.contains(contents) {
            return;
        }
        if arena.get_header_at(obj).mark == Mark::Marked && arena.get_header_at(contents).mark == Mark::NotMarked {
            self.enqueue(contents);
        }
    }
}
