/*!

The stop-the-world tracer: Deutsch-Schorr-Waite pointer-reversal marking,
linear sweep, and optional free-block coalescing (spec.md 4.4).

The teacher's own mark phase (`DagNode::mark`) recurses with an explicit
native call stack and a `DagNodeArgument` enum instead of structural
pointer scanning, which is fine for its bounded-arity tree/DAG shapes but
unsound here: this collector treats *every* word of a block's payload as a
candidate pointer (spec.md 9, "Structural pointer detection") and must
bound auxiliary memory, so marking is reimplemented with pointer reversal
per spec.md 4.4, the classic technique also summarized in
`examples/other_examples/9b9757d1_robey-mwgc__src-heap.rs.rs`'s
(allocation-based, not reversal-based) mark/sweep split.

*/

use std::ptr::NonNull;

use crate::arena::{Arena, WORD};
use crate::header::{Header, Mark};
use crate::free_list::FreeList;
use crate::roots::RootSet;
use crate::stats::Stats;

#[inline(always)]
fn field_count(header: Header) -> usize {
    header.block_size() / WORD - 1
}

#[inline(always)]
fn set_mark(arena: &mut Arena, payload: *mut u8, mark: Mark) {
    let mut header = arena.get_header_at(payload);
    header.mark = mark;
    arena.set_header_at(payload, header);
}

#[inline(always)]
fn set_done(arena: &mut Arena, payload: *mut u8, done: u16) {
    let mut header = arena.get_header_at(payload);
    header.done = done;
    arena.set_header_at(payload, header);
}

/// Marks every object reachable from `root_addr`, using Schorr-Waite
/// pointer reversal so auxiliary memory stays `O(1)` regardless of graph
/// depth (spec.md 9). No-op if `root_addr` is not an in-arena address whose
/// header is currently `NotMarked`.
pub fn mark_from_root(arena: &mut Arena, root_addr: *mut u8, skip_first_field: bool) {
    if !arena.contains(root_addr) {
        return;
    }
    if arena.get_header_at(root_addr).mark != Mark::NotMarked {
        return;
    }

    let mut tmp: *mut u8 = std::ptr::null_mut();
    let mut x = root_addr;
    set_mark(arena, x, Mark::Marked);
    set_done(arena, x, 0);

    loop {
        let header = arena.get_header_at(x);
        let count = field_count(header);

        if (header.done as usize) < count {
            let idx = header.done as usize;

            if skip_first_field && idx == 0 {
                set_done(arena, x, header.done + 1);
                continue;
            }

            let y = arena.get_field(x, idx);
            let descend = arena.contains(y) && arena.get_header_at(y).mark == Mark::NotMarked;

            if descend {
                arena.set_field(x, idx, tmp);
                tmp = x;
                x = y;
                set_mark(arena, x, Mark::Marked);
                set_done(arena, x, 0);
            } else {
                set_done(arena, x, header.done + 1);
            }
        } else {
            // Ascend.
            let y = x;
            x = tmp;
            if x.is_null() {
                break;
            }
            let parent_header = arena.get_header_at(x);
            let idx = parent_header.done as usize;
            let new_tmp = arena.get_field(x, idx);
            arena.set_field(x, idx, y);
            tmp = new_tmp;
            set_done(arena, x, parent_header.done + 1);
        }
    }
}

/// Resets every currently-`Marked` block back to `NotMarked`, leaving `Free`
/// blocks untouched. A stop-the-world cycle in incremental mode must run
/// this before `mark_roots`: the incremental engine's allocate-black rule
/// and root-push protection can leave blocks `Marked` outside of any
/// in-progress trace, and a full cycle must not mistake those for newly
/// traced survivors (spec.md 4.6).
pub fn clear_live_marks(arena: &mut Arena) {
    let capacity = arena.capacity();
    let mut index = WORD;

    while index < capacity + WORD {
        let header = arena.get_header(index);
        if header.mark == Mark::Marked {
            let mut cleared = header;
            cleared.mark = Mark::NotMarked;
            arena.set_header(index, cleared);
        }
        index += header.block_size();
    }
}

/// Marks everything reachable from the current root set.
pub fn mark_roots(arena: &mut Arena, roots: &RootSet, skip_first_field: bool) {
    for handle in roots.iter() {
        let target = unsafe { std::ptr::read(*handle) };
        mark_from_root(arena, target, skip_first_field);
    }
}

/// Linear sweep: clears surviving marks, reclaims unmarked blocks onto the
/// free-list, and records the addresses freed in `stats.last_swept`
/// (spec.md 4.4).
pub fn sweep(arena: &mut Arena, free_list: &mut FreeList, stats: &mut Stats) {
    stats.begin_sweep();

    let capacity = arena.capacity();
    let mut index = WORD;

    while index < capacity + WORD {
        let header = arena.get_header(index);
        let block_size = header.block_size();

        match header.mark {
            Mark::Marked => {
                let mut cleared = header;
                cleared.mark = Mark::NotMarked;
                arena.set_header(index, cleared);
            }
            Mark::NotMarked => {
                let payload = arena.index_to_addr(index);
                let mut freed = header;
                freed.mark = Mark::Free;
                arena.set_header(index, freed);
                free_list.push_front(arena, NonNull::new(payload).unwrap());
                stats.record_swept(payload, block_size);
            }
            Mark::Free => {}
        }

        index += block_size;
    }

    #[cfg(feature = "gc_debug")]
    log::debug!("sweep: reclaimed {} blocks", stats.last_swept.len());
}

/// Rebuilds the free-list from scratch, coalescing every run of
/// consecutive `Free` blocks into a single block (spec.md 4.4). The
/// resulting free-list order (descending address) is not contractual.
pub fn merge(arena: &mut Arena, free_list: &mut FreeList, stats: &mut Stats) {
    free_list.clear();

    let capacity = arena.capacity();
    let mut index = WORD;
    let mut absorbed = 0usize;

    while index < capacity + WORD {
        let header = arena.get_header(index);

        if header.mark != Mark::Free {
            index += header.block_size();
            continue;
        }

        let run_start = index;
        let mut total_size = header.block_size();
        let mut cursor = index + header.block_size();

        while cursor < capacity + WORD {
            let next_header = arena.get_header(cursor);
            if next_header.mark != Mark::Free {
                break;
            }
            total_size += next_header.block_size();
            cursor += next_header.block_size();
            absorbed += 1;
        }

        arena.set_header(run_start, Header::new(total_size, Mark::Free));
        let payload = arena.index_to_addr(run_start);
        free_list.push_front(arena, NonNull::new(payload).unwrap());

        index = cursor;
    }

    stats.record_merge(absorbed);
    #[cfg(feature = "gc_debug")]
    log::debug!("merge: absorbed {} blocks", absorbed);
}
