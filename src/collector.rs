/*!

The top-level facade: composes the arena, allocator, free-list, root set,
stats, and optional incremental engine into the single type a mutator
embeds (spec.md 6).

Grounded in the teacher's `GLOBAL_NODE_ALLOCATOR`/`Allocator` split: the
teacher wraps one `Allocator` behind a process-global `Mutex` and exposes
free functions (`allocate_dag_node`, `collect_garbage`) that lock it. This
crate keeps the same "one struct owns everything mutable" shape but leaves
the global/singleton wiring to the `ffi` module, per spec.md 9's "prefer
passing a handle explicitly" resolution -- `Collector` itself is a plain,
directly-owned value.

*/

use crate::allocator::Allocator;
use crate::arena::{align_up, WORD};
use crate::config::CollectorConfig;
use crate::diagnostics;
use crate::incremental::{IncrementalState, Phase};
use crate::mark_sweep;
use crate::roots::{RootHandle, RootSet};
use crate::stats::Stats;

pub struct Collector {
    config: CollectorConfig,
    allocator: Allocator,
    roots: RootSet,
    stats: Stats,
    incremental: Option<IncrementalState>,
}

impl Collector {
    /// Builds a collector over a fresh arena of `config.max_memory` bytes.
    /// Panics if `config.max_memory` violates the arena's construction-time
    /// contract (spec.md 4.7); this is a one-time setup failure, not a
    /// hot-path precondition.
    pub fn new(config: CollectorConfig) -> Collector {
        let allocator = Allocator::new(config.max_memory);
        let stats = Stats::new(config.max_memory);
        let incremental = if config.incremental() { Some(IncrementalState::new(&allocator.arena)) } else { None };
        Collector { config, allocator, roots: RootSet::new(), stats, incremental }
    }

    /// Allocates `bytes`. In incremental mode, first drives the collector
    /// forward by `incremental_rate * need` bytes of mark/sweep work, then
    /// applies the allocate-black rule if the new block lands past the
    /// sweep cursor (spec.md 4.2, 4.6).
    pub fn allocate(&mut self, bytes: usize) -> Option<*mut u8> {
        let need = align_up(WORD + bytes, WORD);

        if let Some(incr) = &mut self.incremental {
            let budget = self.config.incremental_rate * need;
            match incr.phase {
                Phase::Mark => incr.incr_mark(&mut self.allocator.arena, &mut self.stats, budget, self.config.skip_first_field()),
                Phase::Sweep => {
                    incr.incr_sweep(&mut self.allocator.arena, &mut self.allocator.free_list, &mut self.stats, &self.roots, budget)
                }
            }
        }

        let block = self.allocator.allocate(bytes, &mut self.stats)?;

        if let Some(incr) = &self.incremental {
            if incr.should_allocate_black(block.as_ptr()) {
                let mut header = self.allocator.arena.get_header_at(block.as_ptr());
                header.mark = crate::header::Mark::Marked;
                self.allocator.arena.set_header_at(block.as_ptr(), header);
            }
        }

        Some(block.as_ptr())
    }

    /// Runs a full stop-the-world collection cycle regardless of mode
    /// (spec.md 4.4, 4.6). In incremental mode, any block left `Marked`
    /// outside of an in-progress trace (by allocate-black or a root-push
    /// protection) is first cleared back to `NotMarked`, since a full cycle
    /// must rediscover liveness from the current root set rather than trust
    /// marks the incremental engine left lying around; this cycle then
    /// discards any in-progress partial cycle and runs mark/sweep/merge to
    /// completion synchronously, then resets the incremental state for the
    /// next round of allocation-driven stepping.
    pub fn collect(&mut self) {
        let skip_first_field = self.config.skip_first_field();

        if self.incremental.is_some() {
            mark_sweep::clear_live_marks(&mut self.allocator.arena);
        }

        mark_sweep::mark_roots(&mut self.allocator.arena, &self.roots, skip_first_field);
        mark_sweep::sweep(&mut self.allocator.arena, &mut self.allocator.free_list, &mut self.stats);
        if self.config.merge_blocks() {
            mark_sweep::merge(&mut self.allocator.arena, &mut self.allocator.free_list, &mut self.stats);
        }

        self.stats.full_collections += 1;

        if let Some(incr) = &mut self.incremental {
            *incr = IncrementalState::new(&self.allocator.arena);
        }

        if self.config.show_gc() {
            log::info!("collect: cycle {} complete, {} blocks used", self.stats.full_collections, self.stats.used_blocks);
        }
    }

    /// Registers `handle` as a new root, at the top of the stack. In
    /// incremental mode, grays or protects the handle's current target
    /// depending on the active phase so a root pushed mid-cycle cannot be
    /// lost (spec.md 4.3).
    pub fn push_root(&mut self, handle: RootHandle) {
        self.roots.push(handle);

        if let Some(incr) = &mut self.incremental {
            let target = unsafe { std::ptr::read(handle) };
            if !self.allocator.arena.contains(target) {
                return;
            }
            match incr.phase {
                Phase::Mark => incr.enqueue(target),
                Phase::Sweep => {
                    if incr.should_allocate_black(target) {
                        let mut header = self.allocator.arena.get_header_at(target);
                        header.mark = crate::header::Mark::Marked;
                        self.allocator.arena.set_header_at(target, header);
                    }
                }
            }
        }
    }

    /// Pops `handle`, which must equal the current top of the root stack
    /// (spec.md 4.3). Never touches the heap.
    pub fn pop_root(&mut self, handle: RootHandle) {
        self.roots.pop(handle);
    }

    /// Records a heap read and, if `obj` is in-arena, asserts it has not
    /// been freed out from under the mutator (spec.md 4.5).
    pub fn read_barrier(&mut self, obj: *const u8) {
        self.stats.record_read();
        self.assert_not_freed(obj);
    }

    /// Records a heap write and, in incremental mode, applies the Dijkstra
    /// incremental-update rule: if `obj` is already marked and `contents`
    /// is not, `contents` is grayed immediately (spec.md 4.5).
    pub fn write_barrier(&mut self, obj: *const u8, contents: *const u8) {
        self.stats.record_write();
        self.assert_not_freed(obj);
        if let Some(incr) = &mut self.incremental {
            incr.write_barrier_enqueue(&self.allocator.arena, obj as *mut u8, contents as *mut u8);
        }
    }

    fn assert_not_freed(&self, obj: *const u8) {
        if self.allocator.arena.contains(obj) {
            debug_assert_ne!(
                self.allocator.arena.get_header_at(obj as *mut u8).mark,
                crate::header::Mark::Free,
                "barrier touched a freed block"
            );
        }
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn dump(&self) -> String {
        diagnostics::dump(&self.allocator.arena, &self.roots, &self.stats)
    }

    pub fn dump_stats(&self) -> String {
        diagnostics::dump_stats(&self.stats)
    }

    pub fn dump_roots(&self) -> String {
        diagnostics::dump_roots(&self.roots)
    }

    pub fn dump_blocks(&self) -> String {
        diagnostics::dump_blocks(&self.allocator.arena)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_allocation_is_reclaimed_on_collect() {
        let mut gc = Collector::new(CollectorConfig::new(64));
        let _unrooted = gc.allocate(8).unwrap();
        assert_eq!(gc.stats().used_blocks, 1);

        gc.collect();
        assert_eq!(gc.stats().used_blocks, 0);
        assert_eq!(gc.stats().full_collections, 1);
    }

    #[test]
    fn rooted_allocation_survives_collect() {
        let mut gc = Collector::new(CollectorConfig::new(64));
        let mut target = gc.allocate(8).unwrap();
        gc.push_root(&mut target as *mut _);

        gc.collect();
        assert_eq!(gc.stats().used_blocks, 1);

        gc.pop_root(&mut target as *mut _);
    }

    #[test]
    fn barriers_update_counters() {
        let mut gc = Collector::new(CollectorConfig::new(64));
        let a = gc.allocate(8).unwrap();
        let b = gc.allocate(8).unwrap();
        gc.read_barrier(a);
        gc.write_barrier(a, b);
        assert_eq!(gc.stats().reads, 1);
        assert_eq!(gc.stats().writes, 1);
    }

    #[test]
    fn collect_reclaims_an_allocate_black_block_left_unrooted() {
        // The very first allocation in a fresh incremental collector flips
        // the engine straight from Mark to Sweep (the gray queue starts
        // empty) and lands exactly at the new resume_sweep_from, so it is
        // born Marked by the allocate-black rule. With no roots pushed, a
        // synchronous collect() must still reclaim it rather than mistake
        // the stray mark for a live survivor.
        let config = CollectorConfig::new(64).with_incremental(true);
        let mut gc = Collector::new(config);
        gc.allocate(8).unwrap();
        assert_eq!(gc.stats().used_blocks, 1);

        gc.collect();
        assert_eq!(gc.stats().used_blocks, 0);
        assert_eq!(gc.stats().used_bytes, 0);
    }

    #[test]
    fn incremental_allocation_driven_cycle_eventually_reclaims_garbage() {
        let config = CollectorConfig::new(256).with_incremental(true).with_incremental_rate(64);
        let mut gc = Collector::new(config);

        // Leave the first allocation unrooted; it should disappear once the
        // incremental engine completes a full mark/sweep pass driven purely
        // by subsequent allocations.
        gc.allocate(8).unwrap();
        let mut root = gc.allocate(8).unwrap();
        gc.push_root(&mut root as *mut _);

        // Drive enough allocation-triggered incremental work to force at
        // least one full mark+sweep pass across this small arena.
        for _ in 0..8 {
            if gc.allocate(8).is_none() {
                break;
            }
        }

        assert!(gc.stats().incremental_cycles >= 1);
        gc.pop_root(&mut root as *mut _);
    }
}
