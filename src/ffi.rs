/*!

Thin C-ABI surface: a process-global [`Collector`] behind a lock, and
`#[no_mangle] extern "C" fn` wrappers that do nothing but lock, marshal
pointers, and call into the safe facade (spec.md 1, 6).

Grounded directly in `examples/original_source/src/gc.cpp`'s global
`gc::MarkAndSweep gcc(...)` plus its `gc_alloc`/`gc_push_root`/
`gc_pop_root`/`gc_read_barrier`/`gc_write_barrier`/`print_gc_*` free
functions, and in the teacher's `static GLOBAL_NODE_ALLOCATOR:
Lazy<Mutex<Allocator>>` pattern for the global itself. No policy lives
here: `gc_alloc`'s "allocate, and if that fails collect once then retry"
fallback in the C++ source is host-process policy, not collector
behavior, so it is intentionally not reproduced -- callers needing it can
implement it themselves on top of `modgc_alloc`/`modgc_collect`.

*/

use std::os::raw::c_void;
use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::collector::Collector;
use crate::config::CollectorConfig;

const DEFAULT_MAX_MEMORY: usize = 1 << 20;

static COLLECTOR: Lazy<Mutex<Collector>> = Lazy::new(|| Mutex::new(Collector::new(CollectorConfig::new(DEFAULT_MAX_MEMORY))));

/// # Safety
/// `size_in_bytes` must be nonzero. Returns null on exhaustion; the caller
/// decides whether to retry after `modgc_collect`.
#[no_mangle]
pub unsafe extern "C" fn modgc_alloc(size_in_bytes: usize) -> *mut c_void {
    let mut gc = COLLECTOR.lock().unwrap();
    match gc.allocate(size_in_bytes) {
        Some(ptr) => ptr as *mut c_void,
        None => std::ptr::null_mut(),
    }
}

#[no_mangle]
pub extern "C" fn modgc_collect() {
    let mut gc = COLLECTOR.lock().unwrap();
    gc.collect();
}

/// # Safety
/// `handle` must point to a pointer-sized, mutator-owned slot that outlives
/// the matching `modgc_pop_root` call.
#[no_mangle]
pub unsafe extern "C" fn modgc_push_root(handle: *mut *mut c_void) {
    let mut gc = COLLECTOR.lock().unwrap();
    gc.push_root(handle as *mut *mut u8);
}

/// # Safety
/// `handle` must equal the handle most recently passed to
/// `modgc_push_root` that has not yet been popped.
#[no_mangle]
pub unsafe extern "C" fn modgc_pop_root(handle: *mut *mut c_void) {
    let mut gc = COLLECTOR.lock().unwrap();
    gc.pop_root(handle as *mut *mut u8);
}

/// `field_index` is accepted for host-ABI compatibility and currently
/// unused (spec.md 6).
#[no_mangle]
pub extern "C" fn modgc_read_barrier(obj: *const c_void, _field_index: i32) {
    let mut gc = COLLECTOR.lock().unwrap();
    gc.read_barrier(obj as *const u8);
}

#[no_mangle]
pub extern "C" fn modgc_write_barrier(obj: *const c_void, _field_index: i32, contents: *const c_void) {
    let mut gc = COLLECTOR.lock().unwrap();
    gc.write_barrier(obj as *const u8, contents as *const u8);
}

#[no_mangle]
pub extern "C" fn modgc_print_state() {
    let gc = COLLECTOR.lock().unwrap();
    println!("{}", gc.dump());
}

#[no_mangle]
pub extern "C" fn modgc_print_stats() {
    let gc = COLLECTOR.lock().unwrap();
    println!("{}", gc.dump_stats());
}

#[no_mangle]
pub extern "C" fn modgc_print_roots() {
    let gc = COLLECTOR.lock().unwrap();
    println!("{}", gc.dump_roots());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_then_collect_through_the_global_does_not_panic() {
        let ptr = unsafe { modgc_alloc(8) };
        assert!(!ptr.is_null());
        modgc_collect();
    }
}
