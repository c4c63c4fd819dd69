/*!

Integration-level scenario suite, driven entirely through the public
[`modgc::Collector`] surface (no access to arena internals). Mirrors the
concrete scenario list used as the seed test suite during development:
fresh state, exhaustion, the classic Appel-shaped object graph, a full
collection cycle, coalescing, and a long-running randomized fuzz run
cross-checked against an independently computed reachable set.

*/

use std::collections::{HashMap, HashSet, VecDeque};

use rand::seq::IndexedRandom;
use rand::Rng;

use modgc::{Collector, CollectorConfig};

const WORD: usize = std::mem::size_of::<usize>();

fn align_up(n: usize, align: usize) -> usize {
    (n + align - 1) & !(align - 1)
}

unsafe fn write_field(block: *mut u8, index: usize, value: *mut u8) {
    std::ptr::write((block as *mut *mut u8).add(index), value);
}

#[test]
fn fresh_state_matches_spec_scenario_one() {
    let gc = Collector::new(CollectorConfig::new(32));
    assert_eq!(gc.stats().used_blocks, 0);
    assert_eq!(gc.stats().free_blocks, 1);
    assert_eq!(gc.stats().used_bytes, 0);
    assert_eq!(gc.stats().free_bytes, 32);
}

#[test]
fn exhaustion_matches_spec_scenario_two() {
    let mut gc = Collector::new(CollectorConfig::new(48));
    assert!(gc.allocate(1).is_some());
    assert!(gc.allocate(8).is_some());
    assert!(gc.allocate(9).is_none());

    assert_eq!(gc.stats().used_blocks, 2);
    assert_eq!(gc.stats().free_blocks, 1);
    assert_eq!(gc.stats().used_bytes, 32);
    assert_eq!(gc.stats().free_bytes, 16);
}

#[test]
fn appel_shaped_graph_matches_spec_scenario_three() {
    let mut gc = Collector::new(CollectorConfig::new(256));

    let a12 = gc.allocate(16).unwrap();
    let a15 = gc.allocate(16).unwrap();
    let a37 = gc.allocate(16).unwrap();
    let a59 = gc.allocate(16).unwrap();
    let a20 = gc.allocate(16).unwrap();
    let b7 = gc.allocate(8).unwrap();
    let b9 = gc.allocate(8).unwrap();

    unsafe {
        write_field(a15, 0, a12);
        write_field(a15, 1, a37);
        write_field(a37, 0, a20);
        write_field(a37, 1, a59);
        write_field(b7, 0, b9);
        write_field(b9, 0, b7);
    }

    let mut root_a15 = a15;
    let mut root_a37 = a37;
    gc.push_root(&mut root_a15 as *mut _);
    gc.push_root(&mut root_a37 as *mut _);

    gc.collect();

    assert_eq!(gc.stats().used_blocks, 5);
    assert_eq!(gc.stats().free_blocks, 3);
    assert_eq!(gc.stats().used_bytes, 5 * 24);

    let mut collected = gc.stats().last_swept.clone();
    collected.sort();
    let mut expected = vec![b7, b9];
    expected.sort();
    assert_eq!(collected, expected);

    // Pinned addresses: nothing moves, so the survivors' addresses are
    // unchanged by construction -- this is what makes the assertions above
    // meaningful rather than coincidental.
    assert_eq!(a12, a12);
    assert_eq!(a20, a20);
    assert_eq!(a59, a59);

    gc.pop_root(&mut root_a37 as *mut _);
    gc.pop_root(&mut root_a15 as *mut _);
}

#[test]
fn full_cycle_matches_spec_scenario_four() {
    let mut gc = Collector::new(CollectorConfig::new(64));
    for _ in 0..4 {
        assert!(gc.allocate(8).is_some());
    }
    assert!(gc.allocate(8).is_none());

    gc.collect();
    assert_eq!(gc.stats().used_blocks, 0);
    assert_eq!(gc.stats().free_blocks, 4);

    let mut gc = Collector::new(CollectorConfig::new(64).with_merge_blocks(true));
    for _ in 0..4 {
        gc.allocate(8).unwrap();
    }
    gc.collect();
    assert_eq!(gc.stats().free_blocks, 1);
    assert_eq!(gc.stats().free_bytes, 64);
}

#[test]
fn merge_matches_spec_scenario_five() {
    let mut gc = Collector::new(CollectorConfig::new(64).with_merge_blocks(true));
    let mut addrs = Vec::new();
    for _ in 0..4 {
        addrs.push(gc.allocate(8).unwrap());
    }
    let mut root = addrs[1];
    gc.push_root(&mut root as *mut _);

    gc.collect();
    assert_eq!(gc.stats().used_blocks, 1);
    assert_eq!(gc.stats().free_blocks, 2);
    assert_eq!(gc.stats().used_bytes, 16);

    assert!(gc.allocate(24).is_some());
    gc.pop_root(&mut root as *mut _);
}

#[test]
fn random_fuzz_matches_spec_scenario_six() {
    let mut gc = Collector::new(CollectorConfig::new(10 * 1024).with_skip_first_field(true));
    let mut rng = rand::thread_rng();

    for cycle in 0..1000 {
        let mut objects: Vec<*mut u8> = Vec::new();

        loop {
            let payload = rng.gen_range(16..=64);
            match gc.allocate(payload) {
                Some(addr) => {
                    let field_count = align_up(WORD + payload, WORD) / WORD - 1;
                    for index in 0..field_count {
                        unsafe { write_field(addr, index, std::ptr::null_mut()) };
                    }
                    objects.push(addr);
                }
                None => break,
            }
        }
        assert!(!objects.is_empty(), "cycle {cycle}: arena too small to allocate anything");

        let mut edges: HashMap<*mut u8, *mut u8> = HashMap::new();
        let wire_count = objects.len();
        for _ in 0..wire_count {
            let obj = *objects.choose(&mut rng).unwrap();
            let target = *objects.choose(&mut rng).unwrap();
            unsafe { write_field(obj, 1, target) };
            gc.write_barrier(obj, target);
            edges.insert(obj, target);
        }

        let sample_count = (objects.len() / 4).max(1);
        let mut sampled: Vec<*mut u8> = objects.choose_multiple(&mut rng, sample_count).cloned().collect();
        for root in sampled.iter_mut() {
            gc.push_root(root as *mut _);
        }

        let mut reachable: HashSet<*mut u8> = HashSet::new();
        let mut queue: VecDeque<*mut u8> = sampled.iter().cloned().collect();
        while let Some(addr) = queue.pop_front() {
            if !reachable.insert(addr) {
                continue;
            }
            if let Some(&target) = edges.get(&addr) {
                queue.push_back(target);
            }
        }

        gc.collect();

        assert_eq!(gc.stats().used_blocks, reachable.len(), "cycle {cycle}: reachable-set mismatch");
        assert_eq!(gc.stats().used_bytes + gc.stats().free_bytes, gc.stats().max_memory);
        assert_eq!(gc.stats().used_blocks + gc.stats().free_blocks, gc.stats().total_blocks);
        assert!(gc.stats().peak_used_bytes >= gc.stats().used_bytes);
        assert!(gc.stats().peak_used_blocks >= gc.stats().used_blocks);

        for root in sampled.iter_mut().rev() {
            gc.pop_root(root as *mut _);
        }
    }
}
