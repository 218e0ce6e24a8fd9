//! Heap behaviour observed through whole programs: root survival,
//! reclamation, and chunk growth.

use warren::{NoPrint, Runtime, CHUNK_SIZE};

#[test]
fn values_reachable_from_the_top_level_survive_collection() {
    let mut rt = Runtime::with_print(Box::new(NoPrint));
    let result = rt.exec("x: (1, 2, 3), x").unwrap();
    let id = result.expect("a list");
    rt.gc();
    rt.gc();
    assert_eq!(rt.list_len(id), Some(3));
    rt.release_value(result);
}

#[test]
fn unreachable_results_are_reclaimed_by_the_next_collection() {
    let mut rt = Runtime::with_print(Box::new(NoPrint));
    let baseline = {
        rt.gc();
        rt.heap_stats().live_slots
    };
    let result = rt.exec("(1, 2, 3)").unwrap();
    rt.release_value(result);
    rt.gc();
    // The list dies; its number elements are primitive-pool literals and
    // stay alive.
    assert_eq!(rt.heap_stats().live_slots, baseline + 3);
}

#[test]
fn environment_cycles_from_closures_are_collected() {
    let mut rt = Runtime::with_print(Box::new(NoPrint));
    rt.gc();
    let baseline = rt.heap_stats().live_slots;
    // Each call builds an environment captured by a deferred value stored
    // back into that same environment.
    let result = rt
        .exec("cycle: (n) -> (loop: `(n), 0), cycle(1), cycle(2), 0")
        .unwrap();
    rt.release_value(result);
    rt.gc();
    let after = rt.heap_stats().live_slots;
    // The two call environments and their deferred values must be gone;
    // only the `cycle` function itself and pooled literals remain.
    assert!(
        after - baseline < 12,
        "cycle environments leaked: {baseline} -> {after}"
    );
}

#[test]
fn sustained_allocation_grows_the_heap_after_a_collection() {
    let mut rt = Runtime::with_print(Box::new(NoPrint));
    let result = rt
        .exec(
            "x: 0, l: List.clone(), \
             while(`(<(x, 600)), `((l.push(x), x: +(x, 1)))), \
             l.length()",
        )
        .unwrap();
    let id = result.expect("a number");
    assert_eq!(rt.number_value(id), Some(600));
    let stats = rt.heap_stats();
    assert!(stats.chunks >= 2, "expected growth past one chunk: {stats:?}");
    assert!(stats.gc_runs >= 1, "growth without a collection: {stats:?}");
    assert!(stats.total_slots > CHUNK_SIZE);
    rt.release_value(result);
}

#[test]
fn repeated_garbage_is_recycled_without_unbounded_growth() {
    let mut rt = Runtime::with_print(Box::new(NoPrint));
    // 2000 iterations each allocate a fresh pair list and number; without
    // slot reuse this would need 4+ chunks.
    let result = rt
        .exec("x: 0, while(`(<(x, 2000)), `((x: +(x, 1), (x, x)), x)), x")
        .unwrap();
    let id = result.expect("a number");
    assert_eq!(rt.number_value(id), Some(2000));
    let stats = rt.heap_stats();
    assert!(
        stats.chunks <= 3,
        "garbage was not recycled: {stats:?}"
    );
    rt.release_value(result);
}
