//! The memory manager: a chunked arena with an explicit GC root set.
//!
//! Values live in fixed-size chunks of slots and are addressed by
//! [`ValueId`] handles rather than pointers. Each chunk keeps a free list of
//! reclaimed slots and bump-allocates from its never-used tail. When every
//! chunk is exhausted, allocation runs one mark-and-sweep collection and
//! retries before growing the heap by a fresh chunk.
//!
//! Two lifetime mechanisms cooperate:
//!
//! * **Reference counts** are a keep-alive protocol for values in flight:
//!   containers retain what they store, the evaluator retains results it
//!   hands upward, and a count reaching zero destroys the value immediately.
//! * **The root set** is what collection actually traces. The mark phase
//!   starts from the registered roots only and the sweep reclaims every
//!   unreached slot regardless of its count, which is how `__parent__`
//!   cycles die. Code that holds a value across a potential allocation must
//!   therefore register it as a root for that window.

use std::{cell::Cell, mem};

use smallvec::SmallVec;

use crate::{
    error::{Error, RunResult},
    intern::{Keys, Symbol},
    resource::ResourceLimits,
    value::{Members, Payload, ValueKind},
};

/// Number of slots in one chunk.
pub const CHUNK_SIZE: usize = 512;

/// Handle to a value slot: chunk index plus slot index within the chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueId {
    chunk: u32,
    slot: u32,
}

impl ValueId {
    pub(crate) fn from_parts(chunk: u32, slot: u32) -> Self {
        Self { chunk, slot }
    }

    fn chunk(self) -> usize {
        self.chunk as usize
    }

    fn slot(self) -> usize {
        self.slot as usize
    }
}

/// One value slot. A slot whose payload is [`Payload::Free`] is on its
/// chunk's free list.
#[derive(Debug)]
struct Slot {
    payload: Payload,
    members: Members,
    refcount: Cell<u32>,
    marked: bool,
}

impl Slot {
    fn vacant() -> Self {
        Self {
            payload: Payload::Free,
            members: Members::new(),
            refcount: Cell::new(0),
            marked: false,
        }
    }

    fn is_free(&self) -> bool {
        matches!(self.payload, Payload::Free)
    }
}

/// One contiguous run of slots with its own free list and bump pointer.
///
/// The bump pointer is implicit: slots are pushed lazily, so `slots.len()`
/// is the next never-used index until the chunk reaches [`CHUNK_SIZE`].
#[derive(Debug, Default)]
struct Chunk {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl Chunk {
    fn new() -> Self {
        Self {
            slots: Vec::with_capacity(CHUNK_SIZE),
            free: Vec::new(),
        }
    }

    /// Takes a slot index from the free list, or bump-allocates one.
    fn take_slot(&mut self) -> Option<u32> {
        if let Some(idx) = self.free.pop() {
            return Some(idx);
        }
        if self.slots.len() < CHUNK_SIZE {
            let idx = u32::try_from(self.slots.len()).expect("chunk index overflow");
            self.slots.push(Slot::vacant());
            return Some(idx);
        }
        None
    }
}

/// Point-in-time heap counters, used by tests and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    /// Slots currently holding a live value.
    pub live_slots: usize,
    /// Reclaimed slots available for reuse.
    pub free_slots: usize,
    /// Total slots across all chunks (live + free).
    pub total_slots: usize,
    /// Number of chunks.
    pub chunks: usize,
    /// Collections run since the heap was created.
    pub gc_runs: u32,
}

/// The arena plus the GC machinery.
pub struct Heap {
    chunks: Vec<Chunk>,
    roots: Vec<ValueId>,
    keys: Keys,
    limits: ResourceLimits,
    collecting: bool,
    gc_runs: u32,
}

impl Heap {
    pub(crate) fn new(keys: Keys, limits: ResourceLimits) -> Self {
        Self {
            chunks: vec![Chunk::new()],
            roots: Vec::new(),
            keys,
            limits,
            collecting: false,
            gc_runs: 0,
        }
    }

    pub(crate) fn keys(&self) -> Keys {
        self.keys
    }

    fn slot(&self, id: ValueId) -> &Slot {
        &self.chunks[id.chunk()].slots[id.slot()]
    }

    fn slot_mut(&mut self, id: ValueId) -> &mut Slot {
        &mut self.chunks[id.chunk()].slots[id.slot()]
    }

    // === allocation ===

    /// Allocates a fresh value with refcount 1 and an empty member map.
    ///
    /// Runs at most one collection when the heap is exhausted; if that frees
    /// nothing the heap grows by a chunk, unless the configured slot cap
    /// would be exceeded, which is a resource error.
    pub fn allocate(&mut self, payload: Payload) -> RunResult<ValueId> {
        debug_assert!(!self.collecting, "allocation during collection");
        debug_assert!(!matches!(payload, Payload::Free), "allocating a free slot");
        if let Some(id) = self.take_any_slot() {
            self.init_slot(id, payload);
            return Ok(id);
        }
        self.collect();
        if let Some(id) = self.take_any_slot() {
            self.init_slot(id, payload);
            return Ok(id);
        }
        if let Some(max) = self.limits.max_heap_slots {
            if self.total_slots() >= max {
                return Err(Error::resource(format!(
                    "heap exhausted: {max} slots in use and collection freed nothing"
                )));
            }
        }
        self.chunks.push(Chunk::new());
        let chunk = u32::try_from(self.chunks.len() - 1).expect("chunk count overflow");
        let slot = self
            .chunks
            .last_mut()
            .and_then(Chunk::take_slot)
            .expect("fresh chunk has room");
        let id = ValueId::from_parts(chunk, slot);
        self.init_slot(id, payload);
        Ok(id)
    }

    /// Scans chunks newest-first for a reusable or never-used slot.
    fn take_any_slot(&mut self) -> Option<ValueId> {
        for (chunk_idx, chunk) in self.chunks.iter_mut().enumerate().rev() {
            if let Some(slot) = chunk.take_slot() {
                let chunk = u32::try_from(chunk_idx).expect("chunk count overflow");
                return Some(ValueId::from_parts(chunk, slot));
            }
        }
        None
    }

    fn init_slot(&mut self, id: ValueId, payload: Payload) {
        let slot = self.slot_mut(id);
        debug_assert!(slot.is_free(), "initialising a live slot");
        debug_assert!(slot.members.is_empty(), "recycled slot kept members");
        slot.payload = payload;
        slot.refcount.set(1);
        slot.marked = false;
    }

    // === refcounting ===

    /// Adds one to a value's keep-alive count.
    pub fn retain(&self, id: ValueId) {
        let slot = self.slot(id);
        if slot.is_free() {
            debug_assert!(false, "retain of a free slot");
            return;
        }
        slot.refcount.set(slot.refcount.get() + 1);
    }

    /// Drops one reference; at zero the value is destroyed immediately and
    /// its slot returned to the chunk's free list.
    ///
    /// Destruction releases owned children: list elements, member-map
    /// values, and a deferred expression's captured environment.
    pub fn release(&mut self, id: ValueId) {
        let slot = self.slot(id);
        // A cascade through a reference cycle can revisit a slot it has
        // already destroyed; freed slots are ignored.
        if slot.is_free() {
            return;
        }
        let count = slot.refcount.get();
        debug_assert!(count > 0, "release of a dead value");
        if count > 1 {
            slot.refcount.set(count - 1);
            return;
        }
        self.destroy(id);
    }

    fn destroy(&mut self, id: ValueId) {
        let (payload, children) = {
            let slot = self.slot_mut(id);
            slot.refcount.set(0);
            let payload = mem::replace(&mut slot.payload, Payload::Free);
            let children = slot.members.drain_values();
            (payload, children)
        };
        match payload {
            Payload::List(items) => {
                for item in items {
                    self.release(item);
                }
            }
            Payload::Deferred(deferred) => {
                // The Rc share of the expression drops with the payload.
                self.release(deferred.env);
            }
            _ => {}
        }
        for child in children {
            self.release(child);
        }
        self.chunks[id.chunk()].free.push(id.slot);
    }

    #[must_use]
    pub fn refcount(&self, id: ValueId) -> u32 {
        self.slot(id).refcount.get()
    }

    // === payload and member access ===

    #[must_use]
    pub fn payload(&self, id: ValueId) -> &Payload {
        &self.slot(id).payload
    }

    pub fn payload_mut(&mut self, id: ValueId) -> &mut Payload {
        &mut self.slot_mut(id).payload
    }

    #[must_use]
    pub fn kind(&self, id: ValueId) -> ValueKind {
        self.slot(id).payload.kind()
    }

    #[must_use]
    pub fn members(&self, id: ValueId) -> &Members {
        &self.slot(id).members
    }

    /// Installs `value` under `key`, retaining it and releasing whatever the
    /// key previously held.
    pub fn put(&mut self, target: ValueId, key: Symbol, value: ValueId) {
        self.retain(value);
        let displaced = self.slot_mut(target).members.put(key, value);
        if let Some(old) = displaced {
            self.release(old);
        }
    }

    /// Removes `key`, releasing the value it held. Returns whether the key
    /// was present.
    pub fn remove(&mut self, target: ValueId, key: Symbol) -> bool {
        match self.slot_mut(target).members.remove(key) {
            Some(old) => {
                self.release(old);
                true
            }
            None => false,
        }
    }

    /// Looks up `key` in the value's own member map, without walking the
    /// prototype chain.
    #[must_use]
    pub fn get_own(&self, id: ValueId, key: Symbol) -> Option<ValueId> {
        self.slot(id).members.get(key)
    }

    /// The value's prototype, i.e. its `__parent__` member.
    #[must_use]
    pub fn parent_of(&self, id: ValueId) -> Option<ValueId> {
        self.get_own(id, self.keys.parent)
    }

    /// Walks the prototype chain from `id` looking for `key`.
    ///
    /// Returns the found value and the chain entry that provided it. A
    /// revisited chain entry ends the search: a `__parent__` cycle is a
    /// program bug, but lookup must not loop on it.
    #[must_use]
    pub fn get_with_prototypes(&self, id: ValueId, key: Symbol) -> Option<(ValueId, ValueId)> {
        let mut visited: SmallVec<[ValueId; 8]> = SmallVec::new();
        let mut current = id;
        loop {
            if visited.contains(&current) {
                return None;
            }
            visited.push(current);
            if let Some(value) = self.get_own(current, key) {
                return Some((value, current));
            }
            current = self.parent_of(current)?;
        }
    }

    /// Shallow-copies members from `src` into `dest`, skipping `__parent__`.
    pub fn put_all(&mut self, dest: ValueId, src: ValueId) {
        let pairs: Vec<(Symbol, ValueId)> = self
            .slot(src)
            .members
            .iter()
            .filter(|&(key, _)| key != self.keys.parent)
            .collect();
        for (key, value) in pairs {
            self.put(dest, key, value);
        }
    }

    /// The receiver bound into a callable, if any. Bindings are installed
    /// directly on the callable, so this reads the own member only.
    #[must_use]
    pub fn self_of(&self, id: ValueId) -> Option<ValueId> {
        self.get_own(id, self.keys.self_key)
    }

    /// A value is callable when it is a native function, or a hash-family
    /// value whose member lookup resolves both `__args__` and `__expr__`.
    #[must_use]
    pub fn is_callable(&self, id: ValueId) -> bool {
        match self.kind(id) {
            ValueKind::NativeFunction => true,
            kind if kind.is_hash_family() => {
                self.get_with_prototypes(id, self.keys.args).is_some()
                    && self.get_with_prototypes(id, self.keys.expr).is_some()
            }
            _ => false,
        }
    }

    // === lists ===

    /// Appends to a list value, retaining the element.
    ///
    /// # Panics
    /// Panics if `list` is not a list value.
    pub fn list_push(&mut self, list: ValueId, value: ValueId) {
        self.retain(value);
        match &mut self.slot_mut(list).payload {
            Payload::List(items) => items.push(value),
            other => panic!("list_push on a {} value", other.kind()),
        }
    }

    /// Removes and returns the last element, transferring its reference to
    /// the caller.
    pub fn list_pop(&mut self, list: ValueId) -> Option<ValueId> {
        match &mut self.slot_mut(list).payload {
            Payload::List(items) => items.pop(),
            other => panic!("list_pop on a {} value", other.kind()),
        }
    }

    #[must_use]
    pub fn list_items(&self, list: ValueId) -> &[ValueId] {
        match &self.slot(list).payload {
            Payload::List(items) => items,
            other => panic!("list_items on a {} value", other.kind()),
        }
    }

    // === roots and collection ===

    /// Registers a value as a GC root for as long as it stays registered.
    pub fn add_root(&mut self, id: ValueId) {
        self.roots.push(id);
    }

    /// Unregisters one occurrence of a root, most recent first.
    pub fn remove_root(&mut self, id: ValueId) {
        if let Some(pos) = self.roots.iter().rposition(|&root| root == id) {
            self.roots.remove(pos);
        }
    }

    /// Runs one mark-and-sweep collection.
    ///
    /// Marks everything reachable from the root set (member-map values,
    /// list elements, and deferred-expression environments), then sweeps
    /// every unreached slot. The sweep destructor is non-recursive: children
    /// are not released, since they may be reclaimed in this same sweep.
    pub fn collect(&mut self) {
        debug_assert!(!self.collecting, "collection re-entered");
        self.collecting = true;
        self.gc_runs += 1;

        for chunk in &mut self.chunks {
            for slot in &mut chunk.slots {
                slot.marked = false;
            }
        }

        let mut work = self.roots.clone();
        while let Some(id) = work.pop() {
            let slot = &mut self.chunks[id.chunk()].slots[id.slot()];
            if slot.marked || slot.is_free() {
                continue;
            }
            slot.marked = true;
            work.extend(slot.members.values());
            match &slot.payload {
                Payload::List(items) => work.extend(items.iter().copied()),
                Payload::Deferred(deferred) => work.push(deferred.env),
                _ => {}
            }
        }

        for chunk in &mut self.chunks {
            for (slot_idx, slot) in chunk.slots.iter_mut().enumerate() {
                if slot.marked || slot.is_free() {
                    continue;
                }
                // Dropping the payload closes file handles and releases the
                // slot's share of any deferred expression tree.
                slot.payload = Payload::Free;
                slot.members.clear();
                slot.refcount.set(0);
                chunk
                    .free
                    .push(u32::try_from(slot_idx).expect("chunk index overflow"));
            }
        }

        self.collecting = false;
    }

    #[must_use]
    pub fn total_slots(&self) -> usize {
        self.chunks.iter().map(|chunk| chunk.slots.len()).sum()
    }

    #[must_use]
    pub fn stats(&self) -> HeapStats {
        let total = self.total_slots();
        let free: usize = self.chunks.iter().map(|chunk| chunk.free.len()).sum();
        HeapStats {
            live_slots: total - free,
            free_slots: free,
            total_slots: total,
            chunks: self.chunks.len(),
            gc_runs: self.gc_runs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Interner;

    fn test_heap() -> Heap {
        let mut interner = Interner::new();
        let keys = Keys::new(&mut interner);
        Heap::new(keys, ResourceLimits::none())
    }

    #[test]
    fn allocation_reuses_freed_slots() {
        let mut heap = test_heap();
        let a = heap.allocate(Payload::Number(1)).unwrap();
        heap.release(a);
        let b = heap.allocate(Payload::Number(2)).unwrap();
        assert_eq!(a, b);
        assert_eq!(heap.stats().live_slots, 1);
    }

    #[test]
    fn release_cascades_through_containers() {
        let mut heap = test_heap();
        let item = heap.allocate(Payload::Number(7)).unwrap();
        let list = heap.allocate(Payload::List(Vec::new())).unwrap();
        heap.list_push(list, item);
        heap.release(item);
        assert_eq!(heap.refcount(item), 1);
        heap.release(list);
        assert_eq!(heap.stats().live_slots, 0);
    }

    #[test]
    fn remove_releases_the_stored_value() {
        let mut heap = test_heap();
        let keys = heap.keys();
        let hash = heap.allocate(Payload::Hash).unwrap();
        let value = heap.allocate(Payload::Number(4)).unwrap();
        heap.put(hash, keys.value, value);
        heap.release(value);
        assert!(heap.remove(hash, keys.value));
        assert!(!heap.remove(hash, keys.value));
        assert_eq!(heap.get_own(hash, keys.value), None);
        assert_eq!(heap.stats().live_slots, 1);
    }

    #[test]
    fn put_releases_displaced_values() {
        let mut heap = test_heap();
        let keys = heap.keys();
        let hash = heap.allocate(Payload::Hash).unwrap();
        let first = heap.allocate(Payload::Number(1)).unwrap();
        let second = heap.allocate(Payload::Number(2)).unwrap();
        heap.put(hash, keys.value, first);
        heap.release(first);
        heap.put(hash, keys.value, second);
        heap.release(second);
        // first was displaced and died; its slot is free again
        assert_eq!(heap.stats().live_slots, 2);
        assert_eq!(heap.get_own(hash, keys.value), Some(second));
    }

    #[test]
    fn rooted_values_survive_collection() {
        let mut heap = test_heap();
        let keys = heap.keys();
        let root = heap.allocate(Payload::Hash).unwrap();
        let child = heap.allocate(Payload::Number(3)).unwrap();
        heap.put(root, keys.value, child);
        heap.release(child);
        heap.add_root(root);
        heap.collect();
        heap.collect();
        assert_eq!(heap.stats().live_slots, 2);
        assert_eq!(heap.get_own(root, keys.value), Some(child));
    }

    #[test]
    fn unreachable_values_are_swept_regardless_of_refcount() {
        let mut heap = test_heap();
        let stray = heap.allocate(Payload::Number(9)).unwrap();
        heap.retain(stray);
        heap.collect();
        assert_eq!(heap.stats().live_slots, 0);
    }

    #[test]
    fn parent_cycles_are_collected_once_unrooted() {
        let mut heap = test_heap();
        let keys = heap.keys();
        let a = heap.allocate(Payload::Hash).unwrap();
        let b = heap.allocate(Payload::Hash).unwrap();
        heap.put(a, keys.parent, b);
        heap.put(b, keys.parent, a);
        heap.add_root(a);
        heap.collect();
        assert_eq!(heap.stats().live_slots, 2);
        heap.remove_root(a);
        heap.collect();
        assert_eq!(heap.stats().live_slots, 0);
    }

    #[test]
    fn cyclic_prototype_lookup_terminates() {
        let mut heap = test_heap();
        let keys = heap.keys();
        let a = heap.allocate(Payload::Hash).unwrap();
        let b = heap.allocate(Payload::Hash).unwrap();
        heap.put(a, keys.parent, b);
        heap.put(b, keys.parent, a);
        assert_eq!(heap.get_with_prototypes(a, keys.value), None);
    }

    #[test]
    fn exhausted_chunk_runs_one_gc_before_growing() {
        let mut heap = test_heap();
        let anchor = heap.allocate(Payload::List(Vec::new())).unwrap();
        heap.add_root(anchor);
        for _ in 0..CHUNK_SIZE - 1 {
            let v = heap.allocate(Payload::Number(0)).unwrap();
            heap.list_push(anchor, v);
            heap.release(v);
        }
        assert_eq!(heap.stats().chunks, 1);
        assert_eq!(heap.stats().gc_runs, 0);
        // every slot is reachable, so the forced collection frees nothing
        let extra = heap.allocate(Payload::Number(1)).unwrap();
        heap.list_push(anchor, extra);
        heap.release(extra);
        let stats = heap.stats();
        assert_eq!(stats.gc_runs, 1);
        assert_eq!(stats.chunks, 2);
    }

    #[test]
    fn slot_cap_is_a_resource_error() {
        let mut interner = Interner::new();
        let keys = Keys::new(&mut interner);
        let mut heap = Heap::new(keys, ResourceLimits::with_max_heap_slots(CHUNK_SIZE));
        let anchor = heap.allocate(Payload::List(Vec::new())).unwrap();
        heap.add_root(anchor);
        for _ in 0..CHUNK_SIZE - 1 {
            let v = heap.allocate(Payload::Number(0)).unwrap();
            heap.list_push(anchor, v);
            heap.release(v);
        }
        let err = heap.allocate(Payload::Number(1)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Resource);
    }

    #[test]
    fn prototype_walk_reports_the_providing_ancestor() {
        let mut heap = test_heap();
        let keys = heap.keys();
        let proto = heap.allocate(Payload::Hash).unwrap();
        let child = heap.allocate(Payload::Hash).unwrap();
        let value = heap.allocate(Payload::Number(5)).unwrap();
        heap.put(proto, keys.value, value);
        heap.release(value);
        heap.put(child, keys.parent, proto);
        assert_eq!(heap.get_with_prototypes(child, keys.value), Some((value, proto)));
        assert_eq!(heap.get_with_prototypes(proto, keys.value), Some((value, proto)));
    }
}
