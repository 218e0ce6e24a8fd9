//! The value model: payloads, member maps, and value classification.
//!
//! Every live value is one slot in the heap carrying a typed [`Payload`]
//! plus a [`Members`] map. The member map is where prototype linkage lives:
//! the reserved `__parent__` key designates the value's prototype, and
//! lookup walks that chain from receiver to root.

use std::{
    fs::File,
    io::BufReader,
    rc::Rc,
};

use indexmap::IndexMap;
use strum::{Display, IntoStaticStr};

use crate::{
    error::RunResult,
    expressions::Expr,
    heap::ValueId,
    intern::Symbol,
    runtime::Runtime,
};

/// Signature of a native function.
///
/// Natives receive the bound receiver (if any) and the raw argument value:
/// a list of argument descriptor hashes for `f(...)` calls, or a hash for
/// `f{...}` calls. They return `None` for "no result".
pub type NativeFn = fn(&mut Runtime, Option<ValueId>, ValueId) -> RunResult<Option<ValueId>>;

/// A deferred expression: an AST subtree paired with the environment it was
/// encountered in. Evaluating it re-enters the evaluator against that
/// environment, which is what makes deferreds the language's closures.
#[derive(Debug, Clone)]
pub struct DeferredExpr {
    pub expr: Rc<Expr>,
    pub env: ValueId,
}

/// An optionally open file handle carried by file values.
///
/// The handle closes when the payload is dropped, which happens both on
/// refcount death and on sweep.
#[derive(Debug, Default)]
pub struct FileHandle(pub Option<BufReader<File>>);

impl FileHandle {
    #[must_use]
    pub fn closed() -> Self {
        Self(None)
    }
}

/// Typed payload of a value slot.
#[derive(Debug)]
pub enum Payload {
    /// Allocator-internal tag for an unused slot.
    Free,
    Number(i64),
    Bool(bool),
    /// String payloads reference the runtime's interner.
    Str(Symbol),
    /// Ordered sequence of values; duplicates allowed.
    List(Vec<ValueId>),
    /// Marker payload; all state lives in the member map.
    Hash,
    Native(NativeFn),
    Deferred(DeferredExpr),
    /// Hash-family value with a native file handle.
    File(FileHandle),
}

impl Payload {
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Free => ValueKind::Free,
            Self::Number(_) => ValueKind::Number,
            Self::Bool(_) => ValueKind::Boolean,
            Self::Str(_) => ValueKind::String,
            Self::List(_) => ValueKind::List,
            Self::Hash => ValueKind::Hash,
            Self::Native(_) => ValueKind::NativeFunction,
            Self::Deferred(_) => ValueKind::DeferredExpression,
            Self::File(_) => ValueKind::File,
        }
    }
}

/// Value classification, used for type words in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
pub enum ValueKind {
    #[strum(serialize = "free slot")]
    Free,
    #[strum(serialize = "number")]
    Number,
    #[strum(serialize = "boolean")]
    Boolean,
    #[strum(serialize = "string")]
    String,
    #[strum(serialize = "list")]
    List,
    #[strum(serialize = "hash")]
    Hash,
    #[strum(serialize = "native function")]
    NativeFunction,
    #[strum(serialize = "deferred expression")]
    DeferredExpression,
    #[strum(serialize = "file")]
    File,
}

impl ValueKind {
    /// Hash-family values own members semantically and accept property-sets.
    #[must_use]
    pub fn is_hash_family(self) -> bool {
        matches!(self, Self::Hash | Self::File)
    }
}

/// Member map of a value: interned key to value handle, insertion-ordered.
///
/// Stored values are owned by the map in the refcount sense; the heap-level
/// callers retain on insert and release on displacement or removal, the map
/// itself only moves handles around.
#[derive(Debug, Default)]
pub struct Members {
    map: IndexMap<Symbol, ValueId, ahash::RandomState>,
}

impl Members {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts, returning the displaced value if the key was present.
    pub fn put(&mut self, key: Symbol, value: ValueId) -> Option<ValueId> {
        self.map.insert(key, value)
    }

    #[must_use]
    pub fn get(&self, key: Symbol) -> Option<ValueId> {
        self.map.get(&key).copied()
    }

    /// Removes an entry, returning the value it held.
    pub fn remove(&mut self, key: Symbol) -> Option<ValueId> {
        self.map.shift_remove(&key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Symbol, ValueId)> + '_ {
        self.map.iter().map(|(&k, &v)| (k, v))
    }

    pub fn values(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.map.values().copied()
    }

    /// Empties the map, returning the values it held. The map's storage is
    /// kept so a recycled slot does not re-allocate it.
    pub fn drain_values(&mut self) -> Vec<ValueId> {
        self.map.drain(..).map(|(_, v)| v).collect()
    }

    /// Empties the map without yielding the values (sweep path: the values
    /// may already have been reclaimed in the same collection).
    pub fn clear(&mut self) {
        self.map.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> ValueId {
        ValueId::from_parts(0, n)
    }

    #[test]
    fn put_returns_displaced_value() {
        let mut members = Members::new();
        let key = Symbol::from_raw(0);
        assert_eq!(members.put(key, id(1)), None);
        assert_eq!(members.put(key, id(2)), Some(id(1)));
        assert_eq!(members.get(key), Some(id(2)));
        assert_eq!(members.len(), 1);
    }

    #[test]
    fn remove_yields_the_stored_value() {
        let mut members = Members::new();
        let key = Symbol::from_raw(3);
        members.put(key, id(9));
        assert_eq!(members.remove(key), Some(id(9)));
        assert_eq!(members.remove(key), None);
        assert!(members.is_empty());
    }

    #[test]
    fn iteration_preserves_insertion_order() {
        let mut members = Members::new();
        for n in 0..4 {
            members.put(Symbol::from_raw(n), id(n));
        }
        let keys: Vec<_> = members.iter().map(|(k, _)| k.index()).collect();
        assert_eq!(keys, vec![0, 1, 2, 3]);
    }
}
