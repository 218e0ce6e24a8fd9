//! Object natives: extension, cloning, display, and member iteration.

use ahash::AHashSet;

use crate::{
    args::{arg_values, check_arity, expect_callable, expect_receiver},
    error::{Error, RunResult},
    heap::ValueId,
    intern::Symbol,
    runtime::Runtime,
};

/// `Object.extend({members})`: a fresh child of the receiver with the
/// argument hash's members copied in (`__parent__` excluded).
pub(crate) fn native_extend(
    rt: &mut Runtime,
    this: Option<ValueId>,
    args: ValueId,
) -> RunResult<Option<ValueId>> {
    let receiver = expect_receiver(this, "extend")?;
    let source = extend_source(rt, args)?;
    let child = rt.new_child(receiver, crate::value::Payload::Hash)?;
    rt.heap.add_root(child);
    rt.heap.put_all(child, source);
    rt.heap.remove_root(child);
    Ok(Some(child))
}

/// Accepts either hash-form arguments (`extend{...}`) or a single hash passed
/// positionally (`extend({...})`).
fn extend_source(rt: &Runtime, args: ValueId) -> RunResult<ValueId> {
    let kind = rt.heap.kind(args);
    if kind.is_hash_family() {
        return Ok(args);
    }
    let values = arg_values(rt, args)?;
    if values.len() == 1 && rt.heap.kind(values[0]).is_hash_family() {
        return Ok(values[0]);
    }
    Err(Error::type_mismatch("a hash of members", kind.into()))
}

/// `Object.clone()`: the value-model clone of the receiver.
pub(crate) fn native_clone(
    rt: &mut Runtime,
    this: Option<ValueId>,
    _args: ValueId,
) -> RunResult<Option<ValueId>> {
    let receiver = expect_receiver(this, "clone")?;
    rt.clone_value(receiver, None).map(Some)
}

/// `Object.to_string()`: the literal rendering of the receiver.
pub(crate) fn native_to_string(
    rt: &mut Runtime,
    this: Option<ValueId>,
    _args: ValueId,
) -> RunResult<Option<ValueId>> {
    let receiver = expect_receiver(this, "to_string")?;
    let text = rt.format_value(Some(receiver));
    rt.new_string_value(&text).map(Some)
}

/// `Object.eachpair(f)`: calls `f(key, value)` for every member pair
/// visible on the receiver, walking `__parent__` links depth-first. A name
/// seen on a descendant hides the same name on any ancestor.
pub(crate) fn native_eachpair(
    rt: &mut Runtime,
    this: Option<ValueId>,
    args: ValueId,
) -> RunResult<Option<ValueId>> {
    let receiver = expect_receiver(this, "eachpair")?;
    let values = arg_values(rt, args)?;
    check_arity("eachpair", 1, values.len())?;
    let callback = expect_callable(rt, values[0])?;
    rt.heap.retain(callback);
    rt.heap.add_root(callback);

    let outcome = walk_pairs(rt, receiver, callback);

    rt.heap.remove_root(callback);
    rt.heap.release(callback);
    outcome?;
    rt.new_bool(true).map(Some)
}

fn walk_pairs(rt: &mut Runtime, receiver: ValueId, callback: ValueId) -> RunResult<()> {
    let mut seen: AHashSet<Symbol> = AHashSet::new();
    let mut pending = vec![receiver];
    while let Some(current) = pending.pop() {
        let pairs: Vec<(Symbol, ValueId)> = rt.heap.members(current).iter().collect();
        for (key, value) in pairs {
            if key == rt.keys.parent {
                pending.push(value);
                continue;
            }
            if !seen.insert(key) {
                continue;
            }
            call_pair(rt, callback, key, value)?;
        }
    }
    Ok(())
}

fn call_pair(rt: &mut Runtime, callback: ValueId, key: Symbol, value: ValueId) -> RunResult<()> {
    let arg_list = rt.new_list()?;
    rt.heap.add_root(arg_list);

    let key_wrapper = rt.new_hash()?;
    rt.heap.add_root(key_wrapper);
    let key_string = rt.new_string_from_symbol(key)?;
    rt.heap.put(key_wrapper, rt.keys.value, key_string);
    rt.heap.release(key_string);
    rt.heap.remove_root(key_wrapper);
    rt.heap.list_push(arg_list, key_wrapper);
    rt.heap.release(key_wrapper);

    let value_wrapper = rt.new_hash()?;
    rt.heap.add_root(value_wrapper);
    rt.heap.put(value_wrapper, rt.keys.value, value);
    rt.heap.remove_root(value_wrapper);
    rt.heap.list_push(arg_list, value_wrapper);
    rt.heap.release(value_wrapper);

    let result = rt.call_function(callback, arg_list, rt.top_level);
    rt.heap.remove_root(arg_list);
    rt.heap.release(arg_list);
    rt.release_value(result?);
    Ok(())
}
