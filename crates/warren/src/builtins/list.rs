//! List natives.
//!
//! Each operation accepts its list either as the bound receiver (instance
//! call through the prototype chain) or as the first argument when invoked
//! on the `List` prototype hash itself.

use smallvec::SmallVec;

use crate::{
    args::{arg_values, expect_callable},
    error::{Error, RunResult},
    heap::ValueId,
    runtime::Runtime,
    value::ValueKind,
};

/// Resolves the list an operation targets, returning it plus the remaining
/// argument values.
fn list_and_rest(
    rt: &Runtime,
    this: Option<ValueId>,
    args: ValueId,
) -> RunResult<(ValueId, SmallVec<[ValueId; 4]>)> {
    let values = arg_values(rt, args)?;
    if let Some(receiver) = this {
        if rt.heap.kind(receiver) == ValueKind::List {
            return Ok((receiver, values));
        }
    }
    match values.split_first() {
        Some((&list, rest)) if rt.heap.kind(list) == ValueKind::List => {
            Ok((list, rest.iter().copied().collect()))
        }
        _ => Err(Error::type_mismatch(
            "a list receiver or first argument",
            this.map_or("nothing", |id| rt.heap.kind(id).into()),
        )),
    }
}

/// `List.clone()`: a fresh empty list.
pub(crate) fn native_clone(
    rt: &mut Runtime,
    _this: Option<ValueId>,
    _args: ValueId,
) -> RunResult<Option<ValueId>> {
    rt.new_list().map(Some)
}

/// `List.push(items...)`: appends each argument; returns the list.
pub(crate) fn native_push(
    rt: &mut Runtime,
    this: Option<ValueId>,
    args: ValueId,
) -> RunResult<Option<ValueId>> {
    let (list, items) = list_and_rest(rt, this, args)?;
    for item in items {
        rt.heap.list_push(list, item);
    }
    rt.heap.retain(list);
    Ok(Some(list))
}

/// `List.pop()`: removes and returns the newest element, or false when the
/// list is empty.
pub(crate) fn native_pop(
    rt: &mut Runtime,
    this: Option<ValueId>,
    args: ValueId,
) -> RunResult<Option<ValueId>> {
    let (list, _) = list_and_rest(rt, this, args)?;
    match rt.heap.list_pop(list) {
        // The list's reference transfers to the caller.
        Some(value) => Ok(Some(value)),
        None => rt.new_bool(false).map(Some),
    }
}

/// `List.length()`: the element count.
pub(crate) fn native_length(
    rt: &mut Runtime,
    this: Option<ValueId>,
    args: ValueId,
) -> RunResult<Option<ValueId>> {
    let (list, _) = list_and_rest(rt, this, args)?;
    let length = i64::try_from(rt.heap.list_items(list).len()).unwrap_or(i64::MAX);
    rt.new_number(length).map(Some)
}

/// `List.foreach(f)`: calls `f(element)` for each element, in order.
pub(crate) fn native_foreach(
    rt: &mut Runtime,
    this: Option<ValueId>,
    args: ValueId,
) -> RunResult<Option<ValueId>> {
    let (list, rest) = list_and_rest(rt, this, args)?;
    let [callback] = rest.as_slice() else {
        return Err(Error::arity(format!(
            "foreach expects 1 function argument, got {}",
            rest.len()
        )));
    };
    let callback = expect_callable(rt, *callback)?;
    rt.heap.retain(callback);
    rt.heap.add_root(callback);

    // Snapshot and retain: callbacks may mutate the list mid-iteration.
    let items = rt.heap.list_items(list).to_vec();
    for &item in &items {
        rt.heap.retain(item);
    }
    let outcome = foreach_items(rt, callback, &items);
    for &item in &items {
        rt.heap.release(item);
    }

    rt.heap.remove_root(callback);
    rt.heap.release(callback);
    outcome?;
    rt.new_bool(true).map(Some)
}

fn foreach_items(rt: &mut Runtime, callback: ValueId, items: &[ValueId]) -> RunResult<()> {
    for &item in items {
        let arg_list = rt.new_list()?;
        rt.heap.add_root(arg_list);
        let wrapper = rt.new_hash()?;
        rt.heap.add_root(wrapper);
        rt.heap.put(wrapper, rt.keys.value, item);
        rt.heap.remove_root(wrapper);
        rt.heap.list_push(arg_list, wrapper);
        rt.heap.release(wrapper);

        let result = rt.call_function(callback, arg_list, rt.top_level);
        rt.heap.remove_root(arg_list);
        rt.heap.release(arg_list);
        rt.release_value(result?);
    }
    Ok(())
}
