//! Control-flow natives: `cond`, `while`, and the explicit `fn` constructor.

use crate::{
    args::{arg_values, check_arity, expect_deferred},
    error::{Error, RunResult},
    heap::ValueId,
    runtime::Runtime,
    value::ValueKind,
};

/// `cond((test, result), ...)`: evaluates each pair's test (undeferring as
/// needed); the first truthy test selects the pair's result, or the test
/// value itself for one-element pairs. No match yields nothing.
pub(crate) fn native_cond(
    rt: &mut Runtime,
    _this: Option<ValueId>,
    args: ValueId,
) -> RunResult<Option<ValueId>> {
    let pairs = arg_values(rt, args)?;
    for pair in pairs {
        if rt.heap.kind(pair) != ValueKind::List {
            return Err(Error::type_mismatch(
                "a (test, result) pair",
                rt.heap.kind(pair).into(),
            ));
        }
        let items = rt.heap.list_items(pair).to_vec();
        let Some(&test) = items.first() else {
            continue;
        };
        let condition = rt.undefer(test)?;
        if rt.is_true(condition) {
            match items.get(1) {
                Some(&result) => {
                    rt.release_value(condition);
                    return rt.undefer(result);
                }
                None => return Ok(condition),
            }
        }
        rt.release_value(condition);
    }
    Ok(None)
}

/// `while(test, body)`: both arguments must be deferred expressions. Loops
/// until the test is false; the final body result is the overall result.
pub(crate) fn native_while(
    rt: &mut Runtime,
    _this: Option<ValueId>,
    args: ValueId,
) -> RunResult<Option<ValueId>> {
    let values = arg_values(rt, args)?;
    check_arity("while", 2, values.len())?;
    // Type-check up front so a non-deferred argument fails before looping.
    expect_deferred(rt, values[0])?;
    expect_deferred(rt, values[1])?;
    let (test, body) = (values[0], values[1]);

    let mut result = None;
    loop {
        let condition = rt.undefer(test)?;
        let continue_loop = rt.is_true(condition);
        rt.release_value(condition);
        if !continue_loop {
            break;
        }
        rt.release_value(result.take());
        result = rt.undefer(body)?;
    }
    Ok(result)
}

/// `fn(names, body)`: explicit function construction from a list of
/// argument names (strings, or ready-made descriptor hashes) and a deferred
/// body.
pub(crate) fn native_fn(
    rt: &mut Runtime,
    _this: Option<ValueId>,
    args: ValueId,
) -> RunResult<Option<ValueId>> {
    let values = arg_values(rt, args)?;
    check_arity("fn", 2, values.len())?;
    let (names, body) = (values[0], values[1]);
    if rt.heap.kind(names) != ValueKind::List {
        return Err(Error::type_mismatch(
            "a list of argument names",
            rt.heap.kind(names).into(),
        ));
    }
    expect_deferred(rt, body)?;

    let descriptors = rt.new_list()?;
    rt.heap.add_root(descriptors);
    let items = rt.heap.list_items(names).to_vec();
    for item in items {
        match rt.heap.kind(item) {
            ValueKind::String => {
                let descriptor = rt.new_hash()?;
                rt.heap.add_root(descriptor);
                rt.heap.put(descriptor, rt.keys.name, item);
                rt.heap.remove_root(descriptor);
                rt.heap.list_push(descriptors, descriptor);
                rt.heap.release(descriptor);
            }
            ValueKind::Hash => rt.heap.list_push(descriptors, item),
            kind => {
                rt.heap.remove_root(descriptors);
                rt.heap.release(descriptors);
                return Err(Error::type_mismatch(
                    "an argument name or descriptor",
                    kind.into(),
                ));
            }
        }
    }

    let function = rt.new_hash()?;
    rt.heap.add_root(function);
    rt.heap.put(function, rt.keys.args, descriptors);
    rt.heap.remove_root(descriptors);
    rt.heap.release(descriptors);
    rt.heap.put(function, rt.keys.expr, body);
    rt.heap.remove_root(function);
    Ok(Some(function))
}
