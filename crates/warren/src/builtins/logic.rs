//! Boolean natives: short-circuit logic over possibly-deferred arguments.
//!
//! Arguments may arrive quoted; each is undeferred on demand, so `and` and
//! `or` evaluate only as far as the outcome requires. Results are numbers
//! (1 or 0).

use crate::{
    args::{arg_values, check_arity, expect_receiver},
    error::RunResult,
    heap::ValueId,
    runtime::Runtime,
    value::Payload,
};

pub(crate) fn native_and(
    rt: &mut Runtime,
    _this: Option<ValueId>,
    args: ValueId,
) -> RunResult<Option<ValueId>> {
    let values = arg_values(rt, args)?;
    for value in values {
        let result = rt.undefer(value)?;
        let truthy = rt.is_true(result);
        rt.release_value(result);
        if !truthy {
            return rt.new_number(0).map(Some);
        }
    }
    rt.new_number(1).map(Some)
}

pub(crate) fn native_or(
    rt: &mut Runtime,
    _this: Option<ValueId>,
    args: ValueId,
) -> RunResult<Option<ValueId>> {
    let values = arg_values(rt, args)?;
    for value in values {
        let result = rt.undefer(value)?;
        let truthy = rt.is_true(result);
        rt.release_value(result);
        if truthy {
            return rt.new_number(1).map(Some);
        }
    }
    rt.new_number(0).map(Some)
}

pub(crate) fn native_not(
    rt: &mut Runtime,
    _this: Option<ValueId>,
    args: ValueId,
) -> RunResult<Option<ValueId>> {
    let values = arg_values(rt, args)?;
    check_arity("not", 1, values.len())?;
    let result = rt.undefer(values[0])?;
    let truthy = rt.is_true(result);
    rt.release_value(result);
    rt.new_number(i64::from(!truthy)).map(Some)
}

pub(crate) fn native_xor(
    rt: &mut Runtime,
    _this: Option<ValueId>,
    args: ValueId,
) -> RunResult<Option<ValueId>> {
    let values = arg_values(rt, args)?;
    check_arity("xor", 2, values.len())?;
    let mut truthy_count = 0;
    for &value in &values {
        let result = rt.undefer(value)?;
        if rt.is_true(result) {
            truthy_count += 1;
        }
        rt.release_value(result);
    }
    rt.new_number(i64::from(truthy_count == 1)).map(Some)
}

/// `Boolean.to_string`: "true" or "false".
pub(crate) fn native_boolean_to_string(
    rt: &mut Runtime,
    this: Option<ValueId>,
    _args: ValueId,
) -> RunResult<Option<ValueId>> {
    let receiver = expect_receiver(this, "Boolean.to_string")?;
    let text = match rt.heap.payload(receiver) {
        Payload::Bool(b) => b.to_string(),
        _ => rt.format_value(Some(receiver)),
    };
    rt.new_string_value(&text).map(Some)
}
