//! Arithmetic and comparison natives.

use crate::{
    args::{arg_values, check_arity, expect_number},
    error::RunResult,
    heap::ValueId,
    runtime::Runtime,
    value::Payload,
};

/// `+(a, b, ...)`: sums every argument.
pub(crate) fn native_add(
    rt: &mut Runtime,
    _this: Option<ValueId>,
    args: ValueId,
) -> RunResult<Option<ValueId>> {
    let values = arg_values(rt, args)?;
    let mut sum = 0i64;
    for value in values {
        sum = sum.wrapping_add(expect_number(rt, value)?);
    }
    rt.new_number(sum).map(Some)
}

/// `-(a)` negates; `-(a, b, ...)` folds subtraction left to right.
pub(crate) fn native_sub(
    rt: &mut Runtime,
    _this: Option<ValueId>,
    args: ValueId,
) -> RunResult<Option<ValueId>> {
    let values = arg_values(rt, args)?;
    let mut iter = values.iter();
    let Some(&first) = iter.next() else {
        return Err(crate::error::Error::arity(
            "- expects at least 1 argument, got 0".to_owned(),
        ));
    };
    let first = expect_number(rt, first)?;
    let mut rest = iter.peekable();
    if rest.peek().is_none() {
        return rt.new_number(first.wrapping_neg()).map(Some);
    }
    let mut difference = first;
    for &value in rest {
        difference = difference.wrapping_sub(expect_number(rt, value)?);
    }
    rt.new_number(difference).map(Some)
}

/// `=(a, b)`: numbers, strings, and booleans compare by content; anything
/// else compares by identity.
pub(crate) fn native_eq(
    rt: &mut Runtime,
    _this: Option<ValueId>,
    args: ValueId,
) -> RunResult<Option<ValueId>> {
    let values = arg_values(rt, args)?;
    check_arity("=", 2, values.len())?;
    let equal = match (rt.heap.payload(values[0]), rt.heap.payload(values[1])) {
        (Payload::Number(a), Payload::Number(b)) => a == b,
        (Payload::Str(a), Payload::Str(b)) => a == b,
        (Payload::Bool(a), Payload::Bool(b)) => a == b,
        _ => values[0] == values[1],
    };
    rt.new_bool(equal).map(Some)
}

/// `<(a, b)`: numeric less-than.
pub(crate) fn native_lt(
    rt: &mut Runtime,
    _this: Option<ValueId>,
    args: ValueId,
) -> RunResult<Option<ValueId>> {
    let values = arg_values(rt, args)?;
    check_arity("<", 2, values.len())?;
    let a = expect_number(rt, values[0])?;
    let b = expect_number(rt, values[1])?;
    rt.new_bool(a < b).map(Some)
}

/// `>(a, b)`: numeric greater-than.
pub(crate) fn native_gt(
    rt: &mut Runtime,
    _this: Option<ValueId>,
    args: ValueId,
) -> RunResult<Option<ValueId>> {
    let values = arg_values(rt, args)?;
    check_arity(">", 2, values.len())?;
    let a = expect_number(rt, values[0])?;
    let b = expect_number(rt, values[1])?;
    rt.new_bool(a > b).map(Some)
}

/// `Number.to_string`: decimal rendering of the receiver.
pub(crate) fn native_number_to_string(
    rt: &mut Runtime,
    this: Option<ValueId>,
    _args: ValueId,
) -> RunResult<Option<ValueId>> {
    let receiver = crate::args::expect_receiver(this, "Number.to_string")?;
    let text = match rt.heap.payload(receiver) {
        Payload::Number(n) => n.to_string(),
        // Called on the prototype itself: fall back to the literal form.
        _ => rt.format_value(Some(receiver)),
    };
    rt.new_string_value(&text).map(Some)
}
