//! String natives.

use crate::{
    args::{arg_values, expect_receiver},
    error::RunResult,
    heap::ValueId,
    runtime::Runtime,
    value::Payload,
};

/// `String.to_string`: strings display as themselves.
pub(crate) fn native_string_to_string(
    rt: &mut Runtime,
    this: Option<ValueId>,
    _args: ValueId,
) -> RunResult<Option<ValueId>> {
    let receiver = expect_receiver(this, "String.to_string")?;
    if matches!(rt.heap.payload(receiver), Payload::Str(_)) {
        rt.heap.retain(receiver);
        return Ok(Some(receiver));
    }
    // Called on the prototype itself: fall back to the literal form.
    let text = rt.format_value(Some(receiver));
    rt.new_string_value(&text).map(Some)
}

/// `String.concat(args...)`: the receiver followed by each argument's
/// `to_string`.
pub(crate) fn native_concat(
    rt: &mut Runtime,
    this: Option<ValueId>,
    args: ValueId,
) -> RunResult<Option<ValueId>> {
    let receiver = expect_receiver(this, "String.concat")?;
    let sym = crate::args::expect_string(rt, receiver)?;
    let mut text = rt.symbol_text(sym).to_owned();
    let values = arg_values(rt, args)?;
    for value in values {
        let rendered = rt.stringify(value)?;
        text.push_str(&rendered);
    }
    rt.new_string_value(&text).map(Some)
}

/// `String.length()`: the byte length of the receiver.
pub(crate) fn native_length(
    rt: &mut Runtime,
    this: Option<ValueId>,
    _args: ValueId,
) -> RunResult<Option<ValueId>> {
    let receiver = expect_receiver(this, "String.length")?;
    let sym = crate::args::expect_string(rt, receiver)?;
    let length = i64::try_from(rt.symbol_text(sym).len()).unwrap_or(i64::MAX);
    rt.new_number(length).map(Some)
}
