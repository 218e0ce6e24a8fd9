//! The `io.print` native.

use crate::{args::arg_values, error::RunResult, heap::ValueId, runtime::Runtime};

/// `io.print(args...)`: each argument rendered through its `to_string`
/// method, separated by single spaces, with one trailing newline.
pub(crate) fn native_print(
    rt: &mut Runtime,
    _this: Option<ValueId>,
    args: ValueId,
) -> RunResult<Option<ValueId>> {
    let values = arg_values(rt, args)?;
    let mut printed_any = false;
    for value in values {
        if printed_any {
            rt.out.push(' ');
        }
        printed_any = true;
        let text = rt.stringify(value)?;
        rt.out.write_str(&text);
    }
    if printed_any {
        rt.out.push('\n');
    }
    Ok(None)
}
