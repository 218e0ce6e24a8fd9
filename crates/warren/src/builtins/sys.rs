//! The `sys.load` native.

use crate::{
    args::{arg_values, check_arity, expect_string},
    error::RunResult,
    heap::ValueId,
    runtime::Runtime,
};

/// `sys.load("path")`: splices another file's top-level expressions into
/// the current top-level environment. The module's AST is retained by the
/// runtime so closures defined in it stay valid.
pub(crate) fn native_load(
    rt: &mut Runtime,
    _this: Option<ValueId>,
    args: ValueId,
) -> RunResult<Option<ValueId>> {
    let values = arg_values(rt, args)?;
    check_arity("load", 1, values.len())?;
    let path_sym = expect_string(rt, values[0])?;
    let path = rt.symbol_text(path_sym).to_owned();
    let result = rt.load_path(&path)?;
    rt.release_value(result);
    rt.new_bool(true).map(Some)
}
