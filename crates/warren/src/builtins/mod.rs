//! Native operations bound as callable values.
//!
//! Every entry in [`NATIVES`] is registered at runtime construction under a
//! dotted path from the top level; intermediate hashes (`Object`, `String`,
//! `io`, `sys`, `List`, `File`, ...) are created on demand, and each callable
//! is bound to the hash it lands in. `Boolean.to_string` registers before
//! the `true`/`false` values so the `Boolean` prototype exists to parent
//! them.

mod arith;
mod control;
mod file;
mod io_mod;
mod list;
mod logic;
mod object;
mod strings;
mod sys;

use crate::value::NativeFn;

/// One registration-table entry: a dotted path and the native to bind there.
pub(crate) struct NativeSpec {
    pub path: &'static str,
    pub function: NativeFn,
}

pub(crate) const NATIVES: &[NativeSpec] = &[
    NativeSpec {
        path: "Object.extend",
        function: object::native_extend,
    },
    NativeSpec {
        path: "Object.clone",
        function: object::native_clone,
    },
    NativeSpec {
        path: "Object.to_string",
        function: object::native_to_string,
    },
    NativeSpec {
        path: "Object.eachpair",
        function: object::native_eachpair,
    },
    NativeSpec {
        path: "String.to_string",
        function: strings::native_string_to_string,
    },
    NativeSpec {
        path: "String.concat",
        function: strings::native_concat,
    },
    NativeSpec {
        path: "String.length",
        function: strings::native_length,
    },
    NativeSpec {
        path: "Number.to_string",
        function: arith::native_number_to_string,
    },
    NativeSpec {
        path: "Boolean.to_string",
        function: logic::native_boolean_to_string,
    },
    NativeSpec {
        path: "+",
        function: arith::native_add,
    },
    NativeSpec {
        path: "-",
        function: arith::native_sub,
    },
    NativeSpec {
        path: "=",
        function: arith::native_eq,
    },
    NativeSpec {
        path: "<",
        function: arith::native_lt,
    },
    NativeSpec {
        path: ">",
        function: arith::native_gt,
    },
    NativeSpec {
        path: "and",
        function: logic::native_and,
    },
    NativeSpec {
        path: "or",
        function: logic::native_or,
    },
    NativeSpec {
        path: "not",
        function: logic::native_not,
    },
    NativeSpec {
        path: "xor",
        function: logic::native_xor,
    },
    NativeSpec {
        path: "fn",
        function: control::native_fn,
    },
    NativeSpec {
        path: "cond",
        function: control::native_cond,
    },
    NativeSpec {
        path: "while",
        function: control::native_while,
    },
    NativeSpec {
        path: "io.print",
        function: io_mod::native_print,
    },
    NativeSpec {
        path: "sys.load",
        function: sys::native_load,
    },
    NativeSpec {
        path: "List.clone",
        function: list::native_clone,
    },
    NativeSpec {
        path: "List.push",
        function: list::native_push,
    },
    NativeSpec {
        path: "List.pop",
        function: list::native_pop,
    },
    NativeSpec {
        path: "List.length",
        function: list::native_length,
    },
    NativeSpec {
        path: "List.foreach",
        function: list::native_foreach,
    },
    NativeSpec {
        path: "File.clone",
        function: file::native_clone,
    },
    NativeSpec {
        path: "File.open",
        function: file::native_open,
    },
    NativeSpec {
        path: "File.close",
        function: file::native_close,
    },
    NativeSpec {
        path: "File.eof",
        function: file::native_eof,
    },
    NativeSpec {
        path: "File.read_line",
        function: file::native_read_line,
    },
];
