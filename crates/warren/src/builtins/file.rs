//! File natives.
//!
//! A file value is a hash-family value whose payload carries the native
//! handle. `File.clone` produces one off the `File` prototype; `open` reads
//! the value's `path` member. A file value reclaimed by the collector drops
//! its payload, which closes the handle.

use std::io::BufRead;

use crate::{
    args::{arg_values, check_arity, expect_receiver, expect_string},
    error::{Error, RunResult},
    heap::ValueId,
    runtime::Runtime,
    value::{FileHandle, Payload},
};

/// `File.clone()`: a closed file value with the receiver's members copied.
pub(crate) fn native_clone(
    rt: &mut Runtime,
    this: Option<ValueId>,
    _args: ValueId,
) -> RunResult<Option<ValueId>> {
    let receiver = expect_receiver(this, "File.clone")?;
    rt.clone_with_payload(receiver, Payload::File(FileHandle::closed()), None)
        .map(Some)
}

/// `File.open(mode)`: opens the receiver's `path` member. Returns false
/// when there is no path or the file cannot be opened.
pub(crate) fn native_open(
    rt: &mut Runtime,
    this: Option<ValueId>,
    args: ValueId,
) -> RunResult<Option<ValueId>> {
    let receiver = file_receiver(rt, this, "File.open")?;
    let values = arg_values(rt, args)?;
    check_arity("open", 1, values.len())?;
    // The mode must be a string; only reading is supported.
    expect_string(rt, values[0])?;

    let Some(path_value) = rt.hash_get(receiver, rt.keys.path)? else {
        return rt.new_bool(false).map(Some);
    };
    let path_sym = expect_string(rt, path_value)?;
    let path = rt.symbol_text(path_sym).to_owned();

    let opened = match std::fs::File::open(&path) {
        Ok(file) => {
            set_handle(rt, receiver, Some(std::io::BufReader::new(file)));
            true
        }
        Err(_) => false,
    };
    rt.new_bool(opened).map(Some)
}

/// `File.close()`: true when an open handle was closed.
pub(crate) fn native_close(
    rt: &mut Runtime,
    this: Option<ValueId>,
    _args: ValueId,
) -> RunResult<Option<ValueId>> {
    let receiver = file_receiver(rt, this, "File.close")?;
    let was_open = match rt.heap.payload_mut(receiver) {
        Payload::File(handle) => handle.0.take().is_some(),
        _ => false,
    };
    rt.new_bool(was_open).map(Some)
}

/// `File.eof()`: true at end of input or when the file is not open.
pub(crate) fn native_eof(
    rt: &mut Runtime,
    this: Option<ValueId>,
    _args: ValueId,
) -> RunResult<Option<ValueId>> {
    let receiver = file_receiver(rt, this, "File.eof")?;
    let at_eof = match rt.heap.payload_mut(receiver) {
        Payload::File(FileHandle(Some(reader))) => reader.fill_buf().map_or(true, <[u8]>::is_empty),
        _ => true,
    };
    rt.new_bool(at_eof).map(Some)
}

/// `File.read_line()`: the next line without its terminator; the empty
/// string at end of input.
pub(crate) fn native_read_line(
    rt: &mut Runtime,
    this: Option<ValueId>,
    _args: ValueId,
) -> RunResult<Option<ValueId>> {
    let receiver = file_receiver(rt, this, "File.read_line")?;
    let line = match rt.heap.payload_mut(receiver) {
        Payload::File(FileHandle(Some(reader))) => {
            let mut line = String::new();
            reader
                .read_line(&mut line)
                .map_err(|err| Error::resource(format!("read failed: {err}")))?;
            while line.ends_with('\n') || line.ends_with('\r') {
                line.pop();
            }
            line
        }
        _ => return Err(Error::invariant("file not open; cannot read")),
    };
    rt.new_string_value(&line).map(Some)
}

fn file_receiver(rt: &Runtime, this: Option<ValueId>, name: &str) -> RunResult<ValueId> {
    let receiver = expect_receiver(this, name)?;
    match rt.heap.payload(receiver) {
        Payload::File(_) => Ok(receiver),
        other => Err(Error::type_mismatch(
            "a file value (use File.clone first)",
            other.kind().into(),
        )),
    }
}

fn set_handle(rt: &mut Runtime, receiver: ValueId, handle: Option<std::io::BufReader<std::fs::File>>) {
    if let Payload::File(slot) = rt.heap.payload_mut(receiver) {
        slot.0 = handle;
    }
}
