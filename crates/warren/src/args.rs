//! Argument handling for the invocation protocol.
//!
//! Syntactic arguments are evaluated left-to-right into a list of small
//! descriptor hashes, each carrying a `value` member and, for `name: expr`
//! forms, a `name` member. User-defined functions coalesce that list with
//! their declared defaults into the call environment; native functions take
//! the raw list and pull values out through the extractors at the bottom of
//! this module.

use smallvec::SmallVec;

use crate::{
    error::{Error, RunResult},
    expressions::{Expr, InvokeArgs},
    heap::ValueId,
    runtime::Runtime,
    value::{DeferredExpr, Payload, ValueKind},
};

/// Evaluates an invocation's syntactic arguments.
///
/// `f(a, b)` produces a list of descriptor hashes; `f{k: v}` produces the
/// hash literal's value directly. The result is owned by the caller.
pub(crate) fn build_invocation_args(
    rt: &mut Runtime,
    args: &InvokeArgs,
    ctx: ValueId,
) -> RunResult<ValueId> {
    match args {
        InvokeArgs::Hash(hash) => {
            let value = rt.evaluate(hash, ctx)?;
            value.ok_or_else(|| Error::invariant("argument hash evaluated to nothing"))
        }
        InvokeArgs::List(list) => {
            let Expr::ListLiteral(items) = &**list else {
                return Err(Error::invariant("invocation arguments are not a list"));
            };
            let descriptors = rt.new_list()?;
            rt.heap.add_root(descriptors);
            let outcome = fill_caller_descriptors(rt, descriptors, items, ctx);
            rt.heap.remove_root(descriptors);
            match outcome {
                Ok(()) => Ok(descriptors),
                Err(err) => {
                    rt.heap.release(descriptors);
                    Err(err)
                }
            }
        }
    }
}

fn fill_caller_descriptors(
    rt: &mut Runtime,
    descriptors: ValueId,
    items: &[std::rc::Rc<Expr>],
    ctx: ValueId,
) -> RunResult<()> {
    for item in items {
        let (name, value) = match &**item {
            // A bare `name: expr` argument is a named argument, not an
            // assignment into the calling environment.
            Expr::PropSet { target, value } if target.site.is_none() => {
                (Some(target.name), rt.evaluate(value, ctx)?)
            }
            other => (None, rt.evaluate_node(other, ctx)?),
        };
        push_descriptor(rt, descriptors, name, value)?;
    }
    Ok(())
}

/// Builds the descriptor list of a function declaration's argument list.
///
/// Plain identifiers contribute a name, `name: expr` forms contribute a name
/// plus a default evaluated in the declaring context, and anything else
/// contributes only a default.
pub(crate) fn build_declaration_descriptors(
    rt: &mut Runtime,
    args: &Expr,
    ctx: ValueId,
) -> RunResult<ValueId> {
    let Expr::ListLiteral(items) = args else {
        return Err(Error::invariant("function argument declaration is not a list"));
    };
    let descriptors = rt.new_list()?;
    rt.heap.add_root(descriptors);
    let outcome = (|| -> RunResult<()> {
        for item in items.iter() {
            let (name, value) = match &**item {
                Expr::PropRef(r) if r.site.is_none() => (Some(r.name), None),
                Expr::PropSet { target, value } if target.site.is_none() => {
                    (Some(target.name), rt.evaluate(value, ctx)?)
                }
                other => (None, rt.evaluate_node(other, ctx)?),
            };
            push_descriptor(rt, descriptors, name, value)?;
        }
        Ok(())
    })();
    rt.heap.remove_root(descriptors);
    match outcome {
        Ok(()) => Ok(descriptors),
        Err(err) => {
            rt.heap.release(descriptors);
            Err(err)
        }
    }
}

fn push_descriptor(
    rt: &mut Runtime,
    descriptors: ValueId,
    name: Option<crate::intern::Symbol>,
    value: Option<ValueId>,
) -> RunResult<()> {
    if let Some(v) = value {
        rt.heap.add_root(v);
    }
    let descriptor = rt.new_hash()?;
    rt.heap.add_root(descriptor);
    if let Some(name) = name {
        let name_value = rt.new_string_from_symbol(name)?;
        rt.heap.put(descriptor, rt.keys.name, name_value);
        rt.heap.release(name_value);
    }
    if let Some(v) = value {
        rt.heap.put(descriptor, rt.keys.value, v);
        rt.heap.remove_root(v);
        rt.heap.release(v);
    }
    rt.heap.remove_root(descriptor);
    rt.heap.list_push(descriptors, descriptor);
    rt.heap.release(descriptor);
    Ok(())
}

/// Coalesces a caller's arguments with the callee's default descriptors into
/// the fresh call environment.
///
/// Named arguments bind first; defaults then fill remaining names from the
/// unnamed FIFO, falling back to the declared default. A name with neither
/// is an arity error.
pub(crate) fn coalesce_into(
    rt: &mut Runtime,
    env: ValueId,
    defaults: ValueId,
    args: ValueId,
) -> RunResult<()> {
    let mut fifo: SmallVec<[ValueId; 4]> = SmallVec::new();
    match rt.heap.kind(args) {
        ValueKind::List => {
            let descriptors = rt.heap.list_items(args).to_vec();
            for descriptor in descriptors {
                let value = rt.heap.get_own(descriptor, rt.keys.value);
                match descriptor_name(rt, descriptor)? {
                    Some(name) => {
                        if let Some(value) = value {
                            rt.heap.put(env, name, value);
                        }
                    }
                    None => {
                        if let Some(value) = value {
                            fifo.push(value);
                        }
                    }
                }
            }
        }
        kind if kind.is_hash_family() => rt.heap.put_all(env, args),
        kind => {
            return Err(Error::type_mismatch("an argument list or hash", kind.into()));
        }
    }

    if rt.heap.kind(defaults) != ValueKind::List {
        return Err(Error::invariant("function defaults are not a descriptor list"));
    }
    let mut next_unnamed = 0usize;
    let declared = rt.heap.list_items(defaults).to_vec();
    for descriptor in declared {
        let Some(name) = descriptor_name(rt, descriptor)? else {
            continue;
        };
        if rt.heap.get_own(env, name).is_some() {
            continue;
        }
        if next_unnamed < fifo.len() {
            rt.heap.put(env, name, fifo[next_unnamed]);
            next_unnamed += 1;
        } else if let Some(default) = rt.heap.get_own(descriptor, rt.keys.value) {
            rt.heap.put(env, name, default);
        } else {
            let name = rt.symbol_text(name).to_owned();
            return Err(Error::arity(format!(
                "missing argument `{name}`: no positional, named, or default value"
            )));
        }
    }
    Ok(())
}

fn descriptor_name(rt: &Runtime, descriptor: ValueId) -> RunResult<Option<crate::intern::Symbol>> {
    let Some(name_value) = rt.heap.get_own(descriptor, rt.keys.name) else {
        return Ok(None);
    };
    match rt.heap.payload(name_value) {
        Payload::Str(sym) => Ok(Some(*sym)),
        other => Err(Error::invariant(format!(
            "argument name is a {}, not a string",
            other.kind()
        ))),
    }
}

// === native extraction helpers ===

/// Unwraps a raw argument list into the descriptor values, in order.
pub(crate) fn arg_values(rt: &Runtime, args: ValueId) -> RunResult<SmallVec<[ValueId; 4]>> {
    if rt.heap.kind(args) != ValueKind::List {
        return Err(Error::type_mismatch(
            "an argument list",
            rt.heap.kind(args).into(),
        ));
    }
    let mut values = SmallVec::new();
    for &descriptor in rt.heap.list_items(args) {
        if let Some(value) = rt.heap.get_own(descriptor, rt.keys.value) {
            values.push(value);
        }
    }
    Ok(values)
}

/// Checks an exact argument count for a native function.
pub(crate) fn check_arity(name: &str, expected: usize, got: usize) -> RunResult<()> {
    if expected == got {
        Ok(())
    } else {
        Err(Error::arity(format!(
            "{name} expects {expected} argument(s), got {got}"
        )))
    }
}

pub(crate) fn expect_number(rt: &Runtime, value: ValueId) -> RunResult<i64> {
    match rt.heap.payload(value) {
        Payload::Number(n) => Ok(*n),
        other => Err(Error::type_mismatch("a number", other.kind().into())),
    }
}

pub(crate) fn expect_string(rt: &Runtime, value: ValueId) -> RunResult<crate::intern::Symbol> {
    match rt.heap.payload(value) {
        Payload::Str(sym) => Ok(*sym),
        other => Err(Error::type_mismatch("a string", other.kind().into())),
    }
}

pub(crate) fn expect_deferred(rt: &Runtime, value: ValueId) -> RunResult<DeferredExpr> {
    match rt.heap.payload(value) {
        Payload::Deferred(deferred) => Ok(deferred.clone()),
        other => Err(Error::type_mismatch(
            "a deferred expression",
            other.kind().into(),
        )),
    }
}

pub(crate) fn expect_callable(rt: &Runtime, value: ValueId) -> RunResult<ValueId> {
    if rt.heap.is_callable(value) {
        Ok(value)
    } else {
        Err(Error::type_mismatch(
            "a callable value",
            rt.heap.kind(value).into(),
        ))
    }
}

pub(crate) fn expect_receiver(this: Option<ValueId>, name: &str) -> RunResult<ValueId> {
    this.ok_or_else(|| Error::invariant(format!("{name} requires a bound receiver")))
}
