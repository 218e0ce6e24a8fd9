//! The tree-walking evaluator.
//!
//! Expressions are evaluated against a *context* value: a hash whose member
//! map provides the lexical bindings and whose `__parent__` chain leads to
//! the top-level environment. Every successful evaluation hands the caller
//! an owned reference (or `None` for expressions with no result); the caller
//! releases it when done.
//!
//! The allocation discipline is: any value held across a nested evaluation
//! or allocation is registered as a GC root for that window, because the
//! collector traces roots only. Error paths may abandon transient roots;
//! every error here is fatal to the running program, so tidy unwinding buys
//! nothing.

use std::rc::Rc;

use crate::{
    args,
    error::{Error, RunResult},
    expressions::{Expr, InvokeArgs, PropRef},
    heap::ValueId,
    intern::Symbol,
    runtime::Runtime,
    value::Payload,
};

impl Runtime {
    /// Evaluates one expression node, returning an owned result.
    pub(crate) fn evaluate(&mut self, expr: &Rc<Expr>, ctx: ValueId) -> RunResult<Option<ValueId>> {
        self.evaluate_node(expr, ctx)
    }

    pub(crate) fn evaluate_node(&mut self, expr: &Expr, ctx: ValueId) -> RunResult<Option<ValueId>> {
        match expr {
            Expr::PropRef(prop_ref) => self.eval_prop_ref(prop_ref, ctx),
            Expr::PropSet { target, value } => self.eval_prop_set(target, value, ctx),
            Expr::Invocation { function, args } => self.eval_invocation(function, args, ctx),
            Expr::ListLiteral(items) => self.eval_list_literal(items, ctx),
            Expr::HashLiteral(pairs) => self.eval_hash_literal(pairs, ctx),
            Expr::Primitive(id) => {
                self.heap.retain(*id);
                Ok(Some(*id))
            }
            Expr::Deferred(inner) => {
                let deferred = self.new_deferred(inner.clone(), ctx)?;
                Ok(Some(deferred))
            }
            Expr::FunctionDecl { args, body } => self.eval_function_decl(args, body, ctx),
            Expr::ExprList(items) => self.eval_sequence(items, ctx),
        }
    }

    /// Evaluates a sequence of expressions; the last result wins, earlier
    /// results are released as they are superseded.
    pub(crate) fn eval_sequence(
        &mut self,
        items: &[Rc<Expr>],
        ctx: ValueId,
    ) -> RunResult<Option<ValueId>> {
        let mut result = None;
        for item in items {
            if let Some(previous) = result.take() {
                self.heap.release(previous);
            }
            result = self.evaluate(item, ctx)?;
        }
        Ok(result)
    }

    fn resolve_site(
        &mut self,
        prop_ref: &PropRef,
        ctx: ValueId,
    ) -> RunResult<(ValueId, bool)> {
        match &prop_ref.site {
            Some(site_expr) => {
                let site = self.evaluate_node(site_expr, ctx)?.ok_or_else(|| {
                    Error::invariant(format!(
                        "cannot resolve `{}` against a null site",
                        self.symbol_text(prop_ref.name)
                    ))
                })?;
                Ok((site, true))
            }
            None => Ok((ctx, false)),
        }
    }

    fn eval_prop_ref(&mut self, prop_ref: &PropRef, ctx: ValueId) -> RunResult<Option<ValueId>> {
        let (site, owned) = self.resolve_site(prop_ref, ctx)?;
        self.heap.add_root(site);
        let found = self.hash_get(site, prop_ref.name);
        self.heap.remove_root(site);
        let found = match found {
            Ok(found) => found,
            Err(err) => {
                if owned {
                    self.heap.release(site);
                }
                return Err(err);
            }
        };
        let Some(value) = found else {
            let err = Error::lookup(self.symbol_text(prop_ref.name));
            if owned {
                self.heap.release(site);
            }
            return Err(err);
        };
        // Retain before the site goes away: the site may hold the only
        // reference.
        self.heap.retain(value);
        if owned {
            self.heap.release(site);
        }
        Ok(Some(value))
    }

    fn eval_prop_set(
        &mut self,
        target: &PropRef,
        value_expr: &Rc<Expr>,
        ctx: ValueId,
    ) -> RunResult<Option<ValueId>> {
        let (site, owned) = self.resolve_site(target, ctx)?;
        let kind = self.heap.kind(site);
        if !kind.is_hash_family() {
            if owned {
                self.heap.release(site);
            }
            return Err(Error::invariant(format!(
                "cannot set `{}` on a {kind} value",
                self.symbol_text(target.name)
            )));
        }
        self.heap.add_root(site);
        let value = self.evaluate(value_expr, ctx)?;
        if let Some(value) = value {
            self.heap.put(site, target.name, value);
        }
        self.heap.remove_root(site);
        if owned {
            self.heap.release(site);
        }
        Ok(value)
    }

    fn eval_list_literal(
        &mut self,
        items: &[Rc<Expr>],
        ctx: ValueId,
    ) -> RunResult<Option<ValueId>> {
        let list = self.new_list()?;
        self.heap.add_root(list);
        for item in items {
            let value = self.evaluate(item, ctx)?;
            if let Some(value) = value {
                self.heap.list_push(list, value);
                self.heap.release(value);
            }
        }
        self.heap.remove_root(list);
        Ok(Some(list))
    }

    fn eval_hash_literal(
        &mut self,
        pairs: &[(Symbol, Rc<Expr>)],
        ctx: ValueId,
    ) -> RunResult<Option<ValueId>> {
        let hash = self.new_hash()?;
        self.heap.add_root(hash);
        for (key, value_expr) in pairs {
            let value = self.evaluate(value_expr, ctx)?;
            if let Some(value) = value {
                self.heap.put(hash, *key, value);
                self.heap.release(value);
            }
        }
        self.heap.remove_root(hash);
        Ok(Some(hash))
    }

    /// Builds a user-defined function: a hash carrying its argument
    /// descriptors under `__args__` and its body, deferred in the current
    /// context, under `__expr__`.
    fn eval_function_decl(
        &mut self,
        arg_list: &Rc<Expr>,
        body: &Rc<Expr>,
        ctx: ValueId,
    ) -> RunResult<Option<ValueId>> {
        let function = self.new_hash()?;
        self.heap.add_root(function);
        let descriptors = args::build_declaration_descriptors(self, arg_list, ctx)?;
        self.heap.put(function, self.keys.args, descriptors);
        self.heap.release(descriptors);
        let body_value = self.new_deferred(body.clone(), ctx)?;
        self.heap.put(function, self.keys.expr, body_value);
        self.heap.release(body_value);
        self.heap.remove_root(function);
        Ok(Some(function))
    }

    fn eval_invocation(
        &mut self,
        function: &PropRef,
        invoke_args: &InvokeArgs,
        ctx: ValueId,
    ) -> RunResult<Option<ValueId>> {
        let callee = self
            .eval_prop_ref(function, ctx)?
            .ok_or_else(|| Error::invariant("callee evaluated to nothing"))?;
        self.heap.add_root(callee);
        let outcome = args::build_invocation_args(self, invoke_args, ctx).and_then(|call_args| {
            let result = self.call_function(callee, call_args, ctx);
            self.heap.release(call_args);
            result
        });
        self.heap.remove_root(callee);
        self.heap.release(callee);
        outcome
    }

    /// Calls a callable value with an already-built argument value.
    ///
    /// Natives receive the raw arguments and their bound receiver;
    /// user-defined functions go through default coalescing into a fresh
    /// environment chained to their captured context.
    pub(crate) fn call_function(
        &mut self,
        callee: ValueId,
        call_args: ValueId,
        _ctx: ValueId,
    ) -> RunResult<Option<ValueId>> {
        if !self.heap.is_callable(callee) {
            return Err(Error::type_mismatch(
                "a callable value",
                self.heap.kind(callee).into(),
            ));
        }
        self.heap.add_root(call_args);
        let native = match self.heap.payload(callee) {
            Payload::Native(native) => Some(*native),
            _ => None,
        };
        let result = match native {
            Some(native) => {
                let receiver = self.heap.self_of(callee);
                native(self, receiver, call_args)
            }
            None => self.call_user_function(callee, call_args),
        };
        self.heap.remove_root(call_args);
        result
    }

    fn call_user_function(
        &mut self,
        callee: ValueId,
        call_args: ValueId,
    ) -> RunResult<Option<ValueId>> {
        let body_value = self
            .hash_get(callee, self.keys.expr)?
            .ok_or_else(|| Error::invariant("user function has no `__expr__` member"))?;
        let defaults = self
            .hash_get(callee, self.keys.args)?
            .ok_or_else(|| Error::invariant("user function has no `__args__` member"))?;
        let Payload::Deferred(deferred) = self.heap.payload(body_value) else {
            return Err(Error::invariant("function body is not a deferred expression"));
        };
        let body = deferred.expr.clone();
        let captured = deferred.env;

        let env = self.new_child(captured, Payload::Hash)?;
        self.heap.add_root(env);
        let outcome = args::coalesce_into(self, env, defaults, call_args).and_then(|()| {
            if let Some(receiver) = self.heap.self_of(callee) {
                self.heap.put(env, self.keys.self_key, receiver);
            }
            // A function body is written as a list literal but runs as a
            // sequence: last expression wins.
            match &*body {
                Expr::ListLiteral(items) => self.eval_sequence(items, env),
                other => self.evaluate_node(other, env),
            }
        });
        self.heap.remove_root(env);
        self.heap.release(env);
        outcome
    }

    /// Invokes `name` on `receiver` with no arguments, through the full
    /// method-dispatch protocol (prototype walk plus auto-binding).
    pub(crate) fn call_method(
        &mut self,
        receiver: ValueId,
        name: Symbol,
    ) -> RunResult<Option<ValueId>> {
        let method = self
            .hash_get(receiver, name)?
            .ok_or_else(|| Error::lookup(self.symbol_text(name)))?;
        self.heap.retain(method);
        self.heap.add_root(method);
        let outcome = self.new_list().and_then(|empty_args| {
            let result = self.call_function(method, empty_args, self.top_level);
            self.heap.release(empty_args);
            result
        });
        self.heap.remove_root(method);
        self.heap.release(method);
        outcome
    }

    /// Evaluates a deferred expression in its captured environment; any
    /// other value is returned as-is (retained).
    pub(crate) fn undefer(&mut self, value: ValueId) -> RunResult<Option<ValueId>> {
        let deferred = match self.heap.payload(value) {
            Payload::Deferred(deferred) => Some((deferred.expr.clone(), deferred.env)),
            _ => None,
        };
        match deferred {
            Some((expr, env)) => self.evaluate(&expr, env),
            None => {
                self.heap.retain(value);
                Ok(Some(value))
            }
        }
    }

    /// Truthiness: non-zero numbers, the string "true" (ASCII
    /// case-insensitive), true booleans; every other live value is true and
    /// a missing value is false.
    #[must_use]
    pub fn is_true(&self, value: Option<ValueId>) -> bool {
        let Some(id) = value else {
            return false;
        };
        match self.heap.payload(id) {
            Payload::Number(n) => *n != 0,
            Payload::Bool(b) => *b,
            Payload::Str(sym) => self.symbol_text(*sym).eq_ignore_ascii_case("true"),
            _ => true,
        }
    }
}
