//! Expression trees produced by the parser.
//!
//! Subtrees are shared through `Rc`: a deferred-expression value captures an
//! `Rc` clone of the expression it wraps, and the runtime's loaded-module
//! list holds the root of every loaded file, so an expression stays alive
//! exactly as long as something that can still evaluate it. Reference sites
//! (`PropRef::site`) are never shared and use `Box` so the parser can graft
//! dotted chains in place.

use std::rc::Rc;

use crate::{heap::ValueId, intern::Symbol};

/// A property reference: an optional site expression plus a member name.
///
/// With no site the name is looked up in the evaluation context; with a site
/// the site is evaluated first and the name resolved against the result.
#[derive(Debug, Clone)]
pub struct PropRef {
    pub site: Option<Box<Expr>>,
    pub name: Symbol,
}

impl PropRef {
    #[must_use]
    pub fn bare(name: Symbol) -> Self {
        Self { site: None, name }
    }
}

/// Argument form of an invocation: a parenthesised list or a braced hash.
#[derive(Debug, Clone)]
pub enum InvokeArgs {
    /// `f(a, b)`: the wrapped expression is a list literal.
    List(Rc<Expr>),
    /// `f{a: 1}`: the wrapped expression is a hash literal.
    Hash(Rc<Expr>),
}

/// One expression node.
#[derive(Debug, Clone)]
pub enum Expr {
    /// `name` or `site.name`.
    PropRef(PropRef),
    /// `name: value` or `site.name: value`.
    PropSet { target: PropRef, value: Rc<Expr> },
    /// `f(args...)` or `f{args...}`.
    Invocation { function: PropRef, args: InvokeArgs },
    /// `(a, b, c)`.
    ListLiteral(Vec<Rc<Expr>>),
    /// `{k: v, ...}`, in source order.
    HashLiteral(Vec<(Symbol, Rc<Expr>)>),
    /// A number or string literal; the value is pre-built at parse time and
    /// kept reachable through the runtime's primitive pool.
    Primitive(ValueId),
    /// `` `expr ``: evaluation is deferred until undeferred.
    Deferred(Rc<Expr>),
    /// `(args) -> (body)`; both children are list literals.
    FunctionDecl { args: Rc<Expr>, body: Rc<Expr> },
    /// A sequence of expressions; evaluates in order, yields the last result.
    ExprList(Vec<Rc<Expr>>),
}

impl Expr {
    /// Grafts `site` onto the left-most reference of this expression.
    ///
    /// Used by the parser for dotted chains: in `a.b.c` the identifier `a`
    /// becomes the site of the innermost reference of the already-parsed
    /// `b.c`. Only references, assignments, and invocations have a left-most
    /// reference; for anything else the graft is rejected and the parser
    /// reports the dotted chain as malformed.
    pub(crate) fn graft_site(&mut self, site: PropRef) -> bool {
        let target = match self {
            Self::PropRef(r) => r,
            Self::PropSet { target, .. } => target,
            Self::Invocation { function, .. } => function,
            _ => return false,
        };
        let mut link = &mut target.site;
        while let Some(inner) = link {
            match inner.as_mut() {
                Self::PropRef(r) => link = &mut r.site,
                // Sites are always references by construction.
                _ => return false,
            }
        }
        *link = Some(Box::new(Self::PropRef(site)));
        true
    }
}
