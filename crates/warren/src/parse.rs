//! Recursive-descent parser.
//!
//! One call to [`Parser::parse_top_level`] consumes exactly one top-level
//! form, dispatched on the current token's kind. The parser drives the lexer
//! with the current-token convention: a reader is entered with the current
//! token being the first token of its production and leaves the last token
//! current. Number and string literals become values immediately and are
//! registered in the runtime's primitive pool so they stay reachable for the
//! life of the runtime.

use std::rc::Rc;

use crate::{
    error::{Error, RunResult},
    expressions::{Expr, InvokeArgs, PropRef},
    lexer::{Lexer, Token, TokenKind},
    runtime::Runtime,
    source::CharSource,
};

pub(crate) struct Parser {
    lexer: Lexer,
}

impl Parser {
    pub fn new(source: Box<dyn CharSource>) -> Self {
        Self {
            lexer: Lexer::new(source),
        }
    }

    /// Parses the whole input into one expression list.
    pub fn parse_program(&mut self, rt: &mut Runtime) -> RunResult<Rc<Expr>> {
        let mut exprs = Vec::new();
        while let Some(expr) = self.parse_top_level(rt)? {
            exprs.push(Rc::new(expr));
        }
        Ok(Rc::new(Expr::ExprList(exprs)))
    }

    /// Parses one top-level expression, skipping separator commas.
    /// Returns `None` at end of input.
    pub fn parse_top_level(&mut self, rt: &mut Runtime) -> RunResult<Option<Expr>> {
        loop {
            if !self.lexer.advance()? {
                return Ok(None);
            }
            if matches!(self.current().kind, TokenKind::Comma) {
                continue;
            }
            return self.read_complete_expression(rt).map(Some);
        }
    }

    fn current(&self) -> &Token {
        self.lexer.current().expect("reader entered without a current token")
    }

    /// Advances to the next token, erroring on end of input.
    fn advance_required(&mut self, expected: &str) -> RunResult<()> {
        if self.lexer.advance()? {
            Ok(())
        } else {
            Err(Error::parse(format!("unexpected end of input, expected {expected}")))
        }
    }

    fn unexpected(&self, context: &str) -> Error {
        let token = self.current();
        Error::parse(format!("unexpected {} at {} {context}", token.kind, token.pos))
    }

    fn read_complete_expression(&mut self, rt: &mut Runtime) -> RunResult<Expr> {
        let kind = self.current().kind.clone();
        match kind {
            TokenKind::Identifier(_) => self.read_identifier(rt),
            TokenKind::Number(n) => {
                let value = rt.new_pooled_number(n)?;
                Ok(Expr::Primitive(value))
            }
            TokenKind::Str(text) => {
                let value = rt.new_pooled_string(&text)?;
                Ok(Expr::Primitive(value))
            }
            TokenKind::HashStart => self.read_hash(rt),
            TokenKind::ListStart => {
                let list = self.read_list(rt)?;
                if matches!(self.lexer.peek()?.map(|t| &t.kind), Some(TokenKind::Arrow)) {
                    self.lexer.advance()?;
                    self.advance_required("`(` to open a function body")?;
                    if !matches!(self.current().kind, TokenKind::ListStart) {
                        return Err(self.unexpected("where a function body should start"));
                    }
                    let body = self.read_list(rt)?;
                    return Ok(Expr::FunctionDecl {
                        args: Rc::new(list),
                        body: Rc::new(body),
                    });
                }
                Ok(list)
            }
            TokenKind::Quote => self.read_quoted(rt),
            _ => Err(self.unexpected("at the start of an expression")),
        }
    }

    fn read_quoted(&mut self, rt: &mut Runtime) -> RunResult<Expr> {
        self.advance_required("an expression after the quote")?;
        let deferred = self.read_complete_expression(rt)?;
        Ok(Expr::Deferred(Rc::new(deferred)))
    }

    fn read_identifier(&mut self, rt: &mut Runtime) -> RunResult<Expr> {
        let name = match &self.current().kind {
            TokenKind::Identifier(text) => rt.intern(text),
            _ => return Err(self.unexpected("where an identifier was expected")),
        };

        match self.lexer.peek()?.map(|t| t.kind.clone()) {
            Some(TokenKind::Assign) => {
                self.lexer.advance()?;
                self.advance_required("a value after `:`")?;
                let value = self.read_complete_expression(rt)?;
                Ok(Expr::PropSet {
                    target: PropRef::bare(name),
                    value: Rc::new(value),
                })
            }
            Some(TokenKind::Deref) => {
                self.lexer.advance()?;
                self.advance_required("an expression after `.`")?;
                let mut rhs = self.read_complete_expression(rt)?;
                if !rhs.graft_site(PropRef::bare(name)) {
                    return Err(Error::parse(
                        "the right-hand side of `.` must be a reference, assignment, or invocation"
                            .to_owned(),
                    ));
                }
                Ok(rhs)
            }
            Some(TokenKind::ListStart) => {
                self.lexer.advance()?;
                let args = self.read_list(rt)?;
                Ok(Expr::Invocation {
                    function: PropRef::bare(name),
                    args: InvokeArgs::List(Rc::new(args)),
                })
            }
            Some(TokenKind::HashStart) => {
                self.lexer.advance()?;
                let args = self.read_hash(rt)?;
                Ok(Expr::Invocation {
                    function: PropRef::bare(name),
                    args: InvokeArgs::Hash(Rc::new(args)),
                })
            }
            _ => Ok(Expr::PropRef(PropRef::bare(name))),
        }
    }

    /// Reads a list literal. Entered with `(` current, leaves `)` current.
    fn read_list(&mut self, rt: &mut Runtime) -> RunResult<Expr> {
        let mut items = Vec::new();
        loop {
            self.advance_required("`)` to close the list")?;
            if matches!(self.current().kind, TokenKind::ListEnd) {
                break;
            }
            if matches!(self.current().kind, TokenKind::Comma) {
                continue;
            }
            items.push(Rc::new(self.read_complete_expression(rt)?));
        }
        Ok(Expr::ListLiteral(items))
    }

    /// Reads a hash literal. Entered with `{` current, leaves `}` current.
    fn read_hash(&mut self, rt: &mut Runtime) -> RunResult<Expr> {
        let mut pairs = Vec::new();
        loop {
            self.advance_required("`}` to close the hash")?;
            if matches!(self.current().kind, TokenKind::HashEnd) {
                break;
            }
            if matches!(self.current().kind, TokenKind::Comma) {
                continue;
            }
            let key = match &self.current().kind {
                TokenKind::Identifier(key) => rt.intern(key),
                _ => return Err(self.unexpected("where a hash key was expected")),
            };
            self.advance_required("`:` after the hash key")?;
            if !matches!(self.current().kind, TokenKind::Assign) {
                return Err(self.unexpected("where `:` was expected after a hash key"));
            }
            self.advance_required("a value after `:`")?;
            let value = self.read_complete_expression(rt)?;
            pairs.push((key, Rc::new(value)));
        }
        Ok(Expr::HashLiteral(pairs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StrSource;

    fn parse_one(rt: &mut Runtime, text: &str) -> RunResult<Expr> {
        let mut parser = Parser::new(Box::new(StrSource::new(text)));
        parser
            .parse_top_level(rt)
            .map(|expr| expr.expect("expected one expression"))
    }

    #[test]
    fn assignment_parses_to_prop_set() {
        let mut rt = Runtime::new();
        let expr = parse_one(&mut rt, "x: 1").unwrap();
        let Expr::PropSet { target, value } = expr else {
            panic!("expected prop-set, got {expr:?}");
        };
        assert!(target.site.is_none());
        assert!(matches!(*value, Expr::Primitive(_)));
    }

    #[test]
    fn dotted_chain_grafts_onto_the_leftmost_reference() {
        let mut rt = Runtime::new();
        let expr = parse_one(&mut rt, "a.b.c").unwrap();
        let Expr::PropRef(c) = expr else {
            panic!("expected prop-ref, got {expr:?}");
        };
        assert_eq!(rt.symbol_text(c.name), "c");
        let Some(b_site) = c.site.as_deref() else {
            panic!("c has no site");
        };
        let Expr::PropRef(b) = b_site else {
            panic!("expected prop-ref site");
        };
        assert_eq!(rt.symbol_text(b.name), "b");
        let Some(a_site) = b.site.as_deref() else {
            panic!("b has no site");
        };
        let Expr::PropRef(a) = a_site else {
            panic!("expected prop-ref site");
        };
        assert_eq!(rt.symbol_text(a.name), "a");
        assert!(a.site.is_none());
    }

    #[test]
    fn dotted_invocation_targets_the_invocation_reference() {
        let mut rt = Runtime::new();
        let expr = parse_one(&mut rt, "io.print(1)").unwrap();
        let Expr::Invocation { function, args } = expr else {
            panic!("expected invocation, got {expr:?}");
        };
        assert_eq!(rt.symbol_text(function.name), "print");
        assert!(function.site.is_some());
        assert!(matches!(args, InvokeArgs::List(_)));
    }

    #[test]
    fn dotted_primitive_is_a_parse_error() {
        let mut rt = Runtime::new();
        let err = parse_one(&mut rt, "a.5").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Parse);
    }

    #[test]
    fn arrow_after_list_builds_a_function_declaration() {
        let mut rt = Runtime::new();
        let expr = parse_one(&mut rt, "(x, y) -> (+(x, y))").unwrap();
        let Expr::FunctionDecl { args, body } = expr else {
            panic!("expected function declaration, got {expr:?}");
        };
        let Expr::ListLiteral(arg_items) = &*args else {
            panic!("args should be a list literal");
        };
        assert_eq!(arg_items.len(), 2);
        let Expr::ListLiteral(body_items) = &*body else {
            panic!("body should be a list literal");
        };
        assert_eq!(body_items.len(), 1);
    }

    #[test]
    fn commas_separate_top_level_expressions() {
        let mut rt = Runtime::new();
        let mut parser = Parser::new(Box::new(StrSource::new("x: 1, y: 2")));
        let program = parser.parse_program(&mut rt).unwrap();
        let Expr::ExprList(exprs) = &*program else {
            panic!("expected expression list");
        };
        assert_eq!(exprs.len(), 2);
    }

    #[test]
    fn stray_comma_inside_assignment_is_rejected() {
        let mut rt = Runtime::new();
        let err = parse_one(&mut rt, "x: ,").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Parse);
    }

    #[test]
    fn quoted_expression_wraps_in_deferred() {
        let mut rt = Runtime::new();
        let expr = parse_one(&mut rt, "`(x: 1)").unwrap();
        assert!(matches!(expr, Expr::Deferred(_)));
    }

    #[test]
    fn hash_literal_requires_identifier_keys() {
        let mut rt = Runtime::new();
        let err = parse_one(&mut rt, "{1: 2}").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Parse);
    }

    #[test]
    fn unclosed_list_is_a_parse_error() {
        let mut rt = Runtime::new();
        let err = parse_one(&mut rt, "(1, 2").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Parse);
    }
}
