//! The runtime facade: owns the heap, the interner, the global prototypes,
//! and orchestrates parse-and-evaluate.
//!
//! Construction builds the object root, the top-level environment (a hash
//! child of the object root, registered as a permanent GC root), and the
//! primitive pool (a rooted list holding every literal value the parser
//! creates). A fixed table of native functions is then registered under
//! dotted paths, creating intermediate hashes on demand and binding each
//! callable to its enclosing hash.

use std::rc::Rc;

use crate::{
    builtins,
    error::{Error, RunResult},
    expressions::Expr,
    heap::{Heap, HeapStats, ValueId},
    intern::{Interner, Keys, Symbol},
    io::{PrintWriter, StdPrint},
    parse::Parser,
    resource::ResourceLimits,
    source::{CharSource, FileSource, StrSource},
    value::{DeferredExpr, FileHandle, Payload, ValueKind},
};

/// Maximum depth [`Runtime::format_value`] descends into nested containers.
const FORMAT_DEPTH_LIMIT: usize = 32;

pub struct Runtime {
    pub(crate) interner: Interner,
    pub(crate) keys: Keys,
    pub(crate) heap: Heap,
    pub(crate) object_root: ValueId,
    pub(crate) top_level: ValueId,
    pub(crate) primitive_pool: ValueId,
    /// Root ASTs of loaded modules; deferred expressions inside them must
    /// stay valid for the life of the runtime.
    pub(crate) modules: Vec<Rc<Expr>>,
    pub(crate) out: Box<dyn PrintWriter>,
}

impl Runtime {
    /// A runtime with an unbounded heap, printing to stdout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ResourceLimits::none(), Box::new(StdPrint::new()))
            .expect("bootstrap cannot exhaust an unbounded heap")
    }

    /// A runtime with an unbounded heap and a custom print sink.
    #[must_use]
    pub fn with_print(out: Box<dyn PrintWriter>) -> Self {
        Self::with_config(ResourceLimits::none(), out)
            .expect("bootstrap cannot exhaust an unbounded heap")
    }

    /// A runtime with explicit resource limits.
    pub fn with_config(limits: ResourceLimits, out: Box<dyn PrintWriter>) -> RunResult<Self> {
        let mut interner = Interner::new();
        let keys = Keys::new(&mut interner);
        let mut heap = Heap::new(keys, limits);

        let object_root = heap.allocate(Payload::Hash)?;
        heap.add_root(object_root);

        let top_level = heap.allocate(Payload::Hash)?;
        heap.put(top_level, keys.parent, object_root);
        heap.add_root(top_level);

        // Literals created while parsing start with no other references;
        // the pool keeps them reachable for the life of the runtime.
        let primitive_pool = heap.allocate(Payload::List(Vec::new()))?;
        heap.add_root(primitive_pool);

        let mut rt = Self {
            interner,
            keys,
            heap,
            object_root,
            top_level,
            primitive_pool,
            modules: Vec::new(),
            out,
        };
        rt.register_top_level()?;
        Ok(rt)
    }

    fn register_top_level(&mut self) -> RunResult<()> {
        let object = self.interner.intern("Object");
        self.heap.put(self.top_level, object, self.object_root);

        for spec in builtins::NATIVES {
            let function = self.new_value(Payload::Native(spec.function))?;
            self.register_path(spec.path, function)?;
            self.heap.release(function);
        }

        let truthy = self.new_bool(true)?;
        self.register_path("true", truthy)?;
        self.heap.release(truthy);
        let falsy = self.new_bool(false)?;
        self.register_path("false", falsy)?;
        self.heap.release(falsy);
        Ok(())
    }

    /// Installs `value` under a dotted path from the top level, creating
    /// intermediate hashes on demand. Callables are bound to the hash they
    /// land in.
    fn register_path(&mut self, path: &str, value: ValueId) -> RunResult<()> {
        let mut site = self.top_level;
        self.heap.retain(site);
        let mut rest = path;
        while let Some(dot) = rest.find('.') {
            let (head, tail) = rest.split_at(dot);
            rest = &tail[1..];
            let segment = self.interner.intern(head);
            let next = match self.heap.get_with_prototypes(site, segment) {
                Some((existing, _)) => {
                    self.heap.retain(existing);
                    existing
                }
                None => {
                    let created = match self.new_hash() {
                        Ok(created) => created,
                        Err(err) => {
                            self.heap.release(site);
                            return Err(err);
                        }
                    };
                    self.heap.put(site, segment, created);
                    created
                }
            };
            self.heap.release(site);
            site = next;
        }
        let name = self.interner.intern(rest);
        self.heap.put(site, name, value);
        if self.heap.is_callable(value) {
            self.heap.put(value, self.keys.self_key, site);
        }
        self.heap.release(site);
        Ok(())
    }

    // === value construction ===

    /// Allocates a value whose `__parent__` is the object root.
    pub(crate) fn new_value(&mut self, payload: Payload) -> RunResult<ValueId> {
        let id = self.heap.allocate(payload)?;
        self.heap.put(id, self.keys.parent, self.object_root);
        Ok(id)
    }

    /// Allocates a value whose `__parent__` is `parent`.
    pub(crate) fn new_child(&mut self, parent: ValueId, payload: Payload) -> RunResult<ValueId> {
        let id = self.heap.allocate(payload)?;
        self.heap.put(id, self.keys.parent, parent);
        Ok(id)
    }

    pub(crate) fn new_hash(&mut self) -> RunResult<ValueId> {
        self.new_value(Payload::Hash)
    }

    /// A fresh list, parented to the `List` prototype when it exists so
    /// list methods are inheritable.
    pub(crate) fn new_list(&mut self) -> RunResult<ValueId> {
        match self.prototype("List") {
            Some(proto) => self.new_child(proto, Payload::List(Vec::new())),
            None => self.new_value(Payload::List(Vec::new())),
        }
    }

    pub(crate) fn new_number(&mut self, n: i64) -> RunResult<ValueId> {
        match self.prototype("Number") {
            Some(proto) => self.new_child(proto, Payload::Number(n)),
            None => self.new_value(Payload::Number(n)),
        }
    }

    pub(crate) fn new_string_value(&mut self, text: &str) -> RunResult<ValueId> {
        let sym = self.interner.intern(text);
        self.new_string_from_symbol(sym)
    }

    pub(crate) fn new_string_from_symbol(&mut self, sym: Symbol) -> RunResult<ValueId> {
        match self.prototype("String") {
            Some(proto) => self.new_child(proto, Payload::Str(sym)),
            None => self.new_value(Payload::Str(sym)),
        }
    }

    pub(crate) fn new_bool(&mut self, b: bool) -> RunResult<ValueId> {
        match self.prototype("Boolean") {
            Some(proto) => self.new_child(proto, Payload::Bool(b)),
            None => self.new_value(Payload::Bool(b)),
        }
    }

    /// A deferred-expression value capturing `env`. The environment is held
    /// directly (not through the member map) and released by the
    /// destructor; the mark phase walks it explicitly.
    pub(crate) fn new_deferred(&mut self, expr: Rc<Expr>, env: ValueId) -> RunResult<ValueId> {
        let id = self.new_value(Payload::Deferred(DeferredExpr { expr, env }))?;
        self.heap.retain(env);
        Ok(id)
    }

    /// Creates a number literal owned by the primitive pool.
    pub(crate) fn new_pooled_number(&mut self, n: i64) -> RunResult<ValueId> {
        let value = self.new_number(n)?;
        self.heap.list_push(self.primitive_pool, value);
        self.heap.release(value);
        Ok(value)
    }

    /// Creates a string literal owned by the primitive pool.
    pub(crate) fn new_pooled_string(&mut self, text: &str) -> RunResult<ValueId> {
        let value = self.new_string_value(text)?;
        self.heap.list_push(self.primitive_pool, value);
        self.heap.release(value);
        Ok(value)
    }

    /// A global prototype by name (`Number`, `String`, `Boolean`, `List`),
    /// looked up as a direct member of the top level.
    fn prototype(&mut self, name: &str) -> Option<ValueId> {
        let sym = self.interner.intern(name);
        self.heap.get_own(self.top_level, sym)
    }

    // === member lookup with method auto-binding ===

    /// Looks up `key` on `h`, walking the prototype chain.
    ///
    /// A callable inherited from a prototype is returned receiver-bound: if
    /// its current `self` is unset or is the providing ancestor (and that
    /// ancestor is not the top-level environment), a clone bound to `h` is
    /// installed into `h`'s own member map so subsequent lookups are direct.
    ///
    /// The returned handle is borrowed from the member map that owns it;
    /// callers retain it if they keep it.
    pub(crate) fn hash_get(&mut self, h: ValueId, key: Symbol) -> RunResult<Option<ValueId>> {
        let Some((value, provider)) = self.heap.get_with_prototypes(h, key) else {
            return Ok(None);
        };
        if provider == h {
            return Ok(Some(value));
        }
        if self.heap.is_callable(value) {
            let bound = self.heap.self_of(value);
            if (bound.is_none() || bound == Some(provider)) && provider != self.top_level {
                let clone = self.clone_value(value, Some(h))?;
                self.heap.put(h, key, clone);
                self.heap.release(clone);
                return Ok(Some(clone));
            }
        }
        Ok(Some(value))
    }

    // === cloning ===

    /// Value-model clone: a new value of the same shape with a deep-copied
    /// member map. Supported for hash-family and native-function values.
    ///
    /// Any member callable bound to the source (or unbound) is itself cloned
    /// and rebound to the new value; `rebind` additionally installs `self`
    /// on the clone, which is how prototype methods become receiver-bound.
    pub(crate) fn clone_value(
        &mut self,
        src: ValueId,
        rebind: Option<ValueId>,
    ) -> RunResult<ValueId> {
        let payload = match self.heap.payload(src) {
            Payload::Hash => Payload::Hash,
            Payload::Native(f) => Payload::Native(*f),
            Payload::File(_) => Payload::File(FileHandle::closed()),
            other => {
                return Err(Error::type_mismatch(
                    "a hash or callable value",
                    other.kind().into(),
                ))
            }
        };
        self.clone_with_payload(src, payload, rebind)
    }

    /// Clone machinery shared with the file module, which forces a file
    /// payload when cloning off the `File` prototype hash.
    pub(crate) fn clone_with_payload(
        &mut self,
        src: ValueId,
        payload: Payload,
        rebind: Option<ValueId>,
    ) -> RunResult<ValueId> {
        let dst = self.heap.allocate(payload)?;
        self.heap.add_root(dst);
        let pairs: Vec<(Symbol, ValueId)> = self.heap.members(src).iter().collect();
        for (key, value) in pairs {
            if key != self.keys.parent && self.heap.is_callable(value) {
                let bound = self.heap.self_of(value);
                if bound.is_none() || bound == Some(src) {
                    let cloned = self.clone_value(value, Some(dst))?;
                    self.heap.put(dst, key, cloned);
                    self.heap.release(cloned);
                    continue;
                }
            }
            self.heap.put(dst, key, value);
        }
        if let Some(receiver) = rebind {
            self.heap.put(dst, self.keys.self_key, receiver);
        }
        self.heap.remove_root(dst);
        Ok(dst)
    }

    // === execution ===

    /// Parses and evaluates a complete source string against the top-level
    /// environment. The returned value (the last expression's result) is
    /// owned by the caller; release it with [`Runtime::release_value`].
    pub fn exec(&mut self, source: &str) -> RunResult<Option<ValueId>> {
        self.exec_source(Box::new(StrSource::new(source)))
    }

    /// As [`Runtime::exec`], over any character source.
    pub fn exec_source(&mut self, source: Box<dyn CharSource>) -> RunResult<Option<ValueId>> {
        let mut parser = Parser::new(source);
        let program = parser.parse_program(self)?;
        self.evaluate(&program, self.top_level)
    }

    /// Loads and runs a file in the top-level environment, retaining its AST
    /// for the life of the runtime (deferred expressions inside the module
    /// may outlive this call). Used by the `sys.load` built-in.
    pub fn load_path(&mut self, path: &str) -> RunResult<Option<ValueId>> {
        let source = FileSource::open(path)?;
        let mut parser = Parser::new(Box::new(source));
        let program = parser.parse_program(self)?;
        self.modules.push(Rc::clone(&program));
        self.evaluate(&program, self.top_level)
    }

    // === inspection and maintenance ===

    pub(crate) fn intern(&mut self, text: &str) -> Symbol {
        self.interner.intern(text)
    }

    #[must_use]
    pub fn symbol_text(&self, sym: Symbol) -> &str {
        self.interner.get(sym)
    }

    /// Releases an owned result from [`Runtime::exec`] or a call.
    pub fn release_value(&mut self, value: Option<ValueId>) {
        if let Some(id) = value {
            self.heap.release(id);
        }
    }

    /// Forces a mark-and-sweep collection.
    pub fn gc(&mut self) {
        self.heap.collect();
    }

    #[must_use]
    pub fn heap_stats(&self) -> HeapStats {
        self.heap.stats()
    }

    #[must_use]
    pub fn value_kind(&self, id: ValueId) -> ValueKind {
        self.heap.kind(id)
    }

    #[must_use]
    pub fn number_value(&self, id: ValueId) -> Option<i64> {
        match self.heap.payload(id) {
            Payload::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn string_value(&self, id: ValueId) -> Option<&str> {
        match self.heap.payload(id) {
            Payload::Str(sym) => Some(self.symbol_text(*sym)),
            _ => None,
        }
    }

    #[must_use]
    pub fn bool_value(&self, id: ValueId) -> Option<bool> {
        match self.heap.payload(id) {
            Payload::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn list_len(&self, id: ValueId) -> Option<usize> {
        match self.heap.payload(id) {
            Payload::List(items) => Some(items.len()),
            _ => None,
        }
    }

    /// Renders a value in literal form: numbers and booleans bare, strings
    /// quoted, lists parenthesised, hashes braced with `__parent__` and
    /// `self` elided. Parsing the output of the primitive-producing subset
    /// yields an equivalent value.
    #[must_use]
    pub fn format_value(&self, value: Option<ValueId>) -> String {
        match value {
            Some(id) => self.format_id(id, FORMAT_DEPTH_LIMIT),
            None => "null".to_owned(),
        }
    }

    fn format_id(&self, id: ValueId, depth: usize) -> String {
        if depth == 0 {
            return "...".to_owned();
        }
        match self.heap.payload(id) {
            Payload::Free => "<free slot>".to_owned(),
            Payload::Number(n) => n.to_string(),
            Payload::Bool(b) => b.to_string(),
            Payload::Str(sym) => {
                let text = self.symbol_text(*sym);
                let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
                format!("\"{escaped}\"")
            }
            Payload::List(items) => {
                let rendered: Vec<String> = items
                    .iter()
                    .map(|&item| self.format_id(item, depth - 1))
                    .collect();
                format!("({})", rendered.join(", "))
            }
            Payload::Hash | Payload::File(_) => {
                let rendered: Vec<String> = self
                    .heap
                    .members(id)
                    .iter()
                    .filter(|&(key, _)| key != self.keys.parent && key != self.keys.self_key)
                    .map(|(key, value)| {
                        format!(
                            "{}: {}",
                            self.symbol_text(key),
                            self.format_id(value, depth - 1)
                        )
                    })
                    .collect();
                format!("{{{}}}", rendered.join(", "))
            }
            Payload::Native(_) => "<native function>".to_owned(),
            Payload::Deferred(_) => "<deferred expression>".to_owned(),
        }
    }

    /// Renders a value the way `io.print` would: through its `to_string`
    /// method. The receiver must resolve `to_string` to a callable returning
    /// a string.
    pub fn display(&mut self, id: ValueId) -> RunResult<String> {
        self.stringify(id)
    }

    pub(crate) fn stringify(&mut self, id: ValueId) -> RunResult<String> {
        let result = self.call_method(id, self.keys.to_string)?;
        let Some(result_id) = result else {
            return Err(Error::type_mismatch("a string from to_string", "nothing"));
        };
        let text = match self.heap.payload(result_id) {
            Payload::Str(sym) => Ok(self.symbol_text(*sym).to_owned()),
            other => Err(Error::type_mismatch(
                "a string from to_string",
                other.kind().into(),
            )),
        };
        self.heap.release(result_id);
        text
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// Incremental execution for a hosting CLI: parses and evaluates one
/// top-level expression per step, printing through the runtime's sink and
/// returning each result's display text.
pub struct Repl {
    parser: Parser,
}

impl Repl {
    /// A REPL reading from `source` (typically a [`crate::LineSource`]).
    #[must_use]
    pub fn new(source: Box<dyn CharSource>) -> Self {
        Self {
            parser: Parser::new(source),
        }
    }

    /// Parses and evaluates the next top-level expression against the
    /// persistent top-level environment.
    ///
    /// Returns `Ok(None)` at end of input, otherwise the result rendered
    /// through its `to_string` method (empty for expressions with no
    /// result).
    pub fn step(&mut self, rt: &mut Runtime) -> RunResult<Option<String>> {
        let Some(expr) = self.parser.parse_top_level(rt)? else {
            return Ok(None);
        };
        let result = rt.evaluate_node(&expr, rt.top_level)?;
        let rendered = match result {
            Some(id) => rt.display(id)?,
            None => String::new(),
        };
        rt.release_value(result);
        Ok(Some(rendered))
    }
}
