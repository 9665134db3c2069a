//! Interpreter state.
//!
//! An [`Interp`] owns everything one interpreter instance needs: the cell
//! heap, the root stack, the interned symbol table, the top-level
//! environment, the three standard ports, the signal flag, the log level,
//! and the user-defined type registry. One instance belongs to exactly one
//! thread at a time; the signal flag is the only cross-thread touchpoint.

use std::any::Any;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use lisk_io::Port;
use log::debug;

use crate::cell::{
    Cell, CellKind, CellRef, Procedure, Subr, SubrFn, Tag, UserData, UserTag, UserTypeOps,
};
use crate::error::{LispError, Result};
use crate::gc::{GcConfig, GcMode, Heap};
use crate::hash::HashTable;
use crate::{MAX_RECURSION_DEPTH, MAX_USER_TYPES, SYMBOL_TABLE_BINS};

/// User-facing log levels for the interpreter's log port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off,
    Error,
    Note,
    Debug,
}

/// The reserved symbol singletons, created uncollectable at init time and
/// matched by identity during special-form dispatch.
pub struct Singletons {
    pub nil: CellRef,
    pub tee: CellRef,
    pub quote: CellRef,
    pub iff: CellRef,
    pub lambda: CellRef,
    pub flambda: CellRef,
    pub define: CellRef,
    pub setq: CellRef,
    pub progn: CellRef,
    pub cond: CellRef,
    pub error: CellRef,
    pub environment: CellRef,
    pub let_: CellRef,
    pub ret: CellRef,
    pub while_: CellRef,
}

/// One interpreter instance.
pub struct Interp {
    heap: Heap,
    roots: Vec<CellRef>,
    gc_mode: GcMode,
    gc_config: GcConfig,
    alloc_since_gc: usize,

    /// Hash cell mapping name to interned Symbol cell.
    pub all_symbols: CellRef,
    /// The environment chain head: `((nil . top-hash))`.
    pub top_env: CellRef,
    /// The Hash cell holding top-level bindings.
    pub top_hash: CellRef,

    /// Current input, output and log ports (Io cells).
    pub input: CellRef,
    pub output: CellRef,
    pub logging: CellRef,

    sig: Arc<AtomicI32>,
    log_level: LogLevel,

    /// When set, procedures extend the caller's environment instead of
    /// their captured one.
    pub dynamic_scope: bool,
    /// When set, recoverable errors are escalated to fatal.
    pub errors_halt: bool,
    /// REPL flags consulted by the driver and the printer setup.
    pub color_on: bool,
    pub prompt_on: bool,

    /// Maximum evaluation depth.
    pub max_depth: usize,
    /// Depth of the innermost active evaluation, tucked away for
    /// subroutines that re-enter the evaluator.
    pub cur_depth: usize,

    user_types: Vec<UserTypeOps>,

    /// The reserved singletons.
    pub sing: Singletons,
    /// Shared empty docstring cell.
    pub empty_doc: CellRef,
}

impl Interp {
    /// Builds a fresh interpreter: singletons installed, symbol table and
    /// top environment created, standard streams bound, collection on.
    pub fn new() -> Self {
        let mut heap = Heap::new();

        let mut sym = |name: &[u8]| {
            heap.alloc(Cell::uncollectable(CellKind::Symbol(
                name.to_vec().into_boxed_slice(),
            )))
        };
        let sing = Singletons {
            nil: sym(b"nil"),
            tee: sym(b"t"),
            quote: sym(b"quote"),
            iff: sym(b"if"),
            lambda: sym(b"lambda"),
            flambda: sym(b"flambda"),
            define: sym(b"define"),
            setq: sym(b"set!"),
            progn: sym(b"progn"),
            cond: sym(b"cond"),
            error: sym(b"error"),
            environment: sym(b"environment"),
            let_: sym(b"let"),
            ret: sym(b"return"),
            while_: sym(b"while"),
        };
        let empty_doc = heap.alloc(Cell::uncollectable(CellKind::Str(
            Vec::new().into_boxed_slice(),
        )));

        let all_symbols = heap.alloc(Cell::new(CellKind::Hash(HashTable::create(
            SYMBOL_TABLE_BINS,
        ))));
        let top_hash = heap.alloc(Cell::new(CellKind::Hash(HashTable::create(
            SYMBOL_TABLE_BINS,
        ))));
        let head = heap.alloc(Cell::new(CellKind::Cons(sing.nil, top_hash)));
        let top_env = heap.alloc(Cell::new(CellKind::Cons(head, sing.nil)));

        let input = heap.alloc(Cell::new(CellKind::Io(Port::standard_input())));
        let output = heap.alloc(Cell::new(CellKind::Io(Port::standard_output())));
        let logging = heap.alloc(Cell::new(CellKind::Io(Port::standard_error())));

        let mut l = Interp {
            heap,
            roots: Vec::with_capacity(GcConfig::default().root_stack_capacity),
            gc_mode: GcMode::On,
            gc_config: GcConfig::default(),
            alloc_since_gc: 0,
            all_symbols,
            top_env,
            top_hash,
            input,
            output,
            logging,
            sig: Arc::new(AtomicI32::new(0)),
            log_level: LogLevel::Error,
            dynamic_scope: false,
            errors_halt: false,
            color_on: false,
            prompt_on: false,
            max_depth: MAX_RECURSION_DEPTH,
            cur_depth: 0,
            user_types: Vec::new(),
            sing,
            empty_doc,
        };

        // The singletons must be reachable through the symbol table so
        // intern() hands back the canonical cells.
        for s in [
            l.sing.nil,
            l.sing.tee,
            l.sing.quote,
            l.sing.iff,
            l.sing.lambda,
            l.sing.flambda,
            l.sing.define,
            l.sing.setq,
            l.sing.progn,
            l.sing.cond,
            l.sing.error,
            l.sing.environment,
            l.sing.let_,
            l.sing.ret,
            l.sing.while_,
        ] {
            let name = l.bytes(s).to_vec();
            l.hash_mut(l.all_symbols).insert(&name, s);
        }
        l
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    /// Allocates a cell, running a collection first when the allocation
    /// counter passes the collection point. Every fresh cell is pushed on
    /// the root stack so it survives until its evaluation frame ends.
    fn alloc(&mut self, kind: CellKind) -> CellRef {
        self.alloc_since_gc += 1;
        if self.alloc_since_gc > self.gc_config.collection_point && self.gc_mode == GcMode::On {
            self.mark_and_sweep();
        }
        let r = self.heap.alloc(Cell::new(kind));
        self.gc_add(r);
        r
    }

    pub fn cons(&mut self, car: CellRef, cdr: CellRef) -> CellRef {
        self.alloc(CellKind::Cons(car, cdr))
    }

    pub fn mk_int(&mut self, n: i64) -> CellRef {
        self.alloc(CellKind::Integer(n))
    }

    pub fn mk_float(&mut self, f: f64) -> CellRef {
        self.alloc(CellKind::Float(f))
    }

    pub fn mk_str(&mut self, bytes: impl Into<Vec<u8>>) -> CellRef {
        self.alloc(CellKind::Str(bytes.into().into_boxed_slice()))
    }

    pub fn mk_hash(&mut self, table: HashTable) -> CellRef {
        self.alloc(CellKind::Hash(table))
    }

    pub fn mk_io(&mut self, port: Port) -> CellRef {
        self.alloc(CellKind::Io(port))
    }

    /// Builds a subroutine cell. The expected argument count is the number
    /// of non-space codes in the validation format.
    pub fn mk_subr(&mut self, func: SubrFn, fmt: Option<&str>, doc: Option<&str>) -> CellRef {
        let doc = match doc {
            Some(d) if !d.is_empty() => self.mk_str(d.as_bytes().to_vec()),
            _ => self.empty_doc,
        };
        let arity = fmt
            .map(|f| f.chars().filter(|c| !c.is_whitespace()).count())
            .unwrap_or(0);
        self.alloc(CellKind::Subr(Subr {
            func,
            fmt: fmt.map(Box::from),
            doc,
            arity,
        }))
    }

    /// Builds a lambda procedure, deriving the fixed-parameter count and
    /// the variadic flag from the shape of the parameter list.
    pub fn mk_proc(
        &mut self,
        args: CellRef,
        code: CellRef,
        env: CellRef,
        doc: CellRef,
    ) -> CellRef {
        let (arity, variadic) = self.param_shape(args);
        self.alloc(CellKind::Proc(Procedure {
            args,
            code,
            env,
            doc,
            arity,
            variadic,
        }))
    }

    /// Builds an f-expression. The single parameter receives the
    /// unevaluated argument list.
    pub fn mk_fproc(
        &mut self,
        args: CellRef,
        code: CellRef,
        env: CellRef,
        doc: CellRef,
    ) -> CellRef {
        self.alloc(CellKind::FProc(Procedure {
            args,
            code,
            env,
            doc,
            arity: 1,
            variadic: false,
        }))
    }

    pub fn mk_user(&mut self, data: Box<dyn Any>, tag: UserTag) -> CellRef {
        self.alloc(CellKind::User(UserData { data, tag }))
    }

    /// Builds a proper list from the given elements.
    pub fn mk_list(&mut self, items: &[CellRef]) -> CellRef {
        let mut acc = self.sing.nil;
        for &item in items.iter().rev() {
            acc = self.cons(item, acc);
        }
        acc
    }

    fn param_shape(&self, mut args: CellRef) -> (usize, bool) {
        let mut count = 0;
        loop {
            if self.is_nil(args) {
                return (count, false);
            }
            match &self.heap.get(args).kind {
                CellKind::Cons(_, cdr) => {
                    count += 1;
                    args = *cdr;
                }
                // Improper tail: the trailing symbol collects the rest.
                _ => return (count, true),
            }
        }
    }

    // ------------------------------------------------------------------
    // Interning
    // ------------------------------------------------------------------

    /// Insert-if-absent into the symbol table. Idempotent: the same name
    /// always yields the same cell, so symbols compare by reference.
    pub fn intern(&mut self, name: &[u8]) -> CellRef {
        let syms = self.all_symbols;
        if let Some(existing) = self.hash_ref(syms).lookup(name) {
            return existing;
        }
        let cell = self.alloc(CellKind::Symbol(name.to_vec().into_boxed_slice()));
        self.hash_mut(syms).insert(name, cell);
        cell
    }

    // ------------------------------------------------------------------
    // Predicates
    // ------------------------------------------------------------------

    pub fn kind(&self, r: CellRef) -> &CellKind {
        &self.heap.get(r).kind
    }

    pub fn tag(&self, r: CellRef) -> Tag {
        self.heap.get(r).tag()
    }

    pub fn is_nil(&self, r: CellRef) -> bool {
        r == self.sing.nil
    }

    pub fn is_int(&self, r: CellRef) -> bool {
        matches!(self.kind(r), CellKind::Integer(_))
    }

    pub fn is_float(&self, r: CellRef) -> bool {
        matches!(self.kind(r), CellKind::Float(_))
    }

    pub fn is_sym(&self, r: CellRef) -> bool {
        matches!(self.kind(r), CellKind::Symbol(_))
    }

    pub fn is_str(&self, r: CellRef) -> bool {
        matches!(self.kind(r), CellKind::Str(_))
    }

    pub fn is_cons(&self, r: CellRef) -> bool {
        matches!(self.kind(r), CellKind::Cons(..))
    }

    pub fn is_hash(&self, r: CellRef) -> bool {
        matches!(self.kind(r), CellKind::Hash(_))
    }

    pub fn is_proc(&self, r: CellRef) -> bool {
        matches!(self.kind(r), CellKind::Proc(_))
    }

    pub fn is_fproc(&self, r: CellRef) -> bool {
        matches!(self.kind(r), CellKind::FProc(_))
    }

    pub fn is_subr(&self, r: CellRef) -> bool {
        matches!(self.kind(r), CellKind::Subr(_))
    }

    /// An open I/O port. A closed cell fails every payload predicate.
    pub fn is_io(&self, r: CellRef) -> bool {
        let cell = self.heap.get(r);
        matches!(cell.kind, CellKind::Io(_)) && !cell.closed
    }

    pub fn is_in(&self, r: CellRef) -> bool {
        let cell = self.heap.get(r);
        match &cell.kind {
            CellKind::Io(p) if !cell.closed => p.is_in(),
            _ => false,
        }
    }

    pub fn is_out(&self, r: CellRef) -> bool {
        let cell = self.heap.get(r);
        match &cell.kind {
            CellKind::Io(p) if !cell.closed => p.is_out(),
            _ => false,
        }
    }

    pub fn is_user(&self, r: CellRef) -> bool {
        let cell = self.heap.get(r);
        matches!(cell.kind, CellKind::User(_)) && !cell.closed
    }

    pub fn is_user_of(&self, r: CellRef, tag: UserTag) -> bool {
        let cell = self.heap.get(r);
        match &cell.kind {
            CellKind::User(u) if !cell.closed => u.tag == tag,
            _ => false,
        }
    }

    /// Symbol or string.
    pub fn is_asciiz(&self, r: CellRef) -> bool {
        self.is_sym(r) || self.is_str(r)
    }

    /// Integer or float.
    pub fn is_arith(&self, r: CellRef) -> bool {
        self.is_int(r) || self.is_float(r)
    }

    /// Subroutine, procedure or f-expression.
    pub fn is_callable(&self, r: CellRef) -> bool {
        self.is_subr(r) || self.is_proc(r) || self.is_fproc(r)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn car(&self, r: CellRef) -> CellRef {
        match self.kind(r) {
            CellKind::Cons(car, _) => *car,
            _ => panic!("internal inconsistency: car of non-cons"),
        }
    }

    pub fn cdr(&self, r: CellRef) -> CellRef {
        match self.kind(r) {
            CellKind::Cons(_, cdr) => *cdr,
            _ => panic!("internal inconsistency: cdr of non-cons"),
        }
    }

    pub fn set_car(&mut self, r: CellRef, v: CellRef) {
        match &mut self.heap.get_mut(r).kind {
            CellKind::Cons(car, _) => *car = v,
            _ => panic!("internal inconsistency: set-car of non-cons"),
        }
    }

    pub fn set_cdr(&mut self, r: CellRef, v: CellRef) {
        match &mut self.heap.get_mut(r).kind {
            CellKind::Cons(_, cdr) => *cdr = v,
            _ => panic!("internal inconsistency: set-cdr of non-cons"),
        }
    }

    /// Integer payload, or 0 for any other tag.
    pub fn int_val(&self, r: CellRef) -> i64 {
        match self.kind(r) {
            CellKind::Integer(n) => *n,
            _ => 0,
        }
    }

    /// Float payload, or 0.0 for any other tag.
    pub fn float_val(&self, r: CellRef) -> f64 {
        match self.kind(r) {
            CellKind::Float(f) => *f,
            _ => 0.0,
        }
    }

    /// Byte payload of a symbol or string.
    pub fn bytes(&self, r: CellRef) -> &[u8] {
        match self.kind(r) {
            CellKind::Symbol(b) | CellKind::Str(b) => b,
            _ => panic!("internal inconsistency: bytes of non-asciiz"),
        }
    }

    /// Lossy UTF-8 rendering of a symbol or string, for error messages.
    pub fn name(&self, r: CellRef) -> String {
        String::from_utf8_lossy(self.bytes(r)).into_owned()
    }

    pub fn hash_ref(&self, r: CellRef) -> &HashTable {
        match self.kind(r) {
            CellKind::Hash(h) => h,
            _ => panic!("internal inconsistency: hash of non-hash"),
        }
    }

    pub fn hash_mut(&mut self, r: CellRef) -> &mut HashTable {
        match &mut self.heap.get_mut(r).kind {
            CellKind::Hash(h) => h,
            _ => panic!("internal inconsistency: hash of non-hash"),
        }
    }

    pub fn port_ref(&self, r: CellRef) -> &Port {
        match self.kind(r) {
            CellKind::Io(p) => p,
            _ => panic!("internal inconsistency: port of non-io"),
        }
    }

    pub fn port_mut(&mut self, r: CellRef) -> &mut Port {
        match &mut self.heap.get_mut(r).kind {
            CellKind::Io(p) => p,
            _ => panic!("internal inconsistency: port of non-io"),
        }
    }

    pub fn subr_ref(&self, r: CellRef) -> &Subr {
        match self.kind(r) {
            CellKind::Subr(s) => s,
            _ => panic!("internal inconsistency: subr of non-subr"),
        }
    }

    pub fn proc_ref(&self, r: CellRef) -> &Procedure {
        match self.kind(r) {
            CellKind::Proc(p) | CellKind::FProc(p) => p,
            _ => panic!("internal inconsistency: proc of non-procedure"),
        }
    }

    pub fn user_ref(&self, r: CellRef) -> &UserData {
        match self.kind(r) {
            CellKind::User(u) => u,
            _ => panic!("internal inconsistency: user of non-user"),
        }
    }

    /// Length of the proper-list prefix of `r` (0 for nil and atoms).
    pub fn list_length(&self, mut r: CellRef) -> usize {
        let mut n = 0;
        while let CellKind::Cons(_, cdr) = self.kind(r) {
            n += 1;
            r = *cdr;
        }
        n
    }

    /// True when `r` is nil or a nil-terminated cons chain.
    pub fn is_proper_list(&self, mut r: CellRef) -> bool {
        loop {
            if self.is_nil(r) {
                return true;
            }
            match self.kind(r) {
                CellKind::Cons(_, cdr) => r = *cdr,
                _ => return false,
            }
        }
    }

    /// True when `r` is a proper list of exactly `expect` elements, or
    /// when `r` is an atom whose polymorphic length matches.
    pub fn check_length(&self, r: CellRef, expect: usize) -> bool {
        if self.is_nil(r) {
            return expect == 0;
        }
        if self.is_cons(r) {
            return self.list_length(r) == expect && self.is_proper_list(r);
        }
        self.heap.get(r).length() == expect
    }

    /// Marks an I/O port or user cell closed and releases its resource
    /// immediately. Idempotent; sweep will not double-release.
    pub fn close_cell(&mut self, r: CellRef) {
        let cell = self.heap.get_mut(r);
        match &mut cell.kind {
            CellKind::Io(p) => {
                p.close();
                cell.closed = true;
            }
            CellKind::User(_) => cell.closed = true,
            _ => {}
        }
    }

    /// Structural equality: numbers by value, strings by bytes, symbols
    /// and everything else by identity, user cells through their
    /// registered callback.
    pub fn cells_equal(&self, a: CellRef, b: CellRef) -> bool {
        if a == b {
            return true;
        }
        match (self.kind(a), self.kind(b)) {
            (CellKind::Integer(x), CellKind::Integer(y)) => x == y,
            (CellKind::Float(x), CellKind::Float(y)) => x == y,
            (CellKind::Str(x), CellKind::Str(y)) => x == y,
            (CellKind::Cons(ca, da), CellKind::Cons(cb, db)) => {
                self.cells_equal(*ca, *cb) && self.cells_equal(*da, *db)
            }
            (CellKind::User(x), CellKind::User(y)) if x.tag == y.tag => self
                .user_ops(x.tag)
                .and_then(|t| t.equal)
                .map(|eq| eq(&*x.data, &*y.data))
                .unwrap_or(false),
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Garbage collection controls
    // ------------------------------------------------------------------

    /// Protects a transient value: anything on the root stack survives
    /// collection until its frame is restored away.
    pub fn gc_add(&mut self, r: CellRef) -> CellRef {
        if self.gc_mode == GcMode::Off {
            return r;
        }
        self.roots.push(r);
        r
    }

    /// Snapshot of the root-stack length, restored on frame exit.
    pub fn gc_save(&self) -> usize {
        self.roots.len()
    }

    /// Truncates the root stack back to a snapshot.
    pub fn gc_restore(&mut self, len: usize) {
        self.roots.truncate(len);
    }

    pub fn gc_mode(&self) -> GcMode {
        self.gc_mode
    }

    /// Re-enables collection after a postpone. Rejected once the collector
    /// has been permanently disabled.
    pub fn gc_on(&mut self) -> Result<()> {
        if self.gc_mode == GcMode::Off {
            return Err(LispError::Resource(
                "garbage collector is permanently off".into(),
            ));
        }
        self.gc_mode = GcMode::On;
        Ok(())
    }

    /// Suspends automatic collection; the collector stays eligible to be
    /// re-enabled.
    pub fn gc_postpone(&mut self) {
        if self.gc_mode != GcMode::Off {
            self.gc_mode = GcMode::Postpone;
        }
    }

    /// Permanently disables collection for the lifetime of this
    /// interpreter.
    pub fn gc_off(&mut self) {
        self.gc_mode = GcMode::Off;
    }

    /// Marks everything reachable from the symbol table, the top
    /// environment, the current ports and the root stack, then sweeps.
    pub fn mark_and_sweep(&mut self) {
        let mut roots = vec![
            self.all_symbols,
            self.top_env,
            self.input,
            self.output,
            self.logging,
        ];
        roots.extend_from_slice(&self.roots);
        let marked = self.heap.mark_from(&roots, &self.user_types);
        let stats = self.heap.sweep(&self.user_types);
        debug!(
            "gc cycle: {} allocations since last, {} marked, {} freed",
            self.alloc_since_gc, marked, stats.freed
        );
        self.alloc_since_gc = 0;
    }

    /// Number of live heap cells (test and diagnostics hook).
    pub fn live_cells(&self) -> usize {
        self.heap.live_count()
    }

    /// Replaces the collector configuration. Test hook; the defaults suit
    /// production use.
    pub fn set_gc_config(&mut self, config: GcConfig) {
        self.gc_config = config;
    }

    // ------------------------------------------------------------------
    // Signals, logging, user types
    // ------------------------------------------------------------------

    /// Sets the asynchronous interrupt flag; the evaluator raises error
    /// code 1 at its next check point.
    pub fn set_signal(&self, code: i32) {
        self.sig.store(code, Ordering::SeqCst);
    }

    /// Consumes and returns the signal flag.
    pub fn take_signal(&self) -> i32 {
        self.sig.swap(0, Ordering::SeqCst)
    }

    /// A handle the host or a signal handler can store the flag through
    /// without touching the interpreter.
    pub fn signal_flag(&self) -> Arc<AtomicI32> {
        Arc::clone(&self.sig)
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    pub fn set_log_level(&mut self, level: LogLevel) {
        self.log_level = level;
    }

    /// True when a message at `level` should reach the log port.
    pub fn should_log(&self, level: LogLevel) -> bool {
        level != LogLevel::Off && self.log_level >= level
    }

    /// Registers a user-defined type and returns its tag.
    pub fn new_user_type(&mut self, ops: UserTypeOps) -> Result<UserTag> {
        if self.user_types.len() >= MAX_USER_TYPES {
            return Err(LispError::Resource("user-defined type table full".into()));
        }
        self.user_types.push(ops);
        Ok(UserTag((self.user_types.len() - 1) as u32))
    }

    pub fn user_ops(&self, tag: UserTag) -> Option<&UserTypeOps> {
        self.user_types.get(tag.0 as usize)
    }

    pub(crate) fn user_types(&self) -> &[UserTypeOps] {
        &self.user_types
    }

    /// Mutable heap escape hatch for the printer's cycle guard, which
    /// borrows the mark bit outside a collection cycle.
    pub fn cell_mark(&self, r: CellRef) -> bool {
        self.heap.get(r).mark
    }

    pub fn set_cell_mark(&mut self, r: CellRef, mark: bool) {
        self.heap.get_mut(r).mark = mark;
    }

    /// Whether the cell is flagged closed.
    pub fn is_closed(&self, r: CellRef) -> bool {
        self.heap.get(r).closed
    }

    /// A stable address-like token for a cell, used by the printer for
    /// `<subroutine:N>`-style forms.
    pub fn address_of(&self, r: CellRef) -> usize {
        r.index() as usize
    }
}

impl Default for Interp {
    fn default() -> Self {
        Interp::new()
    }
}

impl Drop for Interp {
    fn drop(&mut self) {
        // A final sweep releases every collectible resource: nothing is
        // marked, so everything except the uncollectable singletons is
        // finalized (ports closed, user finalizers run).
        self.roots.clear();
        let user_types = std::mem::take(&mut self.user_types);
        self.heap.sweep(&user_types);
    }
}
