//! lisk - a small, embeddable lisp interpreter.
//!
//! This crate is the host-facing surface: it ties the cell model, reader,
//! printer, evaluator and collector together behind one [`Lisp`] handle,
//! installs the builtin subroutines, and provides the REPL loop.
//!
//! ```
//! use lisk::Lisp;
//!
//! let mut lisp = Lisp::init();
//! let v = lisp.eval_string("(+ 2 2)").unwrap();
//! assert_eq!(lisp.interp().int_val(v), 4);
//! ```
//!
//! Recoverable interpreter errors (parse errors, type errors, `(error n)`
//! with a positive code) are translated into the `error` singleton at this
//! boundary; fatal errors propagate as `Err` so the embedding host can
//! unwind.

mod builtins;
mod coerce;
mod repl;

pub use coerce::coerce;
pub use lisk_core::{
    CellRef, GcMode, Interp, LispError, LogLevel, Result, SubrFn, Tag, UserTag, UserTypeOps,
};
pub use lisk_io::{Port, Whence};
pub use repl::repl;

use lisk_core::env::extend_top;
use lisk_print::{printer, Arg};
use lisk_read::Reader;

/// One interpreter instance plus its reader state.
pub struct Lisp {
    interp: Interp,
    reader: Reader,
}

impl Lisp {
    /// A fresh interpreter with the standard streams bound, the special
    /// singletons installed, the builtin subroutines and constants in the
    /// top environment, and collection on.
    pub fn init() -> Self {
        let mut lisp = Lisp {
            interp: Interp::new(),
            reader: Reader::new(),
        };
        builtins::install(&mut lisp);
        lisp
    }

    /// Direct access to the interpreter state.
    pub fn interp(&mut self) -> &mut Interp {
        &mut self.interp
    }

    /// Interns `name`, builds a subroutine cell and installs it in the
    /// top environment. `fmt` is the validation format (absent leaves the
    /// subroutine responsible for its own checking); `doc` the docstring.
    pub fn add_subr(
        &mut self,
        name: &str,
        func: SubrFn,
        fmt: Option<&str>,
        doc: Option<&str>,
    ) -> CellRef {
        let subr = self.interp.mk_subr(func, fmt, doc);
        self.add_cell(name, subr)
    }

    /// Interns `name` and binds it to `cell` in the top environment.
    pub fn add_cell(&mut self, name: &str, cell: CellRef) -> CellRef {
        let sym = self.interp.intern(name.as_bytes());
        extend_top(&mut self.interp, sym, cell);
        cell
    }

    /// Insert-if-absent into the symbol table.
    pub fn intern(&mut self, name: &str) -> CellRef {
        self.interp.intern(name.as_bytes())
    }

    /// Parses one S-expression from `port`. Returns the expression, the
    /// `error` singleton on a recoverable parse error, or `None` on a
    /// clean end of input.
    pub fn read(&mut self, port: CellRef) -> Result<Option<CellRef>> {
        match self.reader.read(&mut self.interp, port) {
            Ok(v) => Ok(v),
            Err(e) if self.escalates(&e) => Err(e),
            Err(_) => Ok(Some(self.interp.sing.error)),
        }
    }

    /// Evaluates against the top-level environment. Recoverable errors
    /// come back as the `error` singleton; fatal errors as `Err`.
    pub fn eval(&mut self, expr: CellRef) -> Result<CellRef> {
        let env = self.interp.top_env;
        let ret = lisk_eval::eval(&mut self.interp, 0, expr, env);
        self.recover(ret)
    }

    /// Parses and evaluates every expression in `text`, returning the
    /// last value.
    pub fn eval_string(&mut self, text: &str) -> Result<CellRef> {
        let port = self.interp.mk_io(Port::string_input(text));
        let ret = self.eval_port(port);
        self.interp.close_cell(port);
        ret
    }

    /// Reads and evaluates every expression on `port`, returning the last
    /// value (`nil` when the port holds none).
    pub fn eval_port(&mut self, port: CellRef) -> Result<CellRef> {
        let mut last = self.interp.sing.nil;
        loop {
            let expr = {
                let r = self.reader.read(&mut self.interp, port);
                match r {
                    Ok(Some(e)) => e,
                    Ok(None) => return Ok(last),
                    Err(e) if self.escalates(&e) => return Err(e),
                    Err(_) => return Ok(self.interp.sing.error),
                }
            };
            let env = self.interp.top_env;
            let ret = lisk_eval::eval(&mut self.interp, 0, expr, env);
            last = self.recover(ret)?;
        }
    }

    /// Serializes `value` to the interpreter's output port followed by a
    /// newline.
    pub fn print(&mut self, value: CellRef) -> Result<()> {
        let out = self.interp.output;
        printer(&mut self.interp, out, value, 0)?;
        lisk_print::printerf(&mut self.interp, out, 0, "\n", &[])?;
        self.interp.port_mut(out).flush();
        Ok(())
    }

    /// Swaps the input port; rejected when `port` is not an open input
    /// port.
    pub fn set_input(&mut self, port: CellRef) -> Result<()> {
        if !self.interp.is_in(port) {
            return Err(LispError::Type("expected an input port".into()));
        }
        self.interp.input = port;
        Ok(())
    }

    /// Swaps the output port; rejected when `port` is not an open output
    /// port.
    pub fn set_output(&mut self, port: CellRef) -> Result<()> {
        if !self.interp.is_out(port) {
            return Err(LispError::Type("expected an output port".into()));
        }
        self.interp.output = port;
        Ok(())
    }

    /// Swaps the log port; rejected when `port` is not an open output
    /// port.
    pub fn set_logging(&mut self, port: CellRef) -> Result<()> {
        if !self.interp.is_out(port) {
            return Err(LispError::Type("expected an output port".into()));
        }
        self.interp.logging = port;
        Ok(())
    }

    /// Sets the asynchronous interrupt flag.
    pub fn set_signal(&mut self, code: i32) {
        self.interp.set_signal(code);
    }

    /// Sets the log level for messages on the log port.
    pub fn set_log_level(&mut self, level: LogLevel) {
        self.interp.set_log_level(level);
    }

    /// Collection controls. `gc_off` is permanent for this interpreter.
    pub fn gc_on(&mut self) -> Result<()> {
        self.interp.gc_on()
    }

    pub fn gc_postpone(&mut self) {
        self.interp.gc_postpone();
    }

    pub fn gc_off(&mut self) {
        self.interp.gc_off();
    }

    pub fn gc_mark_and_sweep(&mut self) {
        self.interp.mark_and_sweep();
    }

    /// Registers a user-defined type's callbacks and returns its tag.
    pub fn new_user_defined_type(&mut self, ops: UserTypeOps) -> Result<UserTag> {
        self.interp.new_user_type(ops)
    }

    /// Coerces `value` to the target tag (see [`coerce`]).
    pub fn coerce(&mut self, target: Tag, value: CellRef) -> Result<CellRef> {
        coerce(&mut self.interp, target, value)
    }

    /// True when `e` must unwind out of the host call instead of turning
    /// into the `error` singleton.
    fn escalates(&self, e: &LispError) -> bool {
        e.is_fatal() || self.interp.errors_halt
    }

    /// Collapses a recoverable error into the `error` singleton, the
    /// boundary behavior of every host-facing entry point.
    fn recover(&mut self, ret: Result<CellRef>) -> Result<CellRef> {
        match ret {
            Ok(v) => Ok(v),
            Err(e) if self.escalates(&e) => Err(e),
            Err(_) => Ok(self.interp.sing.error),
        }
    }

    /// Prints `value` into a fresh string (host convenience).
    pub fn to_string(&mut self, value: CellRef) -> Result<String> {
        let bytes = lisk_print::print_to_string(&mut self.interp, value)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Default for Lisp {
    fn default() -> Self {
        Lisp::init()
    }
}

/// Formats one line to the interpreter's current output port (REPL
/// plumbing).
pub(crate) fn put_prompt(l: &mut Interp, prompt: &str) {
    let out = l.output;
    let _ = lisk_print::printerf(l, out, 0, "%s", &[Arg::S(prompt.as_bytes())]);
    l.port_mut(out).flush();
}
