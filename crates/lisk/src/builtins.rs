//! Builtin subroutines installed into every fresh interpreter.
//!
//! Each entry carries a validation format the evaluator runs before the
//! call (see the validation module) and a docstring. Subroutines without
//! a format do their own checking.

use lisk_core::{
    CellKind, CellRef, HashTable, Interp, LispError, LogLevel, Result, Tag, DEFAULT_BIN_COUNT,
};
use lisk_io::Port;
use lisk_print::{printer, report, Arg};
use lisk_read::Reader;

use crate::coerce::coerce;
use crate::Lisp;

type Entry = (&'static str, lisk_core::SubrFn, Option<&'static str>, &'static str);

/// The primitive table. Names bind in the top environment at init.
const PRIMITIVES: &[Entry] = &[
    ("+", subr_add, Some("a a"), "add two numbers"),
    ("-", subr_sub, Some("a a"), "subtract the second number from the first"),
    ("*", subr_mul, Some("a a"), "multiply two numbers"),
    ("/", subr_div, Some("a a"), "divide the first number by the second"),
    ("%", subr_mod, Some("d d"), "integer remainder"),
    ("=", subr_num_eq, Some("a a"), "numeric equality"),
    ("<", subr_less, Some("a a"), "numeric less-than"),
    (">", subr_greater, Some("a a"), "numeric greater-than"),
    ("cons", subr_cons, Some("A A"), "pair two values"),
    ("car", subr_car, Some("c"), "first field of a pair"),
    ("cdr", subr_cdr, Some("c"), "second field of a pair"),
    ("set-car!", subr_set_car, Some("c A"), "mutate the first field of a pair"),
    ("set-cdr!", subr_set_cdr, Some("c A"), "mutate the second field of a pair"),
    ("list", subr_list, None, "collect the arguments into a list"),
    ("length", subr_length, None, "length of a list, string or hash"),
    ("reverse", subr_reverse, None, "reverse a list or string"),
    ("eq", subr_eq, Some("A A"), "identity comparison, numbers by value"),
    ("equal", subr_equal, Some("A A"), "structural comparison"),
    ("type-of", subr_type_of, Some("A"), "symbol naming the argument's type"),
    ("hash-create", subr_hash_create, None, "hash from key/value argument pairs"),
    ("hash-lookup", subr_hash_lookup, Some("h Z"), "stored (key . value) pair or nil"),
    ("hash-insert", subr_hash_insert, Some("h Z A"), "insert a key/value pair"),
    ("print", subr_print, Some("A"), "write a value and newline to the output port"),
    ("put", subr_put, Some("o Z"), "write raw bytes to an output port"),
    ("getline", subr_getline, Some("i"), "read one line from an input port"),
    ("read", subr_read, Some("I"), "parse one expression from a port or string"),
    ("eval", subr_eval, None, "evaluate an expression, optionally in an environment"),
    ("coerce", subr_coerce, Some("s A"), "convert a value to the named type"),
    ("open-input-string", subr_open_input_string, Some("S"), "input port over a string"),
    ("open-output-string", subr_open_output_string, Some(""), "growable string output port"),
    ("get-output-string", subr_get_output_string, Some("o"), "contents of a string output port"),
    ("close", subr_close, Some("P"), "close a port"),
    ("gc", subr_gc, Some(""), "run a collection now"),
    ("not", subr_not, Some("A"), "t when the argument is nil"),
    ("assoc", subr_assoc, Some("A L"), "find a binding pair in an association list"),
    ("min", subr_min, Some("a a"), "smaller of two numbers"),
    ("max", subr_max, Some("a a"), "larger of two numbers"),
    ("band", subr_band, Some("d d"), "bitwise and"),
    ("bor", subr_bor, Some("d d"), "bitwise or"),
    ("bxor", subr_bxor, Some("d d"), "bitwise exclusive or"),
    ("binvert", subr_binvert, Some("d"), "bitwise complement"),
    ("scons", subr_scons, Some("Z Z"), "concatenate two strings or symbols"),
    ("substring", subr_substring, None, "substring from a start index, optionally bounded"),
    ("input?", subr_is_input, Some("A"), "t for an open input port"),
    ("output?", subr_is_output, Some("A"), "t for an open output port"),
    ("eof?", subr_is_eof, Some("P"), "t when a port has seen end of input"),
    ("top-environment", subr_top_env, Some(""), "the top-level environment"),
    (
        "documentation-string",
        subr_doc_string,
        Some("x"),
        "docstring of a procedure or subroutine",
    ),
];

/// Installs the primitive table and the constant bindings.
pub(crate) fn install(lisp: &mut Lisp) {
    for &(name, func, fmt, doc) in PRIMITIVES {
        lisp.add_subr(name, func, fmt, Some(doc));
    }
    // The truth singleton evaluates to itself through its own binding.
    let tee = lisp.interp().sing.tee;
    lisp.add_cell("t", tee);
    let pi = lisp.interp().mk_float(std::f64::consts::PI);
    lisp.add_cell("pi", pi);
    let e = lisp.interp().mk_float(std::f64::consts::E);
    lisp.add_cell("e", e);
    let max = lisp.interp().mk_int(i64::MAX);
    lisp.add_cell("most-positive-integer", max);
    let min = lisp.interp().mk_int(i64::MIN);
    lisp.add_cell("most-negative-integer", min);
    let stdin = lisp.interp().input;
    lisp.add_cell("*stdin*", stdin);
    let stdout = lisp.interp().output;
    lisp.add_cell("*stdout*", stdout);
    let stderr = lisp.interp().logging;
    lisp.add_cell("*stderr*", stderr);
}

fn arg1(l: &Interp, args: CellRef) -> CellRef {
    l.car(args)
}

fn arg2(l: &Interp, args: CellRef) -> CellRef {
    l.car(l.cdr(args))
}

fn boolean(l: &Interp, b: bool) -> CellRef {
    if b {
        l.sing.tee
    } else {
        l.sing.nil
    }
}

/// A number drawn out of an arithmetic cell.
#[derive(Clone, Copy)]
enum Num {
    I(i64),
    F(f64),
}

fn num(l: &Interp, r: CellRef) -> Num {
    match l.kind(r) {
        CellKind::Float(f) => Num::F(*f),
        _ => Num::I(l.int_val(r)),
    }
}

fn arith_error(l: &mut Interp, what: &str) -> LispError {
    report(
        l,
        LogLevel::Error,
        "%y'arithmetic%t %r\"%s\"%t",
        &[Arg::S(what.as_bytes())],
    );
    LispError::Arithmetic(what.into())
}

fn subr_add(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    match (num(l, arg1(l, args)), num(l, arg2(l, args))) {
        (Num::I(a), Num::I(b)) => Ok(l.mk_int(a.wrapping_add(b))),
        (a, b) => Ok(l.mk_float(as_f(a) + as_f(b))),
    }
}

fn subr_sub(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    match (num(l, arg1(l, args)), num(l, arg2(l, args))) {
        (Num::I(a), Num::I(b)) => Ok(l.mk_int(a.wrapping_sub(b))),
        (a, b) => Ok(l.mk_float(as_f(a) - as_f(b))),
    }
}

fn subr_mul(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    match (num(l, arg1(l, args)), num(l, arg2(l, args))) {
        (Num::I(a), Num::I(b)) => Ok(l.mk_int(a.wrapping_mul(b))),
        (a, b) => Ok(l.mk_float(as_f(a) * as_f(b))),
    }
}

fn subr_div(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    match (num(l, arg1(l, args)), num(l, arg2(l, args))) {
        (Num::I(_), Num::I(0)) => Err(arith_error(l, "division by zero")),
        (Num::I(i64::MIN), Num::I(-1)) => Err(arith_error(l, "integer overflow in division")),
        (Num::I(a), Num::I(b)) => Ok(l.mk_int(a / b)),
        (a, b) => {
            let d = as_f(b);
            if d == 0.0 {
                return Err(arith_error(l, "division by zero"));
            }
            Ok(l.mk_float(as_f(a) / d))
        }
    }
}

fn subr_mod(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let a = l.int_val(arg1(l, args));
    let b = l.int_val(arg2(l, args));
    if b == 0 {
        return Err(arith_error(l, "division by zero"));
    }
    if a == i64::MIN && b == -1 {
        return Err(arith_error(l, "integer overflow in division"));
    }
    Ok(l.mk_int(a % b))
}

fn as_f(n: Num) -> f64 {
    match n {
        Num::I(i) => i as f64,
        Num::F(f) => f,
    }
}

fn subr_num_eq(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let r = match (num(l, arg1(l, args)), num(l, arg2(l, args))) {
        (Num::I(a), Num::I(b)) => a == b,
        (a, b) => as_f(a) == as_f(b),
    };
    Ok(boolean(l, r))
}

fn subr_less(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let r = match (num(l, arg1(l, args)), num(l, arg2(l, args))) {
        (Num::I(a), Num::I(b)) => a < b,
        (a, b) => as_f(a) < as_f(b),
    };
    Ok(boolean(l, r))
}

fn subr_greater(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let r = match (num(l, arg1(l, args)), num(l, arg2(l, args))) {
        (Num::I(a), Num::I(b)) => a > b,
        (a, b) => as_f(a) > as_f(b),
    };
    Ok(boolean(l, r))
}

fn subr_cons(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let a = arg1(l, args);
    let b = arg2(l, args);
    Ok(l.cons(a, b))
}

fn subr_car(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    Ok(l.car(arg1(l, args)))
}

fn subr_cdr(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    Ok(l.cdr(arg1(l, args)))
}

fn subr_set_car(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let pair = arg1(l, args);
    let v = arg2(l, args);
    l.set_car(pair, v);
    Ok(pair)
}

fn subr_set_cdr(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let pair = arg1(l, args);
    let v = arg2(l, args);
    l.set_cdr(pair, v);
    Ok(pair)
}

fn subr_list(_l: &mut Interp, args: CellRef) -> Result<CellRef> {
    // The evaluated argument list is already a fresh proper list.
    Ok(args)
}

fn subr_length(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    if !l.check_length(args, 1) {
        return Err(LispError::Arity("length expects one argument".into()));
    }
    let v = arg1(l, args);
    let n = if l.is_nil(v) {
        0
    } else {
        match l.kind(v) {
            CellKind::Cons(..) => l.list_length(v),
            CellKind::Symbol(b) | CellKind::Str(b) => b.len(),
            CellKind::Hash(h) => h.len(),
            _ => {
                return Err(LispError::Type(
                    "length expects a list, string or hash".into(),
                ))
            }
        }
    };
    Ok(l.mk_int(n as i64))
}

fn subr_reverse(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    if !l.check_length(args, 1) {
        return Err(LispError::Arity("reverse expects one argument".into()));
    }
    let v = arg1(l, args);
    if l.is_nil(v) {
        return Ok(v);
    }
    match l.kind(v) {
        CellKind::Cons(..) => {
            let mut acc = l.sing.nil;
            let mut rest = v;
            while l.is_cons(rest) {
                let head = l.car(rest);
                acc = l.cons(head, acc);
                rest = l.cdr(rest);
            }
            if !l.is_nil(rest) {
                return Err(LispError::Type("cannot reverse a dotted list".into()));
            }
            Ok(acc)
        }
        CellKind::Str(b) => {
            let mut rev = b.to_vec();
            rev.reverse();
            Ok(l.mk_str(rev))
        }
        _ => Err(LispError::Type("reverse expects a list or string".into())),
    }
}

fn subr_eq(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let a = arg1(l, args);
    let b = arg2(l, args);
    let r = match (l.kind(a), l.kind(b)) {
        (CellKind::Integer(x), CellKind::Integer(y)) => x == y,
        (CellKind::Float(x), CellKind::Float(y)) => x == y,
        _ => a == b,
    };
    Ok(boolean(l, r))
}

fn subr_equal(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let a = arg1(l, args);
    let b = arg2(l, args);
    let r = l.cells_equal(a, b);
    Ok(boolean(l, r))
}

fn subr_type_of(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let tag = l.tag(arg1(l, args));
    Ok(l.intern(tag.name().as_bytes()))
}

fn subr_hash_create(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    if l.list_length(args) % 2 != 0 {
        return Err(LispError::Arity(
            "hash-create expects an even number of arguments".into(),
        ));
    }
    let mut table = HashTable::create(DEFAULT_BIN_COUNT);
    let mut rest = args;
    while l.is_cons(rest) {
        let key = l.car(rest);
        let val = arg2(l, rest);
        if !l.is_asciiz(key) {
            return Err(LispError::Type(
                "hash keys must be symbols or strings".into(),
            ));
        }
        let bytes = l.bytes(key).to_vec();
        let pair = l.cons(key, val);
        table.insert(&bytes, pair);
        rest = l.cdr(l.cdr(rest));
    }
    Ok(l.mk_hash(table))
}

fn subr_hash_lookup(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let hash = arg1(l, args);
    let key = arg2(l, args);
    let bytes = l.bytes(key).to_vec();
    Ok(l.hash_ref(hash).lookup(&bytes).unwrap_or(l.sing.nil))
}

fn subr_hash_insert(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let hash = arg1(l, args);
    let key = arg2(l, args);
    let val = l.car(l.cdr(l.cdr(args)));
    let bytes = l.bytes(key).to_vec();
    let pair = l.cons(key, val);
    l.hash_mut(hash).insert(&bytes, pair);
    Ok(hash)
}

fn subr_print(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let v = arg1(l, args);
    let out = l.output;
    printer(l, out, v, 0)?;
    lisk_print::printerf(l, out, 0, "\n", &[])?;
    Ok(v)
}

fn subr_put(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let port = arg1(l, args);
    let bytes = l.bytes(arg2(l, args)).to_vec();
    if !l.port_mut(port).puts(&bytes) {
        return Err(LispError::Resource("write to output port failed".into()));
    }
    Ok(l.sing.tee)
}

fn subr_getline(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let port = arg1(l, args);
    match l.port_mut(port).getline() {
        Some(line) => Ok(l.mk_str(line)),
        None => Ok(l.sing.nil),
    }
}

fn subr_read(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let src = arg1(l, args);
    let port = if l.is_str(src) {
        let bytes = l.bytes(src).to_vec();
        l.mk_io(Port::string_input(bytes))
    } else {
        src
    };
    let mut reader = Reader::new();
    match reader.read(l, port) {
        Ok(Some(expr)) => Ok(expr),
        Ok(None) => Ok(l.sing.error),
        Err(e) if e.is_fatal() => Err(e),
        Err(_) => Ok(l.sing.error),
    }
}

fn subr_eval(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let (expr, env) = match l.list_length(args) {
        1 => (arg1(l, args), l.top_env),
        2 => {
            let env = arg2(l, args);
            if !l.is_cons(env) {
                return Err(LispError::Type("eval expects an environment".into()));
            }
            (arg1(l, args), env)
        }
        _ => {
            return Err(LispError::Arity(
                "eval expects one or two arguments".into(),
            ))
        }
    };
    // Evaluation on behalf of user code inherits the surrounding depth
    // counter, so runaway towers of eval still hit the depth bound.
    let depth = l.cur_depth;
    lisk_eval::eval(l, depth, expr, env)
}

fn subr_coerce(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let name = l.bytes(arg1(l, args)).to_vec();
    let target = match name.as_slice() {
        b"integer" => Tag::Integer,
        b"float" => Tag::Float,
        b"symbol" => Tag::Symbol,
        b"string" => Tag::Str,
        b"cons" => Tag::Cons,
        b"hash" => Tag::Hash,
        other => {
            return Err(LispError::Type(format!(
                "cannot coerce to '{}'",
                String::from_utf8_lossy(other)
            )))
        }
    };
    coerce(l, target, arg2(l, args))
}

fn subr_open_input_string(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let bytes = l.bytes(arg1(l, args)).to_vec();
    Ok(l.mk_io(Port::string_input(bytes)))
}

fn subr_open_output_string(l: &mut Interp, _args: CellRef) -> Result<CellRef> {
    Ok(l.mk_io(Port::string_output()))
}

fn subr_get_output_string(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let port = arg1(l, args);
    let bytes = l
        .port_ref(port)
        .string_contents()
        .map(|b| b.to_vec())
        .ok_or_else(|| LispError::Type("expected a string output port".into()))?;
    Ok(l.mk_str(bytes))
}

fn subr_close(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let port = arg1(l, args);
    l.close_cell(port);
    Ok(l.sing.tee)
}

fn subr_gc(l: &mut Interp, _args: CellRef) -> Result<CellRef> {
    l.mark_and_sweep();
    Ok(l.sing.tee)
}

fn subr_not(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let v = arg1(l, args);
    let nil = l.is_nil(v);
    Ok(boolean(l, nil))
}

fn subr_assoc(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let key = arg1(l, args);
    let alist = arg2(l, args);
    Ok(lisk_core::env::assoc(l, key, alist).unwrap_or(l.sing.nil))
}

fn subr_min(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let a = arg1(l, args);
    let b = arg2(l, args);
    let a_wins = match (num(l, a), num(l, b)) {
        (Num::I(x), Num::I(y)) => x <= y,
        (x, y) => as_f(x) <= as_f(y),
    };
    Ok(if a_wins { a } else { b })
}

fn subr_max(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let a = arg1(l, args);
    let b = arg2(l, args);
    let a_wins = match (num(l, a), num(l, b)) {
        (Num::I(x), Num::I(y)) => x >= y,
        (x, y) => as_f(x) >= as_f(y),
    };
    Ok(if a_wins { a } else { b })
}

fn subr_band(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let r = l.int_val(arg1(l, args)) & l.int_val(arg2(l, args));
    Ok(l.mk_int(r))
}

fn subr_bor(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let r = l.int_val(arg1(l, args)) | l.int_val(arg2(l, args));
    Ok(l.mk_int(r))
}

fn subr_bxor(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let r = l.int_val(arg1(l, args)) ^ l.int_val(arg2(l, args));
    Ok(l.mk_int(r))
}

fn subr_binvert(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let r = !l.int_val(arg1(l, args));
    Ok(l.mk_int(r))
}

fn subr_scons(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let mut joined = l.bytes(arg1(l, args)).to_vec();
    joined.extend_from_slice(l.bytes(arg2(l, args)));
    Ok(l.mk_str(joined))
}

/// `(substring s start)` takes the tail from `start`; `(substring s
/// start len)` bounds it. Indexes clamp to the string.
fn subr_substring(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let argc = l.list_length(args);
    if !(2..=3).contains(&argc) || !l.is_asciiz(arg1(l, args)) || !l.is_int(arg2(l, args)) {
        return Err(LispError::Type(
            "substring expects (string start) or (string start length)".into(),
        ));
    }
    let bytes = l.bytes(arg1(l, args)).to_vec();
    let start = (l.int_val(arg2(l, args)).max(0) as usize).min(bytes.len());
    let end = if argc == 3 {
        let third = l.car(l.cdr(l.cdr(args)));
        if !l.is_int(third) {
            return Err(LispError::Type("substring length must be an integer".into()));
        }
        (start + l.int_val(third).max(0) as usize).min(bytes.len())
    } else {
        bytes.len()
    };
    Ok(l.mk_str(bytes[start..end].to_vec()))
}

fn subr_is_input(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let v = arg1(l, args);
    let r = l.is_in(v);
    Ok(boolean(l, r))
}

fn subr_is_output(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let v = arg1(l, args);
    let r = l.is_out(v);
    Ok(boolean(l, r))
}

fn subr_is_eof(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let port = arg1(l, args);
    let r = l.port_ref(port).eof();
    Ok(boolean(l, r))
}

fn subr_top_env(l: &mut Interp, _args: CellRef) -> Result<CellRef> {
    Ok(l.top_env)
}

fn subr_doc_string(l: &mut Interp, args: CellRef) -> Result<CellRef> {
    let f = arg1(l, args);
    if l.is_subr(f) {
        Ok(l.subr_ref(f).doc)
    } else {
        Ok(l.proc_ref(f).doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Lisp;

    fn quiet() -> Lisp {
        let mut lisp = Lisp::init();
        lisp.set_log_level(LogLevel::Off);
        lisp
    }

    fn eval_to_string(lisp: &mut Lisp, src: &str) -> String {
        let v = lisp.eval_string(src).unwrap();
        lisp.to_string(v).unwrap()
    }

    #[test]
    fn arithmetic() {
        let mut lisp = quiet();
        assert_eq!(eval_to_string(&mut lisp, "(+ 2 2)"), "4");
        assert_eq!(eval_to_string(&mut lisp, "(- 10 4)"), "6");
        assert_eq!(eval_to_string(&mut lisp, "(* 3 7)"), "21");
        assert_eq!(eval_to_string(&mut lisp, "(/ 10 2)"), "5");
        assert_eq!(eval_to_string(&mut lisp, "(% 10 3)"), "1");
        assert_eq!(eval_to_string(&mut lisp, "(+ 1.5 2.5)"), "4e0");
        assert_eq!(eval_to_string(&mut lisp, "(+ 1 0.5)"), "1.5e0");
    }

    #[test]
    fn division_errors() {
        let mut lisp = quiet();
        let err = lisp.interp().sing.error;
        assert_eq!(lisp.eval_string("(/ 1 0)").unwrap(), err);
        assert_eq!(lisp.eval_string("(% 1 0)").unwrap(), err);
        assert_eq!(
            lisp.eval_string("(/ most-negative-integer -1)").unwrap(),
            err
        );
        assert_eq!(
            lisp.eval_string("(% most-negative-integer -1)").unwrap(),
            err
        );
    }

    #[test]
    fn comparisons() {
        let mut lisp = quiet();
        assert_eq!(eval_to_string(&mut lisp, "(= 1 1)"), "t");
        assert_eq!(eval_to_string(&mut lisp, "(= 1 2)"), "nil");
        assert_eq!(eval_to_string(&mut lisp, "(< 1 2)"), "t");
        assert_eq!(eval_to_string(&mut lisp, "(> 1 2)"), "nil");
        assert_eq!(eval_to_string(&mut lisp, "(= 1 1.0)"), "t");
    }

    #[test]
    fn list_primitives() {
        let mut lisp = quiet();
        assert_eq!(eval_to_string(&mut lisp, "(cons 1 2)"), "(1 . 2)");
        assert_eq!(eval_to_string(&mut lisp, "(car '(1 2))"), "1");
        assert_eq!(eval_to_string(&mut lisp, "(cdr '(1 2))"), "(2)");
        assert_eq!(eval_to_string(&mut lisp, "(list 1 2 3)"), "(1 2 3)");
        assert_eq!(eval_to_string(&mut lisp, "(length '(a b c))"), "3");
        assert_eq!(eval_to_string(&mut lisp, "(length \"abcd\")"), "4");
        assert_eq!(eval_to_string(&mut lisp, "(reverse '(1 2 3))"), "(3 2 1)");
        assert_eq!(eval_to_string(&mut lisp, "(reverse \"abc\")"), "\"cba\"");
    }

    #[test]
    fn mutation_primitives() {
        let mut lisp = quiet();
        assert_eq!(
            eval_to_string(&mut lisp, "(define p (cons 1 2)) (set-car! p 9) p"),
            "(9 . 2)"
        );
        assert_eq!(eval_to_string(&mut lisp, "(set-cdr! p 8) p"), "(9 . 8)");
    }

    #[test]
    fn equality_primitives() {
        let mut lisp = quiet();
        assert_eq!(eval_to_string(&mut lisp, "(eq 'a 'a)"), "t");
        assert_eq!(eval_to_string(&mut lisp, "(eq 'a 'b)"), "nil");
        assert_eq!(eval_to_string(&mut lisp, "(eq 2 2)"), "t");
        assert_eq!(eval_to_string(&mut lisp, "(eq '(1) '(1))"), "nil");
        assert_eq!(eval_to_string(&mut lisp, "(equal '(1 (2)) '(1 (2)))"), "t");
    }

    #[test]
    fn type_of_names() {
        let mut lisp = quiet();
        assert_eq!(eval_to_string(&mut lisp, "(type-of 1)"), "integer");
        assert_eq!(eval_to_string(&mut lisp, "(type-of 1.0)"), "float");
        assert_eq!(eval_to_string(&mut lisp, "(type-of 'a)"), "symbol");
        assert_eq!(eval_to_string(&mut lisp, "(type-of \"s\")"), "string");
        assert_eq!(eval_to_string(&mut lisp, "(type-of '(1))"), "cons");
    }

    #[test]
    fn hash_primitives() {
        let mut lisp = quiet();
        assert_eq!(
            eval_to_string(
                &mut lisp,
                "(define h (hash-create 'a 1 'b 2)) (cdr (hash-lookup h 'a))"
            ),
            "1"
        );
        assert_eq!(
            eval_to_string(&mut lisp, "(hash-insert h 'c 3) (cdr (hash-lookup h 'c))"),
            "3"
        );
        assert_eq!(eval_to_string(&mut lisp, "(hash-lookup h 'zz)"), "nil");
        assert_eq!(eval_to_string(&mut lisp, "(length h)"), "3");
    }

    #[test]
    fn hash_literal_reads_and_looks_up() {
        let mut lisp = quiet();
        assert_eq!(
            eval_to_string(&mut lisp, "(define h { a 1 b 2 }) (cdr (hash-lookup h 'b))"),
            "2"
        );
    }

    #[test]
    fn string_ports() {
        let mut lisp = quiet();
        assert_eq!(
            eval_to_string(
                &mut lisp,
                "(define o (open-output-string))
                 (put o \"hello\")
                 (get-output-string o)"
            ),
            "\"hello\""
        );
        assert_eq!(
            eval_to_string(
                &mut lisp,
                "(define i (open-input-string \"line one\nline two\"))
                 (getline i)"
            ),
            "\"line one\""
        );
        assert_eq!(eval_to_string(&mut lisp, "(getline i)"), "\"line two\"");
        assert_eq!(eval_to_string(&mut lisp, "(getline i)"), "nil");
        assert_eq!(eval_to_string(&mut lisp, "(close i)"), "t");
    }

    #[test]
    fn read_parses_from_strings_and_ports() {
        let mut lisp = quiet();
        assert_eq!(eval_to_string(&mut lisp, "(read \"(1 2 3)\")"), "(1 2 3)");
        assert_eq!(
            eval_to_string(
                &mut lisp,
                "(read (open-input-string \"(a . b)\"))"
            ),
            "(a . b)"
        );
        // Parse failure surfaces as the error singleton.
        let err = lisp.interp().sing.error;
        assert_eq!(lisp.eval_string("(read \")\")").unwrap(), err);
    }

    #[test]
    fn eval_subr() {
        let mut lisp = quiet();
        assert_eq!(eval_to_string(&mut lisp, "(eval '(+ 1 2))"), "3");
        assert_eq!(
            eval_to_string(&mut lisp, "(eval 'x ((lambda (x) (environment)) 5))"),
            "5"
        );
    }

    #[test]
    fn coerce_subr() {
        let mut lisp = quiet();
        assert_eq!(eval_to_string(&mut lisp, "(coerce 'float 3)"), "3e0");
        assert_eq!(eval_to_string(&mut lisp, "(coerce 'integer 3.9)"), "3");
        assert_eq!(eval_to_string(&mut lisp, "(coerce 'string 12)"), "\"12\"");
        assert_eq!(eval_to_string(&mut lisp, "(coerce 'symbol \"abc\")"), "abc");
    }

    #[test]
    fn validation_rejects_bad_arguments() {
        let mut lisp = quiet();
        let err = lisp.interp().sing.error;
        assert_eq!(lisp.eval_string("(+ 'a 1)").unwrap(), err);
        assert_eq!(lisp.eval_string("(car 1)").unwrap(), err);
        assert_eq!(lisp.eval_string("(+ 1)").unwrap(), err);
        assert_eq!(lisp.eval_string("(put 1 \"x\")").unwrap(), err);
    }

    #[test]
    fn constants_are_bound() {
        let mut lisp = quiet();
        assert_eq!(
            eval_to_string(&mut lisp, "(< 3.14 pi)"),
            "t"
        );
        assert_eq!(eval_to_string(&mut lisp, "(type-of *stdin*)"), "io");
        assert_eq!(
            eval_to_string(&mut lisp, "(> most-positive-integer 0)"),
            "t"
        );
    }

    #[test]
    fn logic_and_bitwise_primitives() {
        let mut lisp = quiet();
        assert_eq!(eval_to_string(&mut lisp, "(not nil)"), "t");
        assert_eq!(eval_to_string(&mut lisp, "(not 0)"), "nil");
        assert_eq!(eval_to_string(&mut lisp, "(band 12 10)"), "8");
        assert_eq!(eval_to_string(&mut lisp, "(bor 12 10)"), "14");
        assert_eq!(eval_to_string(&mut lisp, "(bxor 12 10)"), "6");
        assert_eq!(eval_to_string(&mut lisp, "(binvert 0)"), "-1");
        assert_eq!(eval_to_string(&mut lisp, "(min 3 5)"), "3");
        assert_eq!(eval_to_string(&mut lisp, "(max 3 5)"), "5");
        assert_eq!(eval_to_string(&mut lisp, "(min 1.5 2)"), "1.5e0");
    }

    #[test]
    fn string_building_primitives() {
        let mut lisp = quiet();
        assert_eq!(
            eval_to_string(&mut lisp, "(scons \"foo\" \"bar\")"),
            "\"foobar\""
        );
        assert_eq!(eval_to_string(&mut lisp, "(scons 'ab 'cd)"), "\"abcd\"");
        assert_eq!(
            eval_to_string(&mut lisp, "(substring \"hello\" 1)"),
            "\"ello\""
        );
        assert_eq!(
            eval_to_string(&mut lisp, "(substring \"hello\" 1 3)"),
            "\"ell\""
        );
        assert_eq!(
            eval_to_string(&mut lisp, "(substring \"hi\" 10)"),
            "\"\""
        );
    }

    #[test]
    fn assoc_searches_association_lists() {
        let mut lisp = quiet();
        assert_eq!(
            eval_to_string(
                &mut lisp,
                "(assoc 'b (list (cons 'a 1) (cons 'b 2) (cons 'c 3)))"
            ),
            "(b . 2)"
        );
        assert_eq!(
            eval_to_string(&mut lisp, "(assoc 'zz (list (cons 'a 1)))"),
            "nil"
        );
        // The environment itself is an association structure.
        assert_eq!(
            eval_to_string(&mut lisp, "(define marker 42) (cdr (assoc 'marker (top-environment)))"),
            "42"
        );
    }

    #[test]
    fn port_predicates() {
        let mut lisp = quiet();
        assert_eq!(eval_to_string(&mut lisp, "(input? *stdin*)"), "t");
        assert_eq!(eval_to_string(&mut lisp, "(output? *stdin*)"), "nil");
        assert_eq!(eval_to_string(&mut lisp, "(output? *stdout*)"), "t");
        assert_eq!(eval_to_string(&mut lisp, "(input? 5)"), "nil");
        assert_eq!(
            eval_to_string(
                &mut lisp,
                "(define i (open-input-string \"x\")) (eof? i)"
            ),
            "nil"
        );
        assert_eq!(
            eval_to_string(&mut lisp, "(getline i) (getline i) (eof? i)"),
            "t"
        );
    }

    #[test]
    fn documentation_strings_are_attached() {
        let mut lisp = quiet();
        assert_eq!(
            eval_to_string(&mut lisp, "(documentation-string (lambda \"squares\" (x) (* x x)))"),
            "\"squares\""
        );
        assert_eq!(
            eval_to_string(&mut lisp, "(documentation-string car)"),
            "\"first field of a pair\""
        );
        // A lambda without a docstring carries the shared empty one.
        assert_eq!(
            eval_to_string(&mut lisp, "(documentation-string (lambda (x) x))"),
            "\"\""
        );
    }

    #[test]
    fn explicit_gc_is_safe_mid_script() {
        let mut lisp = quiet();
        assert_eq!(
            eval_to_string(&mut lisp, "(define keep '(1 2 3)) (gc) keep"),
            "(1 2 3)"
        );
    }
}
