//! Argument validation against a format string.
//!
//! A callable may carry a format describing the expected argument count
//! and types, one code per argument with spaces as separators. On a
//! mismatch a structured error naming the expected length, the expected
//! kinds and the offending argument list goes to the log port, and a
//! recoverable type error is raised.

use lisk_core::{CellRef, Interp, LispError, LogLevel, Result};
use lisk_print::{report, Arg};

/// True when `arg` satisfies the format code.
fn code_matches(l: &Interp, code: char, arg: CellRef) -> Result<bool> {
    Ok(match code {
        's' => l.is_sym(arg),
        'd' => l.is_int(arg),
        'c' => l.is_cons(arg),
        'L' => l.is_cons(arg) || l.is_nil(arg),
        'p' => l.is_proc(arg),
        'r' => l.is_subr(arg),
        'S' => l.is_str(arg),
        'P' => l.is_io(arg),
        'h' => l.is_hash(arg),
        'F' => l.is_fproc(arg),
        'f' => l.is_float(arg),
        'u' => l.is_user(arg),
        'b' => l.is_nil(arg) || arg == l.sing.tee,
        'i' => l.is_in(arg),
        'o' => l.is_out(arg),
        'Z' => l.is_asciiz(arg),
        'a' => l.is_arith(arg),
        'x' => l.is_callable(arg),
        'I' => l.is_in(arg) || l.is_str(arg),
        'l' => l.is_proc(arg) || l.is_fproc(arg),
        'C' => l.is_sym(arg) || l.is_str(arg) || l.is_int(arg),
        'A' => true,
        _ => {
            return Err(LispError::fatal(format!(
                "invalid validation format character '{code}'"
            )))
        }
    })
}

/// The kind a format code stands for, used in the structured error.
fn code_name(code: char) -> &'static str {
    match code {
        's' => "symbol",
        'd' => "integer",
        'c' => "cons",
        'L' => "cons-or-nil",
        'p' => "procedure",
        'r' => "subroutine",
        'S' => "string",
        'P' => "io-port",
        'h' => "hash",
        'F' => "f-expr",
        'f' => "float",
        'u' => "user-defined",
        'b' => "t-or-nil",
        'i' => "input-port",
        'o' => "output-port",
        'Z' => "symbol-or-string",
        'a' => "integer-or-float",
        'x' => "function",
        'I' => "input-port-or-string",
        'l' => "procedure-or-f-expr",
        'C' => "symbol-string-or-integer",
        'A' => "any-expression",
        _ => "invalid",
    }
}

fn report_mismatch(l: &mut Interp, name: &str, len: usize, fmt: &str, args: CellRef) {
    let kinds: Vec<&str> = fmt
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(code_name)
        .collect();
    let kinds = kinds.join(" ");
    report(
        l,
        LogLevel::Error,
        "(%rerror%t \"incorrect arguments\" %s %d (%s) %S)",
        &[
            Arg::S(name.as_bytes()),
            Arg::D(len as i64),
            Arg::S(kinds.as_bytes()),
            Arg::Cell(args),
        ],
    );
}

/// Validates `args` (a proper list) against `fmt`, expecting exactly
/// `len` arguments. `name` identifies the callable in the error report.
pub fn validate_args(
    l: &mut Interp,
    name: &str,
    len: usize,
    fmt: &str,
    args: CellRef,
) -> Result<()> {
    let fail = |l: &mut Interp| {
        report_mismatch(l, name, len, fmt, args);
        Err(LispError::Type(format!("incorrect arguments to {name}")))
    };
    if !l.check_length(args, len) {
        return fail(l);
    }
    let mut rest = args;
    for code in fmt.chars().filter(|c| !c.is_whitespace()) {
        if l.is_nil(rest) {
            return fail(l);
        }
        let arg = l.car(rest);
        if !code_matches(l, code, arg)? {
            return fail(l);
        }
        rest = l.cdr(rest);
    }
    Ok(())
}

/// Runs a subroutine's own validation format, when it carries one.
pub fn validate_cell(l: &mut Interp, callable: CellRef, args: CellRef) -> Result<()> {
    if !l.is_subr(callable) {
        return Ok(());
    }
    let subr = l.subr_ref(callable);
    let Some(fmt) = subr.fmt.as_deref().map(str::to_owned) else {
        return Ok(());
    };
    let len = subr.arity;
    validate_args(l, "subroutine", len, &fmt, args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> Interp {
        let mut l = Interp::new();
        l.set_log_level(LogLevel::Off);
        l
    }

    #[test]
    fn matching_arguments_pass() {
        let mut l = quiet();
        let args = {
            let a = l.mk_int(1);
            let b = l.mk_str("x");
            l.mk_list(&[a, b])
        };
        assert!(validate_args(&mut l, "f", 2, "d S", args).is_ok());
    }

    #[test]
    fn wrong_type_fails() {
        let mut l = quiet();
        let args = {
            let a = l.mk_str("oops");
            l.mk_list(&[a])
        };
        assert!(matches!(
            validate_args(&mut l, "f", 1, "d", args),
            Err(LispError::Type(_))
        ));
    }

    #[test]
    fn wrong_length_fails() {
        let mut l = quiet();
        let args = {
            let a = l.mk_int(1);
            l.mk_list(&[a])
        };
        assert!(validate_args(&mut l, "f", 2, "d d", args).is_err());
        let nil = l.sing.nil;
        assert!(validate_args(&mut l, "f", 1, "d", nil).is_err());
    }

    #[test]
    fn group_codes() {
        let mut l = quiet();
        let sym = l.intern(b"s");
        let s = l.mk_str("s");
        let n = l.mk_int(1);
        let f = l.mk_float(1.0);

        for (cell, yes) in [(sym, true), (s, true), (n, false)] {
            let args = l.mk_list(&[cell]);
            assert_eq!(validate_args(&mut l, "f", 1, "Z", args).is_ok(), yes);
        }
        for (cell, yes) in [(n, true), (f, true), (s, false)] {
            let args = l.mk_list(&[cell]);
            assert_eq!(validate_args(&mut l, "f", 1, "a", args).is_ok(), yes);
        }
        for (cell, yes) in [(sym, true), (s, true), (n, true), (f, false)] {
            let args = l.mk_list(&[cell]);
            assert_eq!(validate_args(&mut l, "f", 1, "C", args).is_ok(), yes);
        }
    }

    #[test]
    fn boolean_code_accepts_only_nil_and_t() {
        let mut l = quiet();
        for (cell, yes) in [(l.sing.nil, true), (l.sing.tee, true)] {
            let args = l.mk_list(&[cell]);
            assert_eq!(validate_args(&mut l, "f", 1, "b", args).is_ok(), yes);
        }
        let n = l.mk_int(0);
        let args = l.mk_list(&[n]);
        assert!(validate_args(&mut l, "f", 1, "b", args).is_err());
    }

    #[test]
    fn list_code_accepts_nil() {
        let mut l = quiet();
        let args = l.mk_list(&[l.sing.nil]);
        assert!(validate_args(&mut l, "f", 1, "L", args).is_ok());
        let inner = {
            let a = l.mk_int(1);
            l.mk_list(&[a])
        };
        let args = l.mk_list(&[inner]);
        assert!(validate_args(&mut l, "f", 1, "L", args).is_ok());
    }

    #[test]
    fn port_codes_respect_direction_and_closed() {
        let mut l = quiet();
        let inp = l.mk_io(lisk_io::Port::string_input("x"));
        let out = l.mk_io(lisk_io::Port::string_output());

        let args = l.mk_list(&[inp]);
        assert!(validate_args(&mut l, "f", 1, "i", args).is_ok());
        assert!(validate_args(&mut l, "f", 1, "o", args).is_err());
        assert!(validate_args(&mut l, "f", 1, "P", args).is_ok());

        let args = l.mk_list(&[out]);
        assert!(validate_args(&mut l, "f", 1, "o", args).is_ok());

        l.close_cell(inp);
        let args = l.mk_list(&[inp]);
        assert!(validate_args(&mut l, "f", 1, "P", args).is_err());
    }

    #[test]
    fn any_code_accepts_everything() {
        let mut l = quiet();
        for cell in [l.sing.nil, l.sing.tee] {
            let args = l.mk_list(&[cell]);
            assert!(validate_args(&mut l, "f", 1, "A", args).is_ok());
        }
    }

    #[test]
    fn invalid_format_character_is_fatal() {
        let mut l = quiet();
        let n = l.mk_int(1);
        let args = l.mk_list(&[n]);
        let err = validate_args(&mut l, "f", 1, "q", args).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn validate_cell_skips_unformatted_subrs() {
        fn stub(l: &mut Interp, _a: CellRef) -> Result<CellRef> {
            Ok(l.sing.nil)
        }
        let mut l = quiet();
        let s = l.mk_subr(stub, None, None);
        let n = l.mk_int(1);
        let args = l.mk_list(&[n]);
        assert!(validate_cell(&mut l, s, args).is_ok());

        let s = l.mk_subr(stub, Some("d d"), None);
        assert!(validate_cell(&mut l, s, args).is_err());
        let args = {
            let a = l.mk_int(1);
            let b = l.mk_int(2);
            l.mk_list(&[a, b])
        };
        assert!(validate_cell(&mut l, s, args).is_ok());
    }
}
