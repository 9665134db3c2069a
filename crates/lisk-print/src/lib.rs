//! lisk-print - S-expression serializer and the `%`-directive formatter.
//!
//! The printer writes cells to I/O ports through a printf-like format
//! language. Directives:
//!
//! | Directive | Effect                                              |
//! |-----------|-----------------------------------------------------|
//! | `%%`      | literal percent                                     |
//! | `%@c`     | the next character `c`, emitted `depth` times       |
//! | `%c`      | one byte                                            |
//! | `%s`      | byte string                                         |
//! | `%d`      | signed integer                                      |
//! | `%f`      | float in `%e` style                                 |
//! | `%S`      | recursive S-expression print                        |
//! | `%H`      | hash-table print `{ k1 v1 … }`                      |
//! | `%t %B %v %k %r %g %y %b %m %a %w` | ANSI style/color escape, only when the port's `color` flag is set |
//!
//! Cons printing carries a cycle guard built on the per-cell mark bit: a
//! cell visited twice inside one top-level print renders as
//! `<recurse:ADDR>`, and every mark taken is cleared before the top-level
//! call returns (the collector never runs concurrently, so the bit cannot
//! be confused with a GC mark).

use lisk_core::{CellKind, CellRef, Interp, LispError, LogLevel, Result, MAX_RECURSION_DEPTH};

/// One typed argument to [`printerf`].
pub enum Arg<'a> {
    /// `%c`
    C(u8),
    /// `%s`
    S(&'a [u8]),
    /// `%d`
    D(i64),
    /// `%f`
    F(f64),
    /// `%S` and `%H`
    Cell(CellRef),
}

/// Writes bytes to an output port cell, mapping failure to a resource
/// error.
fn put(l: &mut Interp, port: CellRef, bytes: &[u8]) -> Result<()> {
    if !l.port_mut(port).puts(bytes) {
        return Err(LispError::Resource("write to output port failed".into()));
    }
    Ok(())
}

fn putc(l: &mut Interp, port: CellRef, byte: u8) -> Result<()> {
    put(l, port, &[byte])
}

fn color_escape(code: char) -> Option<&'static str> {
    Some(match code {
        't' => "\x1b[0m",
        'B' => "\x1b[1m",
        'v' => "\x1b[7m",
        'k' => "\x1b[30m",
        'r' => "\x1b[31m",
        'g' => "\x1b[32m",
        'y' => "\x1b[33m",
        'b' => "\x1b[34m",
        'm' => "\x1b[35m",
        'a' => "\x1b[36m",
        'w' => "\x1b[37m",
        _ => return None,
    })
}

/// The `%`-directive formatter. `depth` feeds the `%@` indentation
/// directive and the recursive `%S` print.
pub fn printerf(
    l: &mut Interp,
    port: CellRef,
    depth: usize,
    fmt: &str,
    args: &[Arg<'_>],
) -> Result<()> {
    let mut chars = fmt.chars();
    let mut argi = 0;
    let mut next_arg = |argi: &mut usize| -> &Arg<'_> {
        let a = args
            .get(*argi)
            .unwrap_or_else(|| panic!("internal inconsistency: format argument missing"));
        *argi += 1;
        a
    };
    while let Some(c) = chars.next() {
        if c != '%' {
            let mut buf = [0u8; 4];
            put(l, port, c.encode_utf8(&mut buf).as_bytes())?;
            continue;
        }
        let Some(d) = chars.next() else { break };
        match d {
            '%' => putc(l, port, b'%')?,
            '@' => {
                let Some(rep) = chars.next() else { break };
                for _ in 0..depth {
                    putc(l, port, rep as u8)?;
                }
            }
            'c' => match next_arg(&mut argi) {
                Arg::C(b) => putc(l, port, *b)?,
                _ => panic!("internal inconsistency: %c expects a byte"),
            },
            's' => match next_arg(&mut argi) {
                Arg::S(s) => put(l, port, s)?,
                _ => panic!("internal inconsistency: %s expects bytes"),
            },
            'd' => match next_arg(&mut argi) {
                Arg::D(n) => put(l, port, format!("{n}").as_bytes())?,
                _ => panic!("internal inconsistency: %d expects an integer"),
            },
            'f' => match next_arg(&mut argi) {
                Arg::F(f) => put(l, port, format!("{f:e}").as_bytes())?,
                _ => panic!("internal inconsistency: %f expects a float"),
            },
            'S' => match next_arg(&mut argi) {
                Arg::Cell(r) => printer(l, port, *r, depth)?,
                _ => panic!("internal inconsistency: %S expects a cell"),
            },
            'H' => match next_arg(&mut argi) {
                Arg::Cell(r) => {
                    let mut marked = Vec::new();
                    let ret = print_hash(l, port, *r, depth, &mut marked);
                    clear_marks(l, &marked);
                    ret?
                }
                _ => panic!("internal inconsistency: %H expects a hash cell"),
            },
            other => {
                if l.port_ref(port).color {
                    if let Some(esc) = color_escape(other) {
                        put(l, port, esc.as_bytes())?;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Serializes one cell to `port`. This is the `%S` entry point; it owns
/// the cycle-guard marks for the duration of the call.
pub fn printer(l: &mut Interp, port: CellRef, cell: CellRef, depth: usize) -> Result<()> {
    let mut marked = Vec::new();
    let ret = print_inner(l, port, cell, depth, &mut marked);
    clear_marks(l, &marked);
    ret
}

fn clear_marks(l: &mut Interp, marked: &[CellRef]) {
    for &m in marked {
        l.set_cell_mark(m, false);
    }
}

fn print_inner(
    l: &mut Interp,
    port: CellRef,
    op: CellRef,
    depth: usize,
    marked: &mut Vec<CellRef>,
) -> Result<()> {
    if depth > MAX_RECURSION_DEPTH {
        printerf(l, port, 0, "%r<print-depth-exceeded:%d>%t", &[Arg::D(depth as i64)])?;
        return Err(LispError::Depth(depth));
    }
    match l.kind(op) {
        CellKind::Integer(n) => {
            let n = *n;
            printerf(l, port, depth, "%m%d", &[Arg::D(n)])?;
        }
        CellKind::Float(f) => {
            let f = *f;
            printerf(l, port, depth, "%m%f", &[Arg::F(f)])?;
        }
        CellKind::Symbol(_) => {
            if l.is_nil(op) {
                printerf(l, port, depth, "%rnil", &[])?;
            } else {
                let name = l.bytes(op).to_vec();
                printerf(l, port, depth, "%y%s", &[Arg::S(&name)])?;
            }
        }
        CellKind::Str(_) => {
            let bytes = l.bytes(op).to_vec();
            print_escaped_string(l, port, depth, &bytes)?;
        }
        CellKind::Cons(..) => print_cons(l, port, op, depth, marked)?,
        CellKind::Subr(_) => {
            let addr = l.address_of(op) as i64;
            printerf(l, port, depth, "%B<subroutine:%d>", &[Arg::D(addr)])?;
        }
        CellKind::Proc(p) | CellKind::FProc(p) => {
            let is_proc = matches!(l.kind(op), CellKind::Proc(_));
            let (doc, args, mut code) = (p.doc, p.args, p.code);
            printerf(
                l,
                port,
                depth + 1,
                if is_proc {
                    "(%ylambda%t %S %S "
                } else {
                    "(%yflambda%t %S %S "
                },
                &[Arg::Cell(doc), Arg::Cell(args)],
            )?;
            while !l.is_nil(code) && l.is_cons(code) {
                let form = l.car(code);
                print_inner(l, port, form, depth + 1, marked)?;
                code = l.cdr(code);
                if !l.is_nil(code) {
                    putc(l, port, b' ')?;
                }
            }
            putc(l, port, b')')?;
        }
        CellKind::Hash(_) => print_hash(l, port, op, depth, marked)?,
        CellKind::Io(_) => {
            let state: &[u8] = if l.is_closed(op) {
                b"closed"
            } else if l.is_in(op) {
                b"in"
            } else {
                b"out"
            };
            let addr = l.address_of(op) as i64;
            printerf(
                l,
                port,
                depth,
                "%B<io:%s:%d>",
                &[Arg::S(state), Arg::D(addr)],
            )?;
        }
        CellKind::User(u) => {
            let tag = u.tag;
            let rendered = l
                .user_ops(tag)
                .and_then(|t| t.print)
                .map(|p| p(&*l.user_ref(op).data));
            match rendered {
                Some(s) => put(l, port, s.as_bytes())?,
                None => {
                    let addr = l.address_of(op) as i64;
                    printerf(
                        l,
                        port,
                        depth,
                        "<user:%d:%d>",
                        &[Arg::D(tag.0 as i64), Arg::D(addr)],
                    )?;
                }
            }
        }
    }
    printerf(l, port, depth, "%t", &[])
}

fn print_cons(
    l: &mut Interp,
    port: CellRef,
    mut op: CellRef,
    depth: usize,
    marked: &mut Vec<CellRef>,
) -> Result<()> {
    if l.cell_mark(op) {
        let addr = l.address_of(op) as i64;
        return printerf(l, port, depth, "%r<recurse:%d>%t", &[Arg::D(addr)]);
    }
    if depth > 0 && l.port_ref(port).pretty {
        printerf(l, port, depth, "\n%@ ", &[])?;
    }
    putc(l, port, b'(')?;
    loop {
        l.set_cell_mark(op, true);
        marked.push(op);
        let head = l.car(op);
        print_inner(l, port, head, depth + 1, marked)?;
        let tail = l.cdr(op);
        if l.is_nil(tail) {
            return putc(l, port, b')');
        }
        if !l.is_cons(tail) {
            put(l, port, b" . ")?;
            print_inner(l, port, tail, depth, marked)?;
            return putc(l, port, b')');
        }
        if l.cell_mark(tail) {
            let addr = l.address_of(tail) as i64;
            printerf(l, port, depth, " . %r<recurse:%d>%t", &[Arg::D(addr)])?;
            return putc(l, port, b')');
        }
        putc(l, port, b' ')?;
        op = tail;
    }
}

fn print_hash(
    l: &mut Interp,
    port: CellRef,
    hash: CellRef,
    depth: usize,
    marked: &mut Vec<CellRef>,
) -> Result<()> {
    putc(l, port, b'{')?;
    let pairs: Vec<(Vec<u8>, CellRef)> = l
        .hash_ref(hash)
        .iter()
        .map(|(k, v)| (k.to_vec(), v))
        .collect();
    for (key, val) in pairs {
        putc(l, port, b' ')?;
        // Stored values are usually (key . value) pairs; a symbol car
        // prints bare, otherwise the key prints as a string.
        if l.is_cons(val) && l.is_sym(l.car(val)) {
            let sym = l.car(val);
            print_inner(l, port, sym, depth, marked)?;
        } else {
            print_escaped_string(l, port, depth, &key)?;
        }
        printerf(l, port, depth, "%t ", &[])?;
        let v = if l.is_cons(val) { l.cdr(val) } else { val };
        print_inner(l, port, v, depth, marked)?;
    }
    put(l, port, b" }")?;
    Ok(())
}

/// Prints a string literal with `\` `\n` `\t` `\r` `"` escaped and
/// non-printable bytes rendered as three-digit octal escapes.
fn print_escaped_string(l: &mut Interp, port: CellRef, depth: usize, s: &[u8]) -> Result<()> {
    printerf(l, port, depth, "%r\"", &[])?;
    for &c in s {
        match c {
            b'\\' => printerf(l, port, depth, "%m\\\\%r", &[])?,
            b'\n' => printerf(l, port, depth, "%m\\n%r", &[])?,
            b'\t' => printerf(l, port, depth, "%m\\t%r", &[])?,
            b'\r' => printerf(l, port, depth, "%m\\r%r", &[])?,
            b'"' => printerf(l, port, depth, "%m\\\"%r", &[])?,
            c if c.is_ascii_graphic() || c == b' ' => putc(l, port, c)?,
            c => {
                let oct = format!("\\{:03o}", c);
                printerf(l, port, depth, "%m%s%r", &[Arg::S(oct.as_bytes())])?;
            }
        }
    }
    putc(l, port, b'"')
}

/// Prints a structured message to the interpreter's log port when the log
/// level admits it. Failures to write the log are ignored; logging must
/// never turn into a second error.
pub fn report(l: &mut Interp, level: LogLevel, fmt: &str, args: &[Arg<'_>]) {
    if !l.should_log(level) {
        return;
    }
    let port = l.logging;
    let _ = printerf(l, port, 0, fmt, args);
    let _ = printerf(l, port, 0, "\n", &[]);
    l.port_mut(port).flush();
}

/// Serializes `cell` into a fresh string buffer (host convenience and
/// test hook).
pub fn print_to_string(l: &mut Interp, cell: CellRef) -> Result<Vec<u8>> {
    let port = l.mk_io(lisk_io::Port::string_output());
    printer(l, port, cell, 0)?;
    let bytes = l
        .port_ref(port)
        .string_contents()
        .map(|b| b.to_vec())
        .unwrap_or_default();
    l.close_cell(port);
    Ok(bytes)
}
