//! The evaluator core.

use lisk_core::env::{assoc, extend, extend_top};
use lisk_core::{CellKind, CellRef, Interp, LispError, LogLevel, Result};
use lisk_print::{report, Arg};
use log::trace;

use crate::valid::validate_cell;

/// Reports a recoverable evaluation failure on the log port and builds
/// the error value.
fn recover(l: &mut Interp, fmt: &str, args: &[Arg<'_>], err: LispError) -> LispError {
    report(l, LogLevel::Error, fmt, args);
    err
}

/// Evaluates `exp` in `env`. `depth` is the current recursion depth; the
/// host-facing entry points start it at zero.
///
/// The root-stack length is saved on entry and restored on exit, with the
/// result re-protected, so temporaries created by one evaluation frame
/// are released when the frame returns.
pub fn eval(l: &mut Interp, depth: usize, exp: CellRef, env: CellRef) -> Result<CellRef> {
    let gc_save = l.gc_save();
    l.gc_add(exp);
    l.gc_add(env);
    let ret = eval_loop(l, depth, exp, env, gc_save);
    l.gc_restore(gc_save);
    if let Ok(v) = &ret {
        l.gc_add(*v);
    }
    ret
}

/// Evaluates every element of `exps` left to right, producing a fresh
/// argument list.
pub fn evlis(l: &mut Interp, depth: usize, exps: CellRef, env: CellRef) -> Result<CellRef> {
    let mut rest = exps;
    let mut vals = Vec::new();
    while l.is_cons(rest) {
        let head = l.car(rest);
        vals.push(eval(l, depth + 1, head, env)?);
        rest = l.cdr(rest);
    }
    if !l.is_nil(rest) {
        return Err(recover(
            l,
            "%r\"cannot evaluate dotted argument list\"%t\n '%S",
            &[Arg::Cell(exps)],
            LispError::Type("cannot evaluate a dotted argument list".into()),
        ));
    }
    Ok(l.mk_list(&vals))
}

/// Truncates the root stack to the frame entry point at a tail hop,
/// keeping the live expression and environment protected.
fn truncate_roots(l: &mut Interp, gc_save: usize, exp: CellRef, env: CellRef) {
    l.gc_restore(gc_save);
    l.gc_add(exp);
    l.gc_add(env);
}

fn eval_loop(
    l: &mut Interp,
    depth: usize,
    mut exp: CellRef,
    mut env: CellRef,
    gc_save: usize,
) -> Result<CellRef> {
    if depth > l.max_depth {
        return Err(recover(
            l,
            "%y'recursion-depth-reached%t %d",
            &[Arg::D(depth as i64)],
            LispError::Depth(depth),
        ));
    }
    loop {
        // The interrupt flag is checked on entry and again at every tail
        // hop; a set flag is consumed and raised as error code 1.
        let sig = l.take_signal();
        if sig != 0 {
            return Err(recover(
                l,
                "%y'signal-caught%t %d",
                &[Arg::D(sig as i64)],
                LispError::Signal,
            ));
        }
        trace!("eval depth={depth}");
        if l.is_nil(exp) {
            return Ok(exp);
        }
        match l.kind(exp) {
            // Self-evaluating types.
            CellKind::Integer(_)
            | CellKind::Float(_)
            | CellKind::Str(_)
            | CellKind::Io(_)
            | CellKind::Hash(_)
            | CellKind::Subr(_)
            | CellKind::Proc(_)
            | CellKind::FProc(_)
            | CellKind::User(_) => return Ok(exp),
            CellKind::Symbol(_) => {
                let Some(pair) = assoc(l, exp, env) else {
                    let name = l.name(exp);
                    return Err(recover(
                        l,
                        "%r\"unbound symbol\"%t %y'%s%t",
                        &[Arg::S(name.as_bytes())],
                        LispError::Unbound(name.clone()),
                    ));
                };
                return Ok(l.cdr(pair));
            }
            CellKind::Cons(..) => {
                let mut first = l.car(exp);
                let args = l.cdr(exp);
                if !l.is_nil(args) && !l.is_proper_list(args) {
                    return Err(recover(
                        l,
                        "%r\"cannot evaluate a dotted pair\"%t\n '%S",
                        &[Arg::Cell(exp)],
                        LispError::Type("cannot evaluate a dotted pair".into()),
                    ));
                }
                // A cons operator is evaluated down to a first-class
                // callable before special-form dispatch.
                if l.is_cons(first) {
                    first = eval(l, depth + 1, first, env)?;
                }

                if first == l.sing.iff {
                    exp = eval_if(l, depth, args, env)?;
                    truncate_roots(l, gc_save, exp, env);
                    continue;
                }
                if first == l.sing.lambda {
                    let proc = eval_lambda(l, args, env)?;
                    l.gc_restore(gc_save);
                    return Ok(l.gc_add(proc));
                }
                if first == l.sing.flambda {
                    let fproc = eval_flambda(l, args, env)?;
                    l.gc_restore(gc_save);
                    return Ok(l.gc_add(fproc));
                }
                if first == l.sing.cond {
                    match eval_cond(l, depth, args, env)? {
                        Some(body) => {
                            exp = body;
                            truncate_roots(l, gc_save, exp, env);
                            continue;
                        }
                        None => return Ok(l.sing.nil),
                    }
                }
                if first == l.sing.quote {
                    if !l.check_length(args, 1) {
                        return Err(arity_error(l, "quote", exp));
                    }
                    return Ok(l.car(args));
                }
                if first == l.sing.environment {
                    if !l.is_nil(args) {
                        return Err(arity_error(l, "environment", exp));
                    }
                    return Ok(env);
                }
                if first == l.sing.error {
                    return Err(eval_error_form(l, args, exp));
                }
                if first == l.sing.define {
                    if !l.check_length(args, 2) || !l.is_sym(l.car(args)) {
                        return Err(arity_error(l, "define", exp));
                    }
                    let sym = l.car(args);
                    let vform = l.car(l.cdr(args));
                    let val = eval(l, depth + 1, vform, env)?;
                    extend_top(l, sym, val);
                    l.gc_restore(gc_save);
                    return Ok(l.gc_add(val));
                }
                if first == l.sing.setq {
                    if !l.check_length(args, 2) || !l.is_sym(l.car(args)) {
                        return Err(arity_error(l, "set!", exp));
                    }
                    let sym = l.car(args);
                    let Some(pair) = assoc(l, sym, env) else {
                        let name = l.name(sym);
                        return Err(recover(
                            l,
                            "%y'set!%t %r\"undefined variable\"%t %y'%s%t",
                            &[Arg::S(name.as_bytes())],
                            LispError::Unbound(name.clone()),
                        ));
                    };
                    let vform = l.car(l.cdr(args));
                    let newval = eval(l, depth + 1, vform, env)?;
                    l.set_cdr(pair, newval);
                    return Ok(newval);
                }
                if first == l.sing.let_ {
                    let (new_env, body) = eval_let(l, depth, args, env, exp)?;
                    env = new_env;
                    // All body forms but the last run here; the last is
                    // the tail.
                    let mut forms = body;
                    while l.is_cons(forms) && !l.is_nil(l.cdr(forms)) {
                        let form = l.car(forms);
                        eval(l, depth + 1, form, env)?;
                        forms = l.cdr(forms);
                    }
                    exp = l.car(forms);
                    truncate_roots(l, gc_save, exp, env);
                    continue;
                }
                if first == l.sing.progn {
                    if l.is_nil(args) {
                        return Ok(l.sing.nil);
                    }
                    let mut forms = args;
                    while !l.is_nil(l.cdr(forms)) {
                        truncate_roots(l, gc_save, forms, env);
                        let form = l.car(forms);
                        eval(l, depth + 1, form, env)?;
                        forms = l.cdr(forms);
                    }
                    exp = l.car(forms);
                    truncate_roots(l, gc_save, exp, env);
                    continue;
                }
                if first == l.sing.while_ {
                    if !l.is_cons(args) {
                        return Err(arity_error(l, "while", exp));
                    }
                    let test = l.car(args);
                    let body = l.cdr(args);
                    loop {
                        let t = eval(l, depth + 1, test, env)?;
                        if l.is_nil(t) {
                            break;
                        }
                        truncate_roots(l, gc_save, exp, env);
                        let mut forms = body;
                        while l.is_cons(forms) {
                            let form = l.car(forms);
                            eval(l, depth + 1, form, env)?;
                            forms = l.cdr(forms);
                        }
                        if !l.is_nil(forms) {
                            return Err(recover(
                                l,
                                "%y'while%t %r\"cannot evaluate dotted pairs\"%t\n '%S",
                                &[Arg::Cell(body)],
                                LispError::Type("while body is a dotted pair".into()),
                            ));
                        }
                    }
                    return Ok(l.sing.nil);
                }

                // Ordinary application.
                let proc = eval(l, depth + 1, first, env)?;
                let vals = if l.is_proc(proc) || l.is_subr(proc) {
                    evlis(l, depth + 1, args, env)?
                } else if l.is_fproc(proc) {
                    // F-expressions receive the unevaluated argument
                    // list wrapped in a one-element list.
                    let nil = l.sing.nil;
                    l.cons(args, nil)
                } else {
                    return Err(recover(
                        l,
                        "%r\"not a procedure\"%t\n '%S",
                        &[Arg::Cell(first)],
                        LispError::Type("not a procedure".into()),
                    ));
                };
                l.cur_depth = depth;

                if l.is_subr(proc) {
                    l.gc_restore(gc_save);
                    l.gc_add(proc);
                    l.gc_add(vals);
                    validate_cell(l, proc, vals)?;
                    let func = l.subr_ref(proc).func;
                    return func(l, vals);
                }

                // Proc or FProc: bind parameters and tail into the body.
                let p = l.proc_ref(proc);
                let (params, code, captured, arity, variadic) =
                    (p.args, p.code, p.env, p.arity, p.variadic);
                let nvals = l.list_length(vals);
                let arity_ok = if variadic { nvals >= arity } else { nvals == arity };
                if !arity_ok {
                    return Err(recover(
                        l,
                        "%y'arg-error%t\n %S\n '%S",
                        &[Arg::Cell(proc), Arg::Cell(vals)],
                        LispError::Arity(format!(
                            "expected {}{} arguments, got {}",
                            arity,
                            if variadic { "+" } else { "" },
                            nvals
                        )),
                    ));
                }
                let base = if l.dynamic_scope { env } else { captured };
                env = bind_params(l, base, params, vals);
                let progn = l.sing.progn;
                exp = l.cons(progn, code);
                truncate_roots(l, gc_save, exp, env);
            }
        }
    }
}

/// `(if test consequent alternate)`: returns the branch to evaluate in
/// tail position.
fn eval_if(l: &mut Interp, depth: usize, args: CellRef, env: CellRef) -> Result<CellRef> {
    if !l.check_length(args, 3) {
        return Err(arity_error(l, "if", args));
    }
    let test = l.car(args);
    let t = eval(l, depth + 1, test, env)?;
    Ok(if !l.is_nil(t) {
        l.car(l.cdr(args))
    } else {
        l.car(l.cdr(l.cdr(args)))
    })
}

/// `(lambda doc? (params…) body…)`: builds a procedure capturing `env`.
fn eval_lambda(l: &mut Interp, args: CellRef, env: CellRef) -> Result<CellRef> {
    if l.list_length(args) < 2 {
        return Err(arity_error(l, "lambda", args));
    }
    let (doc, rest) = if l.is_str(l.car(args)) {
        (l.car(args), l.cdr(args))
    } else {
        (l.empty_doc, args)
    };
    if l.list_length(rest) < 2 {
        return Err(arity_error(l, "lambda", args));
    }
    let params = l.car(rest);
    check_param_list(l, params, args)?;
    let code = l.cdr(rest);
    Ok(l.mk_proc(params, code, env, doc))
}

/// `(flambda doc (arg) body…)`: builds an f-expression whose single
/// parameter receives the unevaluated argument list.
fn eval_flambda(l: &mut Interp, args: CellRef, env: CellRef) -> Result<CellRef> {
    if l.list_length(args) < 3 || !l.is_str(l.car(args)) || !l.is_cons(l.car(l.cdr(args))) {
        return Err(recover(
            l,
            "%y'flambda%t %r\"expected (string (arg) code...)\"%t\n '%S",
            &[Arg::Cell(args)],
            LispError::Type("flambda expects (doc (arg) body...)".into()),
        ));
    }
    let doc = l.car(args);
    let params = l.car(l.cdr(args));
    if !l.check_length(params, 1) || !l.is_sym(l.car(params)) {
        return Err(recover(
            l,
            "%y'flambda%t %r\"only one symbol argument allowed\"%t\n '%S",
            &[Arg::Cell(args)],
            LispError::Type("flambda takes exactly one symbol parameter".into()),
        ));
    }
    let code = l.cdr(l.cdr(args));
    Ok(l.mk_fproc(params, code, env, doc))
}

/// `(cond (test body)…)`: evaluates tests in order; returns the body of
/// the first non-nil test for tail evaluation, or `None` on exhaustion.
fn eval_cond(
    l: &mut Interp,
    depth: usize,
    args: CellRef,
    env: CellRef,
) -> Result<Option<CellRef>> {
    let mut clauses = args;
    while !l.is_nil(clauses) {
        let clause = l.car(clauses);
        if !l.is_cons(clause) || !l.check_length(clause, 2) {
            return Ok(None);
        }
        let test = l.car(clause);
        let t = eval(l, depth + 1, test, env)?;
        if !l.is_nil(t) {
            return Ok(Some(l.car(l.cdr(clause))));
        }
        clauses = l.cdr(clauses);
    }
    Ok(None)
}

/// `(error)` raises -1 (fatal); `(error n)` raises `n`.
fn eval_error_form(l: &mut Interp, args: CellRef, exp: CellRef) -> LispError {
    if l.check_length(args, 1) && l.is_int(l.car(args)) {
        return LispError::Thrown(l.int_val(l.car(args)));
    }
    if l.is_nil(args) {
        return LispError::Thrown(-1);
    }
    recover(
        l,
        "%y'error%t %r\"expected () or (integer)\"%t '%S",
        &[Arg::Cell(exp)],
        LispError::Type("error expects () or (integer)".into()),
    )
}

/// `(let ((sym val)…) body…)`: creates each binding as nil, evaluates its
/// value with the binding visible (so definitions can be recursive), and
/// mutates the pair in place. Returns the extended environment and the
/// body forms.
fn eval_let(
    l: &mut Interp,
    depth: usize,
    args: CellRef,
    mut env: CellRef,
    exp: CellRef,
) -> Result<(CellRef, CellRef)> {
    if l.list_length(args) < 2 {
        return Err(arity_error(l, "let", exp));
    }
    let mut bindings = l.car(args);
    let body = l.cdr(args);
    if !l.is_nil(bindings) && !l.is_cons(bindings) {
        return Err(let_shape_error(l, exp));
    }
    while l.is_cons(bindings) {
        let binding = l.car(bindings);
        if !l.is_cons(binding) || !l.check_length(binding, 2) || !l.is_sym(l.car(binding)) {
            return Err(let_shape_error(l, exp));
        }
        let sym = l.car(binding);
        let vform = l.car(l.cdr(binding));
        let nil = l.sing.nil;
        env = extend(l, env, sym, nil);
        let pair = l.car(env);
        let val = eval(l, depth + 1, vform, env)?;
        l.set_cdr(pair, val);
        bindings = l.cdr(bindings);
    }
    Ok((env, body))
}

fn let_shape_error(l: &mut Interp, exp: CellRef) -> LispError {
    recover(
        l,
        "%y'let%t %r\"expected ((symbol value)...) body\"%t\n '%S",
        &[Arg::Cell(exp)],
        LispError::Type("let expects ((symbol value)...) body".into()),
    )
}

fn arity_error(l: &mut Interp, form: &str, exp: CellRef) -> LispError {
    report(
        l,
        LogLevel::Error,
        "%y'%s%t %r\"malformed special form\"%t\n '%S",
        &[Arg::S(form.as_bytes()), Arg::Cell(exp)],
    );
    LispError::Arity(format!("malformed {form} form"))
}

/// Every parameter must be a symbol; an improper tail symbol marks a
/// variadic procedure.
fn check_param_list(l: &mut Interp, params: CellRef, exp: CellRef) -> Result<()> {
    let mut rest = params;
    loop {
        if l.is_nil(rest) {
            return Ok(());
        }
        match l.kind(rest) {
            CellKind::Cons(car, cdr) => {
                let (car, cdr) = (*car, *cdr);
                if !l.is_sym(car) {
                    return Err(param_error(l, exp));
                }
                rest = cdr;
            }
            CellKind::Symbol(_) => return Ok(()),
            _ => return Err(param_error(l, exp)),
        }
    }
}

fn param_error(l: &mut Interp, exp: CellRef) -> LispError {
    recover(
        l,
        "%y'lambda%t %r\"not an argument list (or nil)\"%t\n '%S",
        &[Arg::Cell(exp)],
        LispError::Type("parameters must be symbols".into()),
    )
}

/// Extends `base` with parameter bindings. An improper parameter list's
/// trailing symbol collects the remaining arguments as a list.
fn bind_params(l: &mut Interp, mut env: CellRef, mut params: CellRef, mut vals: CellRef) -> CellRef {
    while l.is_cons(params) {
        let sym = l.car(params);
        let val = if l.is_cons(vals) { l.car(vals) } else { l.sing.nil };
        env = extend(l, env, sym, val);
        params = l.cdr(params);
        if l.is_cons(vals) {
            vals = l.cdr(vals);
        }
    }
    if !l.is_nil(params) {
        env = extend(l, env, params, vals);
    }
    env
}
