//! The read-eval-print loop.
//!
//! One iteration reads an expression from the interpreter's input port,
//! evaluates it against the top environment, prints the value to the
//! output port, and truncates the root stack. Recoverable errors have
//! already been reported on the log port and simply return to the
//! prompt; fatal errors end the loop with their negative code.

use lisk_print::printer;

use crate::{put_prompt, Lisp};

/// Runs the REPL until end of input. Returns 0 on a clean EOF or the
/// negative code of a fatal error.
pub fn repl(lisp: &mut Lisp, prompt: &str) -> i64 {
    {
        let l = lisp.interp();
        let color = l.color_on;
        let out = l.output;
        l.port_mut(out).pretty = true;
        l.port_mut(out).color = color;
        let log = l.logging;
        l.port_mut(log).pretty = true;
        l.port_mut(log).color = color;
    }
    loop {
        if !prompt.is_empty() {
            put_prompt(lisp.interp(), prompt);
        }
        let input = lisp.interp().input;
        let expr = match lisp.read(input) {
            Ok(Some(expr)) => expr,
            Ok(None) => break,
            Err(e) => return e.code(),
        };
        if expr == lisp.interp().sing.error {
            // The parse error is already on the log port; skip to the
            // next expression.
            continue;
        }
        let value = {
            let env = lisp.interp().top_env;
            match lisk_eval::eval(lisp.interp(), 0, expr, env) {
                Ok(v) => v,
                Err(e) if e.is_fatal() || lisp.interp().errors_halt => return e.code(),
                Err(_) => {
                    lisp.interp().gc_restore(0);
                    continue;
                }
            }
        };
        let out = lisp.interp().output;
        let _ = printer(lisp.interp(), out, value, 0);
        let _ = lisk_print::printerf(lisp.interp(), out, 0, "\n", &[]);
        lisp.interp().port_mut(out).flush();
        lisp.interp().gc_restore(0);
    }
    lisp.interp().gc_restore(0);
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LogLevel, Port};

    fn run_repl(src: &str) -> (Lisp, String, i64) {
        let mut lisp = Lisp::init();
        lisp.set_log_level(LogLevel::Off);
        let inp = lisp.interp().mk_io(Port::string_input(src));
        lisp.set_input(inp).unwrap();
        let out = lisp.interp().mk_io(Port::string_output());
        lisp.set_output(out).unwrap();
        let code = repl(&mut lisp, "");
        let text = String::from_utf8(
            lisp.interp()
                .port_ref(out)
                .string_contents()
                .unwrap()
                .to_vec(),
        )
        .unwrap();
        (lisp, text, code)
    }

    #[test]
    fn prints_each_value() {
        let (_l, out, code) = run_repl("(+ 1 2) 'sym");
        assert_eq!(code, 0);
        assert_eq!(out, "3\nsym\n");
    }

    #[test]
    fn recoverable_error_returns_to_the_loop() {
        let (_l, out, code) = run_repl("(error 1) (+ 2 2)");
        assert_eq!(code, 0);
        assert_eq!(out, "4\n");
    }

    #[test]
    fn parse_error_skips_to_next_expression() {
        let (_l, out, code) = run_repl(") (+ 1 1)");
        assert_eq!(code, 0);
        assert_eq!(out, "2\n");
    }

    #[test]
    fn fatal_error_ends_the_loop() {
        let (_l, out, code) = run_repl("(error -9) (+ 2 2)");
        assert_eq!(code, -9);
        assert_eq!(out, "");
    }

    #[test]
    fn errors_halt_escalates() {
        let mut lisp = Lisp::init();
        lisp.set_log_level(LogLevel::Off);
        lisp.interp().errors_halt = true;
        let inp = lisp.interp().mk_io(Port::string_input("(error 1)"));
        lisp.set_input(inp).unwrap();
        let out = lisp.interp().mk_io(Port::string_output());
        lisp.set_output(out).unwrap();
        assert_eq!(repl(&mut lisp, ""), 1);
    }

    #[test]
    fn prompt_is_written_when_nonempty() {
        let mut lisp = Lisp::init();
        lisp.set_log_level(LogLevel::Off);
        let inp = lisp.interp().mk_io(Port::string_input("1"));
        lisp.set_input(inp).unwrap();
        let out = lisp.interp().mk_io(Port::string_output());
        lisp.set_output(out).unwrap();
        repl(&mut lisp, "> ");
        let text = String::from_utf8(
            lisp.interp()
                .port_ref(out)
                .string_contents()
                .unwrap()
                .to_vec(),
        )
        .unwrap();
        assert!(text.starts_with("> "));
        assert!(text.contains('1'));
    }

    #[test]
    fn state_persists_across_iterations() {
        let (_l, out, code) = run_repl("(define x 5) (+ x 1)");
        assert_eq!(code, 0);
        assert_eq!(out, "5\n6\n");
    }
}
