//! lisk-drv - Command-line driver for the lisk interpreter.
//!
//! The driver wires the library to the outside world: argument parsing,
//! input and output file selection, the interactive prompt, and the
//! SIGINT flag handler. Everything interesting happens in the `lisk`
//! crate; this binary only decides which ports to hand it.

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use lisk::{repl, Lisp, Port};
use tracing::debug;

/// Command-line interface for the `lisk` binary.
#[derive(Parser, Debug)]
#[command(name = "lisk")]
#[command(version)]
#[command(about = "A small embeddable lisp interpreter", long_about = None)]
pub struct Cli {
    /// Evaluate an expression (may be repeated; runs before any files)
    #[arg(short = 'e', long = "eval", value_name = "EXPR")]
    pub exprs: Vec<String>,

    /// Redirect interpreter output to a file
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Colorize output with ANSI escapes
    #[arg(short = 'c', long = "color")]
    pub color: bool,

    /// Show a prompt when reading standard input
    #[arg(short = 'p', long = "prompt")]
    pub prompt: bool,

    /// Treat recoverable errors as fatal
    #[arg(short = 'H', long = "halt-on-error")]
    pub errors_halt: bool,

    /// Script files to run in order; '-' reads standard input. With no
    /// files and no expressions, standard input is read.
    pub files: Vec<String>,
}

/// Builds the interpreter, processes every source, and returns the
/// process exit code.
pub fn run(cli: Cli) -> Result<i32> {
    let mut lisp = Lisp::init();
    lisp.interp().color_on = cli.color;
    lisp.interp().prompt_on = cli.prompt;
    lisp.interp().errors_halt = cli.errors_halt;

    bind_args(&mut lisp, &cli.files);
    install_sigint(&mut lisp)?;

    if let Some(path) = &cli.output {
        let file = File::create(path)
            .with_context(|| format!("cannot create output file {}", path.display()))?;
        let port = lisp.interp().mk_io(Port::file_output(file));
        lisp.set_output(port)
            .map_err(|e| anyhow::anyhow!("cannot redirect output: {e}"))?;
    }

    for expr in &cli.exprs {
        debug!("evaluating expression argument");
        let port = lisp
            .interp()
            .mk_io(Port::string_input(expr.as_bytes().to_vec()));
        lisp.set_input(port)
            .map_err(|e| anyhow::anyhow!("cannot set input: {e}"))?;
        let code = repl(&mut lisp, "");
        if code != 0 {
            return Ok(code as i32);
        }
    }

    let files: Vec<String> = if cli.files.is_empty() && cli.exprs.is_empty() {
        vec!["-".into()]
    } else {
        cli.files.clone()
    };
    for name in files {
        let (port, prompt) = if name == "-" {
            let prompt = if cli.prompt { "> " } else { "" };
            (Port::standard_input(), prompt)
        } else {
            debug!("running script {name}");
            let file =
                File::open(&name).with_context(|| format!("cannot open script {name}"))?;
            (Port::file_input(file), "")
        };
        let port = lisp.interp().mk_io(port);
        lisp.set_input(port)
            .map_err(|e| anyhow::anyhow!("cannot set input: {e}"))?;
        let code = repl(&mut lisp, prompt);
        if code != 0 {
            return Ok(code as i32);
        }
    }
    Ok(0)
}

/// Binds the script arguments as a list of strings under `args`.
fn bind_args(lisp: &mut Lisp, files: &[String]) {
    let cells: Vec<_> = files
        .iter()
        .map(|f| lisp.interp().mk_str(f.as_bytes().to_vec()))
        .collect();
    let list = lisp.interp().mk_list(&cells);
    lisp.add_cell("args", list);
}

/// Installs a SIGINT handler that stores into the interpreter's signal
/// flag. Nothing but the atomic store runs in signal context; the
/// evaluator picks the flag up at its next check point.
#[cfg(unix)]
fn install_sigint(lisp: &mut Lisp) -> Result<()> {
    use std::sync::atomic::Ordering;

    let flag = lisp.interp().signal_flag();
    // SAFETY: the handler performs a single atomic store, which is
    // async-signal-safe.
    unsafe {
        signal_hook::low_level::register(signal_hook::consts::SIGINT, move || {
            flag.store(1, Ordering::SeqCst);
        })
        .context("cannot install SIGINT handler")?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn install_sigint(_lisp: &mut Lisp) -> Result<()> {
    Ok(())
}
