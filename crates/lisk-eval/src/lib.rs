//! lisk-eval - The tree-walking evaluator.
//!
//! Evaluation takes an expression and an environment and produces a cell
//! or a recoverable error. Special forms are dispatched by pointer
//! identity against the interpreter's reserved singletons; everything
//! else is function application with strict left-to-right argument
//! evaluation.
//!
//! Tail positions — the branches of `if`, a chosen `cond` clause body,
//! the last form of `progn`, and a procedure body — re-enter the
//! evaluator through a loop rather than recursion, truncating the root
//! stack to its entry length at every hop, so iterative programs run in
//! constant host stack and constant root-stack space.

mod eval;
pub mod valid;

pub use eval::{eval, evlis};
pub use valid::{validate_args, validate_cell};
