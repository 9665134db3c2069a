//! lisk-core - Cell model, hash table, garbage collector and interpreter
//! state for the lisk interpreter.
//!
//! This crate is the data layer every other lisk crate builds on:
//!
//! - [`cell`]: the tagged heap value (`Cell`, `CellKind`, `CellRef`) with
//!   the mark/uncollectable/closed flag bits.
//! - [`hash`]: the chained, djb2-keyed hash table used for the symbol
//!   table, the top-level bindings, and first-class hash values.
//! - [`gc`]: the heap arena and mark-and-sweep collection.
//! - [`env`]: environment frames and lookup.
//! - [`interp`]: the interpreter state tying everything together.
//! - [`error`]: the recoverable/fatal error model.
//!
//! The reader, printer and evaluator live in their own crates and operate
//! on `&mut Interp`.

pub mod cell;
pub mod env;
pub mod error;
pub mod gc;
pub mod hash;
pub mod interp;

pub use cell::{Cell, CellKind, CellRef, Procedure, Subr, SubrFn, Tag, UserData, UserTag, UserTypeOps};
pub use error::{LispError, Result};
pub use gc::{GcConfig, GcMode, Heap, SweepStats};
pub use hash::{djb2, HashTable};
pub use interp::{Interp, LogLevel, Singletons};

/// Default bin count for small hash tables (first-class hash literals).
pub const DEFAULT_BIN_COUNT: usize = 256;

/// Bin count for the interned symbol table and the top-level bindings.
pub const SYMBOL_TABLE_BINS: usize = 4096;

/// Bound on evaluation and print recursion depth.
pub const MAX_RECURSION_DEPTH: usize = 4096;

/// Maximum number of user-defined types per interpreter.
pub const MAX_USER_TYPES: usize = 256;
