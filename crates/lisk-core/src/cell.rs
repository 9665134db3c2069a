//! The universal heap value.
//!
//! Every value the interpreter manipulates is a `Cell` living in the
//! per-interpreter heap and addressed by a [`CellRef`]. A cell carries a
//! tagged payload ([`CellKind`]), the transient GC mark, the
//! `uncollectable` flag for singletons and interned names, and the `closed`
//! flag for I/O ports and user objects whose contents are no longer valid.
//!
//! Cons cells never hold a null field: the empty list is the distinguished
//! `nil` symbol singleton.

use std::any::Any;

use lisk_io::Port;

use crate::error::Result;
use crate::hash::HashTable;
use crate::interp::Interp;

/// A reference to a heap cell: a typed index into the owning interpreter's
/// arena. Copyable and comparable; two references are the same value iff
/// they are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef(u32);

impl CellRef {
    /// Builds a reference from a raw slot index. Only the heap and tests
    /// construct these.
    pub fn from_raw(index: u32) -> Self {
        CellRef(index)
    }

    /// The raw slot index.
    pub fn index(self) -> u32 {
        self.0
    }
}

/// The type tag of a cell, used for discrimination and as the target of
/// coercions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Integer,
    Float,
    Symbol,
    Str,
    Cons,
    Hash,
    Io,
    Subr,
    Proc,
    FProc,
    User,
}

impl Tag {
    /// Human-readable tag name, used in error messages and by `type-of`.
    pub fn name(self) -> &'static str {
        match self {
            Tag::Integer => "integer",
            Tag::Float => "float",
            Tag::Symbol => "symbol",
            Tag::Str => "string",
            Tag::Cons => "cons",
            Tag::Hash => "hash",
            Tag::Io => "io",
            Tag::Subr => "subroutine",
            Tag::Proc => "lambda",
            Tag::FProc => "flambda",
            Tag::User => "user-defined",
        }
    }
}

/// A host-provided primitive subroutine.
pub type SubrFn = fn(&mut Interp, CellRef) -> Result<CellRef>;

/// Payload of a `Subr` cell: the function pointer, an optional validation
/// format string (see the validation module), and a docstring cell.
pub struct Subr {
    pub func: SubrFn,
    /// Validation format; `None` leaves the subroutine responsible for its
    /// own checking.
    pub fmt: Option<Box<str>>,
    pub doc: CellRef,
    /// Expected argument count, derived from `fmt`.
    pub arity: usize,
}

/// Payload of a `Proc` or `FProc` cell: parameter list, body, captured
/// environment and docstring.
pub struct Procedure {
    pub args: CellRef,
    pub code: CellRef,
    pub env: CellRef,
    pub doc: CellRef,
    /// Number of fixed parameters (the prefix before a variadic tail).
    pub arity: usize,
    /// True when the parameter list is improper and the trailing symbol
    /// collects the remaining arguments.
    pub variadic: bool,
}

/// Registered type tag for user-defined cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserTag(pub u32);

/// Callbacks registered per user-defined type.
#[derive(Default)]
pub struct UserTypeOps {
    /// Finalizer run at sweep; dropping the box is the default.
    pub free: Option<fn(Box<dyn Any>)>,
    /// Returns child cells the collector must treat as reachable.
    pub mark: Option<fn(&dyn Any) -> Vec<CellRef>>,
    /// Structural equality between two values of this type.
    pub equal: Option<fn(&dyn Any, &dyn Any) -> bool>,
    /// Renders the value for the printer.
    pub print: Option<fn(&dyn Any) -> String>,
}

/// Payload of a `User` cell: the opaque host value plus its type tag.
pub struct UserData {
    pub data: Box<dyn Any>,
    pub tag: UserTag,
}

/// The tagged payload of a cell.
pub enum CellKind {
    /// Signed machine word.
    Integer(i64),
    /// IEEE-754 double.
    Float(f64),
    /// Interned name bytes.
    Symbol(Box<[u8]>),
    /// Owned byte string.
    Str(Box<[u8]>),
    /// Pair of cell references; neither field is ever null.
    Cons(CellRef, CellRef),
    /// First-class hash table.
    Hash(HashTable),
    /// I/O port.
    Io(Port),
    /// Host-provided primitive.
    Subr(Subr),
    /// User-defined function; arguments are evaluated.
    Proc(Procedure),
    /// F-expression; receives its argument list unevaluated.
    FProc(Procedure),
    /// Opaque host value with registered callbacks.
    User(UserData),
}

impl CellKind {
    /// The tag of this payload.
    pub fn tag(&self) -> Tag {
        match self {
            CellKind::Integer(_) => Tag::Integer,
            CellKind::Float(_) => Tag::Float,
            CellKind::Symbol(_) => Tag::Symbol,
            CellKind::Str(_) => Tag::Str,
            CellKind::Cons(..) => Tag::Cons,
            CellKind::Hash(_) => Tag::Hash,
            CellKind::Io(_) => Tag::Io,
            CellKind::Subr(_) => Tag::Subr,
            CellKind::Proc(_) => Tag::Proc,
            CellKind::FProc(_) => Tag::FProc,
            CellKind::User(_) => Tag::User,
        }
    }
}

/// A heap cell: payload plus the three flag bits.
pub struct Cell {
    pub kind: CellKind,
    /// Set transiently during the GC mark phase and by the printer's
    /// cycle guard; zero otherwise.
    pub mark: bool,
    /// Singletons and interned names that must never be freed.
    pub uncollectable: bool,
    /// An explicitly closed port or user object; payload must not be
    /// used once set.
    pub closed: bool,
}

impl Cell {
    /// A fresh collectible cell with clear flags.
    pub fn new(kind: CellKind) -> Self {
        Cell {
            kind,
            mark: false,
            uncollectable: false,
            closed: false,
        }
    }

    /// A cell the collector will never free.
    pub fn uncollectable(kind: CellKind) -> Self {
        Cell {
            kind,
            mark: false,
            uncollectable: true,
            closed: false,
        }
    }

    /// The type tag of the payload.
    pub fn tag(&self) -> Tag {
        self.kind.tag()
    }

    /// The polymorphic length of this cell: byte length for symbols and
    /// strings, declared arity for subroutines and procedures, 1 for
    /// f-expressions. Cons length is not stored; list length is computed
    /// by walking.
    pub fn length(&self) -> usize {
        match &self.kind {
            CellKind::Symbol(b) | CellKind::Str(b) => b.len(),
            CellKind::Subr(s) => s.arity,
            CellKind::Proc(p) => p.arity,
            CellKind::FProc(_) => 1,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refs_compare_by_index() {
        assert_eq!(CellRef::from_raw(3), CellRef::from_raw(3));
        assert_ne!(CellRef::from_raw(3), CellRef::from_raw(4));
        assert_eq!(CellRef::from_raw(7).index(), 7);
    }

    #[test]
    fn tags_match_payloads() {
        assert_eq!(Cell::new(CellKind::Integer(1)).tag(), Tag::Integer);
        assert_eq!(Cell::new(CellKind::Float(1.0)).tag(), Tag::Float);
        assert_eq!(
            Cell::new(CellKind::Cons(CellRef::from_raw(0), CellRef::from_raw(0))).tag(),
            Tag::Cons
        );
    }

    #[test]
    fn length_is_polymorphic() {
        let s = Cell::new(CellKind::Str(b"hello".to_vec().into_boxed_slice()));
        assert_eq!(s.length(), 5);
        let sym = Cell::new(CellKind::Symbol(b"nil".to_vec().into_boxed_slice()));
        assert_eq!(sym.length(), 3);
        let i = Cell::new(CellKind::Integer(10));
        assert_eq!(i.length(), 0);
    }

    #[test]
    fn flags_default_clear() {
        let c = Cell::new(CellKind::Integer(0));
        assert!(!c.mark && !c.uncollectable && !c.closed);
        let u = Cell::uncollectable(CellKind::Integer(0));
        assert!(u.uncollectable);
    }

    #[test]
    fn tag_names() {
        assert_eq!(Tag::Integer.name(), "integer");
        assert_eq!(Tag::FProc.name(), "flambda");
    }
}
