//! Environment frames and lookup.
//!
//! An environment is a cons list. Its head is the pair `(nil . top-hash)`;
//! later frames are either `(symbol . value)` pairs pushed by `extend` or
//! Hash cells mapping a symbol name to its `(symbol . value)` pair. Lookup
//! walks head to tail and the first match wins, so inner bindings shadow
//! outer ones and everything bottoms out in the top-level hash.

use crate::cell::{CellKind, CellRef};
use crate::interp::Interp;

/// Finds the binding pair for `key` in the environment chain `alist`.
/// Returns the `(symbol . value)` pair so callers can mutate the value in
/// place (`set!`).
pub fn assoc(l: &Interp, key: CellRef, alist: CellRef) -> Option<CellRef> {
    let mut frames = alist;
    while l.is_cons(frames) {
        let frame = l.car(frames);
        match l.kind(frame) {
            CellKind::Cons(car, cdr) => {
                if *car == key {
                    return Some(frame);
                }
                // The environment head carries the top-level hash as the
                // cdr of a (nil . hash) pair.
                if l.is_nil(*car) && l.is_hash(*cdr) && l.is_asciiz(key) {
                    if let Some(pair) = l.hash_ref(*cdr).lookup(l.bytes(key)) {
                        return Some(pair);
                    }
                }
            }
            CellKind::Hash(h) => {
                if l.is_asciiz(key) {
                    if let Some(pair) = h.lookup(l.bytes(key)) {
                        return Some(pair);
                    }
                }
            }
            _ => {}
        }
        frames = l.cdr(frames);
    }
    None
}

/// Pushes a `(symbol . value)` frame onto `env`, returning the extended
/// environment.
pub fn extend(l: &mut Interp, env: CellRef, sym: CellRef, val: CellRef) -> CellRef {
    let pair = l.cons(sym, val);
    l.cons(pair, env)
}

/// Inserts a binding into the top-level hash. Later definitions of the
/// same name replace the stored pair. Returns the bound value.
pub fn extend_top(l: &mut Interp, sym: CellRef, val: CellRef) -> CellRef {
    let pair = l.cons(sym, val);
    let name = l.bytes(sym).to_vec();
    let top = l.top_hash;
    l.hash_mut(top).insert(&name, pair);
    val
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_level_binding_is_found_through_env_head() {
        let mut l = Interp::new();
        let sym = l.intern(b"answer");
        let val = l.mk_int(42);
        extend_top(&mut l, sym, val);
        let pair = assoc(&l, sym, l.top_env).expect("binding");
        assert_eq!(l.car(pair), sym);
        assert_eq!(l.cdr(pair), val);
    }

    #[test]
    fn unbound_symbol_is_absent() {
        let mut l = Interp::new();
        let sym = l.intern(b"nope");
        assert!(assoc(&l, sym, l.top_env).is_none());
    }

    #[test]
    fn inner_frames_shadow_outer() {
        let mut l = Interp::new();
        let sym = l.intern(b"x");
        let outer = l.mk_int(1);
        let inner = l.mk_int(2);
        extend_top(&mut l, sym, outer);
        let top_env = l.top_env;
        let env = extend(&mut l, top_env, sym, inner);
        let pair = assoc(&l, sym, env).expect("binding");
        assert_eq!(l.cdr(pair), inner);
        // The top-level binding is untouched.
        let pair = assoc(&l, sym, l.top_env).expect("binding");
        assert_eq!(l.cdr(pair), outer);
    }

    #[test]
    fn redefinition_replaces_top_binding() {
        let mut l = Interp::new();
        let sym = l.intern(b"v");
        let first = l.mk_int(1);
        let second = l.mk_int(2);
        extend_top(&mut l, sym, first);
        extend_top(&mut l, sym, second);
        let pair = assoc(&l, sym, l.top_env).expect("binding");
        assert_eq!(l.cdr(pair), second);
    }

    #[test]
    fn set_through_found_pair_mutates_in_place() {
        let mut l = Interp::new();
        let sym = l.intern(b"y");
        let val = l.mk_int(10);
        extend_top(&mut l, sym, val);
        let pair = assoc(&l, sym, l.top_env).expect("binding");
        let newval = l.mk_int(20);
        l.set_cdr(pair, newval);
        let pair = assoc(&l, sym, l.top_env).expect("binding");
        assert_eq!(l.int_val(l.cdr(pair)), 20);
    }

    #[test]
    fn hash_value_in_a_frame_pair_is_not_a_frame() {
        // A binding whose value happens to be a hash must not leak its
        // contents into name lookup.
        let mut l = Interp::new();
        let h = l.intern(b"h");
        let hidden = l.intern(b"hidden");
        let hv = l.mk_int(9);
        let hidden_pair = l.cons(hidden, hv);
        let mut table = crate::hash::HashTable::create(4);
        table.insert(b"hidden", hidden_pair);
        let hash_cell = l.mk_hash(table);
        let top_env = l.top_env;
        let env = extend(&mut l, top_env, h, hash_cell);
        assert!(assoc(&l, hidden, env).is_none());
    }

    #[test]
    fn bare_hash_frame_is_searched() {
        let mut l = Interp::new();
        let sym = l.intern(b"inside");
        let val = l.mk_int(3);
        let pair = l.cons(sym, val);
        let mut table = crate::hash::HashTable::create(4);
        table.insert(b"inside", pair);
        let hash_cell = l.mk_hash(table);
        let env = l.cons(hash_cell, l.top_env);
        let found = assoc(&l, sym, env).expect("binding");
        assert_eq!(l.cdr(found), val);
    }
}
