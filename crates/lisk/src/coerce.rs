//! Type coercion between cell tags.
//!
//! `coerce` is identity when the value already carries the target tag;
//! otherwise it converts where a conversion is meaningful and raises a
//! type error where it is not. Conversions mirror the reader/printer
//! conventions: numbers parse and print the way the reader and printer
//! would produce them.

use lisk_core::{CellKind, CellRef, HashTable, Interp, LispError, Result, Tag, DEFAULT_BIN_COUNT};
use lisk_read::number::{is_number, parse_float, parse_integer};

/// Bytes that stop a string from naming a symbol.
const SYMBOL_BREAKERS: &[u8] = b" ;#(){}\t\n\r'\"\\";

fn type_error(target: Tag, value_tag: Tag) -> LispError {
    LispError::Type(format!(
        "cannot coerce {} to {}",
        value_tag.name(),
        target.name()
    ))
}

/// Converts `value` to `target`.
pub fn coerce(l: &mut Interp, target: Tag, value: CellRef) -> Result<CellRef> {
    let from = l.tag(value);
    if from == target {
        return Ok(value);
    }
    match target {
        Tag::Integer => coerce_integer(l, value, from),
        Tag::Float => coerce_float(l, value, from),
        Tag::Str => coerce_string(l, value, from),
        Tag::Symbol => coerce_symbol(l, value, from),
        Tag::Cons => coerce_cons(l, value, from),
        Tag::Hash => coerce_hash(l, value, from),
        _ => Err(type_error(target, from)),
    }
}

fn coerce_integer(l: &mut Interp, value: CellRef, from: Tag) -> Result<CellRef> {
    match from {
        Tag::Float => {
            let f = l.float_val(value);
            Ok(l.mk_int(f as i64))
        }
        Tag::Str => {
            let bytes = l.bytes(value);
            match parse_integer(bytes) {
                Some(n) => Ok(l.mk_int(n)),
                None => Err(LispError::Type(format!(
                    "\"{}\" is not an integer literal",
                    String::from_utf8_lossy(bytes)
                ))),
            }
        }
        _ => Err(type_error(Tag::Integer, from)),
    }
}

fn coerce_float(l: &mut Interp, value: CellRef, from: Tag) -> Result<CellRef> {
    match from {
        Tag::Integer => {
            let n = l.int_val(value);
            Ok(l.mk_float(n as f64))
        }
        Tag::Str => {
            let bytes = l.bytes(value);
            match parse_float(bytes).or_else(|| parse_integer(bytes).map(|n| n as f64)) {
                Some(f) => Ok(l.mk_float(f)),
                None => Err(LispError::Type(format!(
                    "\"{}\" is not a float literal",
                    String::from_utf8_lossy(bytes)
                ))),
            }
        }
        _ => Err(type_error(Tag::Float, from)),
    }
}

fn coerce_string(l: &mut Interp, value: CellRef, from: Tag) -> Result<CellRef> {
    match from {
        Tag::Integer => {
            let s = format!("{}", l.int_val(value));
            Ok(l.mk_str(s.into_bytes()))
        }
        Tag::Float => {
            let s = format!("{:e}", l.float_val(value));
            Ok(l.mk_str(s.into_bytes()))
        }
        Tag::Symbol => {
            let bytes = l.bytes(value).to_vec();
            Ok(l.mk_str(bytes))
        }
        _ => Err(type_error(Tag::Str, from)),
    }
}

fn coerce_symbol(l: &mut Interp, value: CellRef, from: Tag) -> Result<CellRef> {
    match from {
        Tag::Str | Tag::Symbol => {
            let bytes = l.bytes(value).to_vec();
            if bytes.is_empty()
                || bytes.iter().any(|b| SYMBOL_BREAKERS.contains(b))
                || is_number(&bytes)
            {
                return Err(LispError::Type(format!(
                    "\"{}\" cannot name a symbol",
                    String::from_utf8_lossy(&bytes)
                )));
            }
            Ok(l.intern(&bytes))
        }
        _ => Err(type_error(Tag::Symbol, from)),
    }
}

fn coerce_cons(l: &mut Interp, value: CellRef, from: Tag) -> Result<CellRef> {
    match from {
        // A string becomes a list of one-byte strings.
        Tag::Str => {
            let bytes = l.bytes(value).to_vec();
            let cells: Vec<CellRef> = bytes.iter().map(|&b| l.mk_str(vec![b])).collect();
            Ok(l.mk_list(&cells))
        }
        // A hash flattens into (key value key value …).
        Tag::Hash => {
            let pairs: Vec<(Vec<u8>, CellRef)> = l
                .hash_ref(value)
                .iter()
                .map(|(k, v)| (k.to_vec(), v))
                .collect();
            let mut items = Vec::with_capacity(pairs.len() * 2);
            for (key, stored) in pairs {
                items.push(l.mk_str(key));
                items.push(if l.is_cons(stored) {
                    l.cdr(stored)
                } else {
                    stored
                });
            }
            Ok(l.mk_list(&items))
        }
        _ => Err(type_error(Tag::Cons, from)),
    }
}

fn coerce_hash(l: &mut Interp, value: CellRef, from: Tag) -> Result<CellRef> {
    match from {
        // A flat (key value …) list becomes a hash.
        Tag::Cons => {
            if l.list_length(value) % 2 != 0 || !l.is_proper_list(value) {
                return Err(LispError::Type(
                    "hash coercion expects a flat (key value ...) list".into(),
                ));
            }
            let mut table = HashTable::create(DEFAULT_BIN_COUNT);
            let mut rest = value;
            while l.is_cons(rest) {
                let key = l.car(rest);
                let val = l.car(l.cdr(rest));
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
        _ => Err(type_error(Tag::Hash, from)),
    }
}
