//! Recursive-descent S-expression parser.
//!
//! `Reader` owns the tokenizer state (one token of pushback) and the
//! feature configuration. All parsing errors are reported to the
//! interpreter's log port and returned as recoverable `LispError::Parse`
//! values; end of input in the middle of an expression is a resource
//! error.

use lisk_core::{CellRef, HashTable, Interp, LispError, LogLevel, Result, DEFAULT_BIN_COUNT,
    MAX_RECURSION_DEPTH};
use lisk_print::{report, Arg};

use crate::lexer::{Lexer, Token};
use crate::number::{is_fnumber, is_number, parse_float, parse_integer};
use crate::ReadConfig;

/// Reports a parse failure on the log port and builds the error value.
fn recover(l: &mut Interp, msg: String) -> LispError {
    report(
        l,
        LogLevel::Error,
        "%y'parse-error%t %r\"%s\"%t",
        &[Arg::S(msg.as_bytes())],
    );
    LispError::Parse(msg)
}

fn eof_error(l: &mut Interp) -> LispError {
    report(
        l,
        LogLevel::Error,
        "%y'parse-error%t %r\"unexpected end of input\"%t",
        &[],
    );
    LispError::Resource("unexpected end of input".into())
}

/// The S-expression reader.
#[derive(Debug, Default)]
pub struct Reader {
    lexer: Lexer,
    config: ReadConfig,
}

impl Reader {
    pub fn new() -> Self {
        Reader {
            lexer: Lexer::new(),
            config: ReadConfig::default(),
        }
    }

    pub fn with_config(config: ReadConfig) -> Self {
        Reader {
            lexer: Lexer::new(),
            config,
        }
    }

    /// Parses one expression from `port`. Returns `Ok(None)` on a clean
    /// end of input before any token of the expression was seen.
    pub fn read(&mut self, l: &mut Interp, port: CellRef) -> Result<Option<CellRef>> {
        match self.lexer.next_token(l, port) {
            None => Ok(None),
            Some(tok) => self.parse_expr(l, port, tok, 0).map(Some),
        }
    }

    fn next_or_eof(&mut self, l: &mut Interp, port: CellRef) -> Result<Token> {
        self.lexer.next_token(l, port).ok_or_else(|| eof_error(l))
    }

    fn parse_expr(
        &mut self,
        l: &mut Interp,
        port: CellRef,
        token: Token,
        depth: usize,
    ) -> Result<CellRef> {
        if depth > MAX_RECURSION_DEPTH {
            return Err(LispError::Depth(depth));
        }
        match token[0] {
            b'(' => self.parse_list(l, port, depth + 1),
            b')' => Err(recover(l, "unmatched ')'".into())),
            b'{' if self.config.hashes => self.parse_hash(l, port, depth + 1),
            b'}' if self.config.hashes => Err(recover(l, "unmatched '}'".into())),
            b'"' if self.config.strings => {
                let s = self.parse_string(l, port)?;
                Ok(l.mk_str(s))
            }
            b'\'' => {
                let tok = self.next_or_eof(l, port)?;
                let quoted = self.parse_expr(l, port, tok, depth + 1)?;
                let quote = l.sing.quote;
                Ok(l.mk_list(&[quote, quoted]))
            }
            _ => {
                if self.config.ints && is_number(&token) {
                    // parse_integer cannot fail once is_number holds.
                    let n = parse_integer(&token)
                        .unwrap_or_else(|| panic!("internal inconsistency: integer token"));
                    return Ok(l.mk_int(n));
                }
                if self.config.floats && is_fnumber(&token) {
                    if let Some(f) = parse_float(&token) {
                        return Ok(l.mk_float(f));
                    }
                }
                self.process_symbol(l, &token, depth)
            }
        }
    }

    /// Parses the remainder of a `(…)` form. The element loop is
    /// iterative so long lists cannot exhaust the host stack; only
    /// nesting recurses.
    fn parse_list(&mut self, l: &mut Interp, port: CellRef, depth: usize) -> Result<CellRef> {
        let mut items: Vec<CellRef> = Vec::new();
        loop {
            let token = self.next_or_eof(l, port)?;
            match token.as_slice() {
                b")" => {
                    let mut acc = l.sing.nil;
                    for &item in items.iter().rev() {
                        acc = l.cons(item, acc);
                    }
                    return Ok(acc);
                }
                b"." if self.config.dotted => {
                    let tok = self.next_or_eof(l, port)?;
                    let tail = self.parse_expr(l, port, tok, depth + 1)?;
                    let closing = self.next_or_eof(l, port)?;
                    if closing.as_slice() != b")" {
                        return Err(recover(
                            l,
                            "expected ')' to close a dotted pair".into(),
                        ));
                    }
                    let mut acc = tail;
                    for &item in items.iter().rev() {
                        acc = l.cons(item, acc);
                    }
                    return Ok(acc);
                }
                _ => {
                    let item = self.parse_expr(l, port, token, depth + 1)?;
                    items.push(item);
                }
            }
        }
    }

    /// Parses the remainder of a `{ k v … }` hash literal. Keys are
    /// string or symbol tokens; each pair is stored as
    /// `(key-as-string . value)` under the key bytes.
    fn parse_hash(&mut self, l: &mut Interp, port: CellRef, depth: usize) -> Result<CellRef> {
        let mut table = HashTable::create(DEFAULT_BIN_COUNT);
        loop {
            let token = self.next_or_eof(l, port)?;
            let key: Vec<u8> = match token[0] {
                b'}' => return Ok(l.mk_hash(table)),
                b'(' | b')' | b'{' | b'\'' | b'.' => {
                    return Err(recover(
                        l,
                        format!("invalid hash key '{}'", String::from_utf8_lossy(&token)),
                    ))
                }
                b'"' => self.parse_string(l, port)?,
                _ => {
                    if (self.config.ints && is_number(&token))
                        || (self.config.floats && is_fnumber(&token))
                    {
                        return Err(recover(
                            l,
                            format!("invalid hash key '{}'", String::from_utf8_lossy(&token)),
                        ));
                    }
                    token
                }
            };
            let vtok = self.next_or_eof(l, port)?;
            let value = self.parse_expr(l, port, vtok, depth + 1)?;
            let key_cell = l.mk_str(key.clone());
            let pair = l.cons(key_cell, value);
            table.insert(&key, pair);
        }
    }

    /// Parses a string literal body after the opening quote. Escapes:
    /// `\\ \n \t \r \"` and three-digit octal; a NUL escape is rejected
    /// because strings cannot carry embedded NULs.
    fn parse_string(&mut self, l: &mut Interp, port: CellRef) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        loop {
            let c = l.port_mut(port).getc().ok_or_else(|| eof_error(l))?;
            match c {
                b'"' => return Ok(buf),
                b'\\' => {
                    let e = l.port_mut(port).getc().ok_or_else(|| eof_error(l))?;
                    match e {
                        b'\\' => buf.push(b'\\'),
                        b'n' => buf.push(b'\n'),
                        b't' => buf.push(b'\t'),
                        b'r' => buf.push(b'\r'),
                        b'"' => buf.push(b'"'),
                        b'0'..=b'3' => {
                            let mut digits = [e, 0, 0];
                            for d in &mut digits[1..] {
                                *d = l.port_mut(port).getc().ok_or_else(|| eof_error(l))?;
                            }
                            if !digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                                return Err(recover(
                                    l,
                                    format!(
                                        "invalid escape literal \"\\{}\"",
                                        String::from_utf8_lossy(&digits)
                                    ),
                                ));
                            }
                            let value = digits
                                .iter()
                                .fold(0u32, |acc, d| acc * 8 + (d - b'0') as u32);
                            if value == 0 {
                                return Err(recover(
                                    l,
                                    "NUL escape is not representable in strings".into(),
                                ));
                            }
                            buf.push(value as u8);
                        }
                        other => {
                            return Err(recover(
                                l,
                                format!("invalid escape character '{}'", other as char),
                            ))
                        }
                    }
                }
                _ => buf.push(c),
            }
        }
    }

    /// Interprets a plain token as a symbol, applying the split sugar:
    /// the first `.` or `!` divides the token, `a.b` reading as `(a b)`
    /// and `a!b` as `(a (quote b))`, recursively on the right-hand side.
    fn process_symbol(&mut self, l: &mut Interp, token: &[u8], depth: usize) -> Result<CellRef> {
        if !self.config.sugar {
            return self.new_sym(l, token);
        }
        if token.is_empty() {
            return Err(recover(l, "empty symbol".into()));
        }
        if token[0] == b'.' || token[0] == b'!' {
            return Err(recover(
                l,
                format!(
                    "invalid symbol prefix \"{}\"",
                    String::from_utf8_lossy(token)
                ),
            ));
        }
        let Some(split) = token.iter().position(|&b| b == b'.' || b == b'!') else {
            return self.new_sym(l, token);
        };
        if split + 1 >= token.len() {
            return Err(recover(
                l,
                format!(
                    "expected more after split in \"{}\"",
                    String::from_utf8_lossy(token)
                ),
            ));
        }
        let left = self.new_sym(l, &token[..split])?;
        let right = self.process_symbol(l, &token[split + 1..], depth + 1)?;
        match token[split] {
            b'.' => Ok(l.mk_list(&[left, right])),
            _ => {
                let quote = l.sing.quote;
                let quoted = l.mk_list(&[quote, right]);
                Ok(l.mk_list(&[left, quoted]))
            }
        }
    }

    fn new_sym(&mut self, l: &mut Interp, bytes: &[u8]) -> Result<CellRef> {
        if (self.config.ints && is_number(bytes)) || (self.config.floats && is_fnumber(bytes)) {
            return Err(recover(
                l,
                format!(
                    "unexpected integer or float \"{}\"",
                    String::from_utf8_lossy(bytes)
                ),
            ));
        }
        Ok(l.intern(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lisk_io::Port;
    use lisk_print::print_to_string;

    fn read_one(src: &str) -> (Interp, CellRef) {
        let mut l = Interp::new();
        let port = l.mk_io(Port::string_input(src));
        let mut r = Reader::new();
        let cell = r.read(&mut l, port).unwrap().expect("expression");
        (l, cell)
    }

    fn read_err(src: &str) -> LispError {
        let mut l = Interp::new();
        l.set_log_level(lisk_core::LogLevel::Off);
        let port = l.mk_io(Port::string_input(src));
        let mut r = Reader::new();
        r.read(&mut l, port).expect_err("parse failure")
    }

    fn rendered(src: &str) -> String {
        let (mut l, cell) = read_one(src);
        String::from_utf8(print_to_string(&mut l, cell).unwrap()).unwrap()
    }

    #[test]
    fn atoms() {
        let (l, c) = read_one("42");
        assert_eq!(l.int_val(c), 42);
        let (l, c) = read_one("-0x10");
        assert_eq!(l.int_val(c), -16);
        let (l, c) = read_one("1.5");
        assert_eq!(l.float_val(c), 1.5);
        let (l, c) = read_one("foo");
        assert!(l.is_sym(c));
        assert_eq!(l.bytes(c), b"foo");
    }

    #[test]
    fn integers_preferred_over_floats() {
        let (l, c) = read_one("7");
        assert!(l.is_int(c));
    }

    #[test]
    fn lists() {
        assert_eq!(rendered("(1 2 3)"), "(1 2 3)");
        assert_eq!(rendered("()"), "nil");
        assert_eq!(rendered("(a (b c) d)"), "(a (b c) d)");
    }

    #[test]
    fn dotted_pairs() {
        assert_eq!(rendered("(1 . 2)"), "(1 . 2)");
        assert_eq!(rendered("(1 2 . 3)"), "(1 2 . 3)");
    }

    #[test]
    fn dotted_pair_requires_closing_paren() {
        assert!(matches!(read_err("(1 . 2 3)"), LispError::Parse(_)));
    }

    #[test]
    fn quote_sugar() {
        assert_eq!(rendered("'x"), "(quote x)");
        assert_eq!(rendered("'(1 2)"), "(quote (1 2))");
    }

    #[test]
    fn strings_and_escapes() {
        let (l, c) = read_one("\"hello world\"");
        assert_eq!(l.bytes(c), b"hello world");
        let (l, c) = read_one(r#""a\n\t\r\"\\z""#);
        assert_eq!(l.bytes(c), b"a\n\t\r\"\\z");
        let (l, c) = read_one(r#""\101""#);
        assert_eq!(l.bytes(c), b"A");
    }

    #[test]
    fn bad_escapes_are_parse_errors() {
        assert!(matches!(read_err(r#""\q""#), LispError::Parse(_)));
        assert!(matches!(read_err(r#""\000""#), LispError::Parse(_)));
        assert!(matches!(read_err(r#""\09x""#), LispError::Parse(_)));
    }

    #[test]
    fn split_sugar() {
        assert_eq!(rendered("a.b"), "(a b)");
        assert_eq!(rendered("a.b.c"), "(a (b c))");
        assert_eq!(rendered("a!b"), "(a (quote b))");
        assert_eq!(rendered("a.b!c"), "(a (b (quote c)))");
    }

    #[test]
    fn leading_split_char_is_an_error() {
        assert!(matches!(read_err(".b"), LispError::Parse(_)));
        assert!(matches!(read_err("!b"), LispError::Parse(_)));
        assert!(matches!(read_err("a."), LispError::Parse(_)));
    }

    #[test]
    fn hash_literals() {
        let (l, c) = read_one("{ a 1 \"b\" 2 }");
        assert!(l.is_hash(c));
        let t = l.hash_ref(c);
        let pa = t.lookup(b"a").expect("a");
        let pb = t.lookup(b"b").expect("b");
        assert_eq!(l.int_val(l.cdr(pa)), 1);
        assert_eq!(l.int_val(l.cdr(pb)), 2);
        // Keys are stored as strings in the pair car.
        assert!(l.is_str(l.car(pa)));
    }

    #[test]
    fn empty_hash() {
        let (l, c) = read_one("{}");
        assert!(l.is_hash(c));
        assert_eq!(l.hash_ref(c).len(), 0);
    }

    #[test]
    fn numeric_hash_keys_are_rejected() {
        assert!(matches!(read_err("{ 1 2 }"), LispError::Parse(_)));
    }

    #[test]
    fn dotted_pair_in_hash_is_an_error() {
        assert!(matches!(read_err("{ . 1 }"), LispError::Parse(_)));
    }

    #[test]
    fn unmatched_delimiters() {
        assert!(matches!(read_err(")"), LispError::Parse(_)));
        assert!(matches!(read_err("}"), LispError::Parse(_)));
    }

    #[test]
    fn eof_mid_expression_is_a_resource_error() {
        assert!(matches!(read_err("(1 2"), LispError::Resource(_)));
        assert!(matches!(read_err("\"abc"), LispError::Resource(_)));
        assert!(matches!(read_err("'"), LispError::Resource(_)));
        assert!(matches!(read_err("{ a"), LispError::Resource(_)));
    }

    #[test]
    fn clean_eof_returns_none() {
        let mut l = Interp::new();
        let port = l.mk_io(Port::string_input("  ; nothing here\n"));
        let mut r = Reader::new();
        assert!(r.read(&mut l, port).unwrap().is_none());
    }

    #[test]
    fn several_expressions_in_sequence() {
        let mut l = Interp::new();
        let port = l.mk_io(Port::string_input("1 two \"three\""));
        let mut r = Reader::new();
        let a = r.read(&mut l, port).unwrap().unwrap();
        let b = r.read(&mut l, port).unwrap().unwrap();
        let c = r.read(&mut l, port).unwrap().unwrap();
        assert!(l.is_int(a) && l.is_sym(b) && l.is_str(c));
        assert!(r.read(&mut l, port).unwrap().is_none());
    }

    #[test]
    fn comments_between_expressions() {
        assert_eq!(rendered("(1 # inline\n 2)"), "(1 2)");
    }

    #[test]
    fn sugar_can_be_disabled() {
        let mut l = Interp::new();
        let port = l.mk_io(Port::string_input("a.b"));
        let mut r = Reader::with_config(ReadConfig {
            sugar: false,
            ..ReadConfig::default()
        });
        let c = r.read(&mut l, port).unwrap().unwrap();
        assert!(l.is_sym(c));
        assert_eq!(l.bytes(c), b"a.b");
    }

    #[test]
    fn dotted_can_be_disabled() {
        let mut l = Interp::new();
        l.set_log_level(lisk_core::LogLevel::Off);
        let port = l.mk_io(Port::string_input("(1 . 2)"));
        let mut r = Reader::with_config(ReadConfig {
            dotted: false,
            ..ReadConfig::default()
        });
        // The bare "." token falls through to symbol processing, which
        // rejects a leading split character.
        assert!(r.read(&mut l, port).is_err());
    }

    #[test]
    fn interning_shares_symbols() {
        let mut l = Interp::new();
        let port = l.mk_io(Port::string_input("dup dup"));
        let mut r = Reader::new();
        let a = r.read(&mut l, port).unwrap().unwrap();
        let b = r.read(&mut l, port).unwrap().unwrap();
        assert_eq!(a, b);
    }
}
