//! Tokenizer.
//!
//! Tokens are raw byte strings. The single characters `( ) { } ' "` are
//! complete tokens on their own; every other token is a maximal run of
//! bytes that are neither whitespace nor one of those characters. Line
//! comments start with `#` or `;` and run to the newline. One token of
//! pushback is supported for the parser's lookahead.

use lisk_core::{CellRef, Interp};

/// One token: an owned run of bytes.
pub type Token = Vec<u8>;

/// The single-character token class.
const LEX_CLASS: &[u8] = b"(){}'\"";

/// True for the characters that terminate an ordinary token.
pub fn is_lex_char(b: u8) -> bool {
    LEX_CLASS.contains(&b)
}

/// Byte-stream tokenizer with one token of pushback.
#[derive(Debug, Default)]
pub struct Lexer {
    pushback: Option<Token>,
}

impl Lexer {
    pub fn new() -> Self {
        Lexer { pushback: None }
    }

    /// Pushes `token` back so the next [`Lexer::next_token`] returns it.
    pub fn unget_token(&mut self, token: Token) {
        self.pushback = Some(token);
    }

    /// Reads bytes until the end of the current line comment.
    fn skip_comment(l: &mut Interp, port: CellRef) {
        while let Some(c) = l.port_mut(port).getc() {
            if c == b'\n' {
                break;
            }
        }
    }

    /// Returns the next token, or `None` at end of input.
    pub fn next_token(&mut self, l: &mut Interp, port: CellRef) -> Option<Token> {
        if let Some(tok) = self.pushback.take() {
            return Some(tok);
        }
        // Skip whitespace and comments to the first token byte.
        let first = loop {
            let c = l.port_mut(port).getc()?;
            if c == b'#' || c == b';' {
                Self::skip_comment(l, port);
                continue;
            }
            if !c.is_ascii_whitespace() {
                break c;
            }
        };
        let mut buf = vec![first];
        if is_lex_char(first) {
            return Some(buf);
        }
        loop {
            let Some(c) = l.port_mut(port).getc() else {
                return Some(buf);
            };
            if c == b'#' || c == b';' {
                Self::skip_comment(l, port);
                continue;
            }
            if is_lex_char(c) || c.is_ascii_whitespace() {
                l.port_mut(port).ungetc(c);
                return Some(buf);
            }
            buf.push(c);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lisk_io::Port;

    fn tokens_of(src: &str) -> Vec<String> {
        let mut l = Interp::new();
        let port = l.mk_io(Port::string_input(src));
        let mut lx = Lexer::new();
        let mut out = Vec::new();
        while let Some(tok) = lx.next_token(&mut l, port) {
            out.push(String::from_utf8(tok).unwrap());
        }
        out
    }

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(tokens_of("foo bar\tbaz\nqux"), ["foo", "bar", "baz", "qux"]);
    }

    #[test]
    fn lex_chars_are_single_tokens() {
        assert_eq!(tokens_of("(a)"), ["(", "a", ")"]);
        assert_eq!(tokens_of("{x}"), ["{", "x", "}"]);
        assert_eq!(tokens_of("'sym"), ["'", "sym"]);
        assert_eq!(tokens_of("\"str"), ["\"", "str"]);
    }

    #[test]
    fn adjacent_lex_chars() {
        assert_eq!(tokens_of("(())"), ["(", "(", ")", ")"]);
    }

    #[test]
    fn comments_run_to_newline() {
        assert_eq!(tokens_of("a # comment\nb"), ["a", "b"]);
        assert_eq!(tokens_of("a ; comment\nb"), ["a", "b"]);
        assert_eq!(tokens_of("; only a comment"), Vec::<String>::new());
    }

    #[test]
    fn empty_input_is_eof() {
        assert_eq!(tokens_of(""), Vec::<String>::new());
        assert_eq!(tokens_of("   \n\t "), Vec::<String>::new());
    }

    #[test]
    fn pushback_round_trips() {
        let mut l = Interp::new();
        let port = l.mk_io(Port::string_input("a b"));
        let mut lx = Lexer::new();
        let tok = lx.next_token(&mut l, port).unwrap();
        assert_eq!(tok, b"a");
        lx.unget_token(tok);
        assert_eq!(lx.next_token(&mut l, port).unwrap(), b"a");
        assert_eq!(lx.next_token(&mut l, port).unwrap(), b"b");
    }

    #[test]
    fn token_stops_before_paren() {
        assert_eq!(tokens_of("abc(def"), ["abc", "(", "def"]);
    }

    #[test]
    fn numbers_and_punctuation_are_plain_runs() {
        assert_eq!(tokens_of("-12.5e3 a.b"), ["-12.5e3", "a.b"]);
    }
}
