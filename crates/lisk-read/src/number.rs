//! Numeric token recognition.
//!
//! Integers match `[+-]?(0[xX][0-9a-fA-F]+|0[0-7]*|[1-9][0-9]*)` — decimal,
//! C-style octal with a leading zero, or hex with a `0x` prefix. Floats
//! match `[+-]?[0-9]*\.?[0-9]+([eE][+-]?[0-9]+)?` but a token that is also
//! an integer reads as an integer. Conversion saturates at the machine-word
//! boundaries rather than failing.

/// True when `token` is an integer literal.
pub fn is_number(token: &[u8]) -> bool {
    let t = strip_sign(token);
    if t.is_empty() {
        return false;
    }
    if let Some(hex) = strip_hex_prefix(t) {
        return !hex.is_empty() && hex.iter().all(u8::is_ascii_hexdigit);
    }
    if t[0] == b'0' {
        // Octal; a bare "0" is the zero-length digit run.
        return t[1..].iter().all(|b| (b'0'..=b'7').contains(b));
    }
    t.iter().all(u8::is_ascii_digit)
}

/// True when `token` is a floating-point literal.
pub fn is_fnumber(token: &[u8]) -> bool {
    let t = strip_sign(token);
    if t.is_empty() {
        return false;
    }
    // Split off the exponent first.
    let (mantissa, exponent) = match t.iter().position(|&b| b == b'e' || b == b'E') {
        Some(i) => (&t[..i], Some(&t[i + 1..])),
        None => (t, None),
    };
    if let Some(exp) = exponent {
        let exp = strip_sign(exp);
        if exp.is_empty() || !exp.iter().all(u8::is_ascii_digit) {
            return false;
        }
    }
    let (int_part, frac_part) = match mantissa.iter().position(|&b| b == b'.') {
        Some(i) => (&mantissa[..i], Some(&mantissa[i + 1..])),
        None => (mantissa, None),
    };
    if !int_part.iter().all(u8::is_ascii_digit) {
        return false;
    }
    match frac_part {
        // The digits after the point are mandatory when a point exists.
        Some(frac) => !frac.is_empty() && frac.iter().all(u8::is_ascii_digit),
        // Without a point there must be digits and usually an exponent;
        // plain digit runs are integers, which the caller prefers.
        None => !int_part.is_empty(),
    }
}

/// Converts an integer literal, saturating on overflow the way `strtol`
/// clamps. Returns `None` when the token is not an integer literal.
pub fn parse_integer(token: &[u8]) -> Option<i64> {
    if !is_number(token) {
        return None;
    }
    let negative = token[0] == b'-';
    let t = strip_sign(token);
    let (digits, radix): (&[u8], u32) = match strip_hex_prefix(t) {
        Some(hex) => (hex, 16),
        None if t[0] == b'0' && t.len() > 1 => (&t[1..], 8),
        None => (t, 10),
    };
    let mut acc: i64 = 0;
    for &b in digits {
        let d = (b as char).to_digit(radix)? as i64;
        acc = match acc.checked_mul(radix as i64).and_then(|a| {
            if negative {
                a.checked_sub(d)
            } else {
                a.checked_add(d)
            }
        }) {
            Some(a) => a,
            None => return Some(if negative { i64::MIN } else { i64::MAX }),
        };
    }
    Some(acc)
}

/// Converts a float literal. Returns `None` when the token does not match
/// the float grammar.
pub fn parse_float(token: &[u8]) -> Option<f64> {
    if !is_fnumber(token) {
        return None;
    }
    std::str::from_utf8(token).ok()?.parse().ok()
}

fn strip_sign(t: &[u8]) -> &[u8] {
    match t.first() {
        Some(b'+') | Some(b'-') => &t[1..],
        _ => t,
    }
}

fn strip_hex_prefix(t: &[u8]) -> Option<&[u8]> {
    if t.len() >= 2 && t[0] == b'0' && (t[1] == b'x' || t[1] == b'X') {
        Some(&t[2..])
    } else {
        None
    }
}
