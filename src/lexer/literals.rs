//! String/character literal escape decoding and preprocessing-number reparsing.

use crate::token::{NumValue, StrKind};

/// Decodes the body of a string or character literal (text between the quotes, escapes still
/// raw) into bytes, honoring `\x`, `\u`, `\U`, octal escapes `\0`-`\7`, and the standard
/// single-character escapes. Returns `None` on an invalid escape sequence.
pub fn decode_escapes(body: &str) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        let e = chars.next()?;
        match e {
            '0'..='7' => {
                let mut val = e.to_digit(8).unwrap();
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(d) => {
                            val = val * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(val as u8);
            }
            'n' => out.push(b'\n'),
            't' => out.push(b'\t'),
            'r' => out.push(b'\r'),
            'a' => out.push(0x07),
            'b' => out.push(0x08),
            'f' => out.push(0x0C),
            'v' => out.push(0x0B),
            '\\' => out.push(b'\\'),
            '\'' => out.push(b'\''),
            '"' => out.push(b'"'),
            '?' => out.push(b'?'),
            'x' => {
                let mut val: u32 = 0;
                while let Some(d) = chars.peek().and_then(|c| c.to_digit(16)) {
                    val = val * 16 + d;
                    chars.next();
                }
                push_codepoint(&mut out, val);
            }
            'u' => {
                let val = take_hex(&mut chars, 4)?;
                push_codepoint(&mut out, val);
            }
            'U' => {
                let val = take_hex(&mut chars, 8)?;
                push_codepoint(&mut out, val);
            }
            _ => return None,
        }
    }
    Some(out)
}

fn take_hex(chars: &mut std::iter::Peekable<std::str::Chars>, n: usize) -> Option<u32> {
    let mut val = 0u32;
    for _ in 0..n {
        let d = chars.next()?.to_digit(16)?;
        val = val * 16 + d;
    }
    Some(val)
}

fn push_codepoint(out: &mut Vec<u8>, cp: u32) {
    match char::from_u32(cp) {
        Some(c) => {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        }
        None => out.extend_from_slice(&cp.to_le_bytes()),
    }
}

/// Widens two adjacent string/char literal kinds to the more permissive of the two, per
/// spec.md §9's resolution ("widen to the most permissive and warn on narrowing"). Returns
/// `(widened_kind, was_narrowing)`.
pub fn widen_str_kind(a: StrKind, b: StrKind) -> (StrKind, bool) {
    let rank = |k: StrKind| match k {
        StrKind::Char => 0,
        StrKind::Utf8 => 1,
        StrKind::Char16 => 2,
        StrKind::Wide => 3,
        StrKind::Char32 => 4,
    };
    if rank(a) >= rank(b) {
        (a, rank(b) != 0 && rank(b) < rank(a))
    } else {
        (b, rank(a) != 0 && rank(a) < rank(b))
    }
}

/// Re-parses a collected preprocessing-number token (spec.md §4.3's permissive grammar) into
/// an integer or floating value, honoring `0x`/`0b`/`0` prefixes, `u`/`l`/`ll`/`f`/`L`
/// suffixes, and `'` digit separators. Returns `None` if the spelling is not a valid C number
/// once the permissive characters are stripped down to an actual numeral.
pub fn reparse_pp_number(spelling: &str) -> Option<(NumValue, bool /* is_float */)> {
    let cleaned: String = spelling.chars().filter(|&c| c != '\'').collect();
    let lower = cleaned.to_ascii_lowercase();

    if lower.contains('.')
        || (!lower.starts_with("0x") && (lower.contains('e')) && !lower.ends_with("e"))
        || (lower.starts_with("0x") && lower.contains('p'))
    {
        return parse_float(&cleaned).map(|f| (NumValue::Float(f), true));
    }

    let (digits, radix) = if let Some(rest) = lower.strip_prefix("0x") {
        (rest, 16)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (rest, 2)
    } else if lower.starts_with('0') && lower.len() > 1 && lower.chars().nth(1).unwrap().is_ascii_digit() {
        (&lower[1..], 8)
    } else {
        (lower.as_str(), 10)
    };

    let mut end = 0;
    for (i, c) in digits.char_indices() {
        if c.is_digit(radix) {
            end = i + c.len_utf8();
        } else {
            break;
        }
    }
    let numeral = &digits[..end];
    let suffix = &digits[end..];
    let is_unsigned = suffix.contains('u');

    if numeral.is_empty() {
        return None;
    }
    i64::from_str_radix(numeral, radix)
        .ok()
        .or_else(|| u64::from_str_radix(numeral, radix).ok().map(|v| v as i64))
        .map(|v| (NumValue::Int(v, is_unsigned), false))
}

fn parse_float(s: &str) -> Option<f64> {
    let trimmed = s.trim_end_matches(|c: char| "fFlL".contains(c));
    trimmed.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_simple_escapes() {
        assert_eq!(decode_escapes("a\\nb").unwrap(), b"a\nb");
        assert_eq!(decode_escapes("\\\"").unwrap(), b"\"");
    }

    #[test]
    fn decodes_hex_escape() {
        assert_eq!(decode_escapes("\\x41").unwrap(), b"A");
    }

    #[test]
    fn decodes_octal_escape() {
        assert_eq!(decode_escapes("\\101").unwrap(), b"A");
    }

    #[test]
    fn reparses_decimal_integer() {
        let (v, is_float) = reparse_pp_number("42").unwrap();
        assert!(!is_float);
        assert!(matches!(v, NumValue::Int(42, false)));
    }

    #[test]
    fn reparses_hex_with_suffix() {
        let (v, _) = reparse_pp_number("0x2Au").unwrap();
        assert!(matches!(v, NumValue::Int(42, true)));
    }

    #[test]
    fn reparses_float() {
        let (v, is_float) = reparse_pp_number("3.14").unwrap();
        assert!(is_float);
        match v {
            NumValue::Float(f) => assert!((f - 3.14).abs() < 1e-9),
            _ => panic!("expected float"),
        }
    }

    #[test]
    fn widen_picks_most_permissive() {
        let (k, narrow) = widen_str_kind(StrKind::Char, StrKind::Wide);
        assert_eq!(k, StrKind::Wide);
        assert!(!narrow);
        let (k2, narrow2) = widen_str_kind(StrKind::Wide, StrKind::Char);
        assert_eq!(k2, StrKind::Wide);
        assert!(narrow2);
    }
}
