//! Token-stream printers: a raw one-token-per-line dump (`-P`/`--print-tokens`) and a
//! preprocessed-source reconstruction (`-E`/`--preprocess`) that honors each token's
//! `at_beginning_of_line`/`has_leading_space` provenance the way a real preprocessor's `-E`
//! output does.

use std::io::{self, Write};

use crate::intern::Interner;
use crate::token::{Token, TokenKind};

fn kind_name(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Identifier => "identifier",
        TokenKind::Keyword => "keyword",
        TokenKind::Punct => "punctuator",
        TokenKind::Str => "string",
        TokenKind::Num => "number",
        TokenKind::PpNum => "preprocessing-number",
        TokenKind::Eof => "eof",
    }
}

/// One line per token: `kind text file:line:col`.
pub fn print(tokens: &[Token], w: &mut impl Write) -> io::Result<()> {
    for t in tokens {
        if t.is_eof() {
            continue;
        }
        writeln!(w, "{:<20} {:<20} {}:{}:{}", kind_name(t.kind), t.text, t.prov.file, t.prov.line, t.prov.col)?;
    }
    Ok(())
}

/// Reconstructs preprocessed source text: a newline before each token that began a new line, a
/// single space before a token carrying leading whitespace that didn't, nothing otherwise.
pub fn print_preprocessed(tokens: &[Token], interner: &Interner, w: &mut impl Write) -> io::Result<()> {
    let mut first = true;
    for t in tokens {
        if t.is_eof() {
            continue;
        }
        if !first {
            if t.prov.at_beginning_of_line {
                writeln!(w)?;
            } else if t.prov.has_leading_space {
                write!(w, " ")?;
            }
        }
        first = false;
        write_spelling(t, interner, w)?;
    }
    writeln!(w)
}

fn write_spelling(t: &Token, interner: &Interner, w: &mut impl Write) -> io::Result<()> {
    if t.kind == TokenKind::Str {
        if let Some((bytes, _)) = &t.str_val {
            return write!(w, "{}", String::from_utf8_lossy(bytes).trim_end_matches('\0'));
        }
    }
    if let Some(sym) = t.keyword {
        return write!(w, "{}", interner.resolve(sym));
    }
    write!(w, "{}", t.text)
}
