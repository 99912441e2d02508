//! Tokenizer: turns a [`crate::source::File`] into a flat stream of [`Token`]s.
//!
//! Handles line splicing, comment stripping, identifier/keyword/number/string/punctuator
//! recognition, and per-token provenance (`at_beginning_of_line`, `has_leading_space`) that
//! the preprocessor depends on for directive detection and stringification. Keyword
//! promotion is deliberately deferred: spec.md §4.3 requires raw tokenization to leave
//! keyword-spelled identifiers as plain identifiers so that a macro named like a keyword
//! still expands, and promotes them only after preprocessing via [`convert_pp_tokens`].

pub mod literals;
pub mod punct;

use crate::diagnostics::{Diagnostic, Diagnostics, Severity};
use crate::intern::Interner;
use crate::source::FileId;
use crate::token::{HideSet, NumValue, Provenance, StrKind, Token, TokenKind};
use crate::unicode;

/// The C keyword set. Kept as a flat list rather than a `match` so `is_keyword` and the
/// promotion pass share one source of truth.
pub const KEYWORDS: &[&str] = &[
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
    "enum", "extern", "float", "for", "goto", "if", "inline", "int", "long", "register",
    "restrict", "return", "short", "signed", "sizeof", "static", "struct", "switch", "typedef",
    "union", "unsigned", "void", "volatile", "while",
    "_Alignas", "_Alignof", "_Atomic", "_Bool", "_Complex", "_Generic", "_Imaginary", "_Noreturn",
    "_Static_assert", "_Thread_local", "constexpr", "typeof", "typeof_unqual", "_Pragma",
];

pub fn is_keyword(s: &str) -> bool {
    KEYWORDS.contains(&s)
}

struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    col: u32,
    file: FileId,
    at_bol: bool,
    leading_space: bool,
    tokens: Vec<Token>,
}

/// Tokenizes `text` (already NUL-terminated by [`crate::source::SourceManager`]) belonging to
/// `file`. Backslash-newline splices are elided before scanning proper begins; trigraphs are
/// not implemented (disabled-by-default policy, spec.md §4.3 and `SPEC_FULL.md` §4.3).
pub fn tokenize(file: FileId, text: &[u8], diags: &mut Diagnostics) -> Result<Vec<Token>, crate::diagnostics::Fatal> {
    let spliced = splice_lines(text);
    let mut scanner = Scanner {
        bytes: &spliced,
        pos: 0,
        line: 1,
        col: 1,
        file,
        at_bol: true,
        leading_space: false,
        tokens: Vec::new(),
    };
    scanner.run(diags)?;
    Ok(scanner.tokens)
}

/// Elides a backslash immediately followed by a newline (optionally `\r\n`), per spec.md
/// §4.3's line-splicing rule. Runs before any other scanning so it also applies inside what
/// will become string/character literals and comments, matching the standard's phase 2.
fn splice_lines(text: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut i = 0;
    while i < text.len() {
        if text[i] == b'\\' && i + 1 < text.len() {
            if text[i + 1] == b'\n' {
                i += 2;
                continue;
            }
            if text[i + 1] == b'\r' && i + 2 < text.len() && text[i + 2] == b'\n' {
                i += 3;
                continue;
            }
        }
        out.push(text[i]);
        i += 1;
    }
    out
}

impl<'a> Scanner<'a> {
    fn peek(&self) -> u8 {
        *self.bytes.get(self.pos).unwrap_or(&0)
    }

    fn peek_at(&self, offset: usize) -> u8 {
        *self.bytes.get(self.pos + offset).unwrap_or(&0)
    }

    fn advance(&mut self) -> u8 {
        let c = self.peek();
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        c
    }

    fn run(&mut self, diags: &mut Diagnostics) -> Result<(), crate::diagnostics::Fatal> {
        loop {
            self.skip_whitespace_and_comments(diags)?;
            if self.peek() == 0 {
                break;
            }
            self.scan_one(diags)?;
        }
        let (line, col) = (self.line, self.col);
        let at_bol = self.at_bol;
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            text: String::new(),
            prov: Provenance {
                file: self.file,
                line,
                col,
                at_beginning_of_line: at_bol,
                has_leading_space: self.leading_space,
            },
            num: NumValue::None,
            str_val: None,
            hideset: HideSet::empty(),
            origin: None,
            keyword: None,
        });
        Ok(())
    }

    fn skip_whitespace_and_comments(&mut self, diags: &mut Diagnostics) -> Result<(), crate::diagnostics::Fatal> {
        loop {
            match self.peek() {
                b'\n' => {
                    self.advance();
                    self.at_bol = true;
                    self.leading_space = false;
                }
                b' ' | b'\t' | 0x0B | 0x0C | b'\r' => {
                    self.advance();
                    self.leading_space = true;
                }
                b'/' if self.peek_at(1) == b'/' => {
                    while self.peek() != b'\n' && self.peek() != 0 {
                        self.advance();
                    }
                    self.leading_space = true;
                }
                b'/' if self.peek_at(1) == b'*' => {
                    let (line, col) = (self.line, self.col);
                    self.advance();
                    self.advance();
                    let mut closed = false;
                    while self.peek() != 0 {
                        if self.peek() == b'*' && self.peek_at(1) == b'/' {
                            self.advance();
                            self.advance();
                            closed = true;
                            break;
                        }
                        self.advance();
                    }
                    if !closed {
                        diags.report(Diagnostic::new(
                            Severity::Error,
                            Some(self.file),
                            file_name_placeholder(),
                            line,
                            col,
                            "unterminated comment",
                        ))?;
                    }
                    self.leading_space = true;
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn scan_one(&mut self, diags: &mut Diagnostics) -> Result<(), crate::diagnostics::Fatal> {
        let (line, col) = (self.line, self.col);
        let at_bol = self.at_bol;
        let has_space = self.leading_space;
        self.at_bol = false;
        self.leading_space = false;

        let c = unicode::decode_utf8(&self.bytes[self.pos..]).0;

        let (kind, text, num, str_val) = if unicode::is_identifier_start(c) {
            let spelling = self.scan_identifier_text();
            if let Some(prefix_kind) = string_prefix_kind(&spelling) {
                if self.peek() == b'"' || self.peek() == b'\'' {
                    let quote = self.advance() as char;
                    self.scan_string(quote, prefix_kind, diags, line, col)?
                } else {
                    (TokenKind::Identifier, spelling, NumValue::None, None)
                }
            } else {
                (TokenKind::Identifier, spelling, NumValue::None, None)
            }
        } else if c.is_ascii_digit() || (c == '.' && self.peek_at(1).is_ascii_digit()) {
            self.scan_pp_number()
        } else if c == '"' {
            self.scan_string('"', StrKind::Utf8, diags, line, col)?
        } else if c == '\'' {
            self.scan_string('\'', StrKind::Char, diags, line, col)?
        } else {
            self.scan_punct_or_error(diags, line, col)?
        };

        self.tokens.push(Token {
            kind,
            text,
            prov: Provenance {
                file: self.file,
                line,
                col,
                at_beginning_of_line: at_bol,
                has_leading_space: has_space,
            },
            num,
            str_val,
            hideset: HideSet::empty(),
            origin: None,
            keyword: None,
        });
        Ok(())
    }

    /// Scans a run of identifier characters and returns its spelling, without deciding
    /// whether it is a string-literal encoding prefix (`L`, `u`, `U`, `u8`) — that decision
    /// belongs to the caller, which has access to the real diagnostic sink.
    fn scan_identifier_text(&mut self) -> String {
        let start = self.pos;
        loop {
            let (c, len) = unicode::decode_utf8(&self.bytes[self.pos..]);
            if len == 0 || !unicode::is_identifier_continue(c) {
                break;
            }
            for _ in 0..len {
                self.advance();
            }
        }
        String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned()
    }

    fn scan_pp_number(&mut self) -> (TokenKind, String, NumValue, Option<(Vec<u8>, StrKind)>) {
        let start = self.pos;
        self.advance();
        loop {
            let c = self.peek() as char;
            if (c == 'e' || c == 'E' || c == 'p' || c == 'P')
                && matches!(self.peek_at(1), b'+' | b'-')
            {
                self.advance();
                self.advance();
                continue;
            }
            if c.is_ascii_alphanumeric() || c == '.' || c == '\'' {
                self.advance();
                continue;
            }
            break;
        }
        let spelling = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
        (TokenKind::PpNum, spelling, NumValue::None, None)
    }

    fn scan_string(
        &mut self,
        quote: char,
        kind: StrKind,
        diags: &mut Diagnostics,
        line: u32,
        col: u32,
    ) -> Result<(TokenKind, String, NumValue, Option<(Vec<u8>, StrKind)>), crate::diagnostics::Fatal> {
        let q = quote as u8;
        if self.peek() == q {
            self.advance();
        }
        let start = self.pos;
        loop {
            match self.peek() {
                0 | b'\n' => {
                    diags.report(Diagnostic::new(
                        Severity::Error,
                        Some(self.file),
                        file_name_placeholder(),
                        line,
                        col,
                        "unterminated literal",
                    ))?;
                    break;
                }
                b'\\' => {
                    self.advance();
                    if self.peek() != 0 {
                        self.advance();
                    }
                }
                c if c == q => break,
                _ => {
                    self.advance();
                }
            }
        }
        let body_end = self.pos;
        if self.peek() != 0 {
            self.advance();
        }
        let raw = String::from_utf8_lossy(&self.bytes[start..body_end]).into_owned();
        let mut decoded = match literals::decode_escapes(&raw) {
            Some(bytes) => bytes,
            None => {
                diags.report(Diagnostic::new(
                    Severity::Error,
                    Some(self.file),
                    file_name_placeholder(),
                    line,
                    col,
                    "invalid escape sequence",
                ))?;
                raw.clone().into_bytes()
            }
        };
        decoded.push(0);
        let spelling = format!("{}{}{}", quote, raw, quote);
        Ok((TokenKind::Str, spelling, NumValue::None, Some((decoded, kind))))
    }

    fn scan_punct_or_error(
        &mut self,
        diags: &mut Diagnostics,
        line: u32,
        col: u32,
    ) -> Result<(TokenKind, String, NumValue, Option<(Vec<u8>, StrKind)>), crate::diagnostics::Fatal> {
        let rest = std::str::from_utf8(&self.bytes[self.pos..]).unwrap_or_default();
        if let Some(p) = punct::match_longest(rest) {
            for _ in 0..p.len() {
                self.advance();
            }
            return Ok((TokenKind::Punct, p.to_string(), NumValue::None, None));
        }
        let (c, len) = unicode::decode_utf8(&self.bytes[self.pos..]);
        for _ in 0..len.max(1) {
            self.advance();
        }
        diags.report(Diagnostic::new(
            Severity::Error,
            Some(self.file),
            file_name_placeholder(),
            line,
            col,
            format!("stray character '{}' in program", c),
        ))?;
        Ok((TokenKind::Punct, String::new(), NumValue::None, None))
    }
}

/// Maps an identifier spelling to the string-literal encoding it prefixes, if any.
fn string_prefix_kind(spelling: &str) -> Option<StrKind> {
    match spelling {
        "L" => Some(StrKind::Wide),
        "u" => Some(StrKind::Char16),
        "U" => Some(StrKind::Char32),
        "u8" => Some(StrKind::Utf8),
        _ => None,
    }
}

/// Placeholder used by lexer-internal diagnostics before the caller has attached the real
/// file-name string (the `Session` fills in `file_name` from its `SourceManager` when it
/// re-reports tokenizer diagnostics; see `session.rs`).
fn file_name_placeholder() -> &'static str {
    "<source>"
}

/// Promotes keyword-spelled identifiers to `TokenKind::Keyword` and re-parses every
/// `PpNum` token into a concrete integer/floating `Num`, per spec.md §4.3. Must run exactly
/// once, after preprocessing has finished (macro expansion must see raw identifiers).
pub fn convert_pp_tokens(tokens: &mut [Token], interner: &mut Interner, diags: &mut Diagnostics) -> Result<(), crate::diagnostics::Fatal> {
    for tok in tokens.iter_mut() {
        match tok.kind {
            TokenKind::Identifier if is_keyword(&tok.text) => {
                tok.kind = TokenKind::Keyword;
                tok.keyword = Some(interner.intern(&tok.text));
            }
            TokenKind::PpNum => {
                match literals::reparse_pp_number(&tok.text) {
                    Some((num, _is_float)) => {
                        tok.kind = TokenKind::Num;
                        tok.num = num;
                    }
                    None => {
                        diags.report(Diagnostic::new(
                            Severity::Error,
                            Some(tok.prov.file),
                            file_name_placeholder(),
                            tok.prov.line,
                            tok.prov.col,
                            format!("invalid numeric constant '{}'", tok.text),
                        ))?;
                        tok.kind = TokenKind::Num;
                        tok.num = NumValue::Int(0, false);
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Token> {
        let mut diags = Diagnostics::new();
        tokenize(FileId(0), src.as_bytes(), &mut diags).unwrap()
    }

    #[test]
    fn tokenizes_identifiers_and_punct() {
        let t = toks("int x = 1;");
        let kinds: Vec<_> = t.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Punct,
                TokenKind::PpNum,
                TokenKind::Punct,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn line_splice_joins_lines() {
        let t = toks("int x \\\n= 1;");
        assert!(!t.iter().any(|tok| tok.text == "\\"));
    }

    #[test]
    fn skips_line_and_block_comments() {
        let t = toks("int /* c */ x // trailing\n= 1;");
        let texts: Vec<_> = t.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["int", "x", "=", "1", ";", ""]);
    }

    #[test]
    fn longest_match_punctuator() {
        let t = toks("a <<= b");
        assert_eq!(t[1].text, "<<=");
    }

    #[test]
    fn at_beginning_of_line_tracks_newlines() {
        let t = toks("a\nb");
        assert!(t[0].prov.at_beginning_of_line);
        assert!(t[1].prov.at_beginning_of_line);
    }

    #[test]
    fn string_literal_decodes_escapes() {
        let t = toks("\"a\\nb\"");
        let (bytes, kind) = t[0].str_val.as_ref().unwrap();
        assert_eq!(bytes, b"a\nb\0");
        assert_eq!(*kind, StrKind::Utf8);
    }

    #[test]
    fn wide_prefixed_string_literal() {
        let t = toks("L\"x\"");
        assert_eq!(t[0].kind, TokenKind::Str);
        assert_eq!(t[0].str_val.as_ref().unwrap().1, StrKind::Wide);
    }

    #[test]
    fn unterminated_literal_recovers() {
        let mut diags = Diagnostics::new();
        let toks = tokenize(FileId(0), b"\"abc", &mut diags).unwrap();
        assert!(diags.has_errors());
        assert!(!toks.is_empty());
    }
}
