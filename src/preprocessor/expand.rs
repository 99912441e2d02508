//! Macro expansion: the hide-set algorithm (Dave Prosser's algorithm, as described informally
//! in the C standard's macro-replacement section). Adapted to this crate's flat `Vec<Token>`
//! token stream (see `token.rs`'s module doc) rather than a literal linked list: expansion
//! walks the stream with an index, and replacing a macro invocation is a `Vec::splice` of the
//! substituted tokens back into the stream at the call site, after which the same index is
//! re-examined so the freshly spliced-in tokens get a chance to expand again (the algorithm's
//! "rescan").

use std::rc::Rc;

use crate::diagnostics::{Diagnostic, Fatal, Severity};
use crate::intern::{Interner, Sym};
use crate::source::{FileId, SourceManager};
use crate::token::{HideSet, NumValue, Provenance, StrKind, Token, TokenKind};

use super::macro_table::{BuiltinEnv, Macro, MacroTable};

/// Expands every macro invocation in `input` to a fixed point and returns the resulting token
/// stream. `input` must not contain directive lines (the caller splits those out first).
#[allow(clippy::too_many_arguments)]
pub fn expand_tokens(
    input: Vec<Token>,
    macros: &MacroTable,
    interner: &mut Interner,
    sources: &SourceManager,
    counter: &mut u32,
    date: &str,
    time: &str,
    diags: &mut crate::diagnostics::Diagnostics,
) -> Result<Vec<Token>, Fatal> {
    let mut stream = input;
    let mut i = 0usize;
    while i < stream.len() {
        if stream[i].is_eof() {
            i += 1;
            continue;
        }
        if !stream[i].is_ident() && stream[i].kind != TokenKind::Keyword {
            i += 1;
            continue;
        }
        let name = stream[i].text.clone();
        let name_sym = interner.intern(&name);
        if stream[i].hideset.contains(name_sym) {
            i += 1;
            continue;
        }
        let Some(m) = macros.get(&name) else {
            i += 1;
            continue;
        };

        if m.is_builtin {
            let handler = m.handler.expect("builtin macro missing handler");
            let (file_name, line) = sources.display_location(stream[i].prov.file, stream[i].prov.line);
            let mut env = BuiltinEnv {
                file_name: &file_name,
                line,
                date,
                time,
                counter,
            };
            let replaced = handler(&mut env, &stream[i]);
            stream[i] = replaced;
            i += 1;
            continue;
        }

        if m.is_object_like {
            let hs = stream[i].hideset.with(name_sym);
            let leading = stream[i].prov.clone();
            let origin = Rc::new(stream[i].clone());
            let body = substitute_object_like(&m.body, &hs, &origin, &leading);
            stream.splice(i..i + 1, body);
            continue;
        }

        // Function-like macro: only invoked if immediately followed by `(`.
        let Some(open_paren) = next_non_eof(&stream, i + 1) else {
            i += 1;
            continue;
        };
        if !stream[open_paren].is("(") {
            i += 1;
            continue;
        }
        let Some((args, close_paren)) = collect_arguments(&stream, open_paren) else {
            diags.report(Diagnostic::new(
                Severity::Error,
                Some(stream[i].prov.file),
                format!("<file {}>", stream[i].prov.file.0),
                stream[i].prov.line,
                stream[i].prov.col,
                format!("unterminated argument list invoking macro '{}'", name),
            ))?;
            i += 1;
            continue;
        };
        if !m.is_variadic && args.len() > m.params.len() && !(m.params.is_empty() && args.len() == 1 && args[0].is_empty()) {
            diags.report(Diagnostic::new(
                Severity::Error,
                Some(stream[i].prov.file),
                format!("<file {}>", stream[i].prov.file.0),
                stream[i].prov.line,
                stream[i].prov.col,
                format!("macro '{}' passed too many arguments", name),
            ))?;
        }

        let hs = stream[i].hideset.intersection(&stream[close_paren].hideset).with(name_sym);
        let origin = Rc::new(stream[i].clone());
        let body = substitute_function_like(m, &args, macros, interner, sources, counter, date, time, &hs, &origin, diags)?;
        stream.splice(i..close_paren + 1, body);
    }
    Ok(stream)
}

fn next_non_eof(stream: &[Token], mut i: usize) -> Option<usize> {
    while i < stream.len() {
        if !stream[i].is_eof() {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Collects the comma-separated argument token lists between a `(` at `open` and its matching
/// `)`, honoring nested parens. Returns the argument lists and the index of the closing `)`.
fn collect_arguments(stream: &[Token], open: usize) -> Option<(Vec<Vec<Token>>, usize)> {
    let mut depth = 0i32;
    let mut args: Vec<Vec<Token>> = vec![Vec::new()];
    let mut i = open;
    loop {
        if i >= stream.len() || stream[i].is_eof() {
            return None;
        }
        let t = &stream[i];
        if t.is("(") {
            depth += 1;
            if depth > 1 {
                args.last_mut().unwrap().push(t.clone());
            }
        } else if t.is(")") {
            depth -= 1;
            if depth == 0 {
                if args.len() == 1 && args[0].is_empty() {
                    args.clear();
                }
                return Some((args, i));
            }
            args.last_mut().unwrap().push(t.clone());
        } else if t.is(",") && depth == 1 {
            args.push(Vec::new());
        } else if depth >= 1 {
            args.last_mut().unwrap().push(t.clone());
        }
        i += 1;
    }
}

fn substitute_object_like(body: &[Token], hs: &HideSet, origin: &Rc<Token>, at: &Provenance) -> Vec<Token> {
    body.iter()
        .enumerate()
        .map(|(idx, t)| {
            let mut nt = t.clone();
            nt.hideset = nt.hideset.union(hs);
            nt.origin = Some(origin.clone());
            nt.prov.file = at.file;
            nt.prov.line = at.line;
            nt.prov.at_beginning_of_line = idx == 0 && at.at_beginning_of_line;
            nt.prov.has_leading_space = if idx == 0 { at.has_leading_space } else { nt.prov.has_leading_space };
            nt
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn substitute_function_like(
    m: &Macro,
    args: &[Vec<Token>],
    macros: &MacroTable,
    interner: &mut Interner,
    sources: &SourceManager,
    counter: &mut u32,
    date: &str,
    time: &str,
    hs: &HideSet,
    origin: &Rc<Token>,
    diags: &mut crate::diagnostics::Diagnostics,
) -> Result<Vec<Token>, Fatal> {
    let param_index = |name: &str| -> Option<usize> { m.params.iter().position(|p| p == name) };
    let variadic_args: Vec<Token> = if m.is_variadic {
        let mut v = Vec::new();
        for (i, a) in args.iter().enumerate().skip(m.params.len()) {
            if i > m.params.len() {
                v.push(comma_token());
            }
            v.extend(a.iter().cloned());
        }
        v
    } else {
        Vec::new()
    };

    let mut out = Vec::new();
    let mut i = 0usize;
    while i < m.body.len() {
        let t = &m.body[i];

        if t.is("#") && i + 1 < m.body.len() {
            let next = &m.body[i + 1];
            if let Some(pi) = param_index(&next.text) {
                out.push(stringize(args.get(pi).map(Vec::as_slice).unwrap_or(&[]), origin));
                i += 2;
                continue;
            }
            if next.text == "__VA_ARGS__" && m.is_variadic {
                out.push(stringize(&variadic_args, origin));
                i += 2;
                continue;
            }
        }

        if next_is_paste(&m.body, i) {
            let lhs = expand_paste_operand(t, &param_index, args, &variadic_args, m.is_variadic);
            out.extend(lhs);
            i += 1;
            continue;
        }
        if i > 0 && m.body[i - 1].text == "##" {
            let rhs = expand_paste_operand(t, &param_index, args, &variadic_args, m.is_variadic);
            paste_onto(&mut out, rhs);
            i += 1;
            continue;
        }

        if t.text == "__VA_OPT__" && m.is_variadic && i + 1 < m.body.len() && m.body[i + 1].is("(") {
            let mut depth = 0i32;
            let mut j = i + 1;
            let mut inner = Vec::new();
            while j < m.body.len() {
                if m.body[j].is("(") {
                    depth += 1;
                    if depth > 1 {
                        inner.push(m.body[j].clone());
                    }
                } else if m.body[j].is(")") {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    inner.push(m.body[j].clone());
                } else {
                    inner.push(m.body[j].clone());
                }
                j += 1;
            }
            if !variadic_args.is_empty() {
                out.extend(substitute_function_like(
                    &Macro::function_like(m.name.as_str(), m.params.clone(), m.is_variadic, inner),
                    args,
                    macros,
                    interner,
                    sources,
                    counter,
                    date,
                    time,
                    hs,
                    origin,
                    diags,
                )?);
            }
            i = j + 1;
            continue;
        }

        if let Some(pi) = param_index(&t.text) {
            let expanded = expand_tokens(
                args.get(pi).cloned().unwrap_or_default(),
                macros,
                interner,
                sources,
                counter,
                date,
                time,
                diags,
            )?;
            out.extend(expanded);
            i += 1;
            continue;
        }
        if t.text == "__VA_ARGS__" && m.is_variadic {
            let expanded = expand_tokens(variadic_args.clone(), macros, interner, sources, counter, date, time, diags)?;
            out.extend(expanded);
            i += 1;
            continue;
        }

        out.push(t.clone());
        i += 1;
    }

    Ok(out
        .into_iter()
        .map(|mut t| {
            t.hideset = t.hideset.union(hs);
            t.origin = Some(origin.clone());
            t.prov.file = origin.prov.file;
            t.prov.line = origin.prov.line;
            t
        })
        .collect())
}

fn next_is_paste(body: &[Token], i: usize) -> bool {
    body.get(i + 1).map(|t| t.text == "##").unwrap_or(false)
}

fn expand_paste_operand(
    t: &Token,
    param_index: &dyn Fn(&str) -> Option<usize>,
    args: &[Vec<Token>],
    variadic_args: &[Token],
    is_variadic: bool,
) -> Vec<Token> {
    if let Some(pi) = param_index(&t.text) {
        return args.get(pi).cloned().unwrap_or_default();
    }
    if is_variadic && t.text == "__VA_ARGS__" {
        return variadic_args.to_vec();
    }
    vec![t.clone()]
}

/// Pastes the first token of `rhs` onto the last token of `out` by literal spelling
/// concatenation, re-lexing as either a punctuator, identifier, or preprocessing number
/// depending on the resulting text's shape. Any remaining tokens in `rhs` are appended as-is.
fn paste_onto(out: &mut Vec<Token>, mut rhs: Vec<Token>) {
    if rhs.is_empty() {
        return;
    }
    let Some(last) = out.pop() else {
        out.extend(rhs);
        return;
    };
    let first = rhs.remove(0);
    let combined = format!("{}{}", last.text, first.text);
    out.push(relex_pasted(&combined, &last));
    out.extend(rhs);
}

fn relex_pasted(text: &str, like: &Token) -> Token {
    let kind = if text.is_empty() {
        TokenKind::Punct
    } else if crate::unicode::is_identifier_start(text.chars().next().unwrap()) {
        TokenKind::Identifier
    } else if text.chars().next().unwrap().is_ascii_digit() {
        TokenKind::PpNum
    } else {
        TokenKind::Punct
    };
    Token {
        kind,
        text: text.to_string(),
        prov: like.prov.clone(),
        num: NumValue::None,
        str_val: None,
        hideset: HideSet::empty(),
        origin: None,
        keyword: None,
    }
}

fn stringize(toks: &[Token], like: &Token) -> Token {
    let mut s = String::new();
    for (i, t) in toks.iter().enumerate() {
        if i > 0 && t.prov.has_leading_space {
            s.push(' ');
        }
        if t.kind == TokenKind::Str {
            for c in t.text.chars() {
                if c == '"' || c == '\\' {
                    s.push('\\');
                }
                s.push(c);
            }
        } else {
            s.push_str(&t.text);
        }
    }
    Token {
        kind: TokenKind::Str,
        text: format!("\"{}\"", s),
        prov: like.prov.clone(),
        num: NumValue::None,
        str_val: Some((s.into_bytes(), StrKind::Utf8)),
        hideset: HideSet::empty(),
        origin: None,
        keyword: None,
    }
}

pub(crate) fn comma_token() -> Token {
    Token {
        kind: TokenKind::Punct,
        text: ",".to_string(),
        prov: Provenance {
            file: FileId(0),
            line: 0,
            col: 0,
            at_beginning_of_line: false,
            has_leading_space: false,
        },
        num: NumValue::None,
        str_val: None,
        hideset: HideSet::empty(),
        origin: None,
        keyword: None,
    }
}

/// Builtin handler for `__FILE__`.
pub fn builtin_file(env: &mut BuiltinEnv<'_>, like: &Token) -> Token {
    string_token(&env.file_name.replace('\\', "\\\\"), like)
}

/// Builtin handler for `__LINE__`.
pub fn builtin_line(env: &mut BuiltinEnv<'_>, like: &Token) -> Token {
    int_token(env.line as i64, like)
}

/// Builtin handler for `__DATE__`.
pub fn builtin_date(env: &mut BuiltinEnv<'_>, like: &Token) -> Token {
    string_token(env.date, like)
}

/// Builtin handler for `__TIME__`.
pub fn builtin_time(env: &mut BuiltinEnv<'_>, like: &Token) -> Token {
    string_token(env.time, like)
}

/// Builtin handler for `__COUNTER__`: increments on every expansion.
pub fn builtin_counter(env: &mut BuiltinEnv<'_>, like: &Token) -> Token {
    let v = *env.counter;
    *env.counter += 1;
    int_token(v as i64, like)
}

fn string_token(s: &str, like: &Token) -> Token {
    Token {
        kind: TokenKind::Str,
        text: format!("\"{}\"", s),
        prov: like.prov.clone(),
        num: NumValue::None,
        str_val: Some((s.as_bytes().to_vec(), StrKind::Utf8)),
        hideset: like.hideset.clone(),
        origin: None,
        keyword: None,
    }
}

pub(crate) fn int_token(v: i64, like: &Token) -> Token {
    Token {
        kind: TokenKind::Num,
        text: v.to_string(),
        prov: like.prov.clone(),
        num: NumValue::Int(v, false),
        str_val: None,
        hideset: like.hideset.clone(),
        origin: None,
        keyword: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::diagnostics::Diagnostics;
    use std::rc::Rc as StdRc;

    fn tok(kind: TokenKind, text: &str) -> Token {
        Token {
            kind,
            text: text.to_string(),
            prov: Provenance {
                file: FileId(0),
                line: 1,
                col: 1,
                at_beginning_of_line: false,
                has_leading_space: true,
            },
            num: NumValue::None,
            str_val: None,
            hideset: HideSet::empty(),
            origin: None,
            keyword: None,
        }
    }

    #[test]
    fn expands_object_like_macro() {
        let mut macros = MacroTable::new();
        macros.define(Macro::object_like("FOO", vec![tok(TokenKind::Num, "42")]));
        let arena = StdRc::new(Arena::new());
        let mut interner = Interner::new(arena);
        let mut diags = Diagnostics::new();
        let mut counter = 0u32;
        let sources = crate::source::SourceManager::new();
        let input = vec![tok(TokenKind::Identifier, "FOO")];
        let out = expand_tokens(input, &macros, &mut interner, &sources, &mut counter, "", "", &mut diags).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "42");
    }

    #[test]
    fn self_referential_macro_does_not_loop() {
        let mut macros = MacroTable::new();
        macros.define(Macro::object_like("FOO", vec![tok(TokenKind::Identifier, "FOO")]));
        let arena = StdRc::new(Arena::new());
        let mut interner = Interner::new(arena);
        let mut diags = Diagnostics::new();
        let mut counter = 0u32;
        let sources = crate::source::SourceManager::new();
        let input = vec![tok(TokenKind::Identifier, "FOO")];
        let out = expand_tokens(input, &macros, &mut interner, &sources, &mut counter, "", "", &mut diags).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "FOO");
    }

    #[test]
    fn function_like_macro_substitutes_arguments() {
        let mut macros = MacroTable::new();
        macros.define(Macro::function_like(
            "ADD",
            vec!["a".into(), "b".into()],
            false,
            vec![tok(TokenKind::Identifier, "a"), tok(TokenKind::Punct, "+"), tok(TokenKind::Identifier, "b")],
        ));
        let arena = StdRc::new(Arena::new());
        let mut interner = Interner::new(arena);
        let mut diags = Diagnostics::new();
        let mut counter = 0u32;
        let sources = crate::source::SourceManager::new();
        let input = vec![
            tok(TokenKind::Identifier, "ADD"),
            tok(TokenKind::Punct, "("),
            tok(TokenKind::Num, "1"),
            tok(TokenKind::Punct, ","),
            tok(TokenKind::Num, "2"),
            tok(TokenKind::Punct, ")"),
        ];
        let out = expand_tokens(input, &macros, &mut interner, &sources, &mut counter, "", "", &mut diags).unwrap();
        let texts: Vec<&str> = out.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["1", "+", "2"]);
    }

    #[test]
    fn stringize_operator_quotes_argument() {
        let mut macros = MacroTable::new();
        macros.define(Macro::function_like(
            "STR",
            vec!["x".into()],
            false,
            vec![tok(TokenKind::Punct, "#"), tok(TokenKind::Identifier, "x")],
        ));
        let arena = StdRc::new(Arena::new());
        let mut interner = Interner::new(arena);
        let mut diags = Diagnostics::new();
        let mut counter = 0u32;
        let sources = crate::source::SourceManager::new();
        let input = vec![
            tok(TokenKind::Identifier, "STR"),
            tok(TokenKind::Punct, "("),
            tok(TokenKind::Identifier, "hi"),
            tok(TokenKind::Punct, ")"),
        ];
        let out = expand_tokens(input, &macros, &mut interner, &sources, &mut counter, "", "", &mut diags).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "\"hi\"");
    }

    #[test]
    fn paste_operator_concatenates_tokens() {
        let mut macros = MacroTable::new();
        macros.define(Macro::function_like(
            "CAT",
            vec!["a".into(), "b".into()],
            false,
            vec![
                tok(TokenKind::Identifier, "a"),
                tok(TokenKind::Punct, "##"),
                tok(TokenKind::Identifier, "b"),
            ],
        ));
        let arena = StdRc::new(Arena::new());
        let mut interner = Interner::new(arena);
        let mut diags = Diagnostics::new();
        let mut counter = 0u32;
        let sources = crate::source::SourceManager::new();
        let input = vec![
            tok(TokenKind::Identifier, "CAT"),
            tok(TokenKind::Punct, "("),
            tok(TokenKind::Identifier, "foo"),
            tok(TokenKind::Punct, ","),
            tok(TokenKind::Identifier, "bar"),
            tok(TokenKind::Punct, ")"),
        ];
        let out = expand_tokens(input, &macros, &mut interner, &sources, &mut counter, "", "", &mut diags).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "foobar");
    }

    #[test]
    fn builtin_file_resolves_the_real_source_path() {
        let mut macros = MacroTable::new();
        macros.define(Macro::builtin("__FILE__", builtin_file));
        let arena = StdRc::new(Arena::new());
        let mut interner = Interner::new(arena);
        let mut diags = Diagnostics::new();
        let mut counter = 0u32;
        let mut sources = crate::source::SourceManager::new();
        let file = sources.add_virtual("real_name.c", b"".to_vec());
        let mut t = tok(TokenKind::Identifier, "__FILE__");
        t.prov.file = file;
        let out = expand_tokens(vec![t], &macros, &mut interner, &sources, &mut counter, "", "", &mut diags).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "\"real_name.c\"");
    }

    #[test]
    fn builtin_file_honors_a_line_directive_display_name() {
        let mut macros = MacroTable::new();
        macros.define(Macro::builtin("__LINE__", builtin_line));
        let arena = StdRc::new(Arena::new());
        let mut interner = Interner::new(arena);
        let mut diags = Diagnostics::new();
        let mut counter = 0u32;
        let mut sources = crate::source::SourceManager::new();
        let file = sources.add_virtual("real_name.c", b"".to_vec());
        sources.get_mut(file).display_name = "renamed.h".into();
        sources.get_mut(file).line_delta = 99;
        let mut t = tok(TokenKind::Identifier, "__LINE__");
        t.prov.file = file;
        t.prov.line = 1;
        let out = expand_tokens(vec![t], &macros, &mut interner, &sources, &mut counter, "", "", &mut diags).unwrap();
        assert_eq!(out[0].text, "100");
    }
}
