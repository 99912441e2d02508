//! Directive dispatch: scans a tokenized file line by line, running `#include`, `#define`,
//! `#if`/`#elif`/`#else`/`#endif`, `#line`, `#pragma`, `#error`/`#warning`, and `#embed`, and
//! macro-expands every non-directive line through [`super::expand`]. This is the preprocessor's
//! main loop; [`super::PpContext::run`] is the only entry point callers outside this module use.

use std::path::PathBuf;

use crate::diagnostics::{Diagnostic, Diagnostics, Fatal, Severity};
use crate::intern::Interner;
use crate::source::{FileId, SourceManager};
use crate::token::{NumValue, Provenance, Token, TokenKind};

use super::cond::CondIncl;
use super::macro_table::Macro;
use super::{embed, expand, include};
use super::PpContext;

pub fn run_file(
    pp: &mut PpContext,
    sources: &mut SourceManager,
    interner: &mut Interner,
    diags: &mut Diagnostics,
    file: FileId,
) -> Result<Vec<Token>, Fatal> {
    if pp.pragma_once.contains_key(file.0 as u64) {
        return Ok(Vec::new());
    }
    let text = sources.get(file).contents.clone();
    let raw = crate::lexer::tokenize(file, &text, diags)?;
    run_tokens(pp, sources, interner, diags, file, raw)
}

fn run_tokens(
    pp: &mut PpContext,
    sources: &mut SourceManager,
    interner: &mut Interner,
    diags: &mut Diagnostics,
    file: FileId,
    tokens: Vec<Token>,
) -> Result<Vec<Token>, Fatal> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i < tokens.len() {
        if tokens[i].is_eof() {
            i += 1;
            continue;
        }
        if tokens[i].is("#") && tokens[i].prov.at_beginning_of_line {
            let start = i;
            let mut j = i + 1;
            while j < tokens.len() && !tokens[j].is_eof() && !tokens[j].prov.at_beginning_of_line {
                j += 1;
            }
            let line = tokens[start + 1..j].to_vec();
            dispatch_directive(pp, sources, interner, diags, &mut out, file, &tokens[start].prov, &line)?;
            i = j;
            continue;
        }

        if !all_active(&pp.cond_stack) {
            i += 1;
            continue;
        }

        let start = i;
        let mut j = i;
        while j < tokens.len() && !tokens[j].is_eof() && !(tokens[j].is("#") && tokens[j].prov.at_beginning_of_line) {
            j += 1;
        }
        let run = tokens[start..j].to_vec();
        let expanded = expand::expand_tokens(run, &pp.macros, interner, sources, &mut pp.counter, &pp.date, &pp.time, diags)?;
        out.extend(expanded);
        i = j;
    }
    Ok(out)
}

fn all_active(stack: &[CondIncl]) -> bool {
    stack.iter().all(|c| c.taking)
}

fn ancestors_active(stack: &[CondIncl]) -> bool {
    stack[..stack.len().saturating_sub(1)].iter().all(|c| c.taking)
}

#[allow(clippy::too_many_arguments)]
fn dispatch_directive(
    pp: &mut PpContext,
    sources: &mut SourceManager,
    interner: &mut Interner,
    diags: &mut Diagnostics,
    out: &mut Vec<Token>,
    file: FileId,
    hash_prov: &Provenance,
    line: &[Token],
) -> Result<(), Fatal> {
    let Some(name_tok) = line.first() else {
        return Ok(());
    };
    if name_tok.kind == TokenKind::Num {
        // GNU linemarker form (`# 1 "file.c" 1 3`): treat like `#line` for location purposes.
        return handle_line(pp, sources, file, line);
    }

    let was_active = all_active(&pp.cond_stack);

    match name_tok.text.as_str() {
        "include" | "include_next" => {
            if !was_active {
                return Ok(());
            }
            handle_include(pp, sources, interner, diags, out, file, hash_prov, &line[1..], name_tok.text == "include_next")
        }
        "define" => {
            if was_active {
                handle_define(pp, diags, file, hash_prov, &line[1..])?;
            }
            Ok(())
        }
        "undef" => {
            if was_active {
                if let Some(n) = line.get(1) {
                    pp.macros.undef(&n.text);
                }
            }
            Ok(())
        }
        "ifdef" | "ifndef" => {
            let positive = name_tok.text == "ifdef";
            let cond = if was_active {
                let defined = line.get(1).map(|n| pp.macros.is_defined(&n.text)).unwrap_or(false);
                if positive { defined } else { !defined }
            } else {
                false
            };
            pp.cond_stack.push(CondIncl::new(hash_prov.line, cond));
            Ok(())
        }
        "if" => {
            let cond = if was_active { eval_if_condition(pp, sources, interner, diags, file, hash_prov, &line[1..])? } else { false };
            pp.cond_stack.push(CondIncl::new(hash_prov.line, cond));
            Ok(())
        }
        "elif" => {
            let Some(top) = pp.cond_stack.last_mut() else {
                return fatal(diags, file, hash_prov, "#elif without matching #if");
            };
            if top.saw_else {
                return fatal(diags, file, hash_prov, "#elif after #else");
            }
            let ancestors_ok = ancestors_active(&pp.cond_stack);
            let cond = if ancestors_ok && !pp.cond_stack.last().unwrap().taken_before {
                eval_if_condition(pp, sources, interner, diags, file, hash_prov, &line[1..])?
            } else {
                false
            };
            let top = pp.cond_stack.last_mut().unwrap();
            top.taking = ancestors_ok && cond && !top.taken_before;
            top.taken_before |= top.taking;
            Ok(())
        }
        "else" => {
            let ancestors_ok = ancestors_active(&pp.cond_stack);
            let Some(top) = pp.cond_stack.last_mut() else {
                return fatal(diags, file, hash_prov, "#else without matching #if");
            };
            if top.saw_else {
                return fatal(diags, file, hash_prov, "duplicate #else");
            }
            top.saw_else = true;
            top.taking = ancestors_ok && !top.taken_before;
            top.taken_before |= top.taking;
            Ok(())
        }
        "endif" => {
            if pp.cond_stack.pop().is_none() {
                return fatal(diags, file, hash_prov, "#endif without matching #if");
            }
            Ok(())
        }
        "line" => {
            if was_active {
                handle_line(pp, sources, file, line)?;
            }
            Ok(())
        }
        "pragma" => {
            if was_active {
                handle_pragma(pp, file, &line[1..]);
            }
            Ok(())
        }
        "error" => {
            if was_active {
                diags.report(Diagnostic::new(
                    Severity::Error,
                    Some(file),
                    format!("<file {}>", file.0),
                    hash_prov.line,
                    hash_prov.col,
                    format!("#error {}", spell(&line[1..])),
                ))?;
            }
            Ok(())
        }
        "warning" => {
            if was_active {
                diags.report(Diagnostic::new(
                    Severity::Warning,
                    Some(file),
                    format!("<file {}>", file.0),
                    hash_prov.line,
                    hash_prov.col,
                    format!("#warning {}", spell(&line[1..])),
                ))?;
            }
            Ok(())
        }
        "embed" => {
            if was_active {
                handle_embed(pp, sources, diags, out, file, hash_prov, &line[1..])?;
            }
            Ok(())
        }
        _ => {
            if was_active {
                diags.report(Diagnostic::new(
                    Severity::Warning,
                    Some(file),
                    format!("<file {}>", file.0),
                    hash_prov.line,
                    hash_prov.col,
                    format!("unknown preprocessing directive '#{}'", name_tok.text),
                ))?;
            }
            Ok(())
        }
    }
}

fn fatal(diags: &mut Diagnostics, file: FileId, prov: &Provenance, msg: &str) -> Result<(), Fatal> {
    diags.report(Diagnostic::new(Severity::Error, Some(file), format!("<file {}>", file.0), prov.line, prov.col, msg))
}

fn spell(tokens: &[Token]) -> String {
    let mut s = String::new();
    for (i, t) in tokens.iter().enumerate() {
        if i > 0 && t.prov.has_leading_space {
            s.push(' ');
        }
        s.push_str(&t.text);
    }
    s
}

fn handle_define(pp: &mut PpContext, diags: &mut Diagnostics, file: FileId, hash_prov: &Provenance, rest: &[Token]) -> Result<(), Fatal> {
    let Some(name_tok) = rest.first() else {
        return fatal(diags, file, hash_prov, "#define missing macro name");
    };
    let name = name_tok.text.clone();

    let is_function_like = rest.get(1).map(|t| t.is("(") && !t.prov.has_leading_space).unwrap_or(false);
    let m = if is_function_like {
        let mut k = 2usize;
        let mut params = Vec::new();
        let mut variadic = false;
        while k < rest.len() && !rest[k].is(")") {
            if rest[k].text == "..." {
                variadic = true;
                k += 1;
            } else {
                params.push(rest[k].text.clone());
                k += 1;
                if rest.get(k).map(|t| t.is(",")).unwrap_or(false) {
                    k += 1;
                }
            }
        }
        k += 1; // skip `)`
        let body = rest.get(k..).unwrap_or(&[]).to_vec();
        Macro::function_like(name.clone(), params, variadic, body)
    } else {
        let body = rest.get(1..).unwrap_or(&[]).to_vec();
        Macro::object_like(name.clone(), body)
    };

    if let Some(prev) = pp.macros.get(&name) {
        if prev.differs_from(&m) {
            diags.report(Diagnostic::new(
                Severity::Warning,
                Some(file),
                format!("<file {}>", file.0),
                hash_prov.line,
                hash_prov.col,
                format!("'{}' macro redefined", name),
            ))?;
        }
    }
    pp.macros.define(m);
    Ok(())
}

fn handle_line(pp: &mut PpContext, sources: &mut SourceManager, file: FileId, line: &[Token]) -> Result<(), Fatal> {
    let _ = pp;
    let Some(n_tok) = line.first() else { return Ok(()) };
    let Ok(n) = n_tok.text.parse::<i64>() else { return Ok(()) };
    let f = sources.get_mut(file);
    f.line_delta = n - (n_tok.prov.line as i64);
    if let Some(name_tok) = line.get(1) {
        if name_tok.kind == TokenKind::Str {
            if let Some((bytes, _)) = &name_tok.str_val {
                f.display_name = PathBuf::from(String::from_utf8_lossy(bytes).to_string());
            }
        }
    }
    Ok(())
}

fn handle_pragma(pp: &mut PpContext, file: FileId, rest: &[Token]) {
    match rest.first().map(|t| t.text.as_str()) {
        Some("once") => {
            pp.pragma_once.insert(file.0 as u64, ());
        }
        Some("pack") => {
            // `#pragma pack(N)` / `#pragma pack()` / `#pragma pack(push, N)` / `#pragma pack(pop)`.
            if let Some(n) = rest.iter().find_map(|t| t.text.parse::<u32>().ok()) {
                pp.pack_stack.push(n);
            } else if rest.iter().any(|t| t.text == "pop") {
                pp.pack_stack.pop();
            } else if rest.iter().any(|t| t.text == "push") {
                let top = pp.pack_stack.last().copied().unwrap_or(8);
                pp.pack_stack.push(top);
            } else {
                pp.pack_stack.clear();
            }
        }
        _ => {}
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_include(
    pp: &mut PpContext,
    sources: &mut SourceManager,
    interner: &mut Interner,
    diags: &mut Diagnostics,
    out: &mut Vec<Token>,
    file: FileId,
    hash_prov: &Provenance,
    rest: &[Token],
    is_next: bool,
) -> Result<(), Fatal> {
    let Some((name, is_system)) = header_name(rest) else {
        return fatal(diags, file, hash_prov, "expected \"FILENAME\" or <FILENAME> after #include");
    };

    let including_dir = sources.get(file).name.parent().map(|p| p.to_path_buf());
    let dirs = include::candidates(is_system, including_dir.as_deref(), &pp.user_include_dirs, &pp.system_include_dirs);
    let start_at = if is_next {
        pp.found_dir_index.get(file.0 as u64).map(|i| i + 1).unwrap_or(0)
    } else {
        0
    };

    if let Some((path, dir_index)) = resolve_include(pp, &name, is_system, including_dir.as_deref(), &dirs, start_at) {
        let included = sources.add_from_path(&path).map_err(|e| {
            Fatal(Diagnostic::new(
                Severity::Fatal,
                Some(file),
                format!("<file {}>", file.0),
                hash_prov.line,
                hash_prov.col,
                format!("cannot read '{}': {}", path.display(), e),
            ))
        })?;
        pp.found_dir_index.insert(included.0 as u64, dir_index);
        let expanded = run_file(pp, sources, interner, diags, included)?;
        out.extend(expanded);
        return Ok(());
    }

    if is_system {
        if let Some(text) = crate::stdlib_headers::lookup(&name) {
            let included = sources.add_virtual(format!("<{}>", name), text.as_bytes().to_vec());
            let expanded = run_file(pp, sources, interner, diags, included)?;
            out.extend(expanded);
            return Ok(());
        }
    }

    fatal(diags, file, hash_prov, &format!("'{}' file not found", name))
}

/// Resolves one `#include`/`#include_next`/`#embed` header, consulting and populating
/// `pp.include_cache` keyed by `(filename, is_system)` (spec.md §4.4) so a header named in
/// several translation units, or repeatedly by the same one, stats its candidate directories
/// at most once. `#include_next` (`start_at != 0`) bypasses the cache: its result depends on
/// the resuming directory index, which the `(filename, is_system)` key doesn't capture.
fn resolve_include(
    pp: &mut PpContext,
    name: &str,
    is_system: bool,
    including_dir: Option<&std::path::Path>,
    dirs: &[PathBuf],
    start_at: usize,
) -> Option<(PathBuf, usize)> {
    if start_at != 0 {
        return include::find(name, dirs, start_at);
    }
    let key = include_cache_key(name, is_system, including_dir);
    if let Some((path, dir_index)) = pp.include_cache.get(key.as_bytes()) {
        return Some((path.clone(), *dir_index));
    }
    let found = include::find(name, dirs, 0);
    if let Some((path, dir_index)) = &found {
        pp.include_cache.insert(key.as_bytes(), (path.clone(), *dir_index));
    }
    found
}

/// Quoted includes search the including file's own directory first, so the candidate list (and
/// hence the result) varies per includer; the cache key folds that directory in. Angle includes
/// never consult the includer's directory, so system lookups cache on the bare name.
fn include_cache_key(name: &str, is_system: bool, including_dir: Option<&std::path::Path>) -> String {
    if is_system {
        format!("sys\0{}", name)
    } else {
        format!("quo\0{}\0{}", including_dir.map(|d| d.display().to_string()).unwrap_or_default(), name)
    }
}

/// Reconstructs a `#include`/`#embed` header name from its raw tokens: a `Str` token for
/// quoted includes, or a run of tokens between `<` and `>` for angle includes (the ordinary
/// tokenizer has no header-name lexing mode, so `<sys/types.h>` arrives as several punctuator
/// and identifier tokens that must be re-spelled).
fn header_name(rest: &[Token]) -> Option<(String, bool)> {
    let first = rest.first()?;
    if first.kind == TokenKind::Str {
        let (bytes, _) = first.str_val.as_ref()?;
        return Some((String::from_utf8_lossy(bytes).to_string(), false));
    }
    if first.is("<") {
        let mut name = String::new();
        for t in rest.iter().skip(1) {
            if t.is(">") {
                return Some((name, true));
            }
            name.push_str(&t.text);
        }
    }
    None
}

fn handle_embed(
    pp: &mut PpContext,
    sources: &mut SourceManager,
    diags: &mut Diagnostics,
    out: &mut Vec<Token>,
    file: FileId,
    hash_prov: &Provenance,
    rest: &[Token],
) -> Result<(), Fatal> {
    let Some((name, is_system)) = header_name(rest) else {
        return fatal(diags, file, hash_prov, "expected \"FILENAME\" or <FILENAME> after #embed");
    };
    let including_dir = sources.get(file).name.parent().map(|p| p.to_path_buf());
    let dirs = include::candidates(is_system, including_dir.as_deref(), &pp.user_include_dirs, &pp.system_include_dirs);
    let Some((path, _)) = resolve_include(pp, &name, is_system, including_dir.as_deref(), &dirs, 0) else {
        return fatal(diags, file, hash_prov, &format!("'{}' file not found for #embed", name));
    };
    let bytes = std::fs::read(&path).map_err(|e| {
        Fatal(Diagnostic::new(
            Severity::Fatal,
            Some(file),
            format!("<file {}>", file.0),
            hash_prov.line,
            hash_prov.col,
            format!("cannot read '{}': {}", path.display(), e),
        ))
    })?;

    let params_start = rest.iter().position(|t| t.is(">") || t.kind == TokenKind::Str).map(|i| i + 1).unwrap_or(rest.len());
    let params = embed::parse_params(&rest[params_start.min(rest.len())..]);
    let placeholder = Token {
        kind: TokenKind::Punct,
        text: "#".into(),
        prov: hash_prov.clone(),
        num: NumValue::None,
        str_val: None,
        hideset: Default::default(),
        origin: None,
        keyword: None,
    };
    let tokens = embed::embed_tokens(&bytes, &params, pp.embed_limit, pp.embed_hard_limit, &placeholder, diags)?;
    out.extend(tokens);
    Ok(())
}

/// Evaluates a `#if`/`#elif` constant expression: rewrites `defined X`/`defined(X)` to `1`/`0`,
/// macro-expands what remains, then parses and evaluates per `crate::constexpr`.
fn eval_if_condition(
    pp: &mut PpContext,
    sources: &mut SourceManager,
    interner: &mut Interner,
    diags: &mut Diagnostics,
    file: FileId,
    hash_prov: &Provenance,
    rest: &[Token],
) -> Result<bool, Fatal> {
    let replaced = resolve_defined(&pp.macros, rest);
    let expanded = expand::expand_tokens(replaced, &pp.macros, interner, sources, &mut pp.counter, &pp.date, &pp.time, diags)?;
    let cleaned: Vec<Token> = expanded
        .into_iter()
        .map(|mut t| {
            if t.kind == TokenKind::Identifier {
                t.kind = TokenKind::Num;
                t.num = NumValue::Int(0, false);
                t.text = "0".into();
            }
            t
        })
        .collect();
    let mut parser = super::ifexpr::Parser::new(&cleaned);
    let expr = parser.parse_expr().ok_or(()).map_err(|_| {
        Fatal(Diagnostic::new(
            Severity::Fatal,
            Some(file),
            format!("<file {}>", file.0),
            hash_prov.line,
            hash_prov.col,
            "invalid constant expression in #if/#elif".to_string(),
        ))
    })?;
    let (v, _) = crate::constexpr::eval(&expr).map_err(|msg| {
        Fatal(Diagnostic::new(
            Severity::Fatal,
            Some(file),
            format!("<file {}>", file.0),
            hash_prov.line,
            hash_prov.col,
            msg,
        ))
    })?;
    Ok(v != 0)
}

fn resolve_defined(macros: &super::macro_table::MacroTable, tokens: &[Token]) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i].text == "defined" {
            let (name, consumed) = if tokens.get(i + 1).map(|t| t.is("(")).unwrap_or(false) {
                (tokens.get(i + 2).map(|t| t.text.clone()), 4)
            } else {
                (tokens.get(i + 1).map(|t| t.text.clone()), 2)
            };
            let defined = name.map(|n| macros.is_defined(&n)).unwrap_or(false);
            let mut lit = tokens[i].clone();
            lit.kind = TokenKind::Num;
            lit.text = if defined { "1".into() } else { "0".into() };
            lit.num = NumValue::Int(defined as i64, false);
            lit.str_val = None;
            out.push(lit);
            i += consumed;
            continue;
        }
        out.push(tokens[i].clone());
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use std::rc::Rc;

    fn new_ctx() -> (PpContext, SourceManager, Interner, Diagnostics) {
        let arena = Rc::new(Arena::new());
        (PpContext::new(), SourceManager::new(), Interner::new(arena), Diagnostics::new())
    }

    #[test]
    fn object_like_define_then_use() {
        let (mut pp, mut sources, mut interner, mut diags) = new_ctx();
        let file = sources.add_virtual("a.c", b"#define N 10\nint x = N;\n".to_vec());
        let out = run_file(&mut pp, &mut sources, &mut interner, &mut diags, file).unwrap();
        let texts: Vec<&str> = out.iter().map(|t| t.text.as_str()).collect();
        assert!(texts.contains(&"10"));
        assert!(!texts.contains(&"N"));
    }

    #[test]
    fn ifdef_skips_inactive_branch() {
        let (mut pp, mut sources, mut interner, mut diags) = new_ctx();
        let file = sources.add_virtual("a.c", b"#ifdef FOO\nint a;\n#else\nint b;\n#endif\n".to_vec());
        let out = run_file(&mut pp, &mut sources, &mut interner, &mut diags, file).unwrap();
        let texts: Vec<&str> = out.iter().map(|t| t.text.as_str()).collect();
        assert!(texts.contains(&"b"));
        assert!(!texts.contains(&"a"));
    }

    #[test]
    fn if_expression_with_arithmetic() {
        let (mut pp, mut sources, mut interner, mut diags) = new_ctx();
        let file = sources.add_virtual("a.c", b"#if 1 + 1 == 2\nint ok;\n#endif\n".to_vec());
        let out = run_file(&mut pp, &mut sources, &mut interner, &mut diags, file).unwrap();
        let texts: Vec<&str> = out.iter().map(|t| t.text.as_str()).collect();
        assert!(texts.contains(&"ok"));
    }

    #[test]
    fn pragma_once_prevents_double_inclusion() {
        let (mut pp, mut sources, mut interner, mut diags) = new_ctx();
        let header = sources.add_virtual("h.h", b"#pragma once\nint shared;\n".to_vec());
        let main = sources.add_virtual("m.c", b"".to_vec());
        let first = run_file(&mut pp, &mut sources, &mut interner, &mut diags, header).unwrap();
        assert!(first.iter().any(|t| t.text == "shared"));
        let second = run_file(&mut pp, &mut sources, &mut interner, &mut diags, header).unwrap();
        assert!(second.is_empty());
        let _ = main;
    }

    #[test]
    fn repeated_include_of_the_same_header_populates_and_reuses_the_cache() {
        let (mut pp, mut sources, mut interner, mut diags) = new_ctx();
        let dir = tempfile::tempdir().unwrap();
        let header_path = dir.path().join("h.h");
        std::fs::write(&header_path, b"int shared;\n").unwrap();
        let main_path = dir.path().join("m.c");
        std::fs::write(&main_path, b"#include \"h.h\"\n#include \"h.h\"\n").unwrap();
        let file = sources.add_from_path(&main_path).unwrap();
        let out = run_file(&mut pp, &mut sources, &mut interner, &mut diags, file).unwrap();
        assert_eq!(out.iter().filter(|t| t.text == "shared").count(), 2);
        assert!(!pp.include_cache.is_empty());
    }
}
