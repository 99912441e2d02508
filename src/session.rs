//! Top-level driving API: owns every piece of per-run state (arena, interner, source table,
//! diagnostic sink, preprocessor) and wires `preprocess -> parse -> link` together the way
//! `bin/cfront.rs` and the integration tests call into the library.
//!
//! Kept as a thin façade rather than folding its methods into `main`: the CLI driver,
//! `tests/`, and (eventually) an embedder linking this crate as a library all want the same
//! `preprocess`/`parse`/`link` sequence without re-deriving how the pieces share the arena and
//! interner.

use std::path::Path;
use std::rc::Rc;

use crate::arena::Arena;
use crate::ast::{self, Program};
use crate::diagnostics::{Diagnostics, Fatal};
use crate::intern::Interner;
use crate::lexer;
use crate::preprocessor::macro_table::Macro;
use crate::preprocessor::PpContext;
use crate::source::{FileId, SourceManager};
use crate::token::Token;

pub struct Session {
    arena: Rc<Arena>,
    pub interner: Interner,
    pub sources: SourceManager,
    pub diags: Diagnostics,
    pub pp: PpContext,
}

impl Session {
    pub fn new() -> Self {
        let arena = Rc::new(Arena::new());
        Self {
            interner: Interner::new(arena.clone()),
            arena,
            sources: SourceManager::new(),
            diags: Diagnostics::new(),
            pp: PpContext::new(),
        }
    }

    /// The arena backing every interned string for this session, shared with [`Self::interner`]
    /// (and available to embedders that need to allocate alongside it, e.g. for a second
    /// translation unit parsed under the same interner).
    pub fn arena(&self) -> &Rc<Arena> {
        &self.arena
    }

    pub fn add_user_include_dir(&mut self, dir: impl Into<std::path::PathBuf>) {
        self.pp.user_include_dirs.push(dir.into());
    }

    pub fn add_system_include_dir(&mut self, dir: impl Into<std::path::PathBuf>) {
        self.pp.system_include_dirs.push(dir.into());
    }

    /// Predefines an object-like or function-like macro from a `-D name[(params)][=body]`
    /// style command-line spec, tokenizing the body the same way a `#define` line would be.
    pub fn define(&mut self, spec: &str) -> Result<(), Fatal> {
        let (head, body) = spec.split_once('=').unwrap_or((spec, "1"));
        if let Some(paren) = head.find('(') {
            let name = head[..paren].to_string();
            let close = head.find(')').unwrap_or(head.len());
            let params: Vec<String> = head[paren + 1..close]
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            let body_toks = self.tokenize_macro_body(body)?;
            self.pp.macros.define(Macro::function_like(name, params, false, body_toks));
        } else {
            let body_toks = self.tokenize_macro_body(body)?;
            self.pp.macros.define(Macro::object_like(head.to_string(), body_toks));
        }
        Ok(())
    }

    pub fn undef(&mut self, name: &str) {
        self.pp.macros.undef(name);
    }

    fn tokenize_macro_body(&mut self, text: &str) -> Result<Vec<Token>, Fatal> {
        let file = self.sources.add_virtual("<command-line>", format!("{}\0", text).into_bytes());
        let mut toks = lexer::tokenize(file, &self.sources.get(file).contents, &mut self.diags)?;
        toks.retain(|t| !t.is_eof());
        Ok(toks)
    }

    /// Loads `path`, preprocesses it, and promotes keyword-spelled identifiers: the token
    /// stream a parser (or `-E`/`-P` printer) consumes.
    pub fn preprocess(&mut self, path: impl AsRef<Path>) -> Result<Vec<Token>, Fatal> {
        let file = self.sources.add_from_path(path).map_err(|e| self.io_fatal(&e.to_string()))?;
        self.preprocess_file(file)
    }

    pub fn preprocess_stdin(&mut self) -> Result<Vec<Token>, Fatal> {
        let file = self.sources.add_from_path("-").map_err(|e| self.io_fatal(&e.to_string()))?;
        self.preprocess_file(file)
    }

    fn preprocess_file(&mut self, file: FileId) -> Result<Vec<Token>, Fatal> {
        let mut toks = self.pp.run(&mut self.sources, &mut self.interner, &mut self.diags, file)?;
        lexer::convert_pp_tokens(&mut toks, &mut self.interner, &mut self.diags)?;
        Ok(toks)
    }

    fn io_fatal(&self, msg: &str) -> Fatal {
        Fatal(crate::diagnostics::Diagnostic::new(
            crate::diagnostics::Severity::Fatal,
            None,
            "<cfront>",
            0,
            0,
            msg.to_string(),
        ))
    }

    /// Parses a preprocessed, keyword-promoted token stream into one translation unit's
    /// `Program`, honoring whatever `#pragma pack` state preprocessing left in effect.
    pub fn parse(&mut self, tokens: Vec<Token>) -> Result<Program, Fatal> {
        let pack = self.pp.pack_stack.last().copied();
        crate::parser::parse(tokens, &mut self.interner, &mut self.diags, pack)
    }

    /// Convenience: `preprocess` then `parse` for a single file.
    pub fn compile_file(&mut self, path: impl AsRef<Path>) -> Result<Program, Fatal> {
        let tokens = self.preprocess(path)?;
        self.parse(tokens)
    }

    pub fn link(&self, progs: Vec<Program>) -> Program {
        ast::link_progs(progs)
    }

    // ---- error-mode controls and introspection (spec.md §7) ---------------------------

    pub fn enable_collect_errors(&mut self, collect: bool) {
        self.diags.enable_collect_errors(collect);
    }

    pub fn set_max_errors(&mut self, max: usize) {
        self.diags.set_max_errors(max);
    }

    pub fn set_warnings_as_errors(&mut self, yes: bool) {
        self.diags.set_warnings_as_errors(yes);
    }

    pub fn has_errors(&self) -> bool {
        self.diags.has_errors()
    }

    pub fn error_count(&self) -> usize {
        self.diags.error_count()
    }

    pub fn warning_count(&self) -> usize {
        self.diags.warning_count()
    }

    pub fn clear_errors(&mut self) {
        self.diags.clear();
    }

    /// Writes every collected diagnostic to stderr, sorted by file then line (spec.md §7),
    /// colorized with `termcolor` the way a real compiler's driver highlights severities.
    pub fn print_all_errors(&self) -> std::io::Result<()> {
        use termcolor::{Color, ColorSpec, StandardStream, WriteColor};
        let mut stderr = StandardStream::stderr(if atty::is(atty::Stream::Stderr) {
            termcolor::ColorChoice::Auto
        } else {
            termcolor::ColorChoice::Never
        });
        for d in self.diags.sorted() {
            let color = match d.severity {
                crate::diagnostics::Severity::Warning => Color::Yellow,
                crate::diagnostics::Severity::Error => Color::Red,
                crate::diagnostics::Severity::Fatal => Color::Red,
            };
            let (file_name, line) = match d.file {
                Some(file) => self.sources.display_location(file, d.line),
                None => (d.file_name.clone(), d.line),
            };
            let _ = stderr.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
            let _ = write!(stderr, "{}: ", d.severity);
            let _ = stderr.reset();
            let _ = writeln!(stderr, "{}:{}:{}: {}", file_name, line, d.col, d.message);
        }
        Ok(())
    }

    // ---- printers (spec.md §6) ----------------------------------------------------------

    pub fn print_tokens(&self, tokens: &[Token], w: &mut impl std::io::Write) -> std::io::Result<()> {
        crate::printer::tokens::print(tokens, w)
    }

    pub fn print_preprocessed(&self, tokens: &[Token], w: &mut impl std::io::Write) -> std::io::Result<()> {
        crate::printer::tokens::print_preprocessed(tokens, &self.interner, w)
    }

    pub fn print_ast(&self, prog: &Program, w: &mut impl std::io::Write) -> std::io::Result<()> {
        crate::printer::ast::print(prog, &self.interner, w)
    }

    pub fn output_json(&self, prog: &Program, w: &mut impl std::io::Write) -> std::io::Result<()> {
        crate::printer::json::write(prog, &self.interner, &self.sources, w)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preprocess_and_parse_a_virtual_file() {
        let mut s = Session::new();
        let file = s.sources.add_virtual("a.c", b"#define N 3\nint arr[N];\n".to_vec());
        let tokens = s.preprocess_file(file).unwrap();
        let prog = s.parse(tokens).unwrap();
        assert_eq!(prog.decls.len(), 1);
    }

    #[test]
    fn command_line_define_is_visible_to_preprocessing() {
        let mut s = Session::new();
        s.define("WIDTH=4").unwrap();
        let file = s.sources.add_virtual("a.c", b"int arr[WIDTH];\n".to_vec());
        let tokens = s.preprocess_file(file).unwrap();
        let prog = s.parse(tokens).unwrap();
        assert_eq!(prog.decls.len(), 1);
    }

    #[test]
    fn undef_removes_a_builtin_macro() {
        let mut s = Session::new();
        assert!(s.pp.macros.is_defined("__LINE__"));
        s.undef("__LINE__");
        assert!(!s.pp.macros.is_defined("__LINE__"));
    }
}
