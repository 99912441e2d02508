//! The preprocessor: directive dispatch, macro expansion, include resolution, `#if` constant
//! evaluation, and `#embed`. [`PpContext`] holds all of the preprocessor's own working state
//! (the macro table, include search paths, conditional-inclusion stack, `#pragma once`/`pack`
//! bookkeeping); it does not own the arena, interner, source manager, or diagnostics sink,
//! since those are shared with the lexer and parser too and live on
//! [`crate::session::Session`] instead.

pub mod cond;
pub mod directive;
pub mod embed;
pub mod expand;
mod ifexpr;
pub mod include;
pub mod macro_table;

use std::path::PathBuf;

use chrono::{Datelike, Local, Timelike};

use crate::diagnostics::{Diagnostics, Fatal};
use crate::hashmap::{IntMap, StrMap};
use crate::intern::Interner;
use crate::source::{FileId, SourceManager};
use crate::token::Token;

use cond::CondIncl;
use macro_table::{Macro, MacroTable};

pub struct PpContext {
    pub macros: MacroTable,
    pub user_include_dirs: Vec<PathBuf>,
    pub system_include_dirs: Vec<PathBuf>,
    pub pragma_once: IntMap<()>,
    pub cond_stack: Vec<CondIncl>,
    pub counter: u32,
    pub embed_limit: Option<u64>,
    pub embed_hard_limit: Option<u64>,
    /// Directory index (into the per-`#include` candidate list) that resolved each included
    /// file, keyed by the *included* file's id; consulted by `#include_next` from that file.
    pub found_dir_index: IntMap<usize>,
    /// Resolved `#include`/`#include_next`/`#embed` lookups, keyed by `(filename, is_system)`
    /// (quoted lookups fold in the including file's directory, since the candidate search order
    /// differs per includer) so repeated directives for the same header skip the `is_file()`
    /// stat walk entirely. `#include_next` bypasses this cache: its result depends on the
    /// resuming directory index, which isn't part of the cache key.
    pub include_cache: StrMap<(PathBuf, usize)>,
    pub pack_stack: Vec<u32>,
    pub date: String,
    pub time: String,
}

impl PpContext {
    pub fn new() -> Self {
        let mut macros = MacroTable::new();
        macros.define(Macro::builtin("__FILE__", expand::builtin_file));
        macros.define(Macro::builtin("__LINE__", expand::builtin_line));
        macros.define(Macro::builtin("__DATE__", expand::builtin_date));
        macros.define(Macro::builtin("__TIME__", expand::builtin_time));
        macros.define(Macro::builtin("__COUNTER__", expand::builtin_counter));

        let (date, time) = process_start_date_time();
        Self {
            macros,
            user_include_dirs: Vec::new(),
            system_include_dirs: Vec::new(),
            pragma_once: IntMap::new(),
            cond_stack: Vec::new(),
            counter: 0,
            embed_limit: None,
            embed_hard_limit: None,
            found_dir_index: IntMap::new(),
            include_cache: StrMap::new(),
            pack_stack: Vec::new(),
            date,
            time,
        }
    }

    /// Preprocesses `file` (and everything it transitively `#include`s) to a flat token stream.
    /// `PpNum` tokens are left unconverted; the caller runs
    /// [`crate::lexer::convert_pp_tokens`] once the whole translation unit has been collected.
    pub fn run(
        &mut self,
        sources: &mut SourceManager,
        interner: &mut Interner,
        diags: &mut Diagnostics,
        file: FileId,
    ) -> Result<Vec<Token>, Fatal> {
        directive::run_file(self, sources, interner, diags, file)
    }
}

impl Default for PpContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A fixed process-start date/time for `__DATE__`/`__TIME__`, computed once so repeated
/// preprocessing within the same session reports a consistent value (matching a real
/// compiler's single-invocation semantics) rather than one timestamp per file.
fn process_start_date_time() -> (String, String) {
    let now = Local::now();
    const MONTHS: [&str; 12] = ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];
    let month = MONTHS[(now.month0() as usize).min(11)];
    let date = format!("{} {:2} {}", month, now.day(), now.year());
    let time = format!("{:02}:{:02}:{:02}", now.hour(), now.minute(), now.second());
    (date, time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use std::rc::Rc;

    #[test]
    fn builtins_are_registered() {
        let pp = PpContext::new();
        assert!(pp.macros.is_defined("__FILE__"));
        assert!(pp.macros.is_defined("__LINE__"));
        assert!(pp.macros.is_defined("__COUNTER__"));
    }

    #[test]
    fn counter_increments_across_expansions() {
        let mut pp = PpContext::new();
        let arena = Rc::new(Arena::new());
        let mut interner = Interner::new(arena);
        let mut sources = SourceManager::new();
        let mut diags = Diagnostics::new();
        let file = sources.add_virtual("a.c", b"__COUNTER__ __COUNTER__\n".to_vec());
        let out = pp.run(&mut sources, &mut interner, &mut diags, file).unwrap();
        let nums: Vec<&str> = out.iter().filter(|t| t.kind == crate::token::TokenKind::Num).map(|t| t.text.as_str()).collect();
        assert_eq!(nums, vec!["0", "1"]);
    }
}
