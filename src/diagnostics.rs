//! Diagnostic collection and formatting.
//!
//! Mirrors spec.md §7's error taxonomy with a single concrete `Diagnostic` type rather than a
//! per-phase error enum, since every phase in this pipeline reports through the same
//! `file:line:col: severity: message` channel. Two propagation modes are supported, matching
//! spec.md §5/§9's "errors as long jumps" note: a bounded collected list (the default,
//! recoverable), or an immediate `Fatal` escape once collection is disabled or the bound is
//! exceeded. The escape is modeled as an ordinary `Result<_, Fatal>` rather than a signal or
//! global — see `DESIGN.md` for why that satisfies spec.md's "structured control flow"
//! requirement.

use std::fmt;

use crate::source::FileId;

/// Default bound on collected errors before the session escapes (spec.md §5).
pub const DEFAULT_MAX_ERRORS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal error",
        };
        write!(f, "{}", s)
    }
}

/// One diagnostic: message, location, and severity. `file` is `None` for diagnostics that
/// precede any file being loaded (e.g. a bad `-I` path).
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub file: Option<FileId>,
    pub file_name: String,
    pub line: u32,
    pub col: u32,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        file: Option<FileId>,
        file_name: impl Into<String>,
        line: u32,
        col: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            file,
            file_name: file_name.into(),
            line,
            col,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}: {}",
            self.file_name, self.line, self.col, self.severity, self.message
        )
    }
}

impl std::error::Error for Diagnostic {}

/// Raised when the session's non-local escape is taken: I/O failure, arena OOM (never
/// actually produced by this implementation since `Vec` growth panics rather than returning
/// an error, but the variant is kept for API completeness and for callers constructing a
/// `Fatal` from an embed hard-limit violation), or the collected-error bound being exceeded.
#[derive(Debug, Clone)]
pub struct Fatal(pub Diagnostic);

impl fmt::Display for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for Fatal {}

/// Session-scoped diagnostic sink implementing the two propagation modes from spec.md §7.
pub struct Diagnostics {
    list: Vec<Diagnostic>,
    collect: bool,
    max_errors: usize,
    warnings_as_errors: bool,
    error_count: usize,
    warning_count: usize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self {
            list: Vec::new(),
            collect: true,
            max_errors: DEFAULT_MAX_ERRORS,
            warnings_as_errors: false,
            error_count: 0,
            warning_count: 0,
        }
    }

    pub fn enable_collect_errors(&mut self, collect: bool) {
        self.collect = collect;
    }

    pub fn set_max_errors(&mut self, max: usize) {
        self.max_errors = max;
    }

    pub fn set_warnings_as_errors(&mut self, yes: bool) {
        self.warnings_as_errors = yes;
    }

    /// Reports a diagnostic. When collection is enabled and the bound has not been exceeded,
    /// appends to the list and returns `Ok(())`. Otherwise takes the escape.
    pub fn report(&mut self, mut d: Diagnostic) -> Result<(), Fatal> {
        if d.severity == Severity::Warning && self.warnings_as_errors {
            d.severity = Severity::Error;
        }
        match d.severity {
            Severity::Warning => self.warning_count += 1,
            Severity::Error | Severity::Fatal => self.error_count += 1,
        }

        if !self.collect || d.severity == Severity::Fatal {
            if self.collect {
                self.list.push(d.clone());
            }
            return Err(Fatal(d));
        }

        self.list.push(d);
        if self.error_count > self.max_errors {
            let overflow = Diagnostic::new(
                Severity::Fatal,
                None,
                "<cfront>",
                0,
                0,
                format!("too many errors ({} > {})", self.error_count, self.max_errors),
            );
            return Err(Fatal(overflow));
        }
        Ok(())
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn clear(&mut self) {
        self.list.clear();
        self.error_count = 0;
        self.warning_count = 0;
    }

    /// All diagnostics collected so far, sorted by file name then line (spec.md §7).
    pub fn sorted(&self) -> Vec<&Diagnostic> {
        let mut v: Vec<&Diagnostic> = self.list.iter().collect();
        v.sort_by(|a, b| a.file_name.cmp(&b.file_name).then(a.line.cmp(&b.line)));
        v
    }

    pub fn all(&self) -> &[Diagnostic] {
        &self.list
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diag(line: u32, msg: &str) -> Diagnostic {
        Diagnostic::new(Severity::Error, None, "a.c", line, 1, msg)
    }

    #[test]
    fn collects_until_bound_exceeded() {
        let mut d = Diagnostics::new();
        d.set_max_errors(2);
        assert!(d.report(diag(1, "one")).is_ok());
        assert!(d.report(diag(2, "two")).is_ok());
        assert!(d.report(diag(3, "three")).is_err());
        assert_eq!(d.error_count(), 3);
    }

    #[test]
    fn disabled_collection_escapes_immediately() {
        let mut d = Diagnostics::new();
        d.enable_collect_errors(false);
        assert!(d.report(diag(1, "one")).is_err());
    }

    #[test]
    fn warnings_as_errors_promotes_severity() {
        let mut d = Diagnostics::new();
        d.set_warnings_as_errors(true);
        let w = Diagnostic::new(Severity::Warning, None, "a.c", 1, 1, "narrowing");
        d.report(w).unwrap();
        assert_eq!(d.error_count(), 1);
        assert_eq!(d.warning_count(), 0);
    }

    #[test]
    fn sorted_orders_by_file_then_line() {
        let mut d = Diagnostics::new();
        d.report(Diagnostic::new(Severity::Error, None, "b.c", 1, 1, "x")).unwrap();
        d.report(Diagnostic::new(Severity::Error, None, "a.c", 5, 1, "y")).unwrap();
        d.report(Diagnostic::new(Severity::Error, None, "a.c", 2, 1, "z")).unwrap();
        let sorted = d.sorted();
        assert_eq!(sorted[0].file_name, "a.c");
        assert_eq!(sorted[0].line, 2);
        assert_eq!(sorted[1].line, 5);
        assert_eq!(sorted[2].file_name, "b.c");
    }
}
