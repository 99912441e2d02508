//! The [`Token`] type: the atomic unit passed between the tokenizer, preprocessor, and parser.
//!
//! A token stream is modeled as a flat `Vec<Token>` rather than a literal self-referential
//! linked list (see `DESIGN.md` for the rationale); the API still presents it as a sequential
//! stream terminated by an EOF token, and `#include`/macro-expansion splicing is implemented
//! with `Vec::splice` at the call site, giving the same "insert before remaining tokens"
//! semantics spec.md §4.4 describes without self-referential arena pointers.

use std::rc::Rc;

use crate::intern::Sym;
use crate::source::FileId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Keyword,
    Punct,
    Str,
    Num,
    /// A not-yet-reparsed preprocessing number (spec.md §4.3); converted to `Num` by
    /// [`crate::lexer::convert_pp_tokens`] once preprocessing completes.
    PpNum,
    Eof,
}

/// Element type of a string/char literal, chosen by the widest prefix among concatenated
/// adjacent literals (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StrKind {
    Char,
    Utf8,
    Char16,
    Wide,
    Char32,
}

/// An immutable set of macro names a token refuses to re-expand against, used to guarantee
/// macro-expansion termination (spec.md's hide-set algorithm). Represented as a sorted,
/// deduplicated `Rc<Vec<Sym>>` so cloning a token's hide-set is a refcount bump and
/// union/intersection only allocate when the result actually differs.
#[derive(Debug, Clone, Default)]
pub struct HideSet(Rc<Vec<Sym>>);

impl HideSet {
    pub fn empty() -> Self {
        Self(Rc::new(Vec::new()))
    }

    pub fn contains(&self, name: Sym) -> bool {
        self.0.binary_search(&name).is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `self ∪ {name}`.
    pub fn with(&self, name: Sym) -> Self {
        if self.contains(name) {
            return self.clone();
        }
        let mut v = (*self.0).clone();
        v.push(name);
        v.sort_unstable();
        Self(Rc::new(v))
    }

    /// Returns `self ∪ other`.
    pub fn union(&self, other: &HideSet) -> Self {
        if Rc::ptr_eq(&self.0, &other.0) {
            return self.clone();
        }
        let mut v = (*self.0).clone();
        v.extend_from_slice(&other.0);
        v.sort_unstable();
        v.dedup();
        Self(Rc::new(v))
    }

    /// Returns `self ∩ other`.
    pub fn intersection(&self, other: &HideSet) -> Self {
        let v: Vec<Sym> = self.0.iter().copied().filter(|s| other.contains(*s)).collect();
        Self(Rc::new(v))
    }
}

/// Source provenance for a token: where it came from, and whether it was produced directly by
/// the tokenizer or synthesized during macro expansion (the `origin` back-link).
#[derive(Debug, Clone)]
pub struct Provenance {
    pub file: FileId,
    pub line: u32,
    pub col: u32,
    pub at_beginning_of_line: bool,
    pub has_leading_space: bool,
}

#[derive(Debug, Clone, Default)]
pub enum NumValue {
    #[default]
    None,
    Int(i64, bool /* is_unsigned */),
    Float(f64),
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    /// The token's literal spelling as it appeared (or was synthesized) in source.
    pub text: String,
    pub prov: Provenance,
    pub num: NumValue,
    /// Decoded bytes of a string/char literal, NUL-terminated, plus its element type.
    pub str_val: Option<(Vec<u8>, StrKind)>,
    pub hideset: HideSet,
    /// Back-link to the token that produced this one via macro expansion, if any.
    pub origin: Option<Rc<Token>>,
    /// Set once the raw identifier spelling is known to be a macro-promotable keyword
    /// (populated by `convert_pp_tokens` after preprocessing finishes, per spec.md §4.3).
    pub keyword: Option<Sym>,
}

impl Token {
    pub fn eof(file: FileId, line: u32, col: u32) -> Self {
        Self {
            kind: TokenKind::Eof,
            text: String::new(),
            prov: Provenance {
                file,
                line,
                col,
                at_beginning_of_line: true,
                has_leading_space: false,
            },
            num: NumValue::None,
            str_val: None,
            hideset: HideSet::empty(),
            origin: None,
            keyword: None,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    pub fn is(&self, text: &str) -> bool {
        matches!(self.kind, TokenKind::Punct | TokenKind::Keyword | TokenKind::Identifier) && self.text == text
    }

    pub fn is_ident(&self) -> bool {
        matches!(self.kind, TokenKind::Identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::intern::Interner;
    use std::rc::Rc;

    #[test]
    fn hideset_union_and_contains() {
        let arena = Rc::new(Arena::new());
        let mut interner = Interner::new(arena);
        let m = interner.intern("M");
        let n = interner.intern("N");

        let h1 = HideSet::empty().with(m);
        let h2 = HideSet::empty().with(n);
        let u = h1.union(&h2);
        assert!(u.contains(m));
        assert!(u.contains(n));

        let i = h1.intersection(&h2);
        assert!(i.is_empty());
    }

    #[test]
    fn with_is_idempotent() {
        let arena = Rc::new(Arena::new());
        let mut interner = Interner::new(arena);
        let m = interner.intern("M");
        let h = HideSet::empty().with(m).with(m);
        assert_eq!(h.0.len(), 1);
    }
}
