//! Macro definitions and the macro table.

use crate::hashmap::StrMap;
use crate::token::Token;

/// Everything a builtin macro (`__FILE__`, `__LINE__`, `__DATE__`, `__TIME__`, `__COUNTER__`)
/// needs to synthesize its replacement token, gathered fresh at the macro's invocation site.
/// Kept separate from [`crate::preprocessor::PpContext`] (the `#include`/`#define`-handling
/// state) because a builtin handler only ever needs the current location and a running
/// counter, not the whole preprocessor.
pub struct BuiltinEnv<'a> {
    pub file_name: &'a str,
    pub line: u32,
    pub date: &'a str,
    pub time: &'a str,
    pub counter: &'a mut u32,
}

pub type BuiltinHandler = for<'a, 'b> fn(&'a mut BuiltinEnv<'b>, &Token) -> Token;

/// One macro definition: object-like or function-like, builtin or user-defined.
pub struct Macro {
    pub name: String,
    pub is_object_like: bool,
    pub params: Vec<String>,
    pub is_variadic: bool,
    pub body: Vec<Token>,
    pub is_builtin: bool,
    pub handler: Option<BuiltinHandler>,
}

impl Macro {
    pub fn object_like(name: impl Into<String>, body: Vec<Token>) -> Self {
        Self {
            name: name.into(),
            is_object_like: true,
            params: Vec::new(),
            is_variadic: false,
            body,
            is_builtin: false,
            handler: None,
        }
    }

    pub fn function_like(
        name: impl Into<String>,
        params: Vec<String>,
        is_variadic: bool,
        body: Vec<Token>,
    ) -> Self {
        Self {
            name: name.into(),
            is_object_like: false,
            params,
            is_variadic,
            body,
            is_builtin: false,
            handler: None,
        }
    }

    pub fn builtin(name: impl Into<String>, handler: BuiltinHandler) -> Self {
        Self {
            name: name.into(),
            is_object_like: true,
            params: Vec::new(),
            is_variadic: false,
            body: Vec::new(),
            is_builtin: true,
            handler: Some(handler),
        }
    }

    /// True iff `other`'s body differs from this macro's in a way that makes redefinition an
    /// error (spec.md §7: "macro redefinition with differing body"). Per the standard, a
    /// redefinition is benign when the replacement lists are token-for-token identical
    /// (ignoring whitespace) and the parameter lists match.
    pub fn differs_from(&self, other: &Macro) -> bool {
        if self.is_object_like != other.is_object_like || self.params != other.params || self.is_variadic != other.is_variadic {
            return true;
        }
        if self.body.len() != other.body.len() {
            return true;
        }
        self.body.iter().zip(other.body.iter()).any(|(a, b)| a.text != b.text)
    }
}

/// The macro table backing `#define`/`#undef`/lookup. Backed by the custom [`StrMap`] rather
/// than `std::collections::HashMap`, per spec.md §4.2.
#[derive(Default)]
pub struct MacroTable {
    map: StrMap<Macro>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self { map: StrMap::new() }
    }

    pub fn define(&mut self, m: Macro) -> Option<Macro> {
        self.map.insert(m.name.as_bytes(), m)
    }

    pub fn undef(&mut self, name: &str) {
        self.map.remove(name.as_bytes());
    }

    pub fn get(&self, name: &str) -> Option<&Macro> {
        self.map.get(name.as_bytes())
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.map.contains_key(name.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_and_lookup() {
        let mut t = MacroTable::new();
        t.define(Macro::object_like("FOO", vec![]));
        assert!(t.is_defined("FOO"));
        assert!(!t.is_defined("BAR"));
    }

    #[test]
    fn undef_removes() {
        let mut t = MacroTable::new();
        t.define(Macro::object_like("FOO", vec![]));
        t.undef("FOO");
        assert!(!t.is_defined("FOO"));
    }

    #[test]
    fn identical_redefinition_does_not_differ() {
        let a = Macro::object_like("FOO", vec![]);
        let b = Macro::object_like("FOO", vec![]);
        assert!(!a.differs_from(&b));
    }
}
