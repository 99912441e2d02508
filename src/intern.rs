//! String interner.
//!
//! Backs identifier/keyword spellings with a cheap `Copy` handle ([`Sym`]) instead of
//! repeatedly allocating `String`s for the same spelling. Interned bytes live in an
//! [`crate::arena::Arena`] the interner shares ownership of via `Rc`; the interner's own lookup
//! table is the custom [`crate::hashmap::StrMap`] keyed by those same arena-owned bytes, so a
//! macro name looked up a thousand times during expansion costs one arena allocation, not a
//! thousand.
//!
//! The interner does not borrow the arena (`&'a Arena`): a session hands clones of the same
//! interner/arena pair to the lexer, preprocessor, and parser without threading a lifetime
//! parameter through every one of those types. `Rc<Arena>` gives shared ownership instead, and
//! the arena's block-based design (see `arena.rs`) means a block's bytes never move for as long
//! as any `Rc` handle to the arena is alive, so it's sound to hand out interned spellings as
//! `&'static str` and rely on the `Rc` refcount, not the borrow checker, to keep them valid.

use std::rc::Rc;

use crate::arena::Arena;
use crate::hashmap::StrMap;

/// A cheap, `Copy` handle to an interned string. Two `Sym`s are equal iff their underlying
/// spellings are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sym(u32);

impl Sym {
    /// Widens the handle to a `u64` key, for use with [`crate::hashmap::IntMap`].
    pub fn as_u64(self) -> u64 {
        self.0 as u64
    }
}

pub struct Interner {
    arena: Rc<Arena>,
    table: StrMap<Sym>,
    strings: Vec<&'static str>,
}

impl Interner {
    pub fn new(arena: Rc<Arena>) -> Self {
        Self {
            arena,
            table: StrMap::new(),
            strings: Vec::new(),
        }
    }

    /// Interns `s`, returning a stable `Sym`. Repeated calls with the same spelling return the
    /// same `Sym` without a new allocation.
    pub fn intern(&mut self, s: &str) -> Sym {
        if let Some(sym) = self.table.get(s.as_bytes()) {
            return *sym;
        }
        let owned: &str = self.arena.alloc_str(s);
        // SAFETY: `owned` points into a block owned by `self.arena`. The arena never frees or
        // moves a block's bytes before the arena itself is dropped, and `self.arena` (an `Rc`)
        // stays alive for at least as long as `self` does, so treating this reference as
        // `'static` and storing it in `self.strings` is sound: it never outlives the arena.
        let owned: &'static str = unsafe { std::mem::transmute::<&str, &'static str>(owned) };
        let sym = Sym(self.strings.len() as u32);
        self.strings.push(owned);
        self.table.insert(owned.as_bytes(), sym);
        sym
    }

    pub fn resolve(&self, sym: Sym) -> &str {
        self.strings[sym.0 as usize]
    }

    /// Looks up `s` without interning it, for callers (the parser's typedef-name check) that
    /// must not allocate just to test whether a spelling has been seen before.
    pub fn lookup(&self, s: &str) -> Option<Sym> {
        self.table.get(s.as_bytes()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_same_spelling_twice_returns_same_sym() {
        let arena = Rc::new(Arena::new());
        let mut interner = Interner::new(arena);
        let a = interner.intern("foo");
        let b = interner.intern("foo");
        assert_eq!(a, b);
        assert_eq!(interner.resolve(a), "foo");
    }

    #[test]
    fn different_spellings_get_different_syms() {
        let arena = Rc::new(Arena::new());
        let mut interner = Interner::new(arena);
        let a = interner.intern("foo");
        let b = interner.intern("bar");
        assert_ne!(a, b);
    }
}
