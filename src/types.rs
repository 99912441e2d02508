//! The C type system: a tagged union over the handful of type constructors the standard
//! defines, plus the compatibility/conversion rules the parser needs while folding expressions
//! and checking declarations.
//!
//! Types are heap-allocated (`Rc<Type>`) rather than arena-allocated: unlike tokens, a `Type`
//! is frequently shared (the same `struct Point *` denoted in two different declarations should
//! point at the same `Type` value once built), and `Rc` gives that sharing without needing the
//! arena's bump-allocate-only discipline.

use std::rc::Rc;

use crate::ast::Expr;
use crate::intern::Sym;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IntKind {
    Bool,
    Char,
    Short,
    Int,
    Long,
    LongLong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatKind {
    Float,
    Double,
    LongDouble,
}

#[derive(Debug, Clone)]
pub struct Member {
    pub name: Sym,
    pub ty: Rc<Type>,
    pub offset: usize,
    /// `Some(width)` for a bit-field member.
    pub bitfield_width: Option<u32>,
    /// Bit position within the storage unit at `offset`, counting from the storage unit's
    /// least-significant bit. `0` for non-bit-field members.
    pub bit_offset: u32,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: Option<Sym>,
    pub ty: Rc<Type>,
}

#[derive(Debug, Clone)]
pub enum TypeKind {
    Void,
    Bool,
    Int(IntKind, bool /* unsigned */),
    Float(FloatKind),
    /// `enumerators` is the enum's name/value pairs in declaration order, needed for the JSON
    /// declaration dump (spec.md §6: "for enums, the enumerator name/value pairs").
    Enum(Sym, Rc<Vec<(Sym, i128)>>),
    Pointer(Rc<Type>),
    /// `None` length means an incomplete array (`T x[]`).
    Array(Rc<Type>, Option<usize>),
    /// Variable-length array: the element type plus the (unevaluated, non-constant) length
    /// expression written at the declaration site. Size/align are the element's, since the
    /// actual extent is only known at runtime.
    Vla(Rc<Type>, Rc<Expr>),
    /// Struct/union: `is_union` distinguishes the two; `members` is `None` until the tag is
    /// completed (so a forward-declared `struct Foo;` can be referenced before its body).
    Record { tag: Option<Sym>, is_union: bool, members: Option<Vec<Member>> },
    Function { ret: Rc<Type>, params: Vec<Param>, variadic: bool },
    /// Apple-style block (closure) type: `^ret(params)`. Distinct from `Function` because a
    /// block value is always accessed through a pointer-sized reference carrying an implicit
    /// capture, never called directly by value.
    Block { ret: Rc<Type>, params: Vec<Param> },
    /// A `typedef`-introduced alias, kept distinct from its underlying type so diagnostics can
    /// name the alias the user actually wrote.
    Typedef(Sym, Rc<Type>),
}

#[derive(Debug, Clone)]
pub struct Type {
    pub kind: TypeKind,
    pub is_const: bool,
    pub is_volatile: bool,
    pub is_atomic: bool,
    pub align: usize,
    pub size: usize,
}

impl Type {
    pub fn new(kind: TypeKind, size: usize, align: usize) -> Rc<Type> {
        Rc::new(Type { kind, is_const: false, is_volatile: false, is_atomic: false, align, size })
    }

    pub fn void() -> Rc<Type> {
        Type::new(TypeKind::Void, 0, 1)
    }

    pub fn int(kind: IntKind, unsigned: bool) -> Rc<Type> {
        let (size, align) = int_layout(kind);
        Type::new(TypeKind::Int(kind, unsigned), size, align)
    }

    pub fn float(kind: FloatKind) -> Rc<Type> {
        let (size, align) = match kind {
            FloatKind::Float => (4, 4),
            FloatKind::Double => (8, 8),
            FloatKind::LongDouble => (16, 16),
        };
        Type::new(TypeKind::Float(kind), size, align)
    }

    pub fn pointer_to(pointee: Rc<Type>) -> Rc<Type> {
        Type::new(TypeKind::Pointer(pointee), 8, 8)
    }

    pub fn array_of(elem: Rc<Type>, len: Option<usize>) -> Rc<Type> {
        let size = len.map(|n| n * elem.size).unwrap_or(0);
        let align = elem.align;
        Type::new(TypeKind::Array(elem, len), size, align)
    }

    /// A variable-length array: size is unknowable at parse time (spec.md's `Type` data model:
    /// "VLA carry an AST expression for the length"), so it's left at 0 like an incomplete
    /// array rather than attempting compile-time evaluation of a runtime expression.
    pub fn vla_of(elem: Rc<Type>, len_expr: Rc<Expr>) -> Rc<Type> {
        let align = elem.align;
        Type::new(TypeKind::Vla(elem, len_expr), 0, align)
    }

    pub fn block_of(ret: Rc<Type>, params: Vec<Param>) -> Rc<Type> {
        Type::new(TypeKind::Block { ret, params }, 8, 8)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.kind, TypeKind::Int(..) | TypeKind::Bool | TypeKind::Enum(..))
    }

    pub fn is_arithmetic(&self) -> bool {
        self.is_integer() || matches!(self.kind, TypeKind::Float(_))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.kind, TypeKind::Pointer(_))
    }

    pub fn is_scalar(&self) -> bool {
        self.is_arithmetic() || self.is_pointer()
    }

    /// Strips `Typedef` wrappers to reach the underlying type, as most compatibility/conversion
    /// checks need to do (spec.md's typedef-vs-identifier note: a typedef name denotes its
    /// underlying type for every purpose except diagnostics).
    pub fn unwrap_typedef(self: &Rc<Type>) -> Rc<Type> {
        match &self.kind {
            TypeKind::Typedef(_, inner) => inner.unwrap_typedef(),
            _ => self.clone(),
        }
    }
}

fn int_layout(kind: IntKind) -> (usize, usize) {
    match kind {
        IntKind::Bool => (1, 1),
        IntKind::Char => (1, 1),
        IntKind::Short => (2, 2),
        IntKind::Int => (4, 4),
        IntKind::Long => (8, 8),
        IntKind::LongLong => (8, 8),
    }
}

/// Integer conversion rank, used by the usual arithmetic conversions (higher rank wins,
/// ties broken in favor of unsigned per the standard).
pub fn int_rank(kind: IntKind) -> u8 {
    match kind {
        IntKind::Bool => 0,
        IntKind::Char => 1,
        IntKind::Short => 2,
        IntKind::Int => 3,
        IntKind::Long => 4,
        IntKind::LongLong => 5,
    }
}

/// Applies the usual arithmetic conversions to the types of a binary operator's two operands
/// and returns the common type both operands convert to.
pub fn usual_arithmetic_conversions(a: &Rc<Type>, b: &Rc<Type>) -> Rc<Type> {
    let a = a.unwrap_typedef();
    let b = b.unwrap_typedef();
    if let (TypeKind::Float(fa), TypeKind::Float(fb)) = (&a.kind, &b.kind) {
        return Type::float(if rank_float(*fa) >= rank_float(*fb) { *fa } else { *fb });
    }
    if matches!(a.kind, TypeKind::Float(_)) {
        return a;
    }
    if matches!(b.kind, TypeKind::Float(_)) {
        return b;
    }
    let (ka, ua) = promote(&a);
    let (kb, ub) = promote(&b);
    let rank_a = int_rank(ka).max(int_rank(IntKind::Int));
    let rank_b = int_rank(kb).max(int_rank(IntKind::Int));
    let winner_kind = if rank_a >= rank_b { ka.max(IntKind::Int) } else { kb.max(IntKind::Int) };
    let unsigned = if rank_a == rank_b { ua || ub } else if rank_a > rank_b { ua } else { ub };
    Type::int(winner_kind, unsigned)
}

fn promote(t: &Rc<Type>) -> (IntKind, bool) {
    match &t.kind {
        TypeKind::Int(k, u) => (*k, *u),
        TypeKind::Bool => (IntKind::Int, false),
        TypeKind::Enum(..) => (IntKind::Int, false),
        _ => (IntKind::Int, false),
    }
}

fn rank_float(k: FloatKind) -> u8 {
    match k {
        FloatKind::Float => 0,
        FloatKind::Double => 1,
        FloatKind::LongDouble => 2,
    }
}

/// Structural compatibility check used for redeclarations (spec.md's "compatible types" rule):
/// ignores `const`/`volatile` on the outermost level the way parameter types do, but not for
/// pointee types.
pub fn compatible(a: &Rc<Type>, b: &Rc<Type>) -> bool {
    let a = a.unwrap_typedef();
    let b = b.unwrap_typedef();
    match (&a.kind, &b.kind) {
        (TypeKind::Void, TypeKind::Void) => true,
        (TypeKind::Bool, TypeKind::Bool) => true,
        (TypeKind::Int(ka, ua), TypeKind::Int(kb, ub)) => ka == kb && ua == ub,
        (TypeKind::Float(fa), TypeKind::Float(fb)) => fa == fb,
        (TypeKind::Enum(na, _), TypeKind::Enum(nb, _)) => na == nb,
        (TypeKind::Pointer(pa), TypeKind::Pointer(pb)) => compatible(pa, pb),
        (TypeKind::Array(ea, la), TypeKind::Array(eb, lb)) => compatible(ea, eb) && (la.is_none() || lb.is_none() || la == lb),
        // A VLA's length expression never participates in compatibility: two VLAs (or a VLA
        // and an ordinary array) of the same element type are compatible regardless of
        // whether their runtime extents could ever be proven equal.
        (TypeKind::Vla(ea, _), TypeKind::Vla(eb, _)) => compatible(ea, eb),
        (TypeKind::Vla(ea, _), TypeKind::Array(eb, _)) | (TypeKind::Array(ea, _), TypeKind::Vla(eb, _)) => compatible(ea, eb),
        (TypeKind::Record { tag: ta, is_union: ua, .. }, TypeKind::Record { tag: tb, is_union: ub, .. }) => ta == tb && ua == ub,
        (
            TypeKind::Function { ret: ra, params: pa, variadic: va },
            TypeKind::Function { ret: rb, params: pb, variadic: vb },
        ) => {
            compatible(ra, rb)
                && va == vb
                && pa.len() == pb.len()
                && pa.iter().zip(pb.iter()).all(|(x, y)| compatible(&x.ty, &y.ty))
        }
        (TypeKind::Block { ret: ra, params: pa }, TypeKind::Block { ret: rb, params: pb }) => {
            compatible(ra, rb) && pa.len() == pb.len() && pa.iter().zip(pb.iter()).all(|(x, y)| compatible(&x.ty, &y.ty))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usual_arithmetic_conversions_promote_to_wider_int() {
        let a = Type::int(IntKind::Char, false);
        let b = Type::int(IntKind::Long, false);
        let r = usual_arithmetic_conversions(&a, &b);
        assert!(matches!(r.kind, TypeKind::Int(IntKind::Long, false)));
    }

    #[test]
    fn mixed_sign_same_rank_yields_unsigned() {
        let a = Type::int(IntKind::Int, true);
        let b = Type::int(IntKind::Int, false);
        let r = usual_arithmetic_conversions(&a, &b);
        assert!(matches!(r.kind, TypeKind::Int(IntKind::Int, true)));
    }

    #[test]
    fn float_beats_any_integer() {
        let a = Type::int(IntKind::Long, false);
        let b = Type::float(FloatKind::Float);
        let r = usual_arithmetic_conversions(&a, &b);
        assert!(matches!(r.kind, TypeKind::Float(FloatKind::Float)));
    }

    #[test]
    fn pointers_compatible_only_with_same_pointee() {
        let p1 = Type::pointer_to(Type::int(IntKind::Int, false));
        let p2 = Type::pointer_to(Type::int(IntKind::Int, false));
        let p3 = Type::pointer_to(Type::int(IntKind::Long, false));
        assert!(compatible(&p1, &p2));
        assert!(!compatible(&p1, &p3));
    }

    #[test]
    fn incomplete_array_compatible_with_sized_array() {
        let unsized_arr = Type::array_of(Type::int(IntKind::Int, false), None);
        let sized = Type::array_of(Type::int(IntKind::Int, false), Some(4));
        assert!(compatible(&unsized_arr, &sized));
    }
}
