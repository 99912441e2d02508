//! Integer constant-expression evaluator shared by `#if`/`#elif` condition evaluation
//! (`preprocessor::directive`) and the parser's constant folding (`parser::expr`). Both sides
//! lower their own token/AST representation down to [`ConstExpr`] and call [`eval`]; this is
//! the one place the arithmetic and promotion rules live.
//!
//! Values are tracked as `i128` with an `unsigned` flag rather than as native `i64`/`u64`,
//! since `#if` constant expressions are evaluated at `intmax_t`/`uintmax_t` width regardless of
//! the target's native int width, and this front end does not model a target ABI.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Plus,
    Neg,
    BitNot,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    And,
    Or,
}

#[derive(Debug, Clone)]
pub enum ConstExpr {
    Lit(i128, bool /* unsigned */),
    Unary(UnOp, Box<ConstExpr>),
    Binary(BinOp, Box<ConstExpr>, Box<ConstExpr>),
    Cond(Box<ConstExpr>, Box<ConstExpr>, Box<ConstExpr>),
}

/// Result of evaluating a [`ConstExpr`]: the value plus whether it should be treated as
/// unsigned for the purposes of a later comparison (the "usual arithmetic conversions", spec.md
/// §9's resolution: unsignedness is sticky once introduced anywhere in the expression).
pub type Value = (i128, bool);

pub fn eval(e: &ConstExpr) -> Result<Value, String> {
    match e {
        ConstExpr::Lit(v, u) => Ok((*v, *u)),
        ConstExpr::Unary(op, a) => {
            let (v, u) = eval(a)?;
            Ok(match op {
                UnOp::Plus => (v, u),
                UnOp::Neg => (v.wrapping_neg(), u),
                UnOp::BitNot => (!v, u),
                UnOp::Not => (i128::from(v == 0), false),
            })
        }
        ConstExpr::Cond(c, t, f) => {
            let (cv, _) = eval(c)?;
            if cv != 0 { eval(t) } else { eval(f) }
        }
        ConstExpr::Binary(op, a, b) => {
            let (av, au) = eval(a)?;
            let (bv, bu) = eval(b)?;
            let unsigned = au || bu;
            match op {
                BinOp::Add => checked_arith(av, bv, unsigned, i64::checked_add, u64::wrapping_add),
                BinOp::Sub => checked_arith(av, bv, unsigned, i64::checked_sub, u64::wrapping_sub),
                BinOp::Mul => checked_arith(av, bv, unsigned, i64::checked_mul, u64::wrapping_mul),
                BinOp::Div => {
                    if bv == 0 {
                        return Err("division by zero in constant expression".into());
                    }
                    Ok((av.wrapping_div(bv), unsigned))
                }
                BinOp::Mod => {
                    if bv == 0 {
                        return Err("division by zero in constant expression".into());
                    }
                    Ok((av.wrapping_rem(bv), unsigned))
                }
                BinOp::Shl => Ok((av.wrapping_shl(bv as u32), au)),
                BinOp::Shr => Ok((av.wrapping_shr(bv as u32), au)),
                BinOp::Lt => Ok((i128::from(cmp(av, au, bv, bu) < 0), false)),
                BinOp::Le => Ok((i128::from(cmp(av, au, bv, bu) <= 0), false)),
                BinOp::Gt => Ok((i128::from(cmp(av, au, bv, bu) > 0), false)),
                BinOp::Ge => Ok((i128::from(cmp(av, au, bv, bu) >= 0), false)),
                BinOp::Eq => Ok((i128::from(av == bv), false)),
                BinOp::Ne => Ok((i128::from(av != bv), false)),
                BinOp::BitAnd => Ok((av & bv, unsigned)),
                BinOp::BitXor => Ok((av ^ bv, unsigned)),
                BinOp::BitOr => Ok((av | bv, unsigned)),
                BinOp::And => Ok((i128::from(av != 0 && bv != 0), false)),
                BinOp::Or => Ok((i128::from(av != 0 || bv != 0), false)),
            }
        }
    }
}

/// `+`/`-`/`*` on `intmax_t`/`uintmax_t`-width operands (spec.md §4.6): unsigned overflow wraps,
/// signed overflow is a constant-expression error. `checked` runs the signed 64-bit op;
/// `wrapping` runs the unsigned 64-bit op. Operands are truncated to 64 bits first since that's
/// the width these constants are actually evaluated at, even though they're carried in `i128`.
fn checked_arith(
    av: i128,
    bv: i128,
    unsigned: bool,
    checked: fn(i64, i64) -> Option<i64>,
    wrapping: fn(u64, u64) -> u64,
) -> Result<Value, String> {
    if unsigned {
        let r = wrapping(av as u64, bv as u64);
        Ok((r as i128, true))
    } else {
        match checked(av as i64, bv as i64) {
            Some(r) => Ok((r as i128, false)),
            None => Err("signed integer overflow in constant expression".into()),
        }
    }
}

/// Compares `a`/`b` as unsigned when either operand is unsigned, per the usual arithmetic
/// conversions; returns a value with the same sign convention as `Ordering::cmp` collapsed to
/// an `i32` (negative/zero/positive).
fn cmp(a: i128, au: bool, b: i128, bu: bool) -> i32 {
    if au || bu {
        let (ua, ub) = (a as u128, b as u128);
        ua.cmp(&ub) as i32
    } else {
        a.cmp(&b) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_arithmetic() {
        let e = ConstExpr::Binary(
            BinOp::Add,
            Box::new(ConstExpr::Lit(1, false)),
            Box::new(ConstExpr::Binary(BinOp::Mul, Box::new(ConstExpr::Lit(2, false)), Box::new(ConstExpr::Lit(3, false)))),
        );
        assert_eq!(eval(&e).unwrap(), (7, false));
    }

    #[test]
    fn division_by_zero_errors() {
        let e = ConstExpr::Binary(BinOp::Div, Box::new(ConstExpr::Lit(1, false)), Box::new(ConstExpr::Lit(0, false)));
        assert!(eval(&e).is_err());
    }

    #[test]
    fn unsigned_comparison_treats_negative_as_large() {
        let e = ConstExpr::Binary(
            BinOp::Lt,
            Box::new(ConstExpr::Lit(-1, true)),
            Box::new(ConstExpr::Lit(1, false)),
        );
        assert_eq!(eval(&e).unwrap(), (0, false));
    }

    #[test]
    fn signed_addition_overflow_errors() {
        let e = ConstExpr::Binary(
            BinOp::Add,
            Box::new(ConstExpr::Lit(i64::MAX as i128, false)),
            Box::new(ConstExpr::Lit(1, false)),
        );
        assert!(eval(&e).is_err());
    }

    #[test]
    fn unsigned_addition_wraps_instead_of_erroring() {
        let e = ConstExpr::Binary(
            BinOp::Add,
            Box::new(ConstExpr::Lit(u64::MAX as i128, true)),
            Box::new(ConstExpr::Lit(1, true)),
        );
        assert_eq!(eval(&e).unwrap(), (0, true));
    }

    #[test]
    fn ternary_selects_branch_without_evaluating_the_other_for_division() {
        let e = ConstExpr::Cond(
            Box::new(ConstExpr::Lit(0, false)),
            Box::new(ConstExpr::Binary(BinOp::Div, Box::new(ConstExpr::Lit(1, false)), Box::new(ConstExpr::Lit(0, false)))),
            Box::new(ConstExpr::Lit(9, false)),
        );
        assert_eq!(eval(&e).unwrap(), (9, false));
    }
}
