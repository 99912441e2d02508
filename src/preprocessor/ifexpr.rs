//! Recursive-descent parser from a flat token slice to [`crate::constexpr::ConstExpr`], used
//! only by `#if`/`#elif` evaluation. Precedence climbs from `?:` down to primary expressions,
//! matching the C conditional-expression grammar (no assignment or comma at this level).

use crate::constexpr::{BinOp, ConstExpr, UnOp};
use crate::token::{NumValue, Token};

pub struct Parser<'a> {
    toks: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(toks: &'a [Token]) -> Self {
        Self { toks, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.toks.get(self.pos)
    }

    fn bump(&mut self) -> Option<&Token> {
        let t = self.toks.get(self.pos);
        self.pos += 1;
        t
    }

    fn eat(&mut self, text: &str) -> bool {
        if self.peek().map(|t| t.text == text).unwrap_or(false) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn parse_expr(&mut self) -> Option<ConstExpr> {
        let e = self.parse_ternary()?;
        if self.pos != self.toks.len() {
            return None;
        }
        Some(e)
    }

    fn parse_ternary(&mut self) -> Option<ConstExpr> {
        let cond = self.parse_binary(0)?;
        if self.eat("?") {
            let t = self.parse_ternary()?;
            if !self.eat(":") {
                return None;
            }
            let f = self.parse_ternary()?;
            return Some(ConstExpr::Cond(Box::new(cond), Box::new(t), Box::new(f)));
        }
        Some(cond)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Option<ConstExpr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let Some(op_text) = self.peek().map(|t| t.text.clone()) else { break };
            let Some((op, prec)) = binop_for(&op_text) else { break };
            if prec < min_prec {
                break;
            }
            self.bump();
            let rhs = self.parse_binary(prec + 1)?;
            lhs = ConstExpr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Some(lhs)
    }

    fn parse_unary(&mut self) -> Option<ConstExpr> {
        if let Some(t) = self.peek() {
            let op = match t.text.as_str() {
                "+" => Some(UnOp::Plus),
                "-" => Some(UnOp::Neg),
                "~" => Some(UnOp::BitNot),
                "!" => Some(UnOp::Not),
                _ => None,
            };
            if let Some(op) = op {
                self.bump();
                let operand = self.parse_unary()?;
                return Some(ConstExpr::Unary(op, Box::new(operand)));
            }
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Option<ConstExpr> {
        let t = self.bump()?;
        if t.is("(") {
            let e = self.parse_ternary()?;
            if !self.eat(")") {
                return None;
            }
            return Some(e);
        }
        match &t.num {
            NumValue::Int(v, u) => Some(ConstExpr::Lit(*v as i128, *u)),
            NumValue::Float(f) => Some(ConstExpr::Lit(*f as i128, false)),
            NumValue::None => {
                // A bare identifier remaining after `defined`-resolution and macro expansion
                // evaluates to 0 per the standard; this front end converts those to `0` tokens
                // before parsing (see `directive::eval_if_condition`), so reaching here with a
                // non-numeric token is a syntax error.
                None
            }
        }
    }
}

fn binop_for(text: &str) -> Option<(BinOp, u8)> {
    Some(match text {
        "||" => (BinOp::Or, 1),
        "&&" => (BinOp::And, 2),
        "|" => (BinOp::BitOr, 3),
        "^" => (BinOp::BitXor, 4),
        "&" => (BinOp::BitAnd, 5),
        "==" => (BinOp::Eq, 6),
        "!=" => (BinOp::Ne, 6),
        "<" => (BinOp::Lt, 7),
        "<=" => (BinOp::Le, 7),
        ">" => (BinOp::Gt, 7),
        ">=" => (BinOp::Ge, 7),
        "<<" => (BinOp::Shl, 8),
        ">>" => (BinOp::Shr, 8),
        "+" => (BinOp::Add, 9),
        "-" => (BinOp::Sub, 9),
        "*" => (BinOp::Mul, 10),
        "/" => (BinOp::Div, 10),
        "%" => (BinOp::Mod, 10),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FileId;
    use crate::token::{HideSet, Provenance, TokenKind};

    fn num(v: i64) -> Token {
        Token {
            kind: TokenKind::Num,
            text: v.to_string(),
            prov: Provenance { file: FileId(0), line: 1, col: 1, at_beginning_of_line: false, has_leading_space: true },
            num: NumValue::Int(v, false),
            str_val: None,
            hideset: HideSet::empty(),
            origin: None,
            keyword: None,
        }
    }

    fn punct(s: &str) -> Token {
        Token {
            kind: TokenKind::Punct,
            text: s.to_string(),
            prov: Provenance { file: FileId(0), line: 1, col: 1, at_beginning_of_line: false, has_leading_space: true },
            num: NumValue::None,
            str_val: None,
            hideset: HideSet::empty(),
            origin: None,
            keyword: None,
        }
    }

    #[test]
    fn parses_precedence_correctly() {
        // 1 + 2 * 3 == 7
        let toks = vec![num(1), punct("+"), num(2), punct("*"), num(3)];
        let mut p = Parser::new(&toks);
        let e = p.parse_expr().unwrap();
        assert_eq!(crate::constexpr::eval(&e).unwrap(), (7, false));
    }

    #[test]
    fn parses_ternary() {
        let toks = vec![num(1), punct("?"), num(2), punct(":"), num(3)];
        let mut p = Parser::new(&toks);
        let e = p.parse_expr().unwrap();
        assert_eq!(crate::constexpr::eval(&e).unwrap(), (2, false));
    }
}
