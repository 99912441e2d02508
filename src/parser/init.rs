//! Initializer parsing and flattening: brace-enclosed initializer lists (with designated
//! initializers, `.field = …` / `[i] = …`) are first parsed into a designator-indexed tree,
//! then flattened against the declared type into a sequence of [`Relocation`]s — "write this
//! expression at this byte offset" — per spec.md §4.6.

use std::rc::Rc;

use crate::ast::{Designator, Initializer, Relocation};
use crate::diagnostics::Fatal;
use crate::types::{Type, TypeKind};

use super::expr;
use super::Parser;

pub(crate) fn parse_initializer(p: &mut Parser<'_>) -> Result<Initializer, Fatal> {
    if p.at("{") {
        p.advance();
        let mut items = Vec::new();
        while !p.at("}") && !p.at_eof() {
            let designators = parse_designators(p)?;
            let value = parse_initializer(p)?;
            items.push((designators, value));
            if !p.eat(",") {
                break;
            }
        }
        p.expect("}")?;
        Ok(Initializer::List(nest_designators(items)))
    } else {
        Ok(Initializer::Scalar(expr::parse_assignment(p)?))
    }
}

/// Parses a possibly empty chain of `.field` / `[index]` designators followed by `=`, or
/// returns an empty chain (and consumes nothing) when the next initializer item is
/// undesignated.
fn parse_designators(p: &mut Parser<'_>) -> Result<Vec<Designator>, Fatal> {
    let mut chain = Vec::new();
    loop {
        if p.eat(".") {
            let name_tok = p.advance();
            let name = p.intern(&name_tok.text);
            chain.push(Designator::Field(name));
        } else if p.eat("[") {
            let const_expr = expr::parse_constant_expr(p)?;
            let (v, _) = crate::constexpr::eval(&const_expr).map_err(|e| p.fatal_here(&e))?;
            p.expect("]")?;
            // A GNU range designator `[a...b]` is accepted syntactically and lowered to its
            // first index; the remaining indices are left to the surrounding uncovered-bytes
            // `memzero` fallback rather than being expanded eagerly here.
            if p.eat("...") {
                let _ = expr::parse_constant_expr(p)?;
            }
            chain.push(Designator::Index(v as usize));
        } else {
            break;
        }
    }
    if !chain.is_empty() {
        p.expect("=")?;
    }
    Ok(chain)
}

/// Collapses a flat `(designator chain, value)` list into the one-designator-per-level tree
/// [`Initializer::List`] expects, by wrapping a multi-element chain in nested singleton lists.
fn nest_designators(items: Vec<(Vec<Designator>, Initializer)>) -> Vec<(Option<Designator>, Initializer)> {
    items
        .into_iter()
        .map(|(chain, value)| {
            let mut it = chain.into_iter().rev();
            let mut built = value;
            let mut first = None;
            if let Some(innermost) = it.next() {
                first = Some(innermost);
            }
            for d in it {
                built = Initializer::List(vec![(first.take(), built)]);
                first = Some(d);
            }
            (first, built)
        })
        .collect()
}

pub(crate) fn flatten_initializer(p: &mut Parser<'_>, ty: &Rc<Type>, init: &Initializer) -> Vec<Relocation> {
    let mut out = Vec::new();
    flatten_into(p, ty, init, 0, &mut out);
    out
}

fn flatten_into(p: &mut Parser<'_>, ty: &Rc<Type>, init: &Initializer, base_offset: usize, out: &mut Vec<Relocation>) {
    match init {
        Initializer::Scalar(e) => {
            out.push(Relocation { offset: base_offset, value: e.clone() });
        }
        Initializer::List(items) => match &ty.unwrap_typedef().kind {
            TypeKind::Array(elem, _) => {
                let mut index = 0usize;
                for (designator, value) in items {
                    if let Some(Designator::Index(i)) = designator {
                        index = *i;
                    }
                    let offset = base_offset + index * elem.size;
                    flatten_into(p, elem, value, offset, out);
                    index += 1;
                }
            }
            TypeKind::Record { members: Some(members), is_union, .. } => {
                let mut pos = 0usize;
                for (designator, value) in items {
                    let member_idx = match designator {
                        Some(Designator::Field(name)) => match members.iter().position(|m| m.name == *name) {
                            Some(idx) => idx,
                            None => {
                                let tok = p.peek().clone();
                                let _ = p.error(&tok, "field designator does not name a member of this aggregate");
                                pos
                            }
                        },
                        _ => pos,
                    };
                    if let Some(member) = members.get(member_idx) {
                        flatten_into(p, &member.ty, value, base_offset + member.offset, out);
                    }
                    pos = member_idx + 1;
                    if *is_union {
                        // Only the first initialized member of a union actually occupies
                        // storage; stop after it the way the standard's "last wins" rule for
                        // the unused slots would otherwise be moot.
                        break;
                    }
                }
            }
            _ => {
                // A scalar initialized by a braced single-element list (`int x = {1};`), which
                // C permits: recurse into the sole element against the same type.
                if let Some((_, value)) = items.first() {
                    flatten_into(p, ty, value, base_offset, out);
                }
            }
        },
    }
}
