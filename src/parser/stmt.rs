//! Statement parsing: compound statements and scope entry/exit, the control-flow
//! constructs, `goto`/label collection and end-of-function resolution, `switch`/`case`, and
//! `_Static_assert` (spec.md §4.6).

use crate::ast::Stmt;
use crate::diagnostics::{Diagnostic, Fatal, Severity};
use crate::token::TokenKind;

use super::expr;
use super::Parser;

impl<'a> Parser<'a> {
    pub(crate) fn parse_compound_statement(&mut self) -> Result<Stmt, Fatal> {
        self.expect("{")?;
        self.scopes.push();
        let mut stmts = Vec::new();
        while !self.at("}") && !self.at_eof() {
            stmts.push(self.parse_block_item()?);
        }
        self.expect("}")?;
        self.scopes.pop();
        Ok(Stmt::Compound(stmts))
    }

    fn parse_block_item(&mut self) -> Result<Stmt, Fatal> {
        if self.is_decl_start() {
            return self.parse_declaration_statement();
        }
        self.parse_statement()
    }

    /// True if the upcoming tokens begin a declaration rather than an expression statement:
    /// a storage-class/type-qualifier/type-specifier keyword, or an identifier already bound
    /// to a typedef in the current scope chain (the disambiguation spec.md §4.6 calls out).
    fn is_decl_start(&self) -> bool {
        const STORAGE: &[&str] = &[
            "typedef", "extern", "static", "auto", "register", "_Thread_local", "inline", "_Noreturn", "_Alignas",
        ];
        if STORAGE.contains(&self.peek().text.as_str()) {
            return true;
        }
        self.is_type_start_at(0)
    }

    fn parse_declaration_statement(&mut self) -> Result<Stmt, Fatal> {
        let decls = self.parse_local_declaration()?;
        Ok(Stmt::Decl(decls))
    }

    /// Parses one local declaration, hoisting `static` locals to the program's top level under
    /// a unique name the way spec.md §4.6 describes, and leaving behind a reference `Obj` in
    /// the local scope so ordinary lookup still finds the (renamed) storage.
    fn parse_local_declaration(&mut self) -> Result<Vec<std::rc::Rc<crate::ast::Obj>>, Fatal> {
        use crate::types::TypeKind;

        let (base, storage) = self.parse_decl_specifiers()?;
        let mut decls = Vec::new();
        if self.at(";") {
            self.advance();
            return Ok(decls);
        }
        loop {
            let start = self.peek().clone();
            let (name, ty) = self.parse_declarator(base.clone())?;
            self.skip_gnu_attributes();
            if storage.is_typedef {
                if let Some(name) = name {
                    self.scopes.declare_typedef(name, ty);
                }
            } else if let Some(name) = name {
                let is_function = matches!(ty.kind, TypeKind::Function { .. });
                if storage.is_static && !is_function {
                    let unique = self.new_unique_name("static");
                    let init = if self.eat("=") {
                        let initializer = super::init::parse_initializer(self)?;
                        super::init::flatten_initializer(self, &ty, &initializer)
                    } else {
                        Vec::new()
                    };
                    let obj = std::rc::Rc::new(crate::ast::Obj {
                        name: unique,
                        ty,
                        is_typedef: false,
                        is_static: true,
                        is_extern: false,
                        is_function: false,
                        body: None,
                        init,
                        loc: self.loc(&start),
                    });
                    self.hoist(obj.clone());
                    // The local name resolves to the hoisted static storage, not a fresh
                    // automatic object; `Obj.name` stays `unique` so codegen finds one object.
                    self.scopes.declare_var(name, obj);
                } else {
                    let init = if self.eat("=") {
                        let initializer = super::init::parse_initializer(self)?;
                        super::init::flatten_initializer(self, &ty, &initializer)
                    } else {
                        Vec::new()
                    };
                    let obj = std::rc::Rc::new(crate::ast::Obj {
                        name,
                        ty,
                        is_typedef: false,
                        is_static: false,
                        is_extern: storage.is_extern,
                        is_function,
                        body: None,
                        init,
                        loc: self.loc(&start),
                    });
                    self.scopes.declare_var(name, obj.clone());
                    decls.push(obj);
                }
            }
            if !self.eat(",") {
                break;
            }
        }
        self.expect(";")?;
        Ok(decls)
    }

    fn parse_statement(&mut self) -> Result<Stmt, Fatal> {
        let tok = self.peek().clone();
        match tok.text.as_str() {
            "{" => self.parse_compound_statement(),
            "if" => {
                self.advance();
                self.expect("(")?;
                let cond = expr::parse_expr(self)?;
                self.expect(")")?;
                let then_branch = Box::new(self.parse_statement()?);
                let else_branch = if self.eat("else") { Some(Box::new(self.parse_statement()?)) } else { None };
                Ok(Stmt::If(cond, then_branch, else_branch))
            }
            "while" => {
                self.advance();
                self.expect("(")?;
                let cond = expr::parse_expr(self)?;
                self.expect(")")?;
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::While(cond, body))
            }
            "do" => {
                self.advance();
                let body = Box::new(self.parse_statement()?);
                self.expect("while")?;
                self.expect("(")?;
                let cond = expr::parse_expr(self)?;
                self.expect(")")?;
                self.expect(";")?;
                Ok(Stmt::DoWhile(body, cond))
            }
            "for" => {
                self.advance();
                self.expect("(")?;
                self.scopes.push();
                let init = if self.at(";") {
                    None
                } else if self.is_decl_start() {
                    Some(Box::new(Stmt::Decl(self.parse_local_declaration()?)))
                } else {
                    let e = expr::parse_expr(self)?;
                    self.expect(";")?;
                    Some(Box::new(Stmt::Expr(e)))
                };
                if init.is_none() {
                    self.expect(";")?;
                }
                let cond = if self.at(";") { None } else { Some(expr::parse_expr(self)?) };
                self.expect(";")?;
                let step = if self.at(")") { None } else { Some(expr::parse_expr(self)?) };
                self.expect(")")?;
                let body = Box::new(self.parse_statement()?);
                self.scopes.pop();
                Ok(Stmt::For(init, cond, step, body))
            }
            "return" => {
                self.advance();
                let value = if self.at(";") { None } else { Some(expr::parse_expr(self)?) };
                self.expect(";")?;
                Ok(Stmt::Return(value))
            }
            "break" => {
                self.advance();
                self.expect(";")?;
                Ok(Stmt::Break)
            }
            "continue" => {
                self.advance();
                self.expect(";")?;
                Ok(Stmt::Continue)
            }
            "goto" => {
                self.advance();
                if self.eat("*") {
                    // Computed goto (`goto *expr`): the target is an arbitrary label-address
                    // expression, not resolvable to a fixed label name at parse time, so it is
                    // left out of the `pending_gotos` end-of-function resolution pass.
                    let _ = expr::parse_expr(self)?;
                    self.expect(";")?;
                    return Ok(Stmt::Null);
                }
                let name_tok = self.advance();
                let name = self.intern(&name_tok.text);
                self.expect(";")?;
                let loc = self.loc(&name_tok);
                self.pending_gotos.push((name, loc));
                Ok(Stmt::Goto(name))
            }
            "switch" => {
                self.advance();
                self.expect("(")?;
                let cond = expr::parse_expr(self)?;
                self.expect(")")?;
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::Switch(cond, body))
            }
            "case" => {
                self.advance();
                let value = expr::parse_expr(self)?;
                self.expect(":")?;
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::Case(value, body))
            }
            "default" => {
                self.advance();
                self.expect(":")?;
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::Default(body))
            }
            "_Static_assert" => parse_static_assert(self),
            "asm" | "__asm" | "__asm__" => parse_asm_statement(self),
            ";" => {
                self.advance();
                Ok(Stmt::Null)
            }
            _ if tok.kind == TokenKind::Identifier && self.peek_at(1).is(":") => {
                self.advance();
                self.advance();
                let name = self.intern(&tok.text);
                self.seen_labels.push(name);
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::Label(name, body))
            }
            _ => {
                let e = expr::parse_expr(self)?;
                self.expect(";")?;
                Ok(Stmt::Expr(e))
            }
        }
    }

    /// Checks every `goto` recorded in [`Self::pending_gotos`] against
    /// [`Self::seen_labels`], run once at the close of a function body (spec.md §4.6:
    /// "unbound gotos are errors").
    pub(crate) fn resolve_gotos(&mut self) -> Result<(), Fatal> {
        for (name, loc) in std::mem::take(&mut self.pending_gotos) {
            if !self.seen_labels.contains(&name) {
                let label_name = self.interner.resolve(name).to_string();
                self.diags.report(Diagnostic::new(
                    Severity::Error,
                    Some(loc.file),
                    format!("<file {}>", loc.file.0),
                    loc.line,
                    loc.col,
                    format!("use of undeclared label '{}'", label_name),
                ))?;
            }
        }
        Ok(())
    }
}

/// `asm`/`__asm__` statement (spec.md §4.6: "captured as opaque strings"). The GNU
/// `asm(code : outputs : inputs : clobbers)` syntax uses `:` as an operand-list separator,
/// which the ordinary expression grammar can't parse, so the whole parenthesized body is
/// consumed token-by-token (tracking paren nesting) rather than structurally.
fn parse_asm_statement(p: &mut Parser<'_>) -> Result<Stmt, Fatal> {
    p.advance();
    while p.at("volatile") || p.at("__volatile__") || p.at("goto") {
        p.advance();
    }
    p.expect("(")?;
    let mut depth = 1u32;
    let mut text = String::new();
    while depth > 0 && !p.at_eof() {
        let tok = p.advance();
        if tok.text == "(" {
            depth += 1;
        } else if tok.text == ")" {
            depth -= 1;
            if depth == 0 {
                break;
            }
        }
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(&tok.text);
    }
    p.expect(";")?;
    Ok(Stmt::Asm(std::rc::Rc::new(text.into_bytes())))
}

pub(crate) fn parse_static_assert(p: &mut Parser<'_>) -> Result<Stmt, Fatal> {
    p.advance();
    p.expect("(")?;
    let cond_expr = expr::parse_conditional_expr(p)?;
    let const_expr = expr::to_const_expr(&cond_expr).map_err(|e| p.fatal_here(&e))?;
    let (v, _) = crate::constexpr::eval(&const_expr).map_err(|e| p.fatal_here(&e))?;
    let message = if p.eat(",") {
        let tok = p.advance();
        tok.str_val.map(|(bytes, _)| String::from_utf8_lossy(&bytes).trim_end_matches('\0').to_string())
    } else {
        None
    };
    p.expect(")")?;
    p.expect(";")?;
    if v == 0 {
        let tok = p.peek().clone();
        p.error(&tok, message.as_deref().unwrap_or("static assertion failed"))?;
    }
    Ok(Stmt::StaticAssert(cond_expr, message.map(|s| std::rc::Rc::new(s.into_bytes()))))
}
