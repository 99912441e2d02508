//! Recursive-descent parser: top-down, one token of lookahead, with the classical
//! typedef-name disambiguation (spec.md §4.6) resolved by consulting the current
//! [`crate::ast::ScopeStack`] rather than a separate symbol table.
//!
//! Split the way the tokenizer/preprocessor are split: this module owns token-stream
//! plumbing, scope management, declaration specifiers, and declarators; [`expr`] owns
//! expression parsing and constant folding; [`stmt`] owns statements, `goto`/label
//! resolution, and static-local hoisting; [`init`] owns initializer-list parsing and
//! flattening to `Relocation`s.

pub mod expr;
pub mod init;
pub mod stmt;

use std::rc::Rc;

use crate::ast::{Loc, Obj, Program, Scope, ScopeStack, Stmt};
use crate::diagnostics::{Diagnostic, Diagnostics, Fatal, Severity};
use crate::intern::{Interner, Sym};
use crate::source::FileId;
use crate::token::{NumValue, Token, TokenKind};
use crate::types::{FloatKind, IntKind, Member, Param, Type, TypeKind};

/// Parses one translation unit's worth of preprocessed, keyword-promoted tokens into a
/// [`Program`]. `pack` is the `#pragma pack` value in effect at end of preprocessing
/// (see `DESIGN.md` for why a single session-wide value, not a per-line stack, is used).
pub fn parse(tokens: Vec<Token>, interner: &mut Interner, diags: &mut Diagnostics, pack: Option<u32>) -> Result<Program, Fatal> {
    let mut p = Parser::new(tokens, interner, diags, pack);
    p.parse_translation_unit()?;
    let mut decls = p.top_decls;
    decls.extend(p.hoisted_decls);
    Ok(Program { decls })
}

/// A parsed array-declarator bound: a known constant, an explicitly incomplete `[]`, or a
/// runtime expression making the array a VLA.
#[derive(Clone)]
enum ArrayDim {
    Incomplete,
    Const(usize),
    Variable(Rc<crate::ast::Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Storage {
    pub is_typedef: bool,
    pub is_extern: bool,
    pub is_static: bool,
    pub is_thread_local: bool,
    pub is_inline: bool,
    pub is_noreturn: bool,
}

pub(crate) struct Parser<'a> {
    toks: Vec<Token>,
    pos: usize,
    interner: &'a mut Interner,
    diags: &'a mut Diagnostics,
    pub(crate) scopes: ScopeStack,
    anon_counter: u32,
    unique_counter: u32,
    current_pack: Option<u32>,
    top_decls: Vec<Rc<Obj>>,
    /// Static locals and hoisted string-literal globals, appended to the program after every
    /// ordinary top-level declaration has been collected (spec.md §4.6: "hoisted to global
    /// scope under `new_unique_name()`").
    hoisted_decls: Vec<Rc<Obj>>,
    /// `goto`s seen in the function currently being parsed, awaiting label resolution.
    pub(crate) pending_gotos: Vec<(Sym, Loc)>,
    /// Labels declared in the function currently being parsed.
    pub(crate) seen_labels: Vec<Sym>,
}

impl<'a> Parser<'a> {
    fn new(tokens: Vec<Token>, interner: &'a mut Interner, diags: &'a mut Diagnostics, pack: Option<u32>) -> Self {
        Self {
            toks: tokens,
            pos: 0,
            interner,
            diags,
            scopes: ScopeStack::new(),
            anon_counter: 0,
            unique_counter: 0,
            current_pack: pack,
            top_decls: Vec::new(),
            hoisted_decls: Vec::new(),
            pending_gotos: Vec::new(),
            seen_labels: Vec::new(),
        }
    }

    // ---- token stream plumbing -------------------------------------------------------

    pub(crate) fn peek(&self) -> &Token {
        &self.toks[self.pos.min(self.toks.len() - 1)]
    }

    pub(crate) fn peek_at(&self, n: usize) -> &Token {
        let i = (self.pos + n).min(self.toks.len() - 1);
        &self.toks[i]
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.peek().is_eof()
    }

    pub(crate) fn advance(&mut self) -> Token {
        let t = self.toks[self.pos.min(self.toks.len() - 1)].clone();
        if self.pos + 1 < self.toks.len() {
            self.pos += 1;
        }
        t
    }

    pub(crate) fn at(&self, text: &str) -> bool {
        self.peek().is(text)
    }

    pub(crate) fn eat(&mut self, text: &str) -> bool {
        if self.at(text) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, text: &str) -> Result<Token, Fatal> {
        if self.at(text) {
            Ok(self.advance())
        } else {
            let tok = self.peek().clone();
            self.error(&tok, &format!("expected '{}', found '{}'", text, tok.text))?;
            Ok(tok)
        }
    }

    pub(crate) fn loc(&self, tok: &Token) -> Loc {
        Loc { file: tok.prov.file, line: tok.prov.line, col: tok.prov.col }
    }

    pub(crate) fn intern(&mut self, s: &str) -> Sym {
        self.interner.intern(s)
    }

    pub(crate) fn error(&mut self, tok: &Token, msg: &str) -> Result<(), Fatal> {
        self.diags.report(Diagnostic::new(
            Severity::Error,
            Some(tok.prov.file),
            format!("<file {}>", tok.prov.file.0),
            tok.prov.line,
            tok.prov.col,
            msg.to_string(),
        ))
    }

    pub(crate) fn new_unique_name(&mut self, hint: &str) -> Sym {
        self.unique_counter += 1;
        self.intern(&format!(".L{}.{}", hint, self.unique_counter))
    }

    pub(crate) fn hoist(&mut self, obj: Rc<Obj>) {
        self.hoisted_decls.push(obj);
    }

    // ---- translation unit -------------------------------------------------------------

    fn parse_translation_unit(&mut self) -> Result<(), Fatal> {
        while !self.at_eof() {
            if self.eat(";") {
                continue;
            }
            let decl = self.parse_external_declaration()?;
            self.top_decls.extend(decl);
        }
        Ok(())
    }

    /// Parses one top-level declaration or function definition. A typedef produces no `Obj`
    /// of its own (it only installs a scope entry); an ordinary declaration may introduce
    /// several comma-separated declarators, hence the `Vec` return.
    fn parse_external_declaration(&mut self) -> Result<Vec<Rc<Obj>>, Fatal> {
        let start = self.peek().clone();
        let (base, storage) = self.parse_decl_specifiers()?;

        if self.at(";") {
            self.advance();
            return Ok(Vec::new());
        }

        let (name, ty) = self.parse_declarator(base.clone())?;
        self.skip_gnu_attributes();

        if storage.is_typedef {
            if let Some(name) = name {
                self.scopes.declare_typedef(name, ty);
            }
            self.finish_declarator_list(base, storage)?;
            return Ok(Vec::new());
        }

        let is_function = matches!(ty.kind, TypeKind::Function { .. });
        if is_function && self.at("{") {
            let name = name.ok_or(()).map_err(|_| self.fatal_here("function definition missing a name"))?;
            self.scopes.push();
            if let TypeKind::Function { params, .. } = &ty.kind {
                for param in params {
                    if let Some(pname) = param.name {
                        let pobj = Rc::new(Obj {
                            name: pname,
                            ty: param.ty.clone(),
                            is_typedef: false,
                            is_static: false,
                            is_extern: false,
                            is_function: false,
                            body: None,
                            init: Vec::new(),
                            loc: self.loc(&start),
                        });
                        self.scopes.declare_var(pname, pobj);
                    }
                }
            }
            self.pending_gotos.clear();
            self.seen_labels.clear();
            let body = self.parse_compound_statement()?;
            self.resolve_gotos()?;
            self.scopes.pop();
            let obj = Rc::new(Obj {
                name,
                ty,
                is_typedef: false,
                is_static: storage.is_static,
                is_extern: storage.is_extern,
                is_function: true,
                body: Some(body),
                init: Vec::new(),
                loc: self.loc(&start),
            });
            self.scopes.declare_var(obj.name, obj.clone());
            return Ok(vec![obj]);
        }

        let mut decls = Vec::new();
        if let Some(name) = name {
            decls.push(self.finish_one_declarator(name, ty, storage, &start)?);
        }
        while self.eat(",") {
            let (name, ty) = self.parse_declarator(base.clone())?;
            self.skip_gnu_attributes();
            if let Some(name) = name {
                decls.push(self.finish_one_declarator(name, ty, storage, &start)?);
            }
        }
        self.expect(";")?;
        Ok(decls)
    }

    fn finish_one_declarator(&mut self, name: Sym, ty: Rc<Type>, storage: Storage, start: &Token) -> Result<Rc<Obj>, Fatal> {
        let init = if self.eat("=") {
            let initializer = init::parse_initializer(self)?;
            init::flatten_initializer(self, &ty, &initializer)
        } else {
            Vec::new()
        };
        let obj = Rc::new(Obj {
            name,
            ty,
            is_typedef: false,
            is_static: storage.is_static,
            is_extern: storage.is_extern,
            is_function: false,
            body: None,
            init,
            loc: self.loc(start),
        });
        self.scopes.declare_var(name, obj.clone());
        Ok(obj)
    }

    /// Consumes any further comma-separated typedef declarators after the first.
    fn finish_declarator_list(&mut self, base: Rc<Type>, storage: Storage) -> Result<(), Fatal> {
        while self.eat(",") {
            let (name, ty) = self.parse_declarator(base.clone())?;
            self.skip_gnu_attributes();
            if let Some(name) = name {
                self.scopes.declare_typedef(name, ty);
            }
        }
        let _ = storage;
        self.expect(";")?;
        Ok(())
    }

    pub(crate) fn fatal_here(&mut self, msg: &str) -> Fatal {
        let tok = self.peek().clone();
        Fatal(Diagnostic::new(
            Severity::Fatal,
            Some(tok.prov.file),
            format!("<file {}>", tok.prov.file.0),
            tok.prov.line,
            tok.prov.col,
            msg.to_string(),
        ))
    }

    // ---- declaration specifiers --------------------------------------------------------

    /// Parses storage-class/type-qualifier/type-specifier keywords in any order (C allows
    /// interleaving, e.g. `static const int`), returning the base type and accumulated
    /// storage class. Function specifiers (`inline`, `_Noreturn`) and `_Alignas` are folded
    /// in the same loop since they can appear anywhere among the others.
    fn parse_decl_specifiers(&mut self) -> Result<(Rc<Type>, Storage), Fatal> {
        let mut storage = Storage::default();
        let mut is_const = false;
        let mut is_volatile = false;
        let mut is_atomic = false;
        let mut signed: Option<bool> = None;
        let mut long_count = 0u32;
        let mut saw_short = false;
        let mut base: Option<Rc<Type>> = None;

        loop {
            let tok = self.peek().clone();
            match tok.text.as_str() {
                "typedef" => {
                    storage.is_typedef = true;
                    self.advance();
                }
                "extern" => {
                    storage.is_extern = true;
                    self.advance();
                }
                "static" => {
                    storage.is_static = true;
                    self.advance();
                }
                "auto" | "register" => {
                    self.advance();
                }
                "_Thread_local" => {
                    storage.is_thread_local = true;
                    self.advance();
                }
                "inline" => {
                    storage.is_inline = true;
                    self.advance();
                }
                "_Noreturn" => {
                    storage.is_noreturn = true;
                    self.advance();
                }
                "const" => {
                    is_const = true;
                    self.advance();
                }
                "volatile" => {
                    is_volatile = true;
                    self.advance();
                }
                "restrict" => {
                    self.advance();
                }
                "__attribute__" | "__attribute" => {
                    self.skip_gnu_attributes();
                }
                "_Atomic" if !self.peek_at(1).is("(") => {
                    // Bare `_Atomic` qualifier, as opposed to the `_Atomic(T)` operator form
                    // handled below.
                    is_atomic = true;
                    self.advance();
                }
                "_Atomic" => {
                    self.advance();
                    self.expect("(")?;
                    base = Some(self.parse_type_name()?);
                    self.expect(")")?;
                }
                "_Alignas" => {
                    self.advance();
                    self.expect("(")?;
                    if self.is_type_start() {
                        self.parse_type_name()?;
                    } else {
                        expr::parse_constant_expr(self)?;
                    }
                    self.expect(")")?;
                }
                "void" => {
                    base = Some(Type::void());
                    self.advance();
                }
                "_Bool" => {
                    base = Some(Type::new(TypeKind::Bool, 1, 1));
                    self.advance();
                }
                "char" => {
                    base = Some(Type::int(IntKind::Char, signed == Some(false)));
                    self.advance();
                }
                "short" => {
                    saw_short = true;
                    self.advance();
                }
                "int" => {
                    self.advance();
                }
                "long" => {
                    long_count += 1;
                    self.advance();
                }
                "float" => {
                    base = Some(Type::float(FloatKind::Float));
                    self.advance();
                }
                "double" => {
                    base = Some(Type::float(if long_count > 0 { FloatKind::LongDouble } else { FloatKind::Double }));
                    self.advance();
                }
                "signed" => {
                    signed = Some(true);
                    self.advance();
                }
                "unsigned" => {
                    signed = Some(false);
                    self.advance();
                }
                "struct" | "union" => {
                    base = Some(self.parse_struct_or_union_specifier()?);
                }
                "enum" => {
                    base = Some(self.parse_enum_specifier()?);
                }
                "typeof" | "typeof_unqual" => {
                    self.advance();
                    self.expect("(")?;
                    let ty = if self.is_type_start() {
                        self.parse_type_name()?
                    } else {
                        expr::parse_expr(self)?.ty
                    };
                    self.expect(")")?;
                    base = Some(ty);
                }
                "_Generic" => break,
                _ if tok.kind == TokenKind::Identifier => {
                    if base.is_none() {
                        let sym = self.intern(&tok.text);
                        if let Some(ty) = self.scopes.lookup_typedef(sym) {
                            base = Some(ty);
                            self.advance();
                            continue;
                        }
                    }
                    break;
                }
                _ => break,
            }
        }

        let mut ty = base.unwrap_or_else(|| {
            let kind = if saw_short {
                IntKind::Short
            } else {
                match long_count {
                    0 => IntKind::Int,
                    1 => IntKind::Long,
                    _ => IntKind::LongLong,
                }
            };
            Type::int(kind, signed == Some(false))
        });
        if is_const || is_volatile || is_atomic {
            let mut t = (*ty).clone();
            t.is_const |= is_const;
            t.is_volatile |= is_volatile;
            t.is_atomic |= is_atomic;
            ty = Rc::new(t);
        }
        Ok((ty, storage))
    }

    /// Consumes zero or more `__attribute__((...))` specifier sequences (GNU C extension,
    /// also accepted by clang/Apple toolchains) wherever they're encountered, extracting the
    /// two attributes that affect struct layout: `packed` and `aligned(n)`. Everything else
    /// inside the parens (`unused`, `nonnull`, `const`, `deprecated(...)`, ...) is skipped:
    /// it doesn't change this front end's `Type` representation, only whether the token
    /// stream parses at all. Paren depth is tracked across the whole attribute list rather
    /// than per-entry, so nested argument parens (`aligned(16)`) never desynchronize the
    /// scan for the closing `))`.
    fn parse_gnu_attributes(&mut self) -> (bool, Option<u32>) {
        let mut packed = false;
        let mut aligned = None;
        while self.at("__attribute__") || self.at("__attribute") {
            self.advance();
            if !self.eat("(") {
                continue;
            }
            self.eat("(");
            let mut depth = 1i32;
            let mut want_align_arg = false;
            while depth > 0 && !self.at_eof() {
                let tok = self.advance();
                match tok.text.as_str() {
                    "(" => depth += 1,
                    ")" => depth -= 1,
                    "packed" => packed = true,
                    "aligned" => want_align_arg = true,
                    _ => {
                        if want_align_arg {
                            if let Ok(n) = tok.text.parse::<u32>() {
                                aligned = Some(n);
                            }
                            want_align_arg = false;
                        }
                    }
                }
            }
        }
        (packed, aligned)
    }

    /// Like [`Self::parse_gnu_attributes`] but for call sites that only need the attributes
    /// consumed, not interpreted (declarators outside a struct/union body, where `packed`/
    /// `aligned` have no effect on this crate's `Type` model).
    fn skip_gnu_attributes(&mut self) {
        self.parse_gnu_attributes();
    }

    fn is_type_start(&self) -> bool {
        self.is_type_start_at(0)
    }

    /// Like [`Self::is_type_start`] but checks the token `offset` positions ahead, used to
    /// disambiguate `(` starting a cast/compound-literal type name from `(` starting a
    /// parenthesized expression.
    pub(crate) fn is_type_start_at(&self, offset: usize) -> bool {
        let t = self.peek_at(offset);
        if t.kind != TokenKind::Keyword && t.kind != TokenKind::Identifier {
            return false;
        }
        const KW: &[&str] = &[
            "void", "char", "short", "int", "long", "float", "double", "signed", "unsigned", "_Bool",
            "struct", "union", "enum", "const", "volatile", "typedef", "typeof", "typeof_unqual",
            "_Atomic", "restrict",
        ];
        if KW.contains(&t.text.as_str()) {
            return true;
        }
        if t.kind == TokenKind::Identifier {
            if let Some(sym) = self.interner.lookup(&t.text) {
                return self.scopes.lookup_typedef(sym).is_some();
            }
        }
        false
    }

    fn parse_type_name(&mut self) -> Result<Rc<Type>, Fatal> {
        let (base, _) = self.parse_decl_specifiers()?;
        let (_, ty) = self.parse_declarator(base)?;
        Ok(ty)
    }

    /// Public entry point for `expr`/`init`/`stmt` submodules, which cannot call the private
    /// `parse_type_name` directly across module boundaries.
    pub(crate) fn parse_type_name_pub(&mut self) -> Result<Rc<Type>, Fatal> {
        self.parse_type_name()
    }

    // ---- struct / union / enum ---------------------------------------------------------

    fn parse_struct_or_union_specifier(&mut self) -> Result<Rc<Type>, Fatal> {
        let is_union = self.at("union");
        self.advance();
        let (mut packed, mut aligned) = self.parse_gnu_attributes();
        let tag = if self.peek().kind == TokenKind::Identifier {
            let t = self.advance();
            Some(self.intern(&t.text))
        } else {
            None
        };
        {
            let (p2, a2) = self.parse_gnu_attributes();
            packed |= p2;
            aligned = aligned.or(a2);
        }

        if !self.at("{") {
            let tag = tag.unwrap_or_else(|| self.new_unique_name("tag"));
            if let Some(existing) = self.scopes.lookup_tag(tag) {
                return Ok(existing);
            }
            let ty = Type::new(TypeKind::Record { tag: Some(tag), is_union, members: None }, 0, 1);
            self.scopes.declare_tag(tag, ty.clone());
            return Ok(ty);
        }

        self.advance();
        // Raw member list (name, type, bitfield width); offsets are computed in a single pass
        // below once trailing `__attribute__((packed))` / `aligned(n)` (written after the
        // closing `}`, the common GNU spelling) are known.
        let mut raw_members: Vec<(Sym, Rc<Type>, Option<u32>)> = Vec::new();
        while !self.at("}") && !self.at_eof() {
            if self.eat(";") {
                continue;
            }
            if self.at("_Static_assert") {
                stmt::parse_static_assert(self)?;
                continue;
            }
            let (mbase, _) = self.parse_decl_specifiers()?;
            loop {
                let (mname, mty) = self.parse_declarator(mbase.clone())?;
                let bitfield_width = if self.eat(":") {
                    let (v, _) = crate::constexpr::eval(&expr::parse_constant_expr(self)?)
                        .map_err(|e| self.fatal_here(&e))?;
                    Some(v as u32)
                } else {
                    None
                };
                self.skip_gnu_attributes();
                let member_name = mname.unwrap_or_else(|| self.new_unique_name("anon"));
                raw_members.push((member_name, mty, bitfield_width));
                if !self.eat(",") {
                    break;
                }
            }
            self.expect(";")?;
        }
        self.expect("}")?;
        {
            let (p2, a2) = self.parse_gnu_attributes();
            packed |= p2;
            aligned = aligned.or(a2);
        }

        // `#pragma pack(n)` only lowers natural alignment; `__attribute__((packed))` forces
        // byte alignment regardless of the ambient pack ceiling (spec.md §4.6/§9).
        let pack = self.current_pack;
        let mut members = Vec::with_capacity(raw_members.len());
        let mut offset = 0usize;
        let mut max_size = 0usize;
        let mut align = 1usize;
        // Consecutive bit-fields share one storage unit, sized and aligned to the declared
        // bit-field type (e.g. `unsigned a:1; unsigned b:1;` shares one `unsigned`-sized unit),
        // per spec.md §3's `Member.bitfield` shape. `bit_cursor` tracks the current unit's byte
        // offset, bits already claimed within it, and its size; a non-bit-field member, a
        // zero-width bit-field, or a unit that's already full starts a fresh one.
        let mut bit_cursor: Option<(usize, u32, usize)> = None;
        for (member_name, mty, bitfield_width) in raw_members {
            let member_align = if packed {
                1
            } else {
                pack.map(|p| (mty.align as u32).min(p) as usize).unwrap_or(mty.align).max(1)
            };
            align = align.max(member_align);

            if let Some(width) = bitfield_width {
                if is_union {
                    max_size = max_size.max(mty.size);
                    members.push(Member { name: member_name, ty: mty, offset: 0, bitfield_width: Some(width), bit_offset: 0 });
                    continue;
                }
                if width == 0 {
                    // A zero-width bit-field has no storage of its own; it just forces the
                    // next bit-field (if any) into a new storage unit.
                    bit_cursor = None;
                    continue;
                }
                let unit_size = mty.size.max(1);
                let unit_bits = (unit_size * 8) as u32;
                let needs_new_unit = match &bit_cursor {
                    Some((_, bits_used, cur_unit_size)) => *cur_unit_size != unit_size || bits_used + width > unit_bits,
                    None => true,
                };
                if needs_new_unit {
                    let unit_offset = align_to(offset, member_align);
                    bit_cursor = Some((unit_offset, 0, unit_size));
                    offset = unit_offset + unit_size;
                }
                let (unit_offset, bits_used, _) = bit_cursor.as_mut().unwrap();
                let bit_offset = *bits_used;
                *bits_used += width;
                members.push(Member { name: member_name, ty: mty, offset: *unit_offset, bitfield_width: Some(width), bit_offset });
                continue;
            }

            bit_cursor = None;
            let member_offset = if is_union { 0 } else { align_to(offset, member_align) };
            if is_union {
                max_size = max_size.max(mty.size);
            } else {
                offset = member_offset + mty.size;
            }
            members.push(Member { name: member_name, ty: mty, offset: member_offset, bitfield_width: None, bit_offset: 0 });
        }
        // `aligned(n)` raises the whole aggregate's alignment after packing is applied; it
        // never lowers it below what the (possibly packed) members already require.
        if let Some(n) = aligned {
            align = align.max(n as usize);
        }
        let size = align_to(if is_union { max_size } else { offset }, align.max(1));
        let tag = tag.unwrap_or_else(|| self.new_unique_name("tag"));
        let ty = Rc::new(Type {
            kind: TypeKind::Record { tag: Some(tag), is_union, members: Some(members) },
            is_const: false,
            is_volatile: false,
            is_atomic: false,
            align: align.max(1),
            size,
        });
        self.scopes.declare_tag(tag, ty.clone());
        Ok(ty)
    }

    fn parse_enum_specifier(&mut self) -> Result<Rc<Type>, Fatal> {
        self.advance();
        self.skip_gnu_attributes();
        let tag = if self.peek().kind == TokenKind::Identifier {
            let t = self.advance();
            Some(self.intern(&t.text))
        } else {
            None
        };
        if !self.at("{") {
            let tag = tag.unwrap_or_else(|| self.new_unique_name("enum"));
            return Ok(self
                .scopes
                .lookup_tag(tag)
                .unwrap_or_else(|| Type::new(TypeKind::Enum(tag, Rc::new(Vec::new())), 4, 4)));
        }
        self.advance();
        let int_ty = Type::int(IntKind::Int, false);
        let mut next_value: i128 = 0;
        let mut enumerators = Vec::new();
        while !self.at("}") && !self.at_eof() {
            let name_tok = self.advance();
            let name = self.intern(&name_tok.text);
            if self.eat("=") {
                let (v, _) = crate::constexpr::eval(&expr::parse_constant_expr(self)?).map_err(|e| self.fatal_here(&e))?;
                next_value = v;
            }
            enumerators.push((name, next_value));
            let obj = Rc::new(Obj {
                name,
                ty: int_ty.clone(),
                is_typedef: false,
                is_static: true,
                is_extern: false,
                is_function: false,
                body: None,
                init: Vec::new(),
                loc: self.loc(&name_tok),
            });
            self.scopes.declare_var(name, obj);
            next_value += 1;
            if !self.eat(",") {
                break;
            }
        }
        self.expect("}")?;
        let tag = tag.unwrap_or_else(|| self.new_unique_name("enum"));
        let ty = Type::new(TypeKind::Enum(tag, Rc::new(enumerators)), int_ty.size, int_ty.align);
        self.scopes.declare_tag(tag, ty.clone());
        Ok(ty)
    }

    // ---- declarators --------------------------------------------------------------------

    /// Parses one declarator (possibly abstract, i.e. nameless) atop `base`, handling
    /// pointer chains, array suffixes, function-parameter suffixes, and parenthesized
    /// declarators (spec.md §4.6: "declarators ... parenthesized function declarators").
    fn parse_declarator(&mut self, base: Rc<Type>) -> Result<(Option<Sym>, Rc<Type>), Fatal> {
        let mut pointer_depth = 0u32;
        while self.eat("*") {
            pointer_depth += 1;
            while self.at("const") || self.at("volatile") || self.at("restrict") || self.at("_Atomic") {
                self.advance();
            }
        }
        let mut ty = base;
        for _ in 0..pointer_depth {
            ty = Type::pointer_to(ty);
        }

        let (name, build) = self.parse_direct_declarator()?;
        let ty = build(ty);
        Ok((name, ty))
    }

    /// Returns the declared name (if any) and a closure that, given the already-built
    /// pointer-qualified base type, produces the full declared type by wrapping it in any
    /// array/function suffixes found (suffixes bind tighter than a leading `*`, hence the
    /// closure: the suffix must wrap the *innermost* type, built after recursing through a
    /// parenthesized declarator).
    #[allow(clippy::type_complexity)]
    fn parse_direct_declarator(&mut self) -> Result<(Option<Sym>, Box<dyn FnOnce(Rc<Type>) -> Rc<Type> + 'a>), Fatal> {
        if self.eat("(") {
            let (name, inner) = self.parse_declarator_inner_paren()?;
            self.expect(")")?;
            let suffix = self.parse_declarator_suffixes()?;
            return Ok((name, Box::new(move |base: Rc<Type>| inner(suffix(base)))));
        }
        let name = if self.peek().kind == TokenKind::Identifier {
            let t = self.advance();
            Some(self.intern(&t.text))
        } else {
            None
        };
        let suffix = self.parse_declarator_suffixes()?;
        Ok((name, suffix))
    }

    #[allow(clippy::type_complexity)]
    fn parse_declarator_inner_paren(&mut self) -> Result<(Option<Sym>, Box<dyn FnOnce(Rc<Type>) -> Rc<Type> + 'a>), Fatal> {
        let mut pointer_depth = 0u32;
        while self.eat("*") {
            pointer_depth += 1;
            while self.at("const") || self.at("volatile") || self.at("restrict") {
                self.advance();
            }
        }
        let (name, build) = self.parse_direct_declarator()?;
        Ok((
            name,
            Box::new(move |base: Rc<Type>| {
                let mut t = build(base);
                for _ in 0..pointer_depth {
                    t = Type::pointer_to(t);
                }
                t
            }),
        ))
    }

    /// Parses zero or more trailing `[...]` / `(...)` suffixes (at most one kind is legal,
    /// but we accept a chain so `int (*f(void))[3]` style combinations still parse).
    #[allow(clippy::type_complexity)]
    fn parse_declarator_suffixes(&mut self) -> Result<Box<dyn FnOnce(Rc<Type>) -> Rc<Type> + 'a>, Fatal> {
        if self.eat("[") {
            // `[*]` (an unspecified-size VLA in a function prototype) and a bare `[]`
            // (incomplete array) both carry no usable length.
            if self.eat("*") {
                self.expect("]")?;
                let rest = self.parse_declarator_suffixes()?;
                return Ok(Box::new(move |base: Rc<Type>| Type::array_of(rest(base), None)));
            }
            let dim = if self.at("]") {
                ArrayDim::Incomplete
            } else {
                let len_expr = expr::parse_conditional_expr(self)?;
                match expr::to_const_expr(&len_expr) {
                    Ok(ce) => {
                        let (v, _) = crate::constexpr::eval(&ce).map_err(|e| self.fatal_here(&e))?;
                        ArrayDim::Const(v as usize)
                    }
                    // Not foldable at parse time: a genuine variable-length array bound
                    // (spec.md §3: "VLA carry an AST expression for the length").
                    Err(_) => ArrayDim::Variable(Rc::new(len_expr)),
                }
            };
            self.expect("]")?;
            let rest = self.parse_declarator_suffixes()?;
            return Ok(Box::new(move |base: Rc<Type>| match dim {
                ArrayDim::Incomplete => Type::array_of(rest(base), None),
                ArrayDim::Const(n) => Type::array_of(rest(base), Some(n)),
                ArrayDim::Variable(ref e) => Type::vla_of(rest(base), e.clone()),
            }));
        }
        if self.eat("(") {
            let mut params = Vec::new();
            let mut variadic = false;
            if self.at("void") && self.peek_at(1).is(")") {
                self.advance();
            } else {
                while !self.at(")") && !self.at_eof() {
                    if self.eat("...") {
                        variadic = true;
                        break;
                    }
                    let (pbase, _) = self.parse_decl_specifiers()?;
                    let (pname, pty) = self.parse_declarator(pbase)?;
                    params.push(Param { name: pname, ty: pty });
                    if !self.eat(",") {
                        break;
                    }
                }
            }
            self.expect(")")?;
            let rest = self.parse_declarator_suffixes()?;
            return Ok(Box::new(move |base: Rc<Type>| {
                let ret = rest(base);
                Type::new(TypeKind::Function { ret, params, variadic }, 0, 1)
            }));
        }
        Ok(Box::new(|base| base))
    }
}

fn align_to(offset: usize, align: usize) -> usize {
    if align == 0 {
        offset
    } else {
        (offset + align - 1) / align * align
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use std::rc::Rc as StdRc;

    fn toks(src: &str) -> Vec<Token> {
        let mut diags = Diagnostics::new();
        let arena = StdRc::new(Arena::new());
        let mut interner = Interner::new(arena);
        let mut t = crate::lexer::tokenize(FileId(0), format!("{}\0", src).as_bytes(), &mut diags).unwrap();
        crate::lexer::convert_pp_tokens(&mut t, &mut interner, &mut diags).unwrap();
        t
    }

    #[test]
    fn parses_simple_global_variable() {
        let arena = StdRc::new(Arena::new());
        let mut interner = Interner::new(arena);
        let mut diags = Diagnostics::new();
        let t = crate::lexer::tokenize(FileId(0), b"int x = 1;\0", &mut diags).unwrap();
        let mut t = t;
        crate::lexer::convert_pp_tokens(&mut t, &mut interner, &mut diags).unwrap();
        let prog = parse(t, &mut interner, &mut diags, None).unwrap();
        assert_eq!(prog.decls.len(), 1);
        assert!(!prog.decls[0].is_function);
    }

    #[test]
    fn parses_function_definition() {
        let arena = StdRc::new(Arena::new());
        let mut interner = Interner::new(arena);
        let mut diags = Diagnostics::new();
        let mut t = toks("int add(int a, int b) { return a + b; }");
        crate::lexer::convert_pp_tokens(&mut t, &mut interner, &mut diags).unwrap();
        let prog = parse(t, &mut interner, &mut diags, None).unwrap();
        assert_eq!(prog.decls.len(), 1);
        assert!(prog.decls[0].is_function);
        assert!(prog.decls[0].body.is_some());
    }

    #[test]
    fn typedef_name_is_recognized_as_type_specifier() {
        let arena = StdRc::new(Arena::new());
        let mut interner = Interner::new(arena);
        let mut diags = Diagnostics::new();
        let mut t = toks("typedef int my_int; my_int x;");
        crate::lexer::convert_pp_tokens(&mut t, &mut interner, &mut diags).unwrap();
        let prog = parse(t, &mut interner, &mut diags, None).unwrap();
        assert_eq!(prog.decls.len(), 1);
        assert!(prog.decls[0].ty.is_integer());
    }

    #[test]
    fn struct_members_get_increasing_offsets() {
        let arena = StdRc::new(Arena::new());
        let mut interner = Interner::new(arena);
        let mut diags = Diagnostics::new();
        let mut t = toks("struct Point { int x; int y; }; struct Point p;");
        crate::lexer::convert_pp_tokens(&mut t, &mut interner, &mut diags).unwrap();
        let prog = parse(t, &mut interner, &mut diags, None).unwrap();
        let ty = &prog.decls[0].ty;
        if let TypeKind::Record { members: Some(members), .. } = &ty.kind {
            assert_eq!(members[0].offset, 0);
            assert_eq!(members[1].offset, 4);
        } else {
            panic!("expected a completed record type");
        }
    }

    #[test]
    fn array_bound_referencing_a_parameter_becomes_a_vla() {
        let arena = StdRc::new(Arena::new());
        let mut interner = Interner::new(arena);
        let mut diags = Diagnostics::new();
        let mut t = toks("void f(int n) { int arr[n]; }");
        crate::lexer::convert_pp_tokens(&mut t, &mut interner, &mut diags).unwrap();
        let prog = parse(t, &mut interner, &mut diags, None).unwrap();
        assert!(!diags.has_errors());
        if let Stmt::Compound(stmts) = prog.decls[0].body.as_ref().unwrap() {
            if let Stmt::Decl(decls) = &stmts[0] {
                assert!(matches!(decls[0].ty.kind, TypeKind::Vla(..)));
            } else {
                panic!("expected a declaration statement");
            }
        } else {
            panic!("expected a compound body");
        }
    }

    #[test]
    fn constant_array_bound_stays_an_ordinary_array() {
        let arena = StdRc::new(Arena::new());
        let mut interner = Interner::new(arena);
        let mut diags = Diagnostics::new();
        let mut t = toks("int arr[4];");
        crate::lexer::convert_pp_tokens(&mut t, &mut interner, &mut diags).unwrap();
        let prog = parse(t, &mut interner, &mut diags, None).unwrap();
        assert!(matches!(prog.decls[0].ty.kind, TypeKind::Array(_, Some(4))));
    }
}
