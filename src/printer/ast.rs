//! AST pretty-printer: renders a [`Program`] as parenthesized S-expressions (`-a`/`--ast`),
//! one declaration per top-level form.

use std::io::{self, Write};

use crate::ast::{BinOp, Expr, ExprKind, Obj, Program, Stmt, UnOp};
use crate::intern::Interner;
use crate::types::{Type, TypeKind};

pub fn print(prog: &Program, interner: &Interner, w: &mut impl Write) -> io::Result<()> {
    for obj in &prog.decls {
        write_obj(obj, interner, 0, w)?;
        writeln!(w)?;
    }
    Ok(())
}

fn indent(w: &mut impl Write, depth: usize) -> io::Result<()> {
    write!(w, "{:indent$}", "", indent = depth * 2)
}

fn write_obj(obj: &Obj, interner: &Interner, depth: usize, w: &mut impl Write) -> io::Result<()> {
    indent(w, depth)?;
    let kind = if obj.is_function { "defun" } else if obj.is_typedef { "typedef" } else { "defvar" };
    write!(w, "({} {} {}", kind, interner.resolve(obj.name), type_sexpr(&obj.ty, interner))?;
    if obj.is_static {
        write!(w, " static")?;
    }
    if obj.is_extern {
        write!(w, " extern")?;
    }
    if let Some(body) = &obj.body {
        writeln!(w)?;
        write_stmt(body, interner, depth + 1, w)?;
        indent(w, depth)?;
    }
    for reloc in &obj.init {
        writeln!(w)?;
        indent(w, depth + 1)?;
        write!(w, "(init @{} ", reloc.offset)?;
        write_expr(&reloc.value, interner, w)?;
        write!(w, ")")?;
    }
    if !obj.init.is_empty() {
        writeln!(w)?;
        indent(w, depth)?;
    }
    write!(w, ")")
}

fn write_stmt(stmt: &Stmt, interner: &Interner, depth: usize, w: &mut impl Write) -> io::Result<()> {
    indent(w, depth)?;
    match stmt {
        Stmt::Null => write!(w, "(null)"),
        Stmt::Expr(e) => {
            write!(w, "(expr ")?;
            write_expr(e, interner, w)?;
            write!(w, ")")
        }
        Stmt::Decl(objs) => {
            writeln!(w, "(decl")?;
            for obj in objs {
                write_obj(obj, interner, depth + 1, w)?;
                writeln!(w)?;
            }
            indent(w, depth)?;
            write!(w, ")")
        }
        Stmt::Compound(stmts) => {
            writeln!(w, "(block")?;
            for s in stmts {
                write_stmt(s, interner, depth + 1, w)?;
                writeln!(w)?;
            }
            indent(w, depth)?;
            write!(w, ")")
        }
        Stmt::If(cond, then_branch, else_branch) => {
            write!(w, "(if ")?;
            write_expr(cond, interner, w)?;
            writeln!(w)?;
            write_stmt(then_branch, interner, depth + 1, w)?;
            if let Some(else_branch) = else_branch {
                writeln!(w)?;
                write_stmt(else_branch, interner, depth + 1, w)?;
            }
            write!(w, ")")
        }
        Stmt::While(cond, body) => {
            write!(w, "(while ")?;
            write_expr(cond, interner, w)?;
            writeln!(w)?;
            write_stmt(body, interner, depth + 1, w)?;
            write!(w, ")")
        }
        Stmt::DoWhile(body, cond) => {
            writeln!(w, "(do-while")?;
            write_stmt(body, interner, depth + 1, w)?;
            writeln!(w)?;
            indent(w, depth + 1)?;
            write_expr(cond, interner, w)?;
            write!(w, ")")
        }
        Stmt::For(init, cond, step, body) => {
            writeln!(w, "(for")?;
            if let Some(init) = init {
                write_stmt(init, interner, depth + 1, w)?;
                writeln!(w)?;
            }
            indent(w, depth + 1)?;
            if let Some(cond) = cond {
                write_expr(cond, interner, w)?;
            } else {
                write!(w, "(true)")?;
            }
            writeln!(w)?;
            indent(w, depth + 1)?;
            if let Some(step) = step {
                write_expr(step, interner, w)?;
            } else {
                write!(w, "(nop)")?;
            }
            writeln!(w)?;
            write_stmt(body, interner, depth + 1, w)?;
            write!(w, ")")
        }
        Stmt::Return(value) => {
            write!(w, "(return")?;
            if let Some(value) = value {
                write!(w, " ")?;
                write_expr(value, interner, w)?;
            }
            write!(w, ")")
        }
        Stmt::Break => write!(w, "(break)"),
        Stmt::Continue => write!(w, "(continue)"),
        Stmt::Goto(name) => write!(w, "(goto {})", interner.resolve(*name)),
        Stmt::Label(name, body) => {
            writeln!(w, "(label {}", interner.resolve(*name))?;
            write_stmt(body, interner, depth + 1, w)?;
            write!(w, ")")
        }
        Stmt::Switch(cond, body) => {
            write!(w, "(switch ")?;
            write_expr(cond, interner, w)?;
            writeln!(w)?;
            write_stmt(body, interner, depth + 1, w)?;
            write!(w, ")")
        }
        Stmt::Case(value, body) => {
            write!(w, "(case ")?;
            write_expr(value, interner, w)?;
            writeln!(w)?;
            write_stmt(body, interner, depth + 1, w)?;
            write!(w, ")")
        }
        Stmt::Default(body) => {
            writeln!(w, "(default")?;
            write_stmt(body, interner, depth + 1, w)?;
            write!(w, ")")
        }
        Stmt::StaticAssert(cond, _msg) => {
            write!(w, "(static-assert ")?;
            write_expr(cond, interner, w)?;
            write!(w, ")")
        }
        Stmt::Asm(text) => write!(w, "(asm {:?})", String::from_utf8_lossy(text)),
    }
}

fn write_expr(e: &Expr, interner: &Interner, w: &mut impl Write) -> io::Result<()> {
    match &e.kind {
        ExprKind::IntLit(v, _) => write!(w, "{}", v),
        ExprKind::FloatLit(v) => write!(w, "{}", v),
        ExprKind::StrLit(bytes) => write!(w, "{:?}", String::from_utf8_lossy(bytes)),
        ExprKind::Ident(name) => write!(w, "{}", interner.resolve(*name)),
        ExprKind::Unary(op, inner) => {
            write!(w, "({} ", unop_name(*op))?;
            write_expr(inner, interner, w)?;
            write!(w, ")")
        }
        ExprKind::Binary(op, l, r) => {
            write!(w, "({} ", binop_name(*op))?;
            write_expr(l, interner, w)?;
            write!(w, " ")?;
            write_expr(r, interner, w)?;
            write!(w, ")")
        }
        ExprKind::CompoundAssign(op, l, r) => {
            write!(w, "({}= ", binop_name(*op))?;
            write_expr(l, interner, w)?;
            write!(w, " ")?;
            write_expr(r, interner, w)?;
            write!(w, ")")
        }
        ExprKind::Cond(c, t, f) => {
            write!(w, "(cond ")?;
            write_expr(c, interner, w)?;
            write!(w, " ")?;
            write_expr(t, interner, w)?;
            write!(w, " ")?;
            write_expr(f, interner, w)?;
            write!(w, ")")
        }
        ExprKind::Call(callee, args) => {
            write!(w, "(call ")?;
            write_expr(callee, interner, w)?;
            for a in args {
                write!(w, " ")?;
                write_expr(a, interner, w)?;
            }
            write!(w, ")")
        }
        ExprKind::Member(base, name, arrow) => {
            write!(w, "({} ", if *arrow { "->" } else { "." })?;
            write_expr(base, interner, w)?;
            write!(w, " {})", interner.resolve(*name))
        }
        ExprKind::Index(base, idx) => {
            write!(w, "(index ")?;
            write_expr(base, interner, w)?;
            write!(w, " ")?;
            write_expr(idx, interner, w)?;
            write!(w, ")")
        }
        ExprKind::Cast(ty, inner) => {
            write!(w, "(cast {} ", type_sexpr(ty, interner))?;
            write_expr(inner, interner, w)?;
            write!(w, ")")
        }
        ExprKind::Sizeof(ty) => write!(w, "(sizeof {})", type_sexpr(ty, interner)),
        ExprKind::SizeofExpr(inner) => {
            write!(w, "(sizeof ")?;
            write_expr(inner, interner, w)?;
            write!(w, ")")
        }
        ExprKind::Generic(ctrl, arms) => {
            write!(w, "(generic ")?;
            write_expr(ctrl, interner, w)?;
            for (ty, arm) in arms {
                write!(w, " (")?;
                match ty {
                    Some(ty) => write!(w, "{}", type_sexpr(ty, interner))?,
                    None => write!(w, "default")?,
                }
                write!(w, " ")?;
                write_expr(arm, interner, w)?;
                write!(w, ")")?;
            }
            write!(w, ")")
        }
        ExprKind::AddrOfLabel(name) => write!(w, "(addr-of-label {})", interner.resolve(*name)),
        ExprKind::BlockLiteral { fn_name, captures } => {
            write!(w, "(block {}", interner.resolve(*fn_name))?;
            for c in captures {
                write!(w, " {}", interner.resolve(*c))?;
            }
            write!(w, ")")
        }
    }
}

fn unop_name(op: UnOp) -> &'static str {
    match op {
        UnOp::Plus => "pos",
        UnOp::Neg => "neg",
        UnOp::Not => "not",
        UnOp::BitNot => "bitnot",
        UnOp::Deref => "deref",
        UnOp::Addr => "addr",
        UnOp::PreInc => "pre++",
        UnOp::PreDec => "pre--",
        UnOp::PostInc => "post++",
        UnOp::PostDec => "post--",
    }
}

fn binop_name(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::Shl => "<<",
        BinOp::Shr => ">>",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::BitAnd => "&",
        BinOp::BitXor => "^",
        BinOp::BitOr => "|",
        BinOp::LogAnd => "&&",
        BinOp::LogOr => "||",
        BinOp::Assign => "=",
        BinOp::Comma => ",",
    }
}

pub fn type_sexpr(ty: &Type, interner: &Interner) -> String {
    let mut s = String::new();
    if ty.is_const {
        s.push_str("const ");
    }
    if ty.is_volatile {
        s.push_str("volatile ");
    }
    match &ty.kind {
        TypeKind::Void => s.push_str("void"),
        TypeKind::Bool => s.push_str("_Bool"),
        TypeKind::Int(kind, unsigned) => {
            if *unsigned {
                s.push_str("unsigned ");
            }
            s.push_str(match kind {
                crate::types::IntKind::Bool => "_Bool",
                crate::types::IntKind::Char => "char",
                crate::types::IntKind::Short => "short",
                crate::types::IntKind::Int => "int",
                crate::types::IntKind::Long => "long",
                crate::types::IntKind::LongLong => "long long",
            });
        }
        TypeKind::Float(kind) => s.push_str(match kind {
            crate::types::FloatKind::Float => "float",
            crate::types::FloatKind::Double => "double",
            crate::types::FloatKind::LongDouble => "long double",
        }),
        TypeKind::Enum(tag, _) => s.push_str(&format!("enum {}", interner.resolve(*tag))),
        TypeKind::Pointer(pointee) => s.push_str(&format!("(ptr {})", type_sexpr(pointee, interner))),
        TypeKind::Array(elem, len) => match len {
            Some(n) => s.push_str(&format!("(array {} {})", n, type_sexpr(elem, interner))),
            None => s.push_str(&format!("(array ? {})", type_sexpr(elem, interner))),
        },
        TypeKind::Vla(elem, _) => s.push_str(&format!("(vla {})", type_sexpr(elem, interner))),
        TypeKind::Record { tag, is_union, .. } => {
            let word = if *is_union { "union" } else { "struct" };
            match tag {
                Some(tag) => s.push_str(&format!("{} {}", word, interner.resolve(*tag))),
                None => s.push_str(&format!("{} <anon>", word)),
            }
        }
        TypeKind::Function { ret, params, variadic } => {
            let mut parts: Vec<String> = params.iter().map(|p| type_sexpr(&p.ty, interner)).collect();
            if *variadic {
                parts.push("...".to_string());
            }
            s.push_str(&format!("(fn ({}) {})", parts.join(" "), type_sexpr(ret, interner)));
        }
        TypeKind::Block { ret, params } => {
            let parts: Vec<String> = params.iter().map(|p| type_sexpr(&p.ty, interner)).collect();
            s.push_str(&format!("(block ({}) {})", parts.join(" "), type_sexpr(ret, interner)));
        }
        TypeKind::Typedef(name, _) => s.push_str(interner.resolve(*name)),
    }
    s
}
