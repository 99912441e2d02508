//! JSON declaration dump (`-j`/`--json`, spec.md §6): `{functions, variables, structs, unions,
//! enums}`, each entry carrying a recursively-serialized type, storage class, and source
//! location. Primary consumer is FFI binding generation, so every field a binding generator
//! would need (parameter names, array lengths, enumerator values) is serialized rather than
//! summarized.

use std::collections::BTreeMap;
use std::io::{self, Write};

use serde_json::{json, Value};

use crate::ast::{Obj, Program};
use crate::intern::Interner;
use crate::source::SourceManager;
use crate::types::{IntKind, Type, TypeKind};

pub fn write(prog: &Program, interner: &Interner, sources: &SourceManager, w: &mut impl Write) -> io::Result<()> {
    let doc = to_value(prog, interner, sources);
    let text = serde_json::to_string_pretty(&doc).unwrap_or_else(|_| "{}".to_string());
    writeln!(w, "{}", text)
}

pub fn to_value(prog: &Program, interner: &Interner, sources: &SourceManager) -> Value {
    let mut functions = Vec::new();
    let mut variables = Vec::new();
    let mut structs: BTreeMap<String, Value> = BTreeMap::new();
    let mut unions: BTreeMap<String, Value> = BTreeMap::new();
    let mut enums: BTreeMap<String, Value> = BTreeMap::new();

    for obj in &prog.decls {
        collect_tags(&obj.ty, interner, &mut structs, &mut unions, &mut enums);
        let entry = obj_entry(obj, interner, sources);
        if obj.is_function {
            functions.push(entry);
        } else if !obj.is_typedef {
            variables.push(entry);
        }
    }

    json!({
        "functions": functions,
        "variables": variables,
        "structs": structs.into_values().collect::<Vec<_>>(),
        "unions": unions.into_values().collect::<Vec<_>>(),
        "enums": enums.into_values().collect::<Vec<_>>(),
    })
}

/// `file`/`line` resolve through [`SourceManager::display_location`] so a `#line`-renamed
/// header reports the name an FFI binding generator (this dump's primary consumer, spec.md §6)
/// can actually open, not an opaque internal id.
fn obj_entry(obj: &Obj, interner: &Interner, sources: &SourceManager) -> Value {
    let (file, line) = sources.display_location(obj.loc.file, obj.loc.line);
    json!({
        "name": interner.resolve(obj.name),
        "type": type_value(&obj.ty, interner),
        "storage": storage_value(obj),
        "file": file,
        "line": line,
    })
}

fn storage_value(obj: &Obj) -> &'static str {
    if obj.is_extern {
        "extern"
    } else if obj.is_static {
        "static"
    } else {
        "none"
    }
}

/// Walks `ty` (and, through `Record`/`Function`, everything it references) collecting every
/// distinct struct/union/enum tag into `structs`/`unions`/`enums`, keyed by name so a type
/// referenced from several declarations is only emitted once.
fn collect_tags(
    ty: &Type,
    interner: &Interner,
    structs: &mut BTreeMap<String, Value>,
    unions: &mut BTreeMap<String, Value>,
    enums: &mut BTreeMap<String, Value>,
) {
    match &ty.kind {
        TypeKind::Pointer(inner) | TypeKind::Array(inner, _) | TypeKind::Vla(inner, _) => collect_tags(inner, interner, structs, unions, enums),
        TypeKind::Typedef(_, inner) => collect_tags(inner, interner, structs, unions, enums),
        TypeKind::Function { ret, params, .. } | TypeKind::Block { ret, params } => {
            collect_tags(ret, interner, structs, unions, enums);
            for p in params {
                collect_tags(&p.ty, interner, structs, unions, enums);
            }
        }
        TypeKind::Record { tag: Some(tag), is_union, members: Some(members) } => {
            let name = interner.resolve(*tag).to_string();
            let target = if *is_union { &mut *unions } else { &mut *structs };
            if target.contains_key(&name) {
                return;
            }
            let member_values: Vec<Value> = members
                .iter()
                .map(|m| {
                    json!({
                        "name": interner.resolve(m.name),
                        "type": type_value(&m.ty, interner),
                        "offset": m.offset,
                        "bitfield_width": m.bitfield_width,
                        "bit_offset": m.bit_offset,
                    })
                })
                .collect();
            target.insert(
                name.clone(),
                json!({ "name": name, "members": member_values, "size": ty.size, "align": ty.align }),
            );
            for m in members {
                collect_tags(&m.ty, interner, structs, unions, enums);
            }
        }
        TypeKind::Enum(tag, enumerators) => {
            let name = interner.resolve(*tag).to_string();
            if enums.contains_key(&name) {
                return;
            }
            let values: Vec<Value> = enumerators
                .iter()
                .map(|(n, v)| json!({ "name": interner.resolve(*n), "value": v.to_string() }))
                .collect();
            enums.insert(name.clone(), json!({ "name": name, "enumerators": values }));
        }
        _ => {}
    }
}

fn type_value(ty: &Type, interner: &Interner) -> Value {
    let mut v = match &ty.kind {
        TypeKind::Void => json!({ "kind": "void" }),
        TypeKind::Bool => json!({ "kind": "bool" }),
        TypeKind::Int(kind, unsigned) => json!({ "kind": "int", "width": int_kind_name(*kind), "unsigned": unsigned }),
        TypeKind::Float(kind) => json!({ "kind": "float", "width": format!("{:?}", kind) }),
        TypeKind::Enum(tag, _) => json!({ "kind": "enum", "tag": interner.resolve(*tag) }),
        TypeKind::Pointer(inner) => json!({ "kind": "pointer", "pointee": type_value(inner, interner) }),
        TypeKind::Array(elem, len) => json!({ "kind": "array", "length": len, "element": type_value(elem, interner) }),
        TypeKind::Vla(elem, _) => json!({ "kind": "vla", "element": type_value(elem, interner) }),
        TypeKind::Record { tag, is_union, .. } => json!({
            "kind": if *is_union { "union" } else { "struct" },
            "tag": tag.map(|t| interner.resolve(t).to_string()),
        }),
        TypeKind::Function { ret, params, variadic } => json!({
            "kind": "function",
            "return": type_value(ret, interner),
            "params": params.iter().map(|p| json!({
                "name": p.name.map(|n| interner.resolve(n).to_string()),
                "type": type_value(&p.ty, interner),
            })).collect::<Vec<_>>(),
            "variadic": variadic,
        }),
        TypeKind::Block { ret, params } => json!({
            "kind": "block",
            "return": type_value(ret, interner),
            "params": params.iter().map(|p| json!({
                "name": p.name.map(|n| interner.resolve(n).to_string()),
                "type": type_value(&p.ty, interner),
            })).collect::<Vec<_>>(),
        }),
        TypeKind::Typedef(name, inner) => json!({ "kind": "typedef", "name": interner.resolve(*name), "underlying": type_value(inner, interner) }),
    };
    if let Value::Object(map) = &mut v {
        map.insert("const".to_string(), json!(ty.is_const));
        map.insert("volatile".to_string(), json!(ty.is_volatile));
    }
    v
}

fn int_kind_name(kind: IntKind) -> &'static str {
    match kind {
        IntKind::Bool => "_Bool",
        IntKind::Char => "char",
        IntKind::Short => "short",
        IntKind::Int => "int",
        IntKind::Long => "long",
        IntKind::LongLong => "long long",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::diagnostics::Diagnostics;
    use std::rc::Rc;

    #[test]
    fn hello_world_lists_main_in_functions() {
        let arena = Rc::new(Arena::new());
        let mut interner = Interner::new(arena);
        let mut diags = Diagnostics::new();
        let mut sources = SourceManager::new();
        let file = sources.add_virtual("hello.c", b"int main(void){return 0;}\0".to_vec());
        let mut toks = crate::lexer::tokenize(file, &sources.get(file).contents.clone(), &mut diags).unwrap();
        crate::lexer::convert_pp_tokens(&mut toks, &mut interner, &mut diags).unwrap();
        let prog = crate::parser::parse(toks, &mut interner, &mut diags, None).unwrap();
        let doc = to_value(&prog, &interner, &sources);
        let names: Vec<&str> = doc["functions"].as_array().unwrap().iter().map(|f| f["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["main"]);
        assert_eq!(doc["functions"][0]["file"].as_str().unwrap(), "hello.c");
    }
}
