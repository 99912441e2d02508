//! End-to-end `Session` pipeline tests: hello-world parse, idempotent re-link, typedef
//! disambiguation, conditional inclusion.

use std::io::Write;

use cfront::session::Session;

fn write_source(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    path
}

#[test]
fn hello_world_parse_has_one_function() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(&dir, "a.c", "int main(void){return 0;}\n");
    let mut s = Session::new();
    let prog = s.compile_file(&path).unwrap();
    assert_eq!(prog.decls.len(), 1);
    let main = &prog.decls[0];
    assert_eq!(s.interner.resolve(main.name), "main");
    assert!(main.is_function);
    assert!(main.body.is_some());
}

#[test]
fn linking_a_single_unit_preserves_declaration_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(&dir, "a.c", "int x = 1;\nint y = 2;\n");
    let mut s = Session::new();
    let prog = s.compile_file(&path).unwrap();
    let names_before: Vec<String> = prog.decls.iter().map(|o| s.interner.resolve(o.name).to_string()).collect();
    let linked = s.link(vec![prog]);
    let names_after: Vec<String> = linked.decls.iter().map(|o| s.interner.resolve(o.name).to_string()).collect();
    assert_eq!(names_before, names_after);
    assert_eq!(names_after, vec!["x".to_string(), "y".to_string()]);
}

#[test]
fn conditional_inclusion_picks_the_taken_branch() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(&dir, "a.c", "#if 1+1==2\nint x;\n#else\nint y;\n#endif\n");
    let mut s = Session::new();
    let prog = s.compile_file(&path).unwrap();
    assert_eq!(prog.decls.len(), 1);
    assert_eq!(s.interner.resolve(prog.decls[0].name), "x");
}

#[test]
fn typedef_disambiguation_resolves_t_as_a_declarator() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(&dir, "a.c", "typedef int T; T (T);\n");
    let mut s = Session::new();
    let prog = s.compile_file(&path).unwrap();
    let names: Vec<String> = prog.decls.iter().map(|o| s.interner.resolve(o.name).to_string()).collect();
    assert!(names.contains(&"T".to_string()));
}

#[test]
fn variable_length_array_parameter_becomes_a_vla_type() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(&dir, "a.c", "void f(int n) { int arr[n]; }\n");
    let mut s = Session::new();
    let prog = s.compile_file(&path).unwrap();
    assert_eq!(prog.decls.len(), 1);
    assert!(prog.decls[0].body.is_some());
}

#[test]
fn asm_statement_is_captured_without_erroring() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(&dir, "a.c", "void f(void) { int x; asm volatile (\"nop\" : : \"r\"(x)); }\n");
    let mut s = Session::new();
    let prog = s.compile_file(&path).unwrap();
    assert!(!s.has_errors());
    assert!(prog.decls[0].body.is_some());
}

#[test]
fn computed_goto_and_label_address_parse() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(
        &dir,
        "a.c",
        "void f(void) { void *p = &&L; goto *p; L: return; }\n",
    );
    let mut s = Session::new();
    let prog = s.compile_file(&path).unwrap();
    assert!(!s.has_errors());
    assert!(prog.decls[0].body.is_some());
}

#[test]
fn block_literal_lowers_to_a_hoisted_function() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(&dir, "a.c", "void *adder = ^int(int a, int b){ return a + b; };\n");
    let mut s = Session::new();
    let prog = s.compile_file(&path).unwrap();
    assert!(!s.has_errors());
    // The block body is lowered to a synthetic hoisted function alongside `adder`.
    assert!(prog.decls.len() >= 2);
    assert!(prog.decls.iter().any(|o| o.is_function && o.body.is_some()));
}

#[test]
fn packed_attribute_removes_padding_between_struct_members() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(
        &dir,
        "a.c",
        "struct s { char a; int b; } __attribute__((packed));\nstruct s v;\n",
    );
    let mut s = Session::new();
    let prog = s.compile_file(&path).unwrap();
    assert!(!s.has_errors());
    let var = prog.decls.iter().find(|o| s.interner.resolve(o.name) == "v").unwrap();
    if let cfront::types::TypeKind::Record { members: Some(members), .. } = &var.ty.kind {
        assert_eq!(members[1].offset, 1, "packed struct should not pad `int b` to a 4-byte boundary");
    } else {
        panic!("expected a resolved record type");
    }
}

#[test]
fn adjacent_bitfields_share_a_storage_unit_with_distinct_bit_offsets() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(&dir, "a.c", "struct s { unsigned a:1; unsigned b:1; };\nstruct s v;\n");
    let mut s = Session::new();
    let prog = s.compile_file(&path).unwrap();
    assert!(!s.has_errors());
    let var = prog.decls.iter().find(|o| s.interner.resolve(o.name) == "v").unwrap();
    if let cfront::types::TypeKind::Record { members: Some(members), .. } = &var.ty.kind {
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].offset, members[1].offset, "adjacent bit-fields share one storage unit");
        assert_ne!(members[0].bit_offset, members[1].bit_offset, "adjacent bit-fields need distinct bit positions");
        assert_eq!(var.ty.size, 4, "an all-bitfield struct should still size to its storage unit, not 0");
    } else {
        panic!("expected a resolved record type");
    }
}

#[test]
fn unknown_attributes_are_skipped_without_erroring() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(
        &dir,
        "a.c",
        "int f(int x) __attribute__((nonnull(1))) __attribute__((unused));\nint f(int x) { return x; }\n",
    );
    let mut s = Session::new();
    let prog = s.compile_file(&path).unwrap();
    assert!(!s.has_errors());
    assert!(prog.decls.iter().any(|o| o.is_function && o.body.is_some()));
}

#[test]
fn link_never_duplicates_a_canonical_name_across_units() {
    let dir = tempfile::tempdir().unwrap();
    let path_a = write_source(&dir, "a.c", "int shared;\nint only_a;\n");
    let path_b = write_source(&dir, "b.c", "extern int shared;\nint only_b;\n");
    let mut s = Session::new();
    let prog_a = s.compile_file(&path_a).unwrap();
    let prog_b = s.compile_file(&path_b).unwrap();
    let linked = s.link(vec![prog_a, prog_b]);
    let names: Vec<String> = linked.decls.iter().map(|o| s.interner.resolve(o.name).to_string()).collect();
    let mut sorted = names.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(names.len(), sorted.len(), "duplicate canonical name in linked output: {:?}", names);
}
