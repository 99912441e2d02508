//! Table-driven parser/preprocessor cases: one assertion shape (top-level declaration count),
//! many source shapes, using `rstest`'s `#[case]` so each row shows up as its own named test
//! failure rather than one loop over a `Vec`.

use std::io::Write;

use rstest::rstest;

use cfront::session::Session;

fn write_source(dir: &tempfile::TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("a.c");
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    path
}

#[rstest]
#[case::single_var("int x;\n", 1)]
#[case::two_vars_one_decl("int x, y;\n", 2)]
#[case::two_separate_decls("int x;\nint y;\n", 2)]
#[case::function_definition("int f(void) { return 0; }\n", 1)]
#[case::taken_if_branch("#if 1\nint x;\n#else\nint y;\n#endif\n", 1)]
#[case::untaken_ifdef_branch("#ifdef UNDEFINED\nint x;\n#endif\nint y;\n", 1)]
#[case::macro_expanded_declarator("#define NAME x\nint NAME;\n", 1)]
#[case::typedef_then_use("typedef int myint;\nmyint x;\n", 1)]
fn top_level_declaration_count(#[case] source: &str, #[case] expected: usize) {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(&dir, source);
    let mut s = Session::new();
    let prog = s.compile_file(&path).unwrap();
    assert_eq!(prog.decls.len(), expected, "source: {source:?}");
}
