//! Preprocessor integration tests: recursion guard, stringify/paste, `include_next` ordering,
//! `#pragma once`.

use std::io::Write;

use cfront::session::Session;

fn write_source(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    path
}

fn preprocessed_text(s: &mut Session, tokens: &[cfront::token::Token]) -> String {
    let mut buf = Vec::new();
    s.print_preprocessed(tokens, &mut buf).unwrap();
    String::from_utf8(buf).unwrap()
}

#[test]
fn self_referential_macro_expansion_terminates() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(&dir, "a.c", "#define M M\nM\n");
    let mut s = Session::new();
    let tokens = s.preprocess(&path).unwrap();
    let text = preprocessed_text(&mut s, &tokens);
    assert_eq!(text.trim(), "M");
}

#[test]
fn stringify_and_token_paste() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(
        &dir,
        "a.c",
        "#define S(x) #x\n#define P(a,b) a##b\nS(1+2) P(foo,bar)\n",
    );
    let mut s = Session::new();
    let tokens = s.preprocess(&path).unwrap();
    let text = preprocessed_text(&mut s, &tokens);
    assert_eq!(text.trim(), "\"1+2\" foobar");
}

#[test]
fn pragma_once_includes_a_file_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    write_source(&dir, "guard.h", "#pragma once\nint guarded;\n");
    let path = write_source(
        &dir,
        "a.c",
        "#include \"guard.h\"\n#include \"guard.h\"\n",
    );
    let mut s = Session::new();
    let prog = s.compile_file(&path).unwrap();
    assert_eq!(prog.decls.len(), 1);
    assert_eq!(s.interner.resolve(prog.decls[0].name), "guarded");
}

#[test]
fn include_next_skips_past_the_satisfying_directory() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first");
    let second = dir.path().join("second");
    std::fs::create_dir(&first).unwrap();
    std::fs::create_dir(&second).unwrap();
    std::fs::write(first.join("h.h"), "int from_first;\n#include_next \"h.h\"\n").unwrap();
    std::fs::write(second.join("h.h"), "int from_second;\n").unwrap();
    let path = write_source(&dir, "a.c", "#include \"h.h\"\n");

    let mut s = Session::new();
    s.add_user_include_dir(&first);
    s.add_user_include_dir(&second);
    let prog = s.compile_file(&path).unwrap();
    let names: Vec<String> = prog.decls.iter().map(|o| s.interner.resolve(o.name).to_string()).collect();
    assert_eq!(names, vec!["from_first".to_string(), "from_second".to_string()]);
}

#[test]
fn command_line_undef_removes_a_builtin_macro_before_preprocessing() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(&dir, "a.c", "#ifdef __LINE__\nint defined_branch;\n#else\nint undef_branch;\n#endif\n");
    let mut s = Session::new();
    s.undef("__LINE__");
    let prog = s.compile_file(&path).unwrap();
    assert_eq!(s.interner.resolve(prog.decls[0].name), "undef_branch");
}
