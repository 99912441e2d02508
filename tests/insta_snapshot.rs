//! Snapshot tests for the AST and JSON printers' exact output (spec.md §6), pinned inline so a
//! reviewer sees the expected text right next to the assertion instead of in a separate
//! `tests/snapshots/*.snap` file.
//!
//! Sources are loaded via `add_virtual` rather than a real temp-file path: the printers embed
//! the source file's display name in their output, and a real path would make the snapshot
//! depend on the temp directory's random name.

use std::rc::Rc;

use cfront::arena::Arena;
use cfront::diagnostics::Diagnostics;
use cfront::intern::Interner;
use cfront::source::SourceManager;

fn parse(name: &'static str, contents: &str) -> (cfront::ast::Program, Interner, SourceManager) {
    let arena = Rc::new(Arena::new());
    let mut interner = Interner::new(arena);
    let mut diags = Diagnostics::new();
    let mut sources = SourceManager::new();
    let file = sources.add_virtual(name, format!("{contents}\0").into_bytes());
    let mut toks = cfront::lexer::tokenize(file, &sources.get(file).contents.clone(), &mut diags).unwrap();
    cfront::lexer::convert_pp_tokens(&mut toks, &mut interner, &mut diags).unwrap();
    let prog = cfront::parser::parse(toks, &mut interner, &mut diags, None).unwrap();
    (prog, interner, sources)
}

#[test]
fn ast_printer_output_for_a_small_function_is_stable() {
    let (prog, interner, _sources) = parse("a.c", "int add(int a, int b) { return a + b; }\n");
    let mut out = Vec::new();
    cfront::printer::ast::print(&prog, &interner, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    insta::assert_snapshot!(text, @r#"
    (defun add (fn (int int) int)
      (block
        (return (+ a b))
      ))
    "#);
}

#[test]
fn json_dump_for_a_global_variable_is_stable() {
    let (prog, interner, sources) = parse("a.c", "int counter;\n");
    let mut out = Vec::new();
    cfront::printer::json::write(&prog, &interner, &sources, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    insta::assert_snapshot!(text, @r#"
    {
      "enums": [],
      "functions": [],
      "structs": [],
      "unions": [],
      "variables": [
        {
          "file": "a.c",
          "line": 1,
          "name": "counter",
          "storage": "none",
          "type": {
            "const": false,
            "kind": "int",
            "unsigned": false,
            "volatile": false,
            "width": "int"
          }
        }
      ]
    }
    "#);
}
