//! `-j`/`--json` declaration-dump integration tests: schema shape for functions, structs, and
//! enums.

use std::io::Write;

use cfront::session::Session;

fn write_source(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    path
}

fn dump(s: &Session, prog: &cfront::ast::Program) -> serde_json::Value {
    let mut buf = Vec::new();
    s.output_json(prog, &mut buf).unwrap();
    serde_json::from_slice(&buf).unwrap()
}

#[test]
fn hello_world_lists_main_with_extern_storage() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(&dir, "a.c", "int main(void){return 0;}\n");
    let mut s = Session::new();
    let prog = s.compile_file(&path).unwrap();
    let doc = dump(&s, &prog);
    let functions = doc["functions"].as_array().unwrap();
    assert_eq!(functions.len(), 1);
    assert_eq!(functions[0]["name"], "main");
    assert_eq!(functions[0]["storage"], "none");
    assert_eq!(functions[0]["type"]["return"]["kind"], "int");
}

#[test]
fn struct_members_carry_offsets_and_the_struct_is_listed_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(
        &dir,
        "a.c",
        "struct point { int x; int y; };\nstruct point a;\nstruct point b;\n",
    );
    let mut s = Session::new();
    let prog = s.compile_file(&path).unwrap();
    let doc = dump(&s, &prog);
    let structs = doc["structs"].as_array().unwrap();
    assert_eq!(structs.len(), 1);
    let members = structs[0]["members"].as_array().unwrap();
    assert_eq!(members[0]["name"], "x");
    assert_eq!(members[0]["offset"], 0);
    assert_eq!(members[1]["name"], "y");
    assert_eq!(members[1]["offset"], 4);
}

#[test]
fn union_members_all_share_offset_zero() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(&dir, "a.c", "union u { int i; char c; };\nunion u v;\n");
    let mut s = Session::new();
    let prog = s.compile_file(&path).unwrap();
    let doc = dump(&s, &prog);
    let unions = doc["unions"].as_array().unwrap();
    assert_eq!(unions.len(), 1);
    let members = unions[0]["members"].as_array().unwrap();
    assert_eq!(members[0]["offset"], 0);
    assert_eq!(members[1]["offset"], 0);
    assert_eq!(unions[0]["size"], 4);
}

#[test]
fn enum_dump_carries_enumerator_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(&dir, "a.c", "enum color { RED, GREEN, BLUE = 5 };\nenum color c;\n");
    let mut s = Session::new();
    let prog = s.compile_file(&path).unwrap();
    let doc = dump(&s, &prog);
    let enums = doc["enums"].as_array().unwrap();
    assert_eq!(enums.len(), 1);
    let enumerators = enums[0]["enumerators"].as_array().unwrap();
    assert_eq!(enumerators[0]["name"], "RED");
    assert_eq!(enumerators[0]["value"], "0");
    assert_eq!(enumerators[2]["name"], "BLUE");
    assert_eq!(enumerators[2]["value"], "5");
}
