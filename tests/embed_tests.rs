//! `#embed` integration tests: soft limit warns but still embeds the full resource, hard limit
//! refuses it outright.

use std::io::Write;

use cfront::session::Session;

fn write_resource(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(bytes).unwrap();
    path
}

fn write_source(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    path
}

#[test]
fn soft_limit_warns_but_still_embeds_every_byte() {
    let dir = tempfile::tempdir().unwrap();
    write_resource(&dir, "data.bin", &vec![7u8; 100]);
    let path = write_source(&dir, "a.c", "int arr[] = {\n#embed \"data.bin\"\n};\n");

    let mut s = Session::new();
    s.pp.embed_limit = Some(50);
    let prog = s.compile_file(&path).unwrap();
    assert_eq!(s.warning_count(), 1);
    assert_eq!(prog.decls[0].init.len(), 100);
}

#[test]
fn hard_limit_rejects_the_resource_entirely() {
    let dir = tempfile::tempdir().unwrap();
    write_resource(&dir, "data.bin", &vec![7u8; 100]);
    let path = write_source(&dir, "a.c", "int arr[] = {\n#embed \"data.bin\"\n};\n");

    let mut s = Session::new();
    s.pp.embed_limit = Some(50);
    s.pp.embed_hard_limit = Some(50);
    let result = s.compile_file(&path);
    assert!(result.is_err());
}
