//! `sys.load` and the file module, driven against real files.

use std::{fs, path::PathBuf};

use pretty_assertions::assert_eq;
use warren::{CollectPrint, ErrorKind, Runtime};

fn fixture_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("warren-tests-{}-{name}", std::process::id()));
    fs::create_dir_all(&dir).expect("create fixture dir");
    dir
}

fn run_output(source: &str) -> String {
    let sink = CollectPrint::new();
    let mut rt = Runtime::with_print(Box::new(sink.clone()));
    let result = rt.exec(source).unwrap();
    rt.release_value(result);
    sink.output()
}

#[test]
fn load_splices_a_file_into_the_top_level() {
    let dir = fixture_dir("load");
    let lib = dir.join("lib.wn");
    fs::write(&lib, "triple: (x) -> (+(x, x, x))").unwrap();
    let output = run_output(&format!(
        "sys.load(\"{}\"), io.print(triple(14))",
        lib.display()
    ));
    assert_eq!(output, "42\n");
}

#[test]
fn functions_from_a_loaded_module_outlive_the_load_call() {
    let dir = fixture_dir("closures");
    let lib = dir.join("counters.wn");
    fs::write(
        &lib,
        "make: (start) -> ((by) -> (+(start, by)))",
    )
    .unwrap();
    // The deferred body lives in the module's AST; calling it long after
    // sys.load returned must still work.
    let output = run_output(&format!(
        "sys.load(\"{}\"), f: make(40), io.print(f(2))",
        lib.display()
    ));
    assert_eq!(output, "42\n");
}

#[test]
fn load_returns_true() {
    let dir = fixture_dir("load-result");
    let lib = dir.join("empty.wn");
    fs::write(&lib, "").unwrap();
    let output = run_output(&format!("io.print(sys.load(\"{}\"))", lib.display()));
    assert_eq!(output, "true\n");
}

#[test]
fn loading_an_unreadable_file_is_a_resource_error() {
    let mut rt = Runtime::new();
    let err = rt
        .exec("sys.load(\"/definitely/not/a/real/path.wn\")")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resource);
}

#[test]
fn file_values_read_lines_until_eof() {
    let dir = fixture_dir("read");
    let data = dir.join("data.txt");
    fs::write(&data, "alpha\nbeta\n").unwrap();
    let output = run_output(&format!(
        "f: File.clone(), f.path: \"{}\", f.open(\"r\"), \
         io.print(f.read_line()), io.print(f.read_line()), \
         io.print(f.eof()), f.close()",
        data.display()
    ));
    assert_eq!(output, "alpha\nbeta\ntrue\n");
}

#[test]
fn opening_without_a_path_reports_false() {
    assert_eq!(
        run_output("f: File.clone(), io.print(f.open(\"r\"))"),
        "false\n"
    );
}

#[test]
fn closing_twice_reports_false_the_second_time() {
    let dir = fixture_dir("close");
    let data = dir.join("data.txt");
    fs::write(&data, "x\n").unwrap();
    let output = run_output(&format!(
        "f: File.clone(), f.path: \"{}\", f.open(\"r\"), \
         io.print(f.close(), f.close())",
        data.display()
    ));
    assert_eq!(output, "true false\n");
}

#[test]
fn reading_a_closed_file_is_an_invariant_violation() {
    let mut rt = Runtime::new();
    let err = rt
        .exec("f: File.clone(), f.read_line()")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invariant);
}
