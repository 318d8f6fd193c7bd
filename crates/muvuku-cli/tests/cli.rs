use std::path::Path;
use std::process::{Command, Output};

use muvuku_contracts::MUVUKU_IR_SCHEMA_VERSION;
use serde_json::{json, Value};

fn run_muvuku(args: &[&str]) -> Output {
    let exe = env!("CARGO_BIN_EXE_muvuku");
    Command::new(exe)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("run muvuku")
}

fn write_json(path: &Path, v: &Value) {
    std::fs::write(path, serde_json::to_vec(v).expect("encode json")).expect("write file");
}

fn read_json(path: &Path) -> Value {
    let bytes = std::fs::read(path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()));
    serde_json::from_slice(&bytes).expect("parse output JSON")
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

#[test]
fn compile_writes_forms_and_driver() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let a = tmp.path().join("a.json");
    let b = tmp.path().join("b.json");
    write_json(
        &a,
        &json!({
            "meta": { "code": "REG" },
            "fields": {
                "name": {
                    "labels": { "short": "Name" },
                    "type": "string",
                    "position": 0,
                    "length": [1, 20]
                }
            }
        }),
    );
    write_json(
        &b,
        &json!([
            { "meta": { "code": "V1" }, "fields": {} },
            { "meta": { "code": "V2" }, "fields": {} }
        ]),
    );
    let out_dir = tmp.path().join("out");

    let out = run_muvuku(&[
        "compile",
        a.to_str().unwrap(),
        b.to_str().unwrap(),
        "--out",
        out_dir.to_str().unwrap(),
        "--jobs",
        "2",
    ]);
    assert_eq!(out.status.code(), Some(0), "stderr:\n{}", stderr(&out));
    assert!(
        stderr(&out).contains("Completed successfully: Wrote 4 files"),
        "stderr:\n{}",
        stderr(&out)
    );

    let reg = read_json(&out_dir.join("forms/reg.json"));
    assert_eq!(reg["meta"]["code"], "reg");
    assert_eq!(reg["meta"]["length"]["upper"], 27);
    assert_eq!(reg["fields"][0]["ref"], "lc_reg_name");

    let main = read_json(&out_dir.join("main/main.json"));
    assert_eq!(main["schema_version"], MUVUKU_IR_SCHEMA_VERSION);
    assert_eq!(main["meta"]["count"], 3);
    let codes: Vec<&str> = main["forms"]
        .as_array()
        .expect("forms[]")
        .iter()
        .map(|f| f["meta"]["code"].as_str().expect("code"))
        .collect();
    assert_eq!(codes, vec!["reg", "v1", "v2"]);
}

#[test]
fn oversized_form_is_fatal() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let src = tmp.path().join("big.json");
    write_json(
        &src,
        &json!({
            "meta": { "code": "BIG" },
            "fields": {
                "notes": { "labels": {}, "type": "string", "position": 0, "length": [1, 200] }
            }
        }),
    );
    let out_dir = tmp.path().join("out");

    let out = run_muvuku(&["compile", src.to_str().unwrap(), "--out", out_dir.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(127));
    let err = stderr(&out);
    assert!(err.contains("MVK0500"), "stderr:\n{err}");
    assert!(err.contains("upper=207"), "stderr:\n{err}");
    assert!(!out_dir.join("main/main.json").exists());
}

#[test]
fn invalid_field_reports_the_chain() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let src = tmp.path().join("bad.json");
    write_json(
        &src,
        &json!({
            "meta": { "code": "BAD" },
            "fields": { "x1": { "labels": {}, "type": "bogus", "position": 0 } }
        }),
    );

    let out_dir = tmp.path().to_str().unwrap();
    let out = run_muvuku(&["compile", src.to_str().unwrap(), "--out", out_dir]);
    assert_eq!(out.status.code(), Some(127));
    let err = stderr(&out);
    assert!(err.contains("MVK0402"), "stderr:\n{err}");
    assert!(err.contains("caused by: MVK0121"), "stderr:\n{err}");
    assert!(err.contains("field=\"x1\""), "stderr:\n{err}");
}

#[test]
fn unreadable_input_is_fatal() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let missing = tmp.path().join("missing.json");
    let out_dir = tmp.path().to_str().unwrap();
    let out = run_muvuku(&["compile", missing.to_str().unwrap(), "--out", out_dir]);
    assert_eq!(out.status.code(), Some(127));
    assert!(stderr(&out).contains("MVK0001"), "stderr:\n{}", stderr(&out));
}

const LEGACY: &str = r#"
const u8 PROGMEM lc_code_anc[] = "ANC";
const u8 PROGMEM lc_weight[] = "Weight";

schema_t *anc(void) {
    SCHEMA_BEGIN(rv, lc_code_anc, 1);
        SCHEMA_ITEM(locale(lc_weight), TS_INTEGER, 1, 3);
            SCHEMA_ITEM_FLAGS(FL_OPTIONAL);
    SCHEMA_END();
}
"#;

#[test]
fn migrate_prints_one_array_per_file() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let src = tmp.path().join("anc.c");
    std::fs::write(&src, LEGACY).expect("write source");

    let out = run_muvuku(&["migrate", "en", src.to_str().unwrap(), src.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(0), "stderr:\n{}", stderr(&out));

    let stdout = String::from_utf8(out.stdout).expect("utf8 stdout");
    let docs: Vec<Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).expect("parse line"))
        .collect();
    assert_eq!(docs.len(), 2);
    let form = &docs[0][0];
    assert_eq!(form["meta"]["code"], "ANC");
    let weight = &form["fields"]["weight"];
    assert_eq!(weight["labels"]["short"]["en"], "Weight");
    assert_eq!(weight["type"], "integer");
    assert_eq!(weight["length"], json!([1, 3]));
    assert_eq!(weight["flags"], json!({ "optional": true }));
}

#[test]
fn migrate_fails_on_missing_source() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let missing = tmp.path().join("missing.c");
    let out = run_muvuku(&["migrate", "en", missing.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("MVK0001"), "stderr:\n{}", stderr(&out));
}
