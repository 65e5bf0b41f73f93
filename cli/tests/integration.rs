use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::tempdir;

/// A `head` + `name` sfnt with English family and subfamily.
fn face(family: &str, subfamily: &str) -> Vec<u8> {
    let mut head = vec![0u8; 54];
    head[0..4].copy_from_slice(&0x0001_0000u32.to_be_bytes());
    head[12..16].copy_from_slice(&0x5F0F_3CF5u32.to_be_bytes());

    let records = [(1u16, family), (2, subfamily), (5, "Version 1.0")];
    let mut name = Vec::new();
    let mut strings = Vec::new();
    for field in [0u16, records.len() as u16, 6 + 12 * records.len() as u16] {
        name.extend_from_slice(&field.to_be_bytes());
    }
    for (name_id, text) in records {
        let encoded: Vec<u8> = text.encode_utf16().flat_map(u16::to_be_bytes).collect();
        for field in [3u16, 1, 0x0409, name_id, encoded.len() as u16, strings.len() as u16] {
            name.extend_from_slice(&field.to_be_bytes());
        }
        strings.extend(encoded);
    }
    name.extend(strings);

    let mut out = Vec::new();
    out.extend_from_slice(&[0, 1, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0]);
    let mut data = Vec::new();
    for (tag, bytes) in [(b"head", &head), (b"name", &name)] {
        out.extend_from_slice(tag);
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(&((12 + 2 * 16 + data.len()) as u32).to_be_bytes());
        out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        data.extend_from_slice(bytes);
        while data.len() % 4 != 0 {
            data.push(0);
        }
    }
    out.extend(data);
    out
}

fn write(path: &Path, bytes: &[u8]) {
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, bytes).expect("write");
}

fn fontshelf(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fontshelf"))
        .current_dir(cwd)
        .env_remove("FONTSHELF_STORAGE")
        .env_remove("FONTSHELF_LOG")
        .args(args)
        .output()
        .expect("run fontshelf")
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).expect("utf8 stdout")
}

#[test]
fn build_install_validate_round() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();
    write(&root.join("source/Kai.ttf"), &face("Kai", "Regular"));
    write(
        &root.join("anime/ep1.ass"),
        b"[Script Info]\n\n[V4+ Styles]\nFormat: Name, Fontname, Bold, Italic\nStyle: Default,Kai,0,0\nStyle: Sign,Ghost,-1,0\n",
    );
    write(
        &root.join("fontshelf.json"),
        br#"{"storage": "storage", "source": "source"}"#,
    );

    let built = stdout(&fontshelf(root, &["build", "--json"]));
    let report: Value = serde_json::from_str(&built).expect("build json");
    assert_eq!(report["families"], 1);
    assert_eq!(report["sources"][0]["status"], "done");
    assert!(root.join("storage/Kai/Regular.ttf").exists());
    assert!(root.join("source.done/Kai.ttf").exists());

    let installed = stdout(&fontshelf(root, &["install", "anime", "--report-dir", "reports"]));
    assert!(installed.contains("tasks: 1"), "{installed}");
    assert!(installed.contains("missing fonts: 1"), "{installed}");
    assert!(root.join("anime/fonts/Kai.Regular.ttf").exists());
    assert_eq!(
        fs::read_to_string(root.join("reports/missing.txt")).unwrap(),
        "Ghost -- B_"
    );
    let missing: Value =
        serde_json::from_str(&fs::read_to_string(root.join("reports/missing.json")).unwrap())
            .unwrap();
    assert_eq!(missing["Ghost -- B_"][0], "ep1.ass");

    let again = stdout(&fontshelf(root, &["install", "anime", "--report-dir", "reports"]));
    assert!(again.contains("0 created, 0 replaced, 1 unchanged"), "{again}");

    let validated = fontshelf(root, &["validate"]);
    assert_eq!(validated.status.code(), Some(0));
}

#[test]
fn validate_exits_two_on_problems() {
    let tmp = tempdir().expect("tempdir");
    let storage = tmp.path().join("storage");
    write(
        &storage.join("index.json"),
        br#"{"Kai": {"Regular": "Kai/Regular.ttf"}}"#,
    );

    let output = fontshelf(
        tmp.path(),
        &["validate", "--json", "--storage", storage.to_str().unwrap()],
    );
    assert_eq!(output.status.code(), Some(2));
    let report: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(report["problems"][0]["kind"], "missing");
}

#[test]
fn missing_storage_is_fatal() {
    let tmp = tempdir().expect("tempdir");
    let output = fontshelf(tmp.path(), &["install", "."]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("error: no storage root"), "{stderr}");
}
