use std::{
    io::Write,
    process::{Command, Stdio},
};

use fletcher4::{do_fletcher4, fletcher::format_checksum, table::ChecksumRecord};

const BIN: &str = env!("CARGO_BIN_EXE_fletcher4sum");

#[test]
fn prints_one_line_per_file() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let hello = dir.path().join("hello.txt");
    let empty = dir.path().join("empty.txt");
    std::fs::write(&hello, b"hello").unwrap();
    std::fs::write(&empty, b"").unwrap();

    let output = Command::new(BIN)
        .arg(&hello)
        .arg(&empty)
        .args(["--read-size", "3"])
        .output()
        .expect("Failed to execute process");
    assert!(output.status.success(), "{:?}", output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines,
        [
            format!("6c6c65d7/d8d8cb3f/1454530a7/1b1b1960f  {}", hello.display()),
            format!("0/0/0/0  {}", empty.display()),
        ]
    );
}

#[test]
fn reads_stdin_without_arguments() {
    let mut child = Command::new(BIN)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("Failed to execute process");
    child.stdin.take().unwrap().write_all(b"123").unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("{}  -", format_checksum(&do_fletcher4(b"123"))));
}

#[test]
fn json_output_can_be_checked() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let file = dir.path().join("data.bin");
    let data: Vec<u8> = (0..5000u32).map(|i| (i % 253) as u8).collect();
    std::fs::write(&file, &data).unwrap();

    let output = Command::new(BIN).arg("--json").arg(&file).output().unwrap();
    assert!(output.status.success());

    let records: Vec<ChecksumRecord> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(records, [ChecksumRecord { path: file.clone(), checksum: do_fletcher4(&data) }]);

    let table = dir.path().join("table.json");
    std::fs::write(&table, &output.stdout).unwrap();

    let output = Command::new(BIN).arg("--check").arg(&table).output().unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), format!("{}: OK", file.display()));

    // Corrupt a single byte
    let mut corrupted = data.clone();
    corrupted[4321] ^= 0x01;
    std::fs::write(&file, &corrupted).unwrap();

    let output = Command::new(BIN).arg("--check").arg(&table).output().unwrap();
    assert!(!output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), format!("{}: FAILED", file.display()));
}

#[test]
fn missing_file_fails() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let output = Command::new(BIN).arg(dir.path().join("nope")).output().unwrap();
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn stdin_keeps_its_argument_position() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let file = dir.path().join("a.txt");
    std::fs::write(&file, b"hello").unwrap();

    let mut child = Command::new(BIN)
        .arg(&file)
        .arg("-")
        .arg(&file)
        .arg("-")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("Failed to execute process");
    child.stdin.take().unwrap().write_all(b"123").unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success(), "{:?}", output);

    let hello = format!("{}  {}", format_checksum(&do_fletcher4(b"hello")), file.display());
    let stdin = format!("{}  -", format_checksum(&do_fletcher4(b"123")));
    // The second `-` reads an already drained stdin
    let drained = "0/0/0/0  -".to_string();

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines, [hello.clone(), stdin, hello, drained]);
}

#[test]
fn repeated_table_paths_are_checked_one_by_one() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let file = dir.path().join("a.bin");
    std::fs::write(&file, b"hello").unwrap();

    let records = vec![
        ChecksumRecord { path: file.clone(), checksum: do_fletcher4(b"hello") },
        ChecksumRecord { path: file.clone(), checksum: [1, 2, 3, 4] },
    ];
    let table = dir.path().join("table.json");
    std::fs::write(&table, serde_json::to_vec(&records).unwrap()).unwrap();

    let output = Command::new(BIN).arg("--check").arg(&table).output().unwrap();
    assert!(!output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines,
        [format!("{}: OK", file.display()), format!("{}: FAILED", file.display())]
    );
}
