use assert_cmd::Command;
use predicates::str::contains;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_root(tag: &str) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time should move forward")
        .as_nanos();
    let root = std::env::temp_dir().join(format!("a65-cli-{tag}-{unique}"));
    std::fs::create_dir_all(&root).expect("failed to create temp root");
    root
}

#[test]
fn version_flag_prints_version_and_exits_zero() {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_a65"));
    cmd.arg("-v")
        .assert()
        .success()
        .stdout(contains("a65, version"));
}

#[test]
fn missing_source_file_exits_one_with_usage() {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_a65"));
    cmd.assert().failure().stderr(contains("usage: a65"));
}

#[test]
fn unreadable_source_file_exits_one() {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_a65"));
    cmd.arg("/nonexistent/input.asm")
        .assert()
        .failure()
        .stderr(contains("could not open source file"));
}

#[test]
fn assembles_startup_stub_to_object_file() {
    let root = temp_root("stub");
    let input = root.join("stub.asm");
    std::fs::write(&input, "      ORG $F000\n      SEI\n      CLD\n      END\n")
        .expect("failed to write input");

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_a65"));
    cmd.arg(&input).assert().success();

    let object = std::fs::read_to_string(root.join("stub.o")).expect("object file");
    assert_eq!(object, "@F000\n78 D8\n");
}

#[test]
fn listing_flag_writes_default_listing_path() {
    let root = temp_root("listing");
    let input = root.join("prog.asm");
    std::fs::write(&input, "      ORG $1000\nTOP:  LDA $42\n      BNE TOP\n")
        .expect("failed to write input");

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_a65"));
    cmd.arg("-L").arg(&input).assert().success();

    let listing = std::fs::read_to_string(root.join("prog.lst")).expect("listing file");
    assert!(listing.contains("LDA $42"));
    assert!(listing.contains("Symbol table by name"));
    assert!(listing.contains("TOP"));
}

#[test]
fn explicit_output_paths_are_honored() {
    let root = temp_root("paths");
    let input = root.join("prog.asm");
    std::fs::write(&input, "      ORG $2000\n      NOP\n").expect("failed to write input");
    let object = root.join("custom.obj");
    let listing = root.join("custom.txt");

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_a65"));
    cmd.arg("-o")
        .arg(&object)
        .arg("-l")
        .arg(&listing)
        .arg(&input)
        .assert()
        .success();

    assert_eq!(
        std::fs::read_to_string(&object).expect("object"),
        "@2000\nEA\n"
    );
    assert!(listing.exists());
}

#[test]
fn errors_suppress_object_but_not_listing_and_exit_one() {
    let root = temp_root("errors");
    let input = root.join("bad.asm");
    std::fs::write(&input, "      FROB $12\n      NOP\n").expect("failed to write input");

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_a65"));
    cmd.arg("-L")
        .arg(&input)
        .assert()
        .failure()
        .stderr(contains("unknown opcode"))
        .stderr(contains("1 error(s), 0 warning(s)."));

    assert!(!root.join("bad.o").exists());
    let listing = std::fs::read_to_string(root.join("bad.lst")).expect("listing file");
    assert!(listing.contains("Errors and Warnings"));
}

#[test]
fn stale_object_file_is_removed_on_failed_assembly() {
    let root = temp_root("stale");
    let input = root.join("prog.asm");
    std::fs::write(&input, "      NOP\n").expect("failed to write input");
    let object = root.join("prog.o");

    let mut ok = Command::new(env!("CARGO_BIN_EXE_a65"));
    ok.arg(&input).assert().success();
    assert!(object.exists());

    std::fs::write(&input, "      FROB\n").expect("failed to rewrite input");
    let mut bad = Command::new(env!("CARGO_BIN_EXE_a65"));
    bad.arg(&input).assert().failure();
    assert!(!object.exists());
}

#[test]
fn warnings_alone_keep_exit_zero_and_object_output() {
    let root = temp_root("warn");
    let input = root.join("prog.asm");
    std::fs::write(&input, "      LDA #$1FF\n").expect("failed to write input");

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_a65"));
    cmd.arg(&input)
        .assert()
        .success()
        .stderr(contains("0 error(s), 1 warning(s)."));

    assert_eq!(
        std::fs::read_to_string(root.join("prog.o")).expect("object"),
        "@0000\nA9 FF\n"
    );
}
