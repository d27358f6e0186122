use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn code_index() -> Command {
    Command::new(env!("CARGO_BIN_EXE_code-index"))
}

fn setup_workspace() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(root.join(".gitignore"), "generated.py\n").unwrap();
    fs::write(root.join("src/parser.rs"), "fn parse_config() {}\n").unwrap();
    fs::write(root.join("main.py"), "def main():\n    run()\n").unwrap();
    fs::write(root.join("generated.py"), "AUTO = True\n").unwrap();
    fs::write(root.join("notes.md"), "# notes\n").unwrap();
    tmp
}

#[test]
fn test_scan_lists_indexed_files() {
    let tmp = setup_workspace();
    let output = code_index()
        .args(["scan", tmp.path().to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Indexed 2 files"), "stdout: {stdout}");
    assert!(stdout.contains("parser.rs"));
    assert!(stdout.contains("main.py"));
    assert!(!stdout.contains("generated.py"));
    assert!(!stdout.contains("notes.md"));
}

#[test]
fn test_scan_with_query_ranks_exact_match_first() {
    let tmp = setup_workspace();
    let output = code_index()
        .args([
            "scan",
            tmp.path().to_str().unwrap(),
            "--query",
            "fn parse_config() {}\n",
            "--top-k",
            "1",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let first = stdout.lines().find(|l| l.starts_with("1.")).unwrap();
    assert!(first.ends_with("parser.rs"), "stdout: {stdout}");
    assert!(!stdout.lines().any(|l| l.starts_with("2.")));
}

#[test]
fn test_scan_missing_root_fails() {
    let output = code_index()
        .args(["scan", "/definitely/not/a/workspace"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Workspace not found"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("code-index.toml");
    fs::write(&config, "[index]\nembedding_dims = 0\n").unwrap();

    let output = code_index()
        .args(["--config", config.to_str().unwrap(), "scan", tmp.path().to_str().unwrap()])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("embedding_dims"));
}

#[test]
fn test_status_against_missing_engine_fails() {
    let output = code_index()
        .args(["--url", "http://127.0.0.1:1", "status"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}
