use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn docchat_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_docchat"))
}

/// Temp workspace with an upload dir and a config that uses Ollama, which
/// none of these commands contact.
fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let uploads = root.join("uploads");
    fs::create_dir_all(&uploads).unwrap();
    fs::write(
        uploads.join("notes.txt"),
        "Paris is the capital of France.\n\nTokyo is the capital of Japan.",
    )
    .unwrap();
    fs::write(uploads.join("cities.csv"), "city,country\nParis,France\nTokyo,Japan\n").unwrap();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_path = config_dir.join("docchat.toml");
    fs::write(
        &config_path,
        format!(
            r#"[paths]
upload_dir = '{}'
index_dir = '{}'

[embedding]
provider = "ollama"
url = "http://127.0.0.1:9"
max_retries = 0

[generation]
provider = "ollama"
url = "http://127.0.0.1:9"
max_retries = 0
"#,
            uploads.display(),
            root.join("index").display()
        ),
    )
    .unwrap();

    (tmp, config_path)
}

fn run(config: &Path, args: &[&str]) -> Output {
    Command::new(docchat_binary())
        .arg("--config")
        .arg(config)
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to run docchat")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn test_ask_before_build_reports_missing_index() {
    let (_tmp, config) = setup_test_env();
    let output = run(&config, &["ask", "What is the capital of France?"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("index not built yet"), "stderr: {}", stderr(&output));
}

#[test]
fn test_status_before_build_reports_missing_index() {
    let (_tmp, config) = setup_test_env();
    let output = run(&config, &["status"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("index not built yet"));
}

#[test]
fn test_locate_prints_chunk_text() {
    let (_tmp, config) = setup_test_env();
    let output = run(&config, &["locate", "notes.txt", "0"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("Paris is the capital of France."));

    let output = run(&config, &["locate", "notes.txt", "0", "--json"]);
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["source_id"], "notes.txt");
    assert_eq!(json["ordinal"], 0);
}

#[test]
fn test_locate_out_of_range_fails() {
    let (_tmp, config) = setup_test_env();
    let output = run(&config, &["locate", "notes.txt", "9"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("chunk 9 not found in notes.txt"));
}

#[test]
fn test_locate_missing_source_fails() {
    let (_tmp, config) = setup_test_env();
    let output = run(&config, &["locate", "missing.docx", "0"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("source not found: missing.docx"));
}

#[test]
fn test_view_writes_highlighted_page() {
    let (tmp, config) = setup_test_env();
    let out = tmp.path().join("view.html");
    let output = run(
        &config,
        &["view", "cities.csv", "0", "--out", out.to_str().unwrap()],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).starts_with("ok: wrote"));

    let page = fs::read_to_string(&out).unwrap();
    assert!(page.contains("<h2 style=\"margin-top:0\">cities.csv</h2>"));
    assert!(page.contains("<a id='chunk-0'></a>"));
    assert!(page.contains("<th>city</th>"));
}

#[test]
fn test_view_to_stdout() {
    let (_tmp, config) = setup_test_env();
    let output = run(&config, &["view", "notes.txt", "0"]);
    assert!(output.status.success());
    let page = stdout(&output);
    assert!(page.starts_with("<!DOCTYPE html>"));
    assert!(page.contains("<a id='chunk-0'></a><mark"));
}

#[test]
fn test_export_without_answer_fails() {
    let (_tmp, config) = setup_test_env();
    let output = run(&config, &["export"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("No summary to export yet"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let output = run(&tmp.path().join("nope.toml"), &["status"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Failed to read config file"));
}

#[test]
fn test_invalid_config_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("bad.toml");
    fs::write(&path, "[chunking]\nchunk_size = 10\noverlap = 50\n").unwrap();
    let output = run(&path, &["status"]);
    assert!(!output.status.success());
}
