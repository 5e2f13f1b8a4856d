use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const ABOUT_TXT: &str = "Acme Bakery is a family bakery on Main Street.\n\n\
We bake sourdough bread, croissants and seasonal pies every morning.\n\n\
Opening hours are 7am to 3pm, Tuesday to Sunday.";

fn bizdesk_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("bizdesk");
    path
}

fn write_config(root: &Path, providers: &str) -> PathBuf {
    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/bizdesk.sqlite"

[vector_store]
path = "{root}/data/vectors.sqlite"

[chunking]
chunk_size = 60
chunk_overlap = 10

[embedding]
provider = "{providers}"

[llm]
provider = "{providers}"
"#,
        root = root.display(),
        providers = providers,
    );

    let config_path = config_dir.join("bizdesk.toml");
    fs::write(&config_path, config_content).unwrap();
    config_path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(files_dir.join("about.txt"), ABOUT_TXT).unwrap();
    fs::write(
        files_dir.join("prices.csv"),
        "item,price\nSourdough,6.50\nCroissant,3.00\n",
    )
    .unwrap();
    fs::write(files_dir.join("empty.txt"), "  \n\n ").unwrap();
    fs::write(files_dir.join("tool.exe"), "MZ").unwrap();

    let config_path = write_config(&root, "disabled");
    (tmp, config_path)
}

fn run_bizdesk(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = bizdesk_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("OPENAI_API_KEY")
        .env_remove("BIZDESK_ALLOWED_EXTENSIONS")
        .env_remove("BIZDESK_MAX_UPLOAD_BYTES")
        .env_remove("PORT")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run bizdesk binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn file_arg(config_path: &Path, name: &str) -> String {
    config_path
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("files")
        .join(name)
        .to_string_lossy()
        .to_string()
}

/// Business id printed by `bizdesk ingest`.
fn business_id_from(stdout: &str) -> String {
    stdout
        .lines()
        .find_map(|l| l.trim().strip_prefix("business id:"))
        .map(|id| id.trim().to_string())
        .unwrap_or_else(|| panic!("no business id in output: {}", stdout))
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_bizdesk(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/bizdesk.sqlite").exists());
    assert!(tmp.path().join("data/vectors.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_bizdesk(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_bizdesk(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_txt() {
    let (_tmp, config_path) = setup_test_env();
    let file = file_arg(&config_path, "about.txt");

    let (stdout, stderr, success) =
        run_bizdesk(&config_path, &["ingest", &file, "--name", "Acme Bakery"]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Ingested 'about.txt' for Acme Bakery"));
    assert!(stdout.contains("(0 indexed)"), "embeddings are disabled: {}", stdout);
    assert!(stdout.contains("ok"));
    assert_eq!(business_id_from(&stdout).len(), 16);
}

#[test]
fn test_same_name_twice_creates_two_businesses() {
    let (_tmp, config_path) = setup_test_env();
    let file = file_arg(&config_path, "about.txt");

    let (first, _, ok1) = run_bizdesk(&config_path, &["ingest", &file, "--name", "Acme"]);
    let (second, _, ok2) = run_bizdesk(&config_path, &["ingest", &file, "--name", "Acme"]);
    assert!(ok1 && ok2);
    assert_ne!(business_id_from(&first), business_id_from(&second));
}

#[test]
fn test_show_after_ingest() {
    let (_tmp, config_path) = setup_test_env();
    let file = file_arg(&config_path, "prices.csv");

    let (stdout, _, success) = run_bizdesk(&config_path, &["ingest", &file, "--name", "Acme"]);
    assert!(success);
    let id = business_id_from(&stdout);

    let (stdout, stderr, success) = run_bizdesk(&config_path, &["show", &id]);
    assert!(success, "show failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains(&format!("id:       {}", id)));
    assert!(stdout.contains("name:     Acme"));
    assert!(stdout.contains("file:     prices.csv"));
    assert!(stdout.contains("vectors:  0"));
    assert!(stdout.contains("--- FAQs (0) ---"));
    assert!(stdout.contains("--- Products (0) ---"));
}

#[test]
fn test_show_missing_business() {
    let (_tmp, config_path) = setup_test_env();
    run_bizdesk(&config_path, &["init"]);

    let (_, stderr, success) = run_bizdesk(&config_path, &["show", "ffffffffffffffff"]);
    assert!(!success);
    assert!(stderr.contains("not found"), "stderr: {}", stderr);
}

#[test]
fn test_ingest_unsupported_extension() {
    let (_tmp, config_path) = setup_test_env();
    let file = file_arg(&config_path, "tool.exe");

    let (_, stderr, success) = run_bizdesk(&config_path, &["ingest", &file, "--name", "Acme"]);
    assert!(!success);
    assert!(stderr.contains("File type not allowed"), "stderr: {}", stderr);
}

#[test]
fn test_ingest_empty_document_fails() {
    let (_tmp, config_path) = setup_test_env();
    let file = file_arg(&config_path, "empty.txt");

    let (_, stderr, success) = run_bizdesk(&config_path, &["ingest", &file, "--name", "Acme"]);
    assert!(!success);
    assert!(stderr.contains("Could not extract valid text"), "stderr: {}", stderr);
}

#[test]
fn test_ask_with_disabled_llm_apologizes() {
    let (_tmp, config_path) = setup_test_env();
    let file = file_arg(&config_path, "about.txt");

    let (stdout, _, success) = run_bizdesk(&config_path, &["ingest", &file, "--name", "Acme"]);
    assert!(success);
    let id = business_id_from(&stdout);

    let (stdout, stderr, success) =
        run_bizdesk(&config_path, &["ask", &id, "When do you open?"]);
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("I'm sorry, there was an issue generating a response right now."));
}

#[test]
fn test_missing_config_file() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_bizdesk(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"), "stderr: {}", stderr);
}

#[test]
fn test_openai_provider_requires_key() {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(tmp.path(), "openai");

    let (_, stderr, success) = run_bizdesk(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("OPENAI_API_KEY"), "stderr: {}", stderr);
}
