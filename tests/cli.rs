//! CLI surface tests: flag handling, exit codes, and the full pipeline
//! driven through the compiled binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

fn studyrec_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("studyrec");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    fs::create_dir_all(root.join("config")).unwrap();
    fs::create_dir_all(root.join("data/token_json")).unwrap();
    fs::create_dir_all(root.join("data/resources")).unwrap();

    fs::write(
        root.join("data/token_json/title_one.json"),
        r#"{"cat":3,"dog":5,"xx":10}"#,
    )
    .unwrap();
    fs::write(
        root.join("data/token_json/title_two.json"),
        r#"{"cat":4,"fish":6}"#,
    )
    .unwrap();
    fs::write(root.join("data/global_terms.json"), r#"{"cat":10,"dog":6}"#).unwrap();
    fs::write(root.join("data/buffer.json"), r#"{"cat":1}"#).unwrap();
    fs::write(root.join("data/resources/title_one.pdf"), b"%PDF stub").unwrap();

    let config_content = format!(
        r#"[storage]
db_path = "{root}/data/pdf_text.db"

[ingest]
token_json_dir = "{root}/data/token_json"

[resources]
resource_dir = "{root}/data/resources"

[tfidf]
global_terms_path = "{root}/data/global_terms.json"

[prompt]
buffer_path = "{root}/data/buffer.json"
output_path = "{root}/data/output_prompt.txt"

[routes]
output_path = "{root}/data/route_list.txt"

[dumps]
processed_dir = "{root}/data/processed_data"
"#,
        root = root.display()
    );

    let config_path = root.join("config/studyrec.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_studyrec(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(studyrec_binary())
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .stdin(Stdio::null())
        .output()
        .unwrap_or_else(|e| panic!("Failed to run studyrec binary: {}", e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn no_flags_exits_nonzero() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_studyrec(&config_path, &[]);
    assert!(!success, "no flags should exit 1");
    assert!(stderr.contains("No action flags"));
}

#[test]
fn display_help_succeeds() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, _, success) = run_studyrec(&config_path, &["--displayHelp"]);
    assert!(success);
    assert!(stdout.contains("studyrec"));
    assert!(stdout.contains("--mapItemMatrix"));
}

#[test]
fn flags_are_case_insensitive() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, _, success) = run_studyrec(&config_path, &["--DISPLAYHELP"]);
    assert!(success);
    assert!(stdout.contains("studyrec"));
}

#[test]
fn unknown_flags_are_reported_and_skipped() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, stderr, success) =
        run_studyrec(&config_path, &["--noSuchFlag", "--displayHelp"]);
    assert!(success, "remaining flags should still run");
    assert!(stderr.contains("Unknown flag"));
    assert!(stdout.contains("studyrec"));
}

#[test]
fn compute_relational_distance_ingests_documents() {
    let (tmp, config_path) = setup_test_env();
    let (stdout, stderr, success) =
        run_studyrec(&config_path, &["--computeRelationalDistance"]);
    assert!(success, "ingest failed: {stdout} {stderr}");
    assert!(stdout.contains("documents written: 2"));
    assert!(stdout.contains("ok"));

    assert!(tmp.path().join("data/pdf_text.db").exists());
    assert!(tmp
        .path()
        .join("data/processed_data/data_dumper.csv")
        .exists());
}

#[test]
fn ingest_is_deterministic_across_runs() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout1, _, _) = run_studyrec(&config_path, &["--computeRelationalDistance"]);
    let (stdout2, _, _) = run_studyrec(&config_path, &["--computeRelationalDistance"]);
    assert_eq!(stdout1, stdout2);
}

#[test]
fn compute_tf_idf_after_ingest() {
    let (_tmp, config_path) = setup_test_env();
    run_studyrec(&config_path, &["--computeRelationalDistance"]);
    let (stdout, stderr, success) = run_studyrec(&config_path, &["--computeTFIDF"]);
    assert!(success, "tf-idf failed: {stdout} {stderr}");
    assert!(stdout.contains("terms upserted: 2"));
}

#[test]
fn process_prompt_writes_report() {
    let (tmp, config_path) = setup_test_env();
    run_studyrec(&config_path, &["--computeRelationalDistance"]);
    run_studyrec(&config_path, &["--updateDatabaseInformation"]);

    let (stdout, stderr, success) =
        run_studyrec(&config_path, &["--processPrompt", "--topN", "5"]);
    assert!(success, "prompt failed: {stdout} {stderr}");

    let report = fs::read_to_string(tmp.path().join("data/output_prompt.txt")).unwrap();
    assert!(report.starts_with("Top "));
}

#[test]
fn multiple_actions_run_in_pipeline_order() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, stderr, success) = run_studyrec(
        &config_path,
        &["--computeRelationalDistance", "--computeTFIDF"],
    );
    assert!(success, "combined run failed: {stdout} {stderr}");
    let ingest_at = stdout.find("compute relational distance").unwrap();
    let tfidf_at = stdout.find("compute tf-idf").unwrap();
    assert!(ingest_at < tfidf_at);
}

#[test]
fn map_item_matrix_runs_on_empty_candidates() {
    let (_tmp, config_path) = setup_test_env();
    run_studyrec(&config_path, &["--computeRelationalDistance"]);
    // No file_info rows with chunks yet: the build is a no-op, not an error.
    let (stdout, stderr, success) = run_studyrec(&config_path, &["--mapItemMatrix"]);
    assert!(success, "matrix failed: {stdout} {stderr}");
    assert!(stdout.contains("edges written: 0"));
}

#[test]
fn create_routes_with_no_input_finishes_cleanly() {
    let (_tmp, config_path) = setup_test_env();
    run_studyrec(&config_path, &["--computeRelationalDistance"]);
    let (stdout, stderr, success) = run_studyrec(&config_path, &["--createRoutes"]);
    assert!(success, "routes failed: {stdout} {stderr}");
    assert!(stdout.contains("routes generated: 0"));
}

#[test]
fn show_components_prints_overview() {
    let (_tmp, config_path) = setup_test_env();
    run_studyrec(&config_path, &["--computeRelationalDistance"]);
    let (stdout, stderr, success) = run_studyrec(&config_path, &["--showComponents"]);
    assert!(success, "overview failed: {stdout} {stderr}");
    assert!(stdout.contains("Documents:     2"));
    assert!(stdout.contains("Matrix edges:  0"));
}

#[test]
fn update_database_information_records_resources() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, stderr, success) =
        run_studyrec(&config_path, &["--updateDatabaseInformation"]);
    assert!(success, "resources failed: {stdout} {stderr}");
    assert!(stdout.contains("records written: 1"));

    // Append semantics: the second run skips the known file.
    let (stdout, _, success) = run_studyrec(&config_path, &["--updateDatabaseInformation"]);
    assert!(success);
    assert!(stdout.contains("records written: 0"));
    assert!(stdout.contains("skipped: 1"));
}
