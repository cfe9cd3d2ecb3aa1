//! CLI flag contract tests
//!
//! Runs the built binary against a small module tree and checks exit codes,
//! stdout formats and the documents written to the output directory.

use std::path::Path;
use std::process::{Command, Output};

fn modgraph_bin() -> String {
    env!("CARGO_BIN_EXE_modgraph").to_string()
}

fn write(root: &Path, locator: &str, content: &str) {
    let path = root.join(locator);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn setup_test_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "app/code/Acme/Core/etc/module.xml",
        r#"<config><module name="Acme_Core"/></config>"#,
    );
    write(
        root,
        "app/code/Acme/Core/etc/di.xml",
        r#"<config><preference for="Acme\Core\Api\CartInterface" type="Acme\Core\Model\Cart"/></config>"#,
    );
    write(
        root,
        "app/code/Acme/Core/Model/Cart.php",
        "<?php\nnamespace Acme\\Core\\Model;\n\nclass Cart implements \\Acme\\Core\\Api\\CartInterface\n{\n}\n",
    );
    write(
        root,
        "app/code/Acme/Sales/etc/module.xml",
        r#"<config><module name="Acme_Sales"><sequence><module name="Acme_Core"/></sequence></module></config>"#,
    );
    write(
        root,
        "app/code/Acme/Sales/Model/Order.php",
        "<?php\nnamespace Acme\\Sales\\Model;\n\nclass Order\n{\n    public function cart()\n    {\n        return new \\Acme\\Core\\Model\\Cart();\n    }\n}\n",
    );
    dir
}

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(modgraph_bin())
        .arg("-C")
        .arg(dir)
        .args(["--no-git", "--no-cache"])
        .args(args)
        .env_remove("MODGRAPH_CONFIG")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run modgraph")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn test_analyze_writes_all_documents() {
    let dir = setup_test_repo();
    let output = run(dir.path(), &["analyze"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout(&output).contains("Modules: 2"));

    let out_dir = dir.path().join(".modgraph");
    for name in [
        "graph.json",
        "resolutions.json",
        "delegation_chains.json",
        "plugin_seams.json",
        "architectural_debt.json",
        "hotspots.json",
        "warnings.json",
    ] {
        let content = std::fs::read_to_string(out_dir.join(name)).unwrap();
        let _: serde_json::Value = serde_json::from_str(&content).unwrap();
    }
    assert!(!out_dir.join("cache").exists(), "--no-cache must not write the cache");
}

#[test]
fn test_no_subcommand_defaults_to_analyze() {
    let dir = setup_test_repo();
    let output = run(dir.path(), &[]);
    assert!(output.status.success());
    assert!(dir.path().join(".modgraph/graph.json").exists());
}

#[test]
fn test_json_summary_on_stdout() {
    let dir = setup_test_repo();
    let output = run(dir.path(), &["--format", "json", "analyze"]);
    assert!(output.status.success());
    let summary: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(summary["graph"]["modules"], 2);
    assert_eq!(summary["resolution_targets"], 1);
}

#[test]
fn test_output_dir_flag() {
    let dir = setup_test_repo();
    let output = run(dir.path(), &["--output-dir", "reports", "analyze"]);
    assert!(output.status.success());
    assert!(dir.path().join("reports/graph.json").exists());
    assert!(!dir.path().join(".modgraph").exists());
}

#[test]
fn test_workers_out_of_range_rejected() {
    let dir = setup_test_repo();
    let output = run(dir.path(), &["--workers", "0", "analyze"]);
    assert!(!output.status.success());
    let output = run(dir.path(), &["--workers", "65", "analyze"]);
    assert!(!output.status.success());
}

#[test]
fn test_resolve_prints_final_type() {
    let dir = setup_test_repo();
    let output = run(dir.path(), &["resolve", "Acme\\Core\\Api\\CartInterface"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Acme\\Core\\Model\\Cart"));
}

#[test]
fn test_resolve_unknown_scope_fails() {
    let dir = setup_test_repo();
    let output = run(
        dir.path(),
        &["resolve", "Acme\\Core\\Api\\CartInterface", "--scope", "nowhere"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown scope"));
}

#[test]
fn test_seams_json_is_a_list() {
    let dir = setup_test_repo();
    let output = run(dir.path(), &["--format", "json", "seams", "--min-risk", "medium"]);
    assert!(output.status.success());
    let seams: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(seams.as_array().map(Vec::len), Some(0));
}

#[test]
fn test_init_then_analyze_uses_written_config() {
    let dir = setup_test_repo();
    let output = run(dir.path(), &["init"]);
    assert!(output.status.success());
    assert!(dir.path().join("modgraph.toml").exists());

    let output = run(dir.path(), &["analyze"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Modules: 2"));
}
