use super::*;
use tempfile::tempdir;

#[test]
fn test_glob_match() {
    assert!(glob_match("**/Test/**", "app/code/Acme/Cart/Test/Unit/CartTest.php"));
    assert!(glob_match("generated/", "generated/code/Foo.php"));
    assert!(glob_match("*.phtml", "view.phtml"));

    assert!(glob_match("vendor/", "vendor/acme/module-cart/etc/di.xml"));
    assert!(!glob_match("vendor/", "app/vendor/foo.php"));

    assert!(glob_match("app/**/view/*.phtml", "app/code/Acme/Cart/view/cart.phtml"));
    assert!(!glob_match("app/**/view/*.phtml", "app/code/Acme/Cart/view/frontend/cart.phtml"));
    assert!(!glob_match("**/Test/**", "app/code/Acme/Testing/Model.php"));
}

#[test]
fn test_defaults() {
    let config = ProjectConfig::default();
    assert_eq!(config.graph.max_evidence_per_edge, 5);
    assert_eq!(config.scopes.global, "global");
    assert_eq!(config.scopes.order.first().map(String::as_str), Some("global"));
    assert_eq!(config.hotspots.change_weight, 0.6);
    assert_eq!(config.hotspots.centrality_weight, 0.4);
    assert_eq!(config.centrality.weight_for(EdgeType::Plugin), 1.0);
    assert!(config.git.enabled);
}

#[test]
fn test_load_toml_config() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("modgraph.toml"),
        r#"
[scan]
roots = ["app/code"]

[graph]
max_evidence_per_edge = 3

[graph.subsets]
code = ["di_argument"]

[scopes]
order = ["global", "frontend", "checkout"]

[centrality]
threshold = 4.0
weights = { plugin = 2.5 }

[[entry_points]]
id = "cart.totals"
interface = "Acme\\Cart\\Api\\TotalsInterface"
scope = "frontend"
"#,
    )
    .unwrap();

    let config = load_project_config(dir.path());
    assert_eq!(config.scan.roots, vec!["app/code".to_string()]);
    assert_eq!(config.graph.max_evidence_per_edge, 3);
    assert_eq!(config.centrality.weight_for(EdgeType::Plugin), 2.5);
    assert_eq!(config.centrality.threshold, 4.0);
    assert_eq!(config.entry_points.len(), 1);
    assert_eq!(config.entry_points[0].scope.as_deref(), Some("frontend"));

    let subsets = config.subset_map();
    assert_eq!(subsets.subset_of(EdgeType::DiArgument), EdgeSubset::Code);
    assert_eq!(subsets.subset_of(EdgeType::Plugin), EdgeSubset::Runtime);

    let scopes = config.scope_list();
    assert!(scopes.contains("checkout"));
}

#[test]
fn test_load_json_config() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join(".modgraphrc.json"),
        r#"{"git": {"enabled": false}, "hotspots": {"threshold": 0.5}}"#,
    )
    .unwrap();

    let config = load_project_config(dir.path());
    assert!(!config.git.enabled);
    assert_eq!(config.hotspots.threshold, 0.5);
}

#[test]
fn test_malformed_config_falls_back_to_defaults() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("modgraph.toml"), "[graph\nmax = ").unwrap();
    let config = load_project_config(dir.path());
    assert_eq!(config.graph.max_evidence_per_edge, 5);
}

#[test]
fn test_explicit_config_rejects_zero_evidence_cap() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    std::fs::write(&path, "[graph]\nmax_evidence_per_edge = 0\n").unwrap();
    let err = load_config_file(&path).unwrap_err();
    assert!(err.to_string().contains("max_evidence_per_edge"));
}

#[test]
fn test_effective_patterns_skip_defaults() {
    let scan = ScanConfig {
        roots: vec![],
        exclude: vec!["legacy/".to_string()],
        skip_defaults: true,
    };
    assert_eq!(scan.effective_patterns(), vec!["legacy/".to_string()]);

    let scan = ScanConfig {
        skip_defaults: false,
        ..scan
    };
    let patterns = scan.effective_patterns();
    assert!(patterns.contains(&"**/Test/**".to_string()));
    assert!(patterns.contains(&"legacy/".to_string()));
}

#[test]
fn test_should_exclude() {
    let config = ProjectConfig::default();
    assert!(config.should_exclude("app/code/Acme/Cart/Test/Unit/ModelTest.php"));
    assert!(!config.should_exclude("app/code/Acme/Cart/Model/Cart.php"));
}
