//! File discovery and declaration loading
//!
//! Walks each scan root (respecting `.gitignore` and the configured exclude
//! globs), splits the files into declaration files and PHP sources, and
//! parses every declaration file. Locators are relative to the project root
//! and everything is returned sorted by locator.

use crate::config::ProjectConfig;
use crate::declarations::{classify, parse_declaration_file, Declaration, FilePlacement};
use crate::errors::{Extraction, Warning};
use crate::models::relative_locator;
use crate::parsers::is_source_file;
use crate::resolution::ScopeList;
use ignore::WalkBuilder;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A file found under a scan root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub locator: String,
    pub path: PathBuf,
}

/// Everything the walk found, each list sorted by locator.
#[derive(Debug, Default)]
pub struct Discovery {
    pub declaration_files: Vec<(DiscoveredFile, FilePlacement)>,
    pub source_files: Vec<DiscoveredFile>,
    /// Scan roots that existed
    pub roots_scanned: usize,
}

/// Declarations parsed from one file, with the scope they apply to.
#[derive(Debug, Clone)]
pub struct DeclarationFile {
    pub locator: String,
    pub placement: FilePlacement,
    /// Resolved scope for scoped kinds, the global scope otherwise
    pub scope: String,
    pub declarations: Vec<Declaration>,
}

/// Walk the configured scan roots of `project_root`.
pub fn discover_files(project_root: &Path, config: &ProjectConfig) -> Extraction<Discovery> {
    let mut out = Extraction::new(Discovery::default());
    let roots: Vec<String> = if config.scan.roots.is_empty() {
        vec![".".to_string()]
    } else {
        config.scan.roots.clone()
    };

    // Overlapping roots must not yield a file twice
    let mut files: BTreeMap<String, PathBuf> = BTreeMap::new();
    for root in &roots {
        let dir = match root.trim_end_matches('/') {
            "" | "." => project_root.to_path_buf(),
            rel => project_root.join(rel),
        };
        if !dir.is_dir() {
            out.warn(Warning::missing_input(
                Some(root.clone()),
                format!("scan root {} does not exist", dir.display()),
            ));
            continue;
        }
        out.value.roots_scanned += 1;

        let walker = WalkBuilder::new(&dir)
            .hidden(true)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(true)
            .require_git(false)
            .build();

        for entry in walker.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let locator = relative_locator(project_root, path);
            if config.should_exclude(&locator) {
                continue;
            }
            files.entry(locator).or_insert_with(|| path.to_path_buf());
        }
    }

    for (locator, path) in files {
        if let Some(placement) = classify(&locator) {
            out.value
                .declaration_files
                .push((DiscoveredFile { locator, path }, placement));
        } else if is_source_file(&path) {
            out.value.source_files.push(DiscoveredFile { locator, path });
        }
    }

    debug!(
        "Discovered {} declaration files and {} source files in {} roots",
        out.value.declaration_files.len(),
        out.value.source_files.len(),
        out.value.roots_scanned
    );
    out
}

/// Parse every declaration file. Results keep the input (locator) order.
///
/// Scoped files in a scope directory outside `scopes` are skipped with a
/// warning; unreadable files become parse failures.
pub fn load_declarations(
    files: &[(DiscoveredFile, FilePlacement)],
    scopes: &ScopeList,
) -> Extraction<Vec<DeclarationFile>> {
    let parsed: Vec<Extraction<Option<DeclarationFile>>> = files
        .par_iter()
        .map(|(file, placement)| load_one(file, placement, scopes))
        .collect();

    let mut out = Extraction::new(Vec::with_capacity(parsed.len()));
    for result in parsed {
        if let Some(file) = out.absorb(result) {
            out.value.push(file);
        }
    }
    out
}

fn load_one(
    file: &DiscoveredFile,
    placement: &FilePlacement,
    scopes: &ScopeList,
) -> Extraction<Option<DeclarationFile>> {
    let mut out = Extraction::new(None);

    let scope = match &placement.scope_dir {
        None => scopes.global().to_string(),
        Some(dir) if scopes.contains(dir) => dir.clone(),
        Some(dir) => {
            out.warn(Warning::invalid_declaration(
                file.locator.clone(),
                format!("scope directory '{}' is not a configured scope; file skipped", dir),
            ));
            return out;
        }
    };

    let content = match std::fs::read_to_string(&file.path) {
        Ok(content) => content,
        Err(e) => {
            out.warn(Warning::parse_failure(file.locator.clone(), format!("cannot read file: {}", e)));
            return out;
        }
    };

    // Themes take their ID from the sibling registration.php
    let registration = match placement.kind {
        crate::declarations::FileKind::ThemeXml => file
            .path
            .parent()
            .and_then(|dir| std::fs::read_to_string(dir.join("registration.php")).ok()),
        _ => None,
    };

    let declarations = out.absorb(parse_declaration_file(
        placement,
        &content,
        &file.locator,
        &scope,
        registration.as_deref(),
    ));
    out.value = Some(DeclarationFile {
        locator: file.locator.clone(),
        placement: placement.clone(),
        scope,
        declarations,
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declarations::FileKind;
    use crate::errors::WarningKind;
    use tempfile::tempdir;

    fn write(root: &Path, locator: &str, content: &str) {
        let path = root.join(locator);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_discover_splits_and_sorts() {
        let dir = tempdir().unwrap();
        write(dir.path(), "app/code/Acme/Cart/etc/module.xml", "<config/>");
        write(dir.path(), "app/code/Acme/Cart/Model/Cart.php", "<?php");
        write(dir.path(), "app/code/Acme/Cart/Test/Unit/CartTest.php", "<?php");
        write(dir.path(), "app/code/Acme/Cart/README.md", "readme");
        write(dir.path(), "app/code/Acme/Alpha/Model/A.php", "<?php");

        let config = ProjectConfig::default();
        let result = discover_files(dir.path(), &config);
        assert!(result.warnings.is_empty());
        let discovery = result.value;

        let sources: Vec<&str> = discovery.source_files.iter().map(|f| f.locator.as_str()).collect();
        assert_eq!(
            sources,
            vec!["app/code/Acme/Alpha/Model/A.php", "app/code/Acme/Cart/Model/Cart.php"]
        );
        assert_eq!(discovery.declaration_files.len(), 1);
        assert_eq!(discovery.declaration_files[0].1.kind, FileKind::ModuleXml);
    }

    #[test]
    fn test_missing_root_warns() {
        let dir = tempdir().unwrap();
        write(dir.path(), "app/code/Acme/Cart/Model/Cart.php", "<?php");
        let mut config = ProjectConfig::default();
        config.scan.roots = vec!["app/code".to_string(), "vendor".to_string(), "app".to_string()];

        let result = discover_files(dir.path(), &config);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].kind, WarningKind::MissingInput);
        assert_eq!(result.value.roots_scanned, 2);
        assert_eq!(result.value.source_files.len(), 1);
    }

    #[test]
    fn test_unknown_scope_directory_is_skipped() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "app/code/Acme/Cart/etc/storefront/di.xml",
            r#"<config><preference for="A" type="B"/></config>"#,
        );
        write(
            dir.path(),
            "app/code/Acme/Cart/etc/frontend/di.xml",
            r#"<config><preference for="A" type="C"/></config>"#,
        );

        let config = ProjectConfig::default();
        let discovery = discover_files(dir.path(), &config).value;
        let loaded = load_declarations(&discovery.declaration_files, &config.scope_list());

        assert_eq!(loaded.value.len(), 1);
        assert_eq!(loaded.value[0].scope, "frontend");
        assert_eq!(loaded.value[0].declarations.len(), 1);
        assert_eq!(loaded.warnings.len(), 1);
        assert_eq!(
            loaded.warnings[0].file.as_deref(),
            Some("app/code/Acme/Cart/etc/storefront/di.xml")
        );
    }
}
