//! Source code parsers using tree-sitter
//!
//! Source files are reduced to a [`FileOutline`]: declared types, methods and
//! every class-usage site with names already resolved to fully-qualified form.

pub mod names;
pub mod outline;
pub mod php;

pub use outline::{
    FileOutline, MethodOutline, ParamOutline, SourceNode, SourceVisitor, TypeKind, TypeOutline,
    Usage, UsageKind,
};

use anyhow::Result;
use std::path::Path;

/// Get all supported file extensions
pub fn supported_extensions() -> &'static [&'static str] {
    &["php"]
}

pub fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| supported_extensions().contains(&ext))
        .unwrap_or(false)
}

/// Parse source bytes into an outline. Invalid UTF-8 is replaced lossily.
pub fn parse_bytes(bytes: &[u8], locator: &str) -> Result<FileOutline> {
    let source = String::from_utf8_lossy(bytes);
    php::parse_source(&source, locator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_source_file() {
        assert!(is_source_file(Path::new("Model/Cart.php")));
        assert!(!is_source_file(Path::new("etc/di.xml")));
        assert!(!is_source_file(Path::new("README")));
    }
}
