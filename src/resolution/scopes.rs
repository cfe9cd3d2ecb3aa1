//! Ordered scope list with one distinguished global scope

use serde::Serialize;

/// Ordered, duplicate-free list of scope names.
///
/// The global scope is always present; if the configured order omits it, it
/// is placed first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeList {
    order: Vec<String>,
    global: String,
}

impl ScopeList {
    pub fn new(order: Vec<String>, global: impl Into<String>) -> Self {
        let global = global.into();
        let mut deduped: Vec<String> = Vec::with_capacity(order.len() + 1);
        for scope in order {
            let scope = scope.trim().to_string();
            if !scope.is_empty() && !deduped.contains(&scope) {
                deduped.push(scope);
            }
        }
        if !deduped.contains(&global) {
            deduped.insert(0, global.clone());
        }
        Self {
            order: deduped,
            global,
        }
    }

    pub fn global(&self) -> &str {
        &self.global
    }

    pub fn is_global(&self, scope: &str) -> bool {
        scope == self.global
    }

    pub fn contains(&self, scope: &str) -> bool {
        self.order.iter().any(|s| s == scope)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn non_global(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(move |s| *s != self.global)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for ScopeList {
    fn default() -> Self {
        Self::new(
            crate::config::DEFAULT_SCOPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            "global",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_inserted_first_when_missing() {
        let scopes = ScopeList::new(vec!["frontend".into(), "adminhtml".into()], "global");
        let order: Vec<_> = scopes.iter().collect();
        assert_eq!(order, vec!["global", "frontend", "adminhtml"]);
        assert_eq!(scopes.non_global().collect::<Vec<_>>(), vec!["frontend", "adminhtml"]);
    }

    #[test]
    fn test_duplicates_and_blanks_dropped() {
        let scopes = ScopeList::new(
            vec!["global".into(), "frontend".into(), " ".into(), "frontend".into()],
            "global",
        );
        assert_eq!(scopes.len(), 2);
        assert!(scopes.is_global("global"));
        assert!(!scopes.contains("graphql"));
    }
}
