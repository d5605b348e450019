//! Resource path mappings.
//!
//! `ResourceMappings` records, for every path in the expanded template, the
//! originating path in the source template. Many expanded paths may map to
//! one original (a copy loop's instances all trace back to one prototype).
//! Built only during template processing; downstream code (the rule runner,
//! the line number resolver) treats it as frozen and read-only.

use crate::error::{AnalyzerError, Result};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ResourceMappings {
    forward: HashMap<String, String>,
}

/// Split `path` into the byte offsets right after each top-level segment, so
/// `"resources[1].resources[2].properties"` yields offsets after
/// `resources[1]`, `resources[1].resources[2]`, and the full string.
fn segment_boundaries(path: &str) -> Vec<usize> {
    let mut boundaries = Vec::new();
    let bytes = path.as_bytes();
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'[' => depth += 1,
            b']' => depth -= 1,
            b'.' if depth == 0 => boundaries.push(i),
            _ => {}
        }
    }
    boundaries.push(path.len());
    boundaries
}

impl ResourceMappings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `expanded -> original`. A conflicting re-mapping of the same
    /// expanded path to a different original is a processor bug.
    pub fn add(&mut self, expanded: impl Into<String>, original: impl Into<String>) -> Result<()> {
        let expanded = expanded.into();
        let original = original.into();
        if let Some(existing) = self.forward.get(&expanded) {
            if existing != &original {
                return Err(AnalyzerError::ResourceMappingConflict {
                    expanded_path: expanded,
                    first: existing.clone(),
                    second: original,
                });
            }
            return Ok(());
        }
        self.forward.insert(expanded, original);
        Ok(())
    }

    /// Resolve the original path for `expanded`, falling back to the
    /// longest recorded ancestor prefix plus the remaining suffix.
    pub fn resolve(&self, expanded: &str) -> Option<String> {
        if let Some(direct) = self.forward.get(expanded) {
            return Some(direct.clone());
        }
        let boundaries = segment_boundaries(expanded);
        for &end in boundaries.iter().rev().skip(1) {
            let ancestor = &expanded[..end];
            if let Some(ancestor_original) = self.forward.get(ancestor) {
                let suffix = &expanded[end..];
                return Some(format!("{ancestor_original}{suffix}"));
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_mapping_resolves() {
        let mut mappings = ResourceMappings::new();
        mappings.add("resources[1]", "resources[0]").unwrap();
        assert_eq!(mappings.resolve("resources[1]").as_deref(), Some("resources[0]"));
    }

    #[test]
    fn conflicting_mapping_errors() {
        let mut mappings = ResourceMappings::new();
        mappings.add("resources[1]", "resources[0]").unwrap();
        let err = mappings.add("resources[1]", "resources[2]").unwrap_err();
        assert!(matches!(err, AnalyzerError::ResourceMappingConflict { .. }));
    }

    #[test]
    fn descendant_path_resolves_through_ancestor() {
        let mut mappings = ResourceMappings::new();
        mappings.add("resources[1]", "resources[0]").unwrap();
        let resolved = mappings.resolve("resources[1].resources[2].properties.name");
        assert_eq!(resolved.as_deref(), Some("resources[0].resources[2].properties.name"));
    }

    #[test]
    fn unmapped_path_with_no_ancestor_resolves_to_none() {
        let mappings = ResourceMappings::new();
        assert_eq!(mappings.resolve("resources[5].properties.name"), None);
    }

    #[test]
    fn idempotent_add_of_identical_mapping() {
        let mut mappings = ResourceMappings::new();
        mappings.add("resources[1]", "resources[0]").unwrap();
        mappings.add("resources[1]", "resources[0]").unwrap();
        assert_eq!(mappings.len(), 1);
    }
}
