//! Document-wide anchor allocation.

use std::collections::HashSet;

/// Hands out anchors that are unique across the whole output document.
#[derive(Debug, Default)]
pub struct AnchorRegistry {
    used: HashSet<String>,
}

impl AnchorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `base`, or `base-1`, `base-2`, ... if already taken.
    pub fn register(&mut self, base: &str) -> String {
        let base = if base.is_empty() { "section" } else { base };
        if self.used.insert(base.to_string()) {
            return base.to_string();
        }

        let mut counter = 1;
        loop {
            let candidate = format!("{base}-{counter}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            counter += 1;
        }
    }

    pub fn contains(&self, anchor: &str) -> bool {
        self.used.contains(anchor)
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_dedupes() {
        let mut registry = AnchorRegistry::new();
        assert_eq!(registry.register("intro"), "intro");
        assert_eq!(registry.register("intro"), "intro-1");
        assert_eq!(registry.register("intro"), "intro-2");
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_register_skips_taken_suffix() {
        let mut registry = AnchorRegistry::new();
        registry.register("a-1");
        registry.register("a");
        assert_eq!(registry.register("a"), "a-2");
        assert!(registry.contains("a-1"));
    }

    #[test]
    fn test_register_empty() {
        let mut registry = AnchorRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.register(""), "section");
    }
}
