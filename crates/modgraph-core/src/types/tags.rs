//! Build tag predicates handed to import scanners.

use std::collections::BTreeSet;

/// Which build tags a scan should treat as satisfied
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Tags {
    /// Every tag is satisfied; used when a closure must ignore build constraints
    #[default]
    Any,
    /// Only the listed tags are satisfied
    Only(BTreeSet<String>),
}

impl Tags {
    /// Predicate that accepts every tag
    pub fn any() -> Self {
        Tags::Any
    }

    /// Predicate that accepts exactly the given tags
    pub fn only<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Tags::Only(tags.into_iter().map(Into::into).collect())
    }

    /// Check whether a tag is satisfied
    pub fn matches(&self, tag: &str) -> bool {
        match self {
            Tags::Any => true,
            Tags::Only(set) => set.contains(tag),
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Tags::Any)
    }
}
