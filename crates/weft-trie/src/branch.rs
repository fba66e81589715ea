use std::fmt;

use serde::{Deserialize, Serialize};

/// Caller-supplied identifier scoping trie writes to one history.
///
/// Branches are created implicitly on first write. The trie never
/// interprets the name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BranchId(String);

impl BranchId {
    /// Create a branch identifier from a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The branch name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BranchId({})", self.0)
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BranchId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_roundtrip() {
        let branch = BranchId::new("main");
        assert_eq!(branch.as_str(), "main");
        assert_eq!(format!("{branch}"), "main");
    }

    #[test]
    fn equality_is_by_name() {
        assert_eq!(BranchId::new("a"), BranchId::from("a"));
        assert_ne!(BranchId::new("a"), BranchId::new("b"));
    }

    #[test]
    fn serde_roundtrip() {
        let branch = BranchId::new("checkpoints");
        let json = serde_json::to_string(&branch).unwrap();
        let parsed: BranchId = serde_json::from_str(&json).unwrap();
        assert_eq!(branch, parsed);
    }
}
