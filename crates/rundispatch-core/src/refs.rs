//! Git ref classification.
//!
//! The run listing endpoint only filters by short branch name, so a full ref
//! such as `refs/heads/feature/x` has to be reduced before it can be used as
//! a filter. Tags are never used as a filter.

const TAG_MARKER: &str = "refs/tags/";
const BRANCH_MARKER: &str = "refs/heads/";

/// What kind of revision a git ref points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitRefKind {
    Tag,
    /// A branch ref with a non-empty short name.
    Branch(String),
    /// Bare names, SHAs, or branch refs with nothing after the marker.
    Other,
}

impl GitRefKind {
    pub fn classify(git_ref: &str) -> Self {
        if is_tag_ref(git_ref) {
            return GitRefKind::Tag;
        }
        match branch_name_from_ref(git_ref) {
            Some(name) => GitRefKind::Branch(name.to_string()),
            None => GitRefKind::Other,
        }
    }

    /// Branch name to filter run listings by, if any.
    pub fn branch_filter(&self) -> Option<&str> {
        match self {
            GitRefKind::Branch(name) => Some(name),
            _ => None,
        }
    }
}

/// True iff the ref contains the tag path marker.
pub fn is_tag_ref(git_ref: &str) -> bool {
    git_ref.contains(TAG_MARKER)
}

/// Everything after the branch path marker, if present and non-empty.
pub fn branch_name_from_ref(git_ref: &str) -> Option<&str> {
    git_ref
        .split_once(BRANCH_MARKER)
        .map(|(_, name)| name)
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_tag_ref() {
        assert!(is_tag_ref("refs/tags/v1.0"));
        assert!(is_tag_ref("/refs/tags/v1.0"));
        assert!(!is_tag_ref("refs/heads/main"));
        assert!(!is_tag_ref("main"));
        assert!(!is_tag_ref(""));
    }

    #[test]
    fn test_branch_name_from_ref() {
        assert_eq!(branch_name_from_ref("refs/heads/main"), Some("main"));
        assert_eq!(branch_name_from_ref("refs/heads/feature/x"), Some("feature/x"));
        assert_eq!(branch_name_from_ref("refs/tags/v1.0"), None);
        assert_eq!(branch_name_from_ref("refs/heads/"), None);
        assert_eq!(branch_name_from_ref("main"), None);
    }

    #[test]
    fn test_classify() {
        assert_eq!(GitRefKind::classify("refs/tags/v2.3.1"), GitRefKind::Tag);
        assert_eq!(
            GitRefKind::classify("refs/heads/release/1.x"),
            GitRefKind::Branch("release/1.x".to_string())
        );
        assert_eq!(GitRefKind::classify("refs/heads/"), GitRefKind::Other);
        assert_eq!(GitRefKind::classify("4f2a9c1"), GitRefKind::Other);
    }

    #[test]
    fn test_branch_filter_only_for_branches() {
        assert_eq!(
            GitRefKind::classify("refs/heads/main").branch_filter(),
            Some("main")
        );
        assert_eq!(GitRefKind::classify("refs/tags/v1").branch_filter(), None);
        assert_eq!(GitRefKind::classify("main").branch_filter(), None);
    }
}
