//! Uniqueness and consistency checks run before any insert

use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

use crate::error::{WorkspaceError, WorkspaceResult};
use crate::models::{Challenge, Ctf};

/// Reject names that cannot be used as a single directory component
pub fn validate_name(name: &str) -> WorkspaceResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        return Err(WorkspaceError::InvalidName(name.to_string()));
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return Err(WorkspaceError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Check that a new CTF does not reuse a name or path, and does not nest
/// inside (or around) another CTF's directory.
pub fn check_new_ctf(existing: &[Ctf], name: &str, path: &Path) -> WorkspaceResult<()> {
    validate_name(name)?;

    if existing.iter().any(|ctf| ctf.name == name || ctf.path == path) {
        debug!(name, path = %path.display(), "Rejecting duplicate CTF");
        return Err(WorkspaceError::DuplicateCtf {
            name: name.to_string(),
            path: path.to_path_buf(),
        });
    }

    if let Some(ctf) = existing
        .iter()
        .find(|ctf| path.starts_with(&ctf.path) || ctf.path.starts_with(path))
    {
        return Err(WorkspaceError::PathConflict {
            path: path.to_path_buf(),
            existing: ctf.name.clone(),
        });
    }

    Ok(())
}

/// Check that no other challenge of the same CTF already uses this name.
/// Names may repeat across different CTFs.
pub fn check_new_challenge(
    existing: &[Challenge],
    ctf: &Ctf,
    candidate: &Challenge,
) -> WorkspaceResult<()> {
    validate_name(&candidate.name)?;

    let taken = existing
        .iter()
        .any(|c| c.ctf_id == candidate.ctf_id && c.name == candidate.name && c.id != candidate.id);

    if taken {
        debug!(ctf = %ctf.name, name = %candidate.name, "Rejecting duplicate challenge");
        return Err(WorkspaceError::DuplicateChallenge {
            name: candidate.name.clone(),
            ctf: ctf.name.clone(),
        });
    }

    Ok(())
}

/// Merge tags into the vocabulary. Never removes; returns how many were new.
pub fn merge_tags<'a, I>(vocabulary: &mut BTreeSet<String>, tags: I) -> usize
where
    I: IntoIterator<Item = &'a String>,
{
    tags.into_iter()
        .filter(|tag| vocabulary.insert((*tag).clone()))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{normalize_tags, Category};

    #[test]
    fn test_duplicate_ctf_name_with_different_path() {
        let existing = vec![Ctf::new("defcon", "/ws/defcon")];
        let result = check_new_ctf(&existing, "defcon", Path::new("/elsewhere/defcon"));
        assert!(matches!(result, Err(WorkspaceError::DuplicateCtf { .. })));
    }

    #[test]
    fn test_duplicate_ctf_path_with_different_name() {
        let existing = vec![Ctf::new("defcon", "/ws/defcon")];
        let result = check_new_ctf(&existing, "other", Path::new("/ws/defcon"));
        assert!(matches!(result, Err(WorkspaceError::DuplicateCtf { .. })));
    }

    #[test]
    fn test_nested_ctf_is_path_conflict() {
        let existing = vec![Ctf::new("defcon", "/ws/defcon")];

        let inside = check_new_ctf(&existing, "inner", Path::new("/ws/defcon/inner"));
        assert!(matches!(inside, Err(WorkspaceError::PathConflict { .. })));

        let around = check_new_ctf(&existing, "ws", Path::new("/ws"));
        assert!(matches!(around, Err(WorkspaceError::PathConflict { .. })));
    }

    #[test]
    fn test_sibling_with_common_prefix_is_allowed() {
        let existing = vec![Ctf::new("defcon", "/ws/defcon")];
        assert!(check_new_ctf(&existing, "defcon2", Path::new("/ws/defcon2")).is_ok());
    }

    #[test]
    fn test_invalid_names() {
        for name in ["", "  ", ".", "..", "a/b", "a\\b"] {
            assert!(
                matches!(validate_name(name), Err(WorkspaceError::InvalidName(_))),
                "expected {:?} to be rejected",
                name
            );
        }
        assert!(validate_name("baby-pwn").is_ok());
    }

    #[test]
    fn test_challenge_names_unique_per_ctf_only() {
        let defcon = Ctf::new("defcon", "/ws/defcon");
        let hxp = Ctf::new("hxp", "/ws/hxp");
        let existing = vec![Challenge::new(&defcon, "baby-pwn", Category::Pwn)];

        let same_ctf = Challenge::new(&defcon, "baby-pwn", Category::Web);
        assert!(matches!(
            check_new_challenge(&existing, &defcon, &same_ctf),
            Err(WorkspaceError::DuplicateChallenge { .. })
        ));

        let other_ctf = Challenge::new(&hxp, "baby-pwn", Category::Pwn);
        assert!(check_new_challenge(&existing, &hxp, &other_ctf).is_ok());
    }

    #[test]
    fn test_merge_tags_is_monotonic_union() {
        let mut vocabulary = BTreeSet::new();
        assert_eq!(merge_tags(&mut vocabulary, &normalize_tags(["heap"])), 1);
        assert_eq!(merge_tags(&mut vocabulary, &normalize_tags(["heap", "uaf"])), 1);
        assert_eq!(merge_tags(&mut vocabulary, &BTreeSet::new()), 0);

        let expected: BTreeSet<String> = ["heap", "uaf"].iter().map(|s| s.to_string()).collect();
        assert_eq!(vocabulary, expected);
    }
}
