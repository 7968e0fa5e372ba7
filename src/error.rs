//! Error types for the workspace engine

use std::path::PathBuf;
use thiserror::Error;

/// Result type for workspace operations
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// Errors that can occur while managing the workspace
#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("Config file {} does not exist, run `ctfw init` first", .0.display())]
    NotInitialized(PathBuf),

    #[error("Config file {} already exists", .0.display())]
    AlreadyInitialized(PathBuf),

    #[error("CTF '{name}' or path '{}' already exists", path.display())]
    DuplicateCtf { name: String, path: PathBuf },

    #[error("Challenge '{name}' already exists in CTF '{ctf}'")]
    DuplicateChallenge { name: String, ctf: String },

    #[error("Path '{}' overlaps the directory of CTF '{existing}'", path.display())]
    PathConflict { path: PathBuf, existing: String },

    #[error("Invalid name '{0}'")]
    InvalidName(String),

    #[error("CTF not found: {0}")]
    CtfNotFound(String),

    #[error("Challenge not found: {0}")]
    ChallengeNotFound(String),

    #[error("Directory '{}' is not empty", .0.display())]
    DirectoryNotEmpty(PathBuf),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("No platform client available for {url}: {reason}")]
    ClientUnavailable { url: String, reason: String },

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Failed to download attachment '{name}': {reason}")]
    AttachmentDownloadFailed { name: String, reason: String },

    #[error("Remote platform error: {0}")]
    Remote(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for WorkspaceError {
    fn from(err: reqwest::Error) -> Self {
        WorkspaceError::Remote(err.to_string())
    }
}

impl WorkspaceError {
    /// Whether this error is a uniqueness violation that a batch import may skip
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            WorkspaceError::DuplicateCtf { .. } | WorkspaceError::DuplicateChallenge { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_error_display_all_variants() {
        let test_cases = vec![
            (
                WorkspaceError::NotInitialized(PathBuf::from("/cfg/config.json")),
                "Config file /cfg/config.json does not exist, run `ctfw init` first",
            ),
            (
                WorkspaceError::DuplicateCtf {
                    name: "defcon".to_string(),
                    path: PathBuf::from("/ws/defcon"),
                },
                "CTF 'defcon' or path '/ws/defcon' already exists",
            ),
            (
                WorkspaceError::DuplicateChallenge {
                    name: "baby-pwn".to_string(),
                    ctf: "defcon".to_string(),
                },
                "Challenge 'baby-pwn' already exists in CTF 'defcon'",
            ),
            (
                WorkspaceError::PathConflict {
                    path: PathBuf::from("/ws/defcon/inner"),
                    existing: "defcon".to_string(),
                },
                "Path '/ws/defcon/inner' overlaps the directory of CTF 'defcon'",
            ),
            (
                WorkspaceError::AuthFailed("bad token".to_string()),
                "Authentication failed: bad token",
            ),
            (
                WorkspaceError::AttachmentDownloadFailed {
                    name: "chall.tar.gz".to_string(),
                    reason: "404".to_string(),
                },
                "Failed to download attachment 'chall.tar.gz': 404",
            ),
        ];

        for (error, expected_message) in test_cases {
            assert_eq!(
                error.to_string(),
                expected_message,
                "Display mismatch for {:?}",
                error
            );
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: WorkspaceError = io_err.into();

        match err {
            WorkspaceError::Io(inner) => assert_eq!(inner.kind(), ErrorKind::NotFound),
            other => panic!("Expected Io variant, got: {:?}", other),
        }
    }

    #[test]
    fn test_from_serde_json_error() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{ invalid json }").unwrap_err();
        let err: WorkspaceError = serde_err.into();
        assert!(matches!(err, WorkspaceError::Serialization(_)));
    }

    #[test]
    fn test_is_duplicate() {
        assert!(WorkspaceError::DuplicateChallenge {
            name: "a".to_string(),
            ctf: "b".to_string(),
        }
        .is_duplicate());
        assert!(!WorkspaceError::AuthFailed("nope".to_string()).is_duplicate());
    }
}
