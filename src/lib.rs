//! CTF workspace manager
//!
//! Keeps a directory tree of CTF events and their challenges in sync with a
//! single JSON config file, and imports challenges from remote CTF platforms.
//!
//! ## Module Structure
//!
//! - `models`: CTF, Challenge and their enumerations
//! - `store`: config file load and atomic save
//! - `context`: current CTF/challenge from the working directory
//! - `guard`: uniqueness checks and tag vocabulary merging
//! - `workspace`: guarded mutations with their filesystem effects
//! - `templates`: category scaffolds for new challenges
//! - `platform`: CTFd and rCTF clients
//! - `sync`: remote import and re-sync

/// Error types
pub mod error;

/// Entity model
pub mod models;

/// Config file persistence
pub mod store;

/// Working-directory context resolution
pub mod context;

/// Invariant checks
pub mod guard;

/// Workspace operations
pub mod workspace;

/// Challenge scaffolds
pub mod templates;

/// Remote platform clients
pub mod platform;

/// Remote challenge import
pub mod sync;

pub use error::{WorkspaceError, WorkspaceResult};
pub use models::{
    Attachment, Category, Challenge, ChallengeExtras, Credentials, Ctf, RunState, Solved,
};
pub use platform::{
    ClientResolver, FlagVerdict, HttpResolver, PlatformClient, PlatformKind, RemoteChallenge,
};
pub use store::{ConfigStore, Snapshot};
pub use sync::{SyncEngine, SyncReport};
pub use workspace::Workspace;
