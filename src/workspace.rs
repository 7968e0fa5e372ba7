//! Workspace operations: guarded mutations plus their filesystem effects
//!
//! A [`Workspace`] holds one loaded snapshot. Operations mutate it in memory
//! and create directories as they go; nothing reaches the config file until
//! [`Workspace::commit`]. Directory removals are deferred until after the
//! config has been saved, so a failed command never deletes files for
//! records that are still persisted.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use crate::context;
use crate::error::{WorkspaceError, WorkspaceResult};
use crate::guard;
use crate::models::{normalize_tags, Category, Challenge, Credentials, Ctf, RunState, Solved};
use crate::platform::PlatformKind;
use crate::store::{ConfigStore, Snapshot};
use crate::templates;

pub struct Workspace {
    store: ConfigStore,
    snapshot: Snapshot,
    pending_removals: Vec<PathBuf>,
}

impl Workspace {
    /// Load the snapshot from `store`
    pub fn open(store: ConfigStore) -> WorkspaceResult<Self> {
        let snapshot = store.load()?;
        Ok(Self::from_parts(store, snapshot))
    }

    pub fn from_parts(store: ConfigStore, snapshot: Snapshot) -> Self {
        Self {
            store,
            snapshot,
            pending_removals: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub(crate) fn snapshot_mut(&mut self) -> &mut Snapshot {
        &mut self.snapshot
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    // ==================== Lookups ====================

    pub fn ctf(&self, id: &Uuid) -> WorkspaceResult<&Ctf> {
        self.snapshot
            .ctf(id)
            .ok_or_else(|| WorkspaceError::CtfNotFound(id.to_string()))
    }

    pub fn ctf_by_name(&self, name: &str) -> WorkspaceResult<&Ctf> {
        self.snapshot
            .ctf_by_name(name)
            .ok_or_else(|| WorkspaceError::CtfNotFound(name.to_string()))
    }

    pub fn challenge(&self, id: &Uuid) -> WorkspaceResult<&Challenge> {
        self.snapshot
            .challenge(id)
            .ok_or_else(|| WorkspaceError::ChallengeNotFound(id.to_string()))
    }

    /// Find a challenge by name, optionally restricted to one CTF
    pub fn challenge_by_name(&self, name: &str, ctf_id: Option<&Uuid>) -> WorkspaceResult<&Challenge> {
        self.snapshot
            .challenges
            .iter()
            .find(|c| c.name == name && ctf_id.map_or(true, |id| &c.ctf_id == id))
            .ok_or_else(|| WorkspaceError::ChallengeNotFound(name.to_string()))
    }

    pub fn challenges_of<'a>(&'a self, ctf_id: &'a Uuid) -> impl Iterator<Item = &'a Challenge> + 'a {
        self.snapshot.challenges_of(ctf_id)
    }

    pub fn current_ctf(&self, cwd: &Path) -> Option<&Ctf> {
        context::current_ctf(&self.snapshot.ctfs, cwd)
    }

    pub fn current_challenge(&self, cwd: &Path) -> Option<&Challenge> {
        context::current_challenge(&self.snapshot.ctfs, &self.snapshot.challenges, cwd)
    }

    // ==================== CTFs ====================

    /// Validate a prospective CTF name and return the directory it would get
    pub fn check_new_ctf(&self, name: &str) -> WorkspaceResult<PathBuf> {
        let path = self.snapshot.ctf_path_for(name);
        guard::check_new_ctf(&self.snapshot.ctfs, name, &path)?;
        Ok(path)
    }

    /// Create a local CTF and its directory
    pub fn add_ctf(&mut self, name: &str) -> WorkspaceResult<Ctf> {
        let path = self.check_new_ctf(name)?;
        self.create_ctf(Ctf::new(name, path))
    }

    /// Create a CTF that remembers where and how to reach its platform
    pub fn insert_remote_ctf(
        &mut self,
        name: &str,
        url: &str,
        credentials: &Credentials,
        platform: PlatformKind,
    ) -> WorkspaceResult<Ctf> {
        let path = self.check_new_ctf(name)?;
        self.create_ctf(Ctf::new(name, path).with_remote(url, credentials, platform))
    }

    /// Remember which platform a CTF runs on. Returns whether it changed.
    pub fn set_platform(&mut self, id: &Uuid, platform: PlatformKind) -> WorkspaceResult<bool> {
        let ctf = self
            .snapshot
            .ctf_mut(id)
            .ok_or_else(|| WorkspaceError::CtfNotFound(id.to_string()))?;
        if ctf.platform == Some(platform) {
            return Ok(false);
        }
        ctf.platform = Some(platform);
        info!(ctf = %ctf.name, platform = %platform, "CTF platform recorded");
        Ok(true)
    }

    fn create_ctf(&mut self, ctf: Ctf) -> WorkspaceResult<Ctf> {
        std::fs::create_dir_all(&ctf.path)?;
        let ctf = self.snapshot.insert_ctf(ctf)?.clone();
        info!(ctf = %ctf.name, path = %ctf.path.display(), "CTF added");
        Ok(ctf)
    }

    /// Drop a CTF added earlier in this session, before any commit.
    /// Its directory tree is deleted right away unless `keep_dir` is set,
    /// in which case nothing on disk is touched.
    pub(crate) fn discard_ctf(&mut self, id: &Uuid, keep_dir: bool) -> WorkspaceResult<()> {
        let (ctf, challenges) = self.snapshot.remove_ctf(id)?;
        warn!(ctf = %ctf.name, challenges = challenges.len(), "Discarding uncommitted CTF");
        if !keep_dir {
            remove_dirs(&[ctf.path])?;
        }
        Ok(())
    }

    /// Remove a CTF and all of its challenges. Its directory is deleted on commit.
    pub fn remove_ctf(&mut self, id: &Uuid) -> WorkspaceResult<(Ctf, Vec<Challenge>)> {
        let (ctf, challenges) = self.snapshot.remove_ctf(id)?;
        self.pending_removals
            .extend(challenges.iter().map(|c| c.path.clone()));
        self.pending_removals.push(ctf.path.clone());
        info!(ctf = %ctf.name, challenges = challenges.len(), "CTF removed");
        Ok((ctf, challenges))
    }

    /// Start or stop a CTF. Returns whether the state changed.
    pub fn set_running(&mut self, id: &Uuid, state: RunState) -> WorkspaceResult<bool> {
        let ctf = self
            .snapshot
            .ctf_mut(id)
            .ok_or_else(|| WorkspaceError::CtfNotFound(id.to_string()))?;
        if ctf.running == state {
            return Ok(false);
        }
        ctf.running = state;
        info!(ctf = %ctf.name, state = state.as_str(), "CTF state changed");
        Ok(true)
    }

    // ==================== Challenges ====================

    /// Create a local challenge under its CTF's directory and scaffold it
    pub fn add_challenge(
        &mut self,
        ctf_id: &Uuid,
        name: &str,
        category: Category,
    ) -> WorkspaceResult<Challenge> {
        let ctf = self.ctf(ctf_id)?;
        let challenge = Challenge::new(ctf, name, category);
        self.import_challenge(challenge)
    }

    /// Insert a fully built challenge: guard, create directory, scaffold
    pub fn import_challenge(&mut self, challenge: Challenge) -> WorkspaceResult<Challenge> {
        let ctf = self.ctf(&challenge.ctf_id)?;
        guard::check_new_challenge(&self.snapshot.challenges, ctf, &challenge)?;

        std::fs::create_dir_all(&challenge.path)?;
        templates::dispatch(&challenge)?;

        let challenge = self.snapshot.insert_challenge(challenge)?.clone();
        info!(
            challenge = %challenge.name,
            category = %challenge.category,
            path = %challenge.path.display(),
            "Challenge added"
        );
        Ok(challenge)
    }

    /// Remove a challenge. A non-empty directory is only removed when the
    /// caller has confirmed it via `allow_non_empty`.
    pub fn remove_challenge(&mut self, id: &Uuid, allow_non_empty: bool) -> WorkspaceResult<Challenge> {
        let path = self.challenge(id)?.path.clone();
        if !allow_non_empty && dir_has_entries(&path) {
            return Err(WorkspaceError::DirectoryNotEmpty(path));
        }

        let challenge = self.snapshot.remove_challenge(id)?;
        self.pending_removals.push(challenge.path.clone());
        info!(challenge = %challenge.name, "Challenge removed");
        Ok(challenge)
    }

    /// Mark a challenge solved, record its flag and merge its tags into both
    /// the challenge and the shared vocabulary
    pub fn solve_challenge(
        &mut self,
        id: &Uuid,
        flag: Option<String>,
        tags: &[String],
    ) -> WorkspaceResult<Challenge> {
        let tags = normalize_tags(tags);
        let challenge = self
            .snapshot
            .challenge_mut(id)
            .ok_or_else(|| WorkspaceError::ChallengeNotFound(id.to_string()))?;

        challenge.solved = Solved::Solved;
        if let Some(flag) = flag.filter(|f| !f.trim().is_empty()) {
            challenge.flag = Some(flag.trim().to_string());
        }
        if !tags.is_empty() {
            challenge
                .tags
                .get_or_insert_with(BTreeSet::new)
                .extend(tags.iter().cloned());
        }
        let solved = challenge.clone();

        let added = self.snapshot.add_tags(&tags);
        info!(challenge = %solved.name, new_tags = added, "Challenge solved");
        Ok(solved)
    }

    // ==================== Persistence ====================

    /// Persist the snapshot, then delete directories of removed entities
    pub fn commit(self) -> WorkspaceResult<()> {
        self.store.save(&self.snapshot)?;
        remove_dirs(&self.pending_removals)?;
        Ok(())
    }
}

/// Delete the config file and, optionally, every CTF directory it tracks.
/// Returns the number of directories removed. The config is removed before
/// any directory.
pub fn reset(store: &ConfigStore, delete_files: bool) -> WorkspaceResult<usize> {
    let snapshot = store.load()?;
    store.remove()?;

    let removed = if delete_files {
        let paths: Vec<PathBuf> = snapshot.ctfs.into_iter().map(|c| c.path).collect();
        remove_dirs(&paths)?
    } else {
        0
    };

    info!(directories = removed, "Workspace reset");
    Ok(removed)
}

/// Remove every existing directory in `paths`, continuing past failures.
/// Returns the number removed, or the first error.
fn remove_dirs(paths: &[PathBuf]) -> WorkspaceResult<usize> {
    let mut removed = 0;
    let mut first_error = None;
    for path in paths {
        if !path.exists() {
            continue;
        }
        match std::fs::remove_dir_all(path) {
            Ok(()) => removed += 1,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Failed to remove directory");
                first_error.get_or_insert(err);
            }
        }
    }

    match first_error {
        Some(err) => Err(err.into()),
        None => Ok(removed),
    }
}

fn dir_has_entries(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}
