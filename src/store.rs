//! Config store: whole-file persistence of the workspace snapshot
//!
//! The store is a single JSON file. Every command loads it once, mutates the
//! in-memory [`Snapshot`] and writes the whole thing back. Writes go to a
//! temporary file in the same directory that is then renamed over the
//! original, so a crash never leaves a truncated config behind.
//!
//! There is no locking. Two invocations racing on the same file will lose
//! one of the writes; the tool assumes a single user running one command at
//! a time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{WorkspaceError, WorkspaceResult};
use crate::guard;
use crate::models::{Challenge, Ctf};

const CONFIG_DIR_NAME: &str = "ctfw";
const CONFIG_FILE_NAME: &str = "config.json";

/// Everything the config file holds
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub ctfs: Vec<Ctf>,
    #[serde(default)]
    pub challenges: Vec<Challenge>,
    #[serde(default)]
    pub challenge_tags: BTreeSet<String>,
    pub ctfs_path: PathBuf,
}

impl Snapshot {
    pub fn new(ctfs_path: impl Into<PathBuf>) -> Self {
        Self {
            ctfs_path: ctfs_path.into(),
            ..Default::default()
        }
    }

    /// Directory a new CTF with this name would live in
    pub fn ctf_path_for(&self, name: &str) -> PathBuf {
        self.ctfs_path.join(name)
    }

    pub fn ctf(&self, id: &Uuid) -> Option<&Ctf> {
        self.ctfs.iter().find(|c| &c.id == id)
    }

    pub fn ctf_mut(&mut self, id: &Uuid) -> Option<&mut Ctf> {
        self.ctfs.iter_mut().find(|c| &c.id == id)
    }

    pub fn ctf_by_name(&self, name: &str) -> Option<&Ctf> {
        self.ctfs.iter().find(|c| c.name == name)
    }

    pub fn challenge(&self, id: &Uuid) -> Option<&Challenge> {
        self.challenges.iter().find(|c| &c.id == id)
    }

    pub fn challenge_mut(&mut self, id: &Uuid) -> Option<&mut Challenge> {
        self.challenges.iter_mut().find(|c| &c.id == id)
    }

    pub fn challenges_of<'a>(&'a self, ctf_id: &'a Uuid) -> impl Iterator<Item = &'a Challenge> + 'a {
        self.challenges.iter().filter(move |c| &c.ctf_id == ctf_id)
    }

    /// Insert a CTF after the uniqueness checks pass
    pub fn insert_ctf(&mut self, ctf: Ctf) -> WorkspaceResult<&Ctf> {
        guard::check_new_ctf(&self.ctfs, &ctf.name, &ctf.path)?;
        self.ctfs.push(ctf);
        Ok(&self.ctfs[self.ctfs.len() - 1])
    }

    /// Insert a challenge into an existing CTF after the uniqueness checks pass
    pub fn insert_challenge(&mut self, challenge: Challenge) -> WorkspaceResult<&Challenge> {
        let ctf = self
            .ctf(&challenge.ctf_id)
            .ok_or_else(|| WorkspaceError::CtfNotFound(challenge.ctf_id.to_string()))?;
        guard::check_new_challenge(&self.challenges, ctf, &challenge)?;

        if let Some(tags) = &challenge.tags {
            guard::merge_tags(&mut self.challenge_tags, tags);
        }
        self.challenges.push(challenge);
        Ok(&self.challenges[self.challenges.len() - 1])
    }

    /// Remove a CTF together with every challenge it owns
    pub fn remove_ctf(&mut self, id: &Uuid) -> WorkspaceResult<(Ctf, Vec<Challenge>)> {
        let index = self
            .ctfs
            .iter()
            .position(|c| &c.id == id)
            .ok_or_else(|| WorkspaceError::CtfNotFound(id.to_string()))?;
        let ctf = self.ctfs.remove(index);

        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.challenges)
            .into_iter()
            .partition(|c| c.ctf_id == ctf.id);
        self.challenges = kept;

        debug!(ctf = %ctf.name, challenges = removed.len(), "CTF removed from snapshot");
        Ok((ctf, removed))
    }

    pub fn remove_challenge(&mut self, id: &Uuid) -> WorkspaceResult<Challenge> {
        let index = self
            .challenges
            .iter()
            .position(|c| &c.id == id)
            .ok_or_else(|| WorkspaceError::ChallengeNotFound(id.to_string()))?;
        Ok(self.challenges.remove(index))
    }

    /// Union tags into the shared vocabulary
    pub fn add_tags<'a, I>(&mut self, tags: I) -> usize
    where
        I: IntoIterator<Item = &'a String>,
    {
        guard::merge_tags(&mut self.challenge_tags, tags)
    }
}

/// Handle on the config file
#[derive(Clone, Debug)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Open the store at `explicit`, or at the per-user default location
    pub fn locate(explicit: Option<PathBuf>) -> WorkspaceResult<Self> {
        match explicit {
            Some(path) => Ok(Self::new(path)),
            None => Ok(Self::new(Self::default_path()?)),
        }
    }

    /// `<config dir>/ctfw/config.json`
    pub fn default_path() -> WorkspaceResult<PathBuf> {
        let base = dirs::config_dir().ok_or_else(|| {
            WorkspaceError::Io(std::io::Error::other("could not determine config directory"))
        })?;
        Ok(base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Create the config with an empty snapshot rooted at `ctfs_path`
    pub fn init(&self, ctfs_path: &Path) -> WorkspaceResult<Snapshot> {
        if self.exists() {
            return Err(WorkspaceError::AlreadyInitialized(self.path.clone()));
        }

        std::fs::create_dir_all(ctfs_path)?;
        let ctfs_path = ctfs_path.canonicalize()?;
        let snapshot = Snapshot::new(ctfs_path);
        self.save(&snapshot)?;

        info!(
            config = %self.path.display(),
            ctfs_path = %snapshot.ctfs_path.display(),
            "Workspace initialized"
        );
        Ok(snapshot)
    }

    pub fn load(&self) -> WorkspaceResult<Snapshot> {
        if !self.exists() {
            return Err(WorkspaceError::NotInitialized(self.path.clone()));
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let snapshot: Snapshot = serde_json::from_str(&contents)?;
        debug!(
            config = %self.path.display(),
            ctfs = snapshot.ctfs.len(),
            challenges = snapshot.challenges.len(),
            "Config loaded"
        );
        Ok(snapshot)
    }

    /// Atomically replace the config file with `snapshot`
    pub fn save(&self, snapshot: &Snapshot) -> WorkspaceResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
        temp.write_all(&bytes)?;
        temp.as_file().sync_all()?;

        // The file stores platform passwords and tokens
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }

        temp.persist(&self.path).map_err(|err| err.error)?;
        debug!(config = %self.path.display(), size = bytes.len(), "Config saved");
        Ok(())
    }

    /// Delete the config file
    pub fn remove(&self) -> WorkspaceResult<()> {
        if !self.exists() {
            return Err(WorkspaceError::NotInitialized(self.path.clone()));
        }
        std::fs::remove_file(&self.path)?;
        info!(config = %self.path.display(), "Config removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        normalize_tags, Attachment, Category, ChallengeExtras, Credentials, RunState, Solved,
    };
    use tempfile::tempdir;

    fn sample_snapshot(root: &Path) -> Snapshot {
        let mut snapshot = Snapshot::new(root);
        let defcon = Ctf::new("defcon", root.join("defcon"));
        let remote = Ctf::new("hxp", root.join("hxp")).with_remote(
            "https://ctf.example.com",
            &Credentials::Token("team-token".to_string()),
            crate::platform::PlatformKind::Ctfd,
        );

        let mut solved = Challenge::new(&defcon, "heap-1", Category::Pwn);
        solved.solved = Solved::Solved;
        solved.flag = Some("flag{heap}".to_string());
        solved.points = Some(500);
        solved.tags = Some(normalize_tags(["heap", "uaf"]));

        let mut imported = Challenge::new(&remote, "baby-crypto", Category::Crypto);
        imported.remote_id = Some("17".to_string());
        imported.extras = Some(ChallengeExtras {
            description: Some("xor all the things".to_string()),
            attachments: vec![Attachment {
                name: "out.txt".to_string(),
                url: "/files/abc/out.txt".to_string(),
            }],
            hints: vec!["think about keys".to_string()],
            author: Some("alice".to_string()),
        });

        snapshot.insert_ctf(defcon).unwrap();
        snapshot.insert_ctf(remote).unwrap();
        snapshot.insert_challenge(solved).unwrap();
        snapshot.insert_challenge(imported).unwrap();
        snapshot.ctfs[1].running = RunState::Stopped;
        snapshot
    }

    #[test]
    fn test_load_missing_file_is_not_initialized() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));
        assert!(matches!(store.load(), Err(WorkspaceError::NotInitialized(_))));
    }

    #[test]
    fn test_init_creates_config_and_ctfs_dir() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("cfg").join("config.json"));
        let ctfs = dir.path().join("ctfs");

        let snapshot = store.init(&ctfs).unwrap();
        assert!(ctfs.is_dir());
        assert!(snapshot.ctfs_path.is_absolute());
        assert_eq!(store.load().unwrap(), snapshot);

        assert!(matches!(
            store.init(&ctfs),
            Err(WorkspaceError::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn test_snapshot_roundtrip_preserves_everything() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));
        let snapshot = sample_snapshot(dir.path());

        store.save(&snapshot).unwrap();
        let reloaded = store.load().unwrap();
        assert_eq!(reloaded, snapshot);

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"challenge_tags\""));
        assert!(raw.contains("\"ctfs_path\""));
        assert!(raw.contains("\"stopped\""));
        assert!(raw.contains("\"crypto\""));
    }

    #[test]
    fn test_save_replaces_whole_file() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));
        store.save(&sample_snapshot(dir.path())).unwrap();

        let empty = Snapshot::new(dir.path());
        store.save(&empty).unwrap();
        assert_eq!(store.load().unwrap(), empty);

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path() != store.path())
            .collect();
        assert!(leftovers.is_empty(), "temporary files left behind");
    }

    #[cfg(unix)]
    #[test]
    fn test_config_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));
        store.save(&Snapshot::new(dir.path())).unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_remove_ctf_cascades() {
        let dir = tempdir().unwrap();
        let mut snapshot = sample_snapshot(dir.path());
        let defcon_id = snapshot.ctf_by_name("defcon").unwrap().id;

        let (ctf, removed) = snapshot.remove_ctf(&defcon_id).unwrap();
        assert_eq!(ctf.name, "defcon");
        assert_eq!(removed.len(), 1);
        assert!(snapshot.challenges.iter().all(|c| c.ctf_id != defcon_id));
        assert_eq!(snapshot.challenges.len(), 1);

        // Vocabulary is never shrunk by removals
        assert!(snapshot.challenge_tags.contains("heap"));
    }

    #[test]
    fn test_insert_challenge_requires_existing_ctf() {
        let orphan_owner = Ctf::new("ghost", "/nowhere/ghost");
        let mut snapshot = Snapshot::new("/nowhere");
        let result = snapshot.insert_challenge(Challenge::new(&orphan_owner, "a", Category::Pwn));
        assert!(matches!(result, Err(WorkspaceError::CtfNotFound(_))));
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let raw = r#"{
            "ctfs": [{
                "id": "6f1c1b8e-3a55-4c8e-9d55-2f0f8a7b2e10",
                "name": "defcon",
                "created_at": "2026-08-01T10:00:00Z",
                "path": "/ws/defcon"
            }],
            "challenges": [],
            "ctfs_path": "/ws"
        }"#;
        let snapshot: Snapshot = serde_json::from_str(raw).unwrap();
        assert_eq!(snapshot.ctfs[0].running, RunState::Running);
        assert!(snapshot.challenge_tags.is_empty());
    }
}
