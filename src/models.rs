//! Entity model for CTFs and challenges
//!
//! Plain records plus their enumerations. Enums serialize to stable
//! lowercase names so the config file survives reordering of variants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{WorkspaceError, WorkspaceResult};
use crate::platform::PlatformKind;

/// Challenge discipline
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Pwn,
    Web,
    Rev,
    Crypto,
    Steg,
    Misc,
    Osint,
    Forensics,
    Hardware,
    Mobile,
    Game,
    Blockchain,
    Other,
}

impl Category {
    pub const ALL: [Category; 13] = [
        Category::Pwn,
        Category::Web,
        Category::Rev,
        Category::Crypto,
        Category::Steg,
        Category::Misc,
        Category::Osint,
        Category::Forensics,
        Category::Hardware,
        Category::Mobile,
        Category::Game,
        Category::Blockchain,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Pwn => "pwn",
            Category::Web => "web",
            Category::Rev => "rev",
            Category::Crypto => "crypto",
            Category::Steg => "steg",
            Category::Misc => "misc",
            Category::Osint => "osint",
            Category::Forensics => "forensics",
            Category::Hardware => "hardware",
            Category::Mobile => "mobile",
            Category::Game => "game",
            Category::Blockchain => "blockchain",
            Category::Other => "other",
        }
    }

    /// Map a free-text platform category onto a local one.
    ///
    /// Matching is case-insensitive and accepts the usual spellings platforms
    /// use. Anything unrecognized becomes [`Category::Other`].
    pub fn from_remote(raw: &str) -> Self {
        let normalized = raw
            .trim()
            .to_lowercase()
            .replace(['_', '-'], " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        match normalized.as_str() {
            "pwn" | "pwnable" | "pwnables" | "binary exploitation" | "binary" | "exploitation"
            | "exploit" => Category::Pwn,
            "web" | "web exploitation" | "webapp" => Category::Web,
            "rev" | "re" | "reverse" | "reversing" | "reverse engineering" => Category::Rev,
            "crypto" | "cryptography" => Category::Crypto,
            "steg" | "stego" | "steganography" => Category::Steg,
            "misc" | "miscellaneous" => Category::Misc,
            "osint" => Category::Osint,
            "forensics" | "forensic" | "dfir" => Category::Forensics,
            "hardware" | "hw" => Category::Hardware,
            "mobile" | "android" | "ios" => Category::Mobile,
            "game" | "game hacking" | "gamehacking" => Category::Game,
            "blockchain" | "web3" | "smart contract" | "smart contracts" => Category::Blockchain,
            _ => Category::Other,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == lowered)
            .ok_or_else(|| {
                let names: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
                format!("unknown category '{}', expected one of: {}", s, names.join(", "))
            })
    }
}

/// Whether a challenge has been solved
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Solved {
    #[default]
    Unsolved,
    Solved,
}

impl Solved {
    pub fn as_str(&self) -> &'static str {
        match self {
            Solved::Unsolved => "unsolved",
            Solved::Solved => "solved",
        }
    }
}

impl From<bool> for Solved {
    fn from(solved: bool) -> Self {
        if solved {
            Solved::Solved
        } else {
            Solved::Unsolved
        }
    }
}

/// Whether a CTF is still being played
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Running,
    Stopped,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Running => "running",
            RunState::Stopped => "stopped",
        }
    }
}

/// Platform credentials: exactly one of username+password or token
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credentials {
    Password { username: String, password: String },
    Token(String),
}

impl Credentials {
    /// Build credentials from optional parts, rejecting ambiguous combinations
    pub fn from_parts(
        username: Option<String>,
        password: Option<String>,
        token: Option<String>,
    ) -> WorkspaceResult<Self> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        match (non_empty(username), non_empty(password), non_empty(token)) {
            (None, None, Some(token)) => Ok(Credentials::Token(token)),
            (Some(username), Some(password), None) => {
                Ok(Credentials::Password { username, password })
            }
            (None, None, None) => Err(WorkspaceError::InvalidCredentials(
                "provide either a username and password or a token".to_string(),
            )),
            (_, _, Some(_)) => Err(WorkspaceError::InvalidCredentials(
                "a token cannot be combined with a username or password".to_string(),
            )),
            _ => Err(WorkspaceError::InvalidCredentials(
                "username and password must be given together".to_string(),
            )),
        }
    }
}

/// A CTF event backed by a directory
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ctf {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub path: PathBuf,
    #[serde(default)]
    pub running: RunState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Platform detected on fetch, reused as the hint for later sessions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<PlatformKind>,
}

impl Ctf {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
            path: path.into(),
            running: RunState::Running,
            url: None,
            username: None,
            password: None,
            token: None,
            platform: None,
        }
    }

    pub fn with_remote(
        mut self,
        url: impl Into<String>,
        credentials: &Credentials,
        platform: PlatformKind,
    ) -> Self {
        self.url = Some(url.into());
        self.platform = Some(platform);
        match credentials {
            Credentials::Password { username, password } => {
                self.username = Some(username.clone());
                self.password = Some(password.clone());
            }
            Credentials::Token(token) => self.token = Some(token.clone()),
        }
        self
    }

    pub fn is_running(&self) -> bool {
        self.running == RunState::Running
    }

    /// Stored platform credentials, if this CTF was fetched from a platform
    pub fn credentials(&self) -> Option<Credentials> {
        Credentials::from_parts(self.username.clone(), self.password.clone(), self.token.clone())
            .ok()
    }

    pub fn is_remote(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

/// A downloadable file attached to a remote challenge
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub url: String,
}

/// Metadata carried over from a remote platform
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeExtras {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// A single task inside a CTF
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: Uuid,
    pub ctf_id: Uuid,
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub points: Option<u32>,
    #[serde(default)]
    pub solved: Solved,
    #[serde(default)]
    pub flag: Option<String>,
    #[serde(default)]
    pub tags: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<ChallengeExtras>,
}

impl Challenge {
    /// New unsolved challenge living directly under its CTF's directory
    pub fn new(ctf: &Ctf, name: impl Into<String>, category: Category) -> Self {
        let name = name.into();
        Self {
            id: Uuid::new_v4(),
            ctf_id: ctf.id,
            path: ctf.path.join(&name),
            name,
            category,
            points: None,
            solved: Solved::Unsolved,
            flag: None,
            tags: None,
            remote_id: None,
            extras: None,
        }
    }

    pub fn is_solved(&self) -> bool {
        self.solved == Solved::Solved
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags
            .as_ref()
            .is_some_and(|tags| tags.contains(&tag.to_lowercase()))
    }

    pub fn attachments(&self) -> &[Attachment] {
        self.extras
            .as_ref()
            .map(|e| e.attachments.as_slice())
            .unwrap_or_default()
    }
}

/// Turn a display name into a directory-safe one: whitespace becomes hyphens,
/// everything is lowercased and path separators are neutralized.
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
        .replace(['/', '\\'], "-")
}

/// Trim, lowercase and deduplicate tags, dropping empty ones
pub fn normalize_tags<I, S>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Something that owns a directory in the workspace
pub trait Located {
    fn location(&self) -> &Path;
}

impl Located for Ctf {
    fn location(&self) -> &Path {
        &self.path
    }
}

impl Located for Challenge {
    fn location(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_remote() {
        assert_eq!(Category::from_remote("Pwn"), Category::Pwn);
        assert_eq!(Category::from_remote("Binary Exploitation"), Category::Pwn);
        assert_eq!(Category::from_remote("  REVERSE_ENGINEERING "), Category::Rev);
        assert_eq!(Category::from_remote("Cryptography"), Category::Crypto);
        assert_eq!(Category::from_remote("web"), Category::Web);
        assert_eq!(Category::from_remote("quantum"), Category::Other);
        assert_eq!(Category::from_remote(""), Category::Other);
    }

    #[test]
    fn test_category_from_str_is_strict() {
        assert_eq!("crypto".parse::<Category>().unwrap(), Category::Crypto);
        assert_eq!("PWN".parse::<Category>().unwrap(), Category::Pwn);
        let err = "cryptography".parse::<Category>().unwrap_err();
        assert!(err.contains("unknown category"));
    }

    #[test]
    fn test_enums_serialize_to_names() {
        assert_eq!(serde_json::to_string(&Category::Blockchain).unwrap(), "\"blockchain\"");
        assert_eq!(serde_json::to_string(&Solved::Solved).unwrap(), "\"solved\"");
        assert_eq!(serde_json::to_string(&RunState::Stopped).unwrap(), "\"stopped\"");
        let parsed: Category = serde_json::from_str("\"osint\"").unwrap();
        assert_eq!(parsed, Category::Osint);
    }

    #[test]
    fn test_defaults() {
        let ctf = Ctf::new("defcon", "/ws/defcon");
        assert!(ctf.is_running());
        assert!(!ctf.is_remote());
        assert!(ctf.credentials().is_none());

        let challenge = Challenge::new(&ctf, "baby-pwn", Category::default());
        assert_eq!(challenge.category, Category::Pwn);
        assert_eq!(challenge.solved, Solved::Unsolved);
        assert_eq!(challenge.path, PathBuf::from("/ws/defcon/baby-pwn"));
        assert_eq!(challenge.ctf_id, ctf.id);
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Baby Pwn 1"), "baby-pwn-1");
        assert_eq!(normalize_name("  spaced\tout  "), "spaced-out");
        assert_eq!(normalize_name("../escape"), "..-escape");
    }

    #[test]
    fn test_normalize_tags() {
        let tags = normalize_tags(["Heap", " uaf ", "", "heap"]);
        assert_eq!(tags.into_iter().collect::<Vec<_>>(), vec!["heap", "uaf"]);
    }

    #[test]
    fn test_credentials_from_parts() {
        assert_eq!(
            Credentials::from_parts(None, None, Some("tok".to_string())).unwrap(),
            Credentials::Token("tok".to_string())
        );
        assert!(matches!(
            Credentials::from_parts(Some("u".to_string()), Some("p".to_string()), None).unwrap(),
            Credentials::Password { .. }
        ));
        assert!(Credentials::from_parts(None, None, None).is_err());
        assert!(Credentials::from_parts(Some("u".to_string()), None, None).is_err());
        assert!(Credentials::from_parts(
            Some("u".to_string()),
            Some("p".to_string()),
            Some("t".to_string())
        )
        .is_err());
    }

    #[test]
    fn test_ctf_with_remote_roundtrips_credentials() {
        let creds = Credentials::Password {
            username: "alice".to_string(),
            password: "hunter2".to_string(),
        };
        let ctf = Ctf::new("defcon", "/ws/defcon").with_remote(
            "https://ctf.example.com",
            &creds,
            PlatformKind::Ctfd,
        );
        assert!(ctf.is_remote());
        assert_eq!(ctf.platform, Some(PlatformKind::Ctfd));
        assert_eq!(ctf.credentials(), Some(creds));
        assert!(ctf.token.is_none());
    }

    #[test]
    fn test_challenge_has_tag_is_case_insensitive() {
        let ctf = Ctf::new("defcon", "/ws/defcon");
        let mut challenge = Challenge::new(&ctf, "heap-1", Category::Pwn);
        assert!(!challenge.has_tag("heap"));
        challenge.tags = Some(normalize_tags(["heap"]));
        assert!(challenge.has_tag("HEAP"));
    }
}
