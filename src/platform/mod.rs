//! Remote CTF platforms
//!
//! A [`PlatformClient`] speaks one platform's API. A [`ClientResolver`] turns
//! a URL into a client, either from an explicit [`PlatformKind`] hint or by
//! probing well-known endpoints.

pub mod ctfd;
pub mod download;
pub mod rctf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{WorkspaceError, WorkspaceResult};
use crate::models::{Attachment, Credentials};

pub use ctfd::CtfdClient;
pub use rctf::RctfClient;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// A challenge as reported by a platform, before local normalization
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteChallenge {
    pub id: String,
    pub name: String,
    /// Free-text category, mapped onto [`crate::models::Category`] on import
    pub category: String,
    pub description: Option<String>,
    pub points: Option<u32>,
    pub solved: bool,
    pub attachments: Vec<Attachment>,
    pub hints: Vec<String>,
    pub author: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlagVerdict {
    Correct,
    Incorrect,
    AlreadySolved,
}

impl FlagVerdict {
    /// Whether the challenge may be marked solved locally
    pub fn accepted(&self) -> bool {
        !matches!(self, FlagVerdict::Incorrect)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    Ctfd,
    Rctf,
}

impl PlatformKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformKind::Ctfd => "ctfd",
            PlatformKind::Rctf => "rctf",
        }
    }

    /// rCTF authenticates with a team token only
    pub fn uses_team_token(&self) -> bool {
        matches!(self, PlatformKind::Rctf)
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ctfd" => Ok(PlatformKind::Ctfd),
            "rctf" => Ok(PlatformKind::Rctf),
            other => Err(format!("unknown platform '{}' (expected ctfd or rctf)", other)),
        }
    }
}

/// One remote platform session
#[async_trait]
pub trait PlatformClient: Send + Sync {
    fn kind(&self) -> PlatformKind;

    fn base_url(&self) -> &str;

    /// Authenticate. Rejected credentials yield [`WorkspaceError::AuthFailed`].
    async fn login(&self, credentials: &Credentials) -> WorkspaceResult<()>;

    /// Full challenge list in platform order
    async fn list_challenges(&self) -> WorkspaceResult<Vec<RemoteChallenge>>;

    /// Download one attachment into `dest_dir`, returning the file path.
    /// An existing file is left untouched.
    async fn download_attachment(
        &self,
        attachment: &Attachment,
        dest_dir: &Path,
    ) -> WorkspaceResult<PathBuf>;

    async fn submit_flag(&self, challenge_id: &str, flag: &str) -> WorkspaceResult<FlagVerdict>;
}

/// Turns a platform URL into a client
#[async_trait]
pub trait ClientResolver: Send + Sync {
    async fn resolve(
        &self,
        url: &str,
        hint: Option<PlatformKind>,
    ) -> WorkspaceResult<Box<dyn PlatformClient>>;
}

/// Resolver that detects the platform over HTTP
pub struct HttpResolver {
    http: reqwest::Client,
}

impl HttpResolver {
    pub fn new() -> WorkspaceResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .user_agent(user_agent())
            .build()?;
        Ok(Self { http })
    }

    /// rCTF answers its API routes with a `kind` envelope
    async fn looks_like_rctf(&self, base: &str) -> bool {
        let url = format!("{}/api/v1/leaderboard/now?limit=1&offset=0", base);
        let Ok(response) = self.http.get(&url).send().await else {
            return false;
        };
        response
            .json::<serde_json::Value>()
            .await
            .map(|body| body.get("kind").and_then(|k| k.as_str()).is_some())
            .unwrap_or(false)
    }

    /// CTFd embeds its CSRF nonce in every rendered page
    async fn looks_like_ctfd(&self, base: &str) -> bool {
        let url = format!("{}/login", base);
        let Ok(response) = self.http.get(&url).send().await else {
            return false;
        };
        if !response.status().is_success() {
            return false;
        }
        response
            .text()
            .await
            .map(|body| body.contains("csrfNonce") || body.contains("CTFd"))
            .unwrap_or(false)
    }

    async fn detect(&self, base: &str) -> WorkspaceResult<PlatformKind> {
        if self.looks_like_rctf(base).await {
            return Ok(PlatformKind::Rctf);
        }
        if self.looks_like_ctfd(base).await {
            return Ok(PlatformKind::Ctfd);
        }
        Err(WorkspaceError::ClientUnavailable {
            url: base.to_string(),
            reason: "no supported platform detected".to_string(),
        })
    }
}

#[async_trait]
impl ClientResolver for HttpResolver {
    async fn resolve(
        &self,
        url: &str,
        hint: Option<PlatformKind>,
    ) -> WorkspaceResult<Box<dyn PlatformClient>> {
        let base = normalize_base_url(url)?;
        let kind = match hint {
            Some(kind) => kind,
            None => self.detect(&base).await?,
        };
        debug!(url = %base, platform = %kind, detected = hint.is_none(), "Resolved platform");

        let client: Box<dyn PlatformClient> = match kind {
            PlatformKind::Ctfd => Box::new(CtfdClient::new(&base)?),
            PlatformKind::Rctf => Box::new(RctfClient::new(&base)?),
        };
        info!(url = %base, platform = %kind, "Platform client ready");
        Ok(client)
    }
}

/// Validate a platform URL and strip trailing slashes
pub fn normalize_base_url(url: &str) -> WorkspaceResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    let parsed = reqwest::Url::parse(trimmed).map_err(|e| WorkspaceError::ClientUnavailable {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(WorkspaceError::ClientUnavailable {
            url: url.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    Ok(trimmed.to_string())
}

/// HTTP client shared by the platform implementations. Keeps cookies for
/// session-based logins.
pub(crate) fn http_client() -> WorkspaceResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .cookie_store(true)
        .user_agent(user_agent())
        .build()?)
}

fn user_agent() -> String {
    format!("ctfw/{}", env!("CARGO_PKG_VERSION"))
}
