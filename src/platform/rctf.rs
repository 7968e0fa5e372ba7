//! rCTF client
//!
//! rCTF exchanges a team token for a bearer auth token. Every API response
//! is wrapped in a `{kind, message, data}` envelope; errors are signalled by
//! `kind` rather than by HTTP status alone.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::download;
use super::{http_client, FlagVerdict, PlatformClient, PlatformKind, RemoteChallenge};
use crate::error::{WorkspaceError, WorkspaceResult};
use crate::models::{Attachment, Credentials};

pub struct RctfClient {
    base_url: String,
    http: reqwest::Client,
    auth_token: RwLock<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    kind: String,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    team_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginData {
    auth_token: String,
}

#[derive(Debug, Deserialize)]
struct Chall {
    id: String,
    name: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    points: Option<u32>,
    #[serde(default)]
    files: Vec<ChallFile>,
}

#[derive(Debug, Deserialize)]
struct ChallFile {
    name: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct UserData {
    #[serde(default)]
    solves: Vec<Solve>,
}

#[derive(Debug, Deserialize)]
struct Solve {
    id: String,
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    flag: &'a str,
}

impl RctfClient {
    pub fn new(base_url: &str) -> WorkspaceResult<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: http_client()?,
            auth_token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn bearer(&self) -> WorkspaceResult<String> {
        self.auth_token
            .read()
            .await
            .clone()
            .ok_or_else(|| WorkspaceError::AuthFailed("not logged in to rCTF".to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, expected: &str) -> WorkspaceResult<T> {
        let token = self.bearer().await?;
        let response = self.http.get(self.url(path)).bearer_auth(token).send().await?;
        let body: Envelope<T> = response
            .json()
            .await
            .map_err(|e| WorkspaceError::Remote(format!("invalid response from {}: {}", path, e)))?;
        expect_kind(body, expected)
    }

    async fn solved_ids(&self) -> WorkspaceResult<HashSet<String>> {
        let me: UserData = self.get("/api/v1/users/me", "goodUserData").await?;
        Ok(me.solves.into_iter().map(|s| s.id).collect())
    }
}

fn expect_kind<T>(body: Envelope<T>, expected: &str) -> WorkspaceResult<T> {
    if body.kind != expected {
        let message = body.message.unwrap_or_else(|| body.kind.clone());
        return Err(match body.kind.as_str() {
            "badToken" | "badTokenVerification" | "badUnknownUser" | "badBearer" => {
                WorkspaceError::AuthFailed(message)
            }
            _ => WorkspaceError::Remote(message),
        });
    }
    body.data
        .ok_or_else(|| WorkspaceError::Remote(format!("{} response has no data", expected)))
}

impl Chall {
    fn into_remote(self, solved: &HashSet<String>) -> RemoteChallenge {
        RemoteChallenge {
            solved: solved.contains(&self.id),
            id: self.id,
            name: self.name,
            category: self.category,
            description: self.description.filter(|d| !d.trim().is_empty()),
            points: self.points,
            attachments: self
                .files
                .into_iter()
                .map(|f| Attachment {
                    name: f.name,
                    url: f.url,
                })
                .collect(),
            hints: Vec::new(),
            author: self.author.filter(|a| !a.trim().is_empty()),
        }
    }
}

#[async_trait]
impl PlatformClient for RctfClient {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Rctf
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn login(&self, credentials: &Credentials) -> WorkspaceResult<()> {
        let Credentials::Token(team_token) = credentials else {
            return Err(WorkspaceError::AuthFailed(
                "rCTF requires a team token".to_string(),
            ));
        };

        let response = self
            .http
            .post(self.url("/api/v1/auth/login"))
            .json(&LoginRequest { team_token })
            .send()
            .await?;
        let body: Envelope<LoginData> = response.json().await?;
        let data = expect_kind(body, "goodLogin")?;

        *self.auth_token.write().await = Some(data.auth_token);
        info!(url = %self.base_url, "Logged in to rCTF");
        Ok(())
    }

    async fn list_challenges(&self) -> WorkspaceResult<Vec<RemoteChallenge>> {
        let challs: Vec<Chall> = self.get("/api/v1/challs", "goodChallenges").await?;
        let solved = self.solved_ids().await?;
        debug!(count = challs.len(), solved = solved.len(), "Fetched rCTF challenges");
        Ok(challs.into_iter().map(|c| c.into_remote(&solved)).collect())
    }

    async fn download_attachment(
        &self,
        attachment: &Attachment,
        dest_dir: &Path,
    ) -> WorkspaceResult<PathBuf> {
        // File URLs usually point at a separate bucket and need no auth
        let url = download::resolve_url(&self.base_url, &attachment.url)?;
        download::save(self.http.get(url), attachment, dest_dir).await
    }

    async fn submit_flag(&self, challenge_id: &str, flag: &str) -> WorkspaceResult<FlagVerdict> {
        let token = self.bearer().await?;
        let response = self
            .http
            .post(self.url(&format!("/api/v1/challs/{}/submit", challenge_id)))
            .bearer_auth(token)
            .json(&SubmitRequest { flag })
            .send()
            .await?;
        let body: Envelope<serde_json::Value> = response.json().await?;

        match body.kind.as_str() {
            "goodFlag" => Ok(FlagVerdict::Correct),
            "badFlag" => Ok(FlagVerdict::Incorrect),
            "badAlreadySolvedChallenge" => Ok(FlagVerdict::AlreadySolved),
            _ => expect_kind(body, "goodFlag").map(|_| FlagVerdict::Correct),
        }
    }
}
