//! CTFd client
//!
//! Supports API tokens (`Authorization: Token ...`) and username/password
//! session logins. Session requests that modify state must carry the CSRF
//! nonce rendered into CTFd's pages.

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::download;
use super::{http_client, FlagVerdict, PlatformClient, PlatformKind, RemoteChallenge};
use crate::error::{WorkspaceError, WorkspaceResult};
use crate::models::{Attachment, Credentials};

/// Challenge details are fetched this many at a time
const DETAIL_CONCURRENCY: usize = 4;

#[derive(Debug, Default)]
enum Session {
    #[default]
    Anonymous,
    Token(String),
    Cookie { nonce: String },
}

pub struct CtfdClient {
    base_url: String,
    http: reqwest::Client,
    session: RwLock<Session>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    #[serde(default)]
    errors: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChallengeSummary {
    id: u64,
    /// `hidden` marks a locked placeholder named `???`
    #[serde(rename = "type", default)]
    kind: String,
}

impl ChallengeSummary {
    fn is_hidden(&self) -> bool {
        self.kind == "hidden"
    }
}

#[derive(Debug, Deserialize)]
struct ChallengeDetail {
    id: u64,
    name: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    value: Option<u32>,
    #[serde(default)]
    solved_by_me: bool,
    #[serde(default)]
    files: Vec<String>,
    #[serde(default)]
    hints: Vec<Hint>,
    #[serde(default)]
    attribution: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Hint {
    /// Absent until the hint is unlocked
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct AttemptRequest<'a> {
    challenge_id: u64,
    submission: &'a str,
}

#[derive(Debug, Deserialize)]
struct AttemptResult {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

fn nonce_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r#"(?:csrfNonce['"]?\s*:\s*"|name="nonce"[^>]*value=")([^"]+)""#).ok()
        })
        .as_ref()
}

/// Pull the CSRF nonce out of a rendered CTFd page
pub fn scrape_nonce(html: &str) -> Option<String> {
    nonce_pattern()?
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

impl CtfdClient {
    pub fn new(base_url: &str) -> WorkspaceResult<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: http_client()?,
            session: RwLock::new(Session::Anonymous),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &*self.session.read().await {
            Session::Token(token) => request.header("Authorization", format!("Token {}", token)),
            Session::Cookie { nonce } => request.header("CSRF-Token", nonce.as_str()),
            Session::Anonymous => request,
        }
    }

    async fn get_data<T: DeserializeOwned>(&self, path: &str) -> WorkspaceResult<T> {
        let request = self.authorize(self.http.get(self.url(path))).await;
        let response = request.send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(WorkspaceError::AuthFailed(format!("{} returned {}", path, status)));
        }
        if !status.is_success() {
            return Err(WorkspaceError::Remote(format!("CTFd returned {} for {}", status, path)));
        }

        let body: Envelope<T> = response
            .json()
            .await
            .map_err(|e| WorkspaceError::Remote(format!("invalid response from {}: {}", path, e)))?;
        unwrap_envelope(body, path)
    }

    async fn login_with_token(&self, token: &str) -> WorkspaceResult<()> {
        *self.session.write().await = Session::Token(token.to_string());

        match self.get_data::<serde_json::Value>("/api/v1/users/me").await {
            Ok(_) => Ok(()),
            Err(err) => {
                *self.session.write().await = Session::Anonymous;
                Err(match err {
                    WorkspaceError::AuthFailed(_) => {
                        WorkspaceError::AuthFailed("token rejected".to_string())
                    }
                    other => other,
                })
            }
        }
    }

    async fn login_with_password(&self, username: &str, password: &str) -> WorkspaceResult<()> {
        let page = self.http.get(self.url("/login")).send().await?.text().await?;
        let nonce = scrape_nonce(&page)
            .ok_or_else(|| WorkspaceError::Remote("login page has no CSRF nonce".to_string()))?;

        let response = self
            .http
            .post(self.url("/login"))
            .form(&[("name", username), ("password", password), ("nonce", nonce.as_str())])
            .send()
            .await?;

        // A failed login re-renders the form instead of redirecting
        if !response.status().is_success() || response.url().path().ends_with("/login") {
            return Err(WorkspaceError::AuthFailed(format!(
                "CTFd rejected credentials for '{}'",
                username
            )));
        }

        // The session is regenerated on login, along with its nonce
        let landing = response.text().await?;
        let nonce = scrape_nonce(&landing).unwrap_or(nonce);
        *self.session.write().await = Session::Cookie { nonce };
        Ok(())
    }

    async fn challenge_detail(&self, id: u64) -> WorkspaceResult<RemoteChallenge> {
        let detail: ChallengeDetail = self.get_data(&format!("/api/v1/challenges/{}", id)).await?;
        Ok(detail.into_remote())
    }
}

impl ChallengeDetail {
    fn into_remote(self) -> RemoteChallenge {
        let attachments = self
            .files
            .into_iter()
            .map(|url| Attachment {
                name: download::name_from_url(&url),
                url,
            })
            .collect();

        RemoteChallenge {
            id: self.id.to_string(),
            name: self.name,
            category: self.category,
            description: self.description.filter(|d| !d.trim().is_empty()),
            points: self.value,
            solved: self.solved_by_me,
            attachments,
            hints: self.hints.into_iter().filter_map(|h| h.content).collect(),
            author: self.attribution.filter(|a| !a.trim().is_empty()),
        }
    }
}

fn unwrap_envelope<T>(body: Envelope<T>, path: &str) -> WorkspaceResult<T> {
    if !body.success {
        let detail = body
            .errors
            .map(|e| e.to_string())
            .unwrap_or_else(|| "request failed".to_string());
        return Err(WorkspaceError::Remote(format!("{}: {}", path, detail)));
    }
    body.data
        .ok_or_else(|| WorkspaceError::Remote(format!("{}: response has no data", path)))
}

#[async_trait]
impl PlatformClient for CtfdClient {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Ctfd
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn login(&self, credentials: &Credentials) -> WorkspaceResult<()> {
        match credentials {
            Credentials::Token(token) => self.login_with_token(token).await?,
            Credentials::Password { username, password } => {
                self.login_with_password(username, password).await?
            }
        }
        info!(url = %self.base_url, "Logged in to CTFd");
        Ok(())
    }

    async fn list_challenges(&self) -> WorkspaceResult<Vec<RemoteChallenge>> {
        let (hidden, summaries): (Vec<ChallengeSummary>, Vec<ChallengeSummary>) = self
            .get_data::<Vec<ChallengeSummary>>("/api/v1/challenges")
            .await?
            .into_iter()
            .partition(ChallengeSummary::is_hidden);
        if !hidden.is_empty() {
            debug!(count = hidden.len(), "Skipping locked CTFd challenges");
        }
        debug!(count = summaries.len(), "Fetching CTFd challenge details");

        // `buffered` keeps platform order
        stream::iter(summaries)
            .map(|summary| self.challenge_detail(summary.id))
            .buffered(DETAIL_CONCURRENCY)
            .try_collect()
            .await
    }

    async fn download_attachment(
        &self,
        attachment: &Attachment,
        dest_dir: &Path,
    ) -> WorkspaceResult<PathBuf> {
        let url = download::resolve_url(&self.base_url, &attachment.url)?;
        let request = self.authorize(self.http.get(url)).await;
        download::save(request, attachment, dest_dir).await
    }

    async fn submit_flag(&self, challenge_id: &str, flag: &str) -> WorkspaceResult<FlagVerdict> {
        let challenge_id = challenge_id
            .parse()
            .map_err(|_| WorkspaceError::Remote(format!("invalid CTFd challenge id '{}'", challenge_id)))?;

        let request = self
            .authorize(self.http.post(self.url("/api/v1/challenges/attempt")))
            .await
            .json(&AttemptRequest {
                challenge_id,
                submission: flag,
            });
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(WorkspaceError::Remote(format!(
                "flag submission returned {}",
                response.status()
            )));
        }

        let body: Envelope<AttemptResult> = response.json().await?;
        let result = unwrap_envelope(body, "/api/v1/challenges/attempt")?;
        match result.status.as_str() {
            "correct" => Ok(FlagVerdict::Correct),
            "incorrect" => Ok(FlagVerdict::Incorrect),
            "already_solved" => Ok(FlagVerdict::AlreadySolved),
            other => {
                warn!(status = other, "Unexpected CTFd attempt status");
                Err(WorkspaceError::Remote(
                    result.message.unwrap_or_else(|| format!("attempt status '{}'", other)),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use tempfile::tempdir;

    const LOGIN_PAGE: &str = r#"<html><script>
        var init = {'urlRoot': "", 'csrfNonce': "before0123", 'userMode': "teams"}
        </script><form method="post"><input name="nonce" type="hidden" value="before0123"></form></html>"#;

    #[test]
    fn test_scrape_nonce() {
        assert_eq!(scrape_nonce(LOGIN_PAGE).as_deref(), Some("before0123"));
        assert_eq!(
            scrape_nonce(r#"<input type="hidden" name="nonce" value="f00d">"#).as_deref(),
            Some("f00d")
        );
        assert!(scrape_nonce("<html></html>").is_none());
    }

    #[tokio::test]
    async fn test_token_login_and_listing() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/v1/users/me")
                .header("Authorization", "Token ctfd_abc");
            then.status(200).json_body(json!({ "success": true, "data": { "id": 1 } }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/challenges");
            then.status(200).json_body(json!({
                "success": true,
                "data": [
                    { "id": 7, "name": "Baby Pwn 1", "category": "Pwn", "value": 100 },
                    { "id": 3, "name": "Login", "category": "web", "value": 50 }
                ]
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/challenges/7");
            then.status(200).json_body(json!({
                "success": true,
                "data": {
                    "id": 7, "name": "Baby Pwn 1", "category": "Pwn", "value": 100,
                    "description": "nc pwn.example.com 1337",
                    "solved_by_me": true,
                    "files": ["/files/ab12/vuln?token=xyz"],
                    "hints": [{ "id": 1, "cost": 0, "content": "ret2win" }, { "id": 2, "cost": 50 }],
                    "attribution": "alice"
                }
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/challenges/3");
            then.status(200).json_body(json!({
                "success": true,
                "data": { "id": 3, "name": "Login", "category": "web", "value": 50, "description": "" }
            }));
        });

        let client = CtfdClient::new(&server.base_url()).unwrap();
        client
            .login(&Credentials::Token("ctfd_abc".to_string()))
            .await
            .unwrap();
        let challenges = client.list_challenges().await.unwrap();

        assert_eq!(challenges.len(), 2);
        let pwn = &challenges[0];
        assert_eq!(pwn.id, "7");
        assert_eq!(pwn.points, Some(100));
        assert!(pwn.solved);
        assert_eq!(pwn.hints, vec!["ret2win"]);
        assert_eq!(pwn.author.as_deref(), Some("alice"));
        assert_eq!(pwn.attachments[0].name, "vuln");
        assert_eq!(challenges[1].name, "Login");
        assert!(challenges[1].description.is_none());
    }

    #[tokio::test]
    async fn test_locked_challenges_are_not_listed() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/users/me");
            then.status(200).json_body(json!({ "success": true, "data": { "id": 1 } }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/challenges");
            then.status(200).json_body(json!({
                "success": true,
                "data": [
                    { "id": 1, "type": "standard", "name": "Warmup", "category": "pwn", "value": 50 },
                    { "id": 2, "type": "hidden", "name": "???", "category": "???", "value": 0 },
                    { "id": 3, "type": "hidden", "name": "???", "category": "???", "value": 0 }
                ]
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/challenges/1");
            then.status(200).json_body(json!({
                "success": true,
                "data": { "id": 1, "name": "Warmup", "category": "pwn", "value": 50 }
            }));
        });
        let locked = server.mock(|when, then| {
            when.method(GET).path_matches(Regex::new(r"^/api/v1/challenges/[23]$").unwrap());
            then.status(403).json_body(json!({ "success": false }));
        });

        let client = CtfdClient::new(&server.base_url()).unwrap();
        client
            .login(&Credentials::Token("ctfd_abc".to_string()))
            .await
            .unwrap();
        let challenges = client.list_challenges().await.unwrap();

        assert_eq!(challenges.len(), 1);
        assert_eq!(challenges[0].id, "1");
        assert_eq!(challenges[0].name, "Warmup");
        locked.assert_hits(0);
    }

    #[tokio::test]
    async fn test_rejected_token() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/users/me");
            then.status(401).json_body(json!({ "success": false }));
        });

        let client = CtfdClient::new(&server.base_url()).unwrap();
        let result = client.login(&Credentials::Token("bad".to_string())).await;
        assert!(matches!(result, Err(WorkspaceError::AuthFailed(_))));
    }

    #[tokio::test]
    async fn test_password_login_uses_fresh_nonce() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/login");
            then.status(200).header("content-type", "text/html").body(LOGIN_PAGE);
        });
        server.mock(|when, then| {
            when.method(POST)
                .path("/login")
                .x_www_form_urlencoded_tuple("name", "alice")
                .x_www_form_urlencoded_tuple("nonce", "before0123");
            then.status(302).header("Location", "/challenges");
        });
        server.mock(|when, then| {
            when.method(GET).path("/challenges");
            then.status(200)
                .header("content-type", "text/html")
                .body("<script>var init = {'csrfNonce': \"after4567\"}</script>");
        });
        let attempt = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v1/challenges/attempt")
                .header("CSRF-Token", "after4567")
                .json_body(json!({ "challenge_id": 7, "submission": "flag{x}" }));
            then.status(200).json_body(json!({
                "success": true,
                "data": { "status": "already_solved", "message": "You already solved this" }
            }));
        });

        let client = CtfdClient::new(&server.base_url()).unwrap();
        client
            .login(&Credentials::Password {
                username: "alice".to_string(),
                password: "hunter2".to_string(),
            })
            .await
            .unwrap();

        let verdict = client.submit_flag("7", "flag{x}").await.unwrap();
        assert_eq!(verdict, FlagVerdict::AlreadySolved);
        attempt.assert();
    }

    #[tokio::test]
    async fn test_password_login_rejected() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/login");
            then.status(200).body(LOGIN_PAGE);
        });
        server.mock(|when, then| {
            when.method(POST).path("/login");
            then.status(200).body("Your username or password is incorrect");
        });

        let client = CtfdClient::new(&server.base_url()).unwrap();
        let result = client
            .login(&Credentials::Password {
                username: "alice".to_string(),
                password: "wrong".to_string(),
            })
            .await;
        assert!(matches!(result, Err(WorkspaceError::AuthFailed(_))));
    }

    #[tokio::test]
    async fn test_incorrect_flag_and_download() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/v1/challenges/attempt");
            then.status(200).json_body(json!({
                "success": true,
                "data": { "status": "incorrect", "message": "Incorrect" }
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/files/ab12/vuln").query_param("token", "xyz");
            then.status(200).body("binary");
        });

        let client = CtfdClient::new(&server.base_url()).unwrap();
        assert_eq!(
            client.submit_flag("7", "flag{nope}").await.unwrap(),
            FlagVerdict::Incorrect
        );
        assert!(client.submit_flag("seven", "flag{x}").await.is_err());

        let dir = tempdir().unwrap();
        let attachment = Attachment {
            name: "vuln".to_string(),
            url: "/files/ab12/vuln?token=xyz".to_string(),
        };
        let path = client.download_attachment(&attachment, dir.path()).await.unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "binary");
    }
}
