//! Reconcile a remote platform's challenge list into the workspace
//!
//! Fetching never writes a CTF record before the platform has accepted the
//! credentials and returned its challenge list. Per-challenge problems
//! (name collisions, failed downloads) are collected into a [`SyncReport`]
//! instead of aborting the batch.

use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{WorkspaceError, WorkspaceResult};
use crate::models::{
    normalize_name, Attachment, Category, Challenge, ChallengeExtras, Credentials, Ctf, Solved,
};
use crate::platform::{ClientResolver, PlatformClient, PlatformKind, RemoteChallenge};
use crate::workspace::Workspace;

/// Challenges whose attachments are downloaded concurrently
pub const DOWNLOAD_CONCURRENCY: usize = 4;

/// A remote challenge that was not imported
#[derive(Debug)]
pub struct SkippedChallenge {
    pub name: String,
    pub error: WorkspaceError,
}

/// An attachment that could not be downloaded
#[derive(Debug)]
pub struct DownloadFailure {
    pub challenge: String,
    pub error: WorkspaceError,
}

/// Outcome of one sync run. Names are local (normalized) names.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub imported: Vec<String>,
    pub updated: Vec<String>,
    pub skipped: Vec<SkippedChallenge>,
    pub download_failures: Vec<DownloadFailure>,
}

impl SyncReport {
    /// The platform had nothing to import
    pub fn is_empty(&self) -> bool {
        self.imported.is_empty() && self.updated.is_empty() && self.skipped.is_empty()
    }
}

struct DownloadJob {
    challenge: String,
    dir: PathBuf,
    attachments: Vec<Attachment>,
}

/// Build the local record for a remote challenge
pub fn to_local(ctf: &Ctf, remote: &RemoteChallenge) -> Challenge {
    let mut challenge = Challenge::new(
        ctf,
        normalize_name(&remote.name),
        Category::from_remote(&remote.category),
    );
    challenge.points = remote.points;
    challenge.solved = Solved::from(remote.solved);
    challenge.remote_id = Some(remote.id.clone()).filter(|id| !id.is_empty());
    challenge.extras = Some(extras_of(remote));
    challenge
}

fn extras_of(remote: &RemoteChallenge) -> ChallengeExtras {
    ChallengeExtras {
        description: remote.description.clone(),
        attachments: remote.attachments.clone(),
        hints: remote.hints.clone(),
        author: remote.author.clone(),
    }
}

pub struct SyncEngine<'r> {
    resolver: &'r dyn ClientResolver,
    concurrency: usize,
}

impl<'r> SyncEngine<'r> {
    pub fn new(resolver: &'r dyn ClientResolver) -> Self {
        Self {
            resolver,
            concurrency: DOWNLOAD_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Resolve a client for `url` and log in
    pub async fn connect(
        &self,
        url: &str,
        credentials: &Credentials,
        hint: Option<PlatformKind>,
    ) -> WorkspaceResult<Box<dyn PlatformClient>> {
        let client = self.resolver.resolve(url, hint).await?;
        client.login(credentials).await?;
        Ok(client)
    }

    /// Create a new CTF from a remote platform and import its challenges
    pub async fn fetch(
        &self,
        workspace: &mut Workspace,
        name: &str,
        url: &str,
        credentials: &Credentials,
        hint: Option<PlatformKind>,
    ) -> WorkspaceResult<(Ctf, SyncReport)> {
        workspace.check_new_ctf(name)?;

        let client = self.connect(url, credentials, hint).await?;
        let remote = client.list_challenges().await?;
        info!(ctf = name, url, challenges = remote.len(), "Fetched remote challenge list");

        let dir_existed = workspace.check_new_ctf(name)?.exists();
        let ctf = workspace.insert_remote_ctf(name, client.base_url(), credentials, client.kind())?;
        match self
            .reconcile(workspace, &ctf.id, client.as_ref(), remote)
            .await
        {
            Ok(report) => Ok((ctf, report)),
            Err(error) => {
                // Nothing was committed; leave no directories behind either
                if let Err(cleanup) = workspace.discard_ctf(&ctf.id, dir_existed) {
                    warn!(ctf = name, error = %cleanup, "Failed to clean up after sync error");
                }
                Err(error)
            }
        }
    }

    /// Re-import an existing CTF using its stored URL and credentials
    pub async fn resync(
        &self,
        workspace: &mut Workspace,
        ctf_id: &Uuid,
        hint: Option<PlatformKind>,
    ) -> WorkspaceResult<SyncReport> {
        let ctf = workspace.ctf(ctf_id)?.clone();
        let url = ctf
            .url
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| WorkspaceError::ClientUnavailable {
                url: String::new(),
                reason: format!("CTF '{}' has no platform URL", ctf.name),
            })?;
        let credentials = ctf.credentials().ok_or_else(|| {
            WorkspaceError::InvalidCredentials(format!("CTF '{}' has no stored credentials", ctf.name))
        })?;

        let client = self
            .connect(&url, &credentials, hint.or(ctf.platform))
            .await?;
        workspace.set_platform(ctf_id, client.kind())?;
        let remote = client.list_challenges().await?;
        info!(ctf = %ctf.name, challenges = remote.len(), "Re-syncing remote challenges");
        self.reconcile(workspace, ctf_id, client.as_ref(), remote).await
    }

    /// Apply a remote challenge list to one CTF, in platform order.
    ///
    /// A challenge already imported under the same remote id is updated in
    /// place. Anything else goes through the normal insert path, where name
    /// collisions are skipped and reported.
    pub async fn reconcile(
        &self,
        workspace: &mut Workspace,
        ctf_id: &Uuid,
        client: &dyn PlatformClient,
        remote_challenges: Vec<RemoteChallenge>,
    ) -> WorkspaceResult<SyncReport> {
        let ctf = workspace.ctf(ctf_id)?.clone();
        let mut report = SyncReport::default();
        let mut jobs = Vec::new();

        for remote in &remote_challenges {
            let challenge = match existing_import(workspace, &ctf.id, &remote.id) {
                Some(id) => {
                    let updated = apply_update(workspace, &id, remote)?;
                    report.updated.push(updated.name.clone());
                    updated
                }
                None => match workspace.import_challenge(to_local(&ctf, remote)) {
                    Ok(imported) => {
                        report.imported.push(imported.name.clone());
                        imported
                    }
                    Err(error)
                        if error.is_duplicate() || matches!(error, WorkspaceError::InvalidName(_)) =>
                    {
                        warn!(ctf = %ctf.name, challenge = %remote.name, %error, "Skipping remote challenge");
                        report.skipped.push(SkippedChallenge {
                            name: normalize_name(&remote.name),
                            error,
                        });
                        continue;
                    }
                    Err(error) => return Err(error),
                },
            };

            if !challenge.attachments().is_empty() {
                jobs.push(DownloadJob {
                    challenge: challenge.name.clone(),
                    dir: challenge.path.clone(),
                    attachments: challenge.attachments().to_vec(),
                });
            }
        }

        report.download_failures = self.download_all(client, jobs).await;
        info!(
            ctf = %ctf.name,
            imported = report.imported.len(),
            updated = report.updated.len(),
            skipped = report.skipped.len(),
            download_failures = report.download_failures.len(),
            "Sync finished"
        );
        Ok(report)
    }

    /// Download every job's attachments. Jobs run concurrently and a failure
    /// never cancels another job.
    async fn download_all(
        &self,
        client: &dyn PlatformClient,
        jobs: Vec<DownloadJob>,
    ) -> Vec<DownloadFailure> {
        stream::iter(jobs)
            .map(|job| async move {
                let mut failures = Vec::new();
                for attachment in &job.attachments {
                    match client.download_attachment(attachment, &job.dir).await {
                        Ok(path) => {
                            debug!(challenge = %job.challenge, path = %path.display(), "Attachment ready")
                        }
                        Err(error) => {
                            warn!(challenge = %job.challenge, attachment = %attachment.name, %error, "Download failed");
                            failures.push(DownloadFailure {
                                challenge: job.challenge.clone(),
                                error,
                            });
                        }
                    }
                }
                failures
            })
            .buffer_unordered(self.concurrency)
            .concat()
            .await
    }
}

fn existing_import(workspace: &Workspace, ctf_id: &Uuid, remote_id: &str) -> Option<Uuid> {
    if remote_id.is_empty() {
        return None;
    }
    workspace
        .challenges_of(ctf_id)
        .find(|c| c.remote_id.as_deref() == Some(remote_id))
        .map(|c| c.id)
}

/// Refresh remote-owned fields. Local flag, tags, name and path are kept and
/// a local solve is never undone.
fn apply_update(
    workspace: &mut Workspace,
    id: &Uuid,
    remote: &RemoteChallenge,
) -> WorkspaceResult<Challenge> {
    let challenge = workspace
        .snapshot_mut()
        .challenge_mut(id)
        .ok_or_else(|| WorkspaceError::ChallengeNotFound(id.to_string()))?;

    challenge.points = remote.points;
    challenge.category = Category::from_remote(&remote.category);
    challenge.extras = Some(extras_of(remote));
    if remote.solved {
        challenge.solved = Solved::Solved;
    }
    std::fs::create_dir_all(&challenge.path)?;
    Ok(challenge.clone())
}
