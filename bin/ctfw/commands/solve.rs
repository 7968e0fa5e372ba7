//! Solve command - mark a challenge solved, optionally submitting the flag

use crate::commands::{self, spinner};
use crate::prompt;
use crate::style::*;
use anyhow::{bail, Result};
use ctf_workspace::{Challenge, FlagVerdict, HttpResolver, PlatformKind, SyncEngine, Workspace};
use std::path::PathBuf;

pub async fn run(
    config: Option<PathBuf>,
    name: Option<String>,
    flag: Option<String>,
    tags: Option<Vec<String>>,
    offline: bool,
    platform: Option<PlatformKind>,
) -> Result<()> {
    let mut ws = commands::open(config)?;
    let challenge = commands::select_challenge(
        &ws,
        name.as_deref(),
        |c| !c.is_solved(),
        "Select a challenge to solve:",
    )?;

    let flag = match flag {
        Some(flag) => flag,
        None => prompt::input("Flag")?,
    };
    let tags = match tags {
        Some(tags) => tags,
        None => {
            let known: Vec<&str> = ws.snapshot().challenge_tags.iter().map(String::as_str).collect();
            let hint = if known.is_empty() {
                String::new()
            } else {
                format!(" (known: {})", known.join(", "))
            };
            prompt::split_tags(&prompt::input(&format!("Tags, comma separated{}", hint))?)
        }
    };

    if !offline && !flag.is_empty() {
        submit(&ws, &challenge, &flag, platform).await?;
    }

    let solved = ws.solve_challenge(&challenge.id, Some(flag), &tags)?;
    ws.commit()?;

    print_success(&format!("Solved {}", entity(&solved.name)));
    if let Some(flag) = &solved.flag {
        print_key_value("Flag", flag);
    }
    Ok(())
}

/// Submit the flag when the challenge came from a platform we can log in to
async fn submit(
    ws: &Workspace,
    challenge: &Challenge,
    flag: &str,
    platform: Option<PlatformKind>,
) -> Result<()> {
    let Some(remote_id) = challenge.remote_id.as_deref() else {
        return Ok(());
    };
    let ctf = ws.ctf(&challenge.ctf_id)?;
    let (Some(url), Some(credentials)) = (ctf.url.as_deref(), ctf.credentials()) else {
        return Ok(());
    };

    let resolver = HttpResolver::new()?;
    let pb = spinner(&format!("Submitting flag to {}...", url))?;
    let verdict = async {
        let client = SyncEngine::new(&resolver)
            .connect(url, &credentials, platform.or(ctf.platform))
            .await?;
        client.submit_flag(remote_id, flag).await
    }
    .await;
    pb.finish_and_clear();

    match verdict? {
        FlagVerdict::Correct => print_success("Flag accepted"),
        FlagVerdict::AlreadySolved => print_info("Already solved on the platform"),
        FlagVerdict::Incorrect => bail!("Flag rejected by {}", url),
    }
    Ok(())
}
