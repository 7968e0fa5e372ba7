//! CLI command implementations

pub mod challenge;
pub mod ctf;
pub mod init;
pub mod reset;
pub mod solve;
pub mod tags;

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use crate::prompt;
use ctf_workspace::{Challenge, ConfigStore, Ctf, Workspace};

/// Load the workspace from the configured (or default) config path
pub fn open(config: Option<PathBuf>) -> Result<Workspace> {
    let store = ConfigStore::locate(config)?;
    Ok(Workspace::open(store)?)
}

/// Canonical working directory, so it compares equal to stored paths
pub fn cwd() -> Result<PathBuf> {
    let dir = std::env::current_dir().context("Failed to read current directory")?;
    Ok(dir.canonicalize().unwrap_or(dir))
}

/// Pick a CTF: by name, else the one containing the working directory,
/// else interactively among those accepted by `filter`.
pub fn select_ctf(
    ws: &Workspace,
    name: Option<&str>,
    filter: impl Fn(&Ctf) -> bool,
    prompt_text: &str,
) -> Result<Ctf> {
    if let Some(name) = name {
        return Ok(ws.ctf_by_name(name)?.clone());
    }

    let cwd = cwd()?;
    if let Some(ctf) = ws.current_ctf(&cwd).filter(|c| filter(c)) {
        return Ok(ctf.clone());
    }

    let mut candidates: Vec<&Ctf> = ws.snapshot().ctfs.iter().filter(|c| filter(c)).collect();
    if candidates.is_empty() {
        bail!("No CTFs found");
    }
    candidates.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let labels: Vec<String> = candidates
        .iter()
        .map(|c| format!("{:<40} ({})", c.name, c.created_at.format("%Y")))
        .collect();
    let index = prompt::fuzzy_select(prompt_text, &labels)?;
    Ok(candidates[index].clone())
}

/// Pick a challenge: by name (preferring the current CTF), else the one
/// containing the working directory, else interactively.
pub fn select_challenge(
    ws: &Workspace,
    name: Option<&str>,
    filter: impl Fn(&Challenge) -> bool,
    prompt_text: &str,
) -> Result<Challenge> {
    let cwd = cwd()?;
    let current_ctf = ws.current_ctf(&cwd).map(|c| c.id);

    if let Some(name) = name {
        if let Some(ctf_id) = &current_ctf {
            if let Ok(challenge) = ws.challenge_by_name(name, Some(ctf_id)) {
                return Ok(challenge.clone());
            }
        }
        let matches: Vec<&Challenge> = ws
            .snapshot()
            .challenges
            .iter()
            .filter(|c| c.name == name)
            .collect();
        return match matches.len() {
            0 => Err(ctf_workspace::WorkspaceError::ChallengeNotFound(name.to_string()).into()),
            1 => Ok(matches[0].clone()),
            _ => pick_challenge(ws, &matches, prompt_text),
        };
    }

    if let Some(challenge) = ws.current_challenge(&cwd).filter(|c| filter(c)) {
        return Ok(challenge.clone());
    }

    let candidates: Vec<&Challenge> = ws
        .snapshot()
        .challenges
        .iter()
        .filter(|c| filter(c))
        .filter(|c| current_ctf.map_or(true, |id| c.ctf_id == id))
        .collect();
    if candidates.is_empty() {
        bail!("No challenges found");
    }
    pick_challenge(ws, &candidates, prompt_text)
}

fn pick_challenge(ws: &Workspace, candidates: &[&Challenge], prompt_text: &str) -> Result<Challenge> {
    let labels: Vec<String> = candidates
        .iter()
        .map(|c| format!("{:<40} ({})", c.name, ctf_name(ws, c)))
        .collect();
    let index = prompt::fuzzy_select(prompt_text, &labels)?;
    Ok(candidates[index].clone())
}

/// Display name of a challenge's CTF
pub fn ctf_name(ws: &Workspace, challenge: &Challenge) -> String {
    ws.ctf(&challenge.ctf_id)
        .map(|c| c.name.clone())
        .unwrap_or_else(|_| "?".to_string())
}

/// Spinner used around network operations
pub fn spinner(message: &str) -> Result<indicatif::ProgressBar> {
    let pb = indicatif::ProgressBar::new_spinner();
    pb.set_style(indicatif::ProgressStyle::default_spinner().template("  {spinner:.cyan} {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    Ok(pb)
}
