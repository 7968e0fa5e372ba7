//! CTF commands - add, fetch, sync, remove, start/stop, info, list

use crate::commands::{self, spinner};
use crate::prompt;
use crate::style::*;
use anyhow::{bail, Result};
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use ctf_workspace::{
    ClientResolver, Credentials, HttpResolver, PlatformKind, RunState, SyncEngine, SyncReport,
    Workspace,
};
use std::path::PathBuf;

/// Platform connection options
#[derive(Args, Debug, Default)]
pub struct RemoteArgs {
    /// Platform username
    #[arg(short, long, requires = "password", conflicts_with = "token")]
    pub username: Option<String>,

    /// Platform password
    #[arg(short, long, requires = "username")]
    pub password: Option<String>,

    /// API token (CTFd) or team token (rCTF)
    #[arg(short, long)]
    pub token: Option<String>,

    /// Skip platform detection: ctfd or rctf
    #[arg(long)]
    pub platform: Option<PlatformKind>,
}

impl RemoteArgs {
    fn given_credentials(&self) -> Option<Credentials> {
        Credentials::from_parts(self.username.clone(), self.password.clone(), self.token.clone())
            .ok()
    }
}

/// Add a local CTF, or import one when `url` is given
pub async fn add(
    config: Option<PathBuf>,
    name: String,
    url: Option<String>,
    remote: RemoteArgs,
) -> Result<()> {
    let mut ws = commands::open(config)?;

    let Some(url) = url else {
        let ctf = ws.add_ctf(&name)?;
        ws.commit()?;
        print_success(&format!(
            "Added CTF {} at {}",
            entity(&ctf.name),
            ctf.path.display()
        ));
        return Ok(());
    };

    ws.check_new_ctf(&name)?;
    let resolver = HttpResolver::new()?;
    let kind = match remote.platform {
        Some(kind) => kind,
        None => {
            let pb = spinner(&format!("Detecting platform at {}...", url))?;
            let detected = resolver.resolve(&url, None).await.map(|c| c.kind());
            pb.finish_and_clear();
            detected?
        }
    };
    print_info(&format!("Platform: {}", style_bold(kind.as_str())));

    let credentials = match remote.given_credentials() {
        Some(credentials) => credentials,
        None => ask_credentials(kind)?,
    };
    import(&mut ws, &resolver, &name, &url, &credentials, Some(kind)).await?;
    ws.commit()?;
    Ok(())
}

/// Import a CTF from a platform using command line credentials
pub async fn fetch(
    config: Option<PathBuf>,
    name: String,
    url: String,
    remote: RemoteArgs,
) -> Result<()> {
    let credentials = Credentials::from_parts(remote.username, remote.password, remote.token)?;
    let mut ws = commands::open(config)?;
    let resolver = HttpResolver::new()?;

    import(&mut ws, &resolver, &name, &url, &credentials, remote.platform).await?;
    ws.commit()?;
    Ok(())
}

async fn import(
    ws: &mut Workspace,
    resolver: &dyn ClientResolver,
    name: &str,
    url: &str,
    credentials: &Credentials,
    hint: Option<PlatformKind>,
) -> Result<()> {
    let pb = spinner(&format!("Fetching challenges from {}...", url))?;
    let result = SyncEngine::new(resolver)
        .fetch(ws, name, url, credentials, hint)
        .await;
    pb.finish_and_clear();
    let (ctf, report) = result?;

    print_success(&format!("Fetched CTF {} from {}", entity(&ctf.name), url));
    print_key_value("Path", &ctf.path.display().to_string());
    print_report(&report);
    Ok(())
}

fn ask_credentials(kind: PlatformKind) -> Result<Credentials> {
    if kind.uses_team_token() {
        let token = prompt::required_input("Team token")?;
        return Ok(Credentials::Token(token));
    }

    let username = prompt::input("Username (leave empty to use an API token)")?;
    if username.is_empty() {
        let token = prompt::required_input("API token")?;
        return Ok(Credentials::Token(token));
    }
    let password = prompt::password("Password")?;
    Ok(Credentials::from_parts(Some(username), Some(password), None)?)
}

/// Re-sync challenges of a fetched CTF
pub async fn sync(config: Option<PathBuf>, name: Option<String>, platform: Option<PlatformKind>) -> Result<()> {
    let mut ws = commands::open(config)?;
    let ctf = commands::select_ctf(&ws, name.as_deref(), |c| c.is_remote(), "Select a CTF to sync:")?;
    let resolver = HttpResolver::new()?;

    let pb = spinner(&format!("Syncing {}...", ctf.name))?;
    let result = SyncEngine::new(&resolver).resync(&mut ws, &ctf.id, platform).await;
    pb.finish_and_clear();
    let report = result?;

    ws.commit()?;
    print_success(&format!("Synced CTF {}", entity(&ctf.name)));
    print_report(&report);
    Ok(())
}

fn print_report(report: &SyncReport) {
    if report.is_empty() {
        print_info("Nothing to import");
        return;
    }

    print_key_value_colored("Imported", &report.imported.len().to_string(), colors::GREEN);
    if !report.updated.is_empty() {
        print_key_value("Updated", &report.updated.len().to_string());
    }
    for skipped in &report.skipped {
        print_warning(&format!("Skipped {}: {}", skipped.name, skipped.error));
    }
    for failure in &report.download_failures {
        print_warning(&format!("{}: {}", failure.challenge, failure.error));
    }
}

pub fn remove(config: Option<PathBuf>, name: Option<String>, yes: bool) -> Result<()> {
    let mut ws = commands::open(config)?;
    let ctf = commands::select_ctf(&ws, name.as_deref(), |_| true, "Select a CTF to remove:")?;
    let count = ws.challenges_of(&ctf.id).count();

    let question = format!(
        "Remove CTF {} and all its {} challenge(s)? This deletes {}",
        ctf.name,
        count,
        ctf.path.display()
    );
    if !yes && !prompt::confirm(&question, false)? {
        print_info("Nothing removed");
        return Ok(());
    }

    ws.remove_ctf(&ctf.id)?;
    ws.commit()?;
    print_success(&format!("Removed CTF {}", entity(&ctf.name)));
    Ok(())
}

/// Start or stop a CTF
pub fn set_state(config: Option<PathBuf>, name: Option<String>, state: RunState) -> Result<()> {
    let mut ws = commands::open(config)?;
    let eligible = |c: &ctf_workspace::Ctf| c.running != state;

    if name.is_none() && !ws.snapshot().ctfs.iter().any(eligible) {
        bail!(
            "No {} CTFs found",
            match state {
                RunState::Running => RunState::Stopped.as_str(),
                RunState::Stopped => RunState::Running.as_str(),
            }
        );
    }

    let verb = match state {
        RunState::Running => "start",
        RunState::Stopped => "stop",
    };
    let ctf = commands::select_ctf(&ws, name.as_deref(), eligible, &format!("Select a CTF to {}:", verb))?;

    if !ws.set_running(&ctf.id, state)? {
        print_info(&format!("CTF {} is already {}", entity(&ctf.name), state.as_str()));
        return Ok(());
    }
    ws.commit()?;
    print_success(&format!("CTF {} is now {}", entity(&ctf.name), state.as_str()));
    Ok(())
}

pub fn info(config: Option<PathBuf>, name: Option<String>) -> Result<()> {
    let ws = commands::open(config)?;
    let ctf = commands::select_ctf(&ws, name.as_deref(), |_| true, "Select a CTF to view:")?;
    let challenges: Vec<_> = ws.challenges_of(&ctf.id).collect();
    let solved = challenges.iter().filter(|c| c.is_solved()).count();
    let points: u32 = challenges
        .iter()
        .filter(|c| c.is_solved())
        .filter_map(|c| c.points)
        .sum();

    print_header(&ctf.name);
    print_key_value("Path", &ctf.path.display().to_string());
    print_key_value_colored("Status", ctf.running.as_str(), state_color(ctf.running));
    print_key_value("Created", &ctf.created_at.format("%Y-%m-%d").to_string());
    print_key_value("Challenges", &format!("{}/{} solved", solved, challenges.len()));
    if points > 0 {
        print_key_value("Points", &points.to_string());
    }
    if let Some(url) = &ctf.url {
        print_key_value("URL", url);
        if let Some(platform) = ctf.platform {
            print_key_value("Platform", platform.as_str());
        }
        let auth = if ctf.token.is_some() {
            "token".to_string()
        } else {
            format!("user {}", ctf.username.as_deref().unwrap_or("?"))
        };
        print_key_value("Auth", &auth);
    }
    println!();
    Ok(())
}

pub fn list(config: Option<PathBuf>) -> Result<()> {
    let ws = commands::open(config)?;
    let ctfs = &ws.snapshot().ctfs;
    if ctfs.is_empty() {
        print_info("No CTFs yet");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Name").fg(Color::Cyan),
            Cell::new("Status").fg(Color::Cyan),
            Cell::new("Solved").fg(Color::Cyan),
            Cell::new("Created").fg(Color::Cyan),
            Cell::new("Path").fg(Color::Cyan),
        ]);

    for ctf in ctfs {
        let total = ws.challenges_of(&ctf.id).count();
        let solved = ws.challenges_of(&ctf.id).filter(|c| c.is_solved()).count();
        let status_color = if ctf.is_running() { Color::Green } else { Color::DarkGrey };

        table.add_row(vec![
            Cell::new(&ctf.name).fg(Color::White),
            Cell::new(ctf.running.as_str()).fg(status_color),
            Cell::new(format!("{}/{}", solved, total)),
            Cell::new(ctf.created_at.format("%Y-%m-%d").to_string()),
            Cell::new(ctf.path.display().to_string()).fg(Color::DarkGrey),
        ]);
    }

    println!("{table}");
    Ok(())
}
