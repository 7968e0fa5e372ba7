//! ctfw - CTF workspace manager
//!
//! Organizes CTF events and their challenges as directories, scaffolds
//! solve scripts and imports challenges from CTFd and rCTF platforms.

mod commands;
mod prompt;
mod style;

use clap::{Parser, Subcommand};
use ctf_workspace::{Category, PlatformKind, RunState};
use std::path::PathBuf;
use style::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ctfw")]
#[command(version)]
#[command(about = "CTF workspace manager - organize challenges and import them from CTF platforms", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, env = "CTFW_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the config file and the directory that holds all CTFs
    Init {
        /// CTF root directory (default: ./ctfs)
        path: Option<PathBuf>,
    },

    /// Delete the config file, optionally with all CTF directories
    Reset {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,

        /// Also delete every CTF directory
        #[arg(long)]
        delete_files: bool,
    },

    /// Manage CTFs
    Ctf {
        #[command(subcommand)]
        command: CtfCommands,
    },

    /// Manage challenges
    #[command(visible_alias = "chal")]
    Challenge {
        #[command(subcommand)]
        command: ChallengeCommands,
    },

    /// Mark a challenge solved (submits the flag to its platform if it has one)
    Solve {
        /// Challenge name (default: the challenge in the current directory)
        name: Option<String>,

        #[arg(short, long)]
        flag: Option<String>,

        /// Comma separated tags
        #[arg(short, long, value_delimiter = ',')]
        tags: Option<Vec<String>>,

        /// Do not submit the flag to the platform
        #[arg(long)]
        offline: bool,

        /// Skip platform detection: ctfd or rctf
        #[arg(long)]
        platform: Option<PlatformKind>,
    },

    /// Show all tags used on solved challenges
    Tags,
}

#[derive(Subcommand)]
enum CtfCommands {
    /// Add a CTF, importing its challenges when --url is given
    Add {
        name: String,

        /// Platform URL to import challenges from
        #[arg(long)]
        url: Option<String>,

        #[command(flatten)]
        remote: commands::ctf::RemoteArgs,
    },

    /// Import a CTF and its challenges from a platform
    #[command(visible_alias = "f")]
    Fetch {
        name: String,

        url: String,

        #[command(flatten)]
        remote: commands::ctf::RemoteArgs,
    },

    /// Re-import challenges of a fetched CTF
    Sync {
        name: Option<String>,

        /// Skip platform detection: ctfd or rctf
        #[arg(long)]
        platform: Option<PlatformKind>,
    },

    /// Remove a CTF with all its challenges and files
    #[command(visible_alias = "rm")]
    Remove {
        name: Option<String>,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Mark a CTF as running
    Start { name: Option<String> },

    /// Mark a CTF as stopped
    Stop { name: Option<String> },

    /// Show details of a CTF
    Info { name: Option<String> },

    /// List all CTFs
    #[command(visible_alias = "ls")]
    List,
}

#[derive(Subcommand)]
enum ChallengeCommands {
    /// Add a challenge to a CTF
    Add {
        name: String,

        /// Category (prompted when omitted)
        #[arg(short, long)]
        category: Option<Category>,

        /// CTF name (default: the CTF in the current directory)
        #[arg(long)]
        ctf: Option<String>,
    },

    /// Remove a challenge and its directory
    #[command(visible_alias = "rm")]
    Remove {
        name: Option<String>,

        /// Do not ask for confirmation, even for non-empty directories
        #[arg(short, long)]
        yes: bool,
    },

    /// Show details of a challenge
    Info { name: Option<String> },

    /// List challenges
    #[command(visible_alias = "ls")]
    List {
        /// Only challenges of this CTF
        #[arg(long)]
        ctf: Option<String>,

        /// Only unsolved challenges
        #[arg(short, long)]
        unsolved: bool,

        /// Only challenges with this tag
        #[arg(short, long)]
        tag: Option<String>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info,ctf_workspace=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.config;
    let result = match cli.command {
        Commands::Init { path } => commands::init::run(config, path),
        Commands::Reset { yes, delete_files } => commands::reset::run(config, yes, delete_files),
        Commands::Ctf { command } => match command {
            CtfCommands::Add { name, url, remote } => {
                commands::ctf::add(config, name, url, remote).await
            }
            CtfCommands::Fetch { name, url, remote } => {
                commands::ctf::fetch(config, name, url, remote).await
            }
            CtfCommands::Sync { name, platform } => {
                commands::ctf::sync(config, name, platform).await
            }
            CtfCommands::Remove { name, yes } => commands::ctf::remove(config, name, yes),
            CtfCommands::Start { name } => commands::ctf::set_state(config, name, RunState::Running),
            CtfCommands::Stop { name } => commands::ctf::set_state(config, name, RunState::Stopped),
            CtfCommands::Info { name } => commands::ctf::info(config, name),
            CtfCommands::List => commands::ctf::list(config),
        },
        Commands::Challenge { command } => match command {
            ChallengeCommands::Add {
                name,
                category,
                ctf,
            } => commands::challenge::add(config, name, category, ctf),
            ChallengeCommands::Remove { name, yes } => {
                commands::challenge::remove(config, name, yes)
            }
            ChallengeCommands::Info { name } => commands::challenge::info(config, name),
            ChallengeCommands::List { ctf, unsolved, tag } => {
                commands::challenge::list(config, ctf, unsolved, tag)
            }
        },
        Commands::Solve {
            name,
            flag,
            tags,
            offline,
            platform,
        } => commands::solve::run(config, name, flag, tags, offline, platform).await,
        Commands::Tags => commands::tags::run(config),
    };

    if let Err(e) = result {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_fetch_with_token() {
        let cli = Cli::try_parse_from([
            "ctfw", "ctf", "fetch", "defcon", "https://ctf.example.com", "--token", "abc",
            "--platform", "rctf",
        ])
        .unwrap();
        match cli.command {
            Commands::Ctf {
                command: CtfCommands::Fetch { name, remote, .. },
            } => {
                assert_eq!(name, "defcon");
                assert_eq!(remote.token.as_deref(), Some("abc"));
                assert_eq!(remote.platform, Some(PlatformKind::Rctf));
            }
            _ => panic!("expected ctf fetch"),
        }
    }

    #[test]
    fn test_token_conflicts_with_username() {
        let result = Cli::try_parse_from([
            "ctfw", "ctf", "fetch", "x", "https://a", "-u", "alice", "-p", "pw", "-t", "tok",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_solve_tags() {
        let cli = Cli::try_parse_from(["ctfw", "solve", "--flag", "flag{x}", "--tags", "heap,uaf"])
            .unwrap();
        match cli.command {
            Commands::Solve { tags, flag, .. } => {
                assert_eq!(tags, Some(vec!["heap".to_string(), "uaf".to_string()]));
                assert_eq!(flag.as_deref(), Some("flag{x}"));
            }
            _ => panic!("expected solve"),
        }
    }

    #[test]
    fn test_parse_category() {
        let cli = Cli::try_parse_from(["ctfw", "chal", "add", "rop", "-c", "pwn"]).unwrap();
        match cli.command {
            Commands::Challenge {
                command: ChallengeCommands::Add { category, .. },
            } => assert_eq!(category, Some(Category::Pwn)),
            _ => panic!("expected challenge add"),
        }
        assert!(Cli::try_parse_from(["ctfw", "chal", "add", "rop", "-c", "quantum"]).is_err());
    }
}
