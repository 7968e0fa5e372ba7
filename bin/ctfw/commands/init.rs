//! Init command - create the config file and CTF root directory

use crate::style::*;
use anyhow::Result;
use ctf_workspace::ConfigStore;
use std::path::PathBuf;

const DEFAULT_CTFS_DIR: &str = "ctfs";

pub fn run(config: Option<PathBuf>, path: Option<PathBuf>) -> Result<()> {
    let store = ConfigStore::locate(config)?;
    let ctfs_path = match path {
        Some(path) => path,
        None => std::env::current_dir()?.join(DEFAULT_CTFS_DIR),
    };

    let snapshot = store.init(&ctfs_path)?;

    print_success("Workspace initialized");
    print_key_value("Config", &store.path().display().to_string());
    print_key_value("CTFs", &snapshot.ctfs_path.display().to_string());
    println!();
    println!(
        "  Add a CTF with {} or import one with {}",
        style_cyan("ctfw ctf add <name>"),
        style_cyan("ctfw ctf fetch <name> <url>")
    );
    Ok(())
}
