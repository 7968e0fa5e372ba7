//! Reset command - forget the workspace

use crate::prompt;
use crate::style::*;
use anyhow::Result;
use ctf_workspace::{workspace, ConfigStore};
use std::path::PathBuf;

pub fn run(config: Option<PathBuf>, yes: bool, delete_files: bool) -> Result<()> {
    let store = ConfigStore::locate(config)?;
    let snapshot = store.load()?;

    if !yes && !prompt::confirm("Delete the workspace config?", false)? {
        print_info("Reset cancelled");
        return Ok(());
    }

    let delete_files = delete_files
        || (!yes
            && !snapshot.ctfs.is_empty()
            && prompt::confirm(
                &format!(
                    "Also delete the directories of {} CTF(s) under {}?",
                    snapshot.ctfs.len(),
                    snapshot.ctfs_path.display()
                ),
                false,
            )?);

    let removed = workspace::reset(&store, delete_files)?;
    print_success("Workspace reset");
    if delete_files {
        print_key_value("Directories removed", &removed.to_string());
    }
    Ok(())
}
