//! Tags command - show the tag vocabulary

use crate::commands;
use crate::style::*;
use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use std::path::PathBuf;

pub fn run(config: Option<PathBuf>) -> Result<()> {
    let ws = commands::open(config)?;
    let snapshot = ws.snapshot();
    if snapshot.challenge_tags.is_empty() {
        print_info("No tags yet. Add some with `ctfw solve --tags heap,uaf`");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        Cell::new("Tag").fg(Color::Cyan),
        Cell::new("Challenges").fg(Color::Cyan),
    ]);

    for tag in &snapshot.challenge_tags {
        let count = snapshot.challenges.iter().filter(|c| c.has_tag(tag)).count();
        table.add_row(vec![Cell::new(tag), Cell::new(count)]);
    }

    println!("{table}");
    Ok(())
}
