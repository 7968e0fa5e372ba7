//! Challenge commands - add, remove, info, list

use crate::commands;
use crate::prompt;
use crate::style::*;
use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use ctf_workspace::{Category, Challenge, WorkspaceError};
use std::path::PathBuf;

pub fn add(
    config: Option<PathBuf>,
    name: String,
    category: Option<Category>,
    ctf: Option<String>,
) -> Result<()> {
    let mut ws = commands::open(config)?;
    let ctf = commands::select_ctf(&ws, ctf.as_deref(), |c| c.is_running(), "Select a CTF:")?;

    let category = match category {
        Some(category) => category,
        None => {
            let names: Vec<String> = Category::ALL.iter().map(|c| c.to_string()).collect();
            Category::ALL[prompt::fuzzy_select("Category", &names)?]
        }
    };

    let challenge = ws.add_challenge(&ctf.id, &name, category)?;
    ws.commit()?;

    print_success(&format!(
        "Added {} challenge {} to {}",
        challenge.category,
        entity(&challenge.name),
        entity(&ctf.name)
    ));
    print_key_value("Path", &challenge.path.display().to_string());
    Ok(())
}

pub fn remove(config: Option<PathBuf>, name: Option<String>, yes: bool) -> Result<()> {
    let mut ws = commands::open(config)?;
    let challenge =
        commands::select_challenge(&ws, name.as_deref(), |_| true, "Select a challenge to remove:")?;

    if !yes && !prompt::confirm(&format!("Remove challenge {}?", challenge.name), false)? {
        print_info("Nothing removed");
        return Ok(());
    }

    match ws.remove_challenge(&challenge.id, yes) {
        Ok(_) => {}
        Err(WorkspaceError::DirectoryNotEmpty(path)) => {
            let question = format!("{} is not empty. Delete it anyway?", path.display());
            if !prompt::confirm(&question, false)? {
                print_info("Nothing removed");
                return Ok(());
            }
            ws.remove_challenge(&challenge.id, true)?;
        }
        Err(err) => return Err(err.into()),
    }

    ws.commit()?;
    print_success(&format!("Removed challenge {}", entity(&challenge.name)));
    Ok(())
}

pub fn info(config: Option<PathBuf>, name: Option<String>) -> Result<()> {
    let ws = commands::open(config)?;
    let challenge =
        commands::select_challenge(&ws, name.as_deref(), |_| true, "Select a challenge to view:")?;

    print_header(&challenge.name);
    print_key_value("CTF", &commands::ctf_name(&ws, &challenge));
    print_key_value("Category", challenge.category.as_str());
    if let Some(points) = challenge.points {
        print_key_value("Points", &points.to_string());
    }
    print_key_value_colored("Status", challenge.solved.as_str(), solved_color(challenge.solved));
    if let Some(flag) = &challenge.flag {
        print_key_value("Flag", flag);
    }
    if let Some(tags) = challenge.tags.as_ref().filter(|t| !t.is_empty()) {
        print_key_value("Tags", &tags.iter().cloned().collect::<Vec<_>>().join(", "));
    }
    print_key_value("Path", &challenge.path.display().to_string());

    if let Some(extras) = &challenge.extras {
        if let Some(author) = &extras.author {
            print_key_value("Author", author);
        }
        if let Some(description) = &extras.description {
            print_section("Description");
            for line in description.lines() {
                println!("  {}", line);
            }
        }
        if !extras.attachments.is_empty() {
            print_section("Attachments");
            for attachment in &extras.attachments {
                println!("  {} {}", icon_bullet(), attachment.name);
            }
        }
        if !extras.hints.is_empty() {
            print_section("Hints");
            for hint in &extras.hints {
                println!("  {} {}", icon_bullet(), hint);
            }
        }
    }
    println!();
    Ok(())
}

pub fn list(
    config: Option<PathBuf>,
    ctf: Option<String>,
    unsolved: bool,
    tag: Option<String>,
) -> Result<()> {
    let ws = commands::open(config)?;
    let ctf_id = match &ctf {
        Some(name) => Some(ws.ctf_by_name(name)?.id),
        None => None,
    };

    let shown: Vec<&Challenge> = ws
        .snapshot()
        .challenges
        .iter()
        .filter(|c| ctf_id.map_or(true, |id| c.ctf_id == id))
        .filter(|c| !unsolved || !c.is_solved())
        .filter(|c| tag.as_deref().map_or(true, |t| c.has_tag(t)))
        .collect();

    if shown.is_empty() {
        print_info("No challenges found");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Name").fg(Color::Cyan),
            Cell::new("CTF").fg(Color::Cyan),
            Cell::new("Category").fg(Color::Cyan),
            Cell::new("Points").fg(Color::Cyan),
            Cell::new("Status").fg(Color::Cyan),
            Cell::new("Tags").fg(Color::Cyan),
        ]);

    for challenge in &shown {
        let status_color = if challenge.is_solved() { Color::Green } else { Color::Yellow };
        let tags = challenge
            .tags
            .as_ref()
            .map(|t| t.iter().cloned().collect::<Vec<_>>().join(", "))
            .unwrap_or_default();

        table.add_row(vec![
            Cell::new(&challenge.name).fg(Color::White),
            Cell::new(commands::ctf_name(&ws, challenge)),
            Cell::new(challenge.category.as_str()),
            Cell::new(challenge.points.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string())),
            Cell::new(challenge.solved.as_str()).fg(status_color),
            Cell::new(tags).fg(Color::DarkGrey),
        ]);
    }

    println!("{table}");
    let solved = shown.iter().filter(|c| c.is_solved()).count();
    println!("  {}", style_dim(&format!("{}/{} solved", solved, shown.len())));
    Ok(())
}
