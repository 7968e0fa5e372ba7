//! Terminal styling for CLI output

use ctf_workspace::{RunState, Solved};

/// ANSI color codes
pub mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";

    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";
}

use colors::*;

/// Wrap `s` in `code` unless stdout is not a color terminal
fn paint(code: &str, s: &str) -> String {
    if console::colors_enabled() {
        format!("{}{}{}", code, s, RESET)
    } else {
        s.to_string()
    }
}

pub fn style_bold(s: &str) -> String {
    paint(BOLD, s)
}

pub fn style_dim(s: &str) -> String {
    paint(DIM, s)
}

pub fn style_red(s: &str) -> String {
    paint(RED, s)
}

pub fn style_yellow(s: &str) -> String {
    paint(YELLOW, s)
}

pub fn style_cyan(s: &str) -> String {
    paint(CYAN, s)
}

pub fn style_gray(s: &str) -> String {
    paint(GRAY, s)
}

// Status indicators
pub fn icon_success() -> String {
    paint(GREEN, "✓")
}

pub fn icon_error() -> String {
    paint(RED, "✗")
}

pub fn icon_warning() -> String {
    paint(YELLOW, "⚠")
}

pub fn icon_info() -> String {
    paint(BLUE, "ℹ")
}

pub fn icon_bullet() -> String {
    paint(GRAY, "•")
}

// Print helpers
pub fn print_success(msg: &str) {
    println!("{} {}", icon_success(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", icon_error(), style_red(msg));
}

pub fn print_warning(msg: &str) {
    println!("{} {}", icon_warning(), style_yellow(msg));
}

pub fn print_info(msg: &str) {
    println!("{} {}", icon_info(), msg);
}

pub fn print_header(title: &str) {
    println!();
    let rule = "─".repeat(50usize.saturating_sub(title.chars().count()));
    println!("{}", paint(&format!("{}{}", BOLD, CYAN), &format!("{} {}", title, rule)));
    println!();
}

pub fn print_section(title: &str) {
    println!();
    println!("  {}", style_bold(title));
    println!("  {}", style_dim(&"─".repeat(40)));
}

pub fn print_key_value(key: &str, value: &str) {
    println!("  {} {}", style_gray(&format!("{}:", key)), value);
}

pub fn print_key_value_colored(key: &str, value: &str, color: &str) {
    println!("  {} {}", style_gray(&format!("{}:", key)), paint(color, value));
}

/// `name` highlighted the way entity names appear in messages
pub fn entity(name: &str) -> String {
    paint(CYAN, name)
}

pub fn solved_color(solved: Solved) -> &'static str {
    match solved {
        Solved::Solved => GREEN,
        Solved::Unsolved => YELLOW,
    }
}

pub fn state_color(state: RunState) -> &'static str {
    match state {
        RunState::Running => GREEN,
        RunState::Stopped => GRAY,
    }
}
