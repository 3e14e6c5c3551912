//! Shared styling utilities for the CLI.

use console::Style;

use mergepane_core::models::{ConflictClass, Decision};

/// Create a success-styled string (green with checkmark).
pub fn success(msg: &str) -> String {
    let style = Style::new().green();
    format!("{} {}", style.apply_to("✓"), msg)
}

/// Create an error-styled string (red with cross).
pub fn error(msg: &str) -> String {
    let style = Style::new().red();
    format!("{} {}", style.apply_to("✗"), msg)
}

/// Create a warning-styled string (yellow).
pub fn warn(msg: &str) -> String {
    let style = Style::new().yellow();
    format!("{} {}", style.apply_to("⚠"), msg)
}

/// Create a header-styled string (bold, white).
pub fn header(msg: &str) -> String {
    let style = Style::new().bold();
    style.apply_to(msg).to_string()
}

/// Create a dim-styled string.
pub fn dim(msg: &str) -> String {
    let style = Style::new().dim();
    style.apply_to(msg).to_string()
}

/// Region class label: conflicts red, one-sided changes blue.
pub fn class(class: ConflictClass) -> String {
    let style = match class {
        ConflictClass::Conflicting => Style::new().red().bold(),
        ConflictClass::OursOnly | ConflictClass::TheirsOnly => Style::new().blue(),
    };
    style.apply_to(class).to_string()
}

pub fn decision(decision: Option<Decision>) -> String {
    match decision {
        None => dim("-"),
        Some(Decision::Undecided) => Style::new().yellow().apply_to("undecided").to_string(),
        Some(Decision::Accepted) => Style::new().green().apply_to("accepted").to_string(),
        Some(Decision::Ignored) => dim("ignored"),
    }
}

/// Colour one line of a unified diff.
pub fn patch_line(line: &str) -> String {
    let style = if line.starts_with("+++") || line.starts_with("---") {
        Style::new().bold()
    } else if line.starts_with('+') {
        Style::new().green()
    } else if line.starts_with('-') {
        Style::new().red()
    } else if line.starts_with("@@") {
        Style::new().cyan()
    } else {
        return line.to_string();
    };
    style.apply_to(line).to_string()
}
