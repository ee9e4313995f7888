//! Terminal styling for merge reports and prompts.

use console::Style;

use worksync_core::models::{ChangeType, ResultSide};

fn marked(mark: &str, style: Style, msg: &str) -> String {
    format!("{} {}", style.apply_to(mark), msg)
}

/// A finished step, e.g. "No user action required".
pub fn success(msg: &str) -> String {
    marked("✓", Style::new().green(), msg)
}

pub fn error(msg: &str) -> String {
    marked("✗", Style::new().red().bold(), msg)
}

/// Something the user still has to look at.
pub fn warn(msg: &str) -> String {
    marked("!", Style::new().yellow().bold(), msg)
}

/// Section title above a table or list.
pub fn header(msg: &str) -> String {
    Style::new().bold().underlined().apply_to(msg).to_string()
}

pub fn dim(msg: &str) -> String {
    Style::new().dim().apply_to(msg).to_string()
}

/// A change classification: additions green, deletions red, modifications
/// yellow.
pub fn change(change: ChangeType) -> String {
    let style = match change {
        ChangeType::Add => Style::new().green(),
        ChangeType::Delete => Style::new().red(),
        ChangeType::Modify => Style::new().yellow(),
        ChangeType::None => Style::new().dim(),
    };
    style.apply_to(change).to_string()
}

/// The side a conflict was resolved toward, or a dim dash while open.
pub fn side(side: Option<ResultSide>) -> String {
    match side {
        Some(ResultSide::Local) => Style::new().blue().bold().apply_to("local").to_string(),
        Some(ResultSide::Remote) => Style::new().magenta().bold().apply_to("remote").to_string(),
        Some(ResultSide::Base) => "base".to_string(),
        None => dim("-"),
    }
}
