use std::fmt::Display;

use console::{style, StyledObject};

/// Icon plus underlined title, used above report sections and spinners.
pub fn section_title(icon: &str, title: &str) -> String {
    format!("{} {}", style(icon).bright(), style(title).bright().underlined())
}

/// Field labels, timestamps and footnotes.
pub fn muted(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).dim()
}

pub fn project_name(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).cyan()
}

/// Window, mode and in-progress messages; also section warnings.
pub fn highlight(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().yellow()
}

pub fn success(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().green()
}

pub fn failure(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().red()
}

pub fn banner(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).magenta().bold()
}
