mod html;
mod progress;
mod styling;
mod summary;
mod tables;

pub use html::{HtmlRenderer, PageRenderer};
pub use progress::PhaseProgress;
pub use summary::print_summary;

use styling::{banner, muted};

/// Prints the `repopulse` banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        banner("📈 repopulse"),
        muted(env!("CARGO_PKG_VERSION")),
        muted("OSS repository trend dashboard")
    );
}
