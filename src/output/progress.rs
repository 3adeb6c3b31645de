use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{highlight, section_title, success};

/// Spinner shown on stderr while a long step runs
pub struct PhaseProgress {
    pb: ProgressBar,
}

impl PhaseProgress {
    pub fn start(title: &str, message: &str) -> Self {
        eprintln!("{}", section_title("⚙️ ", title));
        let pb = create_spinner(highlight(message).to_string());
        Self { pb }
    }

    pub fn finish(self, message: &str) {
        self.pb
            .finish_with_message(success(format!("{message} ✓")).to_string());
        eprintln!();
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::default_spinner().template("  {msg} {spinner}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
