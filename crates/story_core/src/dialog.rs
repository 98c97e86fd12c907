//! User prompt collaborator.
//!
//! The session flow asks the user questions through this trait and blocks
//! until an answer comes back. Front ends provide the implementation.

use tracing::info;

/// Synchronous yes/no and notice prompts.
pub trait Dialog: Send + Sync {
    /// Presents a binary choice. Returns true for `option_a`.
    fn choice(&self, title: &str, message: &str, option_a: &str, option_b: &str) -> bool;

    /// Shows a notice the user must acknowledge.
    fn alert(&self, title: &str, message: &str);
}

/// Dialog that always gives the same answer without asking anyone.
///
/// Used when the user already decided (e.g. picked "resume" at startup) and
/// by unattended runs. Alerts are written to the log.
#[derive(Debug, Clone, Copy)]
pub struct FixedChoice(pub bool);

impl Dialog for FixedChoice {
    fn choice(&self, title: &str, _message: &str, option_a: &str, option_b: &str) -> bool {
        let picked = if self.0 { option_a } else { option_b };
        info!(title, choice = picked, "Answered prompt automatically");
        self.0
    }

    fn alert(&self, title: &str, message: &str) {
        info!(title, message, "Alert");
    }
}
