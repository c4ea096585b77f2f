//! Progress spinner for the close-loop command's long-running run.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const SPINNER_TEMPLATE: &str = "[{elapsed_precise}] {spinner:.green} {msg}";
const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Create a spinner for an indeterminate operation; hidden when `quiet`.
pub fn create_spinner(message: impl Into<String>, quiet: bool) -> ProgressBar {
    let spinner = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template(SPINNER_TEMPLATE)
            .expect("spinner template is a fixed valid literal")
            .tick_chars(SPINNER_CHARS),
    );
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Extension trait adding status-colored finish helpers to `ProgressBar`.
pub trait ProgressBarExt {
    fn finish_success(&self, message: impl Into<String>);
    fn finish_error(&self, message: impl Into<String>);
}

impl ProgressBarExt for ProgressBar {
    fn finish_success(&self, message: impl Into<String>) {
        self.finish_with_message(format!("✓ {}", message.into()));
    }

    fn finish_error(&self, message: impl Into<String>) {
        self.finish_with_message(format!("✗ {}", message.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_spinner_draws_nothing() {
        let spinner = create_spinner("working", true);
        assert!(spinner.is_hidden());
        spinner.finish_success("done");
    }

    #[test]
    fn visible_spinner_carries_its_message() {
        let spinner = create_spinner("working", false);
        assert!(!spinner.is_hidden());
        spinner.finish_error("boom");
    }
}
