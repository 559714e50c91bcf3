//! Phase spinner for long-running harness phases

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use super::OutputMode;

/// Spinner shown while a phase runs; inert outside interactive terminals
pub struct PhaseSpinner {
    bar: Option<ProgressBar>,
}

impl PhaseSpinner {
    pub fn start(mode: OutputMode, message: &str) -> Self {
        if !mode.progress_enabled() {
            return Self { bar: None };
        }

        let unicode = mode.unicode_enabled();
        let (template, ticks) = if unicode {
            ("{spinner:.cyan} {msg} {elapsed:.dim}", "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
        } else {
            ("[{elapsed}] {msg}", "-\\|/ ")
        };
        let style = ProgressStyle::default_spinner()
            .template(template)
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars(ticks);

        let bar = ProgressBar::new_spinner();
        bar.set_style(style);
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar: Some(bar) }
    }

    pub fn is_visible(&self) -> bool {
        self.bar.is_some()
    }

    pub fn set_message(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(message.to_string());
        }
    }

    pub fn finish_and_clear(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

impl Drop for PhaseSpinner {
    fn drop(&mut self) {
        if let Some(bar) = &self.bar {
            if !bar.is_finished() {
                bar.finish_and_clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_in_plain_mode() {
        let spinner = PhaseSpinner::start(OutputMode::Plain, "Validating");
        assert!(!spinner.is_visible());
        spinner.set_message("still fine");
        spinner.finish_and_clear();
    }

    #[test]
    fn interactive_spinner_finishes() {
        let spinner = PhaseSpinner::start(OutputMode::Interactive, "Load test");
        assert!(spinner.is_visible());
        spinner.set_message("step 2");
        spinner.finish_and_clear();
    }
}
