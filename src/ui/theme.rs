//! Colors and badges for outcomes and severities

use colored::{Color, Colorize};

use super::OutputMode;
use crate::results::{Outcome, Severity};

pub fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Critical => Color::BrightRed,
        Severity::High => Color::Red,
        Severity::Medium => Color::Yellow,
        Severity::Low => Color::Blue,
        Severity::Info => Color::White,
    }
}

pub fn outcome_color(outcome: Outcome) -> Color {
    match outcome {
        Outcome::Pass => Color::Green,
        Outcome::Fail => Color::Red,
        Outcome::Error => Color::BrightRed,
        Outcome::Skip => Color::BrightBlack,
        Outcome::Tolerated => Color::Yellow,
    }
}

/// Fixed-width status badge, e.g. `PASS` or `[FAIL]`
pub fn outcome_badge(outcome: Outcome, mode: OutputMode) -> String {
    let label = match outcome {
        Outcome::Pass => "PASS",
        Outcome::Fail => "FAIL",
        Outcome::Error => "ERR ",
        Outcome::Skip => "SKIP",
        Outcome::Tolerated => "WARN",
    };
    if mode.colors_enabled() {
        label.color(outcome_color(outcome)).bold().to_string()
    } else {
        format!("[{}]", label.trim_end())
    }
}

pub fn severity_label(severity: Severity, mode: OutputMode) -> String {
    let label = severity.as_str().to_uppercase();
    if mode.colors_enabled() {
        label.color(severity_color(severity)).to_string()
    } else {
        label
    }
}
