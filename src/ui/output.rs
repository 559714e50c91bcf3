//! Output mode detection and the report printer
//!
//! The mode decides whether the terminal report gets colors, unicode rules
//! and spinners. `Printer` writes the report through any `io::Write`, so the
//! terminal summary and the plain-text file report share one layout.

use std::io::{self, IsTerminal, Write};

use colored::Colorize;

/// How much decoration the terminal can take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Interactive terminal with colors and unicode
    Interactive,
    /// CI environment - plain text, no colors
    CI,
    /// Piped output or `--no-color`
    Plain,
}

impl OutputMode {
    pub fn detect() -> Self {
        if is_ci::cached() {
            return OutputMode::CI;
        }
        if io::stdout().is_terminal() {
            OutputMode::Interactive
        } else {
            OutputMode::Plain
        }
    }

    /// Detected mode, forced to plain by `--no-color` or `NO_COLOR`
    pub fn resolve(no_color: bool) -> Self {
        if no_color || std::env::var_os("NO_COLOR").is_some() {
            colored::control::set_override(false);
            return OutputMode::Plain;
        }
        Self::detect()
    }

    pub fn colors_enabled(&self) -> bool {
        matches!(self, OutputMode::Interactive)
    }

    pub fn unicode_enabled(&self) -> bool {
        matches!(self, OutputMode::Interactive)
    }

    /// Spinners only make sense on an interactive terminal
    pub fn progress_enabled(&self) -> bool {
        matches!(self, OutputMode::Interactive)
    }
}

const RULE_WIDTH: usize = 60;

/// Line writer for the text report
pub struct Printer<W: Write> {
    mode: OutputMode,
    out: W,
}

impl Printer<io::Stdout> {
    pub fn stdout(mode: OutputMode) -> Self {
        Self::new(io::stdout(), mode)
    }
}

impl<W: Write> Printer<W> {
    pub fn new(out: W, mode: OutputMode) -> Self {
        Self { mode, out }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{}", text)
    }

    pub fn blank(&mut self) -> io::Result<()> {
        writeln!(self.out)
    }

    pub fn rule(&mut self) -> io::Result<()> {
        if self.mode.unicode_enabled() {
            writeln!(self.out, "{}", "━".repeat(RULE_WIDTH).dimmed())
        } else {
            writeln!(self.out, "{}", "-".repeat(RULE_WIDTH))
        }
    }

    /// Report title or category heading
    pub fn heading(&mut self, text: &str) -> io::Result<()> {
        if self.mode.colors_enabled() {
            writeln!(self.out, "{}", text.cyan().bold())
        } else {
            writeln!(self.out, "{}", text)
        }
    }

    pub fn field(&mut self, key: &str, value: &str) -> io::Result<()> {
        if self.mode.colors_enabled() {
            writeln!(self.out, "  {}: {}", key.cyan(), value)
        } else {
            writeln!(self.out, "  {}: {}", key, value)
        }
    }

    /// Indented line under a result
    pub fn detail(&mut self, text: &str) -> io::Result<()> {
        let text = format!("         {}", text);
        if self.mode.colors_enabled() {
            writeln!(self.out, "{}", text.dimmed())
        } else {
            writeln!(self.out, "{}", text)
        }
    }

    /// Closing tally, marked by whether the run succeeded
    pub fn verdict(&mut self, success: bool, text: &str) -> io::Result<()> {
        let symbol = match (success, self.mode.unicode_enabled()) {
            (true, true) => "✓",
            (false, true) => "✗",
            (true, false) => "[OK]",
            (false, false) => "[FAILED]",
        };
        if self.mode.colors_enabled() {
            let text = if success { text.green() } else { text.red() };
            writeln!(self.out, "{} {}", symbol, text.bold())
        } else {
            writeln!(self.out, "{} {}", symbol, text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn written(mode: OutputMode, f: impl FnOnce(&mut Printer<Vec<u8>>) -> io::Result<()>) -> String {
        let mut printer = Printer::new(Vec::new(), mode);
        f(&mut printer).unwrap();
        String::from_utf8(printer.into_inner()).unwrap()
    }

    #[test]
    fn only_interactive_decorates() {
        assert!(OutputMode::Interactive.colors_enabled());
        assert!(OutputMode::Interactive.progress_enabled());
        for mode in [OutputMode::CI, OutputMode::Plain] {
            assert!(!mode.colors_enabled());
            assert!(!mode.unicode_enabled());
            assert!(!mode.progress_enabled());
        }
    }

    #[test]
    fn no_color_forces_plain() {
        assert_eq!(OutputMode::resolve(true), OutputMode::Plain);
    }

    #[test]
    fn plain_layout() {
        let text = written(OutputMode::Plain, |p| {
            p.heading("TOOLS")?;
            p.field("Server", "server.py")?;
            p.detail("p95 12ms")?;
            p.rule()
        });
        assert_eq!(
            text,
            format!("TOOLS\n  Server: server.py\n         p95 12ms\n{}\n", "-".repeat(60))
        );
    }

    #[test]
    fn verdict_marks_failure_in_the_same_stream() {
        assert_eq!(
            written(OutputMode::CI, |p| p.verdict(false, "2 checks: 1 failed")),
            "[FAILED] 2 checks: 1 failed\n"
        );
        assert_eq!(
            written(OutputMode::Plain, |p| p.verdict(true, "2 checks: 2 passed")),
            "[OK] 2 checks: 2 passed\n"
        );
    }

    #[test]
    fn interactive_uses_unicode_marks() {
        let text = written(OutputMode::Interactive, |p| p.verdict(true, "done"));
        assert!(text.starts_with('✓'));
        assert_eq!(Printer::stdout(OutputMode::CI).mode(), OutputMode::CI);
    }
}
