//! User interface components for the mcpcheck CLI
//!
//! 1. **OutputMode**: interactive, CI or plain
//! 2. **Printer**: mode-aware line output
//! 3. **PhaseSpinner**: progress for long phases, hidden outside terminals

pub mod output;
pub mod progress;
pub mod theme;

pub use output::{OutputMode, Printer};
pub use progress::PhaseSpinner;
