//! Terminal output helpers shared by all commands.

use crossterm::style::Stylize;

/// Status icons for console messages.
#[derive(Debug, Clone)]
pub struct Icons {
    /// Success/completed state (✓)
    pub success: &'static str,
    /// Error/failed state (✗)
    pub error: &'static str,
    /// Warning state (⚠)
    pub warning: &'static str,
    /// Info/Tip state (ℹ)
    pub info: &'static str,
}

impl Default for Icons {
    fn default() -> Self {
        Self {
            success: "✓",
            error: "✗",
            warning: "⚠",
            info: "ℹ",
        }
    }
}

/// Console message writer.
#[derive(Debug, Clone, Default)]
pub struct Output {
    icons: Icons,
}

impl Output {
    /// Create a new output handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prints an informational message to the console.
    pub fn info(&self, msg: &str) {
        println!("  {} {}", self.icons.info, msg);
    }

    /// Prints a success message to the console.
    pub fn success(&self, msg: &str) {
        println!("{} {}", self.icons.success.green(), msg.green());
    }

    /// Prints a warning message to the console.
    pub fn warning(&self, msg: &str) {
        println!("{} {}", self.icons.warning.yellow(), msg.yellow());
    }

    /// Prints an error message to the console.
    pub fn error(&self, msg: &str) {
        eprintln!("{} {}", self.icons.error.red(), msg.red());
    }
}
