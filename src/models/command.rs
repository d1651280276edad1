//! Command lines accepted from the external input source.

/// Inputs that end the session.
pub const TERMINAL_COMMANDS: &[&str] = &["done", "exit", "quit"];

/// A trimmed, non-empty input line destined for the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    line: String,
}

impl Command {
    /// Build a command from a raw input line.
    ///
    /// Returns `None` when the line is blank after trimming.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let line = raw.trim();
        if line.is_empty() {
            return None;
        }
        Some(Self {
            line: line.to_owned(),
        })
    }

    /// The trimmed command text.
    #[must_use]
    pub fn line(&self) -> &str {
        &self.line
    }

    /// Whether this command ends the session.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        TERMINAL_COMMANDS.contains(&self.line.as_str())
    }
}
