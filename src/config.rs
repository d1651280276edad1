//! Session configuration parsing and validation.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::{AppError, Result};

/// Smallest accepted read buffer; a whole sentinel line must fit in one read.
pub const MIN_BUFFER_BYTES: usize = 64;

/// Output framing knobs for the two stream drainers.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct FramingConfig {
    /// Read buffer capacity for the shell's standard output.
    #[serde(default = "default_stdout_buffer_bytes")]
    pub stdout_buffer_bytes: usize,
    /// Read buffer capacity for the shell's standard error.
    #[serde(default = "default_stderr_buffer_bytes")]
    pub stderr_buffer_bytes: usize,
    /// Close short reads that do not end in a newline with a synthetic
    /// newline, and terminate sentinel-closed payloads with one.
    #[serde(default = "default_true")]
    pub synthesize_newline: bool,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            stdout_buffer_bytes: default_stdout_buffer_bytes(),
            stderr_buffer_bytes: default_stderr_buffer_bytes(),
            synthesize_newline: true,
        }
    }
}

fn default_stdout_buffer_bytes() -> usize {
    64 * 1024
}

fn default_stderr_buffer_bytes() -> usize {
    8 * 1024
}

fn default_true() -> bool {
    true
}

fn default_shell() -> String {
    "sh".into()
}

fn default_prompt() -> String {
    "\nauto-shell > ".into()
}

fn default_queue_capacity() -> usize {
    64
}

/// Configuration for one shell session, usually parsed from `autoshell.toml`.
///
/// Every key is optional; an empty document yields [`ShellConfig::default`].
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ShellConfig {
    /// Shell program spawned for the session.
    #[serde(default = "default_shell")]
    pub shell: String,
    /// Extra arguments passed to the shell program.
    #[serde(default)]
    pub shell_args: Vec<String>,
    /// Prompt text emitted at start-up and after every completed command.
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// Capacity of the command and fragment queues.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Deliver buffered partial output when the session closes instead of
    /// discarding it.
    #[serde(default)]
    pub flush_partial_on_close: bool,
    /// Deliver `log` messages for session start and close.
    #[serde(default)]
    pub lifecycle_messages: bool,
    /// Stream framing settings.
    #[serde(default)]
    pub framing: FramingConfig,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            shell_args: Vec::new(),
            prompt: default_prompt(),
            queue_capacity: default_queue_capacity(),
            flush_partial_on_close: false,
            lifecycle_messages: false,
            framing: FramingConfig::default(),
        }
    }
}

impl ShellConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the session relies on.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        if self.shell.trim().is_empty() {
            return Err(AppError::Config("shell must not be empty".into()));
        }

        if self.queue_capacity == 0 {
            return Err(AppError::Config(
                "queue_capacity must be greater than zero".into(),
            ));
        }

        for (key, value) in [
            ("framing.stdout_buffer_bytes", self.framing.stdout_buffer_bytes),
            ("framing.stderr_buffer_bytes", self.framing.stderr_buffer_bytes),
        ] {
            if value < MIN_BUFFER_BYTES {
                return Err(AppError::Config(format!(
                    "{key} must be at least {MIN_BUFFER_BYTES}"
                )));
            }
        }

        Ok(())
    }
}
