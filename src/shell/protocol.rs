//! Synchronization markers embedded in the shell's input.

use uuid::Uuid;

/// Per-session synchronization strings.
///
/// The signature is generated once per session; all three derived strings
/// are immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncProtocol {
    signature: String,
    sentinel: String,
    stdout_marker: String,
    stderr_marker: String,
}

impl SyncProtocol {
    /// Generate a protocol around a fresh random signature.
    #[must_use]
    pub fn generate() -> Self {
        Self::with_signature(&Uuid::new_v4().to_string())
    }

    /// Build a protocol around a known signature.
    #[must_use]
    pub fn with_signature(signature: &str) -> Self {
        Self {
            signature: signature.to_owned(),
            sentinel: format!("{signature}\n"),
            stdout_marker: format!("echo \"{signature}\"\n"),
            stderr_marker: format!(">&2 echo \"{signature}\"\n"),
        }
    }

    /// The raw signature.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// The line the shell prints when a marker command runs.
    #[must_use]
    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    /// Shell command printing the sentinel on standard output.
    #[must_use]
    pub fn stdout_marker(&self) -> &str {
        &self.stdout_marker
    }

    /// Shell command printing the sentinel on standard error.
    #[must_use]
    pub fn stderr_marker(&self) -> &str {
        &self.stderr_marker
    }

    /// Bytes written to the shell for one non-terminal command: the command
    /// line, then the stderr marker, then the stdout marker.
    ///
    /// The stderr marker goes first so a command's error output tends to be
    /// delivered before the prompt that follows its standard output.
    #[must_use]
    pub fn command_script(&self, line: &str) -> String {
        let mut script =
            String::with_capacity(line.len() + 1 + self.stderr_marker.len() + self.stdout_marker.len());
        script.push_str(line);
        script.push('\n');
        script.push_str(&self.stderr_marker);
        script.push_str(&self.stdout_marker);
        script
    }
}
