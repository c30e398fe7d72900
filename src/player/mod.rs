use std::process::{Child, Command, Stdio};

use tracing::debug;

use crate::error::{Error, Result};

/// Launches the configured external player with a stream URL. The child is
/// detached from the UI loop; the caller keeps the handle for reaping.
pub struct ExternalPlayer {
    command: String,
    args: Vec<String>,
}

impl ExternalPlayer {
    pub fn new(command: String, args: Vec<String>) -> Self {
        Self { command, args }
    }

    /// Launch the player with the given URL.
    pub fn play(&self, url: &str) -> Result<Child> {
        let mut cmd = Command::new(&self.command);

        // Suppress player output to avoid polluting the TUI
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());

        for arg in &self.args {
            cmd.arg(arg);
        }

        cmd.arg(url);

        debug!(player = %self.command, url, "Launching external player");

        cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::PlayerNotFound(self.command.clone())
            } else {
                Error::PlayerLaunch(e.to_string())
            }
        })
    }
}
