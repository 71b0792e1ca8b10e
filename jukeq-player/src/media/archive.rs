//! External watched-playlist archiver
//!
//! Finished entries are handed to an operator-configured command with the
//! entry id appended as the final argument. The command is whatever tool the
//! operator uses to maintain their "already played" playlist.

use super::Archiver;
use crate::error::{Error, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

pub struct CommandArchiver {
    command: Vec<String>,
}

impl CommandArchiver {
    /// Returns `None` when the command list is empty (archiving disabled).
    pub fn from_command(command: Vec<String>) -> Option<Self> {
        if command.is_empty() {
            None
        } else {
            Some(CommandArchiver { command })
        }
    }
}

#[async_trait]
impl Archiver for CommandArchiver {
    async fn archive(&self, id: &str) -> Result<()> {
        info!("Archiving {} via {}", id, self.command[0]);
        let status = Command::new(&self.command[0])
            .args(&self.command[1..])
            .arg(id)
            .status()
            .await
            .map_err(|e| Error::Archive(format!("failed to run archiver: {}", e)))?;
        if !status.success() {
            return Err(Error::Archive(format!("archiver exited with {}", status)));
        }
        Ok(())
    }
}
