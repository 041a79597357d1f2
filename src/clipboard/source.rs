//! clipkeep - OS clipboard access
//!
//! Boundary to the X11 selection buffers, backed by the xclip CLI

use std::fmt;
use std::process::Stdio;

use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::models::Target;

/// A distinct X11 selection buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ClipSelection {
    Primary,
    Secondary,
    Clipboard,
}

impl ClipSelection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipSelection::Primary => "primary",
            ClipSelection::Secondary => "secondary",
            ClipSelection::Clipboard => "clipboard",
        }
    }
}

impl fmt::Display for ClipSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from the external clipboard tool
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to run xclip: {0}")]
    Io(#[from] std::io::Error),
    #[error("xclip exited with {status}: {stderr}")]
    Command {
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Read/write access to one clipboard source.
///
/// Monitors only list targets and read; the copy path writes.
#[async_trait]
pub trait ClipboardSource: Send + Sync {
    /// Target atoms the current selection owner offers
    async fn targets(&self, selection: ClipSelection) -> Result<Vec<Target>, SourceError>;

    /// Content of the selection in the given target format
    async fn read(&self, selection: ClipSelection, target: &Target) -> Result<Vec<u8>, SourceError>;

    /// Take ownership of the selection with the given content
    async fn write(
        &self,
        selection: ClipSelection,
        target: &Target,
        content: &[u8],
    ) -> Result<(), SourceError>;
}

/// The real clipboard, driven through xclip subprocesses.
///
/// xclip externally serializes selection ownership, so no in-process lock
/// is held around these calls.
pub struct XClipSource;

impl XClipSource {
    async fn output(&self, args: &[&str]) -> Result<Vec<u8>, SourceError> {
        let output = Command::new("xclip")
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await?;
        if !output.status.success() {
            return Err(SourceError::Command {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl ClipboardSource for XClipSource {
    async fn targets(&self, selection: ClipSelection) -> Result<Vec<Target>, SourceError> {
        let stdout = self
            .output(&[
                "-o",
                "-target",
                "TARGETS",
                "-selection",
                selection.as_str(),
                "-silent",
            ])
            .await?;
        Ok(String::from_utf8_lossy(&stdout)
            .lines()
            .filter(|line| !line.is_empty())
            .map(Target::from)
            .collect())
    }

    async fn read(&self, selection: ClipSelection, target: &Target) -> Result<Vec<u8>, SourceError> {
        self.output(&[
            "-o",
            "-selection",
            selection.as_str(),
            "-target",
            target.as_str(),
            "-silent",
        ])
        .await
    }

    async fn write(
        &self,
        selection: ClipSelection,
        target: &Target,
        content: &[u8],
    ) -> Result<(), SourceError> {
        let mut child = Command::new("xclip")
            .args([
                "-i",
                "-selection",
                selection.as_str(),
                "-target",
                target.as_str(),
                "-silent",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(content).await?;
        }
        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(SourceError::Command {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}
