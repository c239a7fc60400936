use crate::prelude::AlertError;
use std::path::Path;
use std::process::{Command, Stdio};

/// Plays an audio asset to completion. Called from alert worker threads.
pub trait AudioPlayer: Send + Sync {
    fn play(&self, asset: &Path) -> Result<(), AlertError>;
}

/// Runs an external player program with the asset path as its last argument.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
}

impl CommandPlayer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn ffplay() -> Self {
        Self::new(
            "ffplay",
            ["-nodisp", "-autoexit", "-loglevel", "quiet"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }

    /// Parses `"program arg1 arg2"`; returns `None` for an empty string.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for CommandPlayer {
    fn default() -> Self {
        Self::ffplay()
    }
}

impl AudioPlayer for CommandPlayer {
    fn play(&self, asset: &Path) -> Result<(), AlertError> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(asset)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| AlertError::Playback(format!("{}: {}", self.program, e)))?;
        if status.success() {
            Ok(())
        } else {
            Err(AlertError::Playback(format!(
                "{} exited with {} for {}",
                self.program,
                status,
                asset.display()
            )))
        }
    }
}
