use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use tokio::{io, process::Command};
use tracing::{event, Level};

/// Result of one reload command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
  pub command: String,

  /// Exit code, `None` when the command was killed by a signal.
  pub code: Option<i32>,
}

impl CommandOutcome {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }
}

impl fmt::Display for CommandOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.code {
      Some(0) => write!(f, "`{}` succeeded", self.command),
      Some(code) => write!(f, "`{}` exited with code {}", self.command, code),
      None => write!(f, "`{}` was terminated by a signal", self.command),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadReport {
  pub steps: Vec<CommandOutcome>,
}

impl ReloadReport {
  pub fn is_success(&self) -> bool {
    self.steps.iter().all(CommandOutcome::success)
  }

  pub fn failures(&self) -> impl Iterator<Item = &CommandOutcome> {
    self.steps.iter().filter(|s| !s.success())
  }
}

#[derive(Debug, Error)]
pub enum ReloadError {
  #[error("Failed to run `{command}`")]
  Spawn {
    command: String,
    #[source]
    source: io::Error,
  },
}

/// The device manager's rule database.
#[async_trait]
pub trait RuleDatabase: Send + Sync {
  /// Re-reads rule definitions and re-triggers device events.
  async fn reload(&self) -> Result<ReloadReport, ReloadError>;
}

const RELOAD_RULES: &[&str] = &["control", "--reload-rules"];
const TRIGGER: &[&str] = &["trigger"];

/// Reloads through `udevadm`, optionally elevated with `sudo`.
#[derive(Debug, Clone)]
pub struct Udevadm {
  program: String,
  sudo: bool,
}

impl Udevadm {
  pub fn new(program: impl Into<String>, sudo: bool) -> Self {
    Self {
      program: program.into(),
      sudo,
    }
  }

  fn command_line(&self, args: &[&str]) -> Vec<String> {
    let mut line = Vec::with_capacity(args.len() + 2);
    if self.sudo {
      line.push("sudo".to_owned());
    }
    line.push(self.program.clone());
    line.extend(args.iter().map(|a| (*a).to_owned()));
    line
  }

  async fn run(&self, args: &[&str]) -> Result<CommandOutcome, ReloadError> {
    let line = self.command_line(args);
    let command = line.join(" ");
    event!(target: "udev-symlink-manager", Level::DEBUG, %command, "Running reload command");

    let status = Command::new(&line[0])
      .args(&line[1..])
      .status()
      .await
      .map_err(|source| ReloadError::Spawn {
        command: command.clone(),
        source,
      })?;

    let outcome = CommandOutcome {
      command,
      code: status.code(),
    };
    if !outcome.success() {
      event!(target: "udev-symlink-manager", Level::WARN, "{}", outcome);
    }

    Ok(outcome)
  }
}

#[async_trait]
impl RuleDatabase for Udevadm {
  async fn reload(&self) -> Result<ReloadReport, ReloadError> {
    let mut report = ReloadReport::default();
    report.steps.push(self.run(RELOAD_RULES).await?);
    report.steps.push(self.run(TRIGGER).await?);
    Ok(report)
  }
}
