use crate::{
  reload::{CommandOutcome, ReloadError, ReloadReport, RuleDatabase},
  rules::{RuleStore, RuleStoreError},
  usb::{DeviceLister, ListError},
};
use async_trait::async_trait;
use std::{
  io,
  path::{Path, PathBuf},
  sync::{Arc, Mutex},
};

/// Rules file kept in memory. Clones share the content.
#[derive(Debug, Clone)]
pub struct MemoryStore {
  path: PathBuf,
  content: Arc<Mutex<Option<String>>>,
  read_only: bool,
  unreadable: Arc<Mutex<bool>>,
}

impl Default for MemoryStore {
  fn default() -> Self {
    Self {
      path: PathBuf::from("/etc/udev/rules.d/99-test.rules"),
      content: Arc::default(),
      read_only: false,
      unreadable: Arc::default(),
    }
  }
}

impl MemoryStore {
  pub fn with_content(content: &str) -> Self {
    let store = Self::default();
    *store.content.lock().unwrap() = Some(content.to_owned());
    store
  }

  pub fn read_only(mut self) -> Self {
    self.read_only = true;
    self
  }

  /// Makes every later load fail, for this store and its clones.
  pub fn make_unreadable(&self) {
    *self.unreadable.lock().unwrap() = true;
  }

  pub fn content(&self) -> Option<String> {
    self.content.lock().unwrap().clone()
  }
}

#[async_trait]
impl RuleStore for MemoryStore {
  fn location(&self) -> &Path {
    &self.path
  }

  async fn load(&self) -> Result<Option<String>, RuleStoreError> {
    if *self.unreadable.lock().unwrap() {
      return Err(RuleStoreError::Io {
        path: self.path.clone(),
        source: io::Error::from(io::ErrorKind::Other),
      });
    }

    Ok(self.content())
  }

  async fn replace(&self, content: &str) -> Result<(), RuleStoreError> {
    if self.read_only {
      return Err(RuleStoreError::PermissionDenied {
        path: self.path.clone(),
        source: io::Error::from(io::ErrorKind::PermissionDenied),
      });
    }

    *self.content.lock().unwrap() = Some(content.to_owned());
    Ok(())
  }
}

/// Lister returning a fixed `lsusb` output.
#[derive(Debug, Clone)]
pub struct StaticLister(Option<String>);

impl StaticLister {
  pub fn new(output: &str) -> Self {
    Self(Some(output.to_owned()))
  }

  pub fn failing() -> Self {
    Self(None)
  }
}

#[async_trait]
impl DeviceLister for StaticLister {
  async fn list(&self) -> Result<String, ListError> {
    self.0.clone().ok_or_else(|| ListError::InvalidOutput {
      program: "lsusb".into(),
    })
  }
}

/// Counts reloads instead of running `udevadm`.
#[derive(Debug, Clone, Default)]
pub struct RecordingDatabase {
  reloads: Arc<Mutex<usize>>,
  failure: Option<CommandOutcome>,
}

impl RecordingDatabase {
  pub fn failing_with(outcome: CommandOutcome) -> Self {
    Self {
      reloads: Arc::default(),
      failure: Some(outcome),
    }
  }

  pub fn reloads(&self) -> usize {
    *self.reloads.lock().unwrap()
  }
}

#[async_trait]
impl RuleDatabase for RecordingDatabase {
  async fn reload(&self) -> Result<ReloadReport, ReloadError> {
    *self.reloads.lock().unwrap() += 1;

    let mut report = ReloadReport::default();
    report.steps.push(CommandOutcome {
      command: "udevadm control --reload-rules".into(),
      code: Some(0),
    });
    report.steps.push(self.failure.clone().unwrap_or(CommandOutcome {
      command: "udevadm trigger".into(),
      code: Some(0),
    }));
    Ok(report)
  }
}
