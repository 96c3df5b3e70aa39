mod parse;

use serde::{Deserialize, Serialize};
use std::{
  fmt,
  path::{Path, PathBuf},
  sync::Arc,
};

pub use parse::{parse_document, read_document, render_document, ConfigError, ConfigFormat};

pub const DEFAULT_RULES_FILE: &str = "/etc/udev/rules.d/99-usb-symlinks.rules";
pub const DEFAULT_MODE: &str = "0666";

/// Command that lists attached usb devices in `lsusb` format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ListerConfig {
  pub program: String,
  pub args: Vec<String>,
}

impl Default for ListerConfig {
  fn default() -> Self {
    Self {
      program: "lsusb".into(),
      args: Vec::new(),
    }
  }
}

/// How to reach `udevadm` for reloading the rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UdevadmConfig {
  pub program: String,

  /// Run through `sudo`
  pub sudo: bool,
}

impl Default for UdevadmConfig {
  fn default() -> Self {
    Self {
      program: "udevadm".into(),
      sudo: true,
    }
  }
}

mod inner {
  use super::*;

  #[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
  #[serde(rename_all = "camelCase", default)]
  pub(super) struct Config {
    pub(super) rules_file: PathBuf,
    pub(super) default_mode: String,
    pub(super) lister: ListerConfig,
    pub(super) udevadm: UdevadmConfig,
  }

  impl Default for Config {
    fn default() -> Self {
      Self {
        rules_file: DEFAULT_RULES_FILE.into(),
        default_mode: DEFAULT_MODE.into(),
        lister: ListerConfig::default(),
        udevadm: UdevadmConfig::default(),
      }
    }
  }
}

#[derive(Clone, PartialEq, Default)]
pub struct Config {
  inner: Arc<inner::Config>,
}

impl Config {
  /// Rules file holding the symlink bindings
  pub fn rules_file(&self) -> &Path {
    &self.inner.rules_file
  }

  /// Mode offered for devices without a rule
  pub fn default_mode(&self) -> &str {
    &self.inner.default_mode
  }

  /// Device listing command
  pub fn lister(&self) -> &ListerConfig {
    &self.inner.lister
  }

  /// Rule database reload commands
  pub fn udevadm(&self) -> &UdevadmConfig {
    &self.inner.udevadm
  }

  pub fn with_rules_file(mut self, rules_file: impl Into<PathBuf>) -> Self {
    Arc::make_mut(&mut self.inner).rules_file = rules_file.into();
    self
  }
}

impl From<inner::Config> for Config {
  fn from(inner: inner::Config) -> Self {
    Self {
      inner: Arc::new(inner),
    }
  }
}

impl fmt::Debug for Config {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(&*self.inner, f)
  }
}

impl Serialize for Config {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    Serialize::serialize(&*self.inner, serializer)
  }
}

impl<'de> Deserialize<'de> for Config {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: serde::Deserializer<'de>,
  {
    <inner::Config as Deserialize>::deserialize(deserializer).map(Self::from)
  }
}

impl Config {
  pub async fn read(file: impl AsRef<Path>, format: ConfigFormat) -> Result<Config, ConfigError> {
    parse::read_config(file, format).await
  }
}
