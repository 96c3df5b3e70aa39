mod parse;
mod render;
mod store;

use serde::{
  de::{self, Unexpected, Visitor},
  Deserialize, Serialize,
};
use std::{fmt, str::FromStr};
use thiserror::Error;

pub use parse::{parse_rules, ParseWarning, ParsedRules, RequiredField};
pub use render::render_rules;
pub use store::{FileRuleStore, RuleStore, RuleStoreError};

pub(crate) const VENDOR_ATTR: &str = "ATTRS{idVendor}";
pub(crate) const PRODUCT_ATTR: &str = "ATTRS{idProduct}";
pub(crate) const SERIAL_ATTR: &str = "ATTRS{serial}";
pub(crate) const MODE_KEY: &str = "MODE";
pub(crate) const SYMLINK_KEY: &str = "SYMLINK";

pub(crate) const SUBSYSTEM_KEY: &str = "SUBSYSTEM";
pub(crate) const SUBSYSTEMS_KEY: &str = "SUBSYSTEMS";

/// Selectors written in front of rules that do not name their own.
pub(crate) const DEFAULT_SUBSYSTEM: &str = "tty";
pub(crate) const DEFAULT_SUBSYSTEMS: &str = "usb";

/// Vendor/product pair of a usb device, rendered as `vvvv:pppp`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceKey {
  pub vendor_id: String,
  pub product_id: String,
}

impl DeviceKey {
  pub fn new(vendor_id: impl Into<String>, product_id: impl Into<String>) -> Self {
    Self {
      vendor_id: vendor_id.into(),
      product_id: product_id.into(),
    }
  }
}

impl fmt::Display for DeviceKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.vendor_id, self.product_id)
  }
}

#[derive(Debug, Error, PartialEq)]
#[error("Invalid usb device id {0:?}, expected 'vvvv:pppp' with 4 hex digits each")]
pub struct InvalidDeviceKey(String);

fn is_usb_id(text: &str) -> bool {
  text.len() == 4 && text.chars().all(|c| c.is_ascii_hexdigit())
}

impl FromStr for DeviceKey {
  type Err = InvalidDeviceKey;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().split_once(':') {
      Some((vendor, product)) if is_usb_id(vendor) && is_usb_id(product) => {
        Ok(DeviceKey::new(vendor, product))
      }
      _ => Err(InvalidDeviceKey(s.into())),
    }
  }
}

impl Serialize for DeviceKey {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.collect_str(self)
  }
}

struct DeviceKeyVisitor;
impl<'de> Visitor<'de> for DeviceKeyVisitor {
  type Value = DeviceKey;

  fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str("a usb id pair formatted as 'vvvv:pppp'")
  }

  fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
  where
    E: de::Error,
  {
    v.parse()
      .map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
  }
}

impl<'de> Deserialize<'de> for DeviceKey {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: serde::Deserializer<'de>,
  {
    deserializer.deserialize_str(DeviceKeyVisitor)
  }
}

/// Identity of a rule: the device pair plus the serial, if the rule has one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuleKey {
  pub device: DeviceKey,
  pub serial: Option<String>,
}

impl fmt::Display for RuleKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.serial {
      None => fmt::Display::fmt(&self.device, f),
      Some(serial) => write!(f, "{} (serial {})", self.device, serial),
    }
  }
}

/// A single `SYMLINK+=` binding read from or written to the rules file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
  /// `SUBSYSTEM==` selector, kept as read from the file.
  pub subsystem: String,
  /// `SUBSYSTEMS==` selector, kept as read from the file.
  pub subsystems: String,
  pub device: DeviceKey,
  pub serial: Option<String>,
  pub mode: String,
  pub symlink_name: String,

  /// Clauses the parser does not understand, carried over verbatim.
  pub extra_clauses: Vec<String>,
}

impl Rule {
  pub fn new(device: DeviceKey, mode: impl Into<String>, symlink_name: impl Into<String>) -> Self {
    Self {
      subsystem: DEFAULT_SUBSYSTEM.into(),
      subsystems: DEFAULT_SUBSYSTEMS.into(),
      device,
      serial: None,
      mode: mode.into(),
      symlink_name: symlink_name.into(),
      extra_clauses: Vec::new(),
    }
  }

  pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
    self.serial = Some(serial.into());
    self
  }

  pub fn key(&self) -> RuleKey {
    RuleKey {
      device: self.device.clone(),
      serial: self.serial.clone(),
    }
  }
}

/// Octal permission string such as `0666` or `660`.
pub fn is_valid_mode(mode: &str) -> bool {
  (3..=4).contains(&mode.len()) && mode.chars().all(|c| ('0'..='7').contains(&c))
}

/// Values are written between double quotes in a comma separated line, so
/// neither character may appear inside them.
pub fn is_valid_value(value: &str) -> bool {
  !value.is_empty() && !value.contains(|c: char| c == '"' || c == ',' || c.is_control())
}
