use crate::rules::{is_valid_mode, is_valid_value, DeviceKey, Rule, RuleKey};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{event, Level};

pub const NOT_CONNECTED: &str = "Not Connected";

/// A rule from the rules file. Only the name can be edited; an empty name
/// removes the rule on the next update.
#[derive(Debug, Clone, PartialEq)]
pub struct KnownRow {
  pub rule: Rule,

  /// Name reported by the device listing, `None` if the device is not attached.
  pub connected: Option<String>,

  pub name: String,
}

impl KnownRow {
  pub fn new(rule: Rule, connected: Option<String>) -> Self {
    let name = rule.symlink_name.clone();
    Self {
      rule,
      connected,
      name,
    }
  }

  pub fn device_name(&self) -> &str {
    self.connected.as_deref().unwrap_or(NOT_CONNECTED)
  }
}

/// An attached device without a rule. Becomes a rule once it has a name.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDeviceRow {
  pub device: DeviceKey,
  pub description: String,
  pub serial: String,
  pub mode: String,
  pub name: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum EditError {
  #[error("Invalid mode {mode:?} for {device}, expected an octal permission such as 0666")]
  InvalidMode { device: DeviceKey, mode: String },

  #[error("Invalid symlink name {name:?} for {device}")]
  InvalidName { device: DeviceKey, name: String },

  #[error("Invalid serial {serial:?} for {device}")]
  InvalidSerial { device: DeviceKey, serial: String },

  #[error("{0} already has a rule")]
  DuplicateRule(RuleKey),

  #[error("There is no rule for {0}")]
  UnknownRule(RuleKey),
}

/// The two panels of the editor: existing rules and unconfigured devices.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleForm {
  pub known: Vec<KnownRow>,
  pub new_devices: Vec<NewDeviceRow>,
  pub default_mode: String,
}

fn edited_name(device: &DeviceKey, name: &str) -> Result<Option<String>, EditError> {
  let name = name.trim();
  if name.is_empty() {
    return Ok(None);
  }
  if !is_valid_value(name) {
    return Err(EditError::InvalidName {
      device: device.clone(),
      name: name.into(),
    });
  }
  Ok(Some(name.into()))
}

impl RuleForm {
  pub fn known_row_mut(&mut self, key: &RuleKey) -> Option<&mut KnownRow> {
    self.known.iter_mut().find(|row| row.rule.key() == *key)
  }

  /// Rules to write for the current edits: known rows first, in file order,
  /// then the named new devices.
  pub fn to_rules(&self) -> Result<Vec<Rule>, EditError> {
    let mut rules = Vec::with_capacity(self.known.len() + self.new_devices.len());

    for row in &self.known {
      match edited_name(&row.rule.device, &row.name)? {
        Some(name) => rules.push(Rule {
          symlink_name: name,
          ..row.rule.clone()
        }),
        None => {
          event!(target: "udev-symlink-manager", Level::INFO, rule = %row.rule.key(), "Removing rule with empty name");
        }
      }
    }

    let mut taken: HashSet<RuleKey> = rules.iter().map(Rule::key).collect();
    for row in &self.new_devices {
      let name = match edited_name(&row.device, &row.name)? {
        Some(name) => name,
        None => continue,
      };

      let serial = match row.serial.trim() {
        "" => None,
        serial if is_valid_value(serial) => Some(serial.to_owned()),
        serial => {
          return Err(EditError::InvalidSerial {
            device: row.device.clone(),
            serial: serial.into(),
          })
        }
      };

      let mode = match row.mode.trim() {
        "" => self.default_mode.clone(),
        mode if is_valid_mode(mode) => mode.to_owned(),
        mode => {
          return Err(EditError::InvalidMode {
            device: row.device.clone(),
            mode: mode.into(),
          })
        }
      };

      let rule = Rule {
        serial,
        ..Rule::new(row.device.clone(), mode, name)
      };
      if !taken.insert(rule.key()) {
        return Err(EditError::DuplicateRule(rule.key()));
      }
      rules.push(rule);
    }

    Ok(rules)
  }
}
