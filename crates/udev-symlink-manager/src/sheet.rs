//! Document form of the editor, for editing the rules outside of the
//! interactive prompt.

use crate::{
  form::{EditError, NewDeviceRow, RuleForm},
  rules::{DeviceKey, RuleKey},
};
use serde::{Deserialize, Serialize};
use tracing::{event, Level};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
  // TOML cannot write an empty array after an array of tables, so empty
  // panels are left out and read back as defaults.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub known: Vec<KnownEntry>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub new: Vec<NewEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnownEntry {
  pub device: DeviceKey,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub serial: Option<String>,

  /// Informational, the mode of an existing rule is not edited.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub mode: Option<String>,

  /// New symlink name, empty removes the rule.
  #[serde(default)]
  pub name: String,

  /// Informational, the attached device's description.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub connected: Option<String>,
}

impl KnownEntry {
  fn key(&self) -> RuleKey {
    RuleKey {
      device: self.device.clone(),
      serial: self
        .serial
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntry {
  pub device: DeviceKey,

  #[serde(default)]
  pub description: String,

  #[serde(default)]
  pub serial: String,

  #[serde(default)]
  pub mode: String,

  #[serde(default)]
  pub name: String,
}

impl From<&RuleForm> for Sheet {
  fn from(form: &RuleForm) -> Self {
    Sheet {
      known: form
        .known
        .iter()
        .map(|row| KnownEntry {
          device: row.rule.device.clone(),
          serial: row.rule.serial.clone(),
          mode: Some(row.rule.mode.clone()),
          name: row.name.clone(),
          connected: row.connected.clone(),
        })
        .collect(),
      new: form
        .new_devices
        .iter()
        .map(|row| NewEntry {
          device: row.device.clone(),
          description: row.description.clone(),
          serial: row.serial.clone(),
          mode: row.mode.clone(),
          name: row.name.clone(),
        })
        .collect(),
    }
  }
}

impl Sheet {
  /// Copies the sheet's edits into the form. Rules the sheet does not mention
  /// are left as they are. New entries fill the matching device row, or are
  /// added as rows of their own when the device is not attached.
  pub fn apply_to(self, form: &mut RuleForm) -> Result<(), EditError> {
    for entry in self.known {
      let key = entry.key();
      match form.known_row_mut(&key) {
        Some(row) => row.name = entry.name,
        None => return Err(EditError::UnknownRule(key)),
      }
    }

    for entry in self.new {
      let row = form
        .new_devices
        .iter_mut()
        .find(|row| row.device == entry.device && row.name.trim().is_empty());

      match row {
        Some(row) => {
          row.serial = entry.serial;
          row.mode = entry.mode;
          row.name = entry.name;
        }
        None => {
          event!(target: "udev-symlink-manager", Level::INFO, device = %entry.device, "Adding rule for a device that is not attached");
          form.new_devices.push(NewDeviceRow {
            device: entry.device,
            description: entry.description,
            serial: entry.serial,
            mode: entry.mode,
            name: entry.name,
          });
        }
      }
    }

    Ok(())
  }
}
