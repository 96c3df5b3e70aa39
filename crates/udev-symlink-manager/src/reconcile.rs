use crate::{
  form::{KnownRow, NewDeviceRow, RuleForm},
  rules::Rule,
  usb::DeviceMap,
};
use std::collections::HashSet;
use tracing::{event, Level};

/// Splits the attached devices into rows for existing rules and rows for
/// devices that have no rule yet. Devices match rules on their
/// vendor/product pair only.
pub fn reconcile(rules: &[Rule], devices: &DeviceMap, default_mode: &str) -> RuleForm {
  let known: Vec<KnownRow> = rules
    .iter()
    .map(|rule| {
      let connected = devices
        .get(&rule.device)
        .map(|device| device.display_name.clone());
      KnownRow::new(rule.clone(), connected)
    })
    .collect();

  let configured: HashSet<_> = rules.iter().map(|rule| &rule.device).collect();
  let new_devices: Vec<NewDeviceRow> = devices
    .values()
    .filter(|device| !configured.contains(&device.key))
    .map(|device| NewDeviceRow {
      device: device.key.clone(),
      description: device.display_name.clone(),
      serial: String::new(),
      mode: default_mode.to_owned(),
      name: String::new(),
    })
    .collect();

  event!(
    target: "udev-symlink-manager",
    Level::DEBUG,
    known = known.len(),
    new = new_devices.len(),
    "Reconciled rules with attached devices"
  );

  RuleForm {
    known,
    new_devices,
    default_mode: default_mode.to_owned(),
  }
}
