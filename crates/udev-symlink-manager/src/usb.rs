use crate::rules::DeviceKey;
use async_trait::async_trait;
use std::{collections::BTreeMap, process::ExitStatus};
use thiserror::Error;
use tokio::{io, process::Command};
use tracing::{event, Level};

/// A usb device reported by the listing command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumeratedDevice {
  pub bus: String,
  pub device: String,
  pub key: DeviceKey,
  pub display_name: String,
}

pub type DeviceMap = BTreeMap<DeviceKey, EnumeratedDevice>;

#[derive(Debug, Error)]
pub enum ListError {
  #[error("Failed to run {program}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  #[error("{program} exited with {status}")]
  Failed { program: String, status: ExitStatus },

  #[error("{program} printed output that is not valid UTF-8")]
  InvalidOutput { program: String },
}

/// Source of the raw device listing.
#[async_trait]
pub trait DeviceLister: Send + Sync {
  async fn list(&self) -> Result<String, ListError>;
}

/// Runs an `lsusb` compatible command.
#[derive(Debug, Clone)]
pub struct CommandLister {
  program: String,
  args: Vec<String>,
}

impl CommandLister {
  pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = String>) -> Self {
    Self {
      program: program.into(),
      args: args.into_iter().collect(),
    }
  }
}

#[async_trait]
impl DeviceLister for CommandLister {
  async fn list(&self) -> Result<String, ListError> {
    let output = Command::new(&self.program)
      .args(&self.args)
      .output()
      .await
      .map_err(|source| ListError::Spawn {
        program: self.program.clone(),
        source,
      })?;

    if !output.status.success() {
      return Err(ListError::Failed {
        program: self.program.clone(),
        status: output.status,
      });
    }

    String::from_utf8(output.stdout).map_err(|_| ListError::InvalidOutput {
      program: self.program.clone(),
    })
  }
}

/// Parses one `Bus 001 Device 004: ID 0403:6001 Future Technology ...` line.
fn parse_line(line: &str) -> Option<EnumeratedDevice> {
  let parts: Vec<&str> = line.split_whitespace().collect();
  if parts.len() < 6 {
    return None;
  }

  let (vendor_id, product_id) = parts[5].split_once(':')?;
  if vendor_id.is_empty() || product_id.is_empty() {
    return None;
  }

  Some(EnumeratedDevice {
    bus: parts[1].to_owned(),
    device: parts[3].trim_end_matches(':').to_owned(),
    key: DeviceKey::new(vendor_id, product_id),
    display_name: parts[6..].join(" "),
  })
}

/// Builds the device map from the listing output. Later lines for the same
/// vendor/product pair replace earlier ones.
pub fn parse_listing(output: &str) -> DeviceMap {
  let mut devices = DeviceMap::new();
  for line in output.lines().filter(|l| !l.trim().is_empty()) {
    match parse_line(line) {
      Some(device) => {
        devices.insert(device.key.clone(), device);
      }
      None => {
        event!(target: "udev-symlink-manager", Level::DEBUG, line, "Skipping unrecognised device listing line");
      }
    }
  }

  devices
}

/// Lists the attached devices. A failing lister means no devices, not an error.
pub async fn enumerate(lister: &dyn DeviceLister) -> DeviceMap {
  match lister.list().await {
    Ok(output) => {
      let devices = parse_listing(&output);
      event!(target: "udev-symlink-manager", Level::DEBUG, devices.len = devices.len(), "gathered {} usb devices", devices.len());
      devices
    }
    Err(error) => {
      event!(target: "udev-symlink-manager", Level::WARN, %error, "Device listing unavailable, continuing without connected devices");
      DeviceMap::new()
    }
  }
}
