use crate::{
  form::{EditError, RuleForm},
  reconcile::reconcile,
  reload::{ReloadError, ReloadReport, RuleDatabase},
  rules::{parse_rules, render_rules, ParseWarning, Rule, RuleStore, RuleStoreError},
  usb::{enumerate, DeviceLister, DeviceMap},
};
use thiserror::Error;
use tracing::{event, Level};

#[derive(Debug, Error)]
pub enum UpdateError {
  #[error(transparent)]
  Edit(#[from] EditError),

  #[error(transparent)]
  Store(#[from] RuleStoreError),
}

impl UpdateError {
  pub fn is_permission_denied(&self) -> bool {
    matches!(self, UpdateError::Store(e) if e.is_permission_denied())
  }
}

/// What happened after the rules file was written.
#[derive(Debug)]
pub struct UpdateOutcome {
  pub written: usize,
  pub reload: Result<ReloadReport, ReloadError>,

  /// Reading the file back after the write. On failure the session shows
  /// the rules as they were written.
  pub refresh: Result<(), RuleStoreError>,
}

impl UpdateOutcome {
  pub fn reloaded(&self) -> bool {
    matches!(&self.reload, Ok(report) if report.is_success())
  }
}

/// One editing session over the rules file and the attached devices.
pub struct Session {
  store: Box<dyn RuleStore>,
  lister: Box<dyn DeviceLister>,
  database: Box<dyn RuleDatabase>,
  default_mode: String,

  rules: Vec<Rule>,
  warnings: Vec<ParseWarning>,
  devices: DeviceMap,
  form: RuleForm,
}

impl Session {
  pub async fn open(
    store: Box<dyn RuleStore>,
    lister: Box<dyn DeviceLister>,
    database: Box<dyn RuleDatabase>,
    default_mode: impl Into<String>,
  ) -> Result<Self, RuleStoreError> {
    let default_mode = default_mode.into();
    let form = reconcile(&[], &DeviceMap::new(), &default_mode);
    let mut session = Session {
      store,
      lister,
      database,
      default_mode,
      rules: Vec::new(),
      warnings: Vec::new(),
      devices: DeviceMap::new(),
      form,
    };

    session.refresh().await?;
    Ok(session)
  }

  /// Re-reads the rules file and the device listing, discarding edits.
  pub async fn refresh(&mut self) -> Result<(), RuleStoreError> {
    let content = self.store.load().await?.unwrap_or_default();
    let parsed = parse_rules(&content);
    for warning in &parsed.warnings {
      event!(target: "udev-symlink-manager", Level::WARN, path = %self.store.location().display(), "{}", warning);
    }

    self.rules = parsed.rules;
    self.warnings = parsed.warnings;
    self.devices = enumerate(&*self.lister).await;
    self.reset_edits();

    event!(
      target: "udev-symlink-manager",
      Level::INFO,
      rules = self.rules.len(),
      devices = self.devices.len(),
      "Loaded {} rules and {} attached devices",
      self.rules.len(),
      self.devices.len()
    );
    Ok(())
  }

  /// Takes `content` as the current rules file without reading it, keeping
  /// the last device listing.
  fn adopt(&mut self, content: &str) {
    let parsed = parse_rules(content);
    self.rules = parsed.rules;
    self.warnings = parsed.warnings;
    self.reset_edits();
  }

  /// Throws away the edits made since the last refresh.
  pub fn reset_edits(&mut self) {
    self.form = reconcile(&self.rules, &self.devices, &self.default_mode);
  }

  pub fn form(&self) -> &RuleForm {
    &self.form
  }

  pub fn form_mut(&mut self) -> &mut RuleForm {
    &mut self.form
  }

  pub fn warnings(&self) -> &[ParseWarning] {
    &self.warnings
  }

  pub fn location(&self) -> &std::path::Path {
    self.store.location()
  }

  /// Writes every edit to the rules file, reloads the rule database and
  /// refreshes the session from the written file. When writing fails
  /// nothing changes, neither on disk nor in the session.
  pub async fn update_all(&mut self) -> Result<UpdateOutcome, UpdateError> {
    let rules = self.form.to_rules()?;
    let content = render_rules(&rules);
    self.store.replace(&content).await?;

    let reload = self.database.reload().await;
    match &reload {
      Ok(report) if report.is_success() => {
        event!(target: "udev-symlink-manager", Level::INFO, "Reloaded udev rules");
      }
      Ok(report) => {
        for failure in report.failures() {
          event!(target: "udev-symlink-manager", Level::WARN, "Rules were written but {}", failure);
        }
      }
      Err(error) => {
        event!(target: "udev-symlink-manager", Level::WARN, %error, "Rules were written but could not be reloaded");
      }
    }

    let refresh = match self.refresh().await {
      Ok(()) => Ok(()),
      Err(error) => {
        event!(target: "udev-symlink-manager", Level::WARN, %error, "Rules were written but could not be read back");
        self.adopt(&content);
        Err(error)
      }
    };

    Ok(UpdateOutcome {
      written: rules.len(),
      reload,
      refresh,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    form::NOT_CONNECTED,
    reload::CommandOutcome,
    rules::DeviceKey,
    testing::{MemoryStore, RecordingDatabase, StaticLister},
  };

  const RULES: &str = "\
SUBSYSTEM==\"tty\", SUBSYSTEMS==\"usb\", ATTRS{idVendor}==\"0403\", ATTRS{idProduct}==\"6001\", ATTRS{serial}==\"A6008isP\", MODE=\"0666\", SYMLINK+=\"ttyFTDI\"
SUBSYSTEM==\"tty\", SUBSYSTEMS==\"usb\", ATTRS{idVendor}==\"2341\", ATTRS{idProduct}==\"0043\", MODE=\"0660\", SYMLINK+=\"arduino\"
";

  const LSUSB: &str = "\
Bus 001 Device 004: ID 0403:6001 Future Technology Devices International, Ltd FT232 Serial (UART) IC
Bus 001 Device 003: ID 10c4:ea60 Silicon Labs CP210x UART Bridge
";

  async fn open(store: &MemoryStore, database: &RecordingDatabase) -> Session {
    Session::open(
      Box::new(store.clone()),
      Box::new(StaticLister::new(LSUSB)),
      Box::new(database.clone()),
      "0666",
    )
    .await
    .unwrap()
  }

  #[tokio::test]
  async fn opens_with_known_and_new_rows() {
    let store = MemoryStore::with_content(RULES);
    let session = open(&store, &RecordingDatabase::default()).await;

    let form = session.form();
    assert_eq!(form.known.len(), 2);
    assert_eq!(
      form.known[0].device_name(),
      "Future Technology Devices International, Ltd FT232 Serial (UART) IC"
    );
    assert_eq!(form.known[1].device_name(), NOT_CONNECTED);
    assert_eq!(form.new_devices.len(), 1);
    assert_eq!(form.new_devices[0].device, DeviceKey::new("10c4", "ea60"));
  }

  #[tokio::test]
  async fn missing_file_shows_every_device_as_new() {
    let store = MemoryStore::default();
    let session = open(&store, &RecordingDatabase::default()).await;

    assert!(session.form().known.is_empty());
    assert_eq!(session.form().new_devices.len(), 2);
  }

  #[tokio::test]
  async fn update_writes_reloads_and_refreshes() {
    let store = MemoryStore::with_content(RULES);
    let database = RecordingDatabase::default();
    let mut session = open(&store, &database).await;

    session.form_mut().known[1].name = String::new();
    session.form_mut().new_devices[0].name = "cp2102".into();

    let outcome = session.update_all().await.unwrap();
    assert_eq!(outcome.written, 2);
    assert!(outcome.reloaded());
    assert_eq!(database.reloads(), 1);

    let written = store.content().unwrap();
    assert!(written.contains(r#"SYMLINK+="ttyFTDI""#));
    assert!(!written.contains("arduino"));
    assert!(written.ends_with(
      "ATTRS{idVendor}==\"10c4\", ATTRS{idProduct}==\"ea60\", MODE=\"0666\", SYMLINK+=\"cp2102\"\n"
    ));

    // the session now reflects the written file
    assert_eq!(session.form().known.len(), 2);
    assert_eq!(session.form().known[1].name, "cp2102");
    assert!(session.form().new_devices.is_empty());
  }

  #[tokio::test]
  async fn failed_read_back_still_counts_as_written() {
    let store = MemoryStore::with_content(RULES);
    let database = RecordingDatabase::default();
    let mut session = open(&store, &database).await;

    session.form_mut().known[0].name = "ttyBench".into();
    store.make_unreadable();

    let outcome = session.update_all().await.unwrap();
    assert_eq!(outcome.written, 2);
    assert!(outcome.reloaded());
    assert!(matches!(outcome.refresh, Err(RuleStoreError::Io { .. })));
    assert!(store.content().unwrap().contains(r#"SYMLINK+="ttyBench""#));

    // the form shows what was written, devices from the last listing
    assert_eq!(session.form().known[0].name, "ttyBench");
    assert_ne!(session.form().known[0].device_name(), NOT_CONNECTED);
    assert_eq!(session.form().new_devices.len(), 1);
  }

  #[tokio::test]
  async fn permission_denied_changes_nothing() {
    let store = MemoryStore::with_content(RULES).read_only();
    let database = RecordingDatabase::default();
    let mut session = open(&store, &database).await;
    session.form_mut().known[0].name = "renamed".into();

    let error = session.update_all().await.unwrap_err();

    assert!(error.is_permission_denied());
    assert_eq!(store.content().as_deref(), Some(RULES));
    assert_eq!(database.reloads(), 0);
    assert_eq!(session.form().known[0].name, "renamed");
  }

  #[tokio::test]
  async fn invalid_edits_are_not_written() {
    let store = MemoryStore::with_content(RULES);
    let database = RecordingDatabase::default();
    let mut session = open(&store, &database).await;
    session.form_mut().new_devices[0].name = "cp2102".into();
    session.form_mut().new_devices[0].mode = "999".into();

    let error = session.update_all().await.unwrap_err();
    assert!(matches!(error, UpdateError::Edit(EditError::InvalidMode { .. })));
    assert_eq!(store.content().as_deref(), Some(RULES));
  }

  #[tokio::test]
  async fn failed_reload_still_counts_as_written() {
    let store = MemoryStore::with_content(RULES);
    let database = RecordingDatabase::failing_with(CommandOutcome {
      command: "sudo udevadm trigger".into(),
      code: Some(1),
    });
    let mut session = open(&store, &database).await;
    session.form_mut().known[0].name = "ftdi".into();

    let outcome = session.update_all().await.unwrap();
    assert!(!outcome.reloaded());
    assert!(store.content().unwrap().contains(r#"SYMLINK+="ftdi""#));
  }

  #[tokio::test]
  async fn malformed_lines_surface_as_warnings() {
    let content = format!("{}ATTRS{{idVendor}}==\"dead\"\n", RULES);
    let store = MemoryStore::with_content(&content);
    let session = open(&store, &RecordingDatabase::default()).await;

    assert_eq!(session.form().known.len(), 2);
    assert!(matches!(
      session.warnings(),
      [ParseWarning::Malformed { line: 3, .. }]
    ));
  }

  #[tokio::test]
  async fn reset_discards_edits() {
    let store = MemoryStore::with_content(RULES);
    let mut session = open(&store, &RecordingDatabase::default()).await;
    session.form_mut().known[0].name = "edited".into();

    session.reset_edits();
    assert_eq!(session.form().known[0].name, "ttyFTDI");
  }
}
