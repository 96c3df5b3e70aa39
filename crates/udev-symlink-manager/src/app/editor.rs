use super::view;
use crate::{
  form::RuleForm,
  session::{Session, UpdateError},
};
use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};

/// Answer that clears a field.
const CLEAR: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  Update,
  Finish,
  Restart,
}

/// Line based stand-in for the editing form.
pub struct Prompt<R, W> {
  input: R,
  output: W,
}

impl<R: BufRead, W: Write> Prompt<R, W> {
  pub fn new(input: R, output: W) -> Self {
    Self { input, output }
  }

  pub fn output(&mut self) -> &mut W {
    &mut self.output
  }

  /// `None` once the input is exhausted.
  fn ask(&mut self, question: &str, current: &str) -> io::Result<Option<String>> {
    if current.is_empty() {
      write!(self.output, "{}: ", question)?;
    } else {
      write!(self.output, "{} [{}]: ", question, current)?;
    }
    self.output.flush()?;

    let mut line = String::new();
    if self.input.read_line(&mut line)? == 0 {
      return Ok(None);
    }
    Ok(Some(line.trim().to_owned()))
  }

  /// Asks for a new value of `field`. Enter keeps it, `-` clears it.
  fn edit(&mut self, question: &str, field: &mut String) -> io::Result<bool> {
    match self.ask(question, field)? {
      None => return Ok(false),
      Some(answer) if answer.is_empty() => {}
      Some(answer) if answer == CLEAR => field.clear(),
      Some(answer) => *field = answer,
    }
    Ok(true)
  }

  /// Walks every row of the form. Returns `false` when the input ended.
  pub fn fill(&mut self, form: &mut RuleForm) -> io::Result<bool> {
    for row in form.known.iter_mut() {
      writeln!(self.output, "{} - {}", row.rule.key(), row.device_name())?;
      if !self.edit("  name ('-' removes the rule)", &mut row.name)? {
        return Ok(false);
      }
    }

    for row in form.new_devices.iter_mut() {
      writeln!(self.output, "{} - {}", row.device, row.description)?;
      if !self.edit("  serial", &mut row.serial)?
        || !self.edit("  mode", &mut row.mode)?
        || !self.edit("  name (empty skips the device)", &mut row.name)?
      {
        return Ok(false);
      }
    }

    Ok(true)
  }

  pub fn choose_action(&mut self) -> io::Result<Action> {
    loop {
      let answer = match self.ask("[u]pdate all, [r]estart editing or [f]inish", "")? {
        None => return Ok(Action::Finish),
        Some(answer) => answer.to_lowercase(),
      };

      match answer.as_str() {
        "u" | "update" => return Ok(Action::Update),
        "r" | "restart" => return Ok(Action::Restart),
        "f" | "finish" => return Ok(Action::Finish),
        _ => writeln!(self.output, "Please answer u, r or f.")?,
      }
    }
  }
}

/// Runs the form until the user finishes. Updates that fail on bad input or
/// missing privileges are reported and editing continues.
pub async fn run<R: BufRead, W: Write>(session: &mut Session, prompt: &mut Prompt<R, W>) -> Result<()> {
  loop {
    view::write_form(prompt.output(), session.form(), session.warnings())?;
    writeln!(prompt.output())?;

    if !prompt.fill(session.form_mut())? {
      break;
    }

    match prompt.choose_action()? {
      Action::Finish => break,
      Action::Restart => session.reset_edits(),
      Action::Update => match session.update_all().await {
        Ok(outcome) => view::write_outcome(prompt.output(), &outcome)?,
        Err(error) if error.is_permission_denied() => {
          writeln!(prompt.output(), "Permission denied: {}", error)?
        }
        Err(UpdateError::Edit(error)) => writeln!(prompt.output(), "Not updated: {}", error)?,
        Err(error) => return Err(error).context("Failed to update rules"),
      },
    }

    writeln!(prompt.output())?;
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    rules::{DeviceKey, Rule},
    testing::{MemoryStore, RecordingDatabase, StaticLister},
  };

  const RULES: &str = "\
SUBSYSTEM==\"tty\", SUBSYSTEMS==\"usb\", ATTRS{idVendor}==\"0403\", ATTRS{idProduct}==\"6001\", MODE=\"0666\", SYMLINK+=\"ttyFTDI\"
SUBSYSTEM==\"tty\", SUBSYSTEMS==\"usb\", ATTRS{idVendor}==\"2341\", ATTRS{idProduct}==\"0043\", MODE=\"0660\", SYMLINK+=\"arduino\"
";

  const LSUSB: &str = "Bus 001 Device 003: ID 10c4:ea60 Silicon Labs CP210x UART Bridge\n";

  async fn session(store: &MemoryStore, database: &RecordingDatabase) -> Session {
    Session::open(
      Box::new(store.clone()),
      Box::new(StaticLister::new(LSUSB)),
      Box::new(database.clone()),
      "0666",
    )
    .await
    .unwrap()
  }

  fn prompt(input: &str) -> Prompt<&[u8], Vec<u8>> {
    Prompt::new(input.as_bytes(), Vec::new())
  }

  fn form() -> RuleForm {
    crate::reconcile::reconcile(
      &[Rule::new(DeviceKey::new("0403", "6001"), "0666", "ttyFTDI")],
      &crate::usb::parse_listing(LSUSB),
      "0666",
    )
  }

  #[test]
  fn enter_keeps_and_dash_clears() {
    let mut form = form();
    let mut prompt = prompt("-\n\n0660\ncp2102\n");

    assert!(prompt.fill(&mut form).unwrap());
    assert_eq!(form.known[0].name, "");
    assert_eq!(form.new_devices[0].serial, "");
    assert_eq!(form.new_devices[0].mode, "0660");
    assert_eq!(form.new_devices[0].name, "cp2102");

    let text = String::from_utf8(prompt.output).unwrap();
    assert!(text.contains("0403:6001 - Not Connected"));
    assert!(text.contains("  name ('-' removes the rule) [ttyFTDI]: "));
    assert!(text.contains("  mode [0666]: "));
  }

  #[test]
  fn ended_input_stops_filling() {
    let mut form = form();
    let mut prompt = prompt("renamed\n");

    assert!(!prompt.fill(&mut form).unwrap());
    assert_eq!(form.known[0].name, "renamed");
  }

  #[test]
  fn actions() {
    assert_eq!(prompt("u\n").choose_action().unwrap(), Action::Update);
    assert_eq!(prompt("Restart\n").choose_action().unwrap(), Action::Restart);
    assert_eq!(prompt("f\n").choose_action().unwrap(), Action::Finish);
    assert_eq!(prompt("").choose_action().unwrap(), Action::Finish);

    let mut retry = prompt("what\nu\n");
    assert_eq!(retry.choose_action().unwrap(), Action::Update);
    assert!(String::from_utf8(retry.output)
      .unwrap()
      .contains("Please answer u, r or f."));
  }

  #[tokio::test]
  async fn finish_writes_nothing() {
    let store = MemoryStore::with_content(RULES);
    let database = RecordingDatabase::default();
    let mut session = session(&store, &database).await;
    let mut prompt = prompt("renamed\n\n\n\nfinal\nf\n");

    run(&mut session, &mut prompt).await.unwrap();

    assert_eq!(store.content().as_deref(), Some(RULES));
    assert_eq!(database.reloads(), 0);
  }

  #[tokio::test]
  async fn update_all_then_finish() {
    let store = MemoryStore::with_content(RULES);
    let database = RecordingDatabase::default();
    let mut session = session(&store, &database).await;
    // known: ttyFTDI, arduino; new: 10c4:ea60 (serial, mode, name)
    let mut prompt = prompt("\n-\n0001\n\ncp2102\nu\n\n\n\nf\n");

    run(&mut session, &mut prompt).await.unwrap();

    let content = store.content().unwrap();
    assert_eq!(content.lines().count(), 2);
    assert!(content.contains(r#"SYMLINK+="ttyFTDI""#));
    assert!(content.contains(r#"ATTRS{serial}=="0001", MODE="0666", SYMLINK+="cp2102""#));
    assert_eq!(database.reloads(), 1);

    let text = String::from_utf8(prompt.output).unwrap();
    assert!(text.contains("Wrote 2 rules."));
    assert!(text.contains("Udev rules updated successfully."));
  }

  #[tokio::test]
  async fn permission_denied_keeps_editing() {
    let store = MemoryStore::with_content(RULES).read_only();
    let database = RecordingDatabase::default();
    let mut session = session(&store, &database).await;
    let mut prompt = prompt("renamed\n\n\n\n\nu\n\n\n\n\n\nf\n");

    run(&mut session, &mut prompt).await.unwrap();

    assert_eq!(store.content().as_deref(), Some(RULES));
    let text = String::from_utf8(prompt.output).unwrap();
    assert!(text.contains("Permission denied: "));
    // the edit survives the failed update
    assert!(text.contains("[renamed]: "));
  }

  #[tokio::test]
  async fn invalid_mode_is_reported() {
    let store = MemoryStore::with_content(RULES);
    let database = RecordingDatabase::default();
    let mut session = session(&store, &database).await;
    let mut prompt = prompt("\n\n\nabc\ncp2102\nu\n");

    run(&mut session, &mut prompt).await.unwrap();

    assert_eq!(store.content().as_deref(), Some(RULES));
    let text = String::from_utf8(prompt.output).unwrap();
    assert!(text.contains("Not updated: Invalid mode \"abc\" for 10c4:ea60"));
  }
}
