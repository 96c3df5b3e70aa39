use super::{
  Rule, MODE_KEY, PRODUCT_ATTR, SERIAL_ATTR, SUBSYSTEMS_KEY, SUBSYSTEM_KEY, SYMLINK_KEY,
  VENDOR_ATTR,
};
use std::fmt;

impl fmt::Display for Rule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      r#"{}=="{}", {}=="{}", "#,
      SUBSYSTEM_KEY, self.subsystem, SUBSYSTEMS_KEY, self.subsystems
    )?;
    write!(
      f,
      r#"{}=="{}", {}=="{}", "#,
      VENDOR_ATTR, self.device.vendor_id, PRODUCT_ATTR, self.device.product_id
    )?;
    if let Some(serial) = &self.serial {
      write!(f, r#"{}=="{}", "#, SERIAL_ATTR, serial)?;
    }
    write!(
      f,
      r#"{}="{}", {}+="{}""#,
      MODE_KEY, self.mode, SYMLINK_KEY, self.symlink_name
    )?;
    for clause in &self.extra_clauses {
      write!(f, ", {}", clause)?;
    }

    Ok(())
  }
}

/// Renders the complete content of a rules file, one line per rule.
pub fn render_rules<'a>(rules: impl IntoIterator<Item = &'a Rule>) -> String {
  rules
    .into_iter()
    .map(|rule| format!("{}\n", rule))
    .collect()
}
