use crate::{form::RuleForm, rules::ParseWarning, session::UpdateOutcome};
use std::io::{self, Write};

const HEADERS: [&str; 6] = [
  "Device Name",
  "Vendor ID",
  "Product ID",
  "Serial",
  "Mode",
  "Custom Name",
];

fn write_table(out: &mut impl Write, rows: &[[&str; 6]]) -> io::Result<()> {
  if rows.is_empty() {
    return writeln!(out, "  (none)");
  }

  let mut widths = HEADERS.map(|h| h.chars().count());
  for row in rows {
    for (width, cell) in widths.iter_mut().zip(row.iter()) {
      *width = (*width).max(cell.chars().count());
    }
  }

  for row in std::iter::once(&HEADERS).chain(rows.iter()) {
    let mut line = String::from(" ");
    for (cell, width) in row.iter().zip(widths.iter()) {
      line.push(' ');
      line.push_str(cell);
      line.extend(std::iter::repeat(' ').take(width - cell.chars().count() + 1));
    }
    writeln!(out, "{}", line.trim_end())?;
  }

  Ok(())
}

/// Prints both panels of the form and any problems found in the rules file.
pub fn write_form(
  out: &mut impl Write,
  form: &RuleForm,
  warnings: &[ParseWarning],
) -> io::Result<()> {
  writeln!(out, "Saved Devices")?;
  let known: Vec<_> = form
    .known
    .iter()
    .map(|row| {
      [
        row.device_name(),
        row.rule.device.vendor_id.as_str(),
        row.rule.device.product_id.as_str(),
        row.rule.serial.as_deref().unwrap_or(""),
        row.rule.mode.as_str(),
        row.name.as_str(),
      ]
    })
    .collect();
  write_table(out, &known)?;

  writeln!(out)?;
  writeln!(out, "New Devices")?;
  let new: Vec<_> = form
    .new_devices
    .iter()
    .map(|row| {
      [
        row.description.as_str(),
        row.device.vendor_id.as_str(),
        row.device.product_id.as_str(),
        row.serial.as_str(),
        row.mode.as_str(),
        row.name.as_str(),
      ]
    })
    .collect();
  write_table(out, &new)?;

  if !warnings.is_empty() {
    writeln!(out)?;
    writeln!(out, "Warnings")?;
    for warning in warnings {
      writeln!(out, "  {}", warning)?;
    }
  }

  Ok(())
}

pub fn write_outcome(out: &mut impl Write, outcome: &UpdateOutcome) -> io::Result<()> {
  writeln!(out, "Wrote {} rules.", outcome.written)?;
  if let Err(error) = &outcome.refresh {
    writeln!(out, "Warning: {}, showing the rules as written.", error)?;
  }

  match &outcome.reload {
    Ok(report) if report.is_success() => writeln!(out, "Udev rules updated successfully."),
    Ok(report) => {
      for failure in report.failures() {
        writeln!(out, "Warning: {}, the new rules may not be active yet.", failure)?;
      }
      Ok(())
    }
    Err(error) => writeln!(
      out,
      "Warning: {}, the new rules may not be active yet.",
      error
    ),
  }
}
