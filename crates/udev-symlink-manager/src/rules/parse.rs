use super::{
  DeviceKey, Rule, RuleKey, DEFAULT_SUBSYSTEM, DEFAULT_SUBSYSTEMS, MODE_KEY, PRODUCT_ATTR,
  SERIAL_ATTR, SUBSYSTEMS_KEY, SUBSYSTEM_KEY, SYMLINK_KEY, VENDOR_ATTR,
};
use std::{collections::HashSet, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
  Match,
  NotMatch,
  Assign,
  AssignFinal,
  Add,
  Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Clause<'a> {
  key: &'a str,
  operator: Operator,
  value: &'a str,
}

impl<'a> Clause<'a> {
  /// Splits `KEY<op>"value"` into its parts. Returns `None` when the clause
  /// has no operator at all.
  fn split(text: &'a str) -> Option<Self> {
    let eq = text.find('=')?;
    let bytes = text.as_bytes();

    let (start, operator) = match eq.checked_sub(1).map(|i| bytes[i]) {
      Some(b'!') => (eq - 1, Operator::NotMatch),
      Some(b'+') => (eq - 1, Operator::Add),
      Some(b'-') => (eq - 1, Operator::Remove),
      Some(b':') => (eq - 1, Operator::AssignFinal),
      _ if bytes.get(eq + 1) == Some(&b'=') => (eq, Operator::Match),
      _ => (eq, Operator::Assign),
    };
    let end = match operator {
      Operator::Match => eq + 2,
      _ => eq + 1,
    };

    Some(Clause {
      key: text[..start].trim(),
      operator,
      value: text[end..].trim().trim_matches('"'),
    })
  }
}

/// Fields a line must provide to become a [`Rule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredField {
  VendorId,
  ProductId,
  Mode,
  SymlinkName,
}

impl fmt::Display for RequiredField {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      RequiredField::VendorId => VENDOR_ATTR,
      RequiredField::ProductId => PRODUCT_ATTR,
      RequiredField::Mode => MODE_KEY,
      RequiredField::SymlinkName => SYMLINK_KEY,
    })
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseWarning {
  /// The line is missing one or more required fields and was dropped.
  Malformed {
    line: usize,
    content: String,
    missing: Vec<RequiredField>,
  },

  /// The line binds a device that an earlier line already binds.
  Duplicate { line: usize, key: RuleKey },
}

impl fmt::Display for ParseWarning {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ParseWarning::Malformed { line, missing, .. } => {
        write!(f, "line {}: ignored, missing ", line)?;
        for (i, field) in missing.iter().enumerate() {
          if i > 0 {
            f.write_str(", ")?;
          }
          fmt::Display::fmt(field, f)?;
        }
        Ok(())
      }
      ParseWarning::Duplicate { line, key } => {
        write!(f, "line {}: {} is already bound by an earlier rule", line, key)
      }
    }
  }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParsedRules {
  pub rules: Vec<Rule>,
  pub warnings: Vec<ParseWarning>,
}

#[derive(Default)]
struct LineFields {
  subsystem: Option<String>,
  subsystems: Option<String>,
  vendor_id: Option<String>,
  product_id: Option<String>,
  serial: Option<String>,
  mode: Option<String>,
  symlink_name: Option<String>,
  extra_clauses: Vec<String>,
}

fn non_empty(value: &str) -> Option<String> {
  if value.is_empty() {
    None
  } else {
    Some(value.to_owned())
  }
}

impl LineFields {
  fn read(line: &str) -> Self {
    let mut fields = LineFields::default();

    for text in line.split(',').map(str::trim).filter(|c| !c.is_empty()) {
      let clause = match Clause::split(text) {
        Some(clause) => clause,
        None => {
          fields.extra_clauses.push(text.to_owned());
          continue;
        }
      };

      match (clause.key, clause.operator) {
        (VENDOR_ATTR, Operator::Match) => fields.vendor_id = non_empty(clause.value),
        (PRODUCT_ATTR, Operator::Match) => fields.product_id = non_empty(clause.value),
        (SERIAL_ATTR, Operator::Match) => fields.serial = non_empty(clause.value),
        (MODE_KEY, Operator::Assign) | (MODE_KEY, Operator::AssignFinal) => {
          fields.mode = non_empty(clause.value)
        }
        (SYMLINK_KEY, Operator::Add) => fields.symlink_name = non_empty(clause.value),
        (SUBSYSTEM_KEY, Operator::Match) if fields.subsystem.is_none() => {
          fields.subsystem = non_empty(clause.value)
        }
        (SUBSYSTEMS_KEY, Operator::Match) if fields.subsystems.is_none() => {
          fields.subsystems = non_empty(clause.value)
        }
        _ => fields.extra_clauses.push(text.to_owned()),
      }
    }

    fields
  }

  fn into_rule(self) -> Result<Rule, Vec<RequiredField>> {
    match (self.vendor_id, self.product_id, self.mode, self.symlink_name) {
      (Some(vendor_id), Some(product_id), Some(mode), Some(symlink_name)) => Ok(Rule {
        subsystem: self
          .subsystem
          .unwrap_or_else(|| DEFAULT_SUBSYSTEM.into()),
        subsystems: self
          .subsystems
          .unwrap_or_else(|| DEFAULT_SUBSYSTEMS.into()),
        device: DeviceKey::new(vendor_id, product_id),
        serial: self.serial,
        mode,
        symlink_name,
        extra_clauses: self.extra_clauses,
      }),
      (vendor_id, product_id, mode, symlink_name) => {
        let missing = [
          (vendor_id.is_none(), RequiredField::VendorId),
          (product_id.is_none(), RequiredField::ProductId),
          (mode.is_none(), RequiredField::Mode),
          (symlink_name.is_none(), RequiredField::SymlinkName),
        ]
        .iter()
        .filter(|(missing, _)| *missing)
        .map(|(_, field)| *field)
        .collect();
        Err(missing)
      }
    }
  }
}

/// Parses the content of a rules file, keeping file order. Blank lines and
/// comments are skipped, lines without the required fields are dropped and
/// reported as warnings.
pub fn parse_rules(content: &str) -> ParsedRules {
  let mut parsed = ParsedRules::default();
  let mut seen = HashSet::new();

  for (index, line) in content.lines().enumerate() {
    let line_number = index + 1;
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
      continue;
    }

    match LineFields::read(trimmed).into_rule() {
      Ok(rule) => {
        if !seen.insert(rule.key()) {
          parsed.warnings.push(ParseWarning::Duplicate {
            line: line_number,
            key: rule.key(),
          });
        }
        parsed.rules.push(rule);
      }
      Err(missing) => parsed.warnings.push(ParseWarning::Malformed {
        line: line_number,
        content: trimmed.to_owned(),
        missing,
      }),
    }
  }

  parsed
}
