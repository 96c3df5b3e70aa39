use crate::config;
use clap::{ArgEnum, Parser, Subcommand};
use std::path::PathBuf;

#[derive(ArgEnum, Debug, PartialEq, Clone, Copy)]
pub enum LogFormat {
  Pretty,
  Json,
}

#[derive(ArgEnum, Debug, PartialEq, Clone, Copy)]
pub enum ConfigFormat {
  Json,
  Yaml,
  Toml,
  Auto,
}

impl From<ConfigFormat> for config::ConfigFormat {
  fn from(f: ConfigFormat) -> Self {
    match f {
      ConfigFormat::Json => config::ConfigFormat::Json,
      ConfigFormat::Yaml => config::ConfigFormat::Yaml,
      ConfigFormat::Toml => config::ConfigFormat::Toml,
      ConfigFormat::Auto => config::ConfigFormat::Auto,
    }
  }
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
  /// Show configured and newly detected devices
  Show,

  /// Edit names interactively, then update all rules
  Edit,

  /// Write the editable sheet of both device lists
  Export {
    /// Sheet format, auto picks by the output extension (yaml on stdout)
    #[clap(arg_enum, long = "format", default_value = "auto")]
    format: ConfigFormat,

    /// Output file, stdout when omitted
    #[clap(long = "output", short = 'o')]
    output: Option<PathBuf>,
  },

  /// Update all rules from an edited sheet
  Apply {
    /// Sheet format
    #[clap(arg_enum, long = "format", default_value = "auto")]
    format: ConfigFormat,

    /// Sheet file produced by `export`
    sheet: PathBuf,
  },
}

#[derive(Parser, Debug)]
#[clap(name = "udev-symlink-manager", version, about)]
pub struct Args {
  /// Log output format
  #[clap(
    arg_enum,
    long = "log-format",
    short = 'f',
    env = "LOG_FORMAT",
    default_value = "pretty"
  )]
  pub log_format: LogFormat,

  /// Config file format
  #[clap(
    arg_enum,
    long = "config-format",
    short = 't',
    env = "CONFIG_FILE_FORMAT",
    default_value = "auto"
  )]
  pub config_format: ConfigFormat,

  /// Configuration file path
  #[clap(long = "config", short = 'c', env = "CONFIG_FILE")]
  pub config_file: Option<PathBuf>,

  /// Rules file, overrides the configuration
  #[clap(long = "rules-file", short = 'r', env = "RULES_FILE")]
  pub rules_file: Option<PathBuf>,

  #[clap(subcommand)]
  pub command: Option<Command>,
}
