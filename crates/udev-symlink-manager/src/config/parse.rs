use std::path::Path;

use super::Config;
use crate::rules::is_valid_mode;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::{fs, io};
use tracing::{event, Level};

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ConfigFormat {
  Json,
  Yaml,
  Toml,
  Auto,
}

impl ConfigFormat {
  /// Resolves `Auto` from the file extension. Documents without a path
  /// (stdout) default to YAML.
  pub fn resolve(self, file: Option<&Path>) -> Result<ConfigFormat, ConfigError> {
    match self {
      ConfigFormat::Auto => match file {
        None => Ok(ConfigFormat::Yaml),
        Some(file) => match file.extension().and_then(|e| e.to_str()) {
          Some("toml") => Ok(ConfigFormat::Toml),
          Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
          Some("json") => Ok(ConfigFormat::Json),
          Some(other) => Err(ConfigError::InvalidExtension(other.into())),
          None => Err(ConfigError::MissingExtension),
        },
      },
      format => Ok(format),
    }
  }
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("Invalid file extension when using auto format: {0}")]
  InvalidExtension(String),

  #[error("File does not have a file extension, and format is set to auto")]
  MissingExtension,

  #[error("Invalid default mode {0:?}, expected an octal permission such as 0666")]
  InvalidDefaultMode(String),

  #[error("Failed to parse document")]
  ParseError(#[from] FormatError),

  #[error(transparent)]
  Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum FormatError {
  #[error(transparent)]
  JsonError(#[from] serde_json::Error),

  #[error(transparent)]
  YamlError(#[from] serde_yaml::Error),

  #[error(transparent)]
  TomlError(#[from] toml::de::Error),

  #[error(transparent)]
  TomlWriteError(#[from] toml::ser::Error),
}

trait DocumentFormat {
  fn parse<T: DeserializeOwned>(content: &[u8]) -> Result<T, FormatError>;
  fn render<T: Serialize>(value: &T) -> Result<String, FormatError>;
}

struct Json;
impl DocumentFormat for Json {
  fn parse<T: DeserializeOwned>(content: &[u8]) -> Result<T, FormatError> {
    Ok(serde_json::from_slice(content)?)
  }

  fn render<T: Serialize>(value: &T) -> Result<String, FormatError> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    Ok(text)
  }
}

struct Yaml;
impl DocumentFormat for Yaml {
  fn parse<T: DeserializeOwned>(content: &[u8]) -> Result<T, FormatError> {
    Ok(serde_yaml::from_slice(content)?)
  }

  fn render<T: Serialize>(value: &T) -> Result<String, FormatError> {
    Ok(serde_yaml::to_string(value)?)
  }
}

struct Toml;
impl DocumentFormat for Toml {
  fn parse<T: DeserializeOwned>(content: &[u8]) -> Result<T, FormatError> {
    Ok(toml::from_slice(content)?)
  }

  fn render<T: Serialize>(value: &T) -> Result<String, FormatError> {
    Ok(toml::to_string(value)?)
  }
}

/// Parses a document, `format` must already be resolved.
pub fn parse_document<T: DeserializeOwned>(
  content: &[u8],
  format: ConfigFormat,
) -> Result<T, ConfigError> {
  match format {
    ConfigFormat::Json => Ok(Json::parse(content)?),
    ConfigFormat::Toml => Ok(Toml::parse(content)?),
    ConfigFormat::Yaml | ConfigFormat::Auto => Ok(Yaml::parse(content)?),
  }
}

/// Renders a document, `format` must already be resolved.
pub fn render_document<T: Serialize>(value: &T, format: ConfigFormat) -> Result<String, ConfigError> {
  match format {
    ConfigFormat::Json => Ok(Json::render(value)?),
    ConfigFormat::Toml => Ok(Toml::render(value)?),
    ConfigFormat::Yaml | ConfigFormat::Auto => Ok(Yaml::render(value)?),
  }
}

/// Reads a document from `file`, resolving `Auto` by its extension.
pub async fn read_document<T: DeserializeOwned>(
  file: impl AsRef<Path>,
  format: ConfigFormat,
) -> Result<T, ConfigError> {
  let file = file.as_ref();
  let format = format.resolve(Some(file))?;
  let content = fs::read(file).await?;
  parse_document(&content, format)
}

pub(super) async fn read_config(
  file: impl AsRef<Path>,
  format: ConfigFormat,
) -> Result<Config, ConfigError> {
  let result = read_document::<Config>(file.as_ref(), format)
    .await
    .and_then(|config| {
      if is_valid_mode(config.default_mode()) {
        Ok(config)
      } else {
        Err(ConfigError::InvalidDefaultMode(config.default_mode().into()))
      }
    });

  match result {
    Ok(config) => {
      event!(target: "udev-symlink-manager", Level::INFO, ?config, "Loaded configuration");
      Ok(config)
    }
    Err(error) => {
      event!(target: "udev-symlink-manager", Level::ERROR, ?error, "Failed to read config file");
      Err(error)
    }
  }
}
