use async_trait::async_trait;
use std::{
  ffi::OsString,
  fs::Metadata,
  os::unix::fs::MetadataExt,
  path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{fs, io};
use tracing::{event, Level};

#[derive(Debug, Error)]
pub enum RuleStoreError {
  #[error("Permission denied writing {}, the rules file can only be changed as root", .path.display())]
  PermissionDenied {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("Rules file {} is not valid UTF-8", .path.display())]
  InvalidUtf8 { path: PathBuf },

  #[error("Rules file path {} does not name a file", .path.display())]
  InvalidPath { path: PathBuf },

  #[error("Failed to access rules file {}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl RuleStoreError {
  fn io(path: &Path, source: io::Error) -> Self {
    let path = path.to_owned();
    match source.kind() {
      io::ErrorKind::PermissionDenied => Self::PermissionDenied { path, source },
      _ => Self::Io { path, source },
    }
  }

  pub fn is_permission_denied(&self) -> bool {
    matches!(self, Self::PermissionDenied { .. })
  }
}

/// Persistent home of the rules file content.
#[async_trait]
pub trait RuleStore: Send + Sync {
  fn location(&self) -> &Path;

  /// Reads the current content, `None` when there is no rules file yet.
  async fn load(&self) -> Result<Option<String>, RuleStoreError>;

  /// Replaces the whole content. On error the previous content is kept.
  async fn replace(&self, content: &str) -> Result<(), RuleStoreError>;
}

#[derive(Debug, Clone)]
pub struct FileRuleStore {
  path: PathBuf,
}

impl FileRuleStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  /// The file to replace and its current metadata. A symlinked rules file
  /// resolves to the file it points at, so the link survives the rename.
  async fn target(&self) -> Result<(PathBuf, Option<Metadata>), RuleStoreError> {
    let target = match fs::canonicalize(&self.path).await {
      Ok(target) => target,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((self.path.clone(), None)),
      Err(e) => return Err(RuleStoreError::io(&self.path, e)),
    };

    let metadata = fs::metadata(&target)
      .await
      .map_err(|e| RuleStoreError::io(&self.path, e))?;
    Ok((target, Some(metadata)))
  }
}

fn temp_path(target: &Path) -> Result<PathBuf, RuleStoreError> {
  let invalid = || RuleStoreError::InvalidPath {
    path: target.to_owned(),
  };
  let name = target.file_name().ok_or_else(invalid)?;

  let mut temp_name = OsString::from(".");
  temp_name.push(name);
  temp_name.push(".tmp");
  Ok(target.with_file_name(temp_name))
}

/// Gives the new file the permissions and owner of the one it replaces.
async fn carry_over(temp_path: &Path, previous: &Metadata) -> io::Result<()> {
  fs::set_permissions(temp_path, previous.permissions()).await?;

  let owner = (previous.uid(), previous.gid());
  let current = fs::metadata(temp_path).await?;
  if (current.uid(), current.gid()) != owner {
    let temp_path = temp_path.to_owned();
    tokio::task::spawn_blocking(move || {
      std::os::unix::fs::chown(&temp_path, Some(owner.0), Some(owner.1))
    })
    .await
    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))??;
  }

  Ok(())
}

#[async_trait]
impl RuleStore for FileRuleStore {
  fn location(&self) -> &Path {
    &self.path
  }

  async fn load(&self) -> Result<Option<String>, RuleStoreError> {
    let content = match fs::read(&self.path).await {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        event!(target: "udev-symlink-manager", Level::INFO, path = %self.path.display(), "No rules file yet, starting without rules");
        return Ok(None);
      }
      Err(e) => return Err(RuleStoreError::io(&self.path, e)),
    };

    String::from_utf8(content)
      .map(Some)
      .map_err(|_| RuleStoreError::InvalidUtf8 {
        path: self.path.clone(),
      })
  }

  async fn replace(&self, content: &str) -> Result<(), RuleStoreError> {
    let (target, previous) = self.target().await?;
    let temp_path = temp_path(&target)?;

    if let Err(e) = fs::write(&temp_path, content).await {
      event!(target: "udev-symlink-manager", Level::ERROR, path = %temp_path.display(), error = %e, "Failed to write rules");
      return Err(RuleStoreError::io(&self.path, e));
    }

    if let Some(previous) = &previous {
      if let Err(e) = carry_over(&temp_path, previous).await {
        event!(target: "udev-symlink-manager", Level::ERROR, path = %temp_path.display(), error = %e, "Failed to copy permissions of the rules file");
        let _ = fs::remove_file(&temp_path).await;
        return Err(RuleStoreError::io(&self.path, e));
      }
    }

    if let Err(e) = fs::rename(&temp_path, &target).await {
      event!(target: "udev-symlink-manager", Level::ERROR, path = %target.display(), error = %e, "Failed to replace rules file");
      let _ = fs::remove_file(&temp_path).await;
      return Err(RuleStoreError::io(&self.path, e));
    }

    event!(target: "udev-symlink-manager", Level::INFO, path = %self.path.display(), bytes = content.len(), "Wrote rules file");
    Ok(())
  }
}
