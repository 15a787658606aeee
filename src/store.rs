use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{SessionCredential, StoreError};

/// Single-record credential file. A save replaces the previous record.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes to a sibling temp file and renames it into place so readers
    /// see either the old record or the new one.
    pub async fn save(&self, credential: &SessionCredential) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(credential).map_err(StoreError::Encode)?;

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&dir).await?;

        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "credential".to_string());
        let tmp = dir.join(format!(".{file_name}.{:016x}.tmp", rand::random::<u64>()));

        tokio::fs::write(&tmp, &bytes).await?;
        restrict_permissions(&tmp).await?;
        if let Err(err) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err.into());
        }

        debug!(path = %self.path.display(), "credential saved");
        Ok(())
    }

    pub async fn load(&self) -> Result<SessionCredential, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    path: self.path.clone(),
                });
            }
            Err(err) => return Err(err.into()),
        };

        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
