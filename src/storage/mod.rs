use std::path::{Path, PathBuf};

use log::{debug, info};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use crate::engine::models::InstalledVersion;
use crate::env;
use crate::error::{UpdateError, UpdateResult};

/// Reads and writes `LauncherConfig.json` inside the installation root.
#[derive(Clone, Debug)]
pub struct StorageManager {
    config_path: PathBuf,
}

impl StorageManager {
    pub fn new(installation_root: &Path) -> Self {
        Self {
            config_path: env::launcher_config_path(installation_root),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Missing config means nothing has been applied yet.
    pub async fn read_installed_version(&self) -> UpdateResult<InstalledVersion> {
        let bytes = match fs::read(&self.config_path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    "storage: no launcher config at {}, assuming 0.0.0",
                    self.config_path.display()
                );
                return Ok(InstalledVersion::default());
            }
            Err(err) => return Err(UpdateError::io(&self.config_path, err)),
        };
        serde_json::from_slice(&bytes).map_err(|e| UpdateError::Config {
            path: self.config_path.clone(),
            reason: e.to_string(),
        })
    }

    /// Write through a temporary file so a crash never leaves a truncated config behind.
    pub async fn write_installed_version(&self, marker: &InstalledVersion) -> UpdateResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| UpdateError::io(parent, e))?;
        }
        let body = serde_json::to_vec_pretty(marker).map_err(|e| UpdateError::Config {
            path: self.config_path.clone(),
            reason: e.to_string(),
        })?;
        let tmp = self.config_path.with_extension("json.tmp");
        let mut file = File::create(&tmp)
            .await
            .map_err(|e| UpdateError::io(&tmp, e))?;
        file.write_all(&body)
            .await
            .map_err(|e| UpdateError::io(&tmp, e))?;
        file.sync_all()
            .await
            .map_err(|e| UpdateError::io(&tmp, e))?;
        drop(file);
        fs::rename(&tmp, &self.config_path)
            .await
            .map_err(|e| UpdateError::io(&self.config_path, e))?;
        info!("storage: installed version is now {}", marker.version);
        Ok(())
    }
}
