use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use semver::Version;
use tokio::fs;

use crate::archive::{self, ExtractionReport};
use crate::engine::models::{FileKind, FileSpec, InstalledVersion, Manifest};
use crate::engine::state::ReconcileState;
use crate::env;
use crate::error::{UpdateError, UpdateResult};
use crate::hasher;
use crate::networking::Fetcher;
use crate::progress::{ProgressObserver, ProgressUpdate};
use crate::storage::StorageManager;

pub mod models;
pub mod state;

/// What a reconciliation run did.
#[derive(Debug)]
pub struct ReconcileSummary {
    pub marker: InstalledVersion,
    pub fetches: usize,
    pub verified: usize,
    pub unsupported: usize,
    pub extractions: Vec<ExtractionReport>,
}

/// Brings an installation in line with a manifest, one version at a time.
pub struct ReconciliationEngine {
    pub state: ReconcileState,
    root: PathBuf,
    fetcher: Arc<dyn Fetcher>,
    storage: StorageManager,
    progress: Arc<dyn ProgressObserver>,
}

impl ReconciliationEngine {
    pub fn new(
        root: impl Into<PathBuf>,
        fetcher: Arc<dyn Fetcher>,
        storage: StorageManager,
        progress: Arc<dyn ProgressObserver>,
    ) -> Self {
        Self {
            state: ReconcileState::Idle,
            root: root.into(),
            fetcher,
            storage,
            progress,
        }
    }

    fn installation_exists(&self) -> bool {
        env::game_executable(&self.root).exists()
    }

    /// Apply every manifest version above `marker`, re-checking the ones already applied.
    ///
    /// The marker is persisted after each fully applied version and returned in the summary.
    /// On error the persisted marker still names the last version that completed.
    pub async fn reconcile(
        &mut self,
        manifest: &Manifest,
        marker: InstalledVersion,
    ) -> UpdateResult<ReconcileSummary> {
        info!(
            "reconcile: installed {} / manifest latest {}",
            marker.version,
            manifest
                .latest_version()
                .map_or_else(|| "none".to_owned(), Version::to_string)
        );
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| UpdateError::io(&self.root, e))?;

        self.state = if self.installation_exists() {
            ReconcileState::Reconciling {
                version: marker.version.clone(),
            }
        } else {
            ReconcileState::NeedsBootstrap
        };

        let last_declared = last_declarations(manifest, &self.root);
        let mut summary = ReconcileSummary {
            marker,
            fetches: 0,
            verified: 0,
            unsupported: 0,
            extractions: Vec::new(),
        };

        for (version, entry) in &manifest.versions {
            if *version > summary.marker.version {
                self.state = ReconcileState::Reconciling {
                    version: version.clone(),
                };
            }
            debug!(
                "reconcile: version {version} ({} files, baseline: {})",
                entry.files.len(),
                entry.baseline
            );

            for file in &entry.files {
                match file.kind {
                    FileKind::Archive => self.apply_archive(file, &mut summary).await?,
                    FileKind::Binary | FileKind::DataFile => {
                        let path = file.local_path(&self.root);
                        let superseded = last_declared
                            .get(&path)
                            .is_some_and(|latest| latest > version);
                        if superseded && summary.marker.version >= *version {
                            debug!(
                                "reconcile: {} from {version} replaced by a later version",
                                file.file_name
                            );
                            continue;
                        }
                        self.apply_verified(version, file, &path, &mut summary)
                            .await?;
                    }
                    FileKind::Unsupported => {
                        warn!(
                            "reconcile: skipping {} in {version}, unsupported file type",
                            file.url
                        );
                        summary.unsupported += 1;
                    }
                }
            }

            if *version > summary.marker.version {
                let next = InstalledVersion {
                    version: version.clone(),
                };
                self.storage.write_installed_version(&next).await?;
                summary.marker = next;
                info!("reconcile: version {version} applied");
            }
        }

        self.state = ReconcileState::UpToDate {
            version: summary.marker.version.clone(),
        };
        info!(
            "reconcile: up to date at {} ({} downloads)",
            summary.marker.version, summary.fetches
        );
        Ok(summary)
    }

    /// Baseline archives are installed once; an existing executable means they were.
    async fn apply_archive(
        &self,
        file: &FileSpec,
        summary: &mut ReconcileSummary,
    ) -> UpdateResult<()> {
        if self.installation_exists() {
            debug!(
                "reconcile: installation present, skipping archive {}",
                file.file_name
            );
            return Ok(());
        }

        let (archive_path, downloaded) = match &file.local_override {
            Some(path) => {
                info!("reconcile: using local archive {}", path.display());
                (path.clone(), false)
            }
            None => {
                let path = file.local_path(&self.root);
                self.fetch(file, &path, summary).await?;
                (path, true)
            }
        };

        let result = archive::extract_zip(&archive_path, &self.root, self.progress.as_ref());
        if downloaded && let Err(err) = fs::remove_file(&archive_path).await {
            warn!(
                "reconcile: could not remove {}: {err}",
                archive_path.display()
            );
        }
        summary.extractions.push(result?);
        Ok(())
    }

    async fn apply_verified(
        &self,
        version: &Version,
        file: &FileSpec,
        path: &Path,
        summary: &mut ReconcileSummary,
    ) -> UpdateResult<()> {
        let expected = file.hash.as_deref().ok_or_else(|| UpdateError::FileSpec {
            url: file.url.clone(),
            reason: "missing content hash".into(),
        })?;
        let accepted = summary.marker.version >= *version;

        let mut fetched = false;
        if !path.exists() || !accepted {
            self.fetch(file, path, summary).await?;
            fetched = true;
        }

        let mut actual = self.hash(file, path)?;
        let repairable = !fetched && file.kind == FileKind::Binary;
        if repairable && !hasher::hashes_match(expected, &actual) {
            // Binaries accepted by an earlier run get one fresh copy before failing.
            warn!(
                "reconcile: {} differs from the accepted {version} copy, downloading again",
                file.file_name
            );
            self.fetch(file, path, summary).await?;
            actual = self.hash(file, path)?;
        }

        if !hasher::hashes_match(expected, &actual) {
            return Err(UpdateError::Integrity {
                file: file.file_name.clone(),
                expected: expected.to_owned(),
                actual,
            });
        }
        summary.verified += 1;
        Ok(())
    }

    async fn fetch(
        &self,
        file: &FileSpec,
        dest: &Path,
        summary: &mut ReconcileSummary,
    ) -> UpdateResult<()> {
        info!("reconcile: downloading {} to {}", file.url, dest.display());
        summary.fetches += 1;
        self.fetcher
            .fetch(&file.url, dest, self.progress.as_ref())
            .await
    }

    fn hash(&self, file: &FileSpec, path: &Path) -> UpdateResult<String> {
        self.progress.report(
            ProgressUpdate::message("hash", format!("Hashing {}", file.file_name))
                .with_file(&file.file_name),
        );
        let digest = hasher::sha256_file(path)?;
        self.progress.report(
            ProgressUpdate::message("hash", format!("Hashed {}", file.file_name))
                .with_file(&file.file_name),
        );
        Ok(digest)
    }
}

/// Latest version declaring each hashed destination path.
fn last_declarations(manifest: &Manifest, root: &Path) -> HashMap<PathBuf, Version> {
    let mut latest = HashMap::new();
    for (version, entry) in &manifest.versions {
        for file in entry.files.iter().filter(|file| file.kind.requires_hash()) {
            latest.insert(file.local_path(root), version.clone());
        }
    }
    latest
}
