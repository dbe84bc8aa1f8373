use std::path::{Path, PathBuf};

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::env;
use crate::error::{UpdateError, UpdateResult};
use crate::util::url_file_name;

/// How a manifest file is applied, decided once from the URL extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    Archive,
    Binary,
    DataFile,
    Unsupported,
}

impl FileKind {
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_ascii_lowercase().as_str() {
            "zip" => FileKind::Archive,
            "exe" => FileKind::Binary,
            "pak" => FileKind::DataFile,
            _ => FileKind::Unsupported,
        }
    }

    /// Whether the manifest must carry a hash for this kind.
    pub fn requires_hash(self) -> bool {
        matches!(self, FileKind::Binary | FileKind::DataFile)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileSpec {
    pub url: String,
    pub file_name: String,
    pub hash: Option<String>,
    pub kind: FileKind,
    /// Operator-supplied replacement for the download, set before the spec is applied.
    pub local_override: Option<PathBuf>,
}

impl FileSpec {
    pub fn new(url: &str, hash: Option<&str>) -> UpdateResult<Self> {
        let file_name = url_file_name(url).ok_or_else(|| UpdateError::FileSpec {
            url: url.to_owned(),
            reason: "URL has no file name".into(),
        })?;
        let extension = match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext,
            _ => {
                return Err(UpdateError::FileSpec {
                    url: url.to_owned(),
                    reason: "URL has no file extension".into(),
                });
            }
        };
        let kind = FileKind::from_extension(extension);
        let hash = hash
            .map(str::trim)
            .filter(|hash| !hash.is_empty())
            .map(str::to_ascii_lowercase);
        if kind.requires_hash() && hash.is_none() {
            return Err(UpdateError::FileSpec {
                url: url.to_owned(),
                reason: "missing content hash".into(),
            });
        }
        Ok(Self {
            url: url.to_owned(),
            file_name: file_name.to_owned(),
            hash,
            kind,
            local_override: None,
        })
    }

    /// Destination on disk. Archives resolve to a download location inside the root; their
    /// entries are extracted into the root itself.
    pub fn local_path(&self, root: &Path) -> PathBuf {
        match self.kind {
            FileKind::Binary => env::binaries_dir(root).join(&self.file_name),
            FileKind::DataFile => env::paks_dir(root).join(&self.file_name),
            FileKind::Archive | FileKind::Unsupported => root.join(&self.file_name),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Informational only.
    pub baseline: bool,
    pub files: Vec<FileSpec>,
}

/// Parsed manifest, ascending by version.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Manifest {
    pub versions: Vec<(Version, ManifestEntry)>,
}

impl Manifest {
    pub fn latest_version(&self) -> Option<&Version> {
        self.versions.last().map(|(version, _)| version)
    }

    /// Attach an operator-supplied archive to every archive entry.
    pub fn set_archive_override(&mut self, path: &Path) {
        for (_, entry) in &mut self.versions {
            for file in &mut entry.files {
                if file.kind == FileKind::Archive {
                    file.local_override = Some(path.to_path_buf());
                }
            }
        }
    }
}

/// Highest version whose files were all applied. Persisted as `LauncherConfig.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledVersion {
    #[serde(rename = "GameVersion")]
    pub version: Version,
}

impl Default for InstalledVersion {
    fn default() -> Self {
        Self {
            version: Version::new(0, 0, 0),
        }
    }
}
