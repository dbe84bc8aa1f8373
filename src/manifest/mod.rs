//! Patch manifest decoding.
//!
//! The remote document maps version strings to `{ BaseLineVer, Files: [{ URL, Hash }] }`.
//! Keys are parsed as semantic versions and the result is ordered numerically.

use std::collections::HashMap;

use log::{debug, warn};
use semver::Version;
use serde::Deserialize;

use crate::engine::models::{FileKind, FileSpec, Manifest, ManifestEntry};
use crate::error::{UpdateError, UpdateResult};

#[derive(Debug, Deserialize)]
struct RawVersion {
    #[serde(rename = "BaseLineVer", default)]
    baseline: bool,
    #[serde(rename = "Files", default)]
    files: Vec<RawFile>,
}

#[derive(Debug, Deserialize)]
struct RawFile {
    #[serde(rename = "URL")]
    url: String,
    #[serde(rename = "Hash", default)]
    hash: Option<String>,
}

pub fn parse(raw: &[u8]) -> UpdateResult<Manifest> {
    let document: HashMap<String, RawVersion> =
        serde_json::from_slice(raw).map_err(|e| UpdateError::ManifestFormat(e.to_string()))?;

    let mut versions = Vec::with_capacity(document.len());
    for (key, raw_version) in document {
        let version = Version::parse(key.trim()).map_err(|e| {
            UpdateError::ManifestFormat(format!("invalid version key {key:?}: {e}"))
        })?;
        let mut files = Vec::with_capacity(raw_version.files.len());
        for raw_file in raw_version.files {
            let spec = FileSpec::new(&raw_file.url, raw_file.hash.as_deref())?;
            if spec.kind == FileKind::Unsupported {
                warn!(
                    "manifest: unsupported file type for {} in {}, it will not be applied",
                    spec.url, version
                );
            }
            files.push(spec);
        }
        versions.push((
            version,
            ManifestEntry {
                baseline: raw_version.baseline,
                files,
            },
        ));
    }
    versions.sort_by(|(a, _), (b, _)| a.cmp(b));
    debug!("manifest: parsed {} versions", versions.len());

    Ok(Manifest { versions })
}
