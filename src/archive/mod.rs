use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use zip::read::ZipArchive;

use crate::error::{UpdateError, UpdateResult};
use crate::progress::{ProgressObserver, ProgressUpdate};

#[derive(Debug, Default)]
pub struct ExtractionReport {
    pub extracted: Vec<PathBuf>,
    pub directories: usize,
    /// Entries that could not be written; each holds an `UpdateError::ArchiveEntry`.
    pub failures: Vec<UpdateError>,
}

impl ExtractionReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Extract every entry of the zip at `archive_path` under `destination`.
///
/// Failing to open the archive is fatal. A failure on a single entry is logged, recorded in the
/// report, and extraction moves on to the next entry.
pub fn extract_zip(
    archive_path: &Path,
    destination: &Path,
    progress: &dyn ProgressObserver,
) -> UpdateResult<ExtractionReport> {
    info!(
        "extract: unpacking {} into {}",
        archive_path.display(),
        destination.display()
    );
    let file = fs::File::open(archive_path).map_err(|e| UpdateError::ArchiveOpen {
        path: archive_path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut archive = ZipArchive::new(file).map_err(|e| UpdateError::ArchiveOpen {
        path: archive_path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let archive_name = archive_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let total = archive.len() as u64;
    let mut report = ExtractionReport::default();

    for index in 0..archive.len() {
        progress.report(
            ProgressUpdate::counted(
                "extract",
                format!("Unzipping {archive_name}"),
                index as u64,
                Some(total),
            )
            .with_file(archive_name.clone()),
        );
        match extract_entry(&mut archive, index, destination) {
            Ok(Some(path)) => report.extracted.push(path),
            Ok(None) => report.directories += 1,
            Err(err) => {
                warn!("extract: {err}");
                report.failures.push(err);
            }
        }
    }
    progress.report(
        ProgressUpdate::counted("extract", format!("Unzipped {archive_name}"), total, Some(total))
            .with_file(archive_name),
    );

    info!(
        "extract: {} files and {} directories written, {} corrupted entries",
        report.extracted.len(),
        report.directories,
        report.failures.len()
    );
    Ok(report)
}

/// Returns the written file, or `None` for a directory entry.
fn extract_entry(
    archive: &mut ZipArchive<fs::File>,
    index: usize,
    destination: &Path,
) -> UpdateResult<Option<PathBuf>> {
    let mut entry = archive.by_index(index).map_err(|e| UpdateError::ArchiveEntry {
        entry: format!("#{index}"),
        reason: e.to_string(),
    })?;
    let name = entry.name().to_owned();
    let entry_error = |reason: String| UpdateError::ArchiveEntry {
        entry: name.clone(),
        reason,
    };

    let relative = entry
        .enclosed_name()
        .ok_or_else(|| entry_error("path escapes the destination".into()))?;
    let out_path = destination.join(relative);

    if name.ends_with('/') || entry.is_dir() {
        fs::create_dir_all(&out_path).map_err(|e| entry_error(e.to_string()))?;
        return Ok(None);
    }
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent).map_err(|e| entry_error(e.to_string()))?;
    }

    let mut out_file = fs::File::create(&out_path).map_err(|e| entry_error(e.to_string()))?;
    if let Err(err) = io::copy(&mut entry, &mut out_file) {
        drop(out_file);
        let _ = fs::remove_file(&out_path);
        return Err(entry_error(err.to_string()));
    }
    debug!("extract: wrote {}", out_path.display());
    Ok(Some(out_path))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::{Cursor, Write};

    use zip::CompressionMethod;
    use zip::write::{SimpleFileOptions, ZipWriter};

    use super::*;
    use crate::progress::NoopProgress;
    use crate::progress::tests::RecordingProgress;

    /// Build a stored (uncompressed) zip in memory. Names ending in `/` become directories.
    pub(crate) fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, data) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(data.as_bytes()).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    fn corrupt(bytes: &mut [u8], needle: &[u8]) {
        let pos = bytes
            .windows(needle.len())
            .position(|window| window == needle)
            .expect("payload present in archive");
        bytes[pos] ^= 0xff;
    }

    #[test]
    fn extracts_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("game.zip");
        fs::write(
            &archive,
            build_zip(&[
                ("Palia/", ""),
                ("Palia/Content/Paks/base.pak", "base pak"),
                ("Palia.exe", "launcher binary"),
            ]),
        )
        .unwrap();
        let root = dir.path().join("install");

        let recorder = RecordingProgress::default();
        let report = extract_zip(&archive, &root, &recorder).unwrap();

        assert!(report.is_clean());
        assert_eq!(report.extracted.len(), 2);
        assert_eq!(report.directories, 1);
        assert_eq!(
            fs::read(root.join("Palia/Content/Paks/base.pak")).unwrap(),
            b"base pak"
        );
        assert_eq!(fs::read(root.join("Palia.exe")).unwrap(), b"launcher binary");

        let updates = recorder.updates.lock().unwrap();
        let positions: Vec<u64> = updates.iter().filter_map(|u| u.current).collect();
        assert!(positions.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(updates.last().unwrap().is_complete());
    }

    #[test]
    fn corrupt_entry_does_not_abort_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("game.zip");
        let mut bytes = build_zip(&[
            ("a.pak", "first valid payload"),
            ("b.pak", "CORRUPTED-PAYLOAD-BYTES"),
            ("c/d.pak", "third valid payload"),
        ]);
        corrupt(&mut bytes, b"CORRUPTED-PAYLOAD-BYTES");
        fs::write(&archive, bytes).unwrap();
        let root = dir.path().join("install");

        let report = extract_zip(&archive, &root, &NoopProgress).unwrap();

        assert_eq!(report.extracted.len(), 2);
        assert_eq!(report.failures.len(), 1);
        match &report.failures[0] {
            UpdateError::ArchiveEntry { entry, .. } => assert_eq!(entry, "b.pak"),
            other => panic!("unexpected failure: {other:?}"),
        }
        assert_eq!(fs::read(root.join("a.pak")).unwrap(), b"first valid payload");
        assert_eq!(fs::read(root.join("c/d.pak")).unwrap(), b"third valid payload");
        assert!(!root.join("b.pak").exists());
    }

    #[test]
    fn unreadable_archive_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("broken.zip");
        fs::write(&archive, b"this is not a zip file").unwrap();
        let err = extract_zip(&archive, dir.path(), &NoopProgress).unwrap_err();
        assert!(matches!(err, UpdateError::ArchiveOpen { .. }));

        let err = extract_zip(&dir.path().join("absent.zip"), dir.path(), &NoopProgress)
            .unwrap_err();
        assert!(matches!(err, UpdateError::ArchiveOpen { .. }));
    }
}
