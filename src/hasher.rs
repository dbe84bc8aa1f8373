use std::fs;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{UpdateError, UpdateResult};

const BUFFER_SIZE: usize = 8192;

/// Stream `path` through SHA-256 and return the lowercase hex digest.
pub fn sha256_file(path: &Path) -> UpdateResult<String> {
    let mut file = fs::File::open(path).map_err(|e| UpdateError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; BUFFER_SIZE];
    loop {
        let read = file.read(&mut buf).map_err(|e| UpdateError::io(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Manifest hashes are compared case-insensitively.
#[must_use]
pub fn hashes_match(expected: &str, actual: &str) -> bool {
    expected.trim().eq_ignore_ascii_case(actual.trim())
}
