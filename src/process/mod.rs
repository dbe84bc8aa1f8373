use std::path::Path;
use std::process::{Command, Stdio};

use log::{info, warn};

use crate::env;
use crate::error::{UpdateError, UpdateResult};

pub const UNSUPPORTED_PLATFORM_NOTICE: &str =
    "To play the game, please run Windows, or run this launcher under Wine";

#[derive(Debug, PartialEq, Eq)]
pub enum HandOff {
    Launched,
    UnsupportedPlatform,
}

/// Start the installed game when the platform can run it.
pub fn hand_off(root: &Path) -> UpdateResult<HandOff> {
    if !cfg!(target_os = "windows") {
        info!("launch: not on Windows, leaving the game for the operator to start");
        return Ok(HandOff::UnsupportedPlatform);
    }

    let executable = env::game_executable(root);
    if !executable.exists() {
        warn!("launch: game not found at {}", executable.display());
        return Err(UpdateError::io(
            &executable,
            std::io::Error::new(std::io::ErrorKind::NotFound, "game executable missing"),
        ));
    }

    info!("launch: starting {}", executable.display());
    Command::new(&executable)
        .current_dir(root)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| UpdateError::io(&executable, e))?;
    Ok(HandOff::Launched)
}
