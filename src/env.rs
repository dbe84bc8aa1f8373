use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_MANIFEST_URL: &str = "https://update.palia.com/manifest/PatchManifest.json";

const GAME_EXECUTABLE: &str = "Palia.exe";
const LAUNCHER_CONFIG_FILE: &str = "LauncherConfig.json";

/// Returns the directory the game is installed into when none is configured.
pub fn default_installation_dir() -> PathBuf {
    match env::consts::OS {
        "windows" => PathBuf::from("C:\\").join("Program Files").join("Palia"),
        "macos" => env::var_os("HOME")
            .map(PathBuf::from)
            .map(|home| home.join("Library").join("Application Support"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Palia"),
        _ => env::var_os("HOME")
            .map(PathBuf::from)
            .map(|home| home.join(".local").join("share"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Palia"),
    }
}

/// Main executable; its presence means the baseline archive has been installed.
pub fn game_executable(root: &Path) -> PathBuf {
    root.join(GAME_EXECUTABLE)
}

pub fn binaries_dir(root: &Path) -> PathBuf {
    root.join("Palia").join("Binaries").join("Win64")
}

pub fn paks_dir(root: &Path) -> PathBuf {
    root.join("Palia").join("Content").join("Paks")
}

pub fn launcher_config_path(root: &Path) -> PathBuf {
    root.join(LAUNCHER_CONFIG_FILE)
}
