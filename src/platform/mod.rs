// Marksync platform paths
// Config and data directories for Linux (XDG), macOS and Windows.

use std::env;
use std::path::PathBuf;

const APP_DIR: &str = "marksync";

#[cfg(not(target_os = "windows"))]
fn home_dir() -> PathBuf {
    PathBuf::from(env::var("HOME").unwrap_or_else(|_| String::from("/tmp")))
}

/// Returns the configuration directory.
///
/// - **Linux**: `$XDG_CONFIG_HOME/marksync`, else `~/.config/marksync`
/// - **macOS**: `~/Library/Application Support/marksync`
/// - **Windows**: `%APPDATA%/marksync`
pub fn get_config_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        appdata().join(APP_DIR)
    }
    #[cfg(target_os = "macos")]
    {
        home_dir().join("Library").join("Application Support").join(APP_DIR)
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        xdg_dir("XDG_CONFIG_HOME", &[".config"])
    }
}

/// Returns the data directory holding the database.
///
/// - **Linux**: `$XDG_DATA_HOME/marksync`, else `~/.local/share/marksync`
/// - **macOS**: same as the config directory
/// - **Windows**: same as the config directory
pub fn get_data_dir() -> PathBuf {
    #[cfg(any(target_os = "windows", target_os = "macos"))]
    {
        get_config_dir()
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        xdg_dir("XDG_DATA_HOME", &[".local", "share"])
    }
}

#[cfg(target_os = "windows")]
fn appdata() -> PathBuf {
    PathBuf::from(
        env::var("APPDATA").unwrap_or_else(|_| String::from("C:\\Users\\Default\\AppData\\Roaming")),
    )
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn xdg_dir(var: &str, fallback: &[&str]) -> PathBuf {
    match env::var(var) {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir).join(APP_DIR),
        _ => fallback
            .iter()
            .fold(home_dir(), |path, part| path.join(part))
            .join(APP_DIR),
    }
}
