//! Persisted user settings.
//!
//! Stored as YAML at `<config home>/weave/settings.yaml`. The config home is
//! resolved as: explicit override (CLI `--conf-home`), then
//! `WEAVE_CONFIG_HOME`, then the platform config directory.
//!
//! A missing file yields defaults; an unreadable or malformed one yields
//! defaults plus a warning. Settings never stop the engine from starting.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use weave_graph::{DEFAULT_MAX_FILES, LoadOptions};
use weave_io::RetryPolicy;

use crate::error::VaultError;

const SETTINGS_RELATIVE_PATH: &str = "weave/settings.yaml";
const CONFIG_HOME_ENV: &str = "WEAVE_CONFIG_HOME";
static CONFIG_HOME_OVERRIDE: OnceLock<PathBuf> = OnceLock::new();

/// Engine tuning (`engine:` section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Note ceiling for a vault load.
    pub max_files: usize,
    /// Largest note the watcher will read.
    pub max_file_bytes: u64,
    /// Read attempts per file event, including the first.
    pub read_retry_attempts: u32,
    /// First retry delay; doubled after each failure.
    pub read_retry_backoff_ms: u64,
    /// Quiet period before a modified file is processed.
    pub stability_window_ms: u64,
    /// Bounded queue between watcher and session.
    pub event_queue_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_file_bytes: 4 * 1024 * 1024,
            read_retry_attempts: 3,
            read_retry_backoff_ms: 100,
            stability_window_ms: 100,
            event_queue_capacity: 256,
        }
    }
}

impl EngineSettings {
    /// Scan options for a vault load.
    #[must_use]
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions::default().with_max_files(self.max_files)
    }

    /// Retry policy for watcher-triggered reads.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.read_retry_attempts,
            Duration::from_millis(self.read_retry_backoff_ms),
        )
    }
}

/// Everything persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultSettings {
    /// Vault opened most recently.
    pub last_directory: Option<PathBuf>,
    /// Per-vault "show all nodes" toggle, keyed by directory.
    pub show_all: BTreeMap<String, bool>,
    /// Engine tuning.
    pub engine: EngineSettings,
}

impl VaultSettings {
    /// Show-all toggle for `directory` (off unless set).
    #[must_use]
    pub fn show_all_for(&self, directory: &Path) -> bool {
        self.show_all
            .get(directory.to_string_lossy().as_ref())
            .copied()
            .unwrap_or(false)
    }

    /// Set the show-all toggle for `directory`.
    pub fn set_show_all(&mut self, directory: &Path, value: bool) {
        self.show_all
            .insert(directory.to_string_lossy().to_string(), value);
    }
}

/// Set the config-home override (used by CLI `--conf-home`).
///
/// Relative paths are taken against the current directory. Only the first
/// call wins.
pub fn set_config_home_override(path: impl Into<PathBuf>) {
    let path = path.into();
    if path.as_os_str().is_empty() {
        return;
    }
    if CONFIG_HOME_OVERRIDE.set(path.clone()).is_err()
        && let Some(current) = CONFIG_HOME_OVERRIDE.get()
        && current != &path
    {
        tracing::warn!(
            current = %current.display(),
            ignored = %path.display(),
            "config home override already set; ignoring subsequent value"
        );
    }
}

fn absolutize(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(&path))
        .unwrap_or(path)
}

/// Directory holding the `weave/` settings folder, if any can be determined.
#[must_use]
pub fn resolve_config_home() -> Option<PathBuf> {
    if let Some(path) = CONFIG_HOME_OVERRIDE.get() {
        return Some(absolutize(path.clone()));
    }
    std::env::var(CONFIG_HOME_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(|v| absolutize(PathBuf::from(v)))
        .or_else(dirs::config_dir)
}

/// Resolved settings file path.
#[must_use]
pub fn settings_path() -> Option<PathBuf> {
    resolve_config_home().map(|home| home.join(SETTINGS_RELATIVE_PATH))
}

/// Load settings from the resolved path (defaults when none resolves).
#[must_use]
pub fn load_settings() -> VaultSettings {
    match settings_path() {
        Some(path) => load_settings_from_path(&path),
        None => {
            tracing::warn!("no config directory available; using default settings");
            VaultSettings::default()
        }
    }
}

/// Load settings from `path`, falling back to defaults.
#[must_use]
pub fn load_settings_from_path(path: &Path) -> VaultSettings {
    if !path.exists() {
        return VaultSettings::default();
    }
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "failed to read settings file; using defaults"
            );
            return VaultSettings::default();
        }
    };
    if raw.trim().is_empty() {
        return VaultSettings::default();
    }
    match serde_yaml::from_str::<VaultSettings>(&raw) {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "failed to parse settings yaml; using defaults"
            );
            VaultSettings::default()
        }
    }
}

/// Write settings to the resolved path; returns where they went.
///
/// # Errors
/// [`VaultError::Settings`] when no config home resolves or the write fails.
pub fn save_settings(settings: &VaultSettings) -> Result<PathBuf, VaultError> {
    let path = settings_path().ok_or_else(|| VaultError::Settings {
        path: PathBuf::from(SETTINGS_RELATIVE_PATH),
        message: "no config directory available".to_string(),
    })?;
    save_settings_to_path(settings, &path)?;
    Ok(path)
}

/// Write settings to `path`, creating parent directories.
///
/// # Errors
/// [`VaultError::Settings`] when encoding or writing fails.
pub fn save_settings_to_path(settings: &VaultSettings, path: &Path) -> Result<(), VaultError> {
    let settings_error = |message: String| VaultError::Settings {
        path: path.to_path_buf(),
        message,
    };
    let yaml = serde_yaml::to_string(settings).map_err(|err| settings_error(err.to_string()))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| settings_error(err.to_string()))?;
    }
    std::fs::write(path, yaml).map_err(|err| settings_error(err.to_string()))?;
    tracing::debug!(path = %path.display(), "settings saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_engine_section_keeps_defaults() {
        let parsed: VaultSettings =
            serde_yaml::from_str("engine:\n  max_files: 10\n").unwrap();
        assert_eq!(parsed.engine.max_files, 10);
        assert_eq!(parsed.engine.read_retry_attempts, 3);
        assert_eq!(parsed.engine.stability_window_ms, 100);
        assert!(parsed.last_directory.is_none());
    }

    #[test]
    fn test_show_all_toggle() {
        let mut settings = VaultSettings::default();
        let dir = Path::new("/vaults/a");
        assert!(!settings.show_all_for(dir));
        settings.set_show_all(dir, true);
        assert!(settings.show_all_for(dir));
        assert!(!settings.show_all_for(Path::new("/vaults/b")));
    }

    #[test]
    fn test_engine_policy() {
        let engine = EngineSettings {
            read_retry_attempts: 0,
            ..EngineSettings::default()
        };
        assert_eq!(engine.retry_policy().attempts, 1);
        assert_eq!(engine.load_options().max_files, DEFAULT_MAX_FILES);
    }
}
