//! Tests for persisted settings.

use std::path::PathBuf;

use tempfile::TempDir;
use weave_vault::{VaultSettings, load_settings_from_path, save_settings_to_path};

#[test]
fn test_missing_file_gives_defaults() {
    let settings = load_settings_from_path(&PathBuf::from("/definitely/not/settings.yaml"));
    assert_eq!(settings, VaultSettings::default());
}

#[test]
fn test_malformed_file_gives_defaults() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = TempDir::new()?;
    let path = tmp.path().join("settings.yaml");
    std::fs::write(&path, "engine: [not, a, mapping\n")?;
    assert_eq!(load_settings_from_path(&path), VaultSettings::default());
    Ok(())
}

#[test]
fn test_save_then_load() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = TempDir::new()?;
    let path = tmp.path().join("weave/settings.yaml");
    let mut settings = VaultSettings {
        last_directory: Some(PathBuf::from("/vaults/main")),
        ..VaultSettings::default()
    };
    settings.set_show_all(&PathBuf::from("/vaults/main"), true);
    settings.engine.stability_window_ms = 250;

    save_settings_to_path(&settings, &path)?;
    let loaded = load_settings_from_path(&path);
    assert_eq!(loaded, settings);
    assert!(std::fs::read_to_string(&path)?.contains("stability_window_ms: 250"));
    Ok(())
}
