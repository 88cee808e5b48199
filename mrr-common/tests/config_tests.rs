//! Tests for bootstrap configuration and root folder resolution
//!
//! Tests that read or write MRR_ROOT_FOLDER / MRR_CONFIG are marked #[serial]
//! so they never race each other on the process environment.

use mrr_common::config::{
    CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig, CONFIG_PATH_ENV,
    ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert!(defaults.root_folder.ends_with("mrr") || defaults.root_folder.ends_with("mrr_data"));
    assert_eq!(defaults.log_level, "info");
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let resolved = RootFolderResolver::new().resolve();

    assert_eq!(resolved, CompiledDefaults::for_current_platform().root_folder);
}

#[test]
#[serial]
fn test_resolver_cli_beats_env_and_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/from-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..Default::default()
    };

    let resolved = RootFolderResolver::new()
        .with_cli_arg(Some(PathBuf::from("/tmp/from-cli")))
        .with_toml(&config)
        .resolve();

    env::remove_var(ROOT_FOLDER_ENV);
    assert_eq!(resolved, PathBuf::from("/tmp/from-cli"));
}

#[test]
#[serial]
fn test_resolver_env_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/from-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..Default::default()
    };

    let resolved = RootFolderResolver::new().with_toml(&config).resolve();

    env::remove_var(ROOT_FOLDER_ENV);
    assert_eq!(resolved, PathBuf::from("/tmp/from-env"));
}

#[test]
#[serial]
fn test_resolver_toml_used_without_env() {
    env::remove_var(ROOT_FOLDER_ENV);
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..Default::default()
    };

    let resolved = RootFolderResolver::new().with_toml(&config).resolve();

    assert_eq!(resolved, PathBuf::from("/tmp/from-toml"));
}

#[test]
#[serial]
fn test_resolve_config_from_env_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mrr.toml");
    std::fs::write(&path, "[calculation]\ntax_percent = 10.0\n").unwrap();

    env::set_var(CONFIG_PATH_ENV, &path);
    let config = TomlConfig::resolve(None);
    env::remove_var(CONFIG_PATH_ENV);

    assert_eq!(config.unwrap().calculation.tax_percent, 10.0);
}

#[test]
#[serial]
fn test_resolve_config_explicit_path_beats_env() {
    let dir = tempfile::tempdir().unwrap();
    let explicit = dir.path().join("explicit.toml");
    let from_env = dir.path().join("env.toml");
    std::fs::write(&explicit, "[logging]\nlevel = \"debug\"\n").unwrap();
    std::fs::write(&from_env, "[logging]\nlevel = \"warn\"\n").unwrap();

    env::set_var(CONFIG_PATH_ENV, &from_env);
    let config = TomlConfig::resolve(Some(&explicit));
    env::remove_var(CONFIG_PATH_ENV);

    assert_eq!(config.unwrap().logging.level, "debug");
}

#[test]
fn test_initializer_creates_directory() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("nested").join("mrr");

    let initializer = RootFolderInitializer::new(root.clone());
    assert!(!root.exists());

    initializer.ensure_directory_exists().unwrap();
    assert!(root.is_dir());

    // Second call is a no-op
    initializer.ensure_directory_exists().unwrap();
}

#[test]
fn test_initializer_database_path() {
    let dir = tempfile::tempdir().unwrap();
    let initializer = RootFolderInitializer::new(dir.path().to_path_buf());

    assert_eq!(initializer.database_path(), dir.path().join("royalties.db"));
    assert!(!initializer.database_exists());
}
