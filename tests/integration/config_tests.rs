use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use ibroadcast_uploader::config::{Config, ENV_PREFIX};
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn test_config_load_defaults() {
    // Use figment directly without Env to avoid interference from other tests
    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .extract()
        .unwrap();
    assert_eq!(config.parallel_uploads, 3);
    assert!(config.use_cache);
    assert_eq!(config.cache_path, None);
    assert_eq!(config.request_timeout_secs, None);
}

#[test]
fn test_config_load_from_env() {
    std::env::set_var("IBUPTEST_PARALLEL_UPLOADS", "6");
    std::env::set_var("IBUPTEST_USE_CACHE", "false");

    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Env::prefixed("IBUPTEST_"))
        .extract()
        .unwrap();

    assert_eq!(config.parallel_uploads, 6);
    assert!(!config.use_cache);

    std::env::remove_var("IBUPTEST_PARALLEL_UPLOADS");
    std::env::remove_var("IBUPTEST_USE_CACHE");
}

#[test]
fn test_env_prefix() {
    assert_eq!(ENV_PREFIX, "IBUP_");
}

#[test]
fn test_config_load_from_toml() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
parallel_uploads = 2
cache_path = "/data/md5s"
prune_cache = true
api_url = "http://localhost:8080/s/JSON/"
follow_symlinks = true
"#,
    )
    .unwrap();

    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .extract()
        .unwrap();

    assert_eq!(config.parallel_uploads, 2);
    assert_eq!(config.cache_path, Some(PathBuf::from("/data/md5s")));
    assert!(config.prune_cache);
    assert_eq!(config.api_url, "http://localhost:8080/s/JSON/");
    assert!(config.follow_symlinks);
    assert!(config.use_cache);
}

#[test]
fn test_config_save_toml() {
    let mut config = Config::default();
    config.parallel_uploads = 4;
    config.skip_confirmation = true;

    let content = toml::to_string_pretty(&config).unwrap();
    assert!(content.contains("parallel_uploads = 4"));
    assert!(content.contains("skip_confirmation = true"));

    let parsed: Config = toml::from_str(&content).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_load_from_path_rejects_out_of_range() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "parallel_uploads = 12\n").unwrap();

    let err = Config::load_from_path(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("parallel_uploads"));
}

#[test]
fn test_load_from_path_rejects_invalid_toml() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "parallel_uploads = \"many\"\n").unwrap();

    assert!(Config::load_from_path(&path).is_err());
}

#[test]
fn test_load_from_missing_path_uses_defaults() {
    let dir = tempdir().unwrap();
    let config = Config::load_from_path(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.parallel_uploads, Config::default().parallel_uploads);
}
