use ibroadcast_uploader::cache::HashCache;
use ibroadcast_uploader::remote::mock::MockRemote;
use ibroadcast_uploader::remote::RemoteService;
use ibroadcast_uploader::upload::{self, RunOptions};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_garbage_cache_loads_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(".ibroadcast_md5s");
    fs::write(&path, b"not json at all").unwrap();

    let cache = HashCache::load(&path);
    assert!(cache.is_empty());
    assert_eq!(cache.path(), Some(path.as_path()));
}

#[test]
fn test_invalid_entries_dropped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(".ibroadcast_md5s");
    fs::write(
        &path,
        r#"{
            "/music/good.mp3": "5eb63bbbe01eeed093cb22bb8f5acdc3",
            "/music/short.mp3": "abc",
            "/music/number.mp3": 42
        }"#,
    )
    .unwrap();

    let cache = HashCache::load(&path);
    assert_eq!(cache.len(), 1);
    assert!(cache.get(std::path::Path::new("/music/good.mp3")).is_some());
}

#[test]
fn test_run_recovers_from_corrupt_cache() {
    let music = tempdir().unwrap();
    fs::write(music.path().join("a.mp3"), b"alpha").unwrap();
    fs::write(music.path().join("b.mp3"), b"beta").unwrap();

    let cache_dir = tempdir().unwrap();
    let cache_path = cache_dir.path().join(".ibroadcast_md5s");
    fs::write(&cache_path, b"{ truncated").unwrap();

    let remote = MockRemote::new();
    let session = remote.login("t").unwrap();
    let (summary, _) = upload::run(
        &remote,
        session,
        HashCache::load(&cache_path),
        RunOptions::new(music.path()),
    )
    .unwrap();

    assert_eq!(summary.uploaded, 2);
    assert_eq!(summary.files_hashed, 2);

    // The corrupt file was replaced with a valid one.
    let content = fs::read_to_string(&cache_path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(parsed.as_object().unwrap().len(), 2);
}

#[test]
fn test_cache_is_flat_path_to_digest_object() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("md5s");

    let mut cache = HashCache::load(&path);
    cache.put(
        std::path::Path::new("/music/a.mp3"),
        "d41d8cd98f00b204e9800998ecf8427e".parse().unwrap(),
    );
    cache.flush().unwrap();

    let parsed: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(
        parsed["/music/a.mp3"],
        serde_json::json!("d41d8cd98f00b204e9800998ecf8427e")
    );
}

#[cfg(unix)]
#[test]
fn test_unwritable_cache_does_not_fail_run() {
    use std::os::unix::fs::PermissionsExt;

    let music = tempdir().unwrap();
    fs::write(music.path().join("a.mp3"), b"alpha").unwrap();

    let cache_dir = tempdir().unwrap();
    let locked = cache_dir.path().join("locked");
    fs::create_dir(&locked).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o500)).unwrap();

    // Root ignores directory permissions; nothing to check then.
    if fs::write(locked.join("write-check"), b"x").is_ok() {
        return;
    }

    let remote = MockRemote::new();
    let session = remote.login("t").unwrap();
    let result = upload::run(
        &remote,
        session,
        HashCache::load(&locked.join(".ibroadcast_md5s")),
        RunOptions::new(music.path()),
    );

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o700)).unwrap();
    assert_eq!(result.unwrap().0.uploaded, 1);
}
