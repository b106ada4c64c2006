use ibroadcast_uploader::cache::HashCache;
use ibroadcast_uploader::error::RunError;
use ibroadcast_uploader::remote::mock::{MockFailure, MockRemote};
use ibroadcast_uploader::remote::RemoteService;
use ibroadcast_uploader::scanner::hasher::hash_reader;
use ibroadcast_uploader::scanner::Digest;
use ibroadcast_uploader::upload::{self, RunOptions, RunSummary, UploadRun};
use std::ffi::OsString;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

fn library(names: &[&str]) -> TempDir {
    let dir = tempdir().unwrap();
    for name in names {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, format!("audio for {}", name)).unwrap();
    }
    dir
}

fn digest_of(path: &Path) -> Digest {
    hash_reader(fs::File::open(path).unwrap()).unwrap()
}

fn run(remote: &MockRemote, cache: HashCache, options: RunOptions) -> (RunSummary, HashCache) {
    let session = remote.login("token").unwrap();
    upload::run(remote, session, cache, options).unwrap()
}

fn counts(s: &RunSummary) -> (usize, usize, usize, usize) {
    (s.uploaded, s.skipped, s.failed, s.total)
}

fn file_names(paths: Vec<std::path::PathBuf>) -> Vec<OsString> {
    paths
        .into_iter()
        .map(|p| p.file_name().unwrap().to_owned())
        .collect()
}

#[test]
fn test_new_files_all_uploaded() {
    let dir = library(&["a.mp3", "b.mp3", "c.flac"]);
    let remote = MockRemote::new();

    let (summary, _) = run(&remote, HashCache::in_memory(), RunOptions::new(dir.path()));

    assert_eq!(counts(&summary), (3, 0, 0, 3));
    assert!(!summary.has_failures());
    assert_eq!(remote.upload_attempts().len(), 3);
}

#[test]
fn test_files_in_catalog_all_skipped() {
    let dir = library(&["a.mp3", "b.mp3", "c.flac"]);
    let digests: Vec<_> = ["a.mp3", "b.mp3", "c.flac"]
        .iter()
        .map(|n| digest_of(&dir.path().join(n)))
        .collect();
    let remote = MockRemote::new().with_catalog(digests);

    let (summary, _) = run(&remote, HashCache::in_memory(), RunOptions::new(dir.path()));

    assert_eq!(counts(&summary), (0, 3, 0, 3));
    assert!(remote.upload_attempts().is_empty());
}

#[test]
fn test_transport_error_isolated_to_one_file() {
    let dir = library(&["a.mp3", "b.mp3", "c.flac"]);
    let remote = MockRemote::new().failing_upload("b.mp3", MockFailure::ConnectionReset);

    let (summary, _) = run(&remote, HashCache::in_memory(), RunOptions::new(dir.path()));

    assert_eq!(counts(&summary), (2, 0, 1, 3));
    assert_eq!(file_names(summary.failed_paths.clone()), vec![OsString::from("b.mp3")]);
    assert_eq!(remote.upload_attempts().len(), 3);
}

#[test]
fn test_empty_directory_is_clean_success() {
    let dir = tempdir().unwrap();
    let remote = MockRemote::new();

    let (summary, _) = run(&remote, HashCache::in_memory(), RunOptions::new(dir.path()));

    assert_eq!(counts(&summary), (0, 0, 0, 0));
    assert!(!summary.has_failures());
}

#[test]
fn test_status_and_unacknowledged_both_fail() {
    let dir = library(&["a.mp3", "b.mp3", "c.mp3"]);
    let remote = MockRemote::new()
        .failing_upload("a.mp3", MockFailure::Status(500))
        .failing_upload("c.mp3", MockFailure::NotAcknowledged);

    let (summary, _) = run(&remote, HashCache::in_memory(), RunOptions::new(dir.path()));

    assert_eq!(counts(&summary), (1, 0, 2, 3));
    assert_eq!(
        file_names(summary.failed_paths.clone()),
        vec![OsString::from("a.mp3"), OsString::from("c.mp3")]
    );
}

#[test]
fn test_warm_cache_does_not_rehash() {
    let dir = library(&["a.mp3", "b.mp3", "sub/c.flac"]);
    let remote = MockRemote::new();
    let session = remote.login("token").unwrap();

    let mut first = UploadRun::new(
        &remote,
        session.clone(),
        HashCache::in_memory(),
        RunOptions::new(dir.path()),
    );
    let summary = first.execute().unwrap();
    assert_eq!(summary.files_hashed, 3);
    assert_eq!(summary.cache_hits, 0);

    let mut second = UploadRun::new(
        &remote,
        session,
        first.into_cache(),
        RunOptions::new(dir.path()),
    );
    let summary = second.execute().unwrap();

    assert_eq!(summary.files_hashed, 0);
    assert_eq!(summary.cache_hits, 3);
    assert_eq!(counts(&summary), (0, 3, 0, 3));
}

#[test]
fn test_force_rehash_recomputes_and_writes_back() {
    let dir = library(&["a.mp3", "b.mp3"]);
    let remote = MockRemote::new();

    let (_, cache) = run(&remote, HashCache::in_memory(), RunOptions::new(dir.path()));
    let (summary, cache) = run(
        &remote,
        cache,
        RunOptions::new(dir.path()).with_force_rehash(true),
    );

    assert_eq!(summary.files_hashed, 2);
    assert_eq!(summary.cache_hits, 0);
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_force_reupload_ignores_catalog() {
    let dir = library(&["a.mp3", "b.mp3"]);
    let digests = vec![
        digest_of(&dir.path().join("a.mp3")),
        digest_of(&dir.path().join("b.mp3")),
    ];
    let remote = MockRemote::new().with_catalog(digests);

    let (summary, _) = run(
        &remote,
        HashCache::in_memory(),
        RunOptions::new(dir.path()).with_force_reupload(true),
    );

    assert_eq!(counts(&summary), (2, 0, 0, 2));
    assert_eq!(remote.upload_attempts().len(), 2);
}

#[test]
fn test_only_missing_files_attempted_exactly_once() {
    let dir = library(&["a.mp3", "b.mp3", "c.mp3", "d.flac"]);
    let remote = MockRemote::new().with_catalog(vec![
        digest_of(&dir.path().join("a.mp3")),
        digest_of(&dir.path().join("c.mp3")),
    ]);

    let (summary, _) = run(
        &remote,
        HashCache::in_memory(),
        RunOptions::new(dir.path()).with_parallel_uploads(4),
    );

    assert_eq!(counts(&summary), (2, 2, 0, 4));
    assert_eq!(
        file_names(remote.attempted_paths()),
        vec![OsString::from("b.mp3"), OsString::from("d.flac")]
    );
}

#[test]
fn test_identical_content_under_two_names() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.mp3"), b"same audio").unwrap();
    fs::write(dir.path().join("b.mp3"), b"same audio").unwrap();
    let remote = MockRemote::new();

    let (first, _) = run(&remote, HashCache::in_memory(), RunOptions::new(dir.path()));
    assert_eq!(first.total, 2);

    // The first run stored the content, so a second run skips both names.
    let (second, _) = run(&remote, HashCache::in_memory(), RunOptions::new(dir.path()));
    assert_eq!(counts(&second), (0, 2, 0, 2));
}

#[cfg(unix)]
#[test]
fn test_non_utf8_names_do_not_share_cached_digests() {
    use std::os::unix::ffi::OsStrExt;

    let dir = tempdir().unwrap();
    let stored = dir.path().join(std::ffi::OsStr::from_bytes(b"a\xfe.mp3"));
    let fresh = dir.path().join(std::ffi::OsStr::from_bytes(b"a\xff.mp3"));
    fs::write(&stored, b"already stored").unwrap();
    fs::write(&fresh, b"brand new track").unwrap();

    let remote = MockRemote::new().with_catalog([digest_of(&stored)]);
    let (summary, cache) = run(&remote, HashCache::in_memory(), RunOptions::new(dir.path()));

    assert_eq!(counts(&summary), (1, 1, 0, 2));
    assert_eq!(summary.files_hashed, 2);
    assert_eq!(summary.cache_hits, 0);
    assert!(cache.is_empty());
    assert_eq!(
        file_names(remote.attempted_paths()),
        vec![OsString::from(std::ffi::OsStr::from_bytes(b"a\xff.mp3"))]
    );
}

#[test]
fn test_metadata_passed_to_every_upload() {
    let dir = library(&["a.mp3", "b.mp3"]);
    let remote = MockRemote::new();

    let options = RunOptions::new(dir.path())
        .with_tag(Some("rips".into()))
        .with_playlist(Some("Road Trip".into()));
    run(&remote, HashCache::in_memory(), options);

    let attempts = remote.upload_attempts();
    assert_eq!(attempts.len(), 2);
    for request in attempts {
        assert_eq!(request.tag.as_deref(), Some("rips"));
        assert_eq!(request.playlist.as_deref(), Some("Road Trip"));
    }
}

#[test]
fn test_catalog_failure_is_fatal_before_uploads() {
    let dir = library(&["a.mp3"]);
    let remote = MockRemote::new().with_catalog_unavailable();
    let session = remote.login("token").unwrap();

    let result = upload::run(
        &remote,
        session,
        HashCache::in_memory(),
        RunOptions::new(dir.path()),
    );

    assert!(matches!(result, Err(RunError::Catalog(_))));
    assert!(remote.upload_attempts().is_empty());
}

#[test]
fn test_missing_directory_is_fatal() {
    let dir = tempdir().unwrap();
    let remote = MockRemote::new();
    let session = remote.login("token").unwrap();

    let result = upload::run(
        &remote,
        session,
        HashCache::in_memory(),
        RunOptions::new(dir.path().join("nope")),
    );

    assert!(matches!(
        result,
        Err(RunError::DirectoryInaccessible { .. })
    ));
    assert_eq!(remote.catalog_fetches(), 0);
}

#[test]
fn test_cache_persisted_after_run() {
    let dir = library(&["a.mp3", "b.mp3"]);
    let cache_dir = tempdir().unwrap();
    let cache_path = cache_dir.path().join(".ibroadcast_md5s");
    let remote = MockRemote::new();

    run(&remote, HashCache::load(&cache_path), RunOptions::new(dir.path()));

    let reloaded = HashCache::load(&cache_path);
    assert_eq!(reloaded.len(), 2);
    let a = fs::canonicalize(dir.path().join("a.mp3")).unwrap();
    assert_eq!(reloaded.get(&a), Some(&digest_of(&a)));
}

#[test]
fn test_prune_cache_drops_vanished_files() {
    let dir = library(&["a.mp3", "b.mp3"]);
    let cache_dir = tempdir().unwrap();
    let cache_path = cache_dir.path().join("md5s");
    let remote = MockRemote::new();

    run(&remote, HashCache::load(&cache_path), RunOptions::new(dir.path()));
    fs::remove_file(dir.path().join("b.mp3")).unwrap();

    run(&remote, HashCache::load(&cache_path), RunOptions::new(dir.path()));
    assert_eq!(HashCache::load(&cache_path).len(), 2);

    run(
        &remote,
        HashCache::load(&cache_path),
        RunOptions::new(dir.path()).with_prune_cache(true),
    );
    assert_eq!(HashCache::load(&cache_path).len(), 1);
}
