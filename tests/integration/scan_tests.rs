use ibroadcast_uploader::cache::HashCache;
use ibroadcast_uploader::remote::mock::MockRemote;
use ibroadcast_uploader::remote::RemoteService;
use ibroadcast_uploader::scanner::{Walker, WalkerConfig};
use ibroadcast_uploader::upload::{RunOptions, UploadRun};
use std::fs;
use tempfile::tempdir;

fn names(files: &[ibroadcast_uploader::scanner::FileEntry], root: &std::path::Path) -> Vec<String> {
    let root = fs::canonicalize(root).unwrap();
    files
        .iter()
        .map(|f| {
            let path = fs::canonicalize(&f.path).unwrap();
            path.strip_prefix(&root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect()
}

#[test]
fn test_scan_filters_hidden_and_unsupported() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("Artist/Album")).unwrap();
    fs::create_dir_all(dir.path().join(".hidden_dir")).unwrap();
    fs::write(dir.path().join("Artist/Album/01.mp3"), b"1").unwrap();
    fs::write(dir.path().join("Artist/Album/02.FLAC"), b"2").unwrap();
    fs::write(dir.path().join("Artist/Album/cover.jpg"), b"c").unwrap();
    fs::write(dir.path().join("Artist/Album/.01.mp3"), b"h").unwrap();
    fs::write(dir.path().join(".hidden_dir/secret.mp3"), b"s").unwrap();
    fs::write(dir.path().join("README"), b"r").unwrap();

    let remote = MockRemote::new();
    let session = remote.login("t").unwrap();
    let run = UploadRun::new(&remote, session, HashCache::in_memory(), RunOptions::new(dir.path()));

    let files = run.scan().unwrap();
    assert_eq!(
        names(&files, dir.path()),
        vec!["Artist/Album/01.mp3", "Artist/Album/02.FLAC"]
    );
}

#[test]
fn test_scan_uses_account_extensions() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.mp3"), b"a").unwrap();
    fs::write(dir.path().join("b.ogg"), b"b").unwrap();

    let remote = MockRemote::new().with_extensions([".ogg"]);
    let session = remote.login("t").unwrap();
    let run = UploadRun::new(&remote, session, HashCache::in_memory(), RunOptions::new(dir.path()));

    let files = run.scan().unwrap();
    assert_eq!(names(&files, dir.path()), vec!["b.ogg"]);
}

#[test]
fn test_scan_order_is_deterministic() {
    let dir = tempdir().unwrap();
    for name in ["z.mp3", "m.mp3", "a.mp3", "k/b.mp3", "k/a.mp3"] {
        let path = dir.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, name).unwrap();
    }
    let config = WalkerConfig::with_extensions(["mp3"]);

    let (first, _) = Walker::new(dir.path(), config.clone()).collect_sorted();
    let (second, _) = Walker::new(dir.path(), config).collect_sorted();

    assert_eq!(first, second);
    assert_eq!(
        names(&first, dir.path()),
        vec!["a.mp3", "k/a.mp3", "k/b.mp3", "m.mp3", "z.mp3"]
    );
}

#[test]
fn test_extensions_with_or_without_dot() {
    let config = WalkerConfig::with_extensions([".MP3", "flac"]);
    assert!(config.accepts(std::path::Path::new("song.mp3")));
    assert!(config.accepts(std::path::Path::new("song.Flac")));
    assert!(!config.accepts(std::path::Path::new("song.wav")));
    assert!(!config.accepts(std::path::Path::new("mp3")));
}
