//! Scanner integration tests over real temp directories.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use core_library::error::LibraryError;
use core_library::models::{ChangeMap, FileTags, GroupKind};
use core_library::scanner::LibraryScanner;
use core_library::TagCodec;

#[derive(Default)]
struct MapCodec {
    tags: Mutex<HashMap<PathBuf, FileTags>>,
    unreadable: Mutex<Vec<PathBuf>>,
}

impl MapCodec {
    fn insert(&self, path: &Path, tags: FileTags) {
        self.tags.lock().unwrap().insert(path.to_path_buf(), tags);
    }
}

#[async_trait]
impl TagCodec for MapCodec {
    async fn read_tags(&self, path: &Path) -> core_library::Result<FileTags> {
        if self.unreadable.lock().unwrap().iter().any(|p| p == path) {
            return Err(LibraryError::Codec("unreadable".to_string()));
        }
        Ok(self
            .tags
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_default())
    }

    async fn apply_changes(&self, _path: &Path, _changes: &ChangeMap) -> core_library::Result<()> {
        Ok(())
    }
}

fn touch(dir: &Path, rel: &str) -> PathBuf {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, b"x").unwrap();
    path
}

fn tagged(title: &str, artist: &str) -> FileTags {
    FileTags {
        title: Some(title.to_string()),
        artist: Some(artist.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn discovery_filters_non_audio_and_debris() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "book.m4b");
    touch(dir.path(), "cover.jpg");
    touch(dir.path(), "._book.m4b");
    touch(dir.path(), ".DS_Store");
    touch(dir.path(), "notes.txt");
    touch(dir.path(), "nested/part.mp3");

    let scanner = LibraryScanner::new(Arc::new(MapCodec::default()));
    let (files, issues) = scanner.discover(&[dir.path().to_path_buf()]);

    let mut names: Vec<String> = files
        .iter()
        .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["book.m4b", "part.mp3"]);
    assert!(issues.is_empty());
}

#[tokio::test]
async fn missing_root_is_an_issue_not_a_panic() {
    let scanner = LibraryScanner::new(Arc::new(MapCodec::default()));
    let (files, issues) = scanner.discover(&[PathBuf::from("/definitely/not/here")]);
    assert!(files.is_empty());
    assert_eq!(issues.len(), 1);
}

#[tokio::test]
async fn scan_forms_groups_across_folders() {
    let dir = tempfile::tempdir().unwrap();
    let codec = Arc::new(MapCodec::default());

    let a1 = touch(dir.path(), "BookA/BookA - Part1.m4b");
    let a2 = touch(dir.path(), "BookA/BookA - Part2.m4b");
    let b = touch(dir.path(), "BookB/BookB.m4b");
    codec.insert(&a1, tagged("BookA", "Jane Doe"));
    codec.insert(&a2, tagged("BookA", "Jane Doe"));
    codec.insert(&b, tagged("BookB", "John Smith"));

    let scanner = LibraryScanner::new(codec);
    let outcome = scanner
        .scan(&[dir.path().to_path_buf()], 4, &CancellationToken::new())
        .await;

    assert_eq!(outcome.groups.len(), 2);
    let book_a = outcome
        .groups
        .iter()
        .find(|g| g.name == "BookA")
        .expect("BookA group");
    assert_eq!(book_a.kind, GroupKind::MultiFile);
    assert_eq!(book_a.files.len(), 2);
    assert_eq!(book_a.files[0].filename, "BookA - Part1.m4b");

    let book_b = outcome
        .groups
        .iter()
        .find(|g| g.name == "BookB")
        .expect("BookB group");
    assert_eq!(book_b.kind, GroupKind::Single);
}

#[tokio::test]
async fn unreadable_file_becomes_issue_and_rest_proceed() {
    let dir = tempfile::tempdir().unwrap();
    let codec = Arc::new(MapCodec::default());

    let good = touch(dir.path(), "Good.m4b");
    let bad = touch(dir.path(), "Bad.m4b");
    codec.insert(&good, tagged("Good", "Jane Doe"));
    codec.unreadable.lock().unwrap().push(bad.clone());

    let scanner = LibraryScanner::new(codec);
    let outcome = scanner
        .scan(&[dir.path().to_path_buf()], 2, &CancellationToken::new())
        .await;

    assert_eq!(outcome.groups.len(), 1);
    assert_eq!(outcome.issues.len(), 1);
    assert_eq!(outcome.issues[0].path, bad);
}

#[tokio::test]
async fn cancelled_scan_returns_partial_results_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let codec = Arc::new(MapCodec::default());
    for i in 0..5 {
        let path = touch(dir.path(), &format!("book{}.m4b", i));
        codec.insert(&path, tagged(&format!("Book{}", i), "Author"));
    }

    let cancel = CancellationToken::new();
    cancel.cancel();
    let scanner = LibraryScanner::new(codec);
    let outcome = scanner.scan(&[dir.path().to_path_buf()], 2, &cancel).await;

    // Cancelled before any read started: no groups, no spurious issues.
    assert!(outcome.groups.is_empty());
    assert!(outcome.issues.is_empty());
}
