//! End-to-end service tests over a temp directory of fixture files and
//! an in-memory tag codec: scan → reconcile → diff → write → rename.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use core_library::error::LibraryError;
use core_library::{BookMetadata, ChangeMap, FileTags, GroupKind, TagCodec, TagField, TagValue};
use core_metadata::changeset::apply_to_tags;
use core_metadata::provider::{MetadataProvider, ProviderQuery, ProviderSource};
use core_metadata::MetadataCache;
use core_runtime::AppConfig;
use core_service::{
    CuratorService, ServiceDependencies, WriteAndRenameRequest, WriteRequest,
};

/// Tag codec over an in-memory map, so fixture files need no real
/// containers.
#[derive(Default)]
struct FakeCodec {
    tags: Mutex<HashMap<PathBuf, FileTags>>,
    unreadable: Mutex<Vec<PathBuf>>,
    unwritable: Mutex<Vec<PathBuf>>,
}

impl FakeCodec {
    fn insert(&self, path: &Path, tags: FileTags) {
        self.tags.lock().unwrap().insert(path.to_path_buf(), tags);
    }

    fn mark_unreadable(&self, path: &Path) {
        self.unreadable.lock().unwrap().push(path.to_path_buf());
    }

    fn mark_unwritable(&self, path: &Path) {
        self.unwritable.lock().unwrap().push(path.to_path_buf());
    }
}

#[async_trait]
impl TagCodec for FakeCodec {
    async fn read_tags(&self, path: &Path) -> core_library::Result<FileTags> {
        if self.unreadable.lock().unwrap().iter().any(|p| p == path) {
            return Err(LibraryError::Codec("corrupted container".to_string()));
        }
        Ok(self
            .tags
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_default())
    }

    async fn apply_changes(&self, path: &Path, changes: &ChangeMap) -> core_library::Result<()> {
        if self.unwritable.lock().unwrap().iter().any(|p| p == path) {
            return Err(LibraryError::Codec("file is read-only".to_string()));
        }
        let mut tags = self.tags.lock().unwrap();
        let entry = tags.entry(path.to_path_buf()).or_default();
        apply_to_tags(entry, changes);
        Ok(())
    }
}

/// Provider answering every query with one fixed record.
struct StaticProvider(BookMetadata);

#[async_trait]
impl MetadataProvider for StaticProvider {
    fn source(&self) -> ProviderSource {
        ProviderSource::Audible
    }

    async fn search(
        &self,
        _query: &ProviderQuery,
    ) -> core_metadata::Result<Option<BookMetadata>> {
        Ok(Some(self.0.clone()))
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        max_workers: 4,
        ..Default::default()
    }
}

fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"not really audio").unwrap();
    path
}

fn part_tags(title: &str, author: &str) -> FileTags {
    FileTags {
        title: Some(title.to_string()),
        artist: Some(author.to_string()),
        ..Default::default()
    }
}

fn service_with(
    codec: Arc<FakeCodec>,
    providers: Vec<Arc<dyn MetadataProvider>>,
) -> CuratorService {
    CuratorService::new(
        test_config(),
        ServiceDependencies {
            codec,
            providers,
            cache: Arc::new(MetadataCache::in_memory(Duration::from_secs(3600))),
        },
    )
}

#[tokio::test]
async fn scan_groups_parts_and_maps_genres_to_discrete_entries() {
    let dir = tempfile::tempdir().unwrap();
    let codec = Arc::new(FakeCodec::default());
    let part1 = touch(dir.path(), "BookA - Part1.m4b");
    let part2 = touch(dir.path(), "BookA - Part2.m4b");
    codec.insert(&part1, part_tags("BookA", "Jane Doe"));
    codec.insert(&part2, part_tags("BookA", "Jane Doe"));

    let provider = Arc::new(StaticProvider(BookMetadata {
        title: Some("BookA".to_string()),
        author: Some("Jane Doe".to_string()),
        narrator: Some("John Smith".to_string()),
        genres: vec!["Mystery".to_string(), "Thriller".to_string()],
        ..Default::default()
    }));
    let service = service_with(codec, vec![provider]);

    let report = service.scan(&[dir.path().to_path_buf()]).await;

    assert!(report.issues.is_empty());
    assert_eq!(report.groups.len(), 1);
    let scanned = &report.groups[0];
    assert_eq!(scanned.group.kind, GroupKind::MultiFile);
    assert_eq!(scanned.group.files.len(), 2);
    assert_eq!(scanned.group.change_count, 2);

    for file in &scanned.group.files {
        let changes = &scanned.changes[&file.id];
        // Genres land as two discrete entries, not "Mystery; Thriller".
        assert_eq!(
            changes.get(&TagField::Genre).map(|c| &c.new),
            Some(&TagValue::List(vec![
                "Mystery".to_string(),
                "Thriller".to_string()
            ]))
        );
        // Narrator lands in the dedicated slot, never the comment slot.
        assert_eq!(
            changes.get(&TagField::Narrator).map(|c| &c.new),
            Some(&TagValue::Text("John Smith".to_string()))
        );
        assert!(!changes.contains_key(&TagField::Comment));
    }
}

#[tokio::test]
async fn unreadable_file_is_reported_without_aborting_the_scan() {
    let dir = tempfile::tempdir().unwrap();
    let codec = Arc::new(FakeCodec::default());
    let good = touch(dir.path(), "Good.m4b");
    let bad = touch(dir.path(), "Bad.m4b");
    codec.insert(&good, part_tags("Good", "Jane Doe"));
    codec.mark_unreadable(&bad);

    let service = service_with(codec, vec![]);
    let report = service.scan(&[dir.path().to_path_buf()]).await;

    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].path, bad);
    // The readable file still forms its group.
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].group.files.len(), 1);
}

#[tokio::test]
async fn scan_partitions_files_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let codec = Arc::new(FakeCodec::default());
    for i in 0..6 {
        let path = touch(dir.path(), &format!("book{}.m4b", i));
        codec.insert(&path, part_tags(&format!("Book {}", i % 3), "Author"));
    }

    let service = service_with(codec, vec![]);
    let report = service.scan(&[dir.path().to_path_buf()]).await;

    let total_files: usize = report.groups.iter().map(|g| g.group.files.len()).sum();
    assert_eq!(total_files, 6);

    let mut seen = std::collections::HashSet::new();
    for group in &report.groups {
        for file in &group.group.files {
            assert!(seen.insert(file.id), "file appears in two groups");
        }
    }
}

#[tokio::test]
async fn write_batch_isolates_the_failing_file() {
    let dir = tempfile::tempdir().unwrap();
    let codec = Arc::new(FakeCodec::default());
    let paths: Vec<PathBuf> = (0..3)
        .map(|i| {
            let path = touch(dir.path(), &format!("book{}.m4b", i));
            codec.insert(&path, FileTags::default());
            path
        })
        .collect();
    codec.mark_unwritable(&paths[1]);

    let service = service_with(Arc::clone(&codec), vec![]);
    let requests: Vec<WriteRequest> = paths
        .iter()
        .map(|path| {
            let mut changes = ChangeMap::new();
            changes.insert(
                TagField::Title,
                core_library::FieldChange {
                    old: None,
                    new: TagValue::Text("BookA".to_string()),
                },
            );
            WriteRequest {
                file_id: core_library::AudioFileId::new(),
                path: path.clone(),
                changes,
            }
        })
        .collect();

    let report = service.write(requests, false).await;

    assert_eq!(report.success + report.failed, 3);
    assert_eq!(report.success, 2);
    assert_eq!(report.failed, 1);
    let failed: Vec<&PathBuf> = report
        .outcomes
        .iter()
        .filter(|(_, _, o)| !o.is_success())
        .map(|(_, p, _)| p)
        .collect();
    assert_eq!(failed, vec![&paths[1]]);
}

#[tokio::test]
async fn empty_change_map_counts_as_success_with_zero_fields() {
    let dir = tempfile::tempdir().unwrap();
    let codec = Arc::new(FakeCodec::default());
    let path = touch(dir.path(), "book.m4b");
    codec.insert(&path, FileTags::default());

    let service = service_with(codec, vec![]);
    let report = service
        .write(
            vec![WriteRequest {
                file_id: core_library::AudioFileId::new(),
                path,
                changes: ChangeMap::new(),
            }],
            true,
        )
        .await;

    assert_eq!(report.success, 1);
    match &report.outcomes[0].2 {
        core_metadata::WriteOutcome::Written {
            fields_changed,
            backup,
        } => {
            assert_eq!(*fields_changed, 0);
            assert!(backup.is_none());
        }
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn rename_runs_only_after_successful_write() {
    let dir = tempfile::tempdir().unwrap();
    let codec = Arc::new(FakeCodec::default());
    let good = touch(dir.path(), "good.m4b");
    let bad = touch(dir.path(), "bad.m4b");
    codec.insert(&good, FileTags::default());
    codec.insert(&bad, FileTags::default());
    codec.mark_unwritable(&bad);

    let metadata = BookMetadata {
        title: Some("The Long Way".to_string()),
        author: Some("Becky Chambers".to_string()),
        ..Default::default()
    };
    let mut changes = ChangeMap::new();
    changes.insert(
        TagField::Title,
        core_library::FieldChange {
            old: None,
            new: TagValue::Text("The Long Way".to_string()),
        },
    );

    let service = service_with(codec, vec![]);
    let report = service
        .write_and_rename(
            vec![
                WriteAndRenameRequest {
                    file_id: core_library::AudioFileId::new(),
                    path: good.clone(),
                    changes: changes.clone(),
                    metadata: metadata.clone(),
                },
                WriteAndRenameRequest {
                    file_id: core_library::AudioFileId::new(),
                    path: bad.clone(),
                    changes,
                    metadata,
                },
            ],
            false,
            false,
        )
        .await;

    assert_eq!(report.write.success, 1);
    assert_eq!(report.write.failed, 1);
    // Only the successfully-written file was renamed.
    assert_eq!(report.renames.len(), 1);
    let rename = &report.renames[0];
    assert_eq!(rename.path, good);
    let new_path = rename.new_path.as_ref().expect("rename succeeded");
    assert!(new_path.ends_with("Becky Chambers - The Long Way.m4b"));
    assert!(new_path.exists());
    assert!(!good.exists());
    // The failed file stays put.
    assert!(bad.exists());
}

#[tokio::test]
async fn rename_collision_is_an_error_not_an_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let codec = Arc::new(FakeCodec::default());
    let source = touch(dir.path(), "book.m4b");
    codec.insert(&source, FileTags::default());
    // A different file already sits at the rename target.
    let occupied = touch(dir.path(), "Becky Chambers - The Long Way.m4b");

    let metadata = BookMetadata {
        title: Some("The Long Way".to_string()),
        author: Some("Becky Chambers".to_string()),
        ..Default::default()
    };
    let mut changes = ChangeMap::new();
    changes.insert(
        TagField::Title,
        core_library::FieldChange {
            old: None,
            new: TagValue::Text("The Long Way".to_string()),
        },
    );

    let service = service_with(codec, vec![]);
    let report = service
        .write_and_rename(
            vec![WriteAndRenameRequest {
                file_id: core_library::AudioFileId::new(),
                path: source.clone(),
                changes,
                metadata,
            }],
            false,
            false,
        )
        .await;

    // The write succeeded; only the rename failed.
    assert_eq!(report.write.success, 1);
    let rename = &report.renames[0];
    assert!(rename.new_path.is_none());
    assert!(rename.error.as_deref().unwrap().contains("already exists"));
    // Neither file was clobbered.
    assert!(source.exists());
    assert_eq!(std::fs::read(&occupied).unwrap(), b"not really audio");
}

#[tokio::test]
async fn second_scan_of_written_library_reports_no_changes() {
    let dir = tempfile::tempdir().unwrap();
    let codec = Arc::new(FakeCodec::default());
    let path = touch(dir.path(), "BookA.m4b");
    codec.insert(&path, part_tags("BookA", "Jane Doe"));

    let provider = Arc::new(StaticProvider(BookMetadata {
        title: Some("BookA".to_string()),
        author: Some("Jane Doe".to_string()),
        genres: vec!["Mystery".to_string()],
        ..Default::default()
    }));
    let service = service_with(Arc::clone(&codec), vec![provider]);

    let first = service.scan(&[dir.path().to_path_buf()]).await;
    assert_eq!(first.groups[0].group.change_count, 1);

    // Apply the computed changes, then re-scan.
    let file = &first.groups[0].group.files[0];
    let requests = vec![WriteRequest {
        file_id: file.id,
        path: file.path.clone(),
        changes: first.groups[0].changes[&file.id].clone(),
    }];
    let write = service.write(requests, false).await;
    assert_eq!(write.failed, 0);

    let second = service.scan(&[dir.path().to_path_buf()]).await;
    assert_eq!(second.groups[0].group.change_count, 0);
}
