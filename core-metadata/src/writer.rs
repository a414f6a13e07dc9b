//! # Tag Writer
//!
//! Applies change maps to files through the [`TagCodec`] capability.
//!
//! ## Contract
//!
//! A batch is a set of independent atomic per-file operations, not a
//! transaction: one file's failure never blocks or rolls back another's
//! write, and every requested file gets exactly one outcome. A successful
//! codec call is not trusted on its own - the file's tags are re-read and
//! compared against the change map before success is reported.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use core_library::{ChangeMap, TagCodec, TagValue};

use crate::changeset::tag_value_of;

/// Outcome of one file's write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written {
        fields_changed: usize,
        /// Path of the pre-write copy, when a backup was requested.
        backup: Option<PathBuf>,
    },
    Failed {
        reason: String,
    },
}

impl WriteOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Written { .. })
    }
}

/// One outcome per requested file, always.
#[derive(Debug, Clone)]
pub struct FileWriteResult {
    pub path: PathBuf,
    pub outcome: WriteOutcome,
}

/// Writes change maps to disk via the injected codec.
pub struct TagWriter {
    codec: Arc<dyn TagCodec>,
}

impl TagWriter {
    pub fn new(codec: Arc<dyn TagCodec>) -> Self {
        Self { codec }
    }

    /// Apply one file's change map.
    ///
    /// An empty map reports success with zero fields changed and leaves
    /// the file untouched - no backup, no codec call.
    #[instrument(skip(self, changes), fields(path = %path.display()))]
    pub async fn write_file(
        &self,
        path: &Path,
        changes: &ChangeMap,
        backup: bool,
    ) -> FileWriteResult {
        if changes.is_empty() {
            debug!("File is up to date");
            return FileWriteResult {
                path: path.to_path_buf(),
                outcome: WriteOutcome::Written {
                    fields_changed: 0,
                    backup: None,
                },
            };
        }

        let backup_path = if backup {
            match self.backup_file(path).await {
                Ok(backup_path) => Some(backup_path),
                Err(reason) => {
                    return FileWriteResult {
                        path: path.to_path_buf(),
                        outcome: WriteOutcome::Failed { reason },
                    }
                }
            }
        } else {
            None
        };

        if let Err(e) = self.codec.apply_changes(path, changes).await {
            warn!(error = %e, "Tag write failed");
            return FileWriteResult {
                path: path.to_path_buf(),
                outcome: WriteOutcome::Failed {
                    reason: e.to_string(),
                },
            };
        }

        if let Err(reason) = self.verify(path, changes).await {
            warn!(reason = %reason, "Post-write verification failed");
            return FileWriteResult {
                path: path.to_path_buf(),
                outcome: WriteOutcome::Failed { reason },
            };
        }

        info!(fields = changes.len(), "Wrote tags");
        FileWriteResult {
            path: path.to_path_buf(),
            outcome: WriteOutcome::Written {
                fields_changed: changes.len(),
                backup: backup_path,
            },
        }
    }

    /// Apply a batch of independent per-file writes, in order.
    pub async fn write_batch(
        &self,
        requests: &[(PathBuf, ChangeMap)],
        backup: bool,
    ) -> Vec<FileWriteResult> {
        let mut results = Vec::with_capacity(requests.len());
        for (path, changes) in requests {
            results.push(self.write_file(path, changes, backup).await);
        }
        results
    }

    /// Copy the file aside before mutation: `book.m4b` → `book.m4b.backup`.
    async fn backup_file(&self, path: &Path) -> std::result::Result<PathBuf, String> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!("{}.backup", e))
            .unwrap_or_else(|| "backup".to_string());
        let backup_path = path.with_extension(extension);

        tokio::fs::copy(path, &backup_path)
            .await
            .map_err(|e| format!("Backup failed: {}", e))?;
        debug!(backup = %backup_path.display(), "Backed up original");
        Ok(backup_path)
    }

    /// Re-read the file and confirm every written field reflects the
    /// change map.
    async fn verify(&self, path: &Path, changes: &ChangeMap) -> std::result::Result<(), String> {
        let tags = self
            .codec
            .read_tags(path)
            .await
            .map_err(|e| format!("Verification read failed: {}", e))?;

        for (field, change) in changes {
            let actual = tag_value_of(&tags, *field);
            if !values_match(actual.as_ref(), &change.new) {
                return Err(format!(
                    "Field {} reads back as {:?}, expected {:?}",
                    field,
                    actual.map(|v| v.display()),
                    change.new.display()
                ));
            }
        }
        Ok(())
    }
}

fn values_match(actual: Option<&TagValue>, expected: &TagValue) -> bool {
    match (actual, expected) {
        (Some(TagValue::Text(a)), TagValue::Text(e)) => a.trim() == e.trim(),
        (Some(TagValue::List(a)), TagValue::List(e)) => {
            a.len() == e.len()
                && a.iter()
                    .zip(e.iter())
                    .all(|(a, e)| a.trim() == e.trim())
        }
        // A single-entry list round-trips as text in some containers.
        (Some(TagValue::Text(a)), TagValue::List(e)) => {
            e.len() == 1 && a.trim() == e[0].trim()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::apply_to_tags;
    use async_trait::async_trait;
    use core_library::error::LibraryError;
    use core_library::{FieldChange, FileTags, TagField};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory codec: a map of path → tags, with optional failure
    /// injection per path.
    #[derive(Default)]
    struct FakeCodec {
        tags: Mutex<HashMap<PathBuf, FileTags>>,
        fail_writes: Mutex<Vec<PathBuf>>,
        drop_fields: bool,
    }

    impl FakeCodec {
        fn with_file(self, path: &str, tags: FileTags) -> Self {
            self.tags.lock().unwrap().insert(PathBuf::from(path), tags);
            self
        }

        fn failing_on(self, path: &str) -> Self {
            self.fail_writes.lock().unwrap().push(PathBuf::from(path));
            self
        }
    }

    #[async_trait]
    impl TagCodec for FakeCodec {
        async fn read_tags(&self, path: &Path) -> core_library::Result<FileTags> {
            self.tags
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| LibraryError::Codec("no such file".to_string()))
        }

        async fn apply_changes(
            &self,
            path: &Path,
            changes: &ChangeMap,
        ) -> core_library::Result<()> {
            if self.fail_writes.lock().unwrap().iter().any(|p| p == path) {
                return Err(LibraryError::Codec("file is read-only".to_string()));
            }
            if self.drop_fields {
                // Pretend to succeed while writing nothing.
                return Ok(());
            }
            let mut tags = self.tags.lock().unwrap();
            let entry = tags
                .get_mut(path)
                .ok_or_else(|| LibraryError::Codec("no such file".to_string()))?;
            apply_to_tags(entry, changes);
            Ok(())
        }
    }

    fn title_change(new: &str) -> ChangeMap {
        let mut changes = ChangeMap::new();
        changes.insert(
            TagField::Title,
            FieldChange {
                old: None,
                new: TagValue::Text(new.to_string()),
            },
        );
        changes
    }

    #[tokio::test]
    async fn empty_change_map_reports_zero_fields_and_no_write() {
        let codec = Arc::new(FakeCodec::default().with_file("/lib/a.m4b", FileTags::default()));
        let writer = TagWriter::new(codec.clone());

        let result = writer
            .write_file(Path::new("/lib/a.m4b"), &ChangeMap::new(), true)
            .await;
        assert_eq!(
            result.outcome,
            WriteOutcome::Written {
                fields_changed: 0,
                backup: None
            }
        );
        // Tags untouched.
        let tags = codec.read_tags(Path::new("/lib/a.m4b")).await.unwrap();
        assert_eq!(tags, FileTags::default());
    }

    #[tokio::test]
    async fn one_failure_never_blocks_sibling_writes() {
        let codec = Arc::new(
            FakeCodec::default()
                .with_file("/lib/a.m4b", FileTags::default())
                .with_file("/lib/b.m4b", FileTags::default())
                .with_file("/lib/c.m4b", FileTags::default())
                .failing_on("/lib/b.m4b"),
        );
        let writer = TagWriter::new(codec);

        let requests: Vec<(PathBuf, ChangeMap)> = ["a", "b", "c"]
            .iter()
            .map(|n| (PathBuf::from(format!("/lib/{}.m4b", n)), title_change("T")))
            .collect();
        let results = writer.write_batch(&requests, false).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].outcome.is_success());
        assert!(matches!(results[1].outcome, WriteOutcome::Failed { .. }));
        assert!(results[2].outcome.is_success());
    }

    #[tokio::test]
    async fn silent_field_drop_fails_verification() {
        let codec = Arc::new(FakeCodec {
            drop_fields: true,
            ..Default::default()
        });
        codec
            .tags
            .lock()
            .unwrap()
            .insert(PathBuf::from("/lib/a.m4b"), FileTags::default());
        let writer = TagWriter::new(codec);

        let result = writer
            .write_file(Path::new("/lib/a.m4b"), &title_change("BookA"), false)
            .await;
        match result.outcome {
            WriteOutcome::Failed { reason } => assert!(reason.contains("reads back")),
            other => panic!("expected verification failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn successful_write_reports_field_count() {
        let codec = Arc::new(FakeCodec::default().with_file("/lib/a.m4b", FileTags::default()));
        let writer = TagWriter::new(codec);

        let mut changes = title_change("BookA");
        changes.insert(
            TagField::Genre,
            FieldChange {
                old: None,
                new: TagValue::List(vec!["Mystery".to_string(), "Thriller".to_string()]),
            },
        );

        let result = writer
            .write_file(Path::new("/lib/a.m4b"), &changes, false)
            .await;
        assert_eq!(
            result.outcome,
            WriteOutcome::Written {
                fields_changed: 2,
                backup: None
            }
        );
    }

    #[test]
    fn list_written_as_single_text_still_matches() {
        let actual = TagValue::Text("Mystery".to_string());
        let expected = TagValue::List(vec!["Mystery".to_string()]);
        assert!(values_match(Some(&actual), &expected));
    }
}
