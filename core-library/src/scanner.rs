//! # Library Scanner
//!
//! Walks a set of root paths, discovers audio files, reads their embedded
//! tags through the [`TagCodec`] capability, and partitions them into
//! logical groups.
//!
//! ## Failure model
//!
//! Discovery and tag reading fail per file, never per scan: an unreadable
//! path is recorded as a [`ScanIssue`] and excluded from grouping, while
//! every sibling continues through the pipeline.

use futures::stream::{FuturesUnordered, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::codec::TagCodec;
use crate::error::Result;
use crate::grouping::form_groups;
use crate::models::{AudioFile, AudioFileId, Group, ScanIssue};

/// Extensions the scanner treats as audiobook audio.
const AUDIO_EXTENSIONS: [&str; 6] = ["m4b", "m4a", "mp3", "flac", "ogg", "opus"];

/// Result of scanning a set of roots.
#[derive(Debug)]
pub struct ScanOutcome {
    /// Groups in display order; the union of their files partitions the
    /// successfully-read files exactly.
    pub groups: Vec<Group>,
    /// Paths that were discovered but could not be processed.
    pub issues: Vec<ScanIssue>,
}

/// A file discovered on disk, before its tags have been read.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub size: u64,
}

/// Walks roots and forms groups; tag reads go through the injected codec.
pub struct LibraryScanner {
    codec: Arc<dyn TagCodec>,
}

impl LibraryScanner {
    pub fn new(codec: Arc<dyn TagCodec>) -> Self {
        Self { codec }
    }

    /// Enumerate candidate audio files under the given roots.
    ///
    /// Unreadable directory entries become issues; macOS metadata debris
    /// (`._*`, `.DS_Store`) is skipped silently.
    pub fn discover(&self, roots: &[PathBuf]) -> (Vec<DiscoveredFile>, Vec<ScanIssue>) {
        let mut files = Vec::new();
        let mut issues = Vec::new();

        for root in roots {
            for entry in WalkDir::new(root).follow_links(true) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        let path = e.path().unwrap_or(root.as_path()).to_path_buf();
                        issues.push(ScanIssue {
                            path,
                            reason: e.to_string(),
                        });
                        continue;
                    }
                };

                if !entry.file_type().is_file() || !is_audio_candidate(entry.path()) {
                    continue;
                }

                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                files.push(DiscoveredFile {
                    path: entry.path().to_path_buf(),
                    size,
                });
            }
        }

        debug!(count = files.len(), "Discovered audio files");
        (files, issues)
    }

    /// Read one discovered file into an [`AudioFile`] record.
    pub async fn read_file(&self, discovered: &DiscoveredFile) -> Result<AudioFile> {
        let tags = self.codec.read_tags(&discovered.path).await?;
        let filename = discovered
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        let format = discovered
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        Ok(AudioFile {
            id: AudioFileId::new(),
            path: discovered.path.clone(),
            filename,
            format,
            size: discovered.size,
            tags,
        })
    }

    /// Scan roots end to end: discover, read tags with bounded
    /// concurrency, and form groups.
    ///
    /// Cancellation is honored between files - a tag read already in
    /// flight completes, files not yet started are dropped from the scan.
    pub async fn scan(
        &self,
        roots: &[PathBuf],
        max_workers: usize,
        cancel: &CancellationToken,
    ) -> ScanOutcome {
        let (discovered, mut issues) = self.discover(roots);
        let total = discovered.len();

        let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
        let mut reads = FuturesUnordered::new();

        for file in discovered {
            if cancel.is_cancelled() {
                info!("Scan cancelled before reading all files");
                break;
            }
            let semaphore = Arc::clone(&semaphore);
            reads.push(async move {
                // Closed only on runtime shutdown; treat as read failure.
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            file.path.clone(),
                            Err(crate::error::LibraryError::Codec(
                                "worker pool closed".to_string(),
                            )),
                        )
                    }
                };
                let read = self.read_file(&file).await;
                (file.path.clone(), read)
            });
        }

        let mut audio_files = Vec::new();
        while let Some((path, read)) = reads.next().await {
            match read {
                Ok(file) => audio_files.push(file),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable file");
                    issues.push(ScanIssue {
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let groups = form_groups(audio_files);
        info!(
            files = total,
            groups = groups.len(),
            issues = issues.len(),
            "Scan complete"
        );

        ScanOutcome { groups, issues }
    }
}

fn is_audio_candidate(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with("._") || name == ".DS_Store" {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
