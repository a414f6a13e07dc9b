//! # Curator Service
//!
//! The façade the shell drives. Owns the wired dependencies and exposes
//! the pipeline as independent, replayable batch operations:
//!
//! 1. `scan` - discover, group, reconcile, and diff; returns groups with
//!    per-file change maps and a per-path issue list.
//! 2. `write` / `write_and_rename` - apply change maps per file; renames
//!    run only for files whose write succeeded this batch.
//! 3. `push_updates` - propagate canonical metadata to the remote
//!    library server.
//!
//! Errors are collected into the batch reports alongside successes; no
//! per-item failure aborts a batch.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use core_library::organize::{execute_rename, plan_rename};
use core_library::{
    AudioFileId, BookMetadata, ChangeMap, Group, LibraryScanner, ScanIssue, TagCodec,
};
use core_metadata::reconciler::{MergePolicy, Reconciler};
use core_metadata::writer::{TagWriter, WriteOutcome};
use core_metadata::{compute_changes, LoftyTagCodec, MetadataCache, MetadataProvider};
use core_runtime::AppConfig;
use core_sync::{PushItem, ShelfClient, SyncReport};
use provider_audible::AudibleProvider;
use provider_googlebooks::GoogleBooksProvider;

use crate::error::Result;
use crate::pool::WorkerPool;

/// One group as returned by `scan`: canonical metadata reconciled and a
/// change map computed per member file.
#[derive(Debug)]
pub struct ScannedGroup {
    pub group: Group,
    pub changes: HashMap<AudioFileId, ChangeMap>,
    /// True when reconciliation ran on partial or stale provider data.
    pub degraded: bool,
}

/// Result of a scan batch.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub groups: Vec<ScannedGroup>,
    pub issues: Vec<ScanIssue>,
}

/// One file to write.
#[derive(Debug, Clone)]
pub struct WriteRequest {
    pub file_id: AudioFileId,
    pub path: PathBuf,
    pub changes: ChangeMap,
}

/// Result of a write batch: one entry per requested file, always.
#[derive(Debug, Default)]
pub struct WriteReport {
    pub success: usize,
    pub failed: usize,
    pub outcomes: Vec<(AudioFileId, PathBuf, WriteOutcome)>,
}

/// One file to write and then rename.
#[derive(Debug, Clone)]
pub struct WriteAndRenameRequest {
    pub file_id: AudioFileId,
    pub path: PathBuf,
    pub changes: ChangeMap,
    pub metadata: BookMetadata,
}

/// Per-file rename outcome.
#[derive(Debug, Clone)]
pub struct RenameResult {
    pub path: PathBuf,
    pub new_path: Option<PathBuf>,
    pub error: Option<String>,
}

/// Combined write-then-rename batch result.
#[derive(Debug)]
pub struct WriteAndRenameReport {
    pub write: WriteReport,
    pub renames: Vec<RenameResult>,
}

/// Injected capability implementations.
pub struct ServiceDependencies {
    pub codec: Arc<dyn TagCodec>,
    pub providers: Vec<Arc<dyn MetadataProvider>>,
    pub cache: Arc<MetadataCache>,
}

/// Primary façade exposed to host shells.
pub struct CuratorService {
    config: RwLock<AppConfig>,
    codec: Arc<dyn TagCodec>,
    providers: Vec<Arc<dyn MetadataProvider>>,
    cache: Arc<MetadataCache>,
    cancel: Mutex<CancellationToken>,
}

impl CuratorService {
    /// Create a service from explicit dependencies.
    pub fn new(config: AppConfig, deps: ServiceDependencies) -> Self {
        Self {
            config: RwLock::new(config),
            codec: deps.codec,
            providers: deps.providers,
            cache: deps.cache,
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Create a service with the default wiring: lofty codec, the
    /// providers enabled in config, and the file-backed cache.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let cache_path = AppConfig::default_path()?.with_file_name("metadata_cache.json");
        let cache = Arc::new(MetadataCache::new(
            cache_path,
            Duration::from_secs(config.cache_ttl_secs),
        ));

        let mut providers: Vec<Arc<dyn MetadataProvider>> = Vec::new();
        if config.providers.audible_enabled {
            let audible = AudibleProvider::new(&config.providers.audible_region)
                .map_err(core_metadata::MetadataError::from)?;
            providers.push(Arc::new(audible));
        }
        if config.providers.googlebooks_enabled {
            providers.push(Arc::new(GoogleBooksProvider::new(
                config.providers.googlebooks_api_key.clone(),
            )));
        }

        Ok(Self::new(
            config,
            ServiceDependencies {
                codec: Arc::new(LoftyTagCodec::new()),
                providers,
                cache,
            },
        ))
    }

    /// Scan roots: discover files, form groups, reconcile each group,
    /// and compute per-file change maps.
    #[instrument(skip(self, paths), fields(roots = paths.len()))]
    pub async fn scan(&self, paths: &[PathBuf]) -> ScanReport {
        let config = self.config.read().await.clone();
        let pool = WorkerPool::new(config.max_workers);
        let cancel = self.current_token();

        let scanner = LibraryScanner::new(Arc::clone(&self.codec));
        let outcome = scanner.scan(paths, pool.max_workers(), &cancel).await;

        let reconciler = Reconciler::new(
            self.providers.clone(),
            Arc::clone(&self.cache),
            MergePolicy {
                genre_enforcement: config.genre_enforcement,
                genre_cap: config.genre_cap,
            },
        );

        let reconciled = futures::future::join_all(outcome.groups.into_iter().map(|group| {
            let reconciler = &reconciler;
            let pool = &pool;
            let cancel = &cancel;
            async move {
                if cancel.is_cancelled() {
                    // Abandoned between stages: keep the group listing,
                    // skip the provider round-trips.
                    return ScannedGroup {
                        group,
                        changes: HashMap::new(),
                        degraded: false,
                    };
                }
                pool.run(async {
                    let outcome = reconciler.reconcile(&group).await;
                    build_scanned_group(group, outcome.metadata, outcome.degraded)
                })
                .await
            }
        }))
        .await;

        let report = ScanReport {
            groups: reconciled,
            issues: outcome.issues,
        };
        info!(
            groups = report.groups.len(),
            issues = report.issues.len(),
            changes = report.groups.iter().map(|g| g.group.change_count).sum::<usize>(),
            "Scan batch complete"
        );
        report
    }

    /// Write change maps to files, each independently.
    #[instrument(skip(self, requests), fields(count = requests.len()))]
    pub async fn write(&self, requests: Vec<WriteRequest>, backup: bool) -> WriteReport {
        let config = self.config.read().await.clone();
        let pool = WorkerPool::new(config.max_workers);
        let writer = TagWriter::new(Arc::clone(&self.codec));

        // Writes run to completion once started; cancellation is only
        // honored between batches.
        let outcomes = futures::future::join_all(requests.into_iter().map(|request| {
            let writer = &writer;
            let pool = &pool;
            async move {
                let result = pool
                    .run(writer.write_file(&request.path, &request.changes, backup))
                    .await;
                (request.file_id, request.path, result.outcome)
            }
        }))
        .await;

        let mut report = WriteReport::default();
        for (file_id, path, outcome) in outcomes {
            match &outcome {
                WriteOutcome::Written { .. } => report.success += 1,
                WriteOutcome::Failed { reason } => {
                    warn!(path = %path.display(), reason = %reason, "Write failed");
                    report.failed += 1;
                }
            }
            report.outcomes.push((file_id, path, outcome));
        }
        info!(success = report.success, failed = report.failed, "Write batch complete");
        report
    }

    /// Compute the rename target for one file without touching disk.
    pub async fn preview_rename(
        &self,
        path: &Path,
        metadata: &BookMetadata,
        reorganize: bool,
    ) -> Result<PathBuf> {
        let config = self.config.read().await;
        Ok(plan_rename(
            path,
            metadata,
            &config.rename_template,
            reorganize,
            config.library_root.as_deref(),
        )?)
    }

    /// Write, then rename - only the files whose write succeeded.
    #[instrument(skip(self, requests), fields(count = requests.len()))]
    pub async fn write_and_rename(
        &self,
        requests: Vec<WriteAndRenameRequest>,
        backup: bool,
        reorganize: bool,
    ) -> WriteAndRenameReport {
        let metadata_by_id: HashMap<AudioFileId, BookMetadata> = requests
            .iter()
            .map(|r| (r.file_id, r.metadata.clone()))
            .collect();

        let write_requests: Vec<WriteRequest> = requests
            .into_iter()
            .map(|r| WriteRequest {
                file_id: r.file_id,
                path: r.path,
                changes: r.changes,
            })
            .collect();
        let write = self.write(write_requests, backup).await;

        let config = self.config.read().await.clone();
        let mut renames = Vec::new();
        for (file_id, path, outcome) in &write.outcomes {
            if !outcome.is_success() {
                // Never move a file whose tags are in an unverified state.
                continue;
            }
            let Some(metadata) = metadata_by_id.get(file_id) else {
                continue;
            };

            let planned = plan_rename(
                path,
                metadata,
                &config.rename_template,
                reorganize,
                config.library_root.as_deref(),
            );
            let result = match planned {
                Ok(target) => match execute_rename(path, &target).await {
                    Ok(()) => RenameResult {
                        path: path.clone(),
                        new_path: Some(target),
                        error: None,
                    },
                    Err(e) => RenameResult {
                        path: path.clone(),
                        new_path: None,
                        error: Some(e.to_string()),
                    },
                },
                Err(e) => RenameResult {
                    path: path.clone(),
                    new_path: None,
                    error: Some(e.to_string()),
                },
            };
            renames.push(result);
        }

        WriteAndRenameReport { write, renames }
    }

    /// Push canonical metadata to the remote library server.
    pub async fn push_updates(&self, items: Vec<PushItem>) -> Result<SyncReport> {
        let config = self.config.read().await;
        let client = ShelfClient::new(config.server.clone())?;
        drop(config);
        Ok(client.push_updates(&items).await?)
    }

    /// Ask the remote server to rescan its library, so pushed tags get
    /// re-read.
    pub async fn trigger_remote_rescan(&self) -> Result<()> {
        let config = self.config.read().await;
        let client = ShelfClient::new(config.server.clone())?;
        drop(config);
        Ok(client.trigger_rescan().await?)
    }

    /// Drop every cached provider lookup.
    pub async fn clear_cache(&self) -> Result<()> {
        Ok(self.cache.clear().await?)
    }

    /// Current configuration snapshot.
    pub async fn config(&self) -> AppConfig {
        self.config.read().await.clone()
    }

    /// Persist and adopt a new configuration.
    pub async fn save_config(&self, config: AppConfig) -> Result<()> {
        config.save()?;
        *self.config.write().await = config;
        Ok(())
    }

    /// Abandon the current batch between stages. Writes already in
    /// flight run to completion.
    pub fn cancel_batch(&self) {
        let mut guard = self.cancel.lock().unwrap_or_else(|e| e.into_inner());
        guard.cancel();
        *guard = CancellationToken::new();
    }

    fn current_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Attach canonical metadata to a group and diff every member file.
fn build_scanned_group(mut group: Group, metadata: BookMetadata, degraded: bool) -> ScannedGroup {
    let mut changes = HashMap::new();
    let mut change_count = 0;
    for file in &group.files {
        let map = compute_changes(&metadata, &file.tags);
        if !map.is_empty() {
            change_count += 1;
        }
        changes.insert(file.id, map);
    }
    group.metadata = Some(metadata);
    group.change_count = change_count;
    ScannedGroup {
        group,
        changes,
        degraded,
    }
}
