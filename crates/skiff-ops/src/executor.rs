//! Per-job executor: recursive, streaming copy, move, and delete.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use skiff_core::{EngineConfig, JobEntry, JobKind, JobState, OpsError};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::conflict::resolve_collision;
use crate::progress::JobTracker;

/// Per-entry totals computed before processing starts.
#[derive(Debug, Default, Clone, Copy)]
struct EntryStat {
    bytes: u64,
    items: u64,
}

/// Executes one job's entry list strictly in order.
///
/// Failures are best-effort per file: an error is recorded on the job and
/// processing continues with the remaining entries. Cancellation is
/// observed before each file and at chunk boundaries while streaming.
pub(crate) struct CopyMoveExecutor {
    tracker: JobTracker,
    config: EngineConfig,
    cancel: CancellationToken,
    use_trash: bool,
}

impl CopyMoveExecutor {
    pub(crate) fn new(tracker: JobTracker, config: EngineConfig, use_trash: bool) -> Self {
        let cancel = tracker.cancel_token();
        Self {
            tracker,
            config,
            cancel,
            use_trash,
        }
    }

    /// Run the job to its terminal state and return it.
    pub(crate) async fn run(&self, kind: JobKind, entries: &[JobEntry]) -> JobState {
        self.tracker.start();

        let stats = self.scan_entries(kind, entries).await;
        let total_bytes: u64 = stats.iter().map(|stat| stat.bytes).sum();
        let total_items: u64 = stats.iter().map(|stat| stat.items).sum();
        self.tracker.set_totals(total_bytes, total_items);

        let mut succeeded = 0usize;
        let mut failed = 0usize;
        let mut cancelled = false;

        for (entry, stat) in entries.iter().zip(&stats) {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let errors_before = self.tracker.error_count();
            let result = match (kind, entry.dest_dir.as_deref()) {
                (JobKind::Copy, Some(dest_dir)) => self.copy_entry(&entry.source, dest_dir).await,
                (JobKind::Move, Some(dest_dir)) => {
                    self.move_entry(&entry.source, dest_dir, *stat).await
                }
                (JobKind::Delete, _) => self.delete_entry(&entry.source, *stat).await,
                (_, None) => Err(OpsError::Io {
                    path: entry.source.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "entry has no destination directory",
                    ),
                }),
            };

            match result {
                Ok(dest) => {
                    if self.tracker.error_count() == errors_before {
                        succeeded += 1;
                        if let Some(dest) = dest {
                            self.tracker.record_completed(&entry.source, &dest);
                        }
                    } else {
                        failed += 1;
                    }
                }
                Err(OpsError::Cancelled) => {
                    cancelled = true;
                    break;
                }
                Err(error) => {
                    self.tracker.record_error(&entry.source, &error);
                    failed += 1;
                }
            }
        }

        let state = if cancelled {
            JobState::Cancelled
        } else if failed == 0 {
            JobState::Completed
        } else if succeeded == 0 {
            JobState::Failed
        } else {
            JobState::PartiallyFailed
        };
        self.tracker.finish(state);
        state
    }

    async fn scan_entries(&self, kind: JobKind, entries: &[JobEntry]) -> Vec<EntryStat> {
        let count_dirs = kind == JobKind::Delete;
        let mut stats = Vec::with_capacity(entries.len());
        for entry in entries {
            stats.push(scan_path(&entry.source, count_dirs).await);
        }
        stats
    }

    async fn copy_entry(
        &self,
        source: &Path,
        dest_dir: &Path,
    ) -> Result<Option<PathBuf>, OpsError> {
        let meta = fs::metadata(source)
            .await
            .map_err(|e| OpsError::io(source, e))?;
        if meta.is_dir() {
            let dest_root = dest_dir.join(file_name_of(source)?);
            self.copy_tree(source, &dest_root).await?;
            Ok(Some(dest_root))
        } else {
            let dest = self.copy_leaf(source, dest_dir).await?;
            Ok(Some(dest))
        }
    }

    async fn move_entry(
        &self,
        source: &Path,
        dest_dir: &Path,
        stat: EntryStat,
    ) -> Result<Option<PathBuf>, OpsError> {
        if self.cancel.is_cancelled() {
            return Err(OpsError::Cancelled);
        }

        let meta = fs::metadata(source)
            .await
            .map_err(|e| OpsError::io(source, e))?;
        let name = file_name_of(source)?;
        let dest = resolve_collision(dest_dir, &name, self.config.max_conflict_attempts)?;
        self.tracker.begin_file(source);

        // Same-volume fast path; any rename failure falls back to copy+delete.
        if fs::rename(source, &dest).await.is_ok() {
            self.tracker.add_bytes(stat.bytes);
            self.tracker.add_items(stat.items);
            return Ok(Some(dest));
        }

        if meta.is_dir() {
            let errors_before = self.tracker.error_count();
            self.copy_tree(source, &dest).await?;
            // the source survives unless every file inside transferred clean
            if self.tracker.error_count() == errors_before {
                fs::remove_dir_all(source)
                    .await
                    .map_err(|e| OpsError::io(source, e))?;
            }
        } else {
            self.copy_file(source, &dest).await?;
            fs::remove_file(source)
                .await
                .map_err(|e| OpsError::io(source, e))?;
        }
        Ok(Some(dest))
    }

    async fn delete_entry(
        &self,
        target: &Path,
        stat: EntryStat,
    ) -> Result<Option<PathBuf>, OpsError> {
        if self.cancel.is_cancelled() {
            return Err(OpsError::Cancelled);
        }
        self.tracker.begin_file(target);

        if self.use_trash {
            let owned = target.to_path_buf();
            let result = tokio::task::spawn_blocking(move || trash::delete(&owned)).await;
            return match result {
                Ok(Ok(())) => {
                    self.tracker.add_items(stat.items);
                    Ok(None)
                }
                Ok(Err(error)) => Err(OpsError::Io {
                    path: target.to_path_buf(),
                    source: std::io::Error::other(error),
                }),
                Err(error) => Err(OpsError::Io {
                    path: target.to_path_buf(),
                    source: std::io::Error::other(error),
                }),
            };
        }

        let meta = fs::symlink_metadata(target)
            .await
            .map_err(|e| OpsError::io(target, e))?;
        if meta.is_dir() {
            self.delete_tree(target).await?;
        } else {
            fs::remove_file(target)
                .await
                .map_err(|e| OpsError::io(target, e))?;
            self.tracker.add_items(1);
        }
        Ok(None)
    }

    /// Depth-first tree copy: directories are created before their
    /// children, leaf names are conflict-resolved against their target
    /// directory, and failures inside the tree are recorded without
    /// aborting it.
    async fn copy_tree(&self, src_root: &Path, dest_root: &Path) -> Result<(), OpsError> {
        fs::create_dir_all(dest_root)
            .await
            .map_err(|e| OpsError::io(dest_root, e))?;

        let mut stack = vec![(src_root.to_path_buf(), dest_root.to_path_buf())];
        while let Some((src_dir, dst_dir)) = stack.pop() {
            let mut entries = match fs::read_dir(&src_dir).await {
                Ok(entries) => entries,
                Err(error) => {
                    self.tracker
                        .record_error(&src_dir, &OpsError::io(&src_dir, error));
                    continue;
                }
            };

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(error) => {
                        self.tracker
                            .record_error(&src_dir, &OpsError::io(&src_dir, error));
                        break;
                    }
                };
                if self.cancel.is_cancelled() {
                    return Err(OpsError::Cancelled);
                }

                let path = entry.path();
                let is_dir = entry
                    .file_type()
                    .await
                    .map(|file_type| file_type.is_dir())
                    .unwrap_or(false);
                if is_dir {
                    let child_dst = dst_dir.join(entry.file_name());
                    match fs::create_dir_all(&child_dst).await {
                        Ok(()) => stack.push((path, child_dst)),
                        Err(error) => self
                            .tracker
                            .record_error(&path, &OpsError::io(&child_dst, error)),
                    }
                } else {
                    match self.copy_leaf(&path, &dst_dir).await {
                        Ok(_) => {}
                        Err(OpsError::Cancelled) => return Err(OpsError::Cancelled),
                        Err(error) => self.tracker.record_error(&path, &error),
                    }
                }
            }
        }
        Ok(())
    }

    async fn copy_leaf(&self, source: &Path, target_dir: &Path) -> Result<PathBuf, OpsError> {
        if self.cancel.is_cancelled() {
            return Err(OpsError::Cancelled);
        }
        let name = file_name_of(source)?;
        let dest = resolve_collision(target_dir, &name, self.config.max_conflict_attempts)?;
        self.copy_file(source, &dest).await?;
        Ok(dest)
    }

    /// Stream one file in fixed-size chunks, verifying the destination size
    /// afterwards and carrying over permission bits and mtime where the
    /// platform allows. Cancellation is observed at every chunk boundary;
    /// a cancelled partial destination is deleted.
    async fn copy_file(&self, source: &Path, dest: &Path) -> Result<(), OpsError> {
        self.tracker.begin_file(source);

        let meta = fs::metadata(source)
            .await
            .map_err(|e| OpsError::io(source, e))?;
        let expected = meta.len();

        let mut src = fs::File::open(source)
            .await
            .map_err(|e| OpsError::io(source, e))?;
        // create_new turns a lost conflict-resolution race into a write
        // error instead of a silent overwrite
        let mut dst = fs::File::options()
            .write(true)
            .create_new(true)
            .open(dest)
            .await
            .map_err(|e| OpsError::io(dest, e))?;

        let mut buf = vec![0u8; self.config.chunk_size];
        loop {
            if self.cancel.is_cancelled() {
                drop(dst);
                let _ = fs::remove_file(dest).await;
                return Err(OpsError::Cancelled);
            }

            let read = src
                .read(&mut buf)
                .await
                .map_err(|e| OpsError::io(source, e))?;
            if read == 0 {
                break;
            }
            dst.write_all(&buf[..read])
                .await
                .map_err(|e| OpsError::io(dest, e))?;
            self.tracker.add_bytes(read as u64);
        }
        dst.flush().await.map_err(|e| OpsError::io(dest, e))?;
        drop(dst);

        let written = fs::metadata(dest)
            .await
            .map_err(|e| OpsError::io(dest, e))?
            .len();
        if written != expected {
            return Err(OpsError::VerificationMismatch {
                path: dest.to_path_buf(),
                expected,
                actual: written,
            });
        }

        self.preserve_metadata(&meta, dest).await;
        self.tracker.add_items(1);
        Ok(())
    }

    /// Best-effort metadata carry-over; failures are ignored.
    async fn preserve_metadata(&self, src_meta: &std::fs::Metadata, dest: &Path) {
        if let Ok(modified) = src_meta.modified() {
            let dest = dest.to_path_buf();
            let _ = tokio::task::spawn_blocking(move || {
                std::fs::File::options()
                    .write(true)
                    .open(&dest)
                    .and_then(|file| file.set_modified(modified))
            })
            .await;
        }
        let _ = fs::set_permissions(dest, src_meta.permissions()).await;
    }

    /// Depth-first removal, children before parents, counting each removed
    /// entry as one progress item.
    fn delete_tree<'a>(
        &'a self,
        dir: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<(), OpsError>> + Send + 'a>> {
        Box::pin(async move {
            let mut entries = fs::read_dir(dir).await.map_err(|e| OpsError::io(dir, e))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| OpsError::io(dir, e))?
            {
                if self.cancel.is_cancelled() {
                    return Err(OpsError::Cancelled);
                }

                let path = entry.path();
                self.tracker.begin_file(&path);
                let is_dir = entry
                    .file_type()
                    .await
                    .map(|file_type| file_type.is_dir())
                    .unwrap_or(false);
                let result = if is_dir {
                    self.delete_tree(&path).await
                } else {
                    fs::remove_file(&path)
                        .await
                        .map_err(|e| OpsError::io(&path, e))
                        .map(|()| self.tracker.add_items(1))
                };
                match result {
                    Ok(()) => {}
                    Err(OpsError::Cancelled) => return Err(OpsError::Cancelled),
                    Err(error) => self.tracker.record_error(&path, &error),
                }
            }
            fs::remove_dir(dir).await.map_err(|e| OpsError::io(dir, e))?;
            self.tracker.add_items(1);
            Ok(())
        })
    }
}

fn file_name_of(path: &Path) -> Result<String, OpsError> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| OpsError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "source has no file name",
            ),
        })
}

/// Totals walk for the progress denominator. Errors are ignored here; the
/// processing pass surfaces them per file.
async fn scan_path(path: &Path, count_dirs: bool) -> EntryStat {
    let Ok(meta) = fs::metadata(path).await else {
        return EntryStat::default();
    };
    if !meta.is_dir() {
        return EntryStat {
            bytes: meta.len(),
            items: 1,
        };
    }

    let mut stat = EntryStat::default();
    if count_dirs {
        stat.items += 1;
    }
    let mut stack = vec![path.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(mut entries) = fs::read_dir(&dir).await else {
            continue;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };
            if file_type.is_dir() {
                if count_dirs {
                    stat.items += 1;
                }
                stack.push(entry.path());
            } else {
                if let Ok(meta) = entry.metadata().await {
                    stat.bytes += meta.len();
                }
                stat.items += 1;
            }
        }
    }
    stat
}
