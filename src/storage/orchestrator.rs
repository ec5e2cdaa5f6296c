use super::config::FilePersistenceConfig;
use crate::domain::{LogLevel, LogTarget};
use crate::internal_logger::InternalLogger;
use crate::metrics::{PipelineMetrics, RemovalReason};
use crate::system::TimeProvider;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::fs;
use tokio::sync::Mutex;

const METADATA_SUFFIX: &str = "_metadata";

#[derive(Debug, Default)]
struct WritableState {
    previous_file: Option<PathBuf>,
    previous_item_count: usize,
}

/// Decides which batch file of a directory is written to, read from, or deleted.
///
/// Batch files are named after their creation time in milliseconds, so a lexical
/// sort on the parsed name is also a chronological sort.
pub struct BatchFileOrchestrator {
    root_dir: PathBuf,
    feature_name: String,
    config: FilePersistenceConfig,
    time_provider: Arc<dyn TimeProvider>,
    logger: Arc<dyn InternalLogger>,
    metrics: Arc<PipelineMetrics>,
    writable: Mutex<WritableState>,
    last_cleanup_ms: AtomicI64,
}

impl BatchFileOrchestrator {
    pub fn new(
        root_dir: PathBuf,
        feature_name: impl Into<String>,
        config: FilePersistenceConfig,
        time_provider: Arc<dyn TimeProvider>,
        logger: Arc<dyn InternalLogger>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            root_dir,
            feature_name: feature_name.into(),
            config,
            time_provider,
            logger,
            metrics,
            writable: Mutex::new(WritableState::default()),
            last_cleanup_ms: AtomicI64::new(i64::MIN),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn config(&self) -> &FilePersistenceConfig {
        &self.config
    }

    /// Returns the file the next event goes to, rotating to a new one when the
    /// previous file is full, too old, or `force_new` is set.
    pub async fn get_writable_file(&self, force_new: bool) -> Option<PathBuf> {
        if !self.ensure_root_dir().await {
            return None;
        }
        self.cleanup_if_due().await;

        let mut state = self.writable.lock().await;
        if !force_new && let Some(file) = self.reusable_file(&state).await {
            state.previous_item_count += 1;
            return Some(file);
        }

        let file = self.new_batch_file(state.previous_file.as_deref()).await;
        state.previous_file = Some(file.clone());
        state.previous_item_count = 1;
        Some(file)
    }

    /// Oldest batch that is not excluded and no longer open for appends.
    pub async fn get_readable_file(&self, excluded: &HashSet<PathBuf>) -> Option<PathBuf> {
        if !self.ensure_root_dir().await {
            return None;
        }
        self.cleanup_if_due().await;

        let threshold = self.now_ms() - self.config.recent_read_delay().as_millis() as i64;
        self.list_batch_files()
            .await
            .into_iter()
            .find(|(timestamp, file)| *timestamp < threshold && !excluded.contains(file))
            .map(|(_, file)| file)
    }

    /// Every batch file, oldest first, whatever its age or lock state.
    pub async fn get_all_files(&self) -> Vec<PathBuf> {
        if !self.ensure_root_dir().await {
            return Vec::new();
        }
        self.list_batch_files()
            .await
            .into_iter()
            .map(|(_, file)| file)
            .collect()
    }

    pub async fn get_flushable_files(&self) -> Vec<PathBuf> {
        self.get_all_files().await
    }

    /// Sibling file holding the metadata of `batch_file`.
    pub fn metadata_file(&self, batch_file: &Path) -> PathBuf {
        let mut name = batch_file.file_name().unwrap_or_default().to_os_string();
        name.push(METADATA_SUFFIX);
        batch_file.with_file_name(name)
    }

    /// Deletes a batch and its metadata file. Returns whether the batch file is gone.
    pub async fn delete_batch(&self, batch_file: &Path, reason: RemovalReason) -> bool {
        let deleted = match fs::remove_file(batch_file).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => {
                self.logger.log_one(
                    LogLevel::Warn,
                    LogTarget::Maintainer,
                    &format!("Unable to delete file {}: {e}", batch_file.display()),
                );
                false
            }
        };
        let metadata_file = self.metadata_file(batch_file);
        if let Err(e) = fs::remove_file(&metadata_file).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            self.logger.log_one(
                LogLevel::Warn,
                LogTarget::Maintainer,
                &format!("Unable to delete file {}: {e}", metadata_file.display()),
            );
        }
        if deleted {
            self.metrics.record_batch_deleted(&self.feature_name, reason);
        }
        deleted
    }

    async fn reusable_file(&self, state: &WritableState) -> Option<PathBuf> {
        let previous = state.previous_file.as_ref()?;
        let (last_timestamp, last_file) = self.list_batch_files().await.pop()?;
        if &last_file != previous {
            return None;
        }

        let write_threshold = self.now_ms() - self.config.recent_write_delay().as_millis() as i64;
        let is_recent = last_timestamp >= write_threshold;
        let has_room = fs::metadata(&last_file)
            .await
            .is_ok_and(|m| m.len() < self.config.max_batch_size);
        let has_slots = state.previous_item_count < self.config.max_items_per_batch;

        (is_recent && has_room && has_slots).then_some(last_file)
    }

    async fn new_batch_file(&self, previous: Option<&Path>) -> PathBuf {
        let mut timestamp = self.now_ms();
        if let Some(previous_timestamp) = previous.and_then(batch_timestamp) {
            timestamp = timestamp.max(previous_timestamp + 1);
        }
        loop {
            let candidate = self.root_dir.join(timestamp.to_string());
            if !fs::try_exists(&candidate).await.unwrap_or(false) {
                return candidate;
            }
            timestamp += 1;
        }
    }

    async fn cleanup_if_due(&self) {
        let now = self.now_ms();
        let last = self.last_cleanup_ms.load(Ordering::Acquire);
        let frequency = self.config.cleanup_frequency.as_millis() as i64;
        if last != i64::MIN && now.saturating_sub(last) < frequency {
            return;
        }
        if self
            .last_cleanup_ms
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        self.delete_obsolete_files(now).await;
        self.free_space_if_needed().await;
    }

    async fn delete_obsolete_files(&self, now: i64) {
        let threshold = now - self.config.old_file_threshold.as_millis() as i64;
        for (timestamp, file) in self.list_batch_files().await {
            if timestamp < threshold {
                self.logger.log_one(
                    LogLevel::Debug,
                    LogTarget::Maintainer,
                    &format!("Deleting obsolete batch {}", file.display()),
                );
                self.delete_batch(&file, RemovalReason::Obsolete).await;
            }
        }
    }

    async fn free_space_if_needed(&self) {
        let files = self.list_batch_files().await;
        let mut sized = Vec::with_capacity(files.len());
        let mut size_on_disk = 0u64;
        for (_, file) in files {
            let size = file_size(&file).await + file_size(&self.metadata_file(&file)).await;
            size_on_disk += size;
            sized.push((file, size));
        }

        if size_on_disk <= self.config.max_disk_space {
            return;
        }
        let mut size_to_free = size_on_disk - self.config.max_disk_space;
        self.logger.log(
            LogLevel::Error,
            &[LogTarget::Maintainer, LogTarget::Telemetry],
            &format!(
                "Too much disk space used ({size_on_disk}/{}): cleaning up to free {size_to_free} bytes",
                self.config.max_disk_space
            ),
        );
        for (file, size) in sized {
            if size_to_free == 0 {
                break;
            }
            if self.delete_batch(&file, RemovalReason::Purged).await {
                size_to_free = size_to_free.saturating_sub(size);
            }
        }
    }

    async fn ensure_root_dir(&self) -> bool {
        match fs::metadata(&self.root_dir).await {
            Ok(metadata) if !metadata.is_dir() => {
                self.log_root_error("is not a directory");
                false
            }
            Ok(metadata) if metadata.permissions().readonly() => {
                self.log_root_error("is not writable");
                false
            }
            Ok(_) => true,
            Err(_) => match fs::create_dir_all(&self.root_dir).await {
                Ok(()) => true,
                Err(e) => {
                    self.log_root_error(&format!("can't be created: {e}"));
                    false
                }
            },
        }
    }

    fn log_root_error(&self, reason: &str) {
        self.logger.log(
            LogLevel::Error,
            &[LogTarget::Maintainer, LogTarget::Telemetry],
            &format!(
                "The provided root file {} {reason}",
                self.root_dir.display()
            ),
        );
    }

    /// Batch files sorted by creation time. Metadata and foreign files are skipped.
    async fn list_batch_files(&self) -> Vec<(i64, PathBuf)> {
        let mut files = Vec::new();
        let Ok(mut entries) = fs::read_dir(&self.root_dir).await else {
            return files;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if let Some(timestamp) = batch_timestamp(&path)
                && entry.file_type().await.is_ok_and(|t| t.is_file())
            {
                files.push((timestamp, path));
            }
        }
        files.sort_unstable();
        files
    }

    fn now_ms(&self) -> i64 {
        self.time_provider.device_timestamp_ms()
    }
}

fn batch_timestamp(file: &Path) -> Option<i64> {
    file.file_name()?.to_str()?.parse().ok()
}

async fn file_size(file: &Path) -> u64 {
    fs::metadata(file).await.map(|m| m.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal_logger::TracingLogger;
    use crate::system::ManualTimeProvider;
    use std::time::Duration;
    use tempfile::TempDir;

    const START_MS: i64 = 1_700_000_000_000;

    fn orchestrator(
        dir: &TempDir,
        config: FilePersistenceConfig,
    ) -> (BatchFileOrchestrator, Arc<ManualTimeProvider>) {
        let clock = Arc::new(ManualTimeProvider::new(START_MS));
        let orchestrator = BatchFileOrchestrator::new(
            dir.path().join("logs-v2"),
            "logs",
            config,
            clock.clone(),
            Arc::new(TracingLogger),
            Arc::new(PipelineMetrics::new()),
        );
        (orchestrator, clock)
    }

    #[tokio::test]
    async fn test_writable_file_is_named_after_creation_time() {
        let dir = TempDir::new().unwrap();
        let (orchestrator, _) = orchestrator(&dir, FilePersistenceConfig::default());

        let file = orchestrator.get_writable_file(false).await.unwrap();

        assert_eq!(file, dir.path().join("logs-v2").join(START_MS.to_string()));
        assert!(orchestrator.root_dir().is_dir());
    }

    #[tokio::test]
    async fn test_recent_file_is_reused() {
        let dir = TempDir::new().unwrap();
        let (orchestrator, clock) = orchestrator(&dir, FilePersistenceConfig::default());

        let first = orchestrator.get_writable_file(false).await.unwrap();
        fs::write(&first, b"x").await.unwrap();
        clock.advance(Duration::from_millis(100));
        let second = orchestrator.get_writable_file(false).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_force_new_rotates_even_within_same_millisecond() {
        let dir = TempDir::new().unwrap();
        let (orchestrator, _) = orchestrator(&dir, FilePersistenceConfig::default());

        let first = orchestrator.get_writable_file(false).await.unwrap();
        fs::write(&first, b"x").await.unwrap();
        let second = orchestrator.get_writable_file(true).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(batch_timestamp(&second), Some(START_MS + 1));
    }

    #[tokio::test]
    async fn test_old_file_rotates() {
        let dir = TempDir::new().unwrap();
        let (orchestrator, clock) = orchestrator(&dir, FilePersistenceConfig::default());

        let first = orchestrator.get_writable_file(false).await.unwrap();
        fs::write(&first, b"x").await.unwrap();
        clock.advance(Duration::from_millis(4_800));
        let second = orchestrator.get_writable_file(false).await.unwrap();

        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_full_file_rotates_on_item_count() {
        let dir = TempDir::new().unwrap();
        let config = FilePersistenceConfig {
            max_items_per_batch: 2,
            ..FilePersistenceConfig::default()
        };
        let (orchestrator, _) = orchestrator(&dir, config);

        let first = orchestrator.get_writable_file(false).await.unwrap();
        fs::write(&first, b"x").await.unwrap();
        let second = orchestrator.get_writable_file(false).await.unwrap();
        let third = orchestrator.get_writable_file(false).await.unwrap();

        assert_eq!(first, second);
        assert_ne!(second, third);
    }

    #[tokio::test]
    async fn test_readable_file_skips_recent_and_excluded() {
        let dir = TempDir::new().unwrap();
        let (orchestrator, clock) = orchestrator(&dir, FilePersistenceConfig::default());

        let first = orchestrator.get_writable_file(false).await.unwrap();
        fs::write(&first, b"x").await.unwrap();
        assert!(orchestrator.get_readable_file(&HashSet::new()).await.is_none());

        clock.advance(Duration::from_secs(6));
        let second = orchestrator.get_writable_file(true).await.unwrap();
        fs::write(&second, b"y").await.unwrap();
        clock.advance(Duration::from_secs(6));

        assert_eq!(
            orchestrator.get_readable_file(&HashSet::new()).await,
            Some(first.clone())
        );
        let excluded = HashSet::from([first]);
        assert_eq!(orchestrator.get_readable_file(&excluded).await, Some(second));
    }

    #[tokio::test]
    async fn test_metadata_files_are_not_batches() {
        let dir = TempDir::new().unwrap();
        let (orchestrator, _) = orchestrator(&dir, FilePersistenceConfig::default());

        let file = orchestrator.get_writable_file(false).await.unwrap();
        fs::write(&file, b"x").await.unwrap();
        fs::write(orchestrator.metadata_file(&file), b"meta").await.unwrap();
        fs::write(orchestrator.root_dir().join("notes.txt"), b"?").await.unwrap();

        assert_eq!(orchestrator.get_all_files().await, vec![file]);
    }

    #[tokio::test]
    async fn test_obsolete_files_are_deleted_with_metadata() {
        let dir = TempDir::new().unwrap();
        let config = FilePersistenceConfig {
            old_file_threshold: Duration::from_secs(60),
            ..FilePersistenceConfig::default()
        };
        let (orchestrator, clock) = orchestrator(&dir, config);

        let old = orchestrator.get_writable_file(false).await.unwrap();
        fs::write(&old, b"x").await.unwrap();
        let old_metadata = orchestrator.metadata_file(&old);
        fs::write(&old_metadata, b"meta").await.unwrap();

        clock.advance(Duration::from_secs(120));
        assert!(orchestrator.get_readable_file(&HashSet::new()).await.is_none());

        assert!(!old.exists());
        assert!(!old_metadata.exists());
    }

    #[tokio::test]
    async fn test_disk_quota_purges_oldest_first() {
        let dir = TempDir::new().unwrap();
        let config = FilePersistenceConfig {
            max_disk_space: 150,
            cleanup_frequency: Duration::ZERO,
            ..FilePersistenceConfig::default()
        };
        let (orchestrator, clock) = orchestrator(&dir, config);

        let mut files = Vec::new();
        for _ in 0..3 {
            let file = orchestrator.get_writable_file(true).await.unwrap();
            fs::write(&file, vec![0u8; 100]).await.unwrap();
            files.push(file);
            clock.advance(Duration::from_secs(1));
        }
        orchestrator.get_all_files().await;
        orchestrator.get_readable_file(&HashSet::new()).await;

        assert!(!files[0].exists());
        assert!(!files[1].exists());
        assert!(files[2].exists());
    }

    #[tokio::test]
    async fn test_root_that_is_a_file_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let (orchestrator, _) = orchestrator(&dir, FilePersistenceConfig::default());
        fs::write(orchestrator.root_dir(), b"not a dir").await.unwrap();

        assert!(orchestrator.get_writable_file(false).await.is_none());
        assert!(orchestrator.get_readable_file(&HashSet::new()).await.is_none());
        assert!(orchestrator.get_all_files().await.is_empty());
    }
}
