use super::orchestrator::BatchFileOrchestrator;
use crate::domain::{LogLevel, LogTarget, TrackingConsent};
use crate::internal_logger::InternalLogger;
use crate::metrics::RemovalReason;
use tokio::fs;

/// What happens to pending data when consent changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentMigration {
    /// Nothing to do.
    Keep,
    /// Pending batches become uploadable.
    MovePendingToGranted,
    /// Pending batches are deleted.
    WipePending,
}

impl ConsentMigration {
    pub fn between(previous: TrackingConsent, next: TrackingConsent) -> Self {
        use TrackingConsent::{Granted, NotGranted, Pending};
        match (previous, next) {
            (Pending, Granted) => ConsentMigration::MovePendingToGranted,
            (Pending, NotGranted) | (Granted, Pending) | (NotGranted, Pending) => {
                ConsentMigration::WipePending
            }
            _ => ConsentMigration::Keep,
        }
    }
}

pub(crate) async fn move_pending_to_granted(
    pending: &BatchFileOrchestrator,
    granted: &BatchFileOrchestrator,
    logger: &dyn InternalLogger,
) {
    let files = pending.get_all_files().await;
    if files.is_empty() {
        return;
    }
    if let Err(e) = fs::create_dir_all(granted.root_dir()).await {
        logger.log(
            LogLevel::Error,
            &[LogTarget::Maintainer, LogTarget::Telemetry],
            &format!(
                "Unable to move pending data into {}: {e}",
                granted.root_dir().display()
            ),
        );
        return;
    }

    for file in files {
        let Some(name) = file.file_name() else {
            continue;
        };
        let target = granted.root_dir().join(name);
        if let Err(e) = fs::rename(&file, &target).await {
            logger.log_one(
                LogLevel::Error,
                LogTarget::Maintainer,
                &format!("Unable to move file {} to {}: {e}", file.display(), target.display()),
            );
            continue;
        }
        let metadata_file = pending.metadata_file(&file);
        if fs::try_exists(&metadata_file).await.unwrap_or(false) {
            let metadata_target = granted.metadata_file(&target);
            if let Err(e) = fs::rename(&metadata_file, &metadata_target).await {
                logger.log_one(
                    LogLevel::Warn,
                    LogTarget::Maintainer,
                    &format!("Unable to move metadata file {}: {e}", metadata_file.display()),
                );
            }
        }
    }
}

pub(crate) async fn wipe(orchestrator: &BatchFileOrchestrator) {
    for file in orchestrator.get_all_files().await {
        orchestrator.delete_batch(&file, RemovalReason::Dropped).await;
    }
}
