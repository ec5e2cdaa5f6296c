use super::runnable::UploadRunnable;
use super::uploader::DataUploader;
use crate::storage::Storage;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drives an `UploadRunnable` on its own task, re-arming it with the delay each
/// run returns. Runs of one scheduler never overlap.
pub struct UploadScheduler<S, U> {
    runnable: Arc<UploadRunnable<S, U>>,
    initial_delay: Duration,
    worker: Mutex<Option<Worker>>,
    // Stopped worker whose last run may still be in flight.
    stopping: Mutex<Option<JoinHandle<()>>>,
}

impl<S, U> UploadScheduler<S, U>
where
    S: Storage + 'static,
    U: DataUploader + 'static,
{
    pub fn new(runnable: Arc<UploadRunnable<S, U>>, initial_delay: Duration) -> Self {
        Self {
            runnable,
            initial_delay,
            worker: Mutex::new(None),
            stopping: Mutex::new(None),
        }
    }

    /// Arms the first run after the initial delay. No-op when already running.
    ///
    /// After a `stop`, the initial delay only starts once the stopped worker's
    /// last run has completed.
    pub fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            return;
        }
        let previous = self.stopping.lock().take();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            self.runnable.clone(),
            self.initial_delay,
            cancel.clone(),
            previous,
        ));
        *worker = Some(Worker { cancel, handle });
    }

    /// Cancels the armed timer. A run in progress completes but is not re-armed.
    pub fn stop(&self) {
        if let Some(worker) = self.worker.lock().take() {
            worker.cancel.cancel();
            *self.stopping.lock() = Some(worker.handle);
        }
    }

    /// Like `stop`, then waits for a run in progress to complete.
    pub async fn shutdown(&self) {
        let worker = self.worker.lock().take();
        let stopping = self.stopping.lock().take();
        let mut handles = Vec::with_capacity(2);
        if let Some(worker) = worker {
            worker.cancel.cancel();
            handles.push(worker.handle);
        }
        handles.extend(stopping);
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Upload scheduler of {} ended abnormally: {}", self.runnable.feature_name(), e);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }
}

async fn run_loop<S, U>(
    runnable: Arc<UploadRunnable<S, U>>,
    initial_delay: Duration,
    cancel: CancellationToken,
    previous: Option<JoinHandle<()>>,
) where
    S: Storage + 'static,
    U: DataUploader + 'static,
{
    if let Some(previous) = previous {
        // The stopped worker may still be uploading.
        let _ = previous.await;
    }
    let mut delay = initial_delay;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = runnable.run().await;
    }
    debug!("Upload scheduler of {} stopped", runnable.feature_name());
}
