mod common;

use common::{FakeStorage, FixedContext, ScriptedUploader};
use dd_upload_pipeline::system::{
    NetworkInfo, StaticNetworkInfoProvider, StaticSystemInfoProvider, SystemInfo,
};
use dd_upload_pipeline::domain::RawBatchEvent;
use dd_upload_pipeline::sdk::DatadogContext;
use dd_upload_pipeline::upload::{
    DataUploader, UploadRunnable, UploadScheduler, UploadSchedulerStrategy, UploadStatus,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Always waits `delay`, counting how often it is asked.
struct CountingStrategy {
    delay: Duration,
    runs: AtomicUsize,
}

impl CountingStrategy {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            runs: AtomicUsize::new(0),
        }
    }

    fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl UploadSchedulerStrategy for CountingStrategy {
    fn next_delay(
        &self,
        _feature_name: &str,
        _upload_attempts: usize,
        _last_status: Option<&UploadStatus>,
    ) -> Duration {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.delay
    }
}

fn scheduler(
    strategy: Arc<CountingStrategy>,
    storage: Arc<FakeStorage>,
) -> UploadScheduler<FakeStorage, ScriptedUploader> {
    let runnable = UploadRunnable::builder(
        "logs",
        storage,
        Arc::new(ScriptedUploader::default()),
        Arc::new(FixedContext),
        Arc::new(StaticNetworkInfoProvider::new(NetworkInfo::default())),
        Arc::new(StaticSystemInfoProvider::new(SystemInfo::plugged_in())),
        strategy,
    )
    .build();
    UploadScheduler::new(Arc::new(runnable), Duration::from_secs(5))
}

#[tokio::test(start_paused = true)]
async fn test_first_run_waits_for_the_initial_delay() {
    let strategy = Arc::new(CountingStrategy::new(Duration::from_secs(1)));
    let scheduler = scheduler(strategy.clone(), Arc::new(FakeStorage::default()));

    scheduler.start();
    assert!(scheduler.is_running());

    tokio::time::sleep(Duration::from_millis(4_900)).await;
    assert_eq!(strategy.runs(), 0);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(strategy.runs(), 1);

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_runs_are_rearmed_with_the_returned_delay() {
    let strategy = Arc::new(CountingStrategy::new(Duration::from_secs(1)));
    let storage = Arc::new(FakeStorage::default());
    let scheduler = scheduler(strategy.clone(), storage.clone());

    scheduler.start();
    // Runs at 5 s, 6 s, 7 s and 8 s.
    tokio::time::sleep(Duration::from_millis(8_500)).await;

    assert_eq!(strategy.runs(), 4);
    assert_eq!(storage.reads(), 4);
    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_start_twice_keeps_a_single_worker() {
    let strategy = Arc::new(CountingStrategy::new(Duration::from_secs(1)));
    let scheduler = scheduler(strategy.clone(), Arc::new(FakeStorage::default()));

    scheduler.start();
    scheduler.start();
    tokio::time::sleep(Duration::from_millis(5_500)).await;

    assert_eq!(strategy.runs(), 1);
    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_the_pending_run() {
    let strategy = Arc::new(CountingStrategy::new(Duration::from_secs(1)));
    let scheduler = scheduler(strategy.clone(), Arc::new(FakeStorage::default()));

    scheduler.start();
    tokio::time::sleep(Duration::from_secs(1)).await;
    scheduler.stop();
    assert!(!scheduler.is_running());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(strategy.runs(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_then_restart() {
    let strategy = Arc::new(CountingStrategy::new(Duration::from_secs(1)));
    let scheduler = scheduler(strategy.clone(), Arc::new(FakeStorage::default()));

    scheduler.start();
    tokio::time::sleep(Duration::from_millis(6_500)).await;
    scheduler.shutdown().await;
    assert_eq!(strategy.runs(), 2);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(strategy.runs(), 2);

    scheduler.start();
    tokio::time::sleep(Duration::from_millis(5_500)).await;
    assert_eq!(strategy.runs(), 3);
    scheduler.shutdown().await;
}

/// Takes `duration` per upload and remembers the highest concurrency seen.
struct SlowUploader {
    duration: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl SlowUploader {
    fn new(duration: Duration) -> Self {
        Self {
            duration,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

impl DataUploader for SlowUploader {
    async fn upload(
        &self,
        _context: &DatadogContext,
        _batch: &[RawBatchEvent],
        _batch_metadata: Option<&[u8]>,
    ) -> UploadStatus {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(self.duration).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        UploadStatus::Success { code: 202 }
    }
}

#[tokio::test(start_paused = true)]
async fn test_restart_waits_for_the_run_in_flight() {
    let uploader = Arc::new(SlowUploader::new(Duration::from_secs(10)));
    let runnable = UploadRunnable::builder(
        "logs",
        Arc::new(FakeStorage::with_batches(10)),
        uploader.clone(),
        Arc::new(FixedContext),
        Arc::new(StaticNetworkInfoProvider::new(NetworkInfo::default())),
        Arc::new(StaticSystemInfoProvider::new(SystemInfo::plugged_in())),
        Arc::new(CountingStrategy::new(Duration::from_secs(1))),
    )
    .build();
    let scheduler = UploadScheduler::new(Arc::new(runnable), Duration::from_secs(5));

    // First upload runs from 5 s to 15 s.
    scheduler.start();
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(uploader.calls.load(Ordering::SeqCst), 1);

    scheduler.stop();
    scheduler.start();
    assert!(scheduler.is_running());

    // The restarted worker arms its initial delay at 15 s and uploads at 20 s.
    tokio::time::sleep(Duration::from_secs(12)).await;
    assert_eq!(uploader.calls.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(uploader.calls.load(Ordering::SeqCst), 2);
    assert_eq!(uploader.max_in_flight.load(Ordering::SeqCst), 1);

    scheduler.shutdown().await;
}
