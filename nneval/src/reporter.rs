use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam::channel::{self, Sender};
use log::{info, warn};

/// Periodically logs throughput and batch size statistics of the server threads.
pub struct Reporter {
    inner: Arc<ReporterInner>,
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Reporter {
    pub fn new(interval: Duration) -> Result<Self> {
        let inner = Arc::new(ReporterInner::default());
        let (shutdown, shutdown_rx) = channel::bounded::<()>(0);
        let ticker = channel::tick(interval);

        let timer_inner = inner.clone();
        let handle = std::thread::Builder::new()
            .name("nneval-reporter".to_string())
            .spawn(move || loop {
                let is_shutdown = crossbeam::select! {
                    recv(ticker) -> _ => {
                        timer_inner.report(interval);
                        false
                    },
                    recv(shutdown_rx) -> _ => true,
                };

                if is_shutdown {
                    break;
                }
            })
            .context("Failed to spawn the reporter thread")?;

        Ok(Self {
            inner,
            shutdown: Some(shutdown),
            handle: Some(handle),
        })
    }

    pub fn set_batch_size(&self, batch_size: usize) {
        self.inner.record_batch(batch_size);
    }

    pub fn set_failed_rows(&self, num_rows: usize) {
        self.inner.num_failed_rows.fetch_add(num_rows, Ordering::Relaxed);
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        drop(self.shutdown.take());

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("The reporter thread panicked");
            }
        }
    }
}

struct ReporterInner {
    last_report_had_rows: AtomicBool,
    num_rows: AtomicUsize,
    num_batches: AtomicUsize,
    num_failed_rows: AtomicUsize,
    min_batch_size: AtomicUsize,
    max_batch_size: AtomicUsize,
}

impl Default for ReporterInner {
    fn default() -> Self {
        Self {
            last_report_had_rows: AtomicBool::new(false),
            num_rows: AtomicUsize::new(0),
            num_batches: AtomicUsize::new(0),
            num_failed_rows: AtomicUsize::new(0),
            min_batch_size: AtomicUsize::new(usize::MAX),
            max_batch_size: AtomicUsize::new(0),
        }
    }
}

#[derive(Debug, PartialEq)]
struct Report {
    num_rows: usize,
    num_batches: usize,
    num_failed_rows: usize,
    min_batch_size: usize,
    max_batch_size: usize,
}

impl ReporterInner {
    fn record_batch(&self, batch_size: usize) {
        self.num_rows.fetch_add(batch_size, Ordering::Relaxed);
        self.num_batches.fetch_add(1, Ordering::Relaxed);
        self.min_batch_size.fetch_min(batch_size, Ordering::Relaxed);
        self.max_batch_size.fetch_max(batch_size, Ordering::Relaxed);
    }

    fn take_report(&self) -> Report {
        let num_batches = self.num_batches.swap(0, Ordering::Relaxed);
        let min_batch_size = self.min_batch_size.swap(usize::MAX, Ordering::Relaxed);

        Report {
            num_rows: self.num_rows.swap(0, Ordering::Relaxed),
            num_batches,
            num_failed_rows: self.num_failed_rows.swap(0, Ordering::Relaxed),
            min_batch_size: if num_batches == 0 { 0 } else { min_batch_size },
            max_batch_size: self.max_batch_size.swap(0, Ordering::Relaxed),
        }
    }

    fn report(&self, elapsed: Duration) {
        let report = self.take_report();
        let elapsed_secs = elapsed.as_secs_f32().max(f32::EPSILON);
        let rows_per_sec = report.num_rows as f32 / elapsed_secs;
        let had_rows = report.num_rows > 0;

        if self.last_report_had_rows.load(Ordering::Relaxed) || had_rows {
            info!(
                "Evals/s: {:.2}, Batches: {}, Avg Batch Size: {:.2}, Min Batch Size: {}, Max Batch Size: {}, Failed: {}",
                rows_per_sec,
                report.num_batches,
                report.num_rows as f32 / report.num_batches.max(1) as f32,
                report.min_batch_size,
                report.max_batch_size,
                report.num_failed_rows
            );
        }

        self.last_report_had_rows.store(had_rows, Ordering::Relaxed);
    }
}
