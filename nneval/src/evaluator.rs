use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{anyhow, ensure, Context, Result};
use engine::{FeatureEncoder, Symmetry};
use log::{debug, warn};
use parking_lot::{Condvar, Mutex};

use super::{
    BatchBuffer, BufferFull, ComputeBackend, EvalError, EvalResult, EvaluatorOptions, LoadModel,
    Reporter, ResultSlot, RowStorage, ServerScratch, SymmetrySource,
};

/// Coordinates client threads that request evaluations with the server threads that run them
/// through the backend in batches.
pub struct Evaluator<F, B> {
    queue: Mutex<Queue>,
    row_available: Condvar,
    batch_started: Condvar,
    batch_filled: Condvar,
    encoder: F,
    backend: Arc<B>,
    max_batch_size: usize,
    grace_period: Duration,
    reporter: Option<Reporter>,
}

struct Queue {
    buffer: BatchBuffer,
    is_killed: bool,
}

impl<F, B> Evaluator<F, B>
where
    F: FeatureEncoder,
    B: ComputeBackend,
{
    pub fn load(model_path: &Path, encoder: F, options: &EvaluatorOptions) -> Result<Self>
    where
        B: LoadModel,
    {
        let backend = B::load(model_path)
            .with_context(|| format!("Failed to load model {:?}", model_path))?;

        Self::with_backend(backend, encoder, options)
    }

    pub fn with_backend(backend: B, encoder: F, options: &EvaluatorOptions) -> Result<Self> {
        options.validate()?;

        if let Some((row_width, policy_size)) = backend.shape() {
            ensure!(
                row_width == encoder.row_width() && policy_size == encoder.policy_size(),
                "Model expects rows of width {} and policies of size {}, the encoder produces {} and {}",
                row_width,
                policy_size,
                encoder.row_width(),
                encoder.policy_size()
            );
        }

        let reporter = if options.report_interval.is_zero() {
            None
        } else {
            Some(Reporter::new(options.report_interval)?)
        };

        let buffer = BatchBuffer::new(
            options.max_batch_size,
            encoder.row_width(),
            encoder.policy_size(),
        );

        Ok(Self {
            queue: Mutex::new(Queue {
                buffer,
                is_killed: false,
            }),
            row_available: Condvar::new(),
            batch_started: Condvar::new(),
            batch_filled: Condvar::new(),
            encoder,
            backend: Arc::new(backend),
            max_batch_size: options.max_batch_size,
            grace_period: options.batch_grace_period,
            reporter,
        })
    }

    /// Encodes the position into the slot, queues it for the next batch and blocks until its
    /// output is published or the evaluator is killed.
    pub fn evaluate(&self, position: &F::Position, slot: &mut ResultSlot) -> EvalResult {
        if slot.clear() {
            warn!("Discarding an unread result left in the slot by a previous request");
        }

        self.encoder
            .validate(position)
            .map_err(|err| EvalError::InvalidPosition(format!("{:#}", err)))?;

        let (row, legal) = slot.staging_mut(self.encoder.row_width(), self.encoder.policy_size());
        self.encoder.encode(position, row, legal);

        self.enqueue(slot)?;

        slot.wait()
    }

    fn enqueue(&self, slot: &ResultSlot) -> Result<(), EvalError> {
        let mut queue = self.queue.lock();

        let index = loop {
            if queue.is_killed {
                return Err(EvalError::Killed);
            }

            match queue.buffer.push(slot) {
                Ok(index) => break index,
                Err(BufferFull) => self.row_available.wait(&mut queue),
            }
        };

        let is_full = queue.buffer.is_full();
        drop(queue);

        if index == 0 {
            self.batch_started.notify_one();
        }

        if is_full {
            self.batch_filled.notify_all();
        }

        Ok(())
    }

    /// Claims and runs batches until the evaluator is killed.
    pub fn serve(&self, scratch: &mut ServerScratch<B>, symmetries: &mut SymmetrySource) {
        while let Some(count) = self.claim_batch(&mut scratch.rows) {
            self.row_available.notify_all();

            scratch.assign_symmetries(count, symmetries);

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| scratch.run(count, &self.encoder)))
                .unwrap_or_else(|payload| Err(anyhow!("Backend panicked: {}", panic_message(&*payload))));

            match outcome {
                Ok(()) => scratch.publish_outputs(count),
                Err(err) => {
                    scratch.publish_failure(count, &err);

                    if let Some(reporter) = &self.reporter {
                        reporter.set_failed_rows(count);
                    }
                }
            }

            if let Some(reporter) = &self.reporter {
                reporter.set_batch_size(count);
            }
        }
    }

    /// Waits for a batch to start, gives it up to the grace period to fill, then swaps its rows
    /// into `rows`. Returns `None` once killed.
    fn claim_batch(&self, rows: &mut RowStorage) -> Option<usize> {
        let mut queue = self.queue.lock();

        loop {
            while queue.buffer.is_empty() && !queue.is_killed {
                self.batch_started.wait(&mut queue);
            }

            if queue.is_killed {
                return None;
            }

            let deadline = Instant::now() + self.grace_period;
            while !queue.buffer.is_full() && !queue.buffer.is_empty() && !queue.is_killed {
                if self.batch_filled.wait_until(&mut queue, deadline).timed_out() {
                    break;
                }
            }

            if queue.is_killed {
                return None;
            }

            match queue.buffer.claim(rows) {
                Some(count) => return Some(count),
                None => debug!("Batch was claimed by another server thread"),
            }
        }
    }

    /// Stops every server thread and releases every waiting client. Rows still queued are
    /// answered with `EvalError::Killed`; batches already claimed finish normally.
    pub fn kill_servers(&self) {
        let mut queue = self.queue.lock();

        if queue.is_killed {
            return;
        }

        queue.is_killed = true;
        let queued = queue.buffer.drain_slots();
        drop(queue);

        debug!("Killing server threads, releasing {} queued rows", queued.len());

        for slot in queued.iter().filter_map(|slot| slot.upgrade()) {
            slot.publish(Err(EvalError::Killed));
        }

        self.row_available.notify_all();
        self.batch_started.notify_all();
        self.batch_filled.notify_all();
    }

    pub fn is_killed(&self) -> bool {
        self.queue.lock().is_killed
    }

    /// Rows waiting in the buffer for a server to claim them.
    pub fn queued_rows(&self) -> usize {
        self.queue.lock().buffer.len()
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    pub fn encoder(&self) -> &F {
        &self.encoder
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }
}

fn panic_message<'a>(payload: &'a (dyn Any + Send + 'static)) -> &'a str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

impl<F, B> Evaluator<F, B>
where
    F: FeatureEncoder + 'static,
    B: ComputeBackend + 'static,
{
    /// Starts `num_threads` server threads. Each one derives its symmetry stream from `seed`
    /// and its index when `randomize` is set, otherwise every row uses `default_symmetry`.
    pub fn spawn_server_threads(
        self: &Arc<Self>,
        num_threads: usize,
        randomize: bool,
        seed: &str,
        default_symmetry: Symmetry,
    ) -> Result<Vec<JoinHandle<()>>> {
        (0..num_threads)
            .map(|index| {
                let evaluator = self.clone();
                let mut symmetries = SymmetrySource::new(randomize, seed, index, default_symmetry);

                std::thread::Builder::new()
                    .name(format!("nneval-server-{}", index))
                    .spawn(move || {
                        debug!("Server thread {} started", index);

                        let mut scratch = ServerScratch::new(&evaluator);
                        evaluator.serve(&mut scratch, &mut symmetries);

                        debug!("Server thread {} exiting", index);
                    })
                    .with_context(|| format!("Failed to spawn server thread {}", index))
            })
            .collect()
    }

    /// Starts the server threads described by `options`.
    pub fn spawn_from_options(self: &Arc<Self>, options: &EvaluatorOptions) -> Result<Vec<JoinHandle<()>>> {
        self.spawn_server_threads(
            options.num_server_threads,
            options.randomize_symmetries,
            &options.symmetry_seed,
            options.default_symmetry,
        )
    }
}
