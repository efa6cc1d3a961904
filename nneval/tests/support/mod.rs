#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use engine::{FeatureEncoder, PlanarEncoder, Position};
use nneval::{BatchInput, BatchOutput, ComputeBackend, Evaluator, EvaluatorOptions};
use parking_lot::Mutex;

pub const BOARD_SIZE: usize = 3;

/// Values are a fixed linear function of the row, policies are flat. Records every batch it runs
/// and fails its first `fail_first` calls.
pub struct RecordingBackend {
    weights: Vec<f32>,
    fail_first: usize,
    calls: AtomicUsize,
    batch_sizes: Mutex<Vec<usize>>,
}

impl RecordingBackend {
    pub fn new(row_width: usize) -> Self {
        Self::failing_first(row_width, 0)
    }

    pub fn failing_first(row_width: usize, fail_first: usize) -> Self {
        Self {
            weights: weights(row_width),
            fail_first,
            calls: AtomicUsize::new(0),
            batch_sizes: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().clone()
    }
}

impl ComputeBackend for RecordingBackend {
    fn forward(&self, input: &BatchInput<'_>, output: &mut BatchOutput) -> Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.batch_sizes.lock().push(input.count());

        if call < self.fail_first {
            bail!("device lost on call {}", call);
        }

        for row in input.rows() {
            let value = row.iter().zip(&self.weights).map(|(f, w)| f * w).sum();
            output.push_row_with(value, |_| {});
        }

        Ok(())
    }
}

/// Panics on its first `panic_first` calls, then behaves like a flat zero network.
pub struct PanickingBackend {
    panic_first: usize,
    calls: AtomicUsize,
}

impl PanickingBackend {
    pub fn new(panic_first: usize) -> Self {
        Self {
            panic_first,
            calls: AtomicUsize::new(0),
        }
    }
}

impl ComputeBackend for PanickingBackend {
    fn forward(&self, input: &BatchInput<'_>, output: &mut BatchOutput) -> Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if call < self.panic_first {
            panic!("kernel crashed on call {}", call);
        }

        for _ in 0..input.count() {
            output.push_row_with(0.0, |_| {});
        }

        Ok(())
    }
}

/// Returns one value too few, which the evaluator must treat as a failure.
pub struct TruncatingBackend;

impl ComputeBackend for TruncatingBackend {
    fn forward(&self, input: &BatchInput<'_>, output: &mut BatchOutput) -> Result<()> {
        for _ in 1..input.count() {
            output.push_row_with(0.0, |_| {});
        }

        Ok(())
    }
}

fn weights(row_width: usize) -> Vec<f32> {
    (0..row_width).map(|i| i as f32 * 0.001).collect()
}

pub fn encoder() -> PlanarEncoder {
    PlanarEncoder::new(BOARD_SIZE).unwrap()
}

pub fn options(max_batch_size: usize, grace_period: Duration) -> EvaluatorOptions {
    EvaluatorOptions {
        max_batch_size,
        batch_grace_period: grace_period,
        randomize_symmetries: false,
        report_interval: Duration::ZERO,
        ..Default::default()
    }
}

pub fn recording_evaluator(
    max_batch_size: usize,
    grace_period: Duration,
) -> Evaluator<PlanarEncoder, RecordingBackend> {
    let encoder = encoder();
    let backend = RecordingBackend::new(encoder.row_width());

    Evaluator::with_backend(backend, encoder, &options(max_batch_size, grace_period)).unwrap()
}

/// A position with a single black stone at `loc`.
pub fn position_with_stone(loc: usize) -> Position {
    let mut position = Position::new(BOARD_SIZE).unwrap();
    position.play(loc % (BOARD_SIZE * BOARD_SIZE)).unwrap();
    position
}

/// The value `RecordingBackend` produces for `position` under the identity symmetry.
pub fn expected_value(position: &Position) -> f32 {
    let encoder = encoder();
    let mut row = vec![0.0; encoder.row_width()];
    let mut legal = vec![false; encoder.policy_size()];
    encoder.encode(position, &mut row, &mut legal);

    let raw: f32 = row
        .iter()
        .zip(weights(encoder.row_width()))
        .map(|(f, w)| f * w)
        .sum();

    raw.tanh()
}

pub fn wait_for_queued_rows<F, B>(evaluator: &Evaluator<F, B>, rows: usize)
where
    F: FeatureEncoder,
    B: ComputeBackend,
{
    let deadline = Instant::now() + Duration::from_secs(10);

    while evaluator.queued_rows() < rows {
        assert!(Instant::now() < deadline, "Timed out waiting for {} queued rows", rows);
        std::thread::sleep(Duration::from_millis(1));
    }
}
