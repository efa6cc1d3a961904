use std::sync::Arc;

use anyhow::{ensure, Error, Result};
use common::{create_rng_from_seed, masked_softmax_in_place};
use engine::{FeatureEncoder, Symmetry, NUM_SYMMETRIES};
use log::{debug, error, warn};
use rand::rngs::StdRng;
use rand::Rng;
use rayon::prelude::*;

use super::{
    BatchInput, BatchOutput, ComputeBackend, EvalError, Evaluator, NNOutput, RowStorage,
    ILLEGAL_POLICY,
};

/// Picks the symmetry each claimed row is evaluated under.
pub enum SymmetrySource {
    Random(StdRng),
    Fixed(Symmetry),
}

impl SymmetrySource {
    /// A random stream derived from `seed` and the server index, or `default_symmetry` for every row.
    pub fn new(randomize: bool, seed: &str, server_index: usize, default_symmetry: Symmetry) -> Self {
        if randomize {
            SymmetrySource::Random(create_rng_from_seed(seed, server_index))
        } else {
            SymmetrySource::Fixed(default_symmetry)
        }
    }

    pub fn next_symmetry(&mut self) -> Symmetry {
        match self {
            SymmetrySource::Random(rng) => {
                Symmetry::try_from(rng.gen_range(0..NUM_SYMMETRIES)).unwrap_or_default()
            }
            SymmetrySource::Fixed(symmetry) => *symmetry,
        }
    }
}

/// Working storage of one server thread, reused for every batch it claims.
pub struct ServerScratch<B> {
    backend: Arc<B>,
    pub(crate) rows: RowStorage,
    feed: Vec<f32>,
    fetch: BatchOutput,
    outputs: Vec<Arc<NNOutput>>,
}

impl<B> ServerScratch<B>
where
    B: ComputeBackend,
{
    pub fn new<F>(evaluator: &Evaluator<F, B>) -> Self
    where
        F: FeatureEncoder,
    {
        let capacity = evaluator.max_batch_size();
        let encoder = evaluator.encoder();
        let row_width = encoder.row_width();
        let policy_size = encoder.policy_size();

        Self {
            backend: evaluator.backend().clone(),
            rows: RowStorage::new(capacity, row_width, policy_size),
            feed: vec![0.0; capacity * row_width],
            fetch: BatchOutput::with_capacity(capacity, policy_size),
            outputs: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.rows.capacity()
    }

    pub(crate) fn assign_symmetries(&mut self, count: usize, symmetries: &mut SymmetrySource) {
        for index in 0..count {
            self.rows.set_symmetry(index, symmetries.next_symmetry());
        }
    }

    /// Transforms the claimed rows into the feed, runs the backend and decodes every row.
    pub(crate) fn run<F>(&mut self, count: usize, encoder: &F) -> Result<()>
    where
        F: FeatureEncoder,
    {
        let row_width = self.rows.row_width();
        let policy_size = self.rows.policy_size();
        let feed = &mut self.feed[..count * row_width];

        for (index, feed_row) in feed.chunks_exact_mut(row_width).enumerate() {
            encoder.transform_row(self.rows.features(index), self.rows.symmetry(index), feed_row);
        }

        self.fetch.clear();
        self.backend
            .forward(&BatchInput::new(feed, count, row_width), &mut self.fetch)?;

        ensure!(
            self.fetch.len() == count,
            "Backend returned {} values for a batch of {}",
            self.fetch.len(),
            count
        );
        ensure!(
            self.fetch.policies().len() == count * policy_size,
            "Backend returned {} policy entries, expected {}",
            self.fetch.policies().len(),
            count * policy_size
        );

        let rows = &self.rows;
        let fetch = &self.fetch;

        (0..count)
            .into_par_iter()
            .map(|index| {
                Arc::new(decode_row(
                    encoder,
                    fetch.value(index),
                    fetch.policy(index),
                    rows.symmetry(index),
                    rows.legal(index),
                ))
            })
            .collect_into_vec(&mut self.outputs);

        Ok(())
    }

    /// Hands every decoded output to the slot of the row it came from.
    pub(crate) fn publish_outputs(&mut self, count: usize) {
        debug_assert_eq!(self.outputs.len(), count);

        for (slot, output) in self.rows.take_slots(count).zip(self.outputs.drain(..)) {
            match slot.upgrade() {
                Some(slot) => {
                    if !slot.publish(Ok(output)) {
                        warn!("Result slot already held a result");
                    }
                }
                None => debug!("Result slot dropped before its evaluation was published"),
            }
        }
    }

    /// Releases every row of the batch with the backend error.
    pub(crate) fn publish_failure(&mut self, count: usize, err: &Error) {
        let message = format!("{:#}", err);
        self.outputs.clear();

        for slot in self.rows.take_slots(count) {
            if let Some(slot) = slot.upgrade() {
                if slot.should_log_error() {
                    error!("Failed to evaluate a batch of {} rows: {}", count, message);
                }

                if !slot.publish(Err(EvalError::Backend(message.clone()))) {
                    warn!("Result slot already held a result");
                }
            }
        }
    }
}

fn decode_row<F>(
    encoder: &F,
    value: f32,
    raw_policy: &[f32],
    symmetry: Symmetry,
    legal: &[bool],
) -> NNOutput
where
    F: FeatureEncoder,
{
    let mut policy = vec![0.0; raw_policy.len()];
    encoder.untransform_policy(raw_policy, symmetry, &mut policy);
    masked_softmax_in_place(&mut policy, legal, 1.0, ILLEGAL_POLICY);

    NNOutput::new(value.tanh(), policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use engine::{PlanarEncoder, Position};

    #[test]
    fn test_fixed_symmetry_source() {
        let symmetry = Symmetry::try_from(3usize).unwrap();
        let mut source = SymmetrySource::new(false, "seed", 0, symmetry);

        assert!((0..10).all(|_| source.next_symmetry() == symmetry));
    }

    #[test]
    fn test_random_symmetry_source_is_reproducible() {
        let sample = |index| {
            let mut source = SymmetrySource::new(true, "seed", index, Symmetry::IDENTITY);
            (0..32).map(|_| source.next_symmetry()).collect::<Vec<_>>()
        };

        assert_eq!(sample(0), sample(0));
        assert_ne!(sample(0), sample(1));
    }

    #[test]
    fn test_random_symmetry_source_covers_all_symmetries() {
        let mut source = SymmetrySource::new(true, "seed", 0, Symmetry::IDENTITY);
        let mut seen = [false; NUM_SYMMETRIES];
        for _ in 0..500 {
            seen[source.next_symmetry().index()] = true;
        }

        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_decode_row_masks_illegal_moves() {
        let encoder = PlanarEncoder::new(2).unwrap();
        let raw_policy = [1.0, 2.0, 3.0, 4.0, 0.0];
        let legal = [true, false, true, false, true];

        let output = decode_row(&encoder, 0.0, &raw_policy, Symmetry::IDENTITY, &legal);

        assert_eq!(output.policy()[1], ILLEGAL_POLICY);
        assert_eq!(output.policy()[3], ILLEGAL_POLICY);
        assert_approx_eq!(output.legal_moves().map(|(_, p)| p).sum::<f32>(), 1.0);
        assert_eq!(output.best_move(), Some(2));
    }

    #[test]
    fn test_decode_row_value_is_squashed() {
        let encoder = PlanarEncoder::new(2).unwrap();
        let legal = [true; 5];

        let output = decode_row(&encoder, 0.5, &[0.0; 5], Symmetry::IDENTITY, &legal);

        assert_approx_eq!(output.value(), 0.5f32.tanh());
        assert!(decode_row(&encoder, 50.0, &[0.0; 5], Symmetry::IDENTITY, &legal).value() <= 1.0);
    }

    // The raw policy favours the transformed location of (1, 0); decoding must map it back.
    #[test]
    fn test_decode_row_undoes_symmetry() {
        let encoder = PlanarEncoder::new(3).unwrap();
        let position = Position::new(3).unwrap();
        let legal = vec![true; 10];

        for symmetry in Symmetry::all() {
            let (tx, ty) = symmetry.apply(1, 0, 3);
            let mut raw_policy = vec![0.0; 10];
            raw_policy[ty * 3 + tx] = 5.0;

            let output = decode_row(&encoder, 0.0, &raw_policy, symmetry, &legal);

            assert_eq!(output.best_move(), Some(position.loc(1, 0)), "symmetry {}", symmetry);
        }
    }
}
