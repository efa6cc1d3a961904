use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{ensure, Context, Result};
use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{BatchInput, BatchOutput, ComputeBackend, LoadModel};

/// A single dense layer per head, stored as JSON. Policy weights are row-major,
/// `policy_size` rows of `row_width`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub row_width: usize,
    pub policy_size: usize,
    pub value_weights: Vec<f32>,
    pub value_bias: f32,
    pub policy_weights: Vec<f32>,
    pub policy_bias: Vec<f32>,
}

impl LinearModel {
    pub fn random<R: Rng>(row_width: usize, policy_size: usize, scale: f32, rng: &mut R) -> Self {
        let mut sample = |len: usize| {
            (0..len)
                .map(|_| rng.gen_range(-scale..=scale))
                .collect::<Vec<_>>()
        };

        let value_weights = sample(row_width);
        let policy_weights = sample(row_width * policy_size);
        let policy_bias = sample(policy_size);

        Self {
            row_width,
            policy_size,
            value_weights,
            value_bias: 0.0,
            policy_weights,
            policy_bias,
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.row_width > 0, "Model row width must be positive");
        ensure!(self.policy_size > 0, "Model policy size must be positive");
        ensure!(
            self.value_weights.len() == self.row_width,
            "Expected {} value weights, found {}",
            self.row_width,
            self.value_weights.len()
        );
        ensure!(
            self.policy_weights.len() == self.row_width * self.policy_size,
            "Expected {} policy weights, found {}",
            self.row_width * self.policy_size,
            self.policy_weights.len()
        );
        ensure!(
            self.policy_bias.len() == self.policy_size,
            "Expected {} policy biases, found {}",
            self.policy_size,
            self.policy_bias.len()
        );

        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
        serde_json::to_writer(BufWriter::new(file), self)
            .with_context(|| format!("Failed to write model to {:?}", path))?;

        Ok(())
    }
}

impl LoadModel for LinearModel {
    fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Failed to open model {:?}", path))?;
        let model: LinearModel = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse model {:?}", path))?;

        model
            .validate()
            .with_context(|| format!("Invalid model {:?}", path))?;

        info!(
            "Loaded linear model {:?}. Row width: {}, Policy size: {}",
            path, model.row_width, model.policy_size
        );

        Ok(model)
    }
}

impl ComputeBackend for LinearModel {
    fn forward(&self, input: &BatchInput<'_>, output: &mut BatchOutput) -> Result<()> {
        ensure!(
            input.row_width() == self.row_width,
            "Model expects rows of width {}, received {}",
            self.row_width,
            input.row_width()
        );
        ensure!(
            output.policy_size() == self.policy_size,
            "Model produces policies of size {}, expected {}",
            self.policy_size,
            output.policy_size()
        );

        for row in input.rows() {
            let value = dot(&self.value_weights, row) + self.value_bias;

            output.push_row_with(value, |policy| {
                for ((logit, weights), bias) in policy
                    .iter_mut()
                    .zip(self.policy_weights.chunks_exact(self.row_width))
                    .zip(&self.policy_bias)
                {
                    *logit = dot(weights, row) + bias;
                }
            });
        }

        Ok(())
    }

    fn shape(&self) -> Option<(usize, usize)> {
        Some((self.row_width, self.policy_size))
    }
}

fn dot(lhs: &[f32], rhs: &[f32]) -> f32 {
    lhs.iter().zip(rhs).map(|(l, r)| l * r).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::SeedableRng;

    fn model() -> LinearModel {
        LinearModel {
            row_width: 2,
            policy_size: 3,
            value_weights: vec![0.5, -1.0],
            value_bias: 0.25,
            policy_weights: vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            policy_bias: vec![0.0, 0.5, -1.0],
        }
    }

    #[test]
    fn test_forward() {
        let model = model();
        let features = [2.0, 1.0, 0.0, 3.0];
        let input = BatchInput::new(&features, 2, 2);
        let mut output = BatchOutput::with_capacity(2, 3);

        model.forward(&input, &mut output).unwrap();

        assert_eq!(output.len(), 2);
        assert_approx_eq!(output.value(0), 0.25);
        assert_approx_eq!(output.value(1), -2.75);
        assert_eq!(output.policy(0), &[2.0, 1.5, 2.0]);
        assert_eq!(output.policy(1), &[0.0, 3.5, 2.0]);
    }

    #[test]
    fn test_shape() {
        assert_eq!(model().shape(), Some((2, 3)));
    }

    #[test]
    fn test_forward_rejects_wrong_width() {
        let model = model();
        let features = [1.0, 2.0, 3.0];
        let input = BatchInput::new(&features, 1, 3);
        let mut output = BatchOutput::with_capacity(1, 3);

        assert!(model.forward(&input, &mut output).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let mut rng = rand::rngs::StdRng::seed_from_u64(11);
        let model = LinearModel::random(8, 5, 0.1, &mut rng);

        model.save(&path).unwrap();

        assert_eq!(LinearModel::load(&path).unwrap(), model);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();

        assert!(LinearModel::load(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_load_rejects_mismatched_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let mut model = model();
        model.policy_bias.pop();
        model.save(&path).unwrap();

        let err = LinearModel::load(&path).unwrap_err();

        assert!(format!("{:#}", err).contains("policy biases"));
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(LinearModel::load(&path).is_err());
    }
}
