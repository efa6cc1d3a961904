use std::path::Path;

use anyhow::Result;

/// Runs the network over a batch of feature rows.
///
/// For every input row, in order, an implementation pushes one value and one raw policy of
/// `output.policy_size()` entries. Returning an error fails every request in the batch.
pub trait ComputeBackend: Send + Sync {
    fn forward(&self, input: &BatchInput<'_>, output: &mut BatchOutput) -> Result<()>;

    /// The `(row_width, policy_size)` the backend was built for, if it is fixed.
    fn shape(&self) -> Option<(usize, usize)> {
        None
    }
}

/// A backend that can be created from a model file.
pub trait LoadModel: Sized {
    fn load(path: &Path) -> Result<Self>;
}

/// `count` contiguous feature rows of `row_width` each.
pub struct BatchInput<'a> {
    features: &'a [f32],
    count: usize,
    row_width: usize,
}

impl<'a> BatchInput<'a> {
    pub fn new(features: &'a [f32], count: usize, row_width: usize) -> Self {
        assert_eq!(features.len(), count * row_width, "Feed length does not match its shape");

        Self {
            features,
            count,
            row_width,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn row_width(&self) -> usize {
        self.row_width
    }

    pub fn features(&self) -> &'a [f32] {
        self.features
    }

    pub fn rows(&self) -> impl Iterator<Item = &'a [f32]> + 'a {
        self.features.chunks_exact(self.row_width)
    }
}

pub struct BatchOutput {
    policy_size: usize,
    values: Vec<f32>,
    policies: Vec<f32>,
}

impl BatchOutput {
    pub fn with_capacity(capacity: usize, policy_size: usize) -> Self {
        Self {
            policy_size,
            values: Vec::with_capacity(capacity),
            policies: Vec::with_capacity(capacity * policy_size),
        }
    }

    pub fn policy_size(&self) -> usize {
        self.policy_size
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.policies.clear();
    }

    pub fn push_row(&mut self, value: f32, policy: &[f32]) {
        self.values.push(value);
        self.policies.extend_from_slice(policy);
    }

    /// Appends a row whose policy is written in place, starting from zeros.
    pub fn push_row_with<W>(&mut self, value: f32, write_policy: W)
    where
        W: FnOnce(&mut [f32]),
    {
        let start = self.policies.len();
        self.policies.resize(start + self.policy_size, 0.0);
        write_policy(&mut self.policies[start..]);
        self.values.push(value);
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn policies(&self) -> &[f32] {
        &self.policies
    }

    pub fn value(&self, index: usize) -> f32 {
        self.values[index]
    }

    pub fn policy(&self, index: usize) -> &[f32] {
        &self.policies[index * self.policy_size..(index + 1) * self.policy_size]
    }
}
