/// Policy value given to illegal candidates, including moves forbidden by the repetition rule.
pub const ILLEGAL_POLICY: f32 = -1.0;

/// The network's evaluation of one position.
#[derive(Clone, Debug, PartialEq)]
pub struct NNOutput {
    value: f32,
    policy: Box<[f32]>,
}

impl NNOutput {
    pub fn new(value: f32, policy: Vec<f32>) -> Self {
        Self {
            value,
            policy: policy.into_boxed_slice(),
        }
    }

    /// Utility in [-1, 1] from the perspective of the player to move.
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Indexed by location. Illegal entries hold `ILLEGAL_POLICY`.
    pub fn policy(&self) -> &[f32] {
        &self.policy
    }

    pub fn policy_prob(&self, loc: usize) -> Option<f32> {
        self.policy.get(loc).copied().filter(|p| *p >= 0.0)
    }

    pub fn legal_moves(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.policy
            .iter()
            .enumerate()
            .filter(|(_, p)| **p >= 0.0)
            .map(|(loc, p)| (loc, *p))
    }

    pub fn best_move(&self) -> Option<usize> {
        self.legal_moves()
            .max_by(|(_, l), (_, r)| l.total_cmp(r))
            .map(|(loc, _)| loc)
    }
}
