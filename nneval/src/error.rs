use thiserror::Error;

/// Why a request finished without an evaluation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("the evaluator was killed before the request was answered")]
    Killed,
    #[error("the compute backend failed: {0}")]
    Backend(String),
    #[error("the position cannot be encoded: {0}")]
    InvalidPosition(String),
}
