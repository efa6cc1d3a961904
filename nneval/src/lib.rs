//! Batches blocking neural network evaluation requests from many search threads into single
//! forward passes.
//!
//! Clients call [`Evaluator::evaluate`] with a position and their own [`ResultSlot`]. Server
//! threads started by [`Evaluator::spawn_server_threads`] claim filled batches, run them through
//! a [`ComputeBackend`] and publish one [`NNOutput`] per request. [`Evaluator::kill_servers`]
//! releases every waiting participant.

mod backend;
mod batch_buffer;
mod error;
mod evaluator;
mod linear;
mod options;
mod output;
mod reporter;
mod scratch;
mod slot;

pub mod utility;

pub use backend::*;
pub use batch_buffer::*;
pub use error::*;
pub use evaluator::*;
pub use linear::*;
pub use options::*;
pub use output::*;
pub use reporter::*;
pub use scratch::*;
pub use slot::*;
