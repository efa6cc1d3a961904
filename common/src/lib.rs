pub mod config;
pub mod env;
pub mod fs;
pub mod rng;
pub mod softmax;

pub use config::*;
pub use env::*;
pub use fs::*;
pub use rng::*;
pub use softmax::*;
