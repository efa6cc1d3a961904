pub mod features;
pub mod player;
pub mod position;
pub mod symmetry;

pub use crate::features::*;
pub use crate::player::*;
pub use crate::position::*;
pub use crate::symmetry::*;
