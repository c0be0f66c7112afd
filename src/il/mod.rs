//! Intermediate code generation and optimisation.
mod generator;
mod optimiser;
mod quad;

pub use generator::{generate, ERROR, NULL, VOID};
pub use optimiser::optimise;
pub use quad::*;
